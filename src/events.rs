//! Handlers for the X events the window manager reacts to.
use anyhow::Result;
use xcb::Window;

use crate::{
    bindings::{self, Click},
    tag::TagMask,
    wm::WindowManager,
    xconnection::{
        ClientRequest, ConfigureRequest, Property, Rectangle, WmState, XConn, XEvent,
        CONFIG_WINDOW_BORDER_WIDTH, CONFIG_WINDOW_HEIGHT, CONFIG_WINDOW_WIDTH, CONFIG_WINDOW_X,
        CONFIG_WINDOW_Y, XcbKey,
    },
};

impl<'a, X: XConn> WindowManager<'a, X> {
    pub fn handle_event(&mut self, event: XEvent) -> Result<()> {
        match event {
            XEvent::ButtonPress {
                id,
                root_x: _,
                root_y: _,
                event_x,
                state,
                button,
            } => self.button_press(id, event_x, state, button)?,
            XEvent::ButtonRelease { .. } => (),
            XEvent::MotionNotify { id, root_x, root_y, .. } => self.motion_notify(id, root_x, root_y),
            XEvent::KeyPress { code } => self.key_press(code)?,
            XEvent::MapRequest { id } => self.map_request(id),
            XEvent::ConfigureRequest(req) => self.configure_request(&req),
            XEvent::ConfigureNotify { r, is_root, .. } => {
                if is_root {
                    self.root_configure_notify(r);
                }
            }
            XEvent::DestroyNotify { id } => {
                if self.clients.contains_key(&id) {
                    self.unmanage(id, true);
                }
            }
            XEvent::UnmapNotify { id, synthetic } => self.unmap_notify(id, synthetic),
            XEvent::Enter {
                id,
                normal,
                inferior,
                is_root,
            } => self.enter_notify(id, normal, inferior, is_root),
            XEvent::Expose { id, count } => {
                if count == 0 {
                    if let Some(m) = self.mons.iter().position(|m| m.barwin == id) {
                        self.draw_bar(m);
                    }
                }
            }
            XEvent::FocusIn { id } => {
                // some clients grab focus for themselves, hand it back
                if let Some(sel) = self.sel() {
                    if sel != id {
                        self.set_focus(sel);
                    }
                }
            }
            XEvent::PropertyNotify {
                id,
                atom,
                deleted,
                is_root,
            } => self.property_notify(id, atom, deleted, is_root),
            XEvent::ClientMessage { id, request } => self.client_message(id, request),
            XEvent::MappingNotify { keyboard } => {
                self.conn.refresh_keyboard_mapping();
                if keyboard {
                    self.grab_keys();
                }
            }
        }
        Ok(())
    }

    /// Work out which part of the bar `x` falls in, along with the clicked
    /// tag when it is a tag cell
    pub(crate) fn bar_click(&self, x: i32) -> (Click, TagMask) {
        let mut edge = 0;
        for (i, name) in self.config.tags.iter().enumerate() {
            edge += self.textw(name);
            if x < edge {
                return (Click::TagBar, 1 << i);
            }
        }
        let m = &self.mons[self.selmon];
        if x < edge + self.blw {
            (Click::LtSymbol, 0)
        } else if x > m.area.w - self.textw(&self.status) {
            (Click::StatusText, 0)
        } else {
            (Click::WinTitle, 0)
        }
    }

    fn button_press(&mut self, id: Window, event_x: i32, state: u16, button: u8) -> Result<()> {
        let mon = self.win_to_mon(id);
        if mon != self.selmon {
            if let Some(sel) = self.sel() {
                self.unfocus(sel, true);
            }
            self.selmon = mon;
            self.focus(None);
        }

        let (click, clicked_tag) = if id == self.mons[self.selmon].barwin {
            self.bar_click(event_x)
        } else if self.clients.contains_key(&id) {
            self.focus(Some(id));
            self.restack(self.selmon);
            self.conn.allow_replay_pointer();
            (Click::ClientWin, 0)
        } else {
            (Click::RootWin, 0)
        };

        let mods = bindings::clean_mask(state, self.numlock);
        let actions: Vec<_> = self
            .config
            .buttons
            .iter()
            .filter(|b| b.click == click && b.button == button && bindings::clean_mask(b.mod_mask, self.numlock) == mods)
            .map(|b| {
                if click == Click::TagBar {
                    b.action.with_clicked_tag(clicked_tag)
                } else {
                    b.action.clone()
                }
            })
            .collect();
        for action in &actions {
            self.run_action(action)?;
        }
        Ok(())
    }

    fn key_press(&mut self, code: XcbKey) -> Result<()> {
        let keysym = self.conn.keysym_for(code.code);
        let mods = bindings::clean_mask(code.mod_mask, self.numlock);
        let actions: Vec<_> = self
            .keys
            .iter()
            .filter(|k| k.keysym == keysym && bindings::clean_mask(k.mod_mask, self.numlock) == mods)
            .map(|k| k.action.clone())
            .collect();
        for action in &actions {
            self.run_action(action)?;
        }
        Ok(())
    }

    fn map_request(&mut self, id: Window) {
        let wa = match self.conn.window_attributes(id) {
            Some(wa) => wa,
            None => return,
        };
        if wa.override_redirect || self.clients.contains_key(&id) {
            return;
        }
        self.manage(id, &wa);
    }

    fn unmap_notify(&mut self, id: Window, synthetic: bool) {
        if !self.clients.contains_key(&id) {
            return;
        }
        if synthetic {
            self.conn.set_wm_state(id, WmState::Withdrawn);
        } else {
            self.unmanage(id, false);
        }
    }

    /**
     * Managed floating clients (and every client under a non-arranging
     * layout) get the fields they asked for, re-centred on their monitor when
     * that would push them off it. Tiled clients are only told their current
     * geometry. Unmanaged windows get the request passed on as is.
     */
    fn configure_request(&mut self, req: &ConfigureRequest) {
        let arranges = self.mons[self.selmon].arranges();
        let c = match self.clients.get_mut(&req.id) {
            Some(c) => c,
            None => {
                self.conn.forward_configure_request(req);
                self.conn.sync();
                return;
            }
        };

        if req.has(CONFIG_WINDOW_BORDER_WIDTH) {
            c.bw = req.border_width;
        } else if c.is_floating || !arranges {
            let m = &self.mons[c.mon];
            if req.has(CONFIG_WINDOW_X) {
                c.old.x = c.geom.x;
                c.geom.x = m.screen.x + req.x;
            }
            if req.has(CONFIG_WINDOW_Y) {
                c.old.y = c.geom.y;
                c.geom.y = m.screen.y + req.y;
            }
            if req.has(CONFIG_WINDOW_WIDTH) {
                c.old.w = c.geom.w;
                c.geom.w = req.w;
            }
            if req.has(CONFIG_WINDOW_HEIGHT) {
                c.old.h = c.geom.h;
                c.geom.h = req.h;
            }
            if c.geom.x + c.geom.w > m.screen.x + m.screen.w && c.is_floating {
                c.geom.x = m.screen.x + (m.screen.w / 2 - c.full_width() / 2);
            }
            if c.geom.y + c.geom.h > m.screen.y + m.screen.h && c.is_floating {
                c.geom.y = m.screen.y + (m.screen.h / 2 - c.full_height() / 2);
            }

            let geom = c.geom;
            let moved_only = req.has(CONFIG_WINDOW_X | CONFIG_WINDOW_Y)
                && !req.has(CONFIG_WINDOW_WIDTH | CONFIG_WINDOW_HEIGHT);
            if moved_only {
                self.configure(req.id);
            }
            if self.is_visible(req.id) {
                self.conn.move_resize(req.id, geom);
            }
        } else {
            self.configure(req.id);
        }
        self.conn.sync();
    }

    fn root_configure_notify(&mut self, r: Rectangle) {
        let resized = self.screen != (r.w, r.h);
        self.screen = (r.w, r.h);
        if !self.update_geom() && !resized {
            return;
        }

        self.drw.resize(self.screen.0, self.bh);
        self.update_bars();
        for i in 0..self.mons.len() {
            let screen = self.mons[i].screen;
            let fullscreen: Vec<Window> = self.mons[i]
                .clients
                .iter()
                .copied()
                .filter(|w| self.clients.get(w).map_or(false, |c| c.is_fullscreen))
                .collect();
            for win in fullscreen {
                self.resize_client(win, screen);
            }
            let m = &self.mons[i];
            self.conn
                .move_resize(m.barwin, Rectangle::new(m.area.x, m.by, m.area.w, self.bh));
        }
        self.focus(None);
        self.arrange(None);
    }

    fn enter_notify(&mut self, id: Window, normal: bool, inferior: bool, is_root: bool) {
        if (!normal || inferior) && !is_root {
            return;
        }
        let client = self.clients.get(&id).map(|c| c.mon);
        let mon = client.unwrap_or_else(|| self.win_to_mon(id));
        if mon != self.selmon {
            if let Some(sel) = self.sel() {
                self.unfocus(sel, true);
            }
            self.selmon = mon;
        } else if client.is_none() || self.sel() == Some(id) {
            return;
        }
        self.focus(client.map(|_| id));
    }

    /// Pointer motion over the root switches the selected monitor
    fn motion_notify(&mut self, id: Window, root_x: i32, root_y: i32) {
        if id != self.conn.root() {
            return;
        }
        let mon = self.rect_to_mon(Rectangle::new(root_x, root_y, 1, 1));
        if let Some(prev) = self.motion_mon {
            if mon != prev {
                if let Some(sel) = self.sel() {
                    self.unfocus(sel, true);
                }
                self.selmon = mon;
                self.focus(None);
            }
        }
        self.motion_mon = Some(mon);
    }

    fn property_notify(&mut self, id: Window, atom: Property, deleted: bool, is_root: bool) {
        if is_root && atom == Property::WmName {
            self.update_status();
            return;
        }
        if deleted || !self.clients.contains_key(&id) {
            return;
        }

        match atom {
            Property::TransientFor => {
                let floating = self.clients.get(&id).map_or(true, |c| c.is_floating);
                let parent = self.conn.transient_for(id);
                if !floating && parent.map_or(false, |p| self.clients.contains_key(&p)) {
                    if let Some(c) = self.clients.get_mut(&id) {
                        c.is_floating = true;
                    }
                    let mon = self.clients[&id].mon;
                    self.arrange(Some(mon));
                }
            }
            Property::NormalHints => self.update_size_hints(id),
            Property::WmHints => {
                self.update_wm_hints(id);
                self.draw_bars();
            }
            Property::WmName | Property::NetWmName => {
                self.update_title(id);
                let mon = self.clients[&id].mon;
                if self.mons[mon].sel == Some(id) {
                    self.draw_bar(mon);
                }
            }
            Property::WindowType => self.update_window_type(id),
            Property::Other(_) => (),
        }
    }

    fn client_message(&mut self, id: Window, request: ClientRequest) {
        let (is_fullscreen, is_urgent) = match self.clients.get(&id) {
            Some(c) => (c.is_fullscreen, c.is_urgent),
            None => return,
        };
        match request {
            ClientRequest::Fullscreen { action } => {
                self.set_fullscreen(id, action == 1 || (action == 2 && !is_fullscreen));
            }
            ClientRequest::Activate => {
                if self.sel() != Some(id) && !is_urgent {
                    self.set_urgent(id, true);
                    self.draw_bars();
                }
            }
            ClientRequest::Other(_) => (),
        }
    }
}
