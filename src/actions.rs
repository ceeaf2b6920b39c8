//! User commands bound to keys and mouse buttons.
use anyhow::Result;
use xcb::Window;

use crate::{
    bindings::{self, Action},
    layout::Layout,
    tag::TagMask,
    wm::WindowManager,
    xconnection::{Protocol, Rectangle, XConn},
};

impl<'a, X: XConn> WindowManager<'a, X> {
    pub fn run_action(&mut self, action: &Action) -> Result<()> {
        debug!("running action: {:?}", action);
        match action {
            Action::Spawn(cmd) => bindings::spawn(cmd),
            Action::ToggleBar => self.toggle_bar(),
            Action::FocusStack(dir) => self.focus_stack(*dir),
            Action::IncNMaster(delta) => {
                self.mons[self.selmon].inc_nmaster(*delta);
                self.arrange(Some(self.selmon));
            }
            Action::SetMFact(f) => {
                let m = &mut self.mons[self.selmon];
                if m.arranges() && m.set_mfact(*f) {
                    self.arrange(Some(self.selmon));
                }
            }
            Action::Zoom => self.zoom(),
            Action::View(mask) => self.view(*mask),
            Action::ToggleView(mask) => {
                let mask = mask & self.config.tagmask();
                if self.mons[self.selmon].toggle_view(mask) {
                    self.focus(None);
                    self.arrange(Some(self.selmon));
                }
            }
            Action::Tag(mask) => self.tag(*mask),
            Action::ToggleTag(mask) => self.toggle_tag(*mask),
            Action::KillClient => self.kill_client(),
            Action::SetLayout(layout) => self.set_layout(*layout),
            Action::ToggleFloating => self.toggle_floating(),
            Action::ToggleFullscreen => {
                if let Some(sel) = self.sel() {
                    let on = !self.clients[&sel].is_fullscreen;
                    self.set_fullscreen(sel, on);
                }
            }
            Action::FocusMon(dir) => self.focus_mon(*dir),
            Action::TagMon(dir) => {
                if let Some(sel) = self.sel() {
                    if self.mons.len() > 1 {
                        let target = self.dir_to_mon(*dir);
                        self.send_mon(sel, target);
                    }
                }
            }
            Action::MoveMouse => self.move_mouse()?,
            Action::ResizeMouse => self.resize_mouse()?,
            Action::Quit => self.quit(false),
            Action::Restart => self.quit(true),
        }
        Ok(())
    }

    /// Show exactly the tags in `mask`, or the previous tag-set for zero
    pub fn view(&mut self, mask: TagMask) {
        let mask = mask & self.config.tagmask();
        if self.mons[self.selmon].view(mask) {
            self.focus(None);
            self.arrange(Some(self.selmon));
        }
    }

    fn tag(&mut self, mask: TagMask) {
        let mask = mask & self.config.tagmask();
        let sel = match self.sel() {
            Some(sel) if mask != 0 => sel,
            _ => return,
        };
        if let Some(c) = self.clients.get_mut(&sel) {
            c.tags = mask;
        }
        self.focus(None);
        self.arrange(Some(self.selmon));
    }

    fn toggle_tag(&mut self, mask: TagMask) {
        let sel = match self.sel() {
            Some(sel) => sel,
            None => return,
        };
        let tags = self.clients[&sel].tags ^ (mask & self.config.tagmask());
        if tags == 0 {
            return;
        }
        if let Some(c) = self.clients.get_mut(&sel) {
            c.tags = tags;
        }
        self.focus(None);
        self.arrange(Some(self.selmon));
    }

    fn toggle_bar(&mut self) {
        let bh = self.bh;
        let m = &mut self.mons[self.selmon];
        m.showbar = !m.showbar;
        m.update_bar_pos(bh);
        let r = Rectangle::new(m.area.x, m.by, m.area.w, bh);
        self.conn.move_resize(m.barwin, r);
        self.arrange(Some(self.selmon));
    }

    /// Visible clients of the selected monitor in tiling order
    fn visible_clients(&self) -> Vec<Window> {
        self.mons[self.selmon]
            .clients
            .iter()
            .copied()
            .filter(|w| self.is_visible(*w))
            .collect()
    }

    /// Visible, non-floating clients of the selected monitor in tiling order
    fn tiled_clients(&self) -> Vec<Window> {
        self.visible_clients()
            .into_iter()
            .filter(|w| self.clients.get(w).map_or(false, |c| !c.is_floating))
            .collect()
    }

    fn focus_stack(&mut self, dir: i32) {
        let sel = match self.sel() {
            Some(sel) => sel,
            None => return,
        };
        if self.clients[&sel].is_fullscreen && self.config.lock_fullscreen {
            return;
        }

        let visible = self.visible_clients();
        let pos = match visible.iter().position(|w| *w == sel) {
            Some(pos) => pos,
            None => return,
        };
        let n = visible.len();
        let next = if dir > 0 { (pos + 1) % n } else { (pos + n - 1) % n };
        self.focus(Some(visible[next]));
        self.restack(self.selmon);
    }

    /// Swap the selection with the master, or promote the next tiled client
    /// when the selection already is the master
    fn zoom(&mut self) {
        let sel = match self.sel() {
            Some(sel) => sel,
            None => return,
        };
        if !self.mons[self.selmon].arranges() || self.clients[&sel].is_floating {
            return;
        }

        let tiled = self.tiled_clients();
        let target = if tiled.first() == Some(&sel) {
            match tiled.get(1) {
                Some(w) => *w,
                None => return,
            }
        } else {
            sel
        };

        self.mons[self.selmon].detach(target);
        self.mons[self.selmon].attach(target);
        self.focus(Some(target));
        self.arrange(Some(self.selmon));
    }

    /// Close the selection politely if it supports WM_DELETE_WINDOW, forcibly
    /// otherwise
    fn kill_client(&mut self) {
        let sel = match self.sel() {
            Some(sel) => sel,
            None => return,
        };
        if self.conn.send_protocol(sel, Protocol::Delete) {
            return;
        }
        self.conn.grab_server();
        self.conn.suppress_errors(true);
        self.conn.kill_client(sel);
        self.conn.sync();
        self.conn.suppress_errors(false);
        self.conn.ungrab_server();
    }

    fn set_layout(&mut self, layout: Option<Layout>) {
        self.mons[self.selmon].set_layout(layout);
        if self.sel().is_some() {
            self.arrange(Some(self.selmon));
        } else {
            self.draw_bar(self.selmon);
        }
    }

    pub(crate) fn toggle_floating(&mut self) {
        let sel = match self.sel() {
            Some(sel) => sel,
            None => return,
        };
        let geom = match self.clients.get_mut(&sel) {
            // no support for fullscreen windows
            Some(c) if !c.is_fullscreen => {
                c.is_floating = !c.is_floating || c.is_fixed;
                if c.is_floating {
                    Some(c.geom)
                } else {
                    None
                }
            }
            _ => return,
        };
        if let Some(r) = geom {
            self.resize(sel, r, false);
        }
        self.arrange(Some(self.selmon));
    }

    fn focus_mon(&mut self, dir: i32) {
        if self.mons.len() <= 1 {
            return;
        }
        let target = self.dir_to_mon(dir);
        if target == self.selmon {
            return;
        }
        if let Some(sel) = self.sel() {
            self.unfocus(sel, false);
        }
        self.selmon = target;
        self.focus(None);
    }
}
