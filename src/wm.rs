use std::collections::{HashMap, VecDeque};

use anyhow::Result;
use xcb::Window;

use crate::{
    bindings::{self, Click, Key},
    client::{Bounds, Client},
    config::Config,
    draw::{Draw, SchemeKind},
    layout::{ArrangeParams, Layout},
    monitor::{self, MonId, Monitor},
    rules,
    signals,
    xconnection::{Protocol, Rectangle, WindowAttributes, WmState, XConn, XEvent},
};

pub const WM_NAME: &str = "zwm";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/**
 * All window manager state.
 *
 * Built by [WindowManager::new], which also performs the one time setup
 * against the X server. [WindowManager::run] then dispatches events until a
 * quit is requested and [WindowManager::cleanup] hands every window back.
 */
pub struct WindowManager<'a, X: XConn> {
    pub(crate) conn: &'a X,
    pub(crate) drw: Box<dyn Draw + 'a>,
    pub(crate) config: Config,
    pub(crate) keys: Vec<Key>,
    /// Screen width and height
    pub(crate) screen: (i32, i32),
    /// Bar height
    pub(crate) bh: i32,
    /// Horizontal padding around bar text
    pub(crate) lrpad: i32,
    /// Width of the layout symbol in the most recently drawn bar
    pub(crate) blw: i32,
    pub(crate) status: String,
    pub(crate) clients: HashMap<Window, Client>,
    pub(crate) mons: Vec<Monitor>,
    pub(crate) selmon: MonId,
    pub(crate) numlock: u16,
    pub(crate) running: bool,
    pub(crate) restart: bool,
    /// Events set aside by a modal mouse loop, handled before new ones
    pub(crate) deferred: VecDeque<XEvent>,
    /// Monitor the pointer was last seen on by root motion events
    pub(crate) motion_mon: Option<MonId>,
}

impl<'a, X: XConn> WindowManager<'a, X> {
    pub fn new(conn: &'a X, drw: Box<dyn Draw + 'a>, config: Config) -> Result<Self> {
        let keys = config.resolve_keys()?;
        let font_height = drw.font_height();

        let mut wm = WindowManager {
            conn,
            drw,
            config,
            keys,
            screen: conn.screen_size(),
            bh: font_height + 2,
            lrpad: font_height,
            blw: 0,
            status: String::new(),
            clients: HashMap::new(),
            mons: vec![],
            selmon: 0,
            numlock: 0,
            running: true,
            restart: false,
            deferred: VecDeque::new(),
            motion_mon: None,
        };
        wm.setup()?;
        Ok(wm)
    }

    fn setup(&mut self) -> Result<()> {
        self.update_geom();
        self.conn.init_root(WM_NAME)?;
        self.update_bars();
        self.update_status();
        self.grab_keys();
        self.focus(None);
        self.conn.flush();
        Ok(())
    }

    /// Adopt the windows that already exist, transients last so that their
    /// parents are known
    pub fn scan(&mut self) {
        let wins = self.conn.query_tree();
        let mut transients = vec![];

        for &win in &wins {
            let wa = match self.conn.window_attributes(win) {
                Some(wa) if !wa.override_redirect => wa,
                _ => continue,
            };
            if self.conn.transient_for(win).is_some() {
                transients.push((win, wa));
                continue;
            }
            if wa.viewable || self.conn.wm_state(win) == Some(WmState::Iconic) {
                self.manage(win, &wa);
            }
        }

        for (win, wa) in transients {
            if wa.viewable || self.conn.wm_state(win) == Some(WmState::Iconic) {
                self.manage(win, &wa);
            }
        }
        info!("adopted {} existing windows", self.clients.len());
    }

    pub fn run(&mut self) -> Result<()> {
        self.conn.sync();
        while self.running {
            let event = match self.deferred.pop_front() {
                Some(e) => e,
                None => self.conn.next_event()?,
            };
            debug!("got XEvent: {:?}", event);
            self.handle_event(event)?;
            self.conn.flush();

            if let Some(restart) = signals::pending() {
                self.quit(restart);
            }
        }
        Ok(())
    }

    /// Whether the loop ended because a restart was requested
    pub fn restart_requested(&self) -> bool {
        self.restart
    }

    pub fn quit(&mut self, restart: bool) {
        info!("{}", if restart { "restarting" } else { "quitting" });
        self.restart = restart;
        self.running = false;
    }

    /// Unmanage everything, restoring borders, and release the X resources
    pub fn cleanup(&mut self) {
        if self.mons.is_empty() {
            return;
        }
        self.view(!0);
        let m = &mut self.mons[self.selmon];
        m.lt[m.sellt] = Layout::Floating;
        for i in 0..self.mons.len() {
            for win in self.mons[i].stack.clone() {
                self.unmanage(win, false);
            }
        }
        for m in self.mons.drain(..) {
            self.conn.unmap_window(m.barwin);
            self.conn.destroy_window(m.barwin);
        }
        self.conn.cleanup();
    }

    pub(crate) fn sel(&self) -> Option<Window> {
        self.mons[self.selmon].sel
    }

    pub(crate) fn is_visible(&self, win: Window) -> bool {
        self.clients
            .get(&win)
            .map_or(false, |c| c.visible_on(self.mons[c.mon].active_tags()))
    }

    /// Width of `text` on the bar, padding included
    pub(crate) fn textw(&self, text: &str) -> i32 {
        self.drw.text_width(text) + self.lrpad
    }

    fn bounds(&self, c: &Client) -> Bounds {
        let m = &self.mons[c.mon];
        Bounds {
            screen: self.screen,
            area: m.area,
            bar_height: self.bh,
            respect_hints: self.config.resize_hints || c.is_floating || !m.arranges(),
        }
    }

    /// The monitor with the largest overlap with `r`, the selected one if none
    pub(crate) fn rect_to_mon(&self, r: Rectangle) -> MonId {
        let mut best = self.selmon;
        let mut area = 0;
        for (i, m) in self.mons.iter().enumerate() {
            let a = r.intersection_area(&m.area);
            if a > area {
                area = a;
                best = i;
            }
        }
        best
    }

    pub(crate) fn win_to_mon(&self, win: Window) -> MonId {
        if win == self.conn.root() {
            if let Some((x, y)) = self.conn.query_pointer() {
                return self.rect_to_mon(Rectangle::new(x, y, 1, 1));
            }
        }
        if let Some(i) = self.mons.iter().position(|m| m.barwin == win) {
            return i;
        }
        self.clients.get(&win).map_or(self.selmon, |c| c.mon)
    }

    /// The next monitor in `dir`, wrapping around at either end
    pub(crate) fn dir_to_mon(&self, dir: i32) -> MonId {
        let n = self.mons.len();
        if dir > 0 {
            (self.selmon + 1) % n
        } else {
            (self.selmon + n - 1) % n
        }
    }

    pub(crate) fn manage(&mut self, win: Window, wa: &WindowAttributes) {
        let mut c = Client::new(win, wa.geom, wa.border_width, self.selmon);
        c.set_name(self.conn.title(win));

        let trans = self.conn.transient_for(win);
        match trans.and_then(|t| self.clients.get(&t)) {
            Some(parent) => {
                c.mon = parent.mon;
                c.tags = parent.tags;
            }
            None => self.apply_rules(&mut c),
        }

        let m = &self.mons[c.mon];
        if c.geom.x + c.full_width() > m.screen.x + m.screen.w {
            c.geom.x = m.screen.x + m.screen.w - c.full_width();
        }
        if c.geom.y + c.full_height() > m.screen.y + m.screen.h {
            c.geom.y = m.screen.y + m.screen.h - c.full_height();
        }
        c.geom.x = c.geom.x.max(m.screen.x);
        // only fix the client y-offset if the client center might cover the bar
        let covers_bar = m.by == m.screen.y
            && c.geom.x + c.geom.w / 2 >= m.area.x
            && c.geom.x + c.geom.w / 2 < m.area.x + m.area.w;
        c.geom.y = c.geom.y.max(if covers_bar { self.bh } else { m.screen.y });
        c.bw = self.config.border_px;
        let mon = c.mon;

        debug!("managing {:#x} '{}' on monitor {}", win, c.name, mon);
        self.clients.insert(win, c);
        self.conn.set_border_width(win, self.config.border_px);
        self.conn.set_border_color(win, self.drw.border_pixel(SchemeKind::Norm));
        self.configure(win);
        self.update_window_type(win);
        self.update_size_hints(win);
        self.update_wm_hints(win);
        self.conn.select_client_events(win);
        self.grab_buttons(win, false);

        let floating = match self.clients.get_mut(&win) {
            Some(c) => {
                if !c.is_floating {
                    c.is_floating = trans.is_some() || c.is_fixed;
                    c.old_state = c.is_floating;
                }
                c.is_floating
            }
            None => return,
        };
        if floating {
            self.conn.raise_window(win);
        }

        self.mons[mon].attach(win);
        self.mons[mon].attach_stack(win);
        self.conn.append_client_list(win);
        if let Some(c) = self.clients.get(&win) {
            // some windows require this to be mapped offscreen first
            let mut r = c.geom;
            r.x += 2 * self.screen.0;
            self.conn.move_resize(win, r);
        }
        self.conn.set_wm_state(win, WmState::Normal);
        if mon == self.selmon {
            if let Some(sel) = self.sel() {
                self.unfocus(sel, false);
            }
        }
        self.mons[mon].sel = Some(win);
        self.arrange(Some(mon));
        self.conn.map_window(win);
        self.focus(None);
    }

    fn apply_rules(&self, c: &mut Client) {
        let (instance, class) = self.conn.class_hint(c.win);
        let placement = rules::apply_rules(&self.config.rules, &class, &instance, &c.name);

        c.is_floating = placement.is_floating;
        if let Some(num) = placement.monitor {
            if let Some(i) = self.mons.iter().position(|m| m.num == num) {
                c.mon = i;
            }
        }
        c.tags = rules::resolve_tags(placement.tags, self.config.tagmask(), self.mons[c.mon].active_tags());
    }

    pub(crate) fn unmanage(&mut self, win: Window, destroyed: bool) {
        let (mon, oldbw) = match self.clients.get(&win) {
            Some(c) => (c.mon, c.oldbw),
            None => return,
        };
        debug!("unmanaging {:#x}", win);

        self.mons[mon].detach(win);
        self.mons[mon].detach_stack(win, &self.clients);
        if !destroyed {
            // the window may be gone by the time these requests arrive
            self.conn.grab_server();
            self.conn.suppress_errors(true);
            self.conn.set_border_width(win, oldbw);
            self.conn.ungrab_buttons(win);
            self.conn.set_wm_state(win, WmState::Withdrawn);
            self.conn.sync();
            self.conn.suppress_errors(false);
            self.conn.ungrab_server();
        }
        self.clients.remove(&win);
        self.focus(None);
        self.update_client_list();
        self.arrange(Some(mon));
    }

    pub(crate) fn update_client_list(&self) {
        let wins: Vec<Window> = self.mons.iter().flat_map(|m| m.clients.iter().copied()).collect();
        self.conn.set_client_list(&wins);
    }

    /// Tell the client its current geometry with a synthetic ConfigureNotify
    pub(crate) fn configure(&self, win: Window) {
        if let Some(c) = self.clients.get(&win) {
            self.conn.send_configure_notify(win, c.geom, c.bw);
        }
    }

    /// Move and resize a client within its constraints
    pub(crate) fn resize(&mut self, win: Window, r: Rectangle, interact: bool) {
        let resolved = match self.clients.get(&win) {
            Some(c) => c.apply_size_hints(r, interact, &self.bounds(c)),
            None => return,
        };
        if let (r, true) = resolved {
            self.resize_client(win, r);
        }
    }

    /// Apply a geometry without consulting the size hints
    pub(crate) fn resize_client(&mut self, win: Window, r: Rectangle) {
        let bw = match self.clients.get_mut(&win) {
            Some(c) => {
                c.set_geometry(r);
                c.bw
            }
            None => return,
        };
        self.conn.configure_window(win, r, bw);
        self.configure(win);
        self.conn.sync();
    }

    /// Re-layout one monitor, or every monitor when `None`
    pub fn arrange(&mut self, mon: Option<MonId>) {
        let targets: Vec<MonId> = match mon {
            Some(m) => vec![m],
            None => (0..self.mons.len()).collect(),
        };
        for &m in &targets {
            self.show_hide(m);
        }
        for &m in &targets {
            self.arrange_mon(m);
        }
        if let Some(m) = mon {
            self.restack(m);
        }
    }

    fn arrange_mon(&mut self, mon: MonId) {
        let m = &self.mons[mon];
        let layout = m.layout();
        let active = m.active_tags();
        let mut visible = 0;
        let mut tiled = vec![];
        for win in &m.clients {
            if let Some(c) = self.clients.get(win) {
                if c.visible_on(active) {
                    visible += 1;
                    if !c.is_floating {
                        tiled.push((*win, c.bw));
                    }
                }
            }
        }
        let params = ArrangeParams {
            area: m.area,
            nmaster: m.nmaster,
            mfact: m.mfact,
            visible,
        };

        let symbol = layout.arrange(&params, &tiled, |win, r| {
            self.resize(win, r, false);
            self.clients.get(&win).map_or(0, |c| c.full_height())
        });
        self.mons[mon].ltsymbol = symbol.unwrap_or_else(|| layout.symbol().to_string());
    }

    /// Move visible clients on screen top-down, hidden ones off screen
    /// bottom-up
    fn show_hide(&mut self, mon: MonId) {
        let stack = self.mons[mon].stack.clone();
        let arranges = self.mons[mon].arranges();

        for &win in &stack {
            if !self.is_visible(win) {
                continue;
            }
            let (geom, float) = match self.clients.get(&win) {
                Some(c) => (c.geom, (c.is_floating || !arranges) && !c.is_fullscreen),
                None => continue,
            };
            self.conn.move_window(win, geom.x, geom.y);
            if float {
                self.resize(win, geom, false);
            }
        }

        for &win in stack.iter().rev() {
            if self.is_visible(win) {
                continue;
            }
            if let Some(c) = self.clients.get(&win) {
                self.conn.move_window(win, -2 * c.full_width(), c.geom.y);
            }
        }
    }

    pub(crate) fn restack(&mut self, mon: MonId) {
        self.draw_bar(mon);
        let sel = match self.mons[mon].sel {
            Some(w) => w,
            None => return,
        };
        let m = &self.mons[mon];
        let floating = self.clients.get(&sel).map_or(false, |c| c.is_floating);
        if floating || !m.arranges() {
            self.conn.raise_window(sel);
        }
        if m.arranges() {
            let mut sibling = m.barwin;
            for win in &m.stack {
                let tiled = self.clients.get(win).map_or(false, |c| !c.is_floating);
                if tiled && self.is_visible(*win) {
                    self.conn.stack_below(*win, sibling);
                    sibling = *win;
                }
            }
        }
        self.drain_enter_events();
    }

    /// Discard pending enter events, including those set aside by a drag
    pub(crate) fn drain_enter_events(&mut self) {
        self.conn.drain_enter_events();
        self.deferred.retain(|e| !matches!(e, XEvent::Enter { .. }));
    }

    /**
     * Give focus to `target`, or to the most recently focused visible client
     * on the selected monitor when `target` is `None` or hidden.
     */
    pub fn focus(&mut self, target: Option<Window>) {
        let mut win = target.filter(|w| self.is_visible(*w));
        if win.is_none() {
            let stack = &self.mons[self.selmon].stack;
            win = stack.iter().copied().find(|w| self.is_visible(*w));
        }

        if let Some(sel) = self.sel() {
            if Some(sel) != win {
                self.unfocus(sel, false);
            }
        }

        match win {
            Some(w) => {
                let (mon, urgent) = match self.clients.get(&w) {
                    Some(c) => (c.mon, c.is_urgent),
                    None => return,
                };
                if mon != self.selmon {
                    self.selmon = mon;
                }
                if urgent {
                    self.set_urgent(w, false);
                }
                self.mons[mon].detach_stack(w, &self.clients);
                self.mons[mon].attach_stack(w);
                self.grab_buttons(w, true);
                self.conn.set_border_color(w, self.drw.border_pixel(SchemeKind::Sel));
                self.set_focus(w);
            }
            None => {
                self.conn.focus_window(None);
                self.conn.set_active_window(None);
            }
        }
        self.mons[self.selmon].sel = win;
        self.draw_bars();
    }

    pub(crate) fn unfocus(&mut self, win: Window, set_focus: bool) {
        if !self.clients.contains_key(&win) {
            return;
        }
        self.grab_buttons(win, false);
        self.conn.set_border_color(win, self.drw.border_pixel(SchemeKind::Norm));
        if set_focus {
            self.conn.focus_window(None);
            self.conn.set_active_window(None);
        }
    }

    /// Hand X input focus to a client, respecting its input hint
    pub(crate) fn set_focus(&mut self, win: Window) {
        let never_focus = self.clients.get(&win).map_or(true, |c| c.never_focus);
        if !never_focus {
            self.conn.focus_window(Some(win));
            self.conn.set_active_window(Some(win));
        }
        self.conn.send_protocol(win, Protocol::TakeFocus);
    }

    pub(crate) fn set_urgent(&mut self, win: Window, urgent: bool) {
        if let Some(c) = self.clients.get_mut(&win) {
            c.is_urgent = urgent;
            self.conn.set_urgency(win, urgent);
        }
    }

    pub(crate) fn set_fullscreen(&mut self, win: Window, fullscreen: bool) {
        let c = match self.clients.get_mut(&win) {
            Some(c) => c,
            None => return,
        };
        if fullscreen && !c.is_fullscreen {
            self.conn.set_fullscreen_state(win, true);
            c.is_fullscreen = true;
            c.old_state = c.is_floating;
            c.oldbw = c.bw;
            c.bw = 0;
            c.is_floating = true;
            let screen = self.mons[c.mon].screen;
            self.resize_client(win, screen);
            self.conn.raise_window(win);
        } else if !fullscreen && c.is_fullscreen {
            self.conn.set_fullscreen_state(win, false);
            c.is_fullscreen = false;
            c.is_floating = c.old_state;
            c.bw = c.oldbw;
            c.geom = c.old;
            let (geom, mon) = (c.geom, c.mon);
            self.resize_client(win, geom);
            self.arrange(Some(mon));
        }
    }

    /// Move a client to another monitor, adopting that monitor's tags
    pub(crate) fn send_mon(&mut self, win: Window, mon: MonId) {
        let from = match self.clients.get(&win) {
            Some(c) if c.mon != mon => c.mon,
            _ => return,
        };
        self.unfocus(win, true);
        self.mons[from].detach(win);
        self.mons[from].detach_stack(win, &self.clients);
        let tags = self.mons[mon].active_tags();
        if let Some(c) = self.clients.get_mut(&win) {
            c.mon = mon;
            c.tags = tags;
        }
        self.mons[mon].attach(win);
        self.mons[mon].attach_stack(win);
        self.focus(None);
        self.arrange(None);
    }

    pub(crate) fn grab_buttons(&mut self, win: Window, focused: bool) {
        self.numlock = self.conn.numlock_mask();
        self.conn.ungrab_buttons(win);
        if !focused {
            self.conn.grab_any_button(win);
        }
        for b in self.config.buttons.iter().filter(|b| b.click == Click::ClientWin) {
            for m in &bindings::lock_variants(self.numlock) {
                self.conn.grab_button(win, b.button, b.mod_mask | m);
            }
        }
    }

    pub(crate) fn grab_keys(&mut self) {
        self.numlock = self.conn.numlock_mask();
        self.conn.ungrab_keys();
        for k in &self.keys {
            for m in &bindings::lock_variants(self.numlock) {
                self.conn.grab_key(k.keysym, k.mod_mask | m);
            }
        }
    }

    pub(crate) fn update_title(&mut self, win: Window) {
        let title = self.conn.title(win);
        if let Some(c) = self.clients.get_mut(&win) {
            c.set_name(title);
        }
    }

    pub(crate) fn update_size_hints(&mut self, win: Window) {
        let hints = self.conn.size_hints(win);
        if let Some(c) = self.clients.get_mut(&win) {
            c.update_size_hints(hints.as_ref());
        }
    }

    pub(crate) fn update_window_type(&mut self, win: Window) {
        if self.conn.requests_fullscreen(win) {
            self.set_fullscreen(win, true);
        }
        if self.conn.is_dialog(win) {
            if let Some(c) = self.clients.get_mut(&win) {
                c.is_floating = true;
            }
        }
    }

    pub(crate) fn update_wm_hints(&mut self, win: Window) {
        let hints = match self.conn.wm_hints(win) {
            Some(h) => h,
            None => return,
        };
        let clear_on_server = self.sel() == Some(win) && hints.urgent();
        if clear_on_server {
            self.conn.set_urgency(win, false);
        }
        if let Some(c) = self.clients.get_mut(&win) {
            if !clear_on_server {
                c.is_urgent = hints.urgent();
            }
            c.never_focus = hints.never_focus();
        }
    }

    pub(crate) fn update_status(&mut self) {
        self.status = self
            .conn
            .root_name()
            .unwrap_or_else(|| format!("{}-{}", WM_NAME, VERSION));
        self.draw_bar(self.selmon);
    }

    pub(crate) fn update_bars(&mut self) {
        for i in 0..self.mons.len() {
            if self.mons[i].barwin != xcb::NONE {
                continue;
            }
            let m = &self.mons[i];
            let r = Rectangle::new(m.area.x, m.by, m.area.w, self.bh);
            self.mons[i].barwin = self.conn.create_bar(r);
        }
    }

    /**
     * Re-read the output layout. Returns whether any monitor changed.
     *
     * Clients of monitors that disappeared end up on the first monitor; the
     * bars of those monitors are destroyed.
     */
    pub(crate) fn update_geom(&mut self) -> bool {
        let mut regions = self.conn.monitor_regions();
        if regions.is_empty() {
            regions.push(Rectangle::new(0, 0, self.screen.0, self.screen.1));
        }

        let result = monitor::reconcile(&mut self.mons, &mut self.clients, &regions, &self.config, self.bh);
        for m in &result.removed {
            if m.barwin != xcb::NONE {
                self.conn.unmap_window(m.barwin);
                self.conn.destroy_window(m.barwin);
            }
        }
        if self.selmon >= self.mons.len() {
            self.selmon = 0;
        }
        if result.dirty {
            info!("monitor layout changed: {} monitor(s)", self.mons.len());
            self.selmon = 0;
            self.selmon = self.win_to_mon(self.conn.root());
        }
        result.dirty
    }
}
