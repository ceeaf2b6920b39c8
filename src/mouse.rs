//! Moving and resizing the selected client with the pointer.
use anyhow::Result;
use xcb::Window;

use crate::{
    wm::WindowManager,
    xconnection::{CursorKind, Rectangle, XConn, XEvent},
};

/// Minimum interval between two handled motion events, in milliseconds
const MOTION_INTERVAL: u32 = 1000 / 60;

impl<'a, X: XConn> WindowManager<'a, X> {
    /**
     * Pump events until the grabbed button is released, calling `on_motion`
     * with the root coordinates of each (throttled) motion event.
     *
     * Configure, expose and map requests are still served while the pointer
     * is grabbed. Everything else is set aside and handled once the main
     * loop resumes.
     */
    fn drag<F>(&mut self, mut on_motion: F) -> Result<()>
    where
        F: FnMut(&mut Self, i32, i32),
    {
        let mut last = 0u32;
        loop {
            match self.conn.next_event()? {
                XEvent::ButtonRelease { .. } => return Ok(()),
                XEvent::MotionNotify { root_x, root_y, time, .. } => {
                    if time.wrapping_sub(last) <= MOTION_INTERVAL {
                        continue;
                    }
                    last = time;
                    on_motion(self, root_x, root_y);
                }
                e @ XEvent::ConfigureRequest(_) | e @ XEvent::Expose { .. } | e @ XEvent::MapRequest { .. } => {
                    self.handle_event(e)?
                }
                e => self.deferred.push_back(e),
            }
        }
    }

    /// The selection if it may be dragged, raised to the top
    fn drag_target(&mut self) -> Option<Window> {
        let sel = self.sel()?;
        if self.clients.get(&sel).map_or(true, |c| c.is_fullscreen) {
            return None;
        }
        self.restack(self.selmon);
        Some(sel)
    }

    /// Once a drag ends over another monitor the client moves there
    fn drop_on_monitor(&mut self, win: Window) {
        let geom = match self.clients.get(&win) {
            Some(c) => c.geom,
            None => return,
        };
        let m = self.rect_to_mon(geom);
        if m != self.selmon {
            self.send_mon(win, m);
            self.selmon = m;
            self.focus(None);
        }
    }

    /// A tiled client dragged further than the snap distance starts floating
    fn float_if_dragged(&mut self, win: Window, dx: i32, dy: i32) {
        let snap = self.config.snap;
        let floating = self.clients.get(&win).map_or(true, |c| c.is_floating);
        if !floating && self.mons[self.selmon].arranges() && (dx.abs() > snap || dy.abs() > snap) {
            self.toggle_floating();
        }
    }

    /// Apply `r` if the client is free to move under the current layout
    fn drag_resize(&mut self, win: Window, r: Rectangle) {
        let floating = self.clients.get(&win).map_or(false, |c| c.is_floating);
        if floating || !self.mons[self.selmon].arranges() {
            self.resize(win, r, true);
        }
    }

    pub(crate) fn move_mouse(&mut self) -> Result<()> {
        let win = match self.drag_target() {
            Some(w) => w,
            None => return Ok(()),
        };
        let origin = self.clients[&win].geom;
        if !self.conn.grab_pointer(CursorKind::Move) {
            return Ok(());
        }
        let (px, py) = match self.conn.query_pointer() {
            Some(p) => p,
            None => {
                self.conn.ungrab_pointer();
                return Ok(());
            }
        };

        self.drag(|wm, x, y| {
            let (current, w, h) = match wm.clients.get(&win) {
                Some(c) => (c.geom, c.full_width(), c.full_height()),
                None => return,
            };
            let area = wm.mons[wm.selmon].area;
            let snap = wm.config.snap;

            let mut nx = origin.x + (x - px);
            let mut ny = origin.y + (y - py);
            if (area.x - nx).abs() < snap {
                nx = area.x;
            } else if ((area.x + area.w) - (nx + w)).abs() < snap {
                nx = area.x + area.w - w;
            }
            if (area.y - ny).abs() < snap {
                ny = area.y;
            } else if ((area.y + area.h) - (ny + h)).abs() < snap {
                ny = area.y + area.h - h;
            }

            wm.float_if_dragged(win, nx - current.x, ny - current.y);
            wm.drag_resize(win, Rectangle::new(nx, ny, current.w, current.h));
        })?;

        self.conn.ungrab_pointer();
        self.drop_on_monitor(win);
        Ok(())
    }

    pub(crate) fn resize_mouse(&mut self) -> Result<()> {
        let win = match self.drag_target() {
            Some(w) => w,
            None => return Ok(()),
        };
        let (origin, bw) = {
            let c = &self.clients[&win];
            (c.geom, c.bw)
        };
        if !self.conn.grab_pointer(CursorKind::Resize) {
            return Ok(());
        }
        // the pointer is kept on the bottom right corner
        self.conn.warp_pointer(win, origin.w + bw - 1, origin.h + bw - 1);

        self.drag(|wm, x, y| {
            let (current, mon) = match wm.clients.get(&win) {
                Some(c) => (c.geom, c.mon),
                None => return,
            };
            let home = wm.mons[mon].area;
            let area = wm.mons[wm.selmon].area;

            let nw = (x - origin.x - 2 * bw + 1).max(1);
            let nh = (y - origin.y - 2 * bw + 1).max(1);
            let inside = home.x + nw >= area.x
                && home.x + nw <= area.x + area.w
                && home.y + nh >= area.y
                && home.y + nh <= area.y + area.h;
            if inside {
                wm.float_if_dragged(win, nw - current.w, nh - current.h);
            }
            wm.drag_resize(win, Rectangle::new(current.x, current.y, nw, nh));
        })?;

        if let Some(c) = self.clients.get(&win) {
            self.conn.warp_pointer(win, c.geom.w + c.bw - 1, c.geom.h + c.bw - 1);
        }
        self.conn.ungrab_pointer();
        self.drain_enter_events();
        self.drop_on_monitor(win);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bindings::Action,
        config::Config,
        mock::{MockConn, MockDraw, MockWindow},
    };

    fn motion(conn: &MockConn, x: i32, y: i32, time: u32) -> XEvent {
        XEvent::MotionNotify {
            id: conn.root(),
            root_x: x,
            root_y: y,
            time,
        }
    }

    fn floating_client(conn: &MockConn) -> WindowManager<'_, MockConn> {
        let mut wm = WindowManager::new(conn, Box::new(MockDraw::default()), Config::default()).unwrap();
        conn.add_window(10, MockWindow::new().geometry(Rectangle::new(300, 300, 200, 100)));
        wm.handle_event(XEvent::MapRequest { id: 10 }).unwrap();
        wm.run_action(&Action::ToggleFloating).unwrap();
        wm
    }

    #[test]
    fn move_follows_pointer_and_snaps() {
        let conn = MockConn::single();
        let mut wm = floating_client(&conn);
        let start = wm.clients[&10].geom;
        conn.set_pointer(500, 500);
        conn.push_events(vec![
            motion(&conn, 600, 550, 100),
            // throttled
            motion(&conn, 900, 900, 105),
            XEvent::ButtonRelease { id: conn.root() },
        ]);
        wm.run_action(&Action::MoveMouse).unwrap();
        let geom = wm.clients[&10].geom;
        assert_eq!((geom.x, geom.y), (start.x + 100, start.y + 50));

        // close enough to the left edge of the window area to snap
        let area = wm.mons[0].area;
        conn.set_pointer(500, 500);
        conn.push_events(vec![
            motion(&conn, 500 - geom.x + area.x + 10, 500, 200),
            XEvent::ButtonRelease { id: conn.root() },
        ]);
        wm.run_action(&Action::MoveMouse).unwrap();
        assert_eq!(wm.clients[&10].geom.x, area.x);
    }

    #[test]
    fn dragging_a_tiled_client_floats_it() {
        let conn = MockConn::single();
        let mut wm = WindowManager::new(&conn, Box::new(MockDraw::default()), Config::default()).unwrap();
        conn.add_window(10, MockWindow::new());
        wm.handle_event(XEvent::MapRequest { id: 10 }).unwrap();
        assert!(!wm.clients[&10].is_floating);

        conn.set_pointer(100, 100);
        conn.push_events(vec![motion(&conn, 110, 110, 100), XEvent::ButtonRelease { id: conn.root() }]);
        wm.run_action(&Action::MoveMouse).unwrap();
        assert!(!wm.clients[&10].is_floating);

        conn.push_events(vec![motion(&conn, 300, 300, 100), XEvent::ButtonRelease { id: conn.root() }]);
        wm.run_action(&Action::MoveMouse).unwrap();
        assert!(wm.clients[&10].is_floating);
    }

    #[test]
    fn resize_tracks_bottom_right_corner() {
        let conn = MockConn::single();
        let mut wm = floating_client(&conn);
        let start = wm.clients[&10].geom;
        let bw = wm.clients[&10].bw;
        conn.push_events(vec![
            motion(&conn, start.x + 400, start.y + 300, 100),
            XEvent::ButtonRelease { id: conn.root() },
        ]);
        wm.run_action(&Action::ResizeMouse).unwrap();
        let geom = wm.clients[&10].geom;
        assert_eq!((geom.x, geom.y), (start.x, start.y));
        assert_eq!((geom.w, geom.h), (400 - 2 * bw + 1, 300 - 2 * bw + 1));
    }

    #[test]
    fn other_events_wait_for_the_release() {
        let conn = MockConn::single();
        let mut wm = floating_client(&conn);
        conn.set_pointer(0, 0);
        let unmap = XEvent::UnmapNotify { id: 10, synthetic: true };
        conn.push_events(vec![unmap.clone(), XEvent::ButtonRelease { id: conn.root() }]);
        wm.run_action(&Action::MoveMouse).unwrap();
        assert_eq!(wm.deferred.pop_front(), Some(unmap));
    }

    #[test]
    fn enter_events_during_a_resize_are_dropped() {
        let conn = MockConn::single();
        let mut wm = floating_client(&conn);
        let enter = XEvent::Enter {
            id: 10,
            normal: true,
            inferior: false,
            is_root: false,
        };
        let unmap = XEvent::UnmapNotify { id: 10, synthetic: true };
        conn.push_events(vec![enter, unmap.clone(), XEvent::ButtonRelease { id: conn.root() }]);
        wm.run_action(&Action::ResizeMouse).unwrap();
        assert!(!wm.deferred.iter().any(|e| matches!(e, XEvent::Enter { .. })));
        assert_eq!(wm.deferred.pop_front(), Some(unmap));
    }

    #[test]
    fn dropping_on_another_monitor_sends_the_client() {
        let conn = MockConn::new(vec![Rectangle::new(0, 0, 1000, 800), Rectangle::new(1000, 0, 800, 600)]);
        let mut wm = floating_client(&conn);
        wm.mons[1].view(0b100);
        assert_eq!(wm.clients[&10].mon, 0);

        conn.set_pointer(100, 100);
        conn.push_events(vec![motion(&conn, 1400, 100, 100), XEvent::ButtonRelease { id: conn.root() }]);
        wm.run_action(&Action::MoveMouse).unwrap();

        assert_eq!(wm.selmon, 1);
        assert!(wm.mons[1].clients.contains(&10));
        assert!(!wm.mons[0].clients.contains(&10));
        assert_eq!(wm.clients[&10].mon, 1);
        assert_eq!(wm.clients[&10].tags, wm.mons[1].active_tags());
        assert_eq!(wm.sel(), Some(10));
    }

    #[test]
    fn fullscreen_clients_are_not_dragged() {
        let conn = MockConn::single();
        let mut wm = floating_client(&conn);
        wm.run_action(&Action::ToggleFullscreen).unwrap();
        // no events scripted: a drag would fail on the empty queue
        wm.run_action(&Action::MoveMouse).unwrap();
        wm.run_action(&Action::ResizeMouse).unwrap();
    }
}
