//! The per-monitor status bar.
use crate::{
    draw::SchemeKind,
    monitor::MonId,
    tag::TagMask,
    wm::WindowManager,
    xconnection::XConn,
};

impl<'a, X: XConn> WindowManager<'a, X> {
    /**
     * Render the bar of monitor `mon`.
     *
     * From left to right: one cell per tag (highlighted when active, inverted
     * when a client on it is urgent, with a small box when occupied), the
     * layout symbol, then the title of the monitor's selection. The selected
     * monitor also shows the status text on the right.
     */
    pub(crate) fn draw_bar(&mut self, mon: MonId) {
        let m = match self.mons.get(mon) {
            Some(m) if m.showbar && m.barwin != xcb::NONE => m,
            _ => return,
        };
        let fh = self.drw.font_height();
        let boxs = fh / 9;
        let boxw = fh / 6 + 2;
        let (bh, lrpad) = (self.bh, self.lrpad);
        let is_sel_mon = mon == self.selmon;

        let mut tw = 0;
        if is_sel_mon {
            tw = self.textw(&self.status) - lrpad + 2;
            self.drw.set_scheme(SchemeKind::Norm);
            self.drw.text(m.area.w - tw, 0, tw, bh, 0, &self.status, false);
        }

        let (mut occ, mut urg): (TagMask, TagMask) = (0, 0);
        for c in m.clients.iter().filter_map(|w| self.clients.get(w)) {
            occ |= c.tags;
            if c.is_urgent {
                urg |= c.tags;
            }
        }
        let clients = &self.clients;
        let sel = m.sel.and_then(|w| clients.get(&w));
        let active = m.active_tags();

        let mut x = 0;
        for (i, name) in self.config.tags.iter().enumerate() {
            let bit = 1 << i;
            let w = self.drw.text_width(name) + lrpad;
            self.drw
                .set_scheme(if active & bit != 0 { SchemeKind::Sel } else { SchemeKind::Norm });
            self.drw.text(x, 0, w, bh, lrpad / 2, name, urg & bit != 0);
            if occ & bit != 0 {
                let filled = is_sel_mon && sel.map_or(false, |c| c.tags & bit != 0);
                self.drw.rect(x + boxs, boxs, boxw, boxw, filled, urg & bit != 0);
            }
            x += w;
        }

        let w = self.drw.text_width(&m.ltsymbol) + lrpad;
        self.blw = w;
        self.drw.set_scheme(SchemeKind::Norm);
        x = self.drw.text(x, 0, w, bh, lrpad / 2, &m.ltsymbol, false);

        let w = m.area.w - tw - x;
        if w > bh {
            match sel {
                Some(c) => {
                    self.drw
                        .set_scheme(if is_sel_mon { SchemeKind::Sel } else { SchemeKind::Norm });
                    self.drw.text(x, 0, w, bh, lrpad / 2, &c.name, false);
                    if c.is_floating {
                        self.drw.rect(x + boxs, boxs, boxw, boxw, c.is_fixed, false);
                    }
                }
                None => {
                    self.drw.set_scheme(SchemeKind::Norm);
                    self.drw.rect(x, 0, w, bh, true, true);
                }
            }
        }
        self.drw.map(m.barwin, 0, 0, m.area.w, bh);
    }

    pub(crate) fn draw_bars(&mut self) {
        for m in 0..self.mons.len() {
            self.draw_bar(m);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bindings::Action,
        config::Config,
        mock::{MockConn, MockDraw, MockWindow, Op},
        wm::WindowManager,
        xconnection::XEvent,
    };

    #[test]
    fn bar_shows_tags_symbol_title_and_status() {
        let conn = MockConn::single();
        let draw = MockDraw::default();
        let ops = draw.ops();
        let mut wm = WindowManager::new(&conn, Box::new(draw), Config::default()).unwrap();
        conn.add_window(10, MockWindow::new().title("editor"));
        wm.handle_event(XEvent::MapRequest { id: 10 }).unwrap();

        ops.borrow_mut().clear();
        wm.draw_bar(0);
        let texts: Vec<String> = ops
            .borrow()
            .iter()
            .filter_map(|op| match op {
                Op::Text(_, t) => Some(t.clone()),
                _ => None,
            })
            .collect();
        let status = wm.status.clone();
        assert_eq!(texts[0], status);
        assert_eq!(&texts[1..10], &["1", "2", "3", "4", "5", "6", "7", "8", "9"]);
        assert_eq!(texts[10], "[]=");
        assert_eq!(texts[11], "editor");
        assert_eq!(wm.blw, wm.textw("[]="));
    }

    #[test]
    fn hidden_bar_is_not_drawn() {
        let conn = MockConn::single();
        let draw = MockDraw::default();
        let maps = draw.maps();
        let mut wm = WindowManager::new(&conn, Box::new(draw), Config::default()).unwrap();
        wm.run_action(&Action::ToggleBar).unwrap();
        let before = maps.borrow().len();
        wm.draw_bars();
        assert_eq!(maps.borrow().len(), before);
    }

    #[test]
    fn occupied_and_urgent_tags_are_marked() {
        let conn = MockConn::single();
        let draw = MockDraw::default();
        let ops = draw.ops();
        let mut wm = WindowManager::new(&conn, Box::new(draw), Config::default()).unwrap();
        conn.add_window(10, MockWindow::new());
        conn.add_window(11, MockWindow::new());
        wm.handle_event(XEvent::MapRequest { id: 10 }).unwrap();
        wm.handle_event(XEvent::MapRequest { id: 11 }).unwrap();
        wm.run_action(&Action::Tag(0b100)).unwrap();
        wm.set_urgent(11, true);

        ops.borrow_mut().clear();
        wm.draw_bar(0);
        let ops = ops.borrow();
        let inverted: Vec<&String> = ops
            .iter()
            .filter_map(|op| match op {
                Op::InvertedText(_, t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(inverted, vec!["3"]);
        // one box per occupied tag
        let boxes = ops.iter().filter(|op| matches!(op, Op::Rect(..))).count();
        assert_eq!(boxes, 2);
    }
}
