use xcb::Window;

use crate::xconnection::Rectangle;

/// The arrangements a monitor can use
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Layout {
    /// Master column on the left, stack column on the right
    Tiled,
    /// No arrangement: clients keep the geometry they ask for
    Floating,
    /// Every tiled client fills the whole window area
    Monocle,
}

/// Monitor parameters an arrangement reads
#[derive(Debug, Clone, Copy)]
pub struct ArrangeParams {
    pub area: Rectangle,
    pub nmaster: u32,
    pub mfact: f32,
    /// Visible clients on the monitor, floating ones included
    pub visible: usize,
}

impl Layout {
    pub fn symbol(&self) -> &'static str {
        match self {
            Layout::Tiled => "[]=",
            Layout::Floating => "><>",
            Layout::Monocle => "[M]",
        }
    }

    /// Floating is the only layout without an arrange step
    pub fn arranges(&self) -> bool {
        *self != Layout::Floating
    }

    /**
     * Place the tiled clients of a monitor.
     *
     * `tiled` lists the visible, non-floating clients in client-list order
     * with their border widths. `place` applies a requested geometry and
     * returns the outer height the client actually ended up with, which may
     * differ from the request once size hints are honoured.
     *
     * Returns a replacement for the layout symbol when the arrangement wants
     * to show something dynamic.
     */
    pub fn arrange<F>(&self, p: &ArrangeParams, tiled: &[(Window, i32)], place: F) -> Option<String>
    where
        F: FnMut(Window, Rectangle) -> i32,
    {
        match self {
            Layout::Tiled => {
                tile(p, tiled, place);
                None
            }
            Layout::Monocle => monocle(p, tiled, place),
            Layout::Floating => None,
        }
    }
}

fn tile<F>(p: &ArrangeParams, tiled: &[(Window, i32)], mut place: F)
where
    F: FnMut(Window, Rectangle) -> i32,
{
    let n = tiled.len() as u32;
    if n == 0 {
        return;
    }
    let area = p.area;
    let mw = if n > p.nmaster {
        if p.nmaster > 0 {
            (area.w as f32 * p.mfact) as i32
        } else {
            0
        }
    } else {
        area.w
    };

    let (mut my, mut ty) = (0, 0);
    for (i, &(win, bw)) in tiled.iter().enumerate() {
        let i = i as u32;
        if i < p.nmaster {
            let h = (area.h - my) / (n.min(p.nmaster) - i) as i32;
            let r = Rectangle::new(area.x, area.y + my, mw - 2 * bw, h - 2 * bw);
            let outer = place(win, r);
            if my + outer < area.h {
                my += outer;
            }
        } else {
            let h = (area.h - ty) / (n - i) as i32;
            let r = Rectangle::new(area.x + mw, area.y + ty, area.w - mw - 2 * bw, h - 2 * bw);
            let outer = place(win, r);
            if ty + outer < area.h {
                ty += outer;
            }
        }
    }
}

fn monocle<F>(p: &ArrangeParams, tiled: &[(Window, i32)], mut place: F) -> Option<String>
where
    F: FnMut(Window, Rectangle) -> i32,
{
    let area = p.area;
    for &(win, bw) in tiled {
        place(win, Rectangle::new(area.x, area.y, area.w - 2 * bw, area.h - 2 * bw));
    }

    if p.visible > 0 {
        Some(format!("[{}]", p.visible))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn params(nmaster: u32, mfact: f32, visible: usize) -> ArrangeParams {
        ArrangeParams {
            area: Rectangle::new(0, 20, 1000, 780),
            nmaster,
            mfact,
            visible,
        }
    }

    /// Run an arrangement placing every request verbatim
    fn run(layout: Layout, p: &ArrangeParams, tiled: &[(Window, i32)]) -> (HashMap<Window, Rectangle>, Option<String>) {
        let mut placed = HashMap::new();
        let bws: HashMap<Window, i32> = tiled.iter().copied().collect();
        let sym = layout.arrange(p, tiled, |win, r| {
            placed.insert(win, r);
            r.h + 2 * bws[&win]
        });
        (placed, sym)
    }

    #[test]
    fn one_master_two_stacked() {
        let p = params(1, 0.5, 3);
        let (placed, sym) = run(Layout::Tiled, &p, &[(1, 0), (2, 0), (3, 0)]);
        assert!(sym.is_none());
        assert_eq!(placed[&1], Rectangle::new(0, 20, 500, 780));
        assert_eq!(placed[&2], Rectangle::new(500, 20, 500, 390));
        assert_eq!(placed[&3], Rectangle::new(500, 410, 500, 390));
    }

    #[test]
    fn columns_cover_the_area() {
        for n in 1..8usize {
            for nmaster in 0..4u32 {
                let p = params(nmaster, 0.55, n);
                let tiled: Vec<(Window, i32)> = (0..n as u32).map(|w| (w, 1)).collect();
                let (placed, _) = run(Layout::Tiled, &p, &tiled);

                let master: Vec<&Rectangle> = (0..n as u32).filter(|w| *w < nmaster).map(|w| &placed[&w]).collect();
                let stack: Vec<&Rectangle> = (0..n as u32).filter(|w| *w >= nmaster).map(|w| &placed[&w]).collect();
                let outer_h = |rs: &[&Rectangle]| rs.iter().map(|r| r.h + 2).sum::<i32>();

                if !master.is_empty() {
                    assert_eq!(outer_h(&master), p.area.h);
                }
                if !stack.is_empty() {
                    assert_eq!(outer_h(&stack), p.area.h);
                }

                let mw = master.first().map_or(0, |r| r.w + 2);
                let sw = stack.first().map_or(0, |r| r.w + 2);
                if n as u32 > nmaster {
                    assert_eq!(mw + sw, p.area.w, "n={} nmaster={}", n, nmaster);
                } else {
                    assert_eq!(mw, p.area.w);
                    assert_eq!(sw, 0);
                }
            }
        }
    }

    #[test]
    fn last_client_absorbs_rounding() {
        let p = params(1, 0.5, 4);
        let (placed, _) = run(Layout::Tiled, &p, &[(1, 0), (2, 0), (3, 0), (4, 0)]);
        // 780 / 3 = 260 for each of the stacked clients
        assert_eq!(placed[&2].h, 260);
        assert_eq!(placed[&4].y, 20 + 520);
        assert_eq!(placed[&4].h, 260);

        let mut p = params(1, 0.5, 3);
        p.area.h = 781;
        let (placed, _) = run(Layout::Tiled, &p, &[(1, 0), (2, 0), (3, 0)]);
        assert_eq!(placed[&2].h, 390);
        assert_eq!(placed[&3].h, 391);
    }

    #[test]
    fn oversized_results_do_not_advance() {
        // a client that refuses to shrink pushes no one off the screen
        let p = params(0, 0.5, 2);
        let mut ys = Vec::new();
        Layout::Tiled.arrange(&p, &[(1, 0), (2, 0)], |_, r| {
            ys.push(r.y);
            2000
        });
        assert_eq!(ys, vec![20, 20]);
    }

    #[test]
    fn monocle_fills_area_and_counts() {
        let p = params(1, 0.5, 3);
        let (placed, sym) = run(Layout::Monocle, &p, &[(1, 2), (2, 0)]);
        assert_eq!(placed[&1], Rectangle::new(0, 20, 996, 776));
        assert_eq!(placed[&2], Rectangle::new(0, 20, 1000, 780));
        assert_eq!(sym.as_deref(), Some("[3]"));

        let (_, sym) = run(Layout::Monocle, &params(1, 0.5, 0), &[]);
        assert!(sym.is_none());
    }

    #[test]
    fn floating_touches_nothing() {
        let (placed, sym) = run(Layout::Floating, &params(1, 0.5, 2), &[(1, 0), (2, 0)]);
        assert!(placed.is_empty());
        assert!(sym.is_none());
        assert!(!Layout::Floating.arranges());
        assert!(Layout::Tiled.arranges());
    }
}
