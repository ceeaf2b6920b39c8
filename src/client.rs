use xcb::Window;

use crate::{
    monitor::MonId,
    tag::{self, TagMask},
    xconnection::Rectangle,
};

/// Placeholder used when a window carries no usable name or class
pub const BROKEN: &str = "broken";

/// Titles are clipped to this many bytes
const MAX_NAME_LEN: usize = 255;

// WM_SIZE_HINTS flags (ICCCM 4.1.2.3)
const P_MIN_SIZE: u32 = 1 << 4;
const P_MAX_SIZE: u32 = 1 << 5;
const P_RESIZE_INC: u32 = 1 << 6;
const P_ASPECT: u32 = 1 << 7;
const P_BASE_SIZE: u32 = 1 << 8;

// WM_HINTS flags (ICCCM 4.1.2.4)
pub const INPUT_HINT: u32 = 1;
pub const URGENCY_HINT: u32 = 1 << 8;

/// The WM_NORMAL_HINTS property as sent by the client
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct NormalHints {
    pub flags: u32,
    pub min: (i32, i32),
    pub max: (i32, i32),
    pub inc: (i32, i32),
    pub min_aspect: (i32, i32),
    pub max_aspect: (i32, i32),
    pub base: (i32, i32),
}

impl NormalHints {
    /// Decode the raw CARD32 list of a WM_SIZE_HINTS property. Pre-ICCCM clients
    /// send 15 values without base size or gravity.
    pub fn from_raw(raw: &[u32]) -> Option<NormalHints> {
        if raw.len() < 15 {
            return None;
        }
        let v = |i: usize| raw.get(i).map_or(0, |&x| x as i32);
        let mut flags = raw[0];
        if raw.len() < 17 {
            flags &= !P_BASE_SIZE;
        }

        Some(NormalHints {
            flags,
            min: (v(5), v(6)),
            max: (v(7), v(8)),
            inc: (v(9), v(10)),
            min_aspect: (v(11), v(12)),
            max_aspect: (v(13), v(14)),
            base: (v(15), v(16)),
        })
    }

    fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// The subset of WM_HINTS the window manager acts on
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct WmHints {
    pub flags: u32,
    pub input: bool,
}

impl WmHints {
    pub fn from_raw(raw: &[u32]) -> Option<WmHints> {
        let flags = *raw.first()?;
        Some(WmHints {
            flags,
            input: raw.get(1).map_or(true, |&i| i != 0),
        })
    }

    pub fn urgent(&self) -> bool {
        self.flags & URGENCY_HINT != 0
    }

    /// Input focus must never be assigned directly when the input hint is false
    pub fn never_focus(&self) -> bool {
        self.flags & INPUT_HINT != 0 && !self.input
    }
}

/// Resolved geometry constraints for a client
#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct SizeHints {
    pub basew: i32,
    pub baseh: i32,
    pub incw: i32,
    pub inch: i32,
    pub maxw: i32,
    pub maxh: i32,
    pub minw: i32,
    pub minh: i32,
    pub mina: f32,
    pub maxa: f32,
}

impl SizeHints {
    /// Missing hints resolve to all zeroes, meaning "unconstrained".
    pub fn from_normal_hints(hints: Option<&NormalHints>) -> SizeHints {
        let hints = match hints {
            Some(h) => h,
            None => return SizeHints::default(),
        };
        let mut s = SizeHints::default();

        if hints.has(P_BASE_SIZE) {
            s.basew = hints.base.0;
            s.baseh = hints.base.1;
        } else if hints.has(P_MIN_SIZE) {
            s.basew = hints.min.0;
            s.baseh = hints.min.1;
        }
        if hints.has(P_RESIZE_INC) {
            s.incw = hints.inc.0;
            s.inch = hints.inc.1;
        }
        if hints.has(P_MAX_SIZE) {
            s.maxw = hints.max.0;
            s.maxh = hints.max.1;
        }
        if hints.has(P_MIN_SIZE) {
            s.minw = hints.min.0;
            s.minh = hints.min.1;
        } else if hints.has(P_BASE_SIZE) {
            s.minw = hints.base.0;
            s.minh = hints.base.1;
        }
        if hints.has(P_ASPECT) && hints.min_aspect.0 != 0 && hints.max_aspect.1 != 0 {
            s.mina = hints.min_aspect.1 as f32 / hints.min_aspect.0 as f32;
            s.maxa = hints.max_aspect.0 as f32 / hints.max_aspect.1 as f32;
        }

        s
    }

    /// A window whose min and max sizes coincide can't be tiled meaningfully
    pub fn is_fixed(&self) -> bool {
        self.maxw != 0 && self.maxh != 0 && self.maxw == self.minw && self.maxh == self.minh
    }
}

/// Everything outside the client that constrains where it may be placed
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    /// Full extent of the X screen
    pub screen: (i32, i32),
    /// Window area of the client's monitor
    pub area: Rectangle,
    /// Minimum extent on either axis
    pub bar_height: i32,
    /// Whether the size hints are honoured for this placement
    pub respect_hints: bool,
}

/**
 * A managed top level window.
 *
 * Holds the current and previous geometry together with the state flags used
 * when deciding which clients to show on a monitor and how they are tiled.
 * Clients are owned by the window manager and addressed by their X window id;
 * monitors refer to them by that id.
 */
#[derive(Debug, PartialEq, Clone)]
pub struct Client {
    pub win: Window,
    pub name: String,
    pub geom: Rectangle,
    pub old: Rectangle,
    pub hints: SizeHints,
    pub bw: i32,
    pub oldbw: i32,
    pub tags: TagMask,
    pub is_fixed: bool,
    pub is_floating: bool,
    pub is_urgent: bool,
    pub never_focus: bool,
    pub old_state: bool,
    pub is_fullscreen: bool,
    pub mon: MonId,
}

impl Client {
    /// Track a new window at its current geometry on monitor `mon`
    pub fn new(win: Window, geom: Rectangle, border_width: i32, mon: MonId) -> Client {
        Client {
            win,
            name: String::new(),
            geom,
            old: geom,
            hints: SizeHints::default(),
            bw: 0,
            oldbw: border_width,
            tags: 0,
            is_fixed: false,
            is_floating: false,
            is_urgent: false,
            never_focus: false,
            old_state: false,
            is_fullscreen: false,
            mon,
        }
    }

    /// Width including both borders
    pub fn full_width(&self) -> i32 {
        self.geom.w + 2 * self.bw
    }

    /// Height including both borders
    pub fn full_height(&self) -> i32 {
        self.geom.h + 2 * self.bw
    }

    pub fn visible_on(&self, active: TagMask) -> bool {
        tag::intersects(self.tags, active)
    }

    /// Set the title, falling back to a placeholder for empty or missing names.
    pub fn set_name(&mut self, name: Option<String>) {
        let mut name = name.unwrap_or_default();
        if name.len() > MAX_NAME_LEN {
            let mut end = MAX_NAME_LEN;
            while !name.is_char_boundary(end) {
                end -= 1;
            }
            name.truncate(end);
        }
        self.name = if name.is_empty() { BROKEN.to_string() } else { name };
    }

    pub fn update_size_hints(&mut self, hints: Option<&NormalHints>) {
        self.hints = SizeHints::from_normal_hints(hints);
        self.is_fixed = self.hints.is_fixed();
    }

    /// Record a new geometry, remembering the previous one.
    pub fn set_geometry(&mut self, r: Rectangle) {
        self.old = self.geom;
        self.geom = r;
    }

    /**
     * Constrain a requested geometry for this client.
     *
     * Returns the resolved rectangle and whether it differs from the current
     * geometry. No requests are made: the caller applies the result.
     */
    pub fn apply_size_hints(&self, r: Rectangle, interact: bool, b: &Bounds) -> (Rectangle, bool) {
        let Rectangle { mut x, mut y, mut w, mut h } = r;
        let (sw, sh) = b.screen;
        let m = b.area;

        w = w.max(1);
        h = h.max(1);
        if interact {
            if x > sw {
                x = sw - self.full_width();
            }
            if y > sh {
                y = sh - self.full_height();
            }
            if x + w + 2 * self.bw < 0 {
                x = 0;
            }
            if y + h + 2 * self.bw < 0 {
                y = 0;
            }
        } else {
            if x >= m.x + m.w {
                x = m.x + m.w - self.full_width();
            }
            if y >= m.y + m.h {
                y = m.y + m.h - self.full_height();
            }
            if x + w + 2 * self.bw <= m.x {
                x = m.x;
            }
            if y + h + 2 * self.bw <= m.y {
                y = m.y;
            }
        }
        h = h.max(b.bar_height);
        w = w.max(b.bar_height);

        if b.respect_hints {
            let s = &self.hints;
            // see last two sentences in ICCCM 4.1.2.3
            let base_is_min = s.basew == s.minw && s.baseh == s.minh;
            if !base_is_min {
                w -= s.basew;
                h -= s.baseh;
            }
            if s.mina > 0.0 && s.maxa > 0.0 {
                if s.maxa < w as f32 / h as f32 {
                    w = (h as f32 * s.maxa + 0.5) as i32;
                } else if s.mina < h as f32 / w as f32 {
                    h = (w as f32 * s.mina + 0.5) as i32;
                }
            }
            if base_is_min {
                w -= s.basew;
                h -= s.baseh;
            }
            if s.incw != 0 {
                w -= w % s.incw;
            }
            if s.inch != 0 {
                h -= h % s.inch;
            }
            w = (w + s.basew).max(s.minw);
            h = (h + s.baseh).max(s.minh);
            if s.maxw != 0 {
                w = w.min(s.maxw);
            }
            if s.maxh != 0 {
                h = h.min(s.maxh);
            }
        }

        let resolved = Rectangle::new(x, y, w, h);
        (resolved, resolved != self.geom)
    }
}
