use std::collections::HashMap;

use xcb::Window;

use crate::{
    client::Client,
    config::Config,
    layout::Layout,
    tag::TagMask,
    xconnection::Rectangle,
};

/// Index of a monitor in the window manager's monitor list
pub type MonId = usize;

/**
 * One physical output.
 *
 * A monitor owns two orderings of its clients: `clients` is the tiling order
 * and `stack` the focus history. Both hold window ids, most recent first.
 */
#[derive(Debug, Clone)]
pub struct Monitor {
    pub num: usize,
    pub ltsymbol: String,
    pub mfact: f32,
    pub nmaster: u32,
    /// Bar y position, negative when hidden
    pub by: i32,
    /// Screen geometry
    pub screen: Rectangle,
    /// Screen minus the bar
    pub area: Rectangle,
    pub seltags: usize,
    pub sellt: usize,
    pub tagset: [TagMask; 2],
    pub showbar: bool,
    pub topbar: bool,
    pub clients: Vec<Window>,
    pub stack: Vec<Window>,
    pub sel: Option<Window>,
    /// xcb::NONE until the bar window is created
    pub barwin: Window,
    pub lt: [Layout; 2],
}

impl Monitor {
    pub fn new(config: &Config) -> Monitor {
        let first = config.layouts.first().copied().unwrap_or(Layout::Tiled);
        let second = config.layouts.get(1).copied().unwrap_or(first);
        Monitor {
            num: 0,
            ltsymbol: first.symbol().to_string(),
            mfact: config.mfact,
            nmaster: config.nmaster,
            by: 0,
            screen: Rectangle::default(),
            area: Rectangle::default(),
            seltags: 0,
            sellt: 0,
            tagset: [1, 1],
            showbar: config.showbar,
            topbar: config.topbar,
            clients: vec![],
            stack: vec![],
            sel: None,
            barwin: xcb::NONE,
            lt: [first, second],
        }
    }

    pub fn active_tags(&self) -> TagMask {
        self.tagset[self.seltags]
    }

    pub fn layout(&self) -> Layout {
        self.lt[self.sellt]
    }

    pub fn arranges(&self) -> bool {
        self.layout().arranges()
    }

    /// Prepend to the tiling order
    pub fn attach(&mut self, win: Window) {
        self.clients.insert(0, win);
    }

    pub fn detach(&mut self, win: Window) {
        self.clients.retain(|w| *w != win);
    }

    /// Prepend to the focus history
    pub fn attach_stack(&mut self, win: Window) {
        self.stack.insert(0, win);
    }

    /// Remove from the focus history. If `win` was selected, the selection
    /// moves to the most recently focused client that is still visible.
    pub fn detach_stack(&mut self, win: Window, clients: &HashMap<Window, Client>) {
        self.stack.retain(|w| *w != win);
        if self.sel == Some(win) {
            let active = self.active_tags();
            self.sel = self
                .stack
                .iter()
                .copied()
                .find(|w| clients.get(w).map_or(false, |c| c.visible_on(active)));
        }
    }

    /**
     * Switch the active tag-set.
     *
     * A differing mask goes into the other slot of the pair so that the
     * previous set stays one toggle away. A zero mask flips back to that
     * previous set. Returns false when nothing changed.
     */
    pub fn view(&mut self, mask: TagMask) -> bool {
        if mask == self.active_tags() {
            return false;
        }
        self.seltags ^= 1;
        if mask != 0 {
            self.tagset[self.seltags] = mask;
        }
        true
    }

    /// XOR `mask` into the active tag-set unless that would leave no tag
    /// visible
    pub fn toggle_view(&mut self, mask: TagMask) -> bool {
        let tags = self.active_tags() ^ mask;
        if tags == 0 {
            return false;
        }
        self.tagset[self.seltags] = tags;
        true
    }

    /// Select `layout`, or flip to the other remembered one when `None`
    pub fn set_layout(&mut self, layout: Option<Layout>) {
        if layout.map_or(true, |l| l != self.layout()) {
            self.sellt ^= 1;
        }
        if let Some(l) = layout {
            self.lt[self.sellt] = l;
        }
        self.ltsymbol = self.layout().symbol().to_string();
    }

    /**
     * Adjust the master fraction.
     *
     * Values below 1.0 are added to the current fraction, values of 1.0 and
     * above set it absolutely (minus 1.0). Results outside [0.05, 0.95] are
     * rejected.
     */
    pub fn set_mfact(&mut self, delta: f32) -> bool {
        let f = if delta < 1.0 { delta + self.mfact } else { delta - 1.0 };
        if f < 0.05 || f > 0.95 {
            return false;
        }
        self.mfact = f;
        true
    }

    pub fn inc_nmaster(&mut self, delta: i32) {
        self.nmaster = (self.nmaster as i32 + delta).max(0) as u32;
    }

    /// Recompute the window area and bar position from the screen geometry
    pub fn update_bar_pos(&mut self, bar_height: i32) {
        self.area.y = self.screen.y;
        self.area.h = self.screen.h;
        if self.showbar {
            self.area.h -= bar_height;
            self.by = if self.topbar { self.area.y } else { self.area.y + self.area.h };
            if self.topbar {
                self.area.y += bar_height;
            }
        } else {
            self.by = -bar_height;
        }
    }
}

/// Drop duplicated screen geometries, keeping the first occurrence
pub fn unique_regions(regions: &[Rectangle]) -> Vec<Rectangle> {
    let mut unique: Vec<Rectangle> = Vec::with_capacity(regions.len());
    for r in regions {
        if !unique.contains(r) {
            unique.push(*r);
        }
    }
    unique
}

/// Result of matching the monitor list against the detected outputs
#[derive(Debug, Default)]
pub struct Reconciled {
    pub dirty: bool,
    /// Monitors that no longer have an output. Their clients have already
    /// been moved to the first monitor.
    pub removed: Vec<Monitor>,
}

/**
 * Bring `mons` in line with the detected output `regions`.
 *
 * New outputs get a fresh monitor appended, changed geometries are updated in
 * place, and surplus monitors are removed from the tail with their clients
 * moved to the first monitor and re-tagged to its active tag-set. When nothing
 * differs nothing is touched and the result is not dirty.
 */
pub fn reconcile(
    mons: &mut Vec<Monitor>,
    clients: &mut HashMap<Window, Client>,
    regions: &[Rectangle],
    config: &Config,
    bar_height: i32,
) -> Reconciled {
    let regions = unique_regions(regions);
    let mut result = Reconciled::default();
    if regions.is_empty() {
        return result;
    }

    while mons.len() < regions.len() {
        mons.push(Monitor::new(config));
    }

    for (i, (m, r)) in mons.iter_mut().zip(regions.iter()).enumerate() {
        if m.screen != *r {
            result.dirty = true;
            m.num = i;
            m.screen = *r;
            m.area = *r;
            m.update_bar_pos(bar_height);
        }
    }

    while mons.len() > regions.len() {
        let gone = match mons.pop() {
            Some(m) => m,
            None => break,
        };
        result.dirty = true;
        let target = &mut mons[0];
        let active = target.active_tags();
        for win in &gone.clients {
            if let Some(c) = clients.get_mut(win) {
                c.mon = 0;
                c.tags = active;
                target.attach(*win);
                target.attach_stack(*win);
            }
        }
        result.removed.push(gone);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(win: Window, tags: TagMask, mon: MonId) -> Client {
        let mut c = Client::new(win, Rectangle::new(0, 0, 100, 100), 0, mon);
        c.tags = tags;
        c
    }

    fn monitor() -> Monitor {
        let mut m = Monitor::new(&Config::default());
        m.screen = Rectangle::new(0, 0, 1920, 1080);
        m.area = m.screen;
        m.update_bar_pos(20);
        m
    }

    #[test]
    fn attach_detach_restores_order() {
        let mut m = monitor();
        for w in &[1, 2, 3] {
            m.attach(*w);
        }
        assert_eq!(m.clients, vec![3, 2, 1]);
        let before = m.clients.clone();
        m.attach(4);
        m.detach(4);
        assert_eq!(m.clients, before);
        m.detach(2);
        assert_eq!(m.clients, vec![3, 1]);
    }

    #[test]
    fn detach_stack_reselects_visible() {
        let mut m = monitor();
        let mut clients = HashMap::new();
        clients.insert(1, client(1, 1, 0));
        clients.insert(2, client(2, 2, 0));
        clients.insert(3, client(3, 1, 0));
        for w in &[1, 2, 3] {
            m.attach_stack(*w);
        }
        m.sel = Some(3);

        // 2 is on a hidden tag so 1 is picked
        m.detach_stack(3, &clients);
        assert_eq!(m.stack, vec![2, 1]);
        assert_eq!(m.sel, Some(1));

        // removing an unselected client leaves the selection alone
        m.detach_stack(2, &clients);
        assert_eq!(m.sel, Some(1));

        m.detach_stack(1, &clients);
        assert_eq!(m.sel, None);
    }

    #[test]
    fn view_swaps_slots() {
        let mut m = monitor();
        assert!(!m.view(1));
        assert!(m.view(0b100));
        assert_eq!(m.active_tags(), 0b100);
        assert_eq!(m.tagset[m.seltags ^ 1], 1);

        // zero goes back to the previous set
        assert!(m.view(0));
        assert_eq!(m.active_tags(), 1);
        assert!(m.view(0));
        assert_eq!(m.active_tags(), 0b100);
    }

    #[test]
    fn toggle_view_never_empties() {
        let mut m = monitor();
        assert!(m.toggle_view(0b10));
        assert_eq!(m.active_tags(), 0b11);
        assert!(m.toggle_view(0b01));
        assert_eq!(m.active_tags(), 0b10);
        assert!(!m.toggle_view(0b10));
        assert_eq!(m.active_tags(), 0b10);
    }

    #[test]
    fn layouts_toggle() {
        let mut m = monitor();
        assert_eq!(m.layout(), Layout::Tiled);
        m.set_layout(None);
        assert_eq!(m.layout(), Layout::Floating);
        assert_eq!(m.ltsymbol, "><>");
        m.set_layout(None);
        assert_eq!(m.layout(), Layout::Tiled);

        m.set_layout(Some(Layout::Monocle));
        assert_eq!(m.layout(), Layout::Monocle);
        // selecting the current layout keeps the slot
        let slot = m.sellt;
        m.set_layout(Some(Layout::Monocle));
        assert_eq!(m.sellt, slot);
        m.set_layout(None);
        assert_eq!(m.layout(), Layout::Tiled);
    }

    #[test]
    fn mfact_bounds() {
        let mut m = monitor();
        assert!(m.set_mfact(0.05));
        assert!((m.mfact - 0.60).abs() < 1e-6);
        assert!(m.set_mfact(1.3));
        assert!((m.mfact - 0.3).abs() < 1e-6);
        assert!(!m.set_mfact(-0.3));
        assert!(!m.set_mfact(1.99));
        assert!((m.mfact - 0.3).abs() < 1e-6);

        m.inc_nmaster(-5);
        assert_eq!(m.nmaster, 0);
        m.inc_nmaster(2);
        assert_eq!(m.nmaster, 2);
    }

    #[test]
    fn bar_position() {
        let mut m = monitor();
        assert_eq!(m.by, 0);
        assert_eq!(m.area, Rectangle::new(0, 20, 1920, 1060));

        m.topbar = false;
        m.update_bar_pos(20);
        assert_eq!(m.by, 1060);
        assert_eq!(m.area, Rectangle::new(0, 0, 1920, 1060));

        m.showbar = false;
        m.update_bar_pos(20);
        assert_eq!(m.by, -20);
        assert_eq!(m.area, m.screen);
    }

    #[test]
    fn regions_are_deduplicated() {
        let a = Rectangle::new(0, 0, 1920, 1080);
        let b = Rectangle::new(1920, 0, 1280, 1024);
        assert_eq!(unique_regions(&[a, a, b, a]), vec![a, b]);
    }

    #[test]
    fn reconcile_adds_and_is_idempotent() {
        let config = Config::default();
        let mut mons = vec![];
        let mut clients = HashMap::new();
        let regions = [Rectangle::new(0, 0, 1920, 1080), Rectangle::new(1920, 0, 1280, 1024)];

        let r = reconcile(&mut mons, &mut clients, &regions, &config, 20);
        assert!(r.dirty);
        assert_eq!(mons.len(), 2);
        assert_eq!(mons[1].num, 1);
        assert_eq!(mons[1].area, Rectangle::new(1920, 20, 1280, 1004));

        let snapshot: Vec<(Rectangle, Rectangle, i32)> = mons.iter().map(|m| (m.screen, m.area, m.by)).collect();
        let r = reconcile(&mut mons, &mut clients, &regions, &config, 20);
        assert!(!r.dirty);
        assert!(r.removed.is_empty());
        let after: Vec<(Rectangle, Rectangle, i32)> = mons.iter().map(|m| (m.screen, m.area, m.by)).collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn reconcile_migrates_from_removed_monitors() {
        let config = Config::default();
        let mut mons = vec![];
        let mut clients = HashMap::new();
        let regions = [Rectangle::new(0, 0, 1920, 1080), Rectangle::new(1920, 0, 1280, 1024)];
        reconcile(&mut mons, &mut clients, &regions, &config, 20);

        mons[0].view(0b10);
        clients.insert(7, client(7, 0b100, 1));
        mons[1].attach(7);
        mons[1].attach_stack(7);
        mons[1].barwin = 99;

        let r = reconcile(&mut mons, &mut clients, &regions[..1], &config, 20);
        assert!(r.dirty);
        assert_eq!(mons.len(), 1);
        assert_eq!(r.removed.len(), 1);
        assert_eq!(r.removed[0].barwin, 99);
        assert_eq!(mons[0].clients, vec![7]);
        assert_eq!(mons[0].stack, vec![7]);
        assert_eq!(clients[&7].mon, 0);
        assert_eq!(clients[&7].tags, 0b10);
    }

    #[test]
    fn reconcile_with_no_regions_is_a_no_op() {
        let config = Config::default();
        let mut mons = vec![monitor()];
        let mut clients = HashMap::new();
        let r = reconcile(&mut mons, &mut clients, &[], &config, 20);
        assert!(!r.dirty);
        assert_eq!(mons.len(), 1);
    }
}
