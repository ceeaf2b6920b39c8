//! A scripted stand-in for the X server and the drawing surface.
//!
//! [MockConn] keeps just enough server side state (window properties, focus,
//! published EWMH lists) for the window manager's queries to be answered and
//! records every request it receives so that tests can assert on them.
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap, VecDeque},
    rc::Rc,
};

use anyhow::{anyhow, Result};
use xcb::Window;

use crate::{
    client::{NormalHints, WmHints, BROKEN, URGENCY_HINT},
    draw::{Draw, SchemeKind},
    xconnection::{
        ConfigureRequest, CursorKind, Protocol, Rectangle, WindowAttributes, WmState, XConn, XEvent,
    },
};

const ROOT: Window = 1;
const FIRST_BAR: Window = 1000;

/// Requests the window manager made, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BorderWidth(Window, i32),
    BorderColor(Window, u32),
    Configure(Window, Rectangle, i32),
    ConfigureNotify(Window, Rectangle, i32),
    Move(Window, i32, i32),
    MoveResize(Window, Rectangle),
    Forward(ConfigureRequest),
    Map(Window),
    Unmap(Window),
    Raise(Window),
    StackBelow(Window, Window),
    Focus(Option<Window>),
    Protocol(Window, Protocol),
    Kill(Window),
    Destroy(Window),
    UngrabKeys,
    Warp(Window, i32, i32),
    Cleanup,
}

/// Server side state of one window
#[derive(Debug, Clone)]
pub struct MockWindow {
    attrs: WindowAttributes,
    title: Option<String>,
    class: (String, String),
    transient_for: Option<Window>,
    normal_hints: Option<Vec<u32>>,
    urgent: bool,
    wm_state: Option<WmState>,
    supports_delete: bool,
    fullscreen: bool,
    dialog: bool,
}

impl MockWindow {
    pub fn new() -> MockWindow {
        MockWindow {
            attrs: WindowAttributes {
                override_redirect: false,
                viewable: false,
                geom: Rectangle::new(0, 0, 640, 480),
                border_width: 0,
            },
            title: None,
            class: (BROKEN.to_string(), BROKEN.to_string()),
            transient_for: None,
            normal_hints: None,
            urgent: false,
            wm_state: None,
            supports_delete: false,
            fullscreen: false,
            dialog: false,
        }
    }

    pub fn geometry(mut self, r: Rectangle) -> Self {
        self.attrs.geom = r;
        self
    }

    pub fn border_width(mut self, bw: i32) -> Self {
        self.attrs.border_width = bw;
        self
    }

    pub fn override_redirect(mut self) -> Self {
        self.attrs.override_redirect = true;
        self
    }

    pub fn viewable(mut self) -> Self {
        self.attrs.viewable = true;
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn class(mut self, instance: &str, class: &str) -> Self {
        self.class = (instance.to_string(), class.to_string());
        self
    }

    pub fn transient_for(mut self, parent: Window) -> Self {
        self.transient_for = Some(parent);
        self
    }

    /// Raw WM_NORMAL_HINTS values
    pub fn normal_hints(mut self, raw: Vec<u32>) -> Self {
        self.normal_hints = Some(raw);
        self
    }

    pub fn wm_state(mut self, state: WmState) -> Self {
        self.wm_state = Some(state);
        self
    }

    pub fn supports_delete(mut self) -> Self {
        self.supports_delete = true;
        self
    }

    pub fn fullscreen(mut self) -> Self {
        self.fullscreen = true;
        self
    }

    pub fn dialog(mut self) -> Self {
        self.dialog = true;
        self
    }
}

pub struct MockConn {
    screen: (i32, i32),
    regions: RefCell<Vec<Rectangle>>,
    windows: RefCell<BTreeMap<Window, MockWindow>>,
    events: RefCell<VecDeque<XEvent>>,
    calls: RefCell<Vec<Call>>,
    focused: Cell<Option<Window>>,
    active: Cell<Option<Window>>,
    client_list: RefCell<Vec<Window>>,
    root_name: RefCell<Option<String>>,
    pointer: Cell<(i32, i32)>,
    keymap: RefCell<HashMap<xcb::Keycode, u32>>,
    next_bar: Cell<Window>,
}

impl MockConn {
    /// A server whose screen covers all of `regions`
    pub fn new(regions: Vec<Rectangle>) -> MockConn {
        let w = regions.iter().map(|r| r.x + r.w).max().unwrap_or(0);
        let h = regions.iter().map(|r| r.y + r.h).max().unwrap_or(0);
        MockConn {
            screen: (w, h),
            regions: RefCell::new(regions),
            windows: RefCell::new(BTreeMap::new()),
            events: RefCell::new(VecDeque::new()),
            calls: RefCell::new(vec![]),
            focused: Cell::new(None),
            active: Cell::new(None),
            client_list: RefCell::new(vec![]),
            root_name: RefCell::new(None),
            pointer: Cell::new((0, 0)),
            keymap: RefCell::new(HashMap::new()),
            next_bar: Cell::new(FIRST_BAR),
        }
    }

    /// One 1920x1080 monitor
    pub fn single() -> MockConn {
        MockConn::new(vec![Rectangle::new(0, 0, 1920, 1080)])
    }

    pub fn add_window(&self, win: Window, w: MockWindow) {
        self.windows.borrow_mut().insert(win, w);
    }

    pub fn set_regions(&self, regions: Vec<Rectangle>) {
        *self.regions.borrow_mut() = regions;
    }

    pub fn set_title(&self, win: Window, title: &str) {
        self.with_window(win, |w| w.title = Some(title.to_string()));
    }

    pub fn set_transient_for(&self, win: Window, parent: Window) {
        self.with_window(win, |w| w.transient_for = Some(parent));
    }

    pub fn set_root_name(&self, name: &str) {
        *self.root_name.borrow_mut() = Some(name.to_string());
    }

    pub fn set_pointer(&self, x: i32, y: i32) {
        self.pointer.set((x, y));
    }

    pub fn map_key(&self, code: xcb::Keycode, keysym: u32) {
        self.keymap.borrow_mut().insert(code, keysym);
    }

    pub fn push_events(&self, events: Vec<XEvent>) {
        self.events.borrow_mut().extend(events);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn focused(&self) -> Option<Window> {
        self.focused.get()
    }

    pub fn active_window(&self) -> Option<Window> {
        self.active.get()
    }

    pub fn client_list(&self) -> Vec<Window> {
        self.client_list.borrow().clone()
    }

    pub fn wm_state_of(&self, win: Window) -> Option<WmState> {
        self.windows.borrow().get(&win).and_then(|w| w.wm_state)
    }

    pub fn is_fullscreen(&self, win: Window) -> bool {
        self.windows.borrow().get(&win).map_or(false, |w| w.fullscreen)
    }

    pub fn is_urgent(&self, win: Window) -> bool {
        self.windows.borrow().get(&win).map_or(false, |w| w.urgent)
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn with_window<F: FnOnce(&mut MockWindow)>(&self, win: Window, f: F) {
        if let Some(w) = self.windows.borrow_mut().get_mut(&win) {
            f(w);
        }
    }
}

impl XConn for MockConn {
    fn root(&self) -> Window {
        ROOT
    }

    fn screen_size(&self) -> (i32, i32) {
        self.screen
    }

    fn flush(&self) -> bool {
        true
    }

    fn sync(&self) {}

    fn suppress_errors(&self, _on: bool) {}

    fn next_event(&self) -> Result<XEvent> {
        self.events
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no more scripted events"))
    }

    fn drain_enter_events(&self) {
        self.events
            .borrow_mut()
            .retain(|e| !matches!(e, XEvent::Enter { .. }));
    }

    fn monitor_regions(&self) -> Vec<Rectangle> {
        self.regions.borrow().clone()
    }

    fn query_tree(&self) -> Vec<Window> {
        self.windows.borrow().keys().copied().collect()
    }

    fn window_attributes(&self, win: Window) -> Option<WindowAttributes> {
        self.windows.borrow().get(&win).map(|w| w.attrs)
    }

    fn wm_state(&self, win: Window) -> Option<WmState> {
        self.wm_state_of(win)
    }

    fn set_wm_state(&self, win: Window, state: WmState) {
        self.with_window(win, |w| w.wm_state = Some(state));
    }

    fn title(&self, win: Window) -> Option<String> {
        self.windows.borrow().get(&win).and_then(|w| w.title.clone())
    }

    fn root_name(&self) -> Option<String> {
        self.root_name.borrow().clone()
    }

    fn class_hint(&self, win: Window) -> (String, String) {
        self.windows
            .borrow()
            .get(&win)
            .map_or((BROKEN.to_string(), BROKEN.to_string()), |w| w.class.clone())
    }

    fn transient_for(&self, win: Window) -> Option<Window> {
        self.windows.borrow().get(&win).and_then(|w| w.transient_for)
    }

    fn size_hints(&self, win: Window) -> Option<NormalHints> {
        let windows = self.windows.borrow();
        let raw = windows.get(&win)?.normal_hints.as_ref()?;
        NormalHints::from_raw(raw)
    }

    fn wm_hints(&self, win: Window) -> Option<WmHints> {
        let urgent = self.windows.borrow().get(&win)?.urgent;
        Some(WmHints {
            flags: if urgent { URGENCY_HINT } else { 0 },
            input: true,
        })
    }

    fn set_urgency(&self, win: Window, urgent: bool) {
        self.with_window(win, |w| w.urgent = urgent);
    }

    fn is_dialog(&self, win: Window) -> bool {
        self.windows.borrow().get(&win).map_or(false, |w| w.dialog)
    }

    fn requests_fullscreen(&self, win: Window) -> bool {
        self.is_fullscreen(win)
    }

    fn set_fullscreen_state(&self, win: Window, fullscreen: bool) {
        self.with_window(win, |w| w.fullscreen = fullscreen);
    }

    fn send_protocol(&self, win: Window, proto: Protocol) -> bool {
        let supported = match proto {
            Protocol::Delete => self.windows.borrow().get(&win).map_or(false, |w| w.supports_delete),
            Protocol::TakeFocus => false,
        };
        if supported {
            self.record(Call::Protocol(win, proto));
        }
        supported
    }

    fn set_active_window(&self, win: Option<Window>) {
        self.active.set(win);
    }

    fn set_client_list(&self, wins: &[Window]) {
        *self.client_list.borrow_mut() = wins.to_vec();
    }

    fn append_client_list(&self, win: Window) {
        self.client_list.borrow_mut().push(win);
    }

    fn select_client_events(&self, _win: Window) {}

    fn configure_window(&self, win: Window, r: Rectangle, border_width: i32) {
        self.with_window(win, |w| {
            w.attrs.geom = r;
            w.attrs.border_width = border_width;
        });
        self.record(Call::Configure(win, r, border_width));
    }

    fn set_border_width(&self, win: Window, border_width: i32) {
        self.with_window(win, |w| w.attrs.border_width = border_width);
        self.record(Call::BorderWidth(win, border_width));
    }

    fn move_window(&self, win: Window, x: i32, y: i32) {
        self.record(Call::Move(win, x, y));
    }

    fn move_resize(&self, win: Window, r: Rectangle) {
        self.record(Call::MoveResize(win, r));
    }

    fn send_configure_notify(&self, win: Window, r: Rectangle, border_width: i32) {
        self.record(Call::ConfigureNotify(win, r, border_width));
    }

    fn forward_configure_request(&self, req: &ConfigureRequest) {
        self.record(Call::Forward(*req));
    }

    fn set_border_color(&self, win: Window, pixel: u32) {
        self.record(Call::BorderColor(win, pixel));
    }

    fn map_window(&self, win: Window) {
        self.with_window(win, |w| w.attrs.viewable = true);
        self.record(Call::Map(win));
    }

    fn unmap_window(&self, win: Window) {
        self.with_window(win, |w| w.attrs.viewable = false);
        self.record(Call::Unmap(win));
    }

    fn raise_window(&self, win: Window) {
        self.record(Call::Raise(win));
    }

    fn stack_below(&self, win: Window, sibling: Window) {
        self.record(Call::StackBelow(win, sibling));
    }

    fn focus_window(&self, win: Option<Window>) {
        self.focused.set(win);
        self.record(Call::Focus(win));
    }

    fn ungrab_buttons(&self, _win: Window) {}

    fn grab_any_button(&self, _win: Window) {}

    fn grab_button(&self, _win: Window, _button: u8, _mods: u16) {}

    fn allow_replay_pointer(&self) {}

    fn ungrab_keys(&self) {
        self.record(Call::UngrabKeys);
    }

    fn grab_key(&self, _keysym: u32, _mods: u16) {}

    fn keysym_for(&self, code: xcb::Keycode) -> u32 {
        self.keymap.borrow().get(&code).copied().unwrap_or(0)
    }

    fn numlock_mask(&self) -> u16 {
        xcb::MOD_MASK_2 as u16
    }

    fn refresh_keyboard_mapping(&self) {}

    fn grab_pointer(&self, _cursor: CursorKind) -> bool {
        true
    }

    fn ungrab_pointer(&self) {}

    fn query_pointer(&self) -> Option<(i32, i32)> {
        Some(self.pointer.get())
    }

    fn warp_pointer(&self, win: Window, x: i32, y: i32) {
        self.record(Call::Warp(win, x, y));
    }

    fn kill_client(&self, win: Window) {
        self.record(Call::Kill(win));
    }

    fn grab_server(&self) {}

    fn ungrab_server(&self) {}

    fn create_bar(&self, _r: Rectangle) -> Window {
        let id = self.next_bar.get();
        self.next_bar.set(id + 1);
        id
    }

    fn destroy_window(&self, win: Window) {
        self.record(Call::Destroy(win));
    }

    fn init_root(&self, _wm_name: &str) -> Result<()> {
        Ok(())
    }

    fn cleanup(&self) {
        self.focused.set(None);
        self.active.set(None);
        self.record(Call::Cleanup);
    }
}

/// What was drawn on a [MockDraw]
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Text(i32, String),
    InvertedText(i32, String),
    Rect(i32, i32, i32, i32, bool, bool),
}

/// A drawing surface with a fixed width per character
pub struct MockDraw {
    ops: Rc<RefCell<Vec<Op>>>,
    maps: Rc<RefCell<Vec<Window>>>,
}

impl MockDraw {
    pub const FONT_HEIGHT: i32 = 12;
    pub const CHAR_WIDTH: i32 = 10;

    /// Shared log of text and rectangle operations
    pub fn ops(&self) -> Rc<RefCell<Vec<Op>>> {
        Rc::clone(&self.ops)
    }

    /// Shared log of the windows the canvas was copied onto
    pub fn maps(&self) -> Rc<RefCell<Vec<Window>>> {
        Rc::clone(&self.maps)
    }
}

impl Default for MockDraw {
    fn default() -> MockDraw {
        MockDraw {
            ops: Rc::new(RefCell::new(vec![])),
            maps: Rc::new(RefCell::new(vec![])),
        }
    }
}

impl Draw for MockDraw {
    fn font_height(&self) -> i32 {
        MockDraw::FONT_HEIGHT
    }

    fn text_width(&self, text: &str) -> i32 {
        text.chars().count() as i32 * MockDraw::CHAR_WIDTH
    }

    fn set_scheme(&mut self, _scheme: SchemeKind) {}

    fn rect(&mut self, x: i32, y: i32, w: i32, h: i32, filled: bool, invert: bool) {
        self.ops.borrow_mut().push(Op::Rect(x, y, w, h, filled, invert));
    }

    fn text(&mut self, x: i32, _y: i32, w: i32, _h: i32, _lpad: i32, text: &str, invert: bool) -> i32 {
        let op = if invert {
            Op::InvertedText(x, text.to_string())
        } else {
            Op::Text(x, text.to_string())
        };
        self.ops.borrow_mut().push(op);
        x + w
    }

    fn map(&mut self, win: Window, _x: i32, _y: i32, _w: i32, _h: i32) {
        self.maps.borrow_mut().push(win);
    }

    fn resize(&mut self, _w: i32, _h: i32) {}

    fn border_pixel(&self, scheme: SchemeKind) -> u32 {
        match scheme {
            SchemeKind::Norm => 0x444444,
            SchemeKind::Sel => 0x005577,
        }
    }
}
