//! The X server gateway.
//!
//! Everything the window manager asks of the server goes through the [XConn]
//! trait so that the policy code can be driven by a scripted connection in
//! tests. [XcbConnection] is the real implementation on top of xcb.
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use anyhow::{anyhow, Context, Result};
use xcb::{randr, xinerama, Atom, Window};
use xcb_util::{ewmh, icccm};

use crate::client::{NormalHints, WmHints, BROKEN, URGENCY_HINT};
use crate::draw::Cursors;
use crate::xerror::{ErrorClass, ProtocolError};

// Mask out the most significant bit, which indicates if it's a send_event
const XCB_RESPONSE_TYPE_MASK: u8 = 0x7F;
const GRAB_MODE_ASYNC: u8 = xcb::GRAB_MODE_ASYNC as u8;
const GRAB_MODE_SYNC: u8 = xcb::GRAB_MODE_SYNC as u8;
const INPUT_FOCUS_POINTER_ROOT: u8 = xcb::INPUT_FOCUS_POINTER_ROOT as u8;
const PROP_MODE_REPLACE: u8 = xcb::PROP_MODE_REPLACE as u8;
const PROP_MODE_APPEND: u8 = xcb::PROP_MODE_APPEND as u8;
const XK_NUM_LOCK: u32 = 0xff7f;

pub const CONFIG_WINDOW_X: u16 = xcb::CONFIG_WINDOW_X as u16;
pub const CONFIG_WINDOW_Y: u16 = xcb::CONFIG_WINDOW_Y as u16;
pub const CONFIG_WINDOW_WIDTH: u16 = xcb::CONFIG_WINDOW_WIDTH as u16;
pub const CONFIG_WINDOW_HEIGHT: u16 = xcb::CONFIG_WINDOW_HEIGHT as u16;
pub const CONFIG_WINDOW_BORDER_WIDTH: u16 = xcb::CONFIG_WINDOW_BORDER_WIDTH as u16;
pub const CONFIG_WINDOW_SIBLING: u16 = xcb::CONFIG_WINDOW_SIBLING as u16;
pub const CONFIG_WINDOW_STACK_MODE: u16 = xcb::CONFIG_WINDOW_STACK_MODE as u16;

const BUTTON_MASK: u32 = xcb::EVENT_MASK_BUTTON_PRESS | xcb::EVENT_MASK_BUTTON_RELEASE;
const MOUSE_MASK: u32 = BUTTON_MASK | xcb::EVENT_MASK_POINTER_MOTION;
const ROOT_EVENT_MASK: u32 = xcb::EVENT_MASK_SUBSTRUCTURE_REDIRECT
    | xcb::EVENT_MASK_SUBSTRUCTURE_NOTIFY
    | xcb::EVENT_MASK_BUTTON_PRESS
    | xcb::EVENT_MASK_POINTER_MOTION
    | xcb::EVENT_MASK_ENTER_WINDOW
    | xcb::EVENT_MASK_LEAVE_WINDOW
    | xcb::EVENT_MASK_STRUCTURE_NOTIFY
    | xcb::EVENT_MASK_PROPERTY_CHANGE;
const CLIENT_EVENT_MASK: u32 = xcb::EVENT_MASK_ENTER_WINDOW
    | xcb::EVENT_MASK_FOCUS_CHANGE
    | xcb::EVENT_MASK_PROPERTY_CHANGE
    | xcb::EVENT_MASK_STRUCTURE_NOTIFY;

macro_rules! atoms {
    ( $( $name:ident ),+ ) => {
        #[allow(non_snake_case)]
        pub struct InternedAtoms {
            $(
                pub $name: xcb::Atom
            ),*
        }

        impl InternedAtoms {
            pub fn new(conn: &xcb::Connection) -> Result<InternedAtoms> {
                Ok(InternedAtoms {
                    $(
                        $name: xcb::intern_atom(conn, false, stringify!($name)).get_reply()?.atom()
                    ),*
                })
            }

            /// The atoms advertised in _NET_SUPPORTED
            fn net_supported(&self) -> Vec<Atom> {
                let mut supported = vec![];
                $(
                    if stringify!($name).starts_with("_NET_") {
                        supported.push(self.$name);
                    }
                )*
                supported
            }
        }
    };
    // Allow trailing comma:
    ( $( $name:ident ),+ , ) => (atoms!($( $name ),+);)
}

atoms!(
    UTF8_STRING,
    WM_PROTOCOLS,
    WM_DELETE_WINDOW,
    WM_STATE,
    WM_TAKE_FOCUS,
    _NET_ACTIVE_WINDOW,
    _NET_SUPPORTED,
    _NET_WM_NAME,
    _NET_WM_STATE,
    _NET_SUPPORTING_WM_CHECK,
    _NET_WM_STATE_FULLSCREEN,
    _NET_WM_WINDOW_TYPE,
    _NET_WM_WINDOW_TYPE_DIALOG,
    _NET_CLIENT_LIST,
);

/// An X key-code along with a modifier mask
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct XcbKey {
    /// Modifier key bit mask
    pub mod_mask: u16,
    /// X key code
    pub code: xcb::Keycode,
}

impl XcbKey {
    /// Build a new XcbKey from an XCB KeyPressEvent
    pub fn from_key_press(k: &xcb::KeyPressEvent) -> XcbKey {
        XcbKey {
            mod_mask: k.state(),
            code: k.detail(),
        }
    }
}

/// An X window / screen position: top left corner + extent
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rectangle {
    /// Create a new Rectangle.
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Rectangle {
        Rectangle { x, y, w, h }
    }

    /// Area shared with `other`, zero when they do not overlap
    pub fn intersection_area(&self, other: &Rectangle) -> i32 {
        let w = (self.x + self.w).min(other.x + other.w) - self.x.max(other.x);
        let h = (self.y + self.h).min(other.y + other.h) - self.y.max(other.y);
        w.max(0) * h.max(0)
    }
}

/// What the window manager needs to know about a window it did not create
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct WindowAttributes {
    pub override_redirect: bool,
    pub viewable: bool,
    pub geom: Rectangle,
    pub border_width: i32,
}

/// ICCCM WM_STATE values
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WmState {
    Withdrawn = 0,
    Normal = 1,
    Iconic = 3,
}

/// WM_PROTOCOLS messages a client may opt in to
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Protocol {
    Delete,
    TakeFocus,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CursorKind {
    Normal,
    Resize,
    Move,
}

/// Window properties whose changes the window manager reacts to
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Property {
    WmName,
    NetWmName,
    TransientFor,
    NormalHints,
    WmHints,
    WindowType,
    Other(Atom),
}

/// Requests clients make through ClientMessage events
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ClientRequest {
    /// _NET_WM_STATE naming the fullscreen state. 0 removes, 1 adds, 2 toggles
    Fullscreen { action: u32 },
    /// _NET_ACTIVE_WINDOW
    Activate,
    Other(Atom),
}

/// A client asking for a new geometry or stacking position
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ConfigureRequest {
    pub id: Window,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub border_width: i32,
    pub sibling: Window,
    pub stack_mode: u8,
    pub value_mask: u16,
}

impl ConfigureRequest {
    /// Whether the request sets the given CONFIG_WINDOW_* field
    pub fn has(&self, field: u16) -> bool {
        self.value_mask & field != 0
    }
}

/**
 * Wrapper around the low level XCB event types that require casting to work with.
 * Not all event fields are extracted so check the XCB documentation and update
 * accordingly if you need access to something that isn't currently passed through
 * to the WindowManager event loop.
 *
 * https://tronche.com/gui/x/xlib/events/types.html
 */
#[derive(Debug, Clone, PartialEq)]
pub enum XEvent {
    /// xcb docs: https://www.mankier.com/3/xcb_button_press_event_t
    ButtonPress {
        id: Window,
        root_x: i32,
        root_y: i32,
        /// Pointer position relative to the event window
        event_x: i32,
        state: u16,
        button: u8,
    },

    ButtonRelease {
        id: Window,
    },

    /// xcb docs: https://www.mankier.com/3/xcb_motion_notify_event_t
    MotionNotify {
        id: Window,
        root_x: i32,
        root_y: i32,
        /// Server time in milliseconds
        time: u32,
    },

    KeyPress {
        /// The X11 key code that was received along with any modifiers that were held
        code: XcbKey,
    },

    /// xcb docs: https://www.mankier.com/3/xcb_map_request_event_t
    MapRequest {
        /// The ID of the window that wants to be mapped
        id: Window,
    },

    ConfigureRequest(ConfigureRequest),

    /// xcb docs: https://www.mankier.com/3/xcb_configure_notify_event_t
    ConfigureNotify {
        id: Window,
        /// The new window size
        r: Rectangle,
        /// Is this window the root window?
        is_root: bool,
    },

    DestroyNotify {
        /// The ID of the window being destroyed
        id: Window,
    },

    UnmapNotify {
        id: Window,
        /// Sent by a client through SendEvent rather than generated by the server
        synthetic: bool,
    },

    /// xcb docs: https://www.mankier.com/3/xcb_enter_notify_event_t
    Enter {
        id: Window,
        /// NotifyNormal crossing mode
        normal: bool,
        /// NotifyInferior crossing detail
        inferior: bool,
        is_root: bool,
    },

    Expose {
        id: Window,
        /// Number of Expose events still to follow
        count: u16,
    },

    FocusIn {
        id: Window,
    },

    /// xcb docs: https://www.mankier.com/3/xcb_property_notify_event_t
    PropertyNotify {
        id: Window,
        atom: Property,
        deleted: bool,
        is_root: bool,
    },

    /// https://www.mankier.com/3/xcb_client_message_event_t
    ClientMessage {
        id: Window,
        request: ClientRequest,
    },

    MappingNotify {
        /// The keyboard mapping (as opposed to modifier or pointer) changed
        keyboard: bool,
    },
}

/**
 * Everything the window manager asks of the X server.
 *
 * Requests are fire-and-forget unless they return a value. Queries return
 * `None` (or an empty value) when the window has gone away.
 */
pub trait XConn {
    fn root(&self) -> Window;
    fn screen_size(&self) -> (i32, i32);
    fn flush(&self) -> bool;
    /// Round trip to the server, queueing whatever events arrive meanwhile
    fn sync(&self);
    /// While on, protocol errors are dropped instead of reported
    fn suppress_errors(&self, on: bool);
    /// Block for the next event. Fails on a fatal protocol error or when the
    /// connection goes away.
    fn next_event(&self) -> Result<XEvent>;
    /// Sync and discard pending pointer crossing events
    fn drain_enter_events(&self);
    fn monitor_regions(&self) -> Vec<Rectangle>;
    fn query_tree(&self) -> Vec<Window>;

    fn window_attributes(&self, win: Window) -> Option<WindowAttributes>;
    fn wm_state(&self, win: Window) -> Option<WmState>;
    fn set_wm_state(&self, win: Window, state: WmState);
    fn title(&self, win: Window) -> Option<String>;
    fn root_name(&self) -> Option<String>;
    /// (instance, class) from WM_CLASS
    fn class_hint(&self, win: Window) -> (String, String);
    fn transient_for(&self, win: Window) -> Option<Window>;
    fn size_hints(&self, win: Window) -> Option<NormalHints>;
    fn wm_hints(&self, win: Window) -> Option<WmHints>;
    fn set_urgency(&self, win: Window, urgent: bool);
    fn is_dialog(&self, win: Window) -> bool;
    fn requests_fullscreen(&self, win: Window) -> bool;
    fn set_fullscreen_state(&self, win: Window, fullscreen: bool);
    /// Send a WM_PROTOCOLS message if the client supports it, returning
    /// whether it did
    fn send_protocol(&self, win: Window, proto: Protocol) -> bool;

    fn set_active_window(&self, win: Option<Window>);
    fn set_client_list(&self, wins: &[Window]);
    fn append_client_list(&self, win: Window);

    fn select_client_events(&self, win: Window);
    fn configure_window(&self, win: Window, r: Rectangle, border_width: i32);
    fn set_border_width(&self, win: Window, border_width: i32);
    fn move_window(&self, win: Window, x: i32, y: i32);
    fn move_resize(&self, win: Window, r: Rectangle);
    fn send_configure_notify(&self, win: Window, r: Rectangle, border_width: i32);
    fn forward_configure_request(&self, req: &ConfigureRequest);
    fn set_border_color(&self, win: Window, pixel: u32);
    fn map_window(&self, win: Window);
    fn unmap_window(&self, win: Window);
    fn raise_window(&self, win: Window);
    fn stack_below(&self, win: Window, sibling: Window);
    /// Give input focus to `win`, or back to the root when `None`
    fn focus_window(&self, win: Option<Window>);

    fn ungrab_buttons(&self, win: Window);
    fn grab_any_button(&self, win: Window);
    fn grab_button(&self, win: Window, button: u8, mods: u16);
    fn allow_replay_pointer(&self);
    fn ungrab_keys(&self);
    fn grab_key(&self, keysym: u32, mods: u16);
    fn keysym_for(&self, code: xcb::Keycode) -> u32;
    fn numlock_mask(&self) -> u16;
    fn refresh_keyboard_mapping(&self);

    fn grab_pointer(&self, cursor: CursorKind) -> bool;
    fn ungrab_pointer(&self);
    fn query_pointer(&self) -> Option<(i32, i32)>;
    fn warp_pointer(&self, win: Window, x: i32, y: i32);

    fn kill_client(&self, win: Window);
    fn grab_server(&self);
    fn ungrab_server(&self);
    fn create_bar(&self, r: Rectangle) -> Window;
    fn destroy_window(&self, win: Window);

    /// Select root events, set the cursor and publish EWMH support
    fn init_root(&self, wm_name: &str) -> Result<()>;
    /// Undo what init_root did and hand focus back to the root
    fn cleanup(&self);
}

struct KeyboardMap {
    min_keycode: u8,
    per_keycode: usize,
    syms: Vec<xcb::Keysym>,
}

impl KeyboardMap {
    fn load(conn: &xcb::Connection) -> Result<KeyboardMap> {
        let setup = conn.get_setup();
        let (min, max) = (setup.min_keycode(), setup.max_keycode());
        let reply = xcb::get_keyboard_mapping(conn, min, max - min + 1)
            .get_reply()
            .context("Failed to read the keyboard mapping")?;
        Ok(KeyboardMap {
            min_keycode: min,
            per_keycode: reply.keysyms_per_keycode() as usize,
            syms: reply.keysyms().to_vec(),
        })
    }

    fn keysym(&self, code: xcb::Keycode) -> u32 {
        if code < self.min_keycode || self.per_keycode == 0 {
            return 0;
        }
        let ix = (code - self.min_keycode) as usize * self.per_keycode;
        self.syms.get(ix).copied().unwrap_or(0)
    }

    fn keycodes(&self, keysym: u32) -> Vec<xcb::Keycode> {
        if self.per_keycode == 0 {
            return vec![];
        }
        self.syms
            .chunks(self.per_keycode)
            .enumerate()
            .filter(|(_, syms)| syms.contains(&keysym))
            .map(|(i, _)| self.min_keycode + i as u8)
            .collect()
    }
}

/// Handles communication with an X server via xcb
pub struct XcbConnection {
    conn: ewmh::Connection,
    preferred_screen: i32,
    root: Window,
    atoms: InternedAtoms,
    cursors: Cursors,
    check_win: Window,
    keymap: RefCell<KeyboardMap>,
    queued: RefCell<VecDeque<xcb::GenericEvent>>,
    suppress: Cell<bool>,
}

impl XcbConnection {
    pub fn new() -> Result<XcbConnection> {
        let (conn, preferred_screen) = xcb::Connection::connect(None)
            .context("Unable to connection to X server")?;
        let conn = ewmh::Connection::connect(conn).map_err(|(e, _)| e)?;

        let root = conn
            .get_setup()
            .roots()
            .nth(preferred_screen as usize)
            .context("Unable to get the root window of the preferred screen")?
            .root();

        let atoms = InternedAtoms::new(&conn).context("Failed to intern atoms")?;
        let cursors = Cursors::new(&conn).context("Failed to create cursors")?;
        let keymap = KeyboardMap::load(&conn)?;

        let check_win = conn.generate_id();
        xcb::create_window(
            &conn,
            xcb::COPY_FROM_PARENT as u8,
            check_win,
            root,
            0,
            0,
            1,
            1,
            0,
            xcb::WINDOW_CLASS_INPUT_OUTPUT as u16,
            xcb::COPY_FROM_PARENT,
            &[],
        );

        Ok(XcbConnection {
            conn,
            preferred_screen,
            root,
            atoms,
            cursors,
            check_win,
            keymap: RefCell::new(keymap),
            queued: RefCell::new(VecDeque::new()),
            suppress: Cell::new(false),
        })
    }

    pub fn raw_conn(&self) -> &ewmh::Connection {
        &self.conn
    }

    fn screen(&self) -> Option<xcb::Screen> {
        self.conn.get_setup().roots().nth(self.preferred_screen as usize)
    }

    /// Take the substructure redirect on the root window. Only one client
    /// may hold it, so failure means another window manager is running.
    pub fn register_wm(&self) -> Result<()> {
        xcb::change_window_attributes_checked(
            &self.conn,
            self.root,
            &[(xcb::CW_EVENT_MASK, xcb::EVENT_MASK_SUBSTRUCTURE_REDIRECT)],
        )
        .request_check()
        .map_err(|_| anyhow!("another window manager is already running"))?;
        Ok(())
    }

    fn protocol_error(&self, event: &xcb::GenericEvent) -> ProtocolError {
        let e: &xcb::GenericError = unsafe { xcb::cast_event(event) };
        let (request_code, resource_id) = unsafe { ((*e.ptr).major_code, (*e.ptr).resource_id) };
        ProtocolError {
            request_code,
            error_code: e.error_code(),
            resource_id,
        }
    }

    /// Move everything currently readable into the local queue
    fn pump(&self, drop_enter: bool) {
        if drop_enter {
            self.queued
                .borrow_mut()
                .retain(|e| e.response_type() & XCB_RESPONSE_TYPE_MASK != xcb::ENTER_NOTIFY);
        }
        while let Some(event) = self.conn.poll_for_event() {
            let etype = event.response_type() & XCB_RESPONSE_TYPE_MASK;
            if etype == 0 && self.suppress.get() {
                debug!("suppressed {}", self.protocol_error(&event));
                continue;
            }
            if drop_enter && etype == xcb::ENTER_NOTIFY {
                continue;
            }
            self.queued.borrow_mut().push_back(event);
        }
    }

    fn round_trip(&self) {
        if xcb::get_input_focus(&self.conn).get_reply().is_err() {
            warn!("round trip to the X server failed");
        }
    }

    fn get_prop32(&self, win: Window, prop: Atom, type_: Atom, len: u32) -> Option<Vec<u32>> {
        let reply = xcb::get_property(&self.conn, false, win, prop, type_, 0, len)
            .get_reply()
            .ok()?;
        if reply.format() != 32 || reply.value_len() == 0 {
            return None;
        }
        Some(reply.value::<u32>().to_vec())
    }

    fn atom_prop(&self, win: Window, prop: Atom) -> Option<Atom> {
        self.get_prop32(win, prop, xcb::ATOM_ATOM, 1)
            .and_then(|v| v.first().copied())
    }

    fn property_kind(&self, atom: Atom) -> Property {
        match atom {
            xcb::ATOM_WM_NAME => Property::WmName,
            xcb::ATOM_WM_TRANSIENT_FOR => Property::TransientFor,
            xcb::ATOM_WM_NORMAL_HINTS => Property::NormalHints,
            xcb::ATOM_WM_HINTS => Property::WmHints,
            a if a == self.atoms._NET_WM_NAME => Property::NetWmName,
            a if a == self.atoms._NET_WM_WINDOW_TYPE => Property::WindowType,
            a => Property::Other(a),
        }
    }

    fn client_request(&self, e: &xcb::ClientMessageEvent) -> ClientRequest {
        let data = e.data().data32();
        if e.type_() == self.atoms._NET_WM_STATE {
            let fs = self.atoms._NET_WM_STATE_FULLSCREEN;
            if data[1] == fs || data[2] == fs {
                return ClientRequest::Fullscreen { action: data[0] };
            }
        } else if e.type_() == self.atoms._NET_ACTIVE_WINDOW {
            return ClientRequest::Activate;
        }
        ClientRequest::Other(e.type_())
    }

    fn decode(&self, event: &xcb::GenericEvent) -> Option<XEvent> {
        let synthetic = event.response_type() & !XCB_RESPONSE_TYPE_MASK != 0;
        let etype = event.response_type() & XCB_RESPONSE_TYPE_MASK;

        match etype {
            xcb::BUTTON_PRESS => {
                let e: &xcb::ButtonPressEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::ButtonPress {
                    id: e.event(),
                    root_x: e.root_x() as i32,
                    root_y: e.root_y() as i32,
                    event_x: e.event_x() as i32,
                    state: e.state(),
                    button: e.detail(),
                })
            }

            xcb::BUTTON_RELEASE => {
                let e: &xcb::ButtonReleaseEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::ButtonRelease { id: e.event() })
            }

            xcb::MOTION_NOTIFY => {
                let e: &xcb::MotionNotifyEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::MotionNotify {
                    id: e.event(),
                    root_x: e.root_x() as i32,
                    root_y: e.root_y() as i32,
                    time: e.time(),
                })
            }

            xcb::KEY_PRESS => {
                let e: &xcb::KeyPressEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::KeyPress {
                    code: XcbKey::from_key_press(e),
                })
            }

            xcb::MAP_REQUEST => {
                let e: &xcb::MapRequestEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::MapRequest { id: e.window() })
            }

            xcb::CONFIGURE_REQUEST => {
                let e: &xcb::ConfigureRequestEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::ConfigureRequest(ConfigureRequest {
                    id: e.window(),
                    x: e.x() as i32,
                    y: e.y() as i32,
                    w: e.width() as i32,
                    h: e.height() as i32,
                    border_width: e.border_width() as i32,
                    sibling: e.sibling(),
                    stack_mode: e.stack_mode(),
                    value_mask: e.value_mask(),
                }))
            }

            xcb::CONFIGURE_NOTIFY => {
                let e: &xcb::ConfigureNotifyEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::ConfigureNotify {
                    id: e.window(),
                    r: Rectangle::new(e.x() as i32, e.y() as i32, e.width() as i32, e.height() as i32),
                    is_root: e.window() == self.root,
                })
            }

            xcb::DESTROY_NOTIFY => {
                let e: &xcb::DestroyNotifyEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::DestroyNotify { id: e.window() })
            }

            xcb::UNMAP_NOTIFY => {
                let e: &xcb::UnmapNotifyEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::UnmapNotify {
                    id: e.window(),
                    synthetic,
                })
            }

            xcb::ENTER_NOTIFY => {
                let e: &xcb::EnterNotifyEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::Enter {
                    id: e.event(),
                    normal: e.mode() == xcb::NOTIFY_MODE_NORMAL as u8,
                    inferior: e.detail() == xcb::NOTIFY_DETAIL_INFERIOR as u8,
                    is_root: e.event() == self.root,
                })
            }

            xcb::EXPOSE => {
                let e: &xcb::ExposeEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::Expose {
                    id: e.window(),
                    count: e.count(),
                })
            }

            xcb::FOCUS_IN => {
                let e: &xcb::FocusInEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::FocusIn { id: e.event() })
            }

            xcb::PROPERTY_NOTIFY => {
                let e: &xcb::PropertyNotifyEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::PropertyNotify {
                    id: e.window(),
                    atom: self.property_kind(e.atom()),
                    deleted: e.state() == xcb::PROPERTY_DELETE as u8,
                    is_root: e.window() == self.root,
                })
            }

            xcb::CLIENT_MESSAGE => {
                let e: &xcb::ClientMessageEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::ClientMessage {
                    id: e.window(),
                    request: self.client_request(e),
                })
            }

            xcb::MAPPING_NOTIFY => {
                let e: &xcb::MappingNotifyEvent = unsafe { xcb::cast_event(event) };
                Some(XEvent::MappingNotify {
                    keyboard: e.request() == xcb::MAPPING_KEYBOARD as u8,
                })
            }

            // NOTE: ignoring other event types
            _ => None,
        }
    }

    fn xinerama_screens(&self) -> Option<Vec<Rectangle>> {
        let active = xinerama::is_active(&self.conn).get_reply().ok()?.state() != 0;
        if !active {
            return None;
        }
        let screens = xinerama::query_screens(&self.conn).get_reply().ok()?;
        Some(
            screens
                .screen_info()
                .map(|s| Rectangle::new(s.x_org() as i32, s.y_org() as i32, s.width() as i32, s.height() as i32))
                .collect(),
        )
    }

    fn randr_monitors(&self) -> Option<Vec<Rectangle>> {
        let resources = randr::get_screen_resources(&self.conn, self.root)
            .get_reply()
            .ok()?;
        Some(
            resources
                .crtcs()
                .iter()
                .flat_map(|c| randr::get_crtc_info(&self.conn, *c, 0).get_reply())
                .map(|c| Rectangle::new(c.x() as i32, c.y() as i32, c.width() as i32, c.height() as i32))
                .filter(|r| r.w > 0)
                .collect(),
        )
    }
}

impl XConn for XcbConnection {
    fn root(&self) -> Window {
        self.root
    }

    fn screen_size(&self) -> (i32, i32) {
        self.screen()
            .map(|s| (s.width_in_pixels() as i32, s.height_in_pixels() as i32))
            .unwrap_or((0, 0))
    }

    fn flush(&self) -> bool {
        self.conn.flush()
    }

    fn sync(&self) {
        self.round_trip();
        self.pump(false);
    }

    fn suppress_errors(&self, on: bool) {
        self.suppress.set(on);
    }

    fn next_event(&self) -> Result<XEvent> {
        loop {
            let queued = self.queued.borrow_mut().pop_front();
            let event = match queued {
                Some(e) => e,
                None => {
                    self.conn.flush();
                    self.conn.wait_for_event().context("X connection closed")?
                }
            };

            if event.response_type() & XCB_RESPONSE_TYPE_MASK == 0 {
                let err = self.protocol_error(&event);
                if self.suppress.get() || err.class() == ErrorClass::Ignored {
                    debug!("ignoring {}", err);
                    continue;
                }
                return Err(err.into());
            }

            if let Some(e) = self.decode(&event) {
                return Ok(e);
            }
        }
    }

    fn drain_enter_events(&self) {
        self.round_trip();
        self.pump(true);
    }

    fn monitor_regions(&self) -> Vec<Rectangle> {
        self.xinerama_screens()
            .filter(|s| !s.is_empty())
            .or_else(|| self.randr_monitors().filter(|m| !m.is_empty()))
            .unwrap_or_default()
    }

    fn query_tree(&self) -> Vec<Window> {
        xcb::query_tree(&self.conn, self.root)
            .get_reply()
            .map(|r| r.children().to_vec())
            .unwrap_or_default()
    }

    fn window_attributes(&self, win: Window) -> Option<WindowAttributes> {
        let attrs = xcb::get_window_attributes(&self.conn, win).get_reply().ok()?;
        let geom = xcb::get_geometry(&self.conn, win).get_reply().ok()?;
        Some(WindowAttributes {
            override_redirect: attrs.override_redirect(),
            viewable: attrs.map_state() == xcb::MAP_STATE_VIEWABLE as u8,
            geom: Rectangle::new(
                geom.x() as i32,
                geom.y() as i32,
                geom.width() as i32,
                geom.height() as i32,
            ),
            border_width: geom.border_width() as i32,
        })
    }

    fn wm_state(&self, win: Window) -> Option<WmState> {
        let state = self.get_prop32(win, self.atoms.WM_STATE, self.atoms.WM_STATE, 2)?;
        match state.first() {
            Some(0) => Some(WmState::Withdrawn),
            Some(1) => Some(WmState::Normal),
            Some(3) => Some(WmState::Iconic),
            _ => None,
        }
    }

    fn set_wm_state(&self, win: Window, state: WmState) {
        xcb::change_property(
            &self.conn,
            PROP_MODE_REPLACE,
            win,
            self.atoms.WM_STATE,
            self.atoms.WM_STATE,
            32,
            &[state as u32, xcb::NONE],
        );
    }

    fn title(&self, win: Window) -> Option<String> {
        ewmh::get_wm_name(&self.conn, win)
            .get_reply()
            .ok()
            .map(|r| r.string().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                icccm::get_wm_name(&self.conn, win)
                    .get_reply()
                    .ok()
                    .map(|r| r.name().to_string())
                    .filter(|s| !s.is_empty())
            })
    }

    fn root_name(&self) -> Option<String> {
        icccm::get_wm_name(&self.conn, self.root)
            .get_reply()
            .ok()
            .map(|r| r.name().to_string())
            .filter(|s| !s.is_empty())
    }

    fn class_hint(&self, win: Window) -> (String, String) {
        match icccm::get_wm_class(&self.conn, win).get_reply() {
            Ok(r) => (r.instance().to_string(), r.class().to_string()),
            Err(_) => (BROKEN.to_string(), BROKEN.to_string()),
        }
    }

    fn transient_for(&self, win: Window) -> Option<Window> {
        self.get_prop32(win, xcb::ATOM_WM_TRANSIENT_FOR, xcb::ATOM_WINDOW, 1)
            .and_then(|v| v.first().copied())
            .filter(|w| *w != xcb::NONE)
    }

    fn size_hints(&self, win: Window) -> Option<NormalHints> {
        let raw = self.get_prop32(win, xcb::ATOM_WM_NORMAL_HINTS, xcb::ATOM_WM_SIZE_HINTS, 18)?;
        NormalHints::from_raw(&raw)
    }

    fn wm_hints(&self, win: Window) -> Option<WmHints> {
        let raw = self.get_prop32(win, xcb::ATOM_WM_HINTS, xcb::ATOM_WM_HINTS, 9)?;
        WmHints::from_raw(&raw)
    }

    fn set_urgency(&self, win: Window, urgent: bool) {
        let mut raw = match self.get_prop32(win, xcb::ATOM_WM_HINTS, xcb::ATOM_WM_HINTS, 9) {
            Some(raw) => raw,
            None => return,
        };
        if urgent {
            raw[0] |= URGENCY_HINT;
        } else {
            raw[0] &= !URGENCY_HINT;
        }
        xcb::change_property(
            &self.conn,
            PROP_MODE_REPLACE,
            win,
            xcb::ATOM_WM_HINTS,
            xcb::ATOM_WM_HINTS,
            32,
            &raw,
        );
    }

    fn is_dialog(&self, win: Window) -> bool {
        self.atom_prop(win, self.atoms._NET_WM_WINDOW_TYPE) == Some(self.atoms._NET_WM_WINDOW_TYPE_DIALOG)
    }

    fn requests_fullscreen(&self, win: Window) -> bool {
        self.atom_prop(win, self.atoms._NET_WM_STATE) == Some(self.atoms._NET_WM_STATE_FULLSCREEN)
    }

    fn set_fullscreen_state(&self, win: Window, fullscreen: bool) {
        let data: &[Atom] = if fullscreen {
            &[self.atoms._NET_WM_STATE_FULLSCREEN]
        } else {
            &[]
        };
        xcb::change_property(
            &self.conn,
            PROP_MODE_REPLACE,
            win,
            self.atoms._NET_WM_STATE,
            xcb::ATOM_ATOM,
            32,
            data,
        );
    }

    fn send_protocol(&self, win: Window, proto: Protocol) -> bool {
        let atom = match proto {
            Protocol::Delete => self.atoms.WM_DELETE_WINDOW,
            Protocol::TakeFocus => self.atoms.WM_TAKE_FOCUS,
        };
        let supported = icccm::get_wm_protocols(&self.conn, win, self.atoms.WM_PROTOCOLS)
            .get_reply()
            .map(|r| r.atoms().contains(&atom))
            .unwrap_or(false);

        if supported {
            let data = xcb::ClientMessageData::from_data32([atom, xcb::CURRENT_TIME, 0, 0, 0]);
            let event = xcb::ClientMessageEvent::new(32, win, self.atoms.WM_PROTOCOLS, data);
            xcb::send_event(&self.conn, false, win, xcb::EVENT_MASK_NO_EVENT, &event);
        }
        supported
    }

    fn set_active_window(&self, win: Option<Window>) {
        match win {
            Some(w) => {
                ewmh::set_active_window(&self.conn, self.preferred_screen, w);
            }
            None => {
                xcb::delete_property(&self.conn, self.root, self.atoms._NET_ACTIVE_WINDOW);
            }
        }
    }

    fn set_client_list(&self, wins: &[Window]) {
        xcb::change_property(
            &self.conn,
            PROP_MODE_REPLACE,
            self.root,
            self.atoms._NET_CLIENT_LIST,
            xcb::ATOM_WINDOW,
            32,
            wins,
        );
    }

    fn append_client_list(&self, win: Window) {
        xcb::change_property(
            &self.conn,
            PROP_MODE_APPEND,
            self.root,
            self.atoms._NET_CLIENT_LIST,
            xcb::ATOM_WINDOW,
            32,
            &[win],
        );
    }

    fn select_client_events(&self, win: Window) {
        xcb::change_window_attributes(&self.conn, win, &[(xcb::CW_EVENT_MASK, CLIENT_EVENT_MASK)]);
    }

    fn configure_window(&self, win: Window, r: Rectangle, border_width: i32) {
        xcb::configure_window(
            &self.conn,
            win,
            &[
                (CONFIG_WINDOW_X, r.x as u32),
                (CONFIG_WINDOW_Y, r.y as u32),
                (CONFIG_WINDOW_WIDTH, r.w as u32),
                (CONFIG_WINDOW_HEIGHT, r.h as u32),
                (CONFIG_WINDOW_BORDER_WIDTH, border_width as u32),
            ],
        );
    }

    fn set_border_width(&self, win: Window, border_width: i32) {
        xcb::configure_window(&self.conn, win, &[(CONFIG_WINDOW_BORDER_WIDTH, border_width as u32)]);
    }

    fn move_window(&self, win: Window, x: i32, y: i32) {
        xcb::configure_window(
            &self.conn,
            win,
            &[(CONFIG_WINDOW_X, x as u32), (CONFIG_WINDOW_Y, y as u32)],
        );
    }

    fn move_resize(&self, win: Window, r: Rectangle) {
        xcb::configure_window(
            &self.conn,
            win,
            &[
                (CONFIG_WINDOW_X, r.x as u32),
                (CONFIG_WINDOW_Y, r.y as u32),
                (CONFIG_WINDOW_WIDTH, r.w as u32),
                (CONFIG_WINDOW_HEIGHT, r.h as u32),
            ],
        );
    }

    fn send_configure_notify(&self, win: Window, r: Rectangle, border_width: i32) {
        let event = xcb::ConfigureNotifyEvent::new(
            win,
            win,
            xcb::NONE,
            r.x as i16,
            r.y as i16,
            r.w as u16,
            r.h as u16,
            border_width as u16,
            false,
        );
        xcb::send_event(&self.conn, false, win, xcb::EVENT_MASK_STRUCTURE_NOTIFY, &event);
    }

    fn forward_configure_request(&self, req: &ConfigureRequest) {
        let fields = [
            (CONFIG_WINDOW_X, req.x as u32),
            (CONFIG_WINDOW_Y, req.y as u32),
            (CONFIG_WINDOW_WIDTH, req.w as u32),
            (CONFIG_WINDOW_HEIGHT, req.h as u32),
            (CONFIG_WINDOW_BORDER_WIDTH, req.border_width as u32),
            (CONFIG_WINDOW_SIBLING, req.sibling),
            (CONFIG_WINDOW_STACK_MODE, req.stack_mode as u32),
        ];
        let values: Vec<(u16, u32)> = fields.iter().copied().filter(|(f, _)| req.has(*f)).collect();
        xcb::configure_window(&self.conn, req.id, &values);
    }

    fn set_border_color(&self, win: Window, pixel: u32) {
        xcb::change_window_attributes(&self.conn, win, &[(xcb::CW_BORDER_PIXEL, pixel)]);
    }

    fn map_window(&self, win: Window) {
        xcb::map_window(&self.conn, win);
    }

    fn unmap_window(&self, win: Window) {
        xcb::unmap_window(&self.conn, win);
    }

    fn raise_window(&self, win: Window) {
        xcb::configure_window(
            &self.conn,
            win,
            &[(CONFIG_WINDOW_STACK_MODE, xcb::STACK_MODE_ABOVE as u32)],
        );
    }

    fn stack_below(&self, win: Window, sibling: Window) {
        xcb::configure_window(
            &self.conn,
            win,
            &[
                (CONFIG_WINDOW_SIBLING, sibling),
                (CONFIG_WINDOW_STACK_MODE, xcb::STACK_MODE_BELOW as u32),
            ],
        );
    }

    fn focus_window(&self, win: Option<Window>) {
        let target = win.unwrap_or(self.root);
        xcb::set_input_focus(&self.conn, INPUT_FOCUS_POINTER_ROOT, target, xcb::CURRENT_TIME);
    }

    fn ungrab_buttons(&self, win: Window) {
        xcb::ungrab_button(&self.conn, xcb::BUTTON_INDEX_ANY as u8, win, xcb::MOD_MASK_ANY as u16);
    }

    fn grab_any_button(&self, win: Window) {
        xcb::grab_button(
            &self.conn,
            false,
            win,
            BUTTON_MASK as u16,
            GRAB_MODE_SYNC,
            GRAB_MODE_SYNC,
            xcb::NONE,
            xcb::NONE,
            xcb::BUTTON_INDEX_ANY as u8,
            xcb::MOD_MASK_ANY as u16,
        );
    }

    fn grab_button(&self, win: Window, button: u8, mods: u16) {
        xcb::grab_button(
            &self.conn,
            false,
            win,
            BUTTON_MASK as u16,
            GRAB_MODE_ASYNC,
            GRAB_MODE_SYNC,
            xcb::NONE,
            xcb::NONE,
            button,
            mods,
        );
    }

    fn allow_replay_pointer(&self) {
        xcb::allow_events(&self.conn, xcb::ALLOW_REPLAY_POINTER as u8, xcb::CURRENT_TIME);
    }

    fn ungrab_keys(&self) {
        xcb::ungrab_key(&self.conn, xcb::GRAB_ANY as u8, self.root, xcb::MOD_MASK_ANY as u16);
    }

    fn grab_key(&self, keysym: u32, mods: u16) {
        for code in self.keymap.borrow().keycodes(keysym) {
            // xcb docs: https://www.mankier.com/3/xcb_grab_key
            xcb::grab_key(
                &self.conn,      // xcb connection to X11
                true,            // report the event relative to the grab window
                self.root,       // the window to grab: in this case the root window
                mods,            // modifiers to grab
                code,            // keycode to grab
                GRAB_MODE_ASYNC, // don't lock pointer input while grabbing
                GRAB_MODE_ASYNC, // don't lock keyboard input while grabbing
            );
        }
    }

    fn keysym_for(&self, code: xcb::Keycode) -> u32 {
        self.keymap.borrow().keysym(code)
    }

    fn numlock_mask(&self) -> u16 {
        let reply = match xcb::get_modifier_mapping(&self.conn).get_reply() {
            Ok(r) => r,
            Err(_) => return 0,
        };
        let numlock = self.keymap.borrow().keycodes(XK_NUM_LOCK);
        let per = reply.keycodes_per_modifier() as usize;
        if per == 0 {
            return 0;
        }

        reply
            .keycodes()
            .chunks(per)
            .take(8)
            .position(|codes| codes.iter().any(|c| *c != 0 && numlock.contains(c)))
            .map_or(0, |i| 1 << i)
    }

    fn refresh_keyboard_mapping(&self) {
        match KeyboardMap::load(&self.conn) {
            Ok(map) => *self.keymap.borrow_mut() = map,
            Err(e) => warn!("{:#}", e),
        }
    }

    fn grab_pointer(&self, cursor: CursorKind) -> bool {
        xcb::grab_pointer(
            &self.conn,
            false,
            self.root,
            MOUSE_MASK as u16,
            GRAB_MODE_ASYNC,
            GRAB_MODE_ASYNC,
            xcb::NONE,
            self.cursors.get(cursor),
            xcb::CURRENT_TIME,
        )
        .get_reply()
        .map(|r| r.status() == xcb::GRAB_STATUS_SUCCESS as u8)
        .unwrap_or(false)
    }

    fn ungrab_pointer(&self) {
        xcb::ungrab_pointer(&self.conn, xcb::CURRENT_TIME);
    }

    fn query_pointer(&self) -> Option<(i32, i32)> {
        xcb::query_pointer(&self.conn, self.root)
            .get_reply()
            .ok()
            .map(|r| (r.root_x() as i32, r.root_y() as i32))
    }

    fn warp_pointer(&self, win: Window, x: i32, y: i32) {
        xcb::warp_pointer(&self.conn, xcb::NONE, win, 0, 0, 0, 0, x as i16, y as i16);
    }

    fn kill_client(&self, win: Window) {
        xcb::kill_client(&self.conn, win);
    }

    fn grab_server(&self) {
        xcb::grab_server(&self.conn);
    }

    fn ungrab_server(&self) {
        xcb::ungrab_server(&self.conn);
    }

    fn create_bar(&self, r: Rectangle) -> Window {
        let win = self.conn.generate_id();
        let visual = self.screen().map_or(xcb::COPY_FROM_PARENT, |s| s.root_visual());
        xcb::create_window(
            &self.conn,
            xcb::COPY_FROM_PARENT as u8,
            win,
            self.root,
            r.x as i16,
            r.y as i16,
            r.w as u16,
            r.h as u16,
            0,
            xcb::WINDOW_CLASS_INPUT_OUTPUT as u16,
            visual,
            &[
                (xcb::CW_BACK_PIXMAP, xcb::BACK_PIXMAP_PARENT_RELATIVE),
                (xcb::CW_OVERRIDE_REDIRECT, 1),
                (xcb::CW_EVENT_MASK, xcb::EVENT_MASK_BUTTON_PRESS | xcb::EVENT_MASK_EXPOSURE),
                (xcb::CW_CURSOR, self.cursors.get(CursorKind::Normal)),
            ],
        );
        xcb::map_window(&self.conn, win);
        self.raise_window(win);
        win
    }

    fn destroy_window(&self, win: Window) {
        xcb::destroy_window(&self.conn, win);
    }

    fn init_root(&self, wm_name: &str) -> Result<()> {
        xcb::change_window_attributes_checked(
            &self.conn,
            self.root,
            &[
                (xcb::CW_EVENT_MASK, ROOT_EVENT_MASK),
                (xcb::CW_CURSOR, self.cursors.get(CursorKind::Normal)),
            ],
        )
        .request_check()
        .context("Could not select root window events")?;

        for win in &[self.check_win, self.root] {
            xcb::change_property(
                &self.conn,
                PROP_MODE_REPLACE,
                *win,
                self.atoms._NET_SUPPORTING_WM_CHECK,
                xcb::ATOM_WINDOW,
                32,
                &[self.check_win],
            );
        }
        xcb::change_property(
            &self.conn,
            PROP_MODE_REPLACE,
            self.check_win,
            self.atoms._NET_WM_NAME,
            self.atoms.UTF8_STRING,
            8,
            wm_name.as_bytes(),
        );
        xcb::change_property(
            &self.conn,
            PROP_MODE_REPLACE,
            self.root,
            self.atoms._NET_SUPPORTED,
            xcb::ATOM_ATOM,
            32,
            &self.atoms.net_supported(),
        );
        xcb::delete_property(&self.conn, self.root, self.atoms._NET_CLIENT_LIST);
        self.conn.flush();
        Ok(())
    }

    fn cleanup(&self) {
        self.ungrab_keys();
        self.cursors.free(&self.conn);
        xcb::destroy_window(&self.conn, self.check_win);
        xcb::set_input_focus(&self.conn, INPUT_FOCUS_POINTER_ROOT, xcb::INPUT_FOCUS_POINTER_ROOT, xcb::CURRENT_TIME);
        xcb::delete_property(&self.conn, self.root, self.atoms._NET_ACTIVE_WINDOW);
        self.round_trip();
        self.conn.flush();
    }
}
