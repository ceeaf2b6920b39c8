use std::{
    collections::HashMap,
    os::unix::process::CommandExt,
    process::{Command, Stdio},
};

use anyhow::{anyhow, Result};

use crate::{layout::Layout, tag::TagMask};

pub const MOD_SHIFT: u16 = xcb::MOD_MASK_SHIFT as u16;
pub const MOD_LOCK: u16 = xcb::MOD_MASK_LOCK as u16;
pub const MOD_CONTROL: u16 = xcb::MOD_MASK_CONTROL as u16;
pub const MOD_1: u16 = xcb::MOD_MASK_1 as u16;
pub const MOD_4: u16 = xcb::MOD_MASK_4 as u16;
const MOD_ALL: u16 = (xcb::MOD_MASK_SHIFT
    | xcb::MOD_MASK_CONTROL
    | xcb::MOD_MASK_1
    | xcb::MOD_MASK_2
    | xcb::MOD_MASK_3
    | xcb::MOD_MASK_4
    | xcb::MOD_MASK_5) as u16;

/// Something a key or button binding does
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Spawn(Vec<String>),
    ToggleBar,
    FocusStack(i32),
    IncNMaster(i32),
    SetMFact(f32),
    Zoom,
    /// Show exactly these tags. Zero flips back to the previous tag-set
    View(TagMask),
    ToggleView(TagMask),
    Tag(TagMask),
    ToggleTag(TagMask),
    KillClient,
    /// Switch to this layout, or to the other remembered one when `None`
    SetLayout(Option<Layout>),
    ToggleFloating,
    ToggleFullscreen,
    FocusMon(i32),
    TagMon(i32),
    MoveMouse,
    ResizeMouse,
    Quit,
    Restart,
}

impl Action {
    /// Tag bar buttons bound with a zero mask act on the clicked tag
    pub fn with_clicked_tag(&self, clicked: TagMask) -> Action {
        match self {
            Action::View(0) => Action::View(clicked),
            Action::ToggleView(0) => Action::ToggleView(clicked),
            Action::Tag(0) => Action::Tag(clicked),
            Action::ToggleTag(0) => Action::ToggleTag(clicked),
            other => other.clone(),
        }
    }
}

/// Where a mouse button was pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    TagBar,
    LtSymbol,
    StatusText,
    WinTitle,
    ClientWin,
    RootWin,
}

/// A parsed key binding
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub mod_mask: u16,
    pub keysym: u32,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub click: Click,
    pub mod_mask: u16,
    pub button: u8,
    pub action: Action,
}

lazy_static! {
    /// Keysym values of the key names usable in bindings
    static ref KEYSYMS: HashMap<String, u32> = {
        let mut m = HashMap::new();
        for c in b'a'..=b'z' {
            m.insert((c as char).to_string(), c as u32);
        }
        for c in b'0'..=b'9' {
            m.insert((c as char).to_string(), c as u32);
        }
        for i in 0..12u32 {
            m.insert(format!("F{}", i + 1), 0xffbe + i);
        }
        let named: &[(&str, u32)] = &[
            ("space", 0x20),
            ("comma", 0x2c),
            ("minus", 0x2d),
            ("period", 0x2e),
            ("slash", 0x2f),
            ("semicolon", 0x3b),
            ("equal", 0x3d),
            ("bracketleft", 0x5b),
            ("backslash", 0x5c),
            ("bracketright", 0x5d),
            ("grave", 0x60),
            ("BackSpace", 0xff08),
            ("Tab", 0xff09),
            ("Return", 0xff0d),
            ("Escape", 0xff1b),
            ("Delete", 0xffff),
            ("Home", 0xff50),
            ("Left", 0xff51),
            ("Up", 0xff52),
            ("Right", 0xff53),
            ("Down", 0xff54),
            ("Page_Up", 0xff55),
            ("Page_Down", 0xff56),
            ("End", 0xff57),
            ("Print", 0xff61),
        ];
        for (name, sym) in named {
            m.insert(name.to_string(), *sym);
        }
        m
    };
}

/**
 * Convert user friendly key bindings into a modifier mask and keysym.
 *
 * Bindings are of the form '<MOD>-<key name>' with multiple modifiers being
 * allowed, and key names being X keysym names.
 *
 * Allowed modifiers are:
 *   M - Super
 *   A - Alt
 *   C - Ctrl
 *   S - Shift
 */
pub fn parse_key_binding(pattern: &str) -> Result<(u16, u32)> {
    let mut parts: Vec<&str> = pattern.split('-').collect();
    let name = parts.pop().unwrap_or_default();
    let keysym = KEYSYMS
        .get(name)
        .copied()
        .ok_or_else(|| anyhow!("unknown key name '{}' in binding '{}'", name, pattern))?;

    let mask = parts.iter().try_fold(0, |acc, s| {
        let m = match *s {
            "A" => MOD_1,
            "M" => MOD_4,
            "S" => MOD_SHIFT,
            "C" => MOD_CONTROL,
            _ => return Err(anyhow!("invalid key binding prefix '{}' in '{}'", s, pattern)),
        };
        Ok(acc | m)
    })?;

    Ok((mask, keysym))
}

/// Strip lock modifiers so that bindings work regardless of Caps/Num Lock
pub fn clean_mask(mask: u16, numlock: u16) -> u16 {
    mask & !(numlock | MOD_LOCK) & MOD_ALL
}

/// Lock modifier combinations each grab is repeated with
pub fn lock_variants(numlock: u16) -> [u16; 4] {
    [0, MOD_LOCK, numlock, numlock | MOD_LOCK]
}

/**
 * Run an external command in its own session.
 *
 * This redirects the process stdout to /dev/null.
 * Logs a warning if there were any errors in kicking off the process.
 */
pub fn spawn(args: &[String]) {
    let (prog, rest) = match args.split_first() {
        Some(split) => split,
        None => return,
    };

    let mut cmd = Command::new(prog);
    cmd.args(rest).stdout(Stdio::null());
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    if let Err(e) = cmd.spawn() {
        warn!("error spawning external program '{}': {}", prog, e);
    }
}
