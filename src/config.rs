use anyhow::{anyhow, Result};

use crate::{
    bindings::{parse_key_binding, Action, Button, Click, Key, MOD_1},
    layout::Layout,
    rules::Rule,
    tag::{self, TagMask, MAX_TAGS},
};

macro_rules! vec_of_strings {
    ($($x:expr),*) => (vec![$($x.to_string()),*]);
}

/// A key binding before its key name has been resolved
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBinding {
    /// '<MOD>-<key name>', see [parse_key_binding]
    pub pattern: String,
    pub action: Action,
}

impl KeyBinding {
    pub fn new(pattern: &str, action: Action) -> KeyBinding {
        KeyBinding {
            pattern: pattern.to_string(),
            action,
        }
    }
}

/// The main user facing configuration details
#[derive(Debug, Clone)]
pub struct Config {
    /// Tag names shown in the bar. Must have between 1 and 31 elements.
    pub tags: Vec<String>,
    /// Core X font names, the first that loads is used
    pub fonts: Vec<String>,
    /// [foreground, background, border] of the normal and the selected scheme
    pub colors: [[String; 3]; 2],
    /// The width of window borders in pixels
    pub border_px: i32,
    /// Distance in pixels at which a moved window snaps to a monitor edge
    pub snap: i32,
    /// Whether or not a bar is shown
    pub showbar: bool,
    /// True if the bar should be at the top of the screen, false if it should be at the bottom
    pub topbar: bool,
    /// Fraction of the window area taken by the master column
    pub mfact: f32,
    /// Number of clients in the master column
    pub nmaster: u32,
    /// Respect size hints of tiled clients too
    pub resize_hints: bool,
    /// Focus does not follow the pointer away from a fullscreen window
    pub lock_fullscreen: bool,
    /// The first two become each monitor's initial layout pair
    pub layouts: Vec<Layout>,
    pub rules: Vec<Rule>,
    pub keys: Vec<KeyBinding>,
    pub buttons: Vec<Button>,
}

fn spawn(cmd: &[&str]) -> Action {
    Action::Spawn(cmd.iter().map(|s| s.to_string()).collect())
}

fn rule(class: &str, tags: TagMask, is_floating: bool) -> Rule {
    Rule {
        class: Some(class.to_string()),
        instance: None,
        title: None,
        tags,
        is_floating,
        monitor: -1,
    }
}

fn button(click: Click, mod_mask: u16, button: u8, action: Action) -> Button {
    Button {
        click,
        mod_mask,
        button,
        action,
    }
}

impl Config {
    /// Mask of every configured tag
    pub fn tagmask(&self) -> TagMask {
        tag::all_tags(self.tags.len())
    }

    /// Check the tag count and resolve the key bindings
    pub fn resolve_keys(&self) -> Result<Vec<Key>> {
        if self.tags.is_empty() || self.tags.len() > MAX_TAGS {
            return Err(anyhow!("between 1 and {} tags are supported, got {}", MAX_TAGS, self.tags.len()));
        }
        self.keys
            .iter()
            .map(|k| {
                let (mod_mask, keysym) = parse_key_binding(&k.pattern)?;
                Ok(Key {
                    mod_mask,
                    keysym,
                    action: k.action.clone(),
                })
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Config {
        let mut keys = vec![
            KeyBinding::new("A-p", spawn(&["dmenu_run"])),
            KeyBinding::new("A-S-Return", spawn(&["st"])),
            KeyBinding::new("A-b", Action::ToggleBar),
            KeyBinding::new("A-j", Action::FocusStack(1)),
            KeyBinding::new("A-k", Action::FocusStack(-1)),
            KeyBinding::new("A-i", Action::IncNMaster(1)),
            KeyBinding::new("A-d", Action::IncNMaster(-1)),
            KeyBinding::new("A-h", Action::SetMFact(-0.05)),
            KeyBinding::new("A-l", Action::SetMFact(0.05)),
            KeyBinding::new("A-Return", Action::Zoom),
            KeyBinding::new("A-Tab", Action::View(0)),
            KeyBinding::new("A-S-c", Action::KillClient),
            KeyBinding::new("A-t", Action::SetLayout(Some(Layout::Tiled))),
            KeyBinding::new("A-f", Action::SetLayout(Some(Layout::Floating))),
            KeyBinding::new("A-m", Action::SetLayout(Some(Layout::Monocle))),
            KeyBinding::new("A-space", Action::SetLayout(None)),
            KeyBinding::new("A-S-space", Action::ToggleFloating),
            KeyBinding::new("A-S-f", Action::ToggleFullscreen),
            KeyBinding::new("A-0", Action::View(!0)),
            KeyBinding::new("A-S-0", Action::Tag(!0)),
            KeyBinding::new("A-comma", Action::FocusMon(-1)),
            KeyBinding::new("A-period", Action::FocusMon(1)),
            KeyBinding::new("A-S-comma", Action::TagMon(-1)),
            KeyBinding::new("A-S-period", Action::TagMon(1)),
            KeyBinding::new("A-S-q", Action::Quit),
            KeyBinding::new("A-C-S-q", Action::Restart),
        ];
        for i in 0..9 {
            let mask = tag::tag_bit(i);
            let k = i + 1;
            keys.push(KeyBinding::new(&format!("A-{}", k), Action::View(mask)));
            keys.push(KeyBinding::new(&format!("A-C-{}", k), Action::ToggleView(mask)));
            keys.push(KeyBinding::new(&format!("A-S-{}", k), Action::Tag(mask)));
            keys.push(KeyBinding::new(&format!("A-C-S-{}", k), Action::ToggleTag(mask)));
        }

        Config {
            tags: vec_of_strings!["1", "2", "3", "4", "5", "6", "7", "8", "9"],
            fonts: vec_of_strings!["-misc-fixed-medium-r-semicondensed--13-*-*-*-*-*-iso8859-1", "fixed"],
            colors: [
                // #bbbbbb on #222222
                ["#bbbbbb".to_string(), "#222222".to_string(), "#444444".to_string()],
                ["#eeeeee".to_string(), "#005577".to_string(), "#005577".to_string()],
            ],
            border_px: 1,
            snap: 32,
            showbar: true,
            topbar: true,
            mfact: 0.55,
            nmaster: 1,
            resize_hints: true,
            lock_fullscreen: true,
            layouts: vec![Layout::Tiled, Layout::Floating, Layout::Monocle],
            rules: vec![rule("Gimp", 0, true), rule("Firefox", 1 << 8, false)],
            keys,
            buttons: vec![
                button(Click::LtSymbol, 0, 1, Action::SetLayout(None)),
                button(Click::LtSymbol, 0, 3, Action::SetLayout(Some(Layout::Monocle))),
                button(Click::WinTitle, 0, 2, Action::Zoom),
                button(Click::StatusText, 0, 2, spawn(&["st"])),
                button(Click::ClientWin, MOD_1, 1, Action::MoveMouse),
                button(Click::ClientWin, MOD_1, 2, Action::ToggleFloating),
                button(Click::ClientWin, MOD_1, 3, Action::ResizeMouse),
                button(Click::TagBar, 0, 1, Action::View(0)),
                button(Click::TagBar, 0, 3, Action::ToggleView(0)),
                button(Click::TagBar, MOD_1, 1, Action::Tag(0)),
                button(Click::TagBar, MOD_1, 3, Action::ToggleTag(0)),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keys_resolve() {
        let config = Config::default();
        let keys = config.resolve_keys().unwrap();
        assert_eq!(keys.len(), config.keys.len());
        assert_eq!(config.tagmask(), 0x1ff);
    }

    #[test]
    fn bad_key_names_are_reported() {
        let mut config = Config::default();
        config.keys.push(KeyBinding::new("A-notakey", Action::Zoom));
        assert!(config.resolve_keys().is_err());
    }

    #[test]
    fn tag_count_is_bounded() {
        let mut config = Config::default();
        config.tags = (0..32).map(|i| i.to_string()).collect();
        assert!(config.resolve_keys().is_err());
        config.tags.clear();
        assert!(config.resolve_keys().is_err());
    }
}
