use crate::tag::TagMask;

/// Initial placement for windows matching a class / instance / title pattern
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub class: Option<String>,
    pub instance: Option<String>,
    pub title: Option<String>,
    pub tags: TagMask,
    pub is_floating: bool,
    /// Monitor number, -1 for wherever the window appears
    pub monitor: i32,
}

impl Rule {
    /// A pattern matches when it is absent or a substring of the property
    pub fn matches(&self, class: &str, instance: &str, title: &str) -> bool {
        let hit = |pattern: &Option<String>, value: &str| pattern.as_ref().map_or(true, |p| value.contains(p.as_str()));
        hit(&self.title, title) && hit(&self.class, class) && hit(&self.instance, instance)
    }
}

/// What the rules decided for a new window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    /// Raw mask from the rule, zero when none matched
    pub tags: TagMask,
    pub is_floating: bool,
    pub monitor: Option<usize>,
}

/**
 * Resolve the rules for a window. The first rule that matches wins and the
 * ones after it are not consulted.
 */
pub fn apply_rules(rules: &[Rule], class: &str, instance: &str, title: &str) -> Placement {
    match rules.iter().find(|r| r.matches(class, instance, title)) {
        Some(r) => {
            debug!("rule {:?} matched '{}' / '{}' / '{}'", r, class, instance, title);
            Placement {
                tags: r.tags,
                is_floating: r.is_floating,
                monitor: if r.monitor >= 0 { Some(r.monitor as usize) } else { None },
            }
        }
        None => Placement::default(),
    }
}

/// Clamp a placement mask to the configured tags, falling back to `active`
/// when nothing valid is left
pub fn resolve_tags(tags: TagMask, tagmask: TagMask, active: TagMask) -> TagMask {
    match tags & tagmask {
        0 => active,
        t => t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(class: Option<&str>, instance: Option<&str>, title: Option<&str>, tags: TagMask, floating: bool) -> Rule {
        Rule {
            class: class.map(String::from),
            instance: instance.map(String::from),
            title: title.map(String::from),
            tags,
            is_floating: floating,
            monitor: -1,
        }
    }

    #[test]
    fn substring_matching() {
        let r = rule(Some("Fire"), None, None, 0, false);
        assert!(r.matches("Firefox", "Navigator", "Mozilla"));
        assert!(!r.matches("firefox", "Navigator", "Mozilla"));

        let r = rule(Some("Firefox"), Some("Dialog"), None, 0, false);
        assert!(!r.matches("Firefox", "Navigator", ""));
        assert!(r.matches("Firefox", "Dialog", ""));

        let r = rule(None, None, Some("Picture-in-Picture"), 0, true);
        assert!(r.matches("", "", "Picture-in-Picture"));
    }

    #[test]
    fn firefox_goes_to_tag_three() {
        let rules = vec![
            rule(Some("Gimp"), None, None, 0, true),
            rule(Some("Firefox"), None, None, 0b0100, false),
        ];
        let p = apply_rules(&rules, "Firefox", "Navigator", "Mozilla Firefox");
        assert_eq!(p.tags, 0b0100);
        assert!(!p.is_floating);
        assert_eq!(resolve_tags(p.tags, 0x1ff, 1), 0b0100);
    }

    #[test]
    fn first_match_wins() {
        let rules = vec![
            rule(Some("St"), None, None, 0b10, true),
            rule(None, Some("st"), None, 0b01, false),
        ];
        let p = apply_rules(&rules, "St", "st", "");
        assert_eq!(p.tags, 0b10);
        assert!(p.is_floating);
    }

    #[test]
    fn no_match_uses_active_tags() {
        let rules = vec![rule(Some("Gimp"), None, None, 0b100, true)];
        let p = apply_rules(&rules, "xterm", "xterm", "");
        assert_eq!(p, Placement::default());
        assert_eq!(resolve_tags(p.tags, 0x1ff, 0b1000), 0b1000);
    }

    #[test]
    fn out_of_range_tags_fall_back() {
        assert_eq!(resolve_tags(1 << 12, 0x1ff, 0b1), 0b1);
        assert_eq!(resolve_tags((1 << 12) | 0b10, 0x1ff, 0b1), 0b10);
    }

    #[test]
    fn monitor_selection() {
        let mut r = rule(Some("mpv"), None, None, 0, true);
        r.monitor = 1;
        let p = apply_rules(&[r], "mpv", "gl", "");
        assert_eq!(p.monitor, Some(1));
    }
}
