/// Bit i set means "member of tag i"
pub type TagMask = u32;

/// Upper bound on the number of tags so that every mask fits in a `TagMask`
pub const MAX_TAGS: usize = 31;

/// Mask with one bit set for each of the first `ntags` tags
pub fn all_tags(ntags: usize) -> TagMask {
    debug_assert!(ntags <= MAX_TAGS);
    (1 << ntags) - 1
}

/// Mask selecting only tag `index`
pub fn tag_bit(index: usize) -> TagMask {
    1 << index
}

/// Whether a window with `tags` is shown when `active` is the monitor's tag-set
pub fn intersects(tags: TagMask, active: TagMask) -> bool {
    tags & active != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_tags_sets_low_bits() {
        assert_eq!(all_tags(9), 0b1_1111_1111);
        assert_eq!(all_tags(1), 1);
        assert_eq!(all_tags(MAX_TAGS), 0x7fff_ffff);
    }

    #[test]
    fn tag_masks() {
        assert_eq!(tag_bit(2), 0b100);
        assert!(intersects(0b110, 0b100));
        assert!(!intersects(0b011, 0b100));
    }
}
