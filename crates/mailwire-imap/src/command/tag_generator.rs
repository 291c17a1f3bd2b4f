//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses.

use crate::error::{ProtocolError, ProtocolErrorKind};
use crate::types::Tag;

/// Tag generator for IMAP commands.
///
/// Generates unique sequential tags in the format "A0000", "A0001", etc.
/// A session owns exactly one generator and drives it from a single thread.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Generates the next tag.
    ///
    /// # Errors
    ///
    /// Returns a fatal error once `u32::MAX` tags have been issued; the
    /// session cannot correlate replies past that point.
    pub fn next(&mut self) -> Result<Tag, ProtocolError> {
        let n = self.counter;
        self.counter = n.checked_add(1).ok_or_else(|| {
            ProtocolError::new(format!("tag counter overflow after {n} tags"))
                .with_kind(ProtocolErrorKind::TagExhausted)
        })?;
        Ok(Tag::new(format!("{}{:04}", self.prefix, n)))
    }

}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.next().unwrap(), "A0000");
        assert_eq!(generator.next().unwrap(), "A0001");
        assert_eq!(generator.next().unwrap(), "A0002");
    }

    #[test]
    fn test_custom_prefix() {
        let mut generator = TagGenerator::new('T');
        assert_eq!(generator.next().unwrap(), "T0000");
        assert_eq!(generator.next().unwrap(), "T0001");
    }

    #[test]
    fn test_counter_advances_once_per_tag() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.counter, 0);
        let _ = generator.next();
        assert_eq!(generator.counter, 1);
    }

    #[test]
    fn test_padding_grows_past_four_digits() {
        let mut generator = TagGenerator::new('X');
        generator.counter = 12345;
        assert_eq!(generator.next().unwrap(), "X12345");
    }

    #[test]
    fn test_overflow_is_fatal_error() {
        let mut generator = TagGenerator::default();
        generator.counter = u32::MAX;
        let err = generator.next().unwrap_err();
        assert_eq!(err.kind(), ProtocolErrorKind::TagExhausted);
        assert_eq!(generator.counter, u32::MAX);
    }
}
