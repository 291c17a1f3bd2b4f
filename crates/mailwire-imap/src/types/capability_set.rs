//! Bitset of server capabilities.

use std::ops::{BitAnd, BitOr};

use super::Capability;

/// The set of extensions a server advertised in one capability announcement.
///
/// Backed by a single `u64`, one bit per [`Capability`]. The set is a
/// passive record: it answers membership queries and never enforces policy.
/// A value is `Copy`, so every snapshot is independent of the live set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u64);

impl CapabilitySet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Builds a set from raw bits, dropping bits no tag is assigned to.
    #[must_use]
    pub fn from_bits_truncate(bits: u64) -> Self {
        Capability::ALL
            .iter()
            .filter(|cap| bits & cap.bit() != 0)
            .copied()
            .collect()
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Normalizes raw capability tokens into a set.
    ///
    /// Matching ignores case, duplicates collapse, and tokens that do not
    /// name a known extension are skipped. Parameterized families set their
    /// base tag (`THREAD=REFERENCES` sets [`Capability::Thread`]).
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .filter_map(|token| token_capability(token.as_ref()))
            .collect()
    }

    /// Replaces the whole set with `tags`.
    ///
    /// This is never a merge: a tag missing from `tags` is gone afterwards.
    pub fn refresh(&mut self, tags: Self) {
        *self = tags;
    }

    /// Returns an independent copy of the current contents.
    #[must_use]
    pub const fn snapshot(&self) -> Self {
        *self
    }

    /// Returns `true` if `tag` is present.
    #[must_use]
    pub const fn has(self, tag: Capability) -> bool {
        self.0 & tag.bit() != 0
    }

    /// Returns `true` if at least one tag of `tags` is present.
    ///
    /// Always `false` for an empty query.
    #[must_use]
    pub const fn has_any(self, tags: Self) -> bool {
        self.0 & tags.0 != 0
    }

    /// Returns `true` if every tag of `tags` is present.
    ///
    /// Vacuously `true` for an empty query.
    #[must_use]
    pub const fn has_all(self, tags: Self) -> bool {
        self.0 & tags.0 == tags.0
    }

    /// Adds a tag. Returns `true` if it was not already present.
    pub fn insert(&mut self, tag: Capability) -> bool {
        let added = !self.has(tag);
        self.0 |= tag.bit();
        added
    }

    /// Removes a tag. Returns `true` if it was present.
    pub fn remove(&mut self, tag: Capability) -> bool {
        let present = self.has(tag);
        self.0 &= !tag.bit();
        present
    }

    /// Returns the tags present in either set.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the tags present in both sets.
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Returns the tags present in `self` but not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Returns `true` if no tag is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the number of tags present.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates over the present tags in bit order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |cap| self.has(*cap))
    }
}

/// Maps one announcement token onto a tag, if it names one.
fn token_capability(token: &str) -> Option<Capability> {
    if let Some(cap) = Capability::parse(token) {
        return Some(cap);
    }

    let upper = token.to_ascii_uppercase();
    if upper == "METADATA-SERVER" {
        return Some(Capability::Metadata);
    }

    let (family, _) = upper.split_once('=')?;
    match family {
        "COMPRESS" => Some(Capability::Compress),
        "THREAD" => Some(Capability::Thread),
        "CONTEXT" => Some(Capability::Context),
        "APPENDLIMIT" => Some(Capability::AppendLimit),
        _ => None,
    }
}

impl From<Capability> for CapabilitySet {
    fn from(tag: Capability) -> Self {
        Self(tag.bit())
    }
}

impl<const N: usize> From<[Capability; N]> for CapabilitySet {
    fn from(tags: [Capability; N]) -> Self {
        tags.into_iter().collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<Capability> for CapabilitySet {
    fn extend<T: IntoIterator<Item = Capability>>(&mut self, iter: T) {
        for tag in iter {
            self.0 |= tag.bit();
        }
    }
}

impl BitOr for CapabilitySet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOr<Capability> for CapabilitySet {
    type Output = Self;

    fn bitor(self, rhs: Capability) -> Self {
        self.union(rhs.into())
    }
}

impl BitAnd for CapabilitySet {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, cap) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(cap.atom())?;
        }
        Ok(())
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
    use proptest::prelude::*;

    #[test]
    fn default_is_empty() {
        let set = CapabilitySet::default();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert_eq!(set, CapabilitySet::EMPTY);
    }

    #[test]
    fn refresh_with_empty_clears() {
        let mut set = CapabilitySet::from([Capability::Idle, Capability::Move]);
        set.refresh(CapabilitySet::EMPTY);
        assert!(set.is_empty());
    }

    #[test]
    fn refresh_is_full_replace() {
        let mut set = CapabilitySet::new();
        set.refresh(CapabilitySet::from([Capability::Idle, Capability::Move]));
        set.refresh(CapabilitySet::from([Capability::Idle]));
        assert!(set.has(Capability::Idle));
        assert!(!set.has(Capability::Move));
    }

    #[test]
    fn snapshot_does_not_track_later_refresh() {
        let mut set = CapabilitySet::from([Capability::LoginDisabled]);
        let before = set.snapshot();
        set.refresh(CapabilitySet::from([Capability::Imap4Rev1]));
        assert!(before.has(Capability::LoginDisabled));
        assert!(!set.has(Capability::LoginDisabled));
    }

    #[test]
    fn qresync_gate_needs_both_tags() {
        let gate = CapabilitySet::from([Capability::CondStore, Capability::QuickResync]);
        assert!(!CapabilitySet::from([Capability::CondStore]).has_all(gate));
        assert!(CapabilitySet::from([Capability::CondStore]).has_any(gate));
        assert!(
            CapabilitySet::from([
                Capability::CondStore,
                Capability::QuickResync,
                Capability::Idle
            ])
            .has_all(gate)
        );
    }

    #[test]
    fn empty_queries() {
        let set = CapabilitySet::from([Capability::Idle]);
        assert!(set.has_all(CapabilitySet::EMPTY));
        assert!(!set.has_any(CapabilitySet::EMPTY));
    }

    #[test]
    fn from_tokens_normalizes() {
        let set = CapabilitySet::from_tokens([
            "imap4rev1",
            "IMAP4REV1",
            "Idle",
            "AUTH=PLAIN",
            "X-UNKNOWN-EXT",
            "THREAD=REFERENCES",
            "COMPRESS=DEFLATE",
            "METADATA-SERVER",
        ]);
        assert_eq!(
            set,
            CapabilitySet::from([
                Capability::Imap4Rev1,
                Capability::Idle,
                Capability::Thread,
                Capability::Compress,
                Capability::Metadata,
            ])
        );
    }

    #[test]
    fn from_tokens_ignores_garbage() {
        let set = CapabilitySet::from_tokens(["", "=", "AUTH=", "???"]);
        assert!(set.is_empty());
    }

    #[test]
    fn insert_and_remove_report_change() {
        let mut set = CapabilitySet::new();
        assert!(set.insert(Capability::Move));
        assert!(!set.insert(Capability::Move));
        assert!(set.remove(Capability::Move));
        assert!(!set.remove(Capability::Move));
    }

    #[test]
    fn set_algebra() {
        let a = CapabilitySet::from([Capability::Idle, Capability::Move]);
        let b = CapabilitySet::from([Capability::Move, Capability::Sort]);
        assert_eq!(a | b, CapabilitySet::from([Capability::Idle, Capability::Move, Capability::Sort]));
        assert_eq!(a & b, CapabilitySet::from([Capability::Move]));
        assert_eq!(a.difference(b), CapabilitySet::from([Capability::Idle]));
        assert_eq!(a | Capability::Id, a.union(Capability::Id.into()));
    }

    #[test]
    fn highest_bit_does_not_collide() {
        let set = CapabilitySet::from(Capability::ALL);
        assert_eq!(set.len(), Capability::ALL.len());
        assert!(set.has(Capability::YahooHighestModSeq));
        assert_eq!(set.bits() >> 63, 1);
        let without = set.difference(Capability::YahooHighestModSeq.into());
        assert_eq!(without.len(), Capability::ALL.len() - 1);
        assert!(without.has(Capability::Imap4));
    }

    #[test]
    fn from_bits_truncate_drops_unassigned() {
        let set = CapabilitySet::from_bits_truncate(u64::MAX);
        assert_eq!(set, CapabilitySet::from(Capability::ALL));
        assert!(CapabilitySet::from_bits_truncate(1 << 50).is_empty());
    }

    #[test]
    fn display_lists_atoms_in_bit_order() {
        let set = CapabilitySet::from([Capability::Idle, Capability::Imap4Rev1]);
        assert_eq!(set.to_string(), "IMAP4rev1 IDLE");
        assert_eq!(CapabilitySet::EMPTY.to_string(), "");
    }

    fn mixed_case(s: &str, upper: &[bool]) -> String {
        s.chars()
            .zip(upper.iter().chain(std::iter::repeat(&false)))
            .map(|(c, &up)| if up { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
            .collect()
    }

    /// Announcement tokens paired with the tag each one must normalize to.
    fn labelled_token() -> impl Strategy<Value = (String, Option<Capability>)> {
        let atom = || proptest::sample::select(Capability::ALL.to_vec());
        prop_oneof![
            atom().prop_map(|c| (c.atom().to_string(), Some(c))),
            (atom(), proptest::collection::vec(any::<bool>(), 24))
                .prop_map(|(c, upper)| (mixed_case(c.atom(), &upper), Some(c))),
            "[Tt][Hh][Rr][Ee][Aa][Dd]=[A-Za-z]{1,12}"
                .prop_map(|t| (t, Some(Capability::Thread))),
            "[Cc][Oo][Mm][Pp][Rr][Ee][Ss][Ss]=[A-Za-z]{1,8}"
                .prop_map(|t| (t, Some(Capability::Compress))),
            "[Cc][Oo][Nn][Tt][Ee][Xx][Tt]=[A-Za-z]{1,8}"
                .prop_map(|t| (t, Some(Capability::Context))),
            "[Aa][Pp][Pp][Ee][Nn][Dd][Ll][Ii][Mm][Ii][Tt]=[0-9]{1,9}"
                .prop_map(|t| (t, Some(Capability::AppendLimit))),
            "[Mm][Ee][Tt][Aa][Dd][Aa][Tt][Aa]-[Ss][Ee][Rr][Vv][Ee][Rr]"
                .prop_map(|t| (t, Some(Capability::Metadata))),
            "[Xx]-[A-Za-z]{3,8}".prop_map(|t| (t, None)),
            "[Aa][Uu][Tt][Hh]=[A-Z0-9-]{1,10}".prop_map(|t| (t, None)),
        ]
    }

    fn token() -> impl Strategy<Value = String> {
        labelled_token().prop_map(|(token, _)| token)
    }

    proptest! {
        #[test]
        fn refresh_then_snapshot_equals_normalized(
            labelled in proptest::collection::vec(labelled_token(), 0..24)
        ) {
            let expected: CapabilitySet = labelled.iter().filter_map(|(_, tag)| *tag).collect();
            let tokens: Vec<&str> = labelled.iter().map(|(token, _)| token.as_str()).collect();
            let mut set = CapabilitySet::new();
            set.refresh(CapabilitySet::from_tokens(&tokens));
            prop_assert_eq!(set.snapshot(), expected);
        }

        #[test]
        fn refresh_is_idempotent(tokens in proptest::collection::vec(token(), 0..24)) {
            let parsed = CapabilitySet::from_tokens(&tokens);
            let mut once = CapabilitySet::new();
            once.refresh(parsed);
            let mut twice = CapabilitySet::new();
            twice.refresh(parsed);
            twice.refresh(parsed);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn composite_queries_match_membership(bits in any::<u64>(), x in 0usize..47, y in 0usize..47) {
            let set = CapabilitySet::from_bits_truncate(bits);
            let (x, y) = (Capability::ALL[x], Capability::ALL[y]);
            let query = CapabilitySet::from([x, y]);
            prop_assert_eq!(set.has_all(query), set.has(x) && set.has(y));
            prop_assert_eq!(set.has_any(query), set.has(x) || set.has(y));
            prop_assert!(!CapabilitySet::EMPTY.has_all(query));
            prop_assert!(!CapabilitySet::EMPTY.has_any(query));
        }
    }
}
