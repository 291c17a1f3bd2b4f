//! Live capability registry for one connection.
//!
//! A [`ServerCapabilities`] is created empty with its session and replaced
//! wholesale on every capability announcement: after the greeting, after
//! STARTTLS, after authentication, and on an explicit CAPABILITY. Servers
//! may drop capabilities between announcements (LOGINDISABLED usually
//! disappears after STARTTLS), so nothing is ever merged.
//!
//! The bitset answers the `has` family. Parameterized atoms that a bit
//! cannot express (`AUTH=`, `THREAD=`, `COMPRESS=`, `APPENDLIMIT=`) are kept
//! beside it and replaced together with it.

use std::collections::BTreeSet;

use crate::types::{Capability, CapabilitySet};

/// Capabilities advertised by the server on one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerCapabilities {
    set: CapabilitySet,
    auth_mechanisms: BTreeSet<String>,
    thread_algorithms: BTreeSet<String>,
    compression_algorithms: BTreeSet<String>,
    append_limit: Option<u64>,
    generation: u64,
}

impl ServerCapabilities {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the registry with a bare tag set.
    ///
    /// Parameter families are cleared, since the new announcement did not
    /// carry any.
    pub fn refresh(&mut self, tags: CapabilitySet) {
        self.set.refresh(tags);
        self.auth_mechanisms.clear();
        self.thread_algorithms.clear();
        self.compression_algorithms.clear();
        self.append_limit = None;
        self.bump();
    }

    /// Replaces the registry from the raw tokens of an announcement.
    ///
    /// Tokens are matched case-insensitively. Unknown tokens are skipped so
    /// that a future extension can never break parsing.
    pub fn refresh_from_tokens<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = CapabilitySet::new();
        let mut auth_mechanisms = BTreeSet::new();
        let mut thread_algorithms = BTreeSet::new();
        let mut compression_algorithms = BTreeSet::new();
        let mut append_limit = None;

        for token in tokens {
            let token = token.as_ref();
            let known = CapabilitySet::from_tokens([token]);
            set = set.union(known);

            let upper = token.to_ascii_uppercase();
            match upper.split_once('=') {
                Some(("AUTH", mech)) if !mech.is_empty() => {
                    auth_mechanisms.insert(mech.to_string());
                }
                Some(("THREAD", alg)) if !alg.is_empty() => {
                    thread_algorithms.insert(alg.to_string());
                }
                Some(("COMPRESS", alg)) if !alg.is_empty() => {
                    compression_algorithms.insert(alg.to_string());
                }
                Some(("APPENDLIMIT", limit)) => {
                    append_limit = limit.parse().ok();
                }
                _ if known.is_empty() => {
                    tracing::trace!(token, "ignoring unknown capability");
                }
                _ => {}
            }
        }

        self.set = set;
        self.auth_mechanisms = auth_mechanisms;
        self.thread_algorithms = thread_algorithms;
        self.compression_algorithms = compression_algorithms;
        self.append_limit = append_limit;
        self.bump();
    }

    /// Forgets everything, as required after STARTTLS.
    pub fn clear(&mut self) {
        self.refresh(CapabilitySet::EMPTY);
    }

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        tracing::debug!(
            generation = self.generation,
            capabilities = %self.set,
            auth = ?self.auth_mechanisms,
            "capabilities refreshed"
        );
    }

    /// Returns `true` if `tag` was advertised.
    #[must_use]
    pub const fn has(&self, tag: Capability) -> bool {
        self.set.has(tag)
    }

    /// Returns `true` if at least one of `tags` was advertised.
    #[must_use]
    pub const fn has_any(&self, tags: CapabilitySet) -> bool {
        self.set.has_any(tags)
    }

    /// Returns `true` if all of `tags` were advertised.
    #[must_use]
    pub const fn has_all(&self, tags: CapabilitySet) -> bool {
        self.set.has_all(tags)
    }

    /// Returns a copy of the advertised tag set.
    #[must_use]
    pub const fn snapshot(&self) -> CapabilitySet {
        self.set.snapshot()
    }

    /// Returns `true` if the server offers the SASL mechanism `mechanism`.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.auth_mechanisms
            .contains(mechanism.to_ascii_uppercase().as_str())
    }

    /// Returns `true` unless the server advertised LOGINDISABLED.
    #[must_use]
    pub const fn plaintext_login_permitted(&self) -> bool {
        !self.has(Capability::LoginDisabled)
    }

    /// Returns the advertised SASL mechanisms, uppercased.
    #[must_use]
    pub const fn auth_mechanisms(&self) -> &BTreeSet<String> {
        &self.auth_mechanisms
    }

    /// Returns the advertised THREAD algorithms, uppercased.
    #[must_use]
    pub const fn thread_algorithms(&self) -> &BTreeSet<String> {
        &self.thread_algorithms
    }

    /// Returns the advertised COMPRESS algorithms, uppercased.
    #[must_use]
    pub const fn compression_algorithms(&self) -> &BTreeSet<String> {
        &self.compression_algorithms
    }

    /// Returns the APPENDLIMIT value, if the server sent one.
    #[must_use]
    pub const fn append_limit(&self) -> Option<u64> {
        self.append_limit
    }

    /// Returns how many announcements have been applied.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
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
    fn starts_empty() {
        let caps = ServerCapabilities::new();
        assert!(caps.snapshot().is_empty());
        assert_eq!(caps.generation(), 0);
        assert!(caps.plaintext_login_permitted());
    }

    #[test]
    fn tokens_fill_set_and_families() {
        let mut caps = ServerCapabilities::new();
        caps.refresh_from_tokens([
            "IMAP4rev1",
            "auth=plain",
            "AUTH=XOAUTH2",
            "THREAD=REFERENCES",
            "THREAD=ORDEREDSUBJECT",
            "COMPRESS=DEFLATE",
            "APPENDLIMIT=35651584",
            "X-FUTURE-THING",
        ]);
        assert!(caps.has(Capability::Imap4Rev1));
        assert!(caps.has(Capability::Thread));
        assert!(caps.has(Capability::Compress));
        assert!(caps.has(Capability::AppendLimit));
        assert!(caps.supports_auth("PLAIN"));
        assert!(caps.supports_auth("xoauth2"));
        assert!(!caps.supports_auth("CRAM-MD5"));
        assert_eq!(caps.thread_algorithms().len(), 2);
        assert!(caps.compression_algorithms().contains("DEFLATE"));
        assert_eq!(caps.append_limit(), Some(35_651_584));
        assert_eq!(caps.snapshot().len(), 4);
        assert_eq!(caps.generation(), 1);
    }

    #[test]
    fn announcement_replaces_families() {
        let mut caps = ServerCapabilities::new();
        caps.refresh_from_tokens(["IMAP4rev1", "STARTTLS", "LOGINDISABLED", "AUTH=GSSAPI"]);
        assert!(!caps.plaintext_login_permitted());

        caps.refresh_from_tokens(["IMAP4rev1", "AUTH=PLAIN"]);
        assert!(caps.plaintext_login_permitted());
        assert!(!caps.has(Capability::StartTls));
        assert!(!caps.supports_auth("GSSAPI"));
        assert!(caps.supports_auth("PLAIN"));
        assert_eq!(caps.generation(), 2);
    }

    #[test]
    fn bare_refresh_clears_families() {
        let mut caps = ServerCapabilities::new();
        caps.refresh_from_tokens(["IMAP4rev1", "AUTH=PLAIN", "APPENDLIMIT=10"]);
        caps.refresh(CapabilitySet::from([Capability::Idle]));
        assert!(caps.auth_mechanisms().is_empty());
        assert_eq!(caps.append_limit(), None);
        assert_eq!(caps.snapshot(), CapabilitySet::from([Capability::Idle]));
    }

    #[test]
    fn clear_empties_everything() {
        let mut caps = ServerCapabilities::new();
        caps.refresh_from_tokens(["IMAP4rev1", "IDLE", "AUTH=PLAIN"]);
        caps.clear();
        assert!(caps.snapshot().is_empty());
        assert!(caps.auth_mechanisms().is_empty());
    }

    #[test]
    fn composite_queries_delegate_to_set() {
        let mut caps = ServerCapabilities::new();
        caps.refresh_from_tokens(["CONDSTORE", "QRESYNC"]);
        let gate = CapabilitySet::from([Capability::CondStore, Capability::QuickResync]);
        assert!(caps.has_all(gate));
        assert!(caps.has_any(CapabilitySet::from([Capability::Idle, Capability::CondStore])));
        assert!(!caps.has_any(CapabilitySet::from([Capability::Idle])));
    }

    #[test]
    fn malformed_append_limit_is_dropped() {
        let mut caps = ServerCapabilities::new();
        caps.refresh_from_tokens(["APPENDLIMIT=lots"]);
        assert!(caps.has(Capability::AppendLimit));
        assert_eq!(caps.append_limit(), None);
    }
}
