//! Connection state types.
//!
//! This module defines the states an IMAP connection moves through,
//! following RFC 9051 section 3.

use std::fmt;

/// Connection state.
///
/// ```text
/// Disconnected -> Connected -> Authenticated <-> Selected
/// ```
///
/// A fatal error returns the connection to `Disconnected` from any state.
/// A failed command never moves it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No usable connection.
    ///
    /// Either the greeting has not been read yet, LOGOUT completed, or a
    /// fatal error tore the connection down.
    #[default]
    Disconnected,

    /// Greeting received, not authenticated.
    ///
    /// In this state, only these commands are valid:
    /// - CAPABILITY
    /// - NOOP
    /// - LOGOUT
    /// - STARTTLS (if available)
    /// - AUTHENTICATE
    /// - LOGIN
    Connected,

    /// Authenticated - user has logged in.
    ///
    /// In this state, these additional commands are valid:
    /// - SELECT
    /// - EXAMINE
    /// - CREATE
    /// - DELETE
    /// - LIST
    /// - STATUS
    /// - APPEND
    /// - ENABLE
    Authenticated,

    /// Selected - a mailbox is currently open.
    ///
    /// In this state, all commands are valid plus:
    /// - CLOSE
    /// - EXPUNGE
    /// - SEARCH
    /// - FETCH
    /// - COPY
    /// - MOVE
    /// - UID (prefix)
    Selected(SelectedState),
}

impl ConnectionState {
    /// Returns `true` if a server connection is live.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Returns `true` if we're authenticated (authenticated or selected).
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// Returns `true` if a mailbox is selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// Returns the selected mailbox name, if any.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        match self {
            Self::Selected(state) => Some(&state.mailbox),
            _ => None,
        }
    }

    /// Returns `true` if the selected mailbox is read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        match self {
            Self::Selected(state) => state.read_only,
            _ => false,
        }
    }

    /// Returns a short name for logs and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "not authenticated",
            Self::Authenticated => "authenticated",
            Self::Selected(_) => "selected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State information when a mailbox is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedState {
    /// Name of the selected mailbox.
    pub mailbox: String,
    /// Whether the mailbox is read-only (EXAMINE vs SELECT).
    pub read_only: bool,
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

    fn selected(read_only: bool) -> ConnectionState {
        ConnectionState::Selected(SelectedState {
            mailbox: "Drafts".to_string(),
            read_only,
        })
    }

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::default().is_connected());
    }

    #[test]
    fn test_is_authenticated() {
        assert!(!ConnectionState::Disconnected.is_authenticated());
        assert!(!ConnectionState::Connected.is_authenticated());
        assert!(ConnectionState::Authenticated.is_authenticated());
        assert!(selected(false).is_authenticated());
    }

    #[test]
    fn test_is_selected() {
        assert!(!ConnectionState::Connected.is_selected());
        assert!(!ConnectionState::Authenticated.is_selected());
        assert!(selected(false).is_selected());
    }

    #[test]
    fn test_selected_mailbox() {
        assert_eq!(ConnectionState::Connected.selected_mailbox(), None);
        assert_eq!(selected(true).selected_mailbox(), Some("Drafts"));
    }

    #[test]
    fn test_is_read_only() {
        assert!(!ConnectionState::Authenticated.is_read_only());
        assert!(!selected(false).is_read_only());
        assert!(selected(true).is_read_only());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "not authenticated");
        assert_eq!(selected(false).to_string(), "selected");
    }
}
