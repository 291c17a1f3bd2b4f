//! IMAP commands as the session sees them.
//!
//! This module does not serialize commands; that belongs to the transport.
//! It answers the questions the session asks before a command may leave
//! the client: which connection states permit it, which server
//! capabilities it depends on, and whether the server may answer with a
//! continuation request.

mod tag_generator;

use std::fmt;

use crate::protocol::ConnectionState;
use crate::types::{Capability, CapabilitySet};

pub use tag_generator::TagGenerator;

/// Modifier attached to SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectModifier {
    /// Plain SELECT.
    #[default]
    None,
    /// `SELECT ... (CONDSTORE)` (RFC 7162).
    CondStore,
    /// `SELECT ... (QRESYNC (...))` (RFC 7162).
    QuickResync,
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,
    /// ID command (RFC 2971) - client/server identification.
    Id {
        /// Client identification parameters (field-value pairs).
        /// None = ID NIL (no identification).
        parameters: Option<Vec<(String, String)>>,
    },

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Initial response (optional, needs SASL-IR).
        initial_response: Option<String>,
    },

    // Authenticated State Commands
    /// ENABLE command.
    Enable {
        /// Capabilities to enable.
        capabilities: Vec<String>,
    },
    /// COMPRESS command (RFC 4978).
    Compress {
        /// Compression algorithm, usually `DEFLATE`.
        algorithm: String,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
        /// Optional CONDSTORE/QRESYNC modifier.
        modifier: SelectModifier,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: String,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: String,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// NAMESPACE command.
    Namespace,
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: String,
        /// Status items to request.
        items: Vec<String>,
    },
    /// APPEND command.
    Append {
        /// Target mailbox.
        mailbox: String,
        /// Message data.
        message: Vec<u8>,
    },
    /// GETQUOTAROOT command (RFC 2087).
    GetQuotaRoot {
        /// Mailbox whose quota roots are requested.
        mailbox: String,
    },
    /// GETMETADATA command (RFC 5464).
    GetMetadata {
        /// Mailbox, or empty for server annotations.
        mailbox: String,
        /// Entry names.
        entries: Vec<String>,
    },
    /// IDLE command.
    Idle,

    // Selected State Commands
    /// CLOSE command.
    Close,
    /// UNSELECT command.
    Unselect,
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE command (RFC 4315 UIDPLUS) - expunge specific UIDs.
    UidExpunge {
        /// UIDs to expunge.
        uids: String,
    },
    /// SEARCH command.
    Search {
        /// Search criteria.
        criteria: String,
        /// Use UIDs.
        uid: bool,
    },
    /// FETCH command.
    Fetch {
        /// Sequence set.
        sequence: String,
        /// Items to fetch.
        items: String,
        /// Use UIDs.
        uid: bool,
    },
    /// COPY command.
    Copy {
        /// Sequence set.
        sequence: String,
        /// Target mailbox.
        mailbox: String,
        /// Use UIDs.
        uid: bool,
    },
    /// MOVE command.
    Move {
        /// Sequence set.
        sequence: String,
        /// Target mailbox.
        mailbox: String,
        /// Use UIDs.
        uid: bool,
    },
    /// SORT command (RFC 5256).
    Sort {
        /// Sort criteria.
        criteria: String,
        /// Search criteria.
        search: String,
        /// Use UIDs.
        uid: bool,
    },
    /// THREAD command (RFC 5256).
    Thread {
        /// Threading algorithm.
        algorithm: String,
        /// Search criteria.
        search: String,
        /// Use UIDs.
        uid: bool,
    },
}

impl Command {
    /// Returns the command keyword, including a `UID` prefix.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Id { .. } => "ID",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Enable { .. } => "ENABLE",
            Self::Compress { .. } => "COMPRESS",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::List { .. } => "LIST",
            Self::Namespace => "NAMESPACE",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::GetQuotaRoot { .. } => "GETQUOTAROOT",
            Self::GetMetadata { .. } => "GETMETADATA",
            Self::Idle => "IDLE",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { uid: false, .. } => "SEARCH",
            Self::Search { uid: true, .. } => "UID SEARCH",
            Self::Fetch { uid: false, .. } => "FETCH",
            Self::Fetch { uid: true, .. } => "UID FETCH",
            Self::Copy { uid: false, .. } => "COPY",
            Self::Copy { uid: true, .. } => "UID COPY",
            Self::Move { uid: false, .. } => "MOVE",
            Self::Move { uid: true, .. } => "UID MOVE",
            Self::Sort { uid: false, .. } => "SORT",
            Self::Sort { uid: true, .. } => "UID SORT",
            Self::Thread { uid: false, .. } => "THREAD",
            Self::Thread { uid: true, .. } => "UID THREAD",
        }
    }

    /// Returns the capabilities the server must advertise for this command.
    ///
    /// Extensions folded into `IMAP4rev2` are also satisfied by that tag.
    #[must_use]
    pub fn requirement(&self) -> Requirement {
        use Capability as C;

        let rev2_or = |cap: Capability| Requirement::Any(CapabilitySet::from([cap, C::Imap4Rev2]));

        match self {
            Self::StartTls => Requirement::All(C::StartTls.into()),
            Self::Authenticate {
                initial_response: Some(_),
                ..
            } => rev2_or(C::SaslIr),
            Self::Id { .. } => Requirement::All(C::Id.into()),
            Self::Enable { .. } => rev2_or(C::Enable),
            Self::Compress { .. } => Requirement::All(C::Compress.into()),
            Self::Select {
                modifier: SelectModifier::CondStore,
                ..
            } => Requirement::All(C::CondStore.into()),
            Self::Select {
                modifier: SelectModifier::QuickResync,
                ..
            } => Requirement::All(CapabilitySet::from([C::CondStore, C::QuickResync])),
            Self::Namespace => rev2_or(C::Namespace),
            Self::GetQuotaRoot { .. } => Requirement::All(C::Quota.into()),
            Self::GetMetadata { .. } => Requirement::All(C::Metadata.into()),
            Self::Idle => rev2_or(C::Idle),
            Self::Unselect => rev2_or(C::Unselect),
            Self::UidExpunge { .. } => rev2_or(C::UidPlus),
            Self::Move { .. } => rev2_or(C::Move),
            Self::Sort { .. } => Requirement::All(C::Sort.into()),
            Self::Thread { .. } => Requirement::All(C::Thread.into()),
            _ => Requirement::None,
        }
    }

    /// Returns `true` if this command may be issued in `state`.
    #[must_use]
    pub const fn permitted_in(&self, state: &ConnectionState) -> bool {
        match self {
            Self::Capability | Self::Noop | Self::Logout | Self::Id { .. } => {
                state.is_connected()
            }
            Self::StartTls | Self::Login { .. } | Self::Authenticate { .. } => {
                matches!(state, ConnectionState::Connected)
            }
            Self::Enable { .. } => matches!(state, ConnectionState::Authenticated),
            Self::Compress { .. }
            | Self::Select { .. }
            | Self::Examine { .. }
            | Self::Create { .. }
            | Self::Delete { .. }
            | Self::List { .. }
            | Self::Namespace
            | Self::Status { .. }
            | Self::Append { .. }
            | Self::GetQuotaRoot { .. }
            | Self::GetMetadata { .. }
            | Self::Idle => state.is_authenticated(),
            Self::Close
            | Self::Unselect
            | Self::Expunge
            | Self::UidExpunge { .. }
            | Self::Search { .. }
            | Self::Fetch { .. }
            | Self::Copy { .. }
            | Self::Move { .. }
            | Self::Sort { .. }
            | Self::Thread { .. } => state.is_selected(),
        }
    }

    /// Returns `true` if a continuation request (`+ ...`) is part of this
    /// command's exchange and may reach the session.
    ///
    /// Only SASL challenges and the IDLE go-ahead qualify. Continuations
    /// that answer a synchronizing literal (`{n}`) belong to writing the
    /// command and are consumed by the [`Transport`](crate::Transport),
    /// whichever command carries the literal.
    #[must_use]
    pub const fn expects_continuation(&self) -> bool {
        matches!(self, Self::Authenticate { .. } | Self::Idle)
    }

    /// Returns `true` if this command sends plaintext credentials.
    #[must_use]
    pub const fn is_plaintext_login(&self) -> bool {
        matches!(self, Self::Login { .. })
    }
}

/// Capability precondition of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// Core command, always available.
    #[default]
    None,
    /// Every listed capability must be advertised.
    All(CapabilitySet),
    /// At least one listed capability must be advertised.
    Any(CapabilitySet),
}

impl Requirement {
    /// Returns `true` if `caps` satisfies this requirement.
    #[must_use]
    pub const fn is_satisfied_by(&self, caps: CapabilitySet) -> bool {
        match self {
            Self::None => true,
            Self::All(required) => caps.has_all(*required),
            Self::Any(required) => caps.has_any(*required),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (set, joiner) = match self {
            Self::None => return f.write_str("nothing"),
            Self::All(set) => (set, " and "),
            Self::Any(set) => (set, " or "),
        };
        for (i, cap) in set.iter().enumerate() {
            if i > 0 {
                f.write_str(joiner)?;
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
    use crate::protocol::SelectedState;

    fn selected() -> ConnectionState {
        ConnectionState::Selected(SelectedState {
            mailbox: "INBOX".to_string(),
            read_only: false,
        })
    }

    fn move_cmd() -> Command {
        Command::Move {
            sequence: "1:3".to_string(),
            mailbox: "Archive".to_string(),
            uid: true,
        }
    }

    #[test]
    fn names_include_uid_prefix() {
        assert_eq!(move_cmd().name(), "UID MOVE");
        assert_eq!(Command::Noop.name(), "NOOP");
        assert_eq!(
            Command::Search {
                criteria: "ALL".to_string(),
                uid: false
            }
            .name(),
            "SEARCH"
        );
    }

    #[test]
    fn move_requires_move_or_rev2() {
        let req = move_cmd().requirement();
        assert!(!req.is_satisfied_by(CapabilitySet::from([Capability::Imap4Rev1])));
        assert!(req.is_satisfied_by(CapabilitySet::from([Capability::Move])));
        assert!(req.is_satisfied_by(CapabilitySet::from([Capability::Imap4Rev2])));
    }

    #[test]
    fn qresync_select_requires_both() {
        let cmd = Command::Select {
            mailbox: "INBOX".to_string(),
            modifier: SelectModifier::QuickResync,
        };
        let req = cmd.requirement();
        assert!(!req.is_satisfied_by(CapabilitySet::from([Capability::QuickResync])));
        assert!(req.is_satisfied_by(CapabilitySet::from([
            Capability::CondStore,
            Capability::QuickResync
        ])));
        assert_eq!(req.to_string(), "CONDSTORE and QRESYNC");
    }

    #[test]
    fn core_commands_have_no_requirement() {
        assert_eq!(Command::Noop.requirement(), Requirement::None);
        assert!(Command::Noop.requirement().is_satisfied_by(CapabilitySet::EMPTY));
        assert_eq!(
            Command::Authenticate {
                mechanism: "PLAIN".to_string(),
                initial_response: None
            }
            .requirement(),
            Requirement::None
        );
    }

    #[test]
    fn sasl_ir_gates_initial_response() {
        let cmd = Command::Authenticate {
            mechanism: "PLAIN".to_string(),
            initial_response: Some("AGZvbwBiYXI=".to_string()),
        };
        assert_eq!(cmd.requirement().to_string(), "SASL-IR or IMAP4rev2");
    }

    #[test]
    fn state_table() {
        let login = Command::Login {
            username: "u".to_string(),
            password: "p".to_string(),
        };
        assert!(!Command::Noop.permitted_in(&ConnectionState::Disconnected));
        assert!(Command::Noop.permitted_in(&ConnectionState::Connected));
        assert!(login.permitted_in(&ConnectionState::Connected));
        assert!(!login.permitted_in(&ConnectionState::Authenticated));
        assert!(!move_cmd().permitted_in(&ConnectionState::Authenticated));
        assert!(move_cmd().permitted_in(&selected()));
        assert!(Command::Idle.permitted_in(&selected()));
        assert!(
            Command::Enable {
                capabilities: vec![]
            }
            .permitted_in(&ConnectionState::Authenticated)
        );
        assert!(
            !Command::Enable {
                capabilities: vec![]
            }
            .permitted_in(&selected())
        );
    }

    #[test]
    fn continuation_expectations() {
        assert!(Command::Idle.expects_continuation());
        assert!(!Command::Noop.expects_continuation());
        assert!(!move_cmd().expects_continuation());
        assert!(
            Command::Authenticate {
                mechanism: "XOAUTH2".to_string(),
                initial_response: None,
            }
            .expects_continuation()
        );
    }

    #[test]
    fn literal_carrying_commands_do_not_expect_continuation() {
        let append = Command::Append {
            mailbox: "Sent".to_string(),
            message: b"Subject: hi\r\n\r\nbody".to_vec(),
        };
        let login = Command::Login {
            username: "user".to_string(),
            password: "p\u{e4}ss\"".to_string(),
        };
        let create = Command::Create {
            mailbox: "Entw\u{fc}rfe".to_string(),
        };
        assert!(!append.expects_continuation());
        assert!(!login.expects_continuation());
        assert!(!create.expects_continuation());
    }
}
