//! Response codes.

/// Bracketed response code attached to a status reply.
///
/// Only the codes the session reacts to are modeled; the rest arrive as
/// [`ResponseCode::Unknown`] with their atom preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// CAPABILITY: a capability announcement piggybacked on a status reply.
    ///
    /// Holds the raw tokens as the parser produced them.
    Capability(Vec<String>),
    /// PARSE: Error parsing message.
    Parse,
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// NONEXISTENT: The named mailbox does not exist (RFC 5530).
    Nonexistent,
    /// ALREADYEXISTS: The mailbox already exists (RFC 5530).
    AlreadyExists,
    /// AUTHENTICATIONFAILED: Credentials rejected (RFC 5530).
    AuthenticationFailed,
    /// UNAVAILABLE: Temporary server-side failure (RFC 5530).
    Unavailable,
    /// Unknown response code.
    Unknown(String),
}

impl ResponseCode {
    /// Maps an argument-less code atom, ignoring case.
    ///
    /// Codes that carry data (CAPABILITY) must be built by the parser.
    #[must_use]
    pub fn from_atom(atom: &str) -> Self {
        match atom.to_ascii_uppercase().as_str() {
            "ALERT" => Self::Alert,
            "PARSE" => Self::Parse,
            "READ-ONLY" => Self::ReadOnly,
            "READ-WRITE" => Self::ReadWrite,
            "TRYCREATE" => Self::TryCreate,
            "NONEXISTENT" => Self::Nonexistent,
            "ALREADYEXISTS" => Self::AlreadyExists,
            "AUTHENTICATIONFAILED" => Self::AuthenticationFailed,
            "UNAVAILABLE" => Self::Unavailable,
            _ => Self::Unknown(atom.to_string()),
        }
    }

    /// Returns the announced tokens if this is a CAPABILITY code.
    #[must_use]
    pub fn capability_tokens(&self) -> Option<&[String]> {
        match self {
            Self::Capability(tokens) => Some(tokens),
            _ => None,
        }
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
    fn from_atom_known() {
        assert_eq!(ResponseCode::from_atom("TRYCREATE"), ResponseCode::TryCreate);
        assert_eq!(ResponseCode::from_atom("read-only"), ResponseCode::ReadOnly);
        assert_eq!(
            ResponseCode::from_atom("AuthenticationFailed"),
            ResponseCode::AuthenticationFailed
        );
    }

    #[test]
    fn from_atom_unknown_keeps_spelling() {
        assert_eq!(
            ResponseCode::from_atom("X-Custom"),
            ResponseCode::Unknown("X-Custom".to_string())
        );
    }

    #[test]
    fn capability_tokens() {
        let code = ResponseCode::Capability(vec!["IMAP4rev1".to_string(), "IDLE".to_string()]);
        assert_eq!(code.capability_tokens().unwrap().len(), 2);
        assert!(ResponseCode::Alert.capability_tokens().is_none());
    }
}
