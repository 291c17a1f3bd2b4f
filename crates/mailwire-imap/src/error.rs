//! Error types for the IMAP library.
//!
//! Every failure is exactly one of two branches:
//!
//! - [`ProtocolError`]: the connection can no longer be trusted and must be
//!   torn down (reconnect, re-authenticate, re-select).
//! - [`CommandError`]: one command failed; the connection, its capabilities
//!   and its state are unchanged and further commands may be issued.
//!
//! Callers dispatch on [`Error::severity`] instead of inspecting messages.

use thiserror::Error;

use crate::types::ResponseCode;

/// Boxed lower-level cause carried by either branch.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How a failure affects the connection that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The connection is dead and must be rebuilt.
    Fatal,
    /// Only the failed command is affected.
    Command,
}

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal protocol or transport failure.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Non-fatal command failure.
    #[error("Command failed: {0}")]
    Command(#[from] CommandError),
}

impl Error {
    /// Returns the severity branch of this error.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Protocol(_) => Severity::Fatal,
            Self::Command(_) => Severity::Command,
        }
    }

    /// Returns `true` if the connection must be torn down.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns the human-readable message of the underlying error.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Protocol(e) => e.message(),
            Self::Command(e) => e.message(),
        }
    }

    /// Returns the protocol error, if this is the fatal branch.
    #[must_use]
    pub const fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            Self::Protocol(e) => Some(e),
            Self::Command(_) => None,
        }
    }

    /// Returns the command error, if this is the non-fatal branch.
    #[must_use]
    pub const fn as_command(&self) -> Option<&CommandError> {
        match self {
            Self::Command(e) => Some(e),
            Self::Protocol(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Protocol(ProtocolError::io(err))
    }
}

/// What went wrong at the protocol level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolErrorKind {
    /// Transport read/write failure.
    Io,
    /// Response bytes could not be parsed.
    Parse,
    /// A continuation request arrived when none was expected.
    UnexpectedContinuation,
    /// A tagged completion carried a tag that is not in flight.
    UnexpectedTag,
    /// Responses arrived in an order the protocol forbids.
    Sequence,
    /// The command finished without a tagged completion.
    MissingCompletion,
    /// The server sent BYE.
    Bye,
    /// The operation did not complete in time; the stream position is unknown.
    Timeout,
    /// The session was already torn down.
    Closed,
    /// The tag counter ran out.
    TagExhausted,
    /// Unclassified.
    #[default]
    Other,
}

/// Fatal error: the connection is no longer usable.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ProtocolError {
    /// Creates an error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ProtocolErrorKind::Other,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error with a message and a wrapped cause.
    #[must_use]
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            kind: ProtocolErrorKind::Other,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Sets the kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ProtocolErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub(crate) fn io(err: std::io::Error) -> Self {
        Self::with_source("I/O error", err).with_kind(ProtocolErrorKind::Io)
    }

    pub(crate) fn unexpected_continuation(command: &str, text: &str) -> Self {
        Self::new(format!("unexpected continuation during {command}: {text}"))
            .with_kind(ProtocolErrorKind::UnexpectedContinuation)
    }

    pub(crate) fn unexpected_tag(expected: &str, got: &str) -> Self {
        Self::new(format!("unexpected tag {got}, expected {expected}"))
            .with_kind(ProtocolErrorKind::UnexpectedTag)
    }

    pub(crate) fn sequence(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ProtocolErrorKind::Sequence)
    }

    pub(crate) fn missing_completion(tag: &str) -> Self {
        Self::new(format!("missing tagged response for {tag}"))
            .with_kind(ProtocolErrorKind::MissingCompletion)
    }

    pub(crate) fn bye(text: &str) -> Self {
        Self::new(format!("server sent BYE: {text}")).with_kind(ProtocolErrorKind::Bye)
    }

    pub(crate) fn closed(reason: &str) -> Self {
        Self::new(format!("connection is closed: {reason}")).with_kind(ProtocolErrorKind::Closed)
    }

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> ProtocolErrorKind {
        self.kind
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for ProtocolError {
    fn default() -> Self {
        Self::new("protocol error")
    }
}

/// Why a single command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandErrorKind {
    /// Server returned NO.
    No,
    /// Server returned BAD.
    Bad,
    /// The server did not advertise a capability the command needs.
    Unsupported,
    /// The server advertised LOGINDISABLED.
    LoginDisabled,
    /// Plaintext credentials refused on an unencrypted transport.
    InsecureLogin,
    /// The command is not valid in the current connection state.
    InvalidState,
    /// Another command is still in flight.
    Busy,
    /// Unclassified.
    #[default]
    Other,
}

/// Non-fatal error: one command failed, the connection remains usable.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CommandError {
    kind: CommandErrorKind,
    message: String,
    code: Option<ResponseCode>,
    #[source]
    source: Option<BoxError>,
}

impl CommandError {
    /// Creates an error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: CommandErrorKind::Other,
            message: message.into(),
            code: None,
            source: None,
        }
    }

    /// Creates an error with a message and a wrapped cause.
    #[must_use]
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            kind: CommandErrorKind::Other,
            message: message.into(),
            code: None,
            source: Some(source.into()),
        }
    }

    /// Sets the kind.
    #[must_use]
    pub fn with_kind(mut self, kind: CommandErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attaches the server's response code.
    #[must_use]
    pub fn with_code(mut self, code: Option<ResponseCode>) -> Self {
        self.code = code;
        self
    }

    pub(crate) fn unsupported(command: &str, missing: &str) -> Self {
        Self::new(format!("{command} requires {missing}"))
            .with_kind(CommandErrorKind::Unsupported)
    }

    pub(crate) fn invalid_state(command: &str, state: &str) -> Self {
        Self::new(format!("{command} is not permitted in the {state} state"))
            .with_kind(CommandErrorKind::InvalidState)
    }

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> CommandErrorKind {
        self.kind
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the server's response code, if any.
    #[must_use]
    pub const fn code(&self) -> Option<&ResponseCode> {
        self.code.as_ref()
    }
}

impl Default for CommandError {
    fn default() -> Self {
        Self::new("command failed")
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    use std::error::Error as _;

    use super::*;

    fn is_send_sync<T: Send + Sync>(_t: &T) {}

    #[test]
    fn errors_are_send_and_sync() {
        let err: Error = ProtocolError::default().into();
        is_send_sync(&err);
    }

    #[test]
    fn branches_map_to_one_severity() {
        let fatal: Error = ProtocolError::new("framing").into();
        let command: Error = CommandError::new("rejected").into();
        assert_eq!(fatal.severity(), Severity::Fatal);
        assert!(fatal.is_fatal());
        assert_eq!(command.severity(), Severity::Command);
        assert!(!command.is_fatal());
    }

    #[test]
    fn io_errors_are_fatal() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(err.is_fatal());
        assert_eq!(err.as_protocol().unwrap().kind(), ProtocolErrorKind::Io);
        assert!(err.as_protocol().unwrap().source().is_some());
    }

    #[test]
    fn default_constructors() {
        let p = ProtocolError::default();
        assert_eq!(p.kind(), ProtocolErrorKind::Other);
        assert_eq!(p.message(), "protocol error");
        assert!(p.source().is_none());

        let c = CommandError::default();
        assert_eq!(c.kind(), CommandErrorKind::Other);
        assert_eq!(c.message(), "command failed");
        assert!(c.code().is_none());
    }

    #[test]
    fn with_source_exposes_cause() {
        let cause = std::io::Error::other("socket reset");
        let err = CommandError::with_source("copy failed", cause);
        assert_eq!(err.source().unwrap().to_string(), "socket reset");
    }

    #[test]
    fn command_error_keeps_response_code() {
        let err = CommandError::new("no such mailbox")
            .with_kind(CommandErrorKind::No)
            .with_code(Some(ResponseCode::TryCreate));
        assert_eq!(err.code(), Some(&ResponseCode::TryCreate));
        assert_eq!(err.kind(), CommandErrorKind::No);
    }

    #[test]
    fn display_prefixes_branch() {
        let err: Error = CommandError::unsupported("MOVE", "MOVE").into();
        assert_eq!(err.to_string(), "Command failed: MOVE requires MOVE");
        assert_eq!(err.message(), "MOVE requires MOVE");

        let err: Error = ProtocolError::bye("shutting down").into();
        assert_eq!(err.to_string(), "Protocol error: server sent BYE: shutting down");
    }

    #[test]
    fn error_source_chain_reaches_inner_error() {
        let err: Error = ProtocolError::new("framing").into();
        assert_eq!(err.source().unwrap().to_string(), "framing");
    }
}
