//! Per-connection session: capability gating and failure propagation.
//!
//! A [`Session`] owns the connection state, the live
//! [`ServerCapabilities`] and the tag counter for one connection. It never
//! performs I/O itself. Commands go through two steps:
//!
//! 1. [`Session::begin`] checks local preconditions and hands out a tag.
//! 2. [`Session::finish`] classifies the server's replies and applies the
//!    resulting state transition.
//!
//! [`Session::execute`] drives both steps against a [`Transport`].
//!
//! Failure propagation:
//!
//! - a fatal error moves the session to [`ConnectionState::Disconnected`]
//!   before it is returned, and every later command fails with
//!   [`ProtocolErrorKind::Closed`](crate::ProtocolErrorKind::Closed) without reaching the transport;
//! - a command error leaves state, capabilities and tag counter as they
//!   were.
//!
//! # Example
//!
//! ```
//! use mailwire_imap::protocol::Untagged;
//! use mailwire_imap::{Capability, Command, ResponseCode, Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default());
//! session
//!     .open(Untagged::PreAuth {
//!         code: Some(ResponseCode::Capability(vec!["IMAP4rev1".into(), "IDLE".into()])),
//!         text: "ready".into(),
//!     })
//!     .unwrap();
//! assert!(session.capabilities().has(Capability::Idle));
//!
//! // NAMESPACE was not advertised: refused locally, connection still usable.
//! let err = session.begin(&Command::Namespace).unwrap_err();
//! assert!(!err.is_fatal());
//! assert!(session.is_usable());
//! assert!(session.begin(&Command::Idle).is_ok());
//! ```

use crate::capabilities::ServerCapabilities;
use crate::command::{Command, TagGenerator};
use crate::config::SessionConfig;
use crate::error::{CommandError, CommandErrorKind, Error, ProtocolError};
use crate::protocol::{ConnectionState, Outcome, Reply, SelectedState, Untagged};
use crate::types::{Capability, ResponseCode, Tag};
use crate::Result;

/// The I/O side of a connection, implemented outside this crate.
///
/// Implementations serialize the command, write it, read and parse replies
/// up to and including the tagged completion, and hand them back in
/// arrival order.
///
/// Any argument may need a synchronizing literal (`{n}`): a password with
/// `"` or 8-bit bytes, a non-ASCII mailbox name, an APPEND message. The
/// transport waits for the server's `+` itself, writes the literal, and does
/// not return that continuation. Only continuations that are part of the
/// command's exchange (see [`Command::expects_continuation`]) are returned;
/// any other continuation in the replies is treated as out of sequence and
/// is fatal.
pub trait Transport {
    /// Sends `command` under `tag` and returns the parsed replies.
    ///
    /// # Errors
    ///
    /// I/O and framing failures must be returned as the fatal branch
    /// (`std::io::Error` converts automatically).
    fn send(&mut self, tag: &Tag, command: &Command) -> Result<Vec<Reply>>;

    /// Performs the TLS handshake after a successful STARTTLS.
    ///
    /// # Errors
    ///
    /// A failed handshake leaves the stream unusable and must be fatal.
    fn start_tls(&mut self) -> Result<()>;

    /// Closes the underlying stream. Called once, when the session is torn
    /// down by a fatal error.
    fn close(&mut self) {}
}

#[derive(Debug, Clone)]
struct InFlight {
    tag: Tag,
    command: Command,
}

/// Capability registry, connection state and error propagation for one
/// IMAP connection.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    state: ConnectionState,
    capabilities: ServerCapabilities,
    tag_gen: TagGenerator,
    in_flight: Option<InFlight>,
    encrypted: bool,
    opened: bool,
    closed_reason: Option<String>,
}

impl Session {
    /// Creates a session for a connection whose greeting has not been read.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            capabilities: ServerCapabilities::new(),
            tag_gen: TagGenerator::new(config.tag_prefix),
            in_flight: None,
            encrypted: config.security.starts_encrypted(),
            opened: false,
            closed_reason: None,
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the connection state.
    #[must_use]
    pub const fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Returns the live capability registry.
    #[must_use]
    pub const fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Returns `true` once the transport is encrypted.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Returns why the session was torn down, if it was.
    #[must_use]
    pub fn closed_reason(&self) -> Option<&str> {
        self.closed_reason.as_deref()
    }

    /// Returns `true` if commands can still be issued.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.closed_reason.is_none() && self.state.is_connected()
    }

    /// Returns the tag of the command awaiting completion, if any.
    #[must_use]
    pub fn in_flight(&self) -> Option<&Tag> {
        self.in_flight.as_ref().map(|f| &f.tag)
    }

    /// Processes the server greeting.
    ///
    /// # Errors
    ///
    /// Fatal if the session was already opened or torn down, or if the
    /// server greets with BYE or anything other than OK/PREAUTH.
    pub fn open(&mut self, greeting: Untagged) -> Result<()> {
        self.ensure_not_closed()?;
        if self.opened {
            return Err(self.poison(ProtocolError::sequence("greeting received twice").into()));
        }
        self.opened = true;

        if let Some(tokens) = greeting.capability_tokens() {
            self.capabilities.refresh_from_tokens(tokens);
        }

        match greeting {
            Untagged::Ok { text, .. } => {
                tracing::debug!(%text, "greeting");
                self.transition(ConnectionState::Connected);
                Ok(())
            }
            Untagged::PreAuth { text, .. } => {
                tracing::debug!(%text, "pre-authenticated greeting");
                self.transition(ConnectionState::Authenticated);
                Ok(())
            }
            Untagged::Bye { text } => Err(self.poison(ProtocolError::bye(&text).into())),
            other => Err(self.poison(
                ProtocolError::sequence(format!("unexpected greeting: {other:?}")).into(),
            )),
        }
    }

    /// Checks preconditions for `command` and allocates its tag.
    ///
    /// # Errors
    ///
    /// Fatal with [`ProtocolErrorKind::Closed`](crate::ProtocolErrorKind::Closed) once the session is torn
    /// down. Otherwise a [`CommandError`] when another command is in flight,
    /// the state forbids the command, a required capability is missing,
    /// LOGIN meets LOGINDISABLED or an unencrypted transport, or STARTTLS is
    /// repeated.
    pub fn begin(&mut self, command: &Command) -> Result<Tag> {
        self.ensure_not_closed()?;

        if let Some(pending) = &self.in_flight {
            return Err(CommandError::new(format!(
                "{} cannot start while {} is in flight",
                command.name(),
                pending.tag
            ))
            .with_kind(CommandErrorKind::Busy)
            .into());
        }

        if let Err(err) = self.check_preconditions(command) {
            tracing::info!(command = command.name(), error = %err, "command refused");
            return Err(err.into());
        }

        let tag = match self.tag_gen.next() {
            Ok(tag) => tag,
            Err(err) => return Err(self.poison(err.into())),
        };

        tracing::trace!(%tag, command = command.name(), "command started");
        self.in_flight = Some(InFlight {
            tag: tag.clone(),
            command: command.clone(),
        });
        Ok(tag)
    }

    fn check_preconditions(&self, command: &Command) -> std::result::Result<(), CommandError> {
        if !command.permitted_in(&self.state) {
            return Err(CommandError::invalid_state(command.name(), self.state.name()));
        }

        let requirement = command.requirement();
        if self.config.enforce_capabilities
            && !requirement.is_satisfied_by(self.capabilities.snapshot())
        {
            return Err(CommandError::unsupported(
                command.name(),
                &requirement.to_string(),
            ));
        }

        if command.is_plaintext_login() {
            if !self.capabilities.plaintext_login_permitted() {
                return Err(CommandError::new("server advertises LOGINDISABLED")
                    .with_kind(CommandErrorKind::LoginDisabled));
            }
            if self.config.require_tls_for_login && !self.encrypted {
                return Err(CommandError::new("LOGIN refused on an unencrypted connection")
                    .with_kind(CommandErrorKind::InsecureLogin));
            }
        }

        if matches!(command, Command::StartTls) && self.encrypted {
            return Err(CommandError::new("TLS is already active")
                .with_kind(CommandErrorKind::InvalidState));
        }

        Ok(())
    }

    /// Classifies the replies to the in-flight command and applies them.
    ///
    /// # Errors
    ///
    /// Whatever [`Outcome::classify`] reports. A fatal error tears the
    /// session down before it is returned. Calling this with no command in
    /// flight is itself a fatal sequencing error.
    pub fn finish(&mut self, replies: Vec<Reply>) -> Result<Outcome> {
        self.ensure_not_closed()?;

        let Some(InFlight { tag, command }) = self.in_flight.take() else {
            return Err(self.poison(ProtocolError::sequence("no command in flight").into()));
        };

        match Outcome::classify(&tag, &command, replies) {
            Ok(outcome) => {
                tracing::trace!(%tag, command = command.name(), "command completed");
                self.apply(&command, &outcome);
                Ok(outcome)
            }
            Err(err) if err.is_fatal() => Err(self.poison(err)),
            Err(err) => {
                tracing::debug!(%tag, command = command.name(), error = %err, "command failed");
                Err(err)
            }
        }
    }

    /// Feeds a failure raised outside the classifier (transport, handshake)
    /// through the propagation rule and returns it.
    pub fn fail(&mut self, err: Error) -> Error {
        self.in_flight = None;
        if err.is_fatal() && self.closed_reason.is_none() {
            self.poison(err)
        } else {
            err
        }
    }

    /// Records that the TLS handshake after STARTTLS succeeded.
    pub const fn tls_established(&mut self) {
        self.encrypted = true;
    }

    /// Runs `command` to completion over `transport`.
    ///
    /// After a successful STARTTLS the transport handshake runs before this
    /// returns. If this call tears the session down, [`Transport::close`] is
    /// invoked before the error is returned.
    ///
    /// # Errors
    ///
    /// Exactly one [`Error`]; see [`Session::begin`] and
    /// [`Session::finish`].
    pub fn execute<T>(&mut self, transport: &mut T, command: &Command) -> Result<Outcome>
    where
        T: Transport + ?Sized,
    {
        let was_open = self.closed_reason.is_none();
        let result = self.run(transport, command);
        if let Err(err) = &result
            && err.is_fatal()
            && was_open
        {
            transport.close();
        }
        result
    }

    fn run<T>(&mut self, transport: &mut T, command: &Command) -> Result<Outcome>
    where
        T: Transport + ?Sized,
    {
        let tag = self.begin(command)?;
        let replies = transport.send(&tag, command).map_err(|err| self.fail(err))?;
        let outcome = self.finish(replies)?;

        if matches!(command, Command::StartTls) {
            transport.start_tls().map_err(|err| self.fail(err))?;
            self.tls_established();
        }

        Ok(outcome)
    }

    fn apply(&mut self, command: &Command, outcome: &Outcome) {
        if matches!(command, Command::StartTls) {
            // Anything announced before the handshake is untrusted.
            self.capabilities.clear();
        } else if let Some(tokens) = &outcome.announcement {
            self.capabilities.refresh_from_tokens(tokens);
        }

        match command {
            Command::Login { .. } | Command::Authenticate { .. } => {
                self.transition(ConnectionState::Authenticated);
            }
            Command::Select { mailbox, .. } => {
                let read_only = matches!(outcome.code, Some(ResponseCode::ReadOnly));
                self.transition(ConnectionState::Selected(SelectedState {
                    mailbox: mailbox.clone(),
                    read_only,
                }));
            }
            Command::Examine { mailbox } => {
                self.transition(ConnectionState::Selected(SelectedState {
                    mailbox: mailbox.clone(),
                    read_only: true,
                }));
            }
            Command::Close | Command::Unselect => {
                self.transition(ConnectionState::Authenticated);
            }
            Command::Logout => {
                self.transition(ConnectionState::Disconnected);
                self.closed_reason = Some("logged out".to_string());
            }
            _ => {}
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "state transition");
            self.state = next;
        }
    }

    fn ensure_not_closed(&self) -> Result<()> {
        match &self.closed_reason {
            Some(reason) => Err(ProtocolError::closed(reason).into()),
            None => Ok(()),
        }
    }

    fn poison(&mut self, err: Error) -> Error {
        tracing::warn!(error = %err, state = %self.state, "fatal error, tearing down connection");
        self.in_flight = None;
        self.state = ConnectionState::Disconnected;
        self.closed_reason = Some(err.message().to_string());
        err
    }

    /// Returns `true` if the server advertised `tag`.
    #[must_use]
    pub const fn supports(&self, tag: Capability) -> bool {
        self.capabilities.has(tag)
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
    use crate::command::SelectModifier;
    use crate::config::Security;
    use crate::error::ProtocolErrorKind;
    use crate::types::Status;

    fn greeting(tokens: &[&str]) -> Untagged {
        Untagged::Ok {
            code: Some(ResponseCode::Capability(
                tokens.iter().map(ToString::to_string).collect(),
            )),
            text: "ready".to_string(),
        }
    }

    fn ok(tag: &Tag) -> Reply {
        Reply::Tagged {
            tag: tag.clone(),
            status: Status::Ok,
            code: None,
            text: "done".to_string(),
        }
    }

    fn login() -> Command {
        Command::Login {
            username: "user".to_string(),
            password: "secret".to_string(),
        }
    }

    fn authenticated(tokens: &[&str]) -> Session {
        let mut session = Session::new(SessionConfig::default());
        session.open(greeting(tokens)).unwrap();
        let tag = session.begin(&login()).unwrap();
        session.finish(vec![ok(&tag)]).unwrap();
        session
    }

    #[test]
    fn new_session_is_empty_and_disconnected() {
        let session = Session::new(SessionConfig::default());
        assert_eq!(session.state(), &ConnectionState::Disconnected);
        assert!(session.capabilities().snapshot().is_empty());
        assert!(!session.is_usable());
        assert!(session.is_encrypted());
    }

    #[test]
    fn command_before_greeting_is_refused() {
        let mut session = Session::new(SessionConfig::default());
        let err = session.begin(&Command::Noop).unwrap_err();
        assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::InvalidState);
    }

    #[test]
    fn greeting_capabilities_are_recorded() {
        let mut session = Session::new(SessionConfig::default());
        session.open(greeting(&["IMAP4rev1", "IDLE"])).unwrap();
        assert_eq!(session.state(), &ConnectionState::Connected);
        assert!(session.supports(Capability::Idle));
        assert_eq!(session.capabilities().generation(), 1);
    }

    #[test]
    fn preauth_greeting_skips_login() {
        let mut session = Session::new(SessionConfig::default());
        session
            .open(Untagged::PreAuth {
                code: None,
                text: "hi".to_string(),
            })
            .unwrap();
        assert_eq!(session.state(), &ConnectionState::Authenticated);
    }

    #[test]
    fn bye_greeting_is_fatal() {
        let mut session = Session::new(SessionConfig::default());
        let err = session
            .open(Untagged::Bye {
                text: "too many connections".to_string(),
            })
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(session.closed_reason().is_some());
    }

    #[test]
    fn second_greeting_is_fatal() {
        let mut session = Session::new(SessionConfig::default());
        session.open(greeting(&["IMAP4rev1"])).unwrap();
        let err = session.open(greeting(&["IMAP4rev1"])).unwrap_err();
        assert_eq!(err.as_protocol().unwrap().kind(), ProtocolErrorKind::Sequence);
        assert_eq!(session.state(), &ConnectionState::Disconnected);
    }

    #[test]
    fn only_one_command_in_flight() {
        let mut session = authenticated(&["IMAP4rev1"]);
        let tag = session.begin(&Command::Noop).unwrap();
        let err = session.begin(&Command::Noop).unwrap_err();
        assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::Busy);
        assert_eq!(session.in_flight(), Some(&tag));
    }

    #[test]
    fn missing_capability_is_command_error() {
        let mut session = authenticated(&["IMAP4rev1"]);
        let err = session.begin(&Command::Idle).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::Unsupported);
        assert_eq!(session.state(), &ConnectionState::Authenticated);
        assert!(session.in_flight().is_none());
    }

    #[test]
    fn enforcement_can_be_disabled() {
        let config = SessionConfig::builder().enforce_capabilities(false).build();
        let mut session = Session::new(config);
        session
            .open(Untagged::PreAuth {
                code: None,
                text: "hi".to_string(),
            })
            .unwrap();
        assert!(session.begin(&Command::Idle).is_ok());
    }

    #[test]
    fn login_disabled_blocks_login() {
        let mut session = Session::new(SessionConfig::default());
        session
            .open(greeting(&["IMAP4rev1", "LOGINDISABLED"]))
            .unwrap();
        let err = session.begin(&login()).unwrap_err();
        assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::LoginDisabled);
        assert_eq!(session.state(), &ConnectionState::Connected);
    }

    #[test]
    fn plaintext_login_needs_tls_by_default() {
        let config = SessionConfig::builder().security(Security::None).build();
        let mut session = Session::new(config);
        session.open(greeting(&["IMAP4rev1"])).unwrap();
        let err = session.begin(&login()).unwrap_err();
        assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::InsecureLogin);
    }

    #[test]
    fn plaintext_login_allowed_when_configured() {
        let config = SessionConfig::builder()
            .security(Security::None)
            .require_tls_for_login(false)
            .build();
        let mut session = Session::new(config);
        session.open(greeting(&["IMAP4rev1"])).unwrap();
        assert!(session.begin(&login()).is_ok());
    }

    #[test]
    fn starttls_twice_is_refused() {
        let mut session = Session::new(SessionConfig::default());
        session.open(greeting(&["IMAP4rev1", "STARTTLS"])).unwrap();
        let err = session.begin(&Command::StartTls).unwrap_err();
        assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::InvalidState);
    }

    #[test]
    fn select_and_examine_transitions() {
        let mut session = authenticated(&["IMAP4rev1"]);
        let tag = session
            .begin(&Command::Select {
                mailbox: "INBOX".to_string(),
                modifier: SelectModifier::None,
            })
            .unwrap();
        session.finish(vec![ok(&tag)]).unwrap();
        assert_eq!(session.state().selected_mailbox(), Some("INBOX"));
        assert!(!session.state().is_read_only());

        let tag = session
            .begin(&Command::Examine {
                mailbox: "Archive".to_string(),
            })
            .unwrap();
        session.finish(vec![ok(&tag)]).unwrap();
        assert!(session.state().is_read_only());

        let tag = session.begin(&Command::Close).unwrap();
        session.finish(vec![ok(&tag)]).unwrap();
        assert_eq!(session.state(), &ConnectionState::Authenticated);
    }

    #[test]
    fn failed_select_keeps_state() {
        let mut session = authenticated(&["IMAP4rev1"]);
        let tag = session
            .begin(&Command::Select {
                mailbox: "Missing".to_string(),
                modifier: SelectModifier::None,
            })
            .unwrap();
        let err = session
            .finish(vec![Reply::Tagged {
                tag,
                status: Status::No,
                code: Some(ResponseCode::Nonexistent),
                text: "no such mailbox".to_string(),
            }])
            .unwrap_err();
        assert_eq!(err.as_command().unwrap().code(), Some(&ResponseCode::Nonexistent));
        assert_eq!(session.state(), &ConnectionState::Authenticated);
        assert!(session.is_usable());
    }

    #[test]
    fn failed_command_ignores_announcement() {
        let mut session = authenticated(&["IMAP4rev1", "IDLE"]);
        let tag = session.begin(&Command::Noop).unwrap();
        let _ = session
            .finish(vec![
                Reply::Untagged(Untagged::Capability(vec!["IMAP4rev1".to_string()])),
                Reply::Tagged {
                    tag,
                    status: Status::Bad,
                    code: None,
                    text: "nope".to_string(),
                },
            ])
            .unwrap_err();
        assert!(session.supports(Capability::Idle));
    }

    #[test]
    fn login_response_code_refreshes_capabilities() {
        let mut session = Session::new(SessionConfig::default());
        session.open(greeting(&["IMAP4rev1", "AUTH=PLAIN"])).unwrap();
        let tag = session.begin(&login()).unwrap();
        session
            .finish(vec![Reply::Tagged {
                tag,
                status: Status::Ok,
                code: Some(ResponseCode::Capability(vec![
                    "IMAP4rev1".to_string(),
                    "MOVE".to_string(),
                ])),
                text: "Logged in".to_string(),
            }])
            .unwrap();
        assert!(session.supports(Capability::Move));
        assert!(!session.capabilities().supports_auth("PLAIN"));
    }

    #[test]
    fn fatal_reply_poisons_session() {
        let mut session = authenticated(&["IMAP4rev1"]);
        let tag = session.begin(&Command::Noop).unwrap();
        let err = session
            .finish(vec![
                Reply::Continuation {
                    text: "huh".to_string(),
                },
                ok(&tag),
            ])
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(session.state(), &ConnectionState::Disconnected);

        let err = session.begin(&Command::Noop).unwrap_err();
        assert_eq!(err.as_protocol().unwrap().kind(), ProtocolErrorKind::Closed);
    }

    #[test]
    fn finish_without_begin_is_fatal() {
        let mut session = authenticated(&["IMAP4rev1"]);
        let err = session.finish(Vec::new()).unwrap_err();
        assert_eq!(err.as_protocol().unwrap().kind(), ProtocolErrorKind::Sequence);
    }

    #[test]
    fn fail_with_command_error_keeps_session() {
        let mut session = authenticated(&["IMAP4rev1"]);
        session.begin(&Command::Noop).unwrap();
        let err = session.fail(CommandError::new("literal too large").into());
        assert!(!err.is_fatal());
        assert!(session.in_flight().is_none());
        assert!(session.is_usable());
    }

    #[test]
    fn logout_closes_session() {
        let mut session = authenticated(&["IMAP4rev1"]);
        let tag = session.begin(&Command::Logout).unwrap();
        session
            .finish(vec![
                Reply::Untagged(Untagged::Bye {
                    text: "bye".to_string(),
                }),
                ok(&tag),
            ])
            .unwrap();
        assert_eq!(session.closed_reason(), Some("logged out"));
        assert!(session.begin(&Command::Noop).unwrap_err().is_fatal());
    }

    #[test]
    fn tags_use_configured_prefix() {
        let config = SessionConfig::builder().tag_prefix('Q').build();
        let mut session = Session::new(config);
        session.open(greeting(&["IMAP4rev1"])).unwrap();
        assert_eq!(session.begin(&Command::Noop).unwrap(), "Q0000");
    }
}
