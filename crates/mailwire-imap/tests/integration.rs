//! Integration tests for the session gatekeeper.
//!
//! These tests drive a [`Session`] through a scripted transport that replays
//! canned server replies, without requiring a real server connection.

use std::collections::VecDeque;
use std::io;

use mailwire_imap::protocol::{Reply, Untagged};
use mailwire_imap::{
    Capability, Command, CommandErrorKind, ConnectionState, ProtocolErrorKind, ResponseCode,
    Result, Security, SelectModifier, Session, SessionConfig, Status, Tag, Transport,
};

type Step = Box<dyn FnOnce(&Tag) -> Result<Vec<Reply>>>;

/// Mock transport that returns predefined replies.
#[derive(Default)]
struct MockTransport {
    /// Replies to return (in order), one step per command.
    script: VecDeque<Step>,
    /// Names of the commands that reached the wire.
    sent: Vec<String>,
    /// Number of `close()` calls.
    closes: usize,
    /// Number of TLS handshakes performed.
    handshakes: usize,
    /// Fail the next handshake.
    fail_handshake: bool,
    /// Literal continuations consumed while writing commands.
    literals: usize,
    /// Hand literal continuations to the session instead of consuming them.
    leak_literals: bool,
}

impl MockTransport {
    fn new() -> Self {
        Self::default()
    }

    fn then(mut self, step: impl FnOnce(&Tag) -> Result<Vec<Reply>> + 'static) -> Self {
        self.script.push_back(Box::new(step));
        self
    }

    fn then_ok(self) -> Self {
        self.then(|tag| Ok(vec![tagged(tag, Status::Ok, None)]))
    }
}

impl Transport for MockTransport {
    fn send(&mut self, tag: &Tag, command: &Command) -> Result<Vec<Reply>> {
        self.sent.push(command.name().to_string());
        let step = self
            .script
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted command {}", command.name()));
        let mut replies = step(tag)?;
        if needs_literal(command)
            && !self.leak_literals
            && matches!(replies.first(), Some(Reply::Continuation { .. }))
        {
            replies.remove(0);
            self.literals += 1;
        }
        Ok(replies)
    }

    fn start_tls(&mut self) -> Result<()> {
        self.handshakes += 1;
        if self.fail_handshake {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "handshake failed").into());
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// Whether writing `command` requires a synchronizing literal.
fn needs_literal(command: &Command) -> bool {
    let quotable = |s: &str| s.bytes().all(|b| b.is_ascii() && b != b'"' && b != b'\\');
    match command {
        Command::Login { username, password } => !quotable(username) || !quotable(password),
        Command::Create { mailbox } | Command::Select { mailbox, .. } => !quotable(mailbox),
        Command::Append { .. } => true,
        _ => false,
    }
}

fn literal_then_ok(tag: &Tag) -> Result<Vec<Reply>> {
    Ok(vec![
        Reply::Continuation {
            text: "Ready for literal data".to_string(),
        },
        tagged(tag, Status::Ok, None),
    ])
}

fn tagged(tag: &Tag, status: Status, code: Option<ResponseCode>) -> Reply {
    Reply::Tagged {
        tag: tag.clone(),
        status,
        code,
        text: "completed".to_string(),
    }
}

fn caps(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(ToString::to_string).collect()
}

fn greeting(tokens: &[&str]) -> Untagged {
    Untagged::Ok {
        code: Some(ResponseCode::Capability(caps(tokens))),
        text: "IMAP4rev1 Service Ready".to_string(),
    }
}

fn login() -> Command {
    Command::Login {
        username: "user@example.com".to_string(),
        password: "hunter2".to_string(),
    }
}

fn select(mailbox: &str) -> Command {
    Command::Select {
        mailbox: mailbox.to_string(),
        modifier: SelectModifier::None,
    }
}

fn selected_session(tokens: &[&str]) -> (Session, MockTransport) {
    let mut session = Session::new(SessionConfig::default());
    session.open(greeting(tokens)).unwrap();
    let mut transport = MockTransport::new().then_ok().then_ok();
    session.execute(&mut transport, &login()).unwrap();
    session.execute(&mut transport, &select("INBOX")).unwrap();
    (session, transport)
}

#[test]
fn test_starttls_lifts_login_disabled() {
    let config = SessionConfig::builder().security(Security::StartTls).build();
    let mut session = Session::new(config);
    session
        .open(greeting(&["IMAP4rev1", "STARTTLS", "LOGINDISABLED"]))
        .unwrap();

    let mut transport = MockTransport::new()
        .then_ok()
        .then(|tag| {
            Ok(vec![
                Reply::Untagged(Untagged::Capability(caps(&["IMAP4rev1", "AUTH=PLAIN"]))),
                tagged(tag, Status::Ok, None),
            ])
        })
        .then_ok();

    let err = session.execute(&mut transport, &login()).unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::LoginDisabled);
    assert!(transport.sent.is_empty());

    session.execute(&mut transport, &Command::StartTls).unwrap();
    assert_eq!(transport.handshakes, 1);
    assert!(session.is_encrypted());
    assert!(session.capabilities().snapshot().is_empty());

    session.execute(&mut transport, &Command::Capability).unwrap();
    assert!(session.capabilities().plaintext_login_permitted());
    assert!(session.capabilities().supports_auth("plain"));

    session.execute(&mut transport, &login()).unwrap();
    assert_eq!(session.state(), &ConnectionState::Authenticated);
    assert_eq!(transport.sent, ["STARTTLS", "CAPABILITY", "LOGIN"]);
}

#[test]
fn test_login_refused_on_plaintext_connection() {
    let config = SessionConfig::builder().security(Security::StartTls).build();
    let mut session = Session::new(config);
    session.open(greeting(&["IMAP4rev1", "STARTTLS"])).unwrap();

    let mut transport = MockTransport::new();
    let err = session.execute(&mut transport, &login()).unwrap_err();
    assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::InsecureLogin);
    assert!(transport.sent.is_empty());
    assert!(session.is_usable());
}

#[test]
fn test_move_without_capability_is_local_failure() {
    let (mut session, mut transport) = selected_session(&["IMAP4rev1"]);
    let sent_before = transport.sent.len();

    let err = session
        .execute(
            &mut transport,
            &Command::Move {
                sequence: "1:3".to_string(),
                mailbox: "Archive".to_string(),
                uid: true,
            },
        )
        .unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::Unsupported);
    assert_eq!(err.to_string(), "Command failed: UID MOVE requires MOVE or IMAP4rev2");
    assert_eq!(transport.sent.len(), sent_before);
    assert_eq!(session.state().selected_mailbox(), Some("INBOX"));

    let mut transport = MockTransport::new().then_ok();
    session.execute(&mut transport, &Command::Noop).unwrap();
    assert_eq!(transport.closes, 0);
}

#[test]
fn test_rev2_server_allows_move() {
    let (mut session, _) = selected_session(&["IMAP4rev2"]);
    let mut transport = MockTransport::new().then_ok();
    session
        .execute(
            &mut transport,
            &Command::Move {
                sequence: "7".to_string(),
                mailbox: "Trash".to_string(),
                uid: false,
            },
        )
        .unwrap();
    assert_eq!(transport.sent, ["MOVE"]);
}

#[test]
fn test_unexpected_continuation_tears_down_connection() {
    let (mut session, _) = selected_session(&["IMAP4rev1"]);
    let mut transport = MockTransport::new().then(|tag| {
        Ok(vec![
            Reply::Continuation {
                text: "go ahead".to_string(),
            },
            tagged(tag, Status::Ok, None),
        ])
    });

    let fetch = Command::Fetch {
        sequence: "1:*".to_string(),
        items: "(FLAGS)".to_string(),
        uid: false,
    };
    let err = session.execute(&mut transport, &fetch).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(
        err.as_protocol().unwrap().kind(),
        ProtocolErrorKind::UnexpectedContinuation
    );
    assert_eq!(session.state(), &ConnectionState::Disconnected);
    assert_eq!(transport.closes, 1);

    let err = session.execute(&mut transport, &Command::Noop).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.as_protocol().unwrap().kind(), ProtocolErrorKind::Closed);
    assert_eq!(transport.sent, ["FETCH"]);
    assert_eq!(transport.closes, 1);
}

#[test]
fn test_announcement_replaces_capabilities() {
    let mut session = Session::new(SessionConfig::default());
    session
        .open(greeting(&["IMAP4rev1", "IDLE", "MOVE", "AUTH=PLAIN"]))
        .unwrap();
    assert!(session.supports(Capability::Move));

    let mut transport = MockTransport::new().then(|tag| {
        Ok(vec![tagged(
            tag,
            Status::Ok,
            Some(ResponseCode::Capability(caps(&["IMAP4rev1", "IDLE"]))),
        )])
    });
    session.execute(&mut transport, &login()).unwrap();

    assert!(session.supports(Capability::Idle));
    assert!(!session.supports(Capability::Move));
    assert!(session.capabilities().auth_mechanisms().is_empty());
    assert_eq!(session.capabilities().generation(), 2);
}

#[test]
fn test_server_no_keeps_session_usable() {
    let (mut session, _) = selected_session(&["IMAP4rev1"]);
    let mut transport = MockTransport::new()
        .then(|tag| {
            Ok(vec![tagged(
                tag,
                Status::No,
                Some(ResponseCode::TryCreate),
            )])
        })
        .then(|tag| Ok(vec![tagged(tag, Status::Bad, None)]))
        .then_ok();

    let copy = Command::Copy {
        sequence: "1".to_string(),
        mailbox: "Nowhere".to_string(),
        uid: false,
    };
    let err = session.execute(&mut transport, &copy).unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(err.as_command().unwrap().code(), Some(&ResponseCode::TryCreate));

    let err = session.execute(&mut transport, &Command::Expunge).unwrap_err();
    assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::Bad);

    session.execute(&mut transport, &Command::Noop).unwrap();
    assert!(session.state().is_selected());
    assert_eq!(transport.closes, 0);
}

#[test]
fn test_transport_io_error_is_fatal() {
    let (mut session, _) = selected_session(&["IMAP4rev1"]);
    let mut transport = MockTransport::new().then(|_| {
        Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection reset").into())
    });

    let err = session.execute(&mut transport, &Command::Noop).unwrap_err();
    assert_eq!(err.as_protocol().unwrap().kind(), ProtocolErrorKind::Io);
    assert_eq!(transport.closes, 1);
    assert!(session.closed_reason().is_some());
}

#[test]
fn test_failed_handshake_is_fatal() {
    let config = SessionConfig::builder().security(Security::StartTls).build();
    let mut session = Session::new(config);
    session.open(greeting(&["IMAP4rev1", "STARTTLS"])).unwrap();

    let mut transport = MockTransport::new().then_ok();
    transport.fail_handshake = true;

    let err = session.execute(&mut transport, &Command::StartTls).unwrap_err();
    assert!(err.is_fatal());
    assert!(!session.is_encrypted());
    assert_eq!(session.state(), &ConnectionState::Disconnected);
    assert_eq!(transport.closes, 1);
}

#[test]
fn test_unsolicited_bye_is_fatal() {
    let (mut session, _) = selected_session(&["IMAP4rev1"]);
    let mut transport = MockTransport::new().then(|tag| {
        Ok(vec![
            Reply::Untagged(Untagged::Bye {
                text: "server shutting down".to_string(),
            }),
            tagged(tag, Status::No, None),
        ])
    });

    let err = session.execute(&mut transport, &Command::Noop).unwrap_err();
    assert_eq!(err.as_protocol().unwrap().kind(), ProtocolErrorKind::Bye);
    assert_eq!(transport.closes, 1);
}

#[test]
fn test_logout_ends_session() {
    let (mut session, _) = selected_session(&["IMAP4rev1"]);
    let mut transport = MockTransport::new().then(|tag| {
        Ok(vec![
            Reply::Untagged(Untagged::Bye {
                text: "logging out".to_string(),
            }),
            tagged(tag, Status::Ok, None),
        ])
    });

    let outcome = session.execute(&mut transport, &Command::Logout).unwrap();
    assert_eq!(outcome.bye.as_deref(), Some("logging out"));
    assert_eq!(session.state(), &ConnectionState::Disconnected);
    assert_eq!(transport.closes, 0);

    let err = session.execute(&mut transport, &Command::Noop).unwrap_err();
    assert_eq!(err.as_protocol().unwrap().kind(), ProtocolErrorKind::Closed);
    assert_eq!(transport.sent, ["LOGOUT"]);
}

#[test]
fn test_condstore_select_needs_capability() {
    let mut session = Session::new(SessionConfig::default());
    session.open(greeting(&["IMAP4rev1"])).unwrap();
    let mut transport = MockTransport::new().then_ok();
    session.execute(&mut transport, &login()).unwrap();

    let err = session
        .execute(
            &mut transport,
            &Command::Select {
                mailbox: "INBOX".to_string(),
                modifier: SelectModifier::CondStore,
            },
        )
        .unwrap_err();
    assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::Unsupported);
    assert_eq!(session.state(), &ConnectionState::Authenticated);
}

#[test]
fn test_literal_arguments_keep_session_usable() {
    let mut session = Session::new(SessionConfig::default());
    session.open(greeting(&["IMAP4rev1"])).unwrap();
    let mut transport = MockTransport::new()
        .then(literal_then_ok)
        .then(literal_then_ok)
        .then(literal_then_ok)
        .then_ok();

    let login = Command::Login {
        username: "user@example.com".to_string(),
        password: "p\u{e4}ss\"".to_string(),
    };
    session.execute(&mut transport, &login).unwrap();
    session
        .execute(
            &mut transport,
            &Command::Create {
                mailbox: "Entw\u{fc}rfe".to_string(),
            },
        )
        .unwrap();
    session
        .execute(
            &mut transport,
            &Command::Append {
                mailbox: "Entw\u{fc}rfe".to_string(),
                message: b"Subject: draft\r\n\r\nbody".to_vec(),
            },
        )
        .unwrap();
    session.execute(&mut transport, &Command::Noop).unwrap();

    assert_eq!(transport.literals, 3);
    assert_eq!(transport.closes, 0);
    assert_eq!(session.state(), &ConnectionState::Authenticated);
}

#[test]
fn test_leaked_literal_continuation_is_fatal() {
    let mut session = Session::new(SessionConfig::default());
    session.open(greeting(&["IMAP4rev1"])).unwrap();
    let mut transport = MockTransport::new().then(literal_then_ok);
    transport.leak_literals = true;

    let login = Command::Login {
        username: "user@example.com".to_string(),
        password: "p\u{e4}ss\"".to_string(),
    };
    let err = session.execute(&mut transport, &login).unwrap_err();
    assert_eq!(
        err.as_protocol().unwrap().kind(),
        ProtocolErrorKind::UnexpectedContinuation
    );
    assert_eq!(session.state(), &ConnectionState::Disconnected);
    assert_eq!(transport.closes, 1);
}
