//! Sans-I/O reply classification.
//!
//! The response parser turns bytes into [`Reply`] values; this module decides
//! what one command's replies mean for the connection. Every command ends in
//! exactly one of:
//!
//! - an [`Outcome`] (tagged OK),
//! - a [`CommandError`] (tagged NO/BAD; the connection stays usable),
//! - a [`ProtocolError`] (framing or sequencing violation, BYE; the
//!   connection must be torn down).
//!
//! # Example
//!
//! ```
//! use mailwire_imap::protocol::{Outcome, Reply, Untagged};
//! use mailwire_imap::{Command, Status, Tag};
//!
//! let tag = Tag::new("A0001");
//! let replies = vec![
//!     Reply::Untagged(Untagged::Capability(vec!["IMAP4rev1".into(), "IDLE".into()])),
//!     Reply::Tagged {
//!         tag: tag.clone(),
//!         status: Status::Ok,
//!         code: None,
//!         text: "CAPABILITY completed".into(),
//!     },
//! ];
//!
//! let outcome = Outcome::classify(&tag, &Command::Capability, replies).unwrap();
//! assert_eq!(outcome.announcement.unwrap().len(), 2);
//! ```

mod state;

pub use state::{ConnectionState, SelectedState};

use crate::command::Command;
use crate::error::{CommandError, CommandErrorKind, ProtocolError};
use crate::types::{ResponseCode, Status, Tag};
use crate::Result;

/// Untagged server response, as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Untagged {
    /// `* OK [code] text`
    Ok {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* NO [code] text`
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BAD [code] text`
    Bad {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* PREAUTH [code] text` (greeting only)
    PreAuth {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BYE text`
    Bye {
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...` with the raw tokens.
    Capability(Vec<String>),
    /// Any other untagged data, kept opaque.
    Other(String),
}

impl Untagged {
    /// Returns the capability tokens this response announces, if any.
    ///
    /// Covers both `* CAPABILITY ...` and `* OK [CAPABILITY ...]`.
    #[must_use]
    pub fn capability_tokens(&self) -> Option<&[String]> {
        match self {
            Self::Capability(tokens) => Some(tokens),
            Self::Ok { code: Some(code), .. } | Self::PreAuth { code: Some(code), .. } => {
                code.capability_tokens()
            }
            _ => None,
        }
    }
}

/// One parsed server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Tagged completion.
    Tagged {
        /// Tag echoed by the server.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged data.
    Untagged(Untagged),
    /// Continuation request (`+ text`).
    Continuation {
        /// Continuation text.
        text: String,
    },
}

/// A command that completed with OK.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outcome {
    /// Response code of the tagged OK.
    pub code: Option<ResponseCode>,
    /// Text of the tagged OK.
    pub text: String,
    /// Untagged responses received while the command was in flight.
    pub responses: Vec<Untagged>,
    /// The last capability announcement seen, if any.
    pub announcement: Option<Vec<String>>,
    /// BYE text, when the server said goodbye (LOGOUT).
    pub bye: Option<String>,
}

impl Outcome {
    /// Classifies the replies to the command tagged `expected`.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`ProtocolError`] for a foreign tag, an unexpected
    /// continuation, data after the tagged completion, a missing completion,
    /// or BYE outside LOGOUT. Returns a [`CommandError`] for tagged NO/BAD.
    pub fn classify(expected: &Tag, command: &Command, replies: Vec<Reply>) -> Result<Self> {
        let mut outcome = Self::default();
        let mut completion = None;

        for reply in replies {
            if completion.is_some() {
                return Err(ProtocolError::sequence(format!(
                    "response received after tagged completion of {expected}"
                ))
                .into());
            }

            match reply {
                Reply::Continuation { text } => {
                    if !command.expects_continuation() {
                        return Err(
                            ProtocolError::unexpected_continuation(command.name(), &text).into()
                        );
                    }
                }
                Reply::Untagged(untagged) => {
                    if let Some(tokens) = untagged.capability_tokens() {
                        outcome.announcement = Some(tokens.to_vec());
                    }
                    if let Untagged::Bye { text } = &untagged {
                        outcome.bye = Some(text.clone());
                    }
                    outcome.responses.push(untagged);
                }
                Reply::Tagged {
                    tag,
                    status,
                    code,
                    text,
                } => {
                    if tag != *expected {
                        return Err(
                            ProtocolError::unexpected_tag(expected.as_str(), tag.as_str()).into()
                        );
                    }
                    completion = Some((status, code, text));
                }
            }
        }

        let Some((status, code, text)) = completion else {
            let err = match &outcome.bye {
                Some(bye) => ProtocolError::bye(bye),
                None => ProtocolError::missing_completion(expected.as_str()),
            };
            return Err(err.into());
        };

        if let Some(bye) = &outcome.bye
            && !matches!(command, Command::Logout)
        {
            return Err(ProtocolError::bye(bye).into());
        }

        match status {
            Status::Ok | Status::PreAuth => {
                if let Some(tokens) = code.as_ref().and_then(ResponseCode::capability_tokens) {
                    outcome.announcement = Some(tokens.to_vec());
                }
                outcome.code = code;
                outcome.text = text;
                Ok(outcome)
            }
            Status::No => Err(rejected(command, CommandErrorKind::No, code, &text).into()),
            Status::Bad => Err(rejected(command, CommandErrorKind::Bad, code, &text).into()),
            Status::Bye => Err(ProtocolError::bye(&text).into()),
        }
    }
}

fn rejected(
    command: &Command,
    kind: CommandErrorKind,
    code: Option<ResponseCode>,
    text: &str,
) -> CommandError {
    let verdict = if kind == CommandErrorKind::Bad {
        "BAD"
    } else {
        "NO"
    };
    CommandError::new(format!("{} {verdict}: {text}", command.name()))
        .with_kind(kind)
        .with_code(code)
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
    use crate::error::{Error, ProtocolErrorKind};

    fn tag() -> Tag {
        Tag::new("A0003")
    }

    fn tagged(status: Status, code: Option<ResponseCode>, text: &str) -> Reply {
        Reply::Tagged {
            tag: tag(),
            status,
            code,
            text: text.to_string(),
        }
    }

    fn protocol_kind(err: &Error) -> ProtocolErrorKind {
        err.as_protocol().unwrap().kind()
    }

    #[test]
    fn ok_collects_untagged_and_announcement() {
        let replies = vec![
            Reply::Untagged(Untagged::Other("LIST () \"/\" INBOX".to_string())),
            Reply::Untagged(Untagged::Capability(vec!["IMAP4rev1".to_string()])),
            tagged(Status::Ok, None, "done"),
        ];
        let outcome = Outcome::classify(&tag(), &Command::Noop, replies).unwrap();
        assert_eq!(outcome.responses.len(), 2);
        assert_eq!(outcome.announcement, Some(vec!["IMAP4rev1".to_string()]));
        assert_eq!(outcome.text, "done");
    }

    #[test]
    fn capability_code_on_tagged_ok_is_an_announcement() {
        let code = ResponseCode::Capability(vec!["IMAP4rev1".to_string(), "MOVE".to_string()]);
        let replies = vec![tagged(Status::Ok, Some(code), "Logged in")];
        let login = Command::Login {
            username: "u".to_string(),
            password: "p".to_string(),
        };
        let outcome = Outcome::classify(&tag(), &login, replies).unwrap();
        assert_eq!(outcome.announcement.unwrap()[1], "MOVE");
    }

    #[test]
    fn no_is_a_command_error_with_code() {
        let replies = vec![tagged(
            Status::No,
            Some(ResponseCode::TryCreate),
            "Mailbox does not exist",
        )];
        let cmd = Command::Copy {
            sequence: "1".to_string(),
            mailbox: "Nope".to_string(),
            uid: false,
        };
        let err = Outcome::classify(&tag(), &cmd, replies).unwrap_err();
        assert!(!err.is_fatal());
        let cmd_err = err.as_command().unwrap();
        assert_eq!(cmd_err.kind(), CommandErrorKind::No);
        assert_eq!(cmd_err.code(), Some(&ResponseCode::TryCreate));
        assert_eq!(cmd_err.message(), "COPY NO: Mailbox does not exist");
    }

    #[test]
    fn bad_is_a_command_error() {
        let err = Outcome::classify(&tag(), &Command::Noop, vec![tagged(Status::Bad, None, "syntax")])
            .unwrap_err();
        assert_eq!(err.as_command().unwrap().kind(), CommandErrorKind::Bad);
    }

    #[test]
    fn unexpected_continuation_is_fatal() {
        let replies = vec![
            Reply::Continuation {
                text: "go ahead".to_string(),
            },
            tagged(Status::Ok, None, "done"),
        ];
        let err = Outcome::classify(&tag(), &Command::Noop, replies).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(protocol_kind(&err), ProtocolErrorKind::UnexpectedContinuation);
    }

    #[test]
    fn literal_continuation_reaching_classifier_is_fatal() {
        let append = Command::Append {
            mailbox: "Sent".to_string(),
            message: b"hello".to_vec(),
        };
        let login = Command::Login {
            username: "user".to_string(),
            password: "p\u{e4}ss\"".to_string(),
        };
        for command in [append, login] {
            let replies = vec![
                Reply::Continuation {
                    text: "Ready for literal data".to_string(),
                },
                tagged(Status::Ok, None, "done"),
            ];
            let err = Outcome::classify(&tag(), &command, replies).unwrap_err();
            assert_eq!(protocol_kind(&err), ProtocolErrorKind::UnexpectedContinuation);
        }
    }

    #[test]
    fn continuation_during_idle_is_fine() {
        let replies = vec![
            Reply::Continuation {
                text: "idling".to_string(),
            },
            Reply::Untagged(Untagged::Other("3 EXISTS".to_string())),
            tagged(Status::Ok, None, "IDLE terminated"),
        ];
        assert!(Outcome::classify(&tag(), &Command::Idle, replies).is_ok());
    }

    #[test]
    fn foreign_tag_is_fatal() {
        let replies = vec![Reply::Tagged {
            tag: Tag::new("A0099"),
            status: Status::Ok,
            code: None,
            text: "done".to_string(),
        }];
        let err = Outcome::classify(&tag(), &Command::Noop, replies).unwrap_err();
        assert_eq!(protocol_kind(&err), ProtocolErrorKind::UnexpectedTag);
    }

    #[test]
    fn data_after_completion_is_fatal() {
        let replies = vec![
            tagged(Status::Ok, None, "done"),
            Reply::Untagged(Untagged::Other("1 EXISTS".to_string())),
        ];
        let err = Outcome::classify(&tag(), &Command::Noop, replies).unwrap_err();
        assert_eq!(protocol_kind(&err), ProtocolErrorKind::Sequence);
    }

    #[test]
    fn missing_completion_is_fatal() {
        let err = Outcome::classify(&tag(), &Command::Noop, Vec::new()).unwrap_err();
        assert_eq!(protocol_kind(&err), ProtocolErrorKind::MissingCompletion);
    }

    #[test]
    fn bye_without_completion_is_fatal() {
        let replies = vec![Reply::Untagged(Untagged::Bye {
            text: "idle timeout".to_string(),
        })];
        let err = Outcome::classify(&tag(), &Command::Noop, replies).unwrap_err();
        assert_eq!(protocol_kind(&err), ProtocolErrorKind::Bye);
    }

    #[test]
    fn bye_then_no_is_still_fatal() {
        let replies = vec![
            Reply::Untagged(Untagged::Bye {
                text: "shutting down".to_string(),
            }),
            tagged(Status::No, None, "aborted"),
        ];
        let err = Outcome::classify(&tag(), &Command::Noop, replies).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn bye_during_logout_is_success() {
        let replies = vec![
            Reply::Untagged(Untagged::Bye {
                text: "see you".to_string(),
            }),
            tagged(Status::Ok, None, "LOGOUT completed"),
        ];
        let outcome = Outcome::classify(&tag(), &Command::Logout, replies).unwrap();
        assert_eq!(outcome.bye.as_deref(), Some("see you"));
    }

    #[test]
    fn greeting_code_is_an_announcement() {
        let untagged = Untagged::PreAuth {
            code: Some(ResponseCode::Capability(vec!["IMAP4rev2".to_string()])),
            text: "welcome".to_string(),
        };
        assert_eq!(untagged.capability_tokens().unwrap(), ["IMAP4rev2".to_string()]);
        assert!(Untagged::Other("x".to_string()).capability_tokens().is_none());
    }
}
