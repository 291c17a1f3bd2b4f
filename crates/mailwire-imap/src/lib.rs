//! # mailwire-imap
//!
//! Capability tracking and error propagation for IMAP clients
//! (RFC 3501 `IMAP4rev1`, RFC 9051 `IMAP4rev2`).
//!
//! ## Features
//!
//! - **Capability bitset**: every recognized capability is a stable bit in a
//!   `u64`; membership, union and intersection are single word operations
//! - **Live capability registry**: replaced wholesale on each announcement,
//!   including the `AUTH=`, `THREAD=`, `COMPRESS=` and `APPENDLIMIT=`
//!   parameters
//! - **Two-branch error model**: every failure is either fatal to the
//!   connection ([`ProtocolError`]) or local to one command
//!   ([`CommandError`])
//! - **Command gating**: extension commands are refused locally when the
//!   server never advertised them
//! - **Sans-I/O**: the crate never touches a socket; a [`Transport`] supplies
//!   parsed replies
//!
//! ## Quick Start
//!
//! ```
//! use mailwire_imap::protocol::{Reply, Untagged};
//! use mailwire_imap::{Command, ResponseCode, Session, SessionConfig, Status};
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.open(Untagged::Ok {
//!     code: Some(ResponseCode::Capability(vec!["IMAP4rev1".into()])),
//!     text: "server ready".into(),
//! })?;
//!
//! let tag = session.begin(&Command::Login {
//!     username: "user@example.com".into(),
//!     password: "secret".into(),
//! })?;
//! session.finish(vec![Reply::Tagged {
//!     tag,
//!     status: Status::Ok,
//!     code: Some(ResponseCode::Capability(vec!["IMAP4rev1".into(), "MOVE".into()])),
//!     text: "logged in".into(),
//! }])?;
//!
//! assert!(session.state().is_authenticated());
//! assert!(session.supports(mailwire_imap::Capability::Move));
//! # Ok::<(), mailwire_imap::Error>(())
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Disconnected ── greeting OK ──→ Connected ── LOGIN ──→ Authenticated
//!      ▲                                                   │      ▲
//!      │                                          SELECT   ▼      │ CLOSE
//!      └──── fatal error / LOGOUT (any state) ────────── Selected ┘
//! ```
//!
//! ## Modules
//!
//! - [`types`]: capability tags, the capability bitset, tags and response codes
//! - [`capabilities`]: the live per-connection capability registry
//! - [`command`]: commands, their capability requirements and tag generation
//! - [`protocol`]: connection state and reply classification
//! - [`session`]: the per-connection gatekeeper and the [`Transport`] seam

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod capabilities;
pub mod command;
mod config;
mod error;
pub mod protocol;
pub mod session;
pub mod types;

pub use capabilities::ServerCapabilities;
pub use command::{Command, Requirement, SelectModifier, TagGenerator};
pub use config::{Security, SessionConfig, SessionConfigBuilder};
pub use error::{
    BoxError, CommandError, CommandErrorKind, Error, ProtocolError, ProtocolErrorKind, Result,
    Severity,
};
pub use protocol::{ConnectionState, Outcome, Reply, SelectedState, Untagged};
pub use session::{Session, Transport};
pub use types::{Capability, CapabilitySet, ResponseCode, Status, Tag};
