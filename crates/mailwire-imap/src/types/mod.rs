//! Core IMAP types.
//!
//! This module defines the capability tags, the capability bitset and the
//! small protocol vocabulary (status, tags, response codes) the session
//! consumes from the response parser.

mod capability;
mod capability_set;
mod identifiers;
mod response_code;

pub use capability::{Capability, Status};
pub use capability_set::CapabilitySet;
pub use identifiers::Tag;
pub use response_code::ResponseCode;
