//! Protocol module for relay ⇄ UI communication
//!
//! Defines the message types and serialization for the streaming relay
//! protocol. Messages are JSON envelopes over in-process channels, with
//! versioning support.

mod messages;
mod version;

pub use messages::*;
pub use version::*;
