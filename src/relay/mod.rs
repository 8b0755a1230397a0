//! Background relay.
//!
//! Turns user triggers into streaming capability sessions and forwards
//! every produced chunk to the UI consumer as a tagged envelope.

mod runner;
mod state;

pub use runner::{Relay, RelayCommand, RelayHandle, RelayOptions};
pub use state::{ActiveSession, RelayPhase, RelayStatus, SessionState, SessionTracker};
