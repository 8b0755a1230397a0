//! Platform capability abstraction.
//!
//! This module provides the shared interface over the four capability
//! variants (summarizer, translator, language detector, prompt session)
//! and the providers that implement them.

mod kinds;
mod mock;
mod prompt;
mod registry;
mod traits;

pub use kinds::*;
pub use mock::{MockCapability, MockConfig};
pub use prompt::CumulativeDelta;
pub use registry::{CapabilityFactory, CapabilityRegistry};
pub use traits::*;
