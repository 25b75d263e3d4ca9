//! Embedding facade for pathfindr.
//!
//! [`Session`] ties the core together the way an interactive front end uses
//! it: markers snap to the nearest road node, a background search starts as
//! soon as both are placed, and visualization either replays that result or
//! runs live.

pub mod session;

pub use pathfindr_core;
pub use pathfindr_core::prelude;
pub use session::{Session, SessionConfig, SessionError, SessionSummary};
