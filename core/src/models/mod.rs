//! Data models for NetSnare
//!
//! Serialized in the camelCase JSON shape the UI surfaces exchange.

pub mod message;
pub mod paused;
pub mod rule;
pub mod state;

pub use message::*;
pub use paused::*;
pub use rule::*;
pub use state::*;
