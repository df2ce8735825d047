//! NetSnare API
//!
//! Entry points for embedders: the UI message channel and the runtime that
//! wires the interception components together.

pub mod handler;
pub mod runtime;

pub use handler::MessageHandler;
pub use runtime::{init_logging, Interceptor, InterceptorConfig};
