//! # NetSnare Core
//!
//! Interception engine for an in-browser HTTP traffic inspector. Attaches to
//! browser tabs through a debugging-protocol host, matches paused requests
//! against user rules, and pauses, edits, mocks or redirects them.
//!
//! ## Features
//!
//! - Glob URL patterns with resource type, method and stage filters
//! - Pause requests or responses for manual inspection and editing
//! - Request rewriting, mocked responses and URL redirection
//! - Rules and the global switch persisted in SQLite
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  UI surfaces (popup, panel)              │
//! ├─────────────────────────────────────────────────────────┤
//! │        MessageHandler  ◄──►  broadcast (STATE_UPDATED)   │
//! ├─────────────────────────────────────────────────────────┤
//! │                   NetSnare Core (Rust)                   │
//! │  ┌─────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐  │
//! │  │ Session │  │ Intercept│  │  State   │  │ Settings │  │
//! │  │ Manager │──│  Engine  │──│  Store   │──│ (SQLite) │  │
//! │  └─────────┘  └──────────┘  └──────────┘  └──────────┘  │
//! ├─────────────────────────────────────────────────────────┤
//! │            DebuggerHost (Fetch domain commands)          │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod host;
pub mod intercept;
pub mod models;
pub mod state;
pub mod storage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
