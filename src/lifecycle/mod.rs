//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Initialize stores and engine
//!     → Spawn background tasks → Start listener
//!
//! Shutdown:
//!     ctrl-c/SIGTERM → stop accepting → broadcast to background tasks
//!     → persist blacklist → exit
//! ```

pub mod shutdown;

pub use shutdown::{signal_received, Shutdown};
