//! # yoyo-core
//!
//! Error types, resolved settings, and logging setup shared by every other
//! yoyo crate. Has no dependency on any particular database driver.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and result alias
//! - [`settings`] - Resolved, flat settings consumed by the engine
//! - [`logging`] - Tracing-based logging integration
//! - [`identity`] - `user@host` resolution for bookkeeping rows

pub mod error;
pub mod identity;
pub mod logging;
pub mod settings;

pub use error::{YoyoError, YoyoResult};
pub use settings::Settings;
