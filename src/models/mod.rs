//! Models Module - Data Structures & Configuration
//!
//! Layout and event types, the dependency manifest, configuration and the
//! application error type.

pub mod config;
pub mod errors;
pub mod manifest;
pub mod types;

pub use config::*;
pub use errors::*;
pub use manifest::*;
pub use types::*;
