//! API middleware.
//!
//! Preflight checks run before library routes.

pub mod preflight;

pub use preflight::{require_root_folder, require_tools};
