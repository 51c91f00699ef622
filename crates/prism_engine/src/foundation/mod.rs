//! Foundation module - core utilities and types
//!
//! - Math type aliases over nalgebra
//! - Frame timing
//! - Logging setup

pub mod logging;
pub mod math;
pub mod time;
