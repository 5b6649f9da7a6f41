//! Utilities shared across Hanashi packages.

pub mod logger;
pub mod time;
