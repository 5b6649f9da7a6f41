//! Hanashi gateway library.
//!
//! Authenticates callers, keeps in-memory chat rooms and conversation sessions, and relays
//! chat / audio exchanges to the AI inference service.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// wiring
pub mod app;
pub mod config;
