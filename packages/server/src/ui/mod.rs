//! HTTP / WebSocket gateway implementation.

pub mod error;
mod handler;
pub mod middleware;
mod server;
mod signal;
pub mod state;

pub use server::{REQUEST_ID_HEADER, Server};
