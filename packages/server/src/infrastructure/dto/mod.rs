//! Data Transfer Objects (DTOs).
//!
//! DTOs are organized by protocol:
//! - `api`: client-facing HTTP request / response DTOs
//! - `websocket`: WebSocket push message DTOs
//! - `upstream`: inference service DTOs

pub mod api;
pub mod conversion;
pub mod upstream;
pub mod websocket;

pub use conversion::{TranslateError, response_from_upstream};
