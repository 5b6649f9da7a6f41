//! Responder の実装
//!
//! - `remote`: 推論サービスへの HTTP JSON 呼び出し
//! - `fallback`: 推論サービス無しで動くローカル応答

mod fallback;
mod remote;

pub use fallback::FallbackResponder;
pub use remote::{REQUEST_TIMEOUT, RemoteResponder};
