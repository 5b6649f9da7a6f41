//! ドメイン層のエラー定義

use thiserror::Error;

/// Value Object 生成時のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{kind} must be at most {max} characters (got {actual})")]
    TooLong {
        kind: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("unknown {kind}: '{value}'")]
    Unknown { kind: &'static str, value: String },
}

/// データストア（Repository）のエラー
///
/// 永続化層のエラーはこの固定された種類に変換されてから上位層に渡されます。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// 推論サービス（上流）とのやり取りで発生するエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// 推論サービスに接続できない
    #[error("inference service is unavailable: {0}")]
    Unavailable(String),

    /// 通信エラー（ストリームの切断、書き込み失敗など）
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// 推論サービスが処理を拒否した（success = false）
    #[error("upstream rejected the request: {0}")]
    Rejected(String),

    /// 推論サービスの応答が利用できない内容だった
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    /// 想定外のフレームなどプロトコル違反
    #[error("upstream protocol error: {0}")]
    Protocol(String),
}
