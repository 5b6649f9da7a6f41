//! HTTP エラーレスポンス
//!
//! 各層のエラーを HTTP ステータスと `{"error": "<message>"}` に変換します。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    domain::{RepositoryError, UpstreamError, ValueObjectError},
    infrastructure::dto::{TranslateError, api::ErrorResponseDto},
    ui::middleware::AuthError,
    usecase::{
        BridgeError, EndConversationError, PostChatMessageError, SendConversationMessageError,
        StartConversationError,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    BadGateway(String),
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Unprocessable(m)
            | ApiError::BadGateway(m)
            | ApiError::ServiceUnavailable(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed with {}: {}", status, self.message());
        } else {
            tracing::debug!("Request rejected with {}: {}", status, self.message());
        }
        let body = ErrorResponseDto {
            error: self.message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Unavailable(_) => ApiError::ServiceUnavailable(err.to_string()),
            UpstreamError::Transport(_)
            | UpstreamError::Rejected(_)
            | UpstreamError::InvalidResponse(_)
            | UpstreamError::Protocol(_) => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => ApiError::NotFound(err.to_string()),
            RepositoryError::Duplicate(_) => ApiError::Conflict(err.to_string()),
            RepositoryError::ConstraintViolation(_) => ApiError::Unprocessable(err.to_string()),
        }
    }
}

impl From<ValueObjectError> for ApiError {
    fn from(err: ValueObjectError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<TranslateError> for ApiError {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::InvalidInput(_) => ApiError::BadRequest(err.to_string()),
            TranslateError::InvalidUpstreamResponse(_) => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl From<PostChatMessageError> for ApiError {
    fn from(err: PostChatMessageError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<StartConversationError> for ApiError {
    fn from(err: StartConversationError) -> Self {
        match err {
            StartConversationError::Upstream(e) => e.into(),
            StartConversationError::Repository(e) => e.into(),
        }
    }
}

impl From<EndConversationError> for ApiError {
    fn from(err: EndConversationError) -> Self {
        match err {
            EndConversationError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            EndConversationError::Forbidden(_) => ApiError::Forbidden(err.to_string()),
            EndConversationError::Upstream(e) => e.into(),
            EndConversationError::Repository(e) => e.into(),
        }
    }
}

impl From<SendConversationMessageError> for ApiError {
    fn from(err: SendConversationMessageError) -> Self {
        match err {
            SendConversationMessageError::Forbidden(_) => ApiError::Forbidden(err.to_string()),
            SendConversationMessageError::Upstream(e) => e.into(),
            SendConversationMessageError::Repository(e) => e.into(),
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Upstream(e) => e.into(),
        }
    }
}
