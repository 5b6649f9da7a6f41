//! 推論サービスへの HTTP JSON 呼び出し

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use hanashi_shared::time::Clock;
use reqwest::StatusCode;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    domain::{
        ConversationRequest, ConversationResponse, Language, Responder, SessionId, UpstreamError,
        UserId,
    },
    infrastructure::dto::{
        response_from_upstream,
        upstream::{
            UpstreamEndRequest, UpstreamEndResponse, UpstreamMessageRequest,
            UpstreamMessageResponse, UpstreamStartRequest, UpstreamStartResponse,
        },
    },
};

/// 1 リクエストあたりのタイムアウト
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const START_PATH: &str = "/api/v1/conversation/start";
const END_PATH: &str = "/api/v1/conversation/end";
const MESSAGE_PATH: &str = "/api/v1/conversation/message";

/// 推論サービスに HTTP で問い合わせる Responder
pub struct RemoteResponder {
    client: reqwest::Client,
    base_url: String,
    clock: Arc<dyn Clock>,
}

impl RemoteResponder {
    pub fn new(base_url: impl Into<String>, clock: Arc<dyn Clock>) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            clock,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, UpstreamError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(UpstreamError::Unavailable(format!("{} returned {}", path, status)));
        }
        if !status.is_success() {
            return Err(UpstreamError::Rejected(format!("{} returned {}", path, status)));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(format!("{}: {}", path, e)))
    }
}

fn map_send_error(err: reqwest::Error) -> UpstreamError {
    if err.is_connect() || err.is_timeout() {
        UpstreamError::Unavailable(err.to_string())
    } else {
        UpstreamError::Transport(err.to_string())
    }
}

fn rejected(error_message: Option<String>) -> UpstreamError {
    UpstreamError::Rejected(
        error_message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "inference service reported failure".to_string()),
    )
}

#[async_trait]
impl Responder for RemoteResponder {
    async fn start_conversation(
        &self,
        user_id: &UserId,
        username: &str,
        language: &Language,
    ) -> Result<SessionId, UpstreamError> {
        tracing::info!(
            "Starting conversation for user {} in language {}",
            username,
            language
        );
        let request = UpstreamStartRequest {
            user_id: user_id.as_str().to_string(),
            username: username.to_string(),
            language: language.as_str().to_string(),
        };
        let response: UpstreamStartResponse = self.post(START_PATH, &request).await?;
        if !response.success {
            return Err(rejected(response.error_message));
        }
        SessionId::new(response.session_id)
            .map_err(|e| UpstreamError::InvalidResponse(format!("session_id: {}", e)))
    }

    async fn end_conversation(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<(), UpstreamError> {
        tracing::info!("Ending conversation session {}", session_id);
        let request = UpstreamEndRequest {
            session_id: session_id.as_str().to_string(),
            user_id: user_id.as_str().to_string(),
        };
        let response: UpstreamEndResponse = self.post(END_PATH, &request).await?;
        if !response.success {
            return Err(rejected(response.error_message));
        }
        Ok(())
    }

    async fn send_message(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationResponse, UpstreamError> {
        tracing::info!(
            "Processing message from user {} in language {}",
            request.username,
            request.language
        );
        let body = UpstreamMessageRequest::from(request);
        let response: UpstreamMessageResponse = self.post(MESSAGE_PATH, &body).await?;
        response_from_upstream(response, self.clock.now()).map_err(Into::into)
    }
}
