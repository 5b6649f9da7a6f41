//! Audio bridge between a client WebSocket and the upstream inference stream.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{StreamExt, future};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

use crate::{
    domain::{ClientFrame, Language, Plan, SUBSCRIBER_QUEUE_CAPACITY, SetupConfig, UserId},
    infrastructure::dto::api::DEFAULT_CHARACTER,
    ui::{error::ApiError, middleware::CallerIdentity, state::AppState},
};

use super::{close_with_error, conversation::DEFAULT_LANGUAGE, pusher_loop, username_or_id};

/// Query parameters for the audio bridge
#[derive(Debug, Default, Deserialize)]
pub struct BridgeQuery {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// Build the setup message from the caller identity and the connect query
fn setup_config(user_id: UserId, query: BridgeQuery) -> Result<SetupConfig, ApiError> {
    let username = username_or_id(query.username.unwrap_or_default(), &user_id);
    let language = Language::new(
        non_empty(query.language).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
    )?;
    let character = non_empty(query.character).unwrap_or_else(|| DEFAULT_CHARACTER.to_string());
    let plan = match non_empty(query.plan) {
        Some(plan) => Plan::try_from(plan.as_str())?,
        None => Plan::default(),
    };
    Ok(SetupConfig {
        user_id,
        username,
        language,
        character,
        plan,
    })
}

pub async fn audio_bridge_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<CallerIdentity>,
    Query(query): Query<BridgeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let setup = setup_config(identity.user_id, query)?;
    Ok(ws.on_upgrade(move |socket| handle_bridge(socket, state, setup)))
}

fn to_client_frame(message: Message) -> Option<ClientFrame> {
    match message {
        Message::Binary(bytes) => Some(ClientFrame::Binary(bytes.to_vec())),
        Message::Text(text) => Some(ClientFrame::Text(text.to_string())),
        Message::Close(_) => Some(ClientFrame::Close),
        // Ping/pong is handled automatically by the WebSocket protocol
        Message::Ping(_) | Message::Pong(_) => None,
    }
}

fn to_message(frame: ClientFrame) -> Message {
    match frame {
        ClientFrame::Binary(bytes) => Message::Binary(bytes.into()),
        ClientFrame::Text(text) => Message::Text(text.into()),
        ClientFrame::Close => Message::Close(None),
    }
}

async fn handle_bridge(socket: WebSocket, state: Arc<AppState>, setup: SetupConfig) {
    let user_id = setup.user_id.clone();
    let (sender, receiver) = socket.split();
    let cancel = state.shutdown.child_token();

    let inbound = receiver.filter_map(|message| {
        future::ready(match message {
            Ok(message) => to_client_frame(message).map(Ok),
            Err(e) => Some(Err(e)),
        })
    });

    let (tx, rx) = mpsc::channel::<ClientFrame>(SUBSCRIBER_QUEUE_CAPACITY);
    let pusher = pusher_loop(rx, sender, |frame| Some(to_message(frame)));

    let result = state
        .bridge_audio_stream_usecase
        .execute(setup, inbound, PollSender::new(tx), cancel)
        .await;

    let sender = match pusher.await {
        Ok(sender) => sender,
        Err(e) => {
            tracing::warn!("Bridge pusher task failed: {}", e);
            return;
        }
    };

    match result {
        Ok(outcome) if outcome.ended_by_client() => {
            tracing::info!("Bridge for '{}' ended by client: {:?}", user_id, outcome);
        }
        Ok(outcome) => {
            tracing::info!("Bridge for '{}' ended: {:?}", user_id, outcome);
        }
        Err(e) => {
            tracing::warn!("Bridge for '{}' failed: {}", user_id, e);
            close_with_error(sender, ApiError::from(e).message().to_string()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValueObjectError;

    fn alice() -> UserId {
        UserId::new("alice".to_string()).unwrap()
    }

    #[test]
    fn test_setup_defaults() {
        // テスト項目: クエリが無い場合は既定値で setup が作られる
        // given (前提条件):
        let query = BridgeQuery::default();

        // when (操作):
        let setup = setup_config(alice(), query).unwrap();

        // then (期待する結果):
        assert_eq!(setup.username, "alice");
        assert_eq!(setup.language.as_str(), "ja");
        assert_eq!(setup.character, "friend");
        assert_eq!(setup.plan, Plan::Lite);
    }

    #[test]
    fn test_setup_from_query() {
        // テスト項目: クエリの値が setup に反映される
        // given (前提条件):
        let query = BridgeQuery {
            username: Some("Alice".to_string()),
            language: Some("en".to_string()),
            character: Some("tutor".to_string()),
            plan: Some("premium".to_string()),
        };

        // when (操作):
        let setup = setup_config(alice(), query).unwrap();

        // then (期待する結果):
        assert_eq!(setup.user_id, alice());
        assert_eq!(setup.username, "Alice");
        assert_eq!(setup.language.as_str(), "en");
        assert_eq!(setup.character, "tutor");
        assert_eq!(setup.plan, Plan::Premium);
    }

    #[test]
    fn test_unknown_plan_is_rejected() {
        // テスト項目: 不明なプランは 400 になる
        // given (前提条件):
        let query = BridgeQuery {
            plan: Some("gold".to_string()),
            ..Default::default()
        };

        // when (操作):
        let result = setup_config(alice(), query);

        // then (期待する結果):
        let err = result.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(matches!(
            Plan::try_from("gold"),
            Err(ValueObjectError::Unknown { .. })
        ));
    }

    #[test]
    fn test_client_frame_mapping() {
        // テスト項目: クライアントのフレームが ClientFrame に対応付けられ、ping は捨てられる
        // given (前提条件):
        let binary = Message::Binary(vec![1u8, 2, 3].into());
        let text = Message::Text("EOS".into());
        let ping = Message::Ping(Vec::<u8>::new().into());

        // when (操作):
        let frames = (
            to_client_frame(binary),
            to_client_frame(text),
            to_client_frame(ping),
        );

        // then (期待する結果):
        assert_eq!(frames.0, Some(ClientFrame::Binary(vec![1, 2, 3])));
        assert_eq!(frames.1, Some(ClientFrame::Text("EOS".to_string())));
        assert_eq!(frames.2, None);
    }
}
