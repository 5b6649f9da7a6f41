//! 推論サービスの音声ストリーム（WebSocket）
//!
//! - 送信: 制御フレーム（setup / end_of_input）は JSON テキスト、音声はバイナリ
//! - 受信: バイナリは音声、テキストは AI のテキスト応答

use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::{
    domain::{
        UpstreamConnector, UpstreamError, UpstreamFrame, UpstreamReceiver, UpstreamReply,
        UpstreamSender, UpstreamStream,
    },
    infrastructure::dto::upstream::UpstreamControlFrame,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketUpstreamConnector {
    url: String,
}

impl WebSocketUpstreamConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl UpstreamConnector for WebSocketUpstreamConnector {
    async fn open(&self) -> Result<UpstreamStream, UpstreamError> {
        let (ws_stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("{}: {}", self.url, e)))?;
        tracing::debug!("Upstream stream opened: {}", self.url);

        let (sink, stream) = ws_stream.split();
        Ok(UpstreamStream {
            sender: Box::new(WebSocketUpstreamSender { sink, closed: false }),
            receiver: Box::new(WebSocketUpstreamReceiver { stream }),
        })
    }
}

struct WebSocketUpstreamSender {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

fn control_message(frame: &UpstreamControlFrame) -> Result<Message, UpstreamError> {
    serde_json::to_string(frame)
        .map(|json| Message::Text(json.into()))
        .map_err(|e| UpstreamError::Protocol(format!("failed to encode control frame: {}", e)))
}

#[async_trait]
impl UpstreamSender for WebSocketUpstreamSender {
    async fn send(&mut self, frame: UpstreamFrame) -> Result<(), UpstreamError> {
        if self.closed {
            return Err(UpstreamError::Transport("upstream sender already closed".to_string()));
        }
        let message = match frame {
            UpstreamFrame::Setup(config) => control_message(&config.into())?,
            UpstreamFrame::AudioChunk(bytes) => Message::Binary(bytes.into()),
            UpstreamFrame::EndOfInput => {
                control_message(&UpstreamControlFrame::EndOfInput { end_of_input: true })?
            }
        };
        self.sink
            .send(message)
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), UpstreamError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sink
            .close()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))
    }
}

struct WebSocketUpstreamReceiver {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl UpstreamReceiver for WebSocketUpstreamReceiver {
    async fn recv(&mut self) -> Option<Result<UpstreamReply, UpstreamError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Binary(bytes)) => return Some(Ok(UpstreamReply::AudioChunk(bytes.to_vec()))),
                Ok(Message::Text(text)) => {
                    return Some(Ok(UpstreamReply::TextMessage(text.as_str().to_string())));
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(UpstreamError::Transport(e.to_string()))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Language, Plan, SetupConfig, UserId};
    use serde_json::Value;
    use tokio::{net::TcpListener, sync::mpsc};

    /// 受け取ったフレームを記録し、バイナリはそのまま返すスタブ
    async fn spawn_stub() -> (String, mpsc::UnboundedReceiver<Message>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text("ready".into())).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                let _ = tx.send(message.clone());
                match message {
                    Message::Binary(bytes) => ws.send(Message::Binary(bytes)).await.unwrap(),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });
        (format!("ws://{}", addr), rx)
    }

    #[tokio::test]
    async fn test_stream_frames_are_encoded() {
        // テスト項目: setup / 音声 / end_of_input がそれぞれ正しい形式で上流に届く
        // given (前提条件):
        let (url, mut recorded) = spawn_stub().await;
        let connector = WebSocketUpstreamConnector::new(url);
        let mut stream = connector.open().await.unwrap();
        let setup = SetupConfig {
            user_id: UserId::new("alice".to_string()).unwrap(),
            username: "Alice".to_string(),
            language: Language::new("ja".to_string()).unwrap(),
            character: "friend".to_string(),
            plan: Plan::Lite,
        };

        // when (操作):
        stream.sender.send(UpstreamFrame::Setup(setup)).await.unwrap();
        stream
            .sender
            .send(UpstreamFrame::AudioChunk(vec![1, 2, 3]))
            .await
            .unwrap();
        stream.sender.send(UpstreamFrame::EndOfInput).await.unwrap();

        // then (期待する結果):
        let Message::Text(setup_json) = recorded.recv().await.unwrap() else {
            panic!("setup must be a text frame");
        };
        let setup_json: Value = serde_json::from_str(setup_json.as_str()).unwrap();
        assert_eq!(setup_json["type"], "setup");
        assert_eq!(setup_json["plan"], "lite");
        assert_eq!(
            recorded.recv().await.unwrap(),
            Message::Binary(vec![1u8, 2, 3].into())
        );
        let Message::Text(eoi_json) = recorded.recv().await.unwrap() else {
            panic!("end_of_input must be a text frame");
        };
        let eoi_json: Value = serde_json::from_str(eoi_json.as_str()).unwrap();
        assert_eq!(eoi_json["type"], "end_of_input");
        assert_eq!(eoi_json["end_of_input"], true);
    }

    #[tokio::test]
    async fn test_replies_are_decoded() {
        // テスト項目: テキストはテキスト応答、バイナリは音声として受信される
        // given (前提条件):
        let (url, _recorded) = spawn_stub().await;
        let mut stream = WebSocketUpstreamConnector::new(url).open().await.unwrap();

        // when (操作):
        let first = stream.receiver.recv().await.unwrap().unwrap();
        stream
            .sender
            .send(UpstreamFrame::AudioChunk(vec![9; 4]))
            .await
            .unwrap();
        let second = stream.receiver.recv().await.unwrap().unwrap();

        // then (期待する結果):
        assert_eq!(first, UpstreamReply::TextMessage("ready".to_string()));
        assert_eq!(second, UpstreamReply::AudioChunk(vec![9; 4]));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        // テスト項目: close を二度呼んでもエラーにならず、以降の送信は失敗する
        // given (前提条件):
        let (url, _recorded) = spawn_stub().await;
        let mut stream = WebSocketUpstreamConnector::new(url).open().await.unwrap();

        // when (操作):
        stream.sender.close().await.unwrap();
        let second_close = stream.sender.close().await;
        let send_after_close = stream.sender.send(UpstreamFrame::EndOfInput).await;

        // then (期待する結果):
        assert!(second_close.is_ok());
        assert!(matches!(send_after_close, Err(UpstreamError::Transport(_))));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        // テスト項目: 接続できない場合は Unavailable になる
        // given (前提条件):
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        // when (操作):
        let result = WebSocketUpstreamConnector::new(format!("ws://{}", addr))
            .open()
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(UpstreamError::Unavailable(_))));
    }
}
