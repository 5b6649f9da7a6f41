//! UseCase: クライアントの WebSocket と推論サービスの音声ストリームの中継
//!
//! ## 処理の流れ
//!
//! 1. 上流ストリームを 1 本だけ開き、最初に setup を送る
//! 2. 上流 → クライアントを中継するタスクを起動する（終了時に oneshot で通知）
//! 3. クライアント → 上流をこのタスクで中継する
//!    - バイナリ: 音声チャンク
//!    - テキスト `EOS`: 入力終了
//!    - その他のテキスト: ログのみ
//! 4. どちらかが終わったら、上流の送信側を一度だけ閉じ、読み取りタスクの終了を待ってから返る
//!
//! 再接続・リトライは行いません。

use std::{fmt::Display, pin::Pin, sync::Arc, time::Duration};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::domain::{
    ClientFrame, END_OF_SPEECH_TOKEN, SetupConfig, UpstreamConnector, UpstreamError,
    UpstreamFrame, UpstreamReceiver, UpstreamReply, UpstreamSender, UpstreamStream,
};

use super::error::BridgeError;

/// 中継が終わった理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// クライアントが接続を閉じた
    ClientClosed,
    /// クライアントからの読み取りに失敗
    ClientError(String),
    /// クライアントへの書き込みに失敗
    ClientWriteFailed(String),
    /// キャンセル（サーバー停止など）
    Cancelled,
    /// クライアントからの入力が一定時間無かった
    IdleTimeout,
    /// 上流がストリームを閉じた
    UpstreamClosed,
    /// 上流との通信に失敗
    UpstreamFailed(UpstreamError),
}

impl BridgeOutcome {
    /// クライアント側の事情で終わったか
    pub fn ended_by_client(&self) -> bool {
        matches!(
            self,
            BridgeOutcome::ClientClosed
                | BridgeOutcome::ClientError(_)
                | BridgeOutcome::ClientWriteFailed(_)
                | BridgeOutcome::IdleTimeout
        )
    }
}

enum Inbound<E> {
    Frame(ClientFrame),
    Ended,
    Failed(E),
    Idle,
}

pub struct BridgeAudioStreamUseCase {
    connector: Arc<dyn UpstreamConnector>,
    idle_timeout: Option<Duration>,
}

impl BridgeAudioStreamUseCase {
    /// `idle_timeout` が `None` の場合、無通信による切断は行わない
    pub fn new(connector: Arc<dyn UpstreamConnector>, idle_timeout: Option<Duration>) -> Self {
        Self {
            connector,
            idle_timeout,
        }
    }

    /// 中継を実行する
    ///
    /// 上流を開けない、または setup を送れない場合は `Err`。それ以外は終了理由を返す。
    pub async fn execute<S, E, K>(
        &self,
        setup: SetupConfig,
        inbound: S,
        outbound: K,
        cancel: CancellationToken,
    ) -> Result<BridgeOutcome, BridgeError>
    where
        S: Stream<Item = Result<ClientFrame, E>> + Send,
        E: Display + Send,
        K: Sink<ClientFrame> + Send + 'static,
        K::Error: Display,
    {
        let UpstreamStream {
            mut sender,
            receiver,
        } = self.connector.open().await?;

        tracing::info!(
            "Bridge opened for user '{}' (language: {}, character: {}, plan: {})",
            setup.user_id,
            setup.language,
            setup.character,
            setup.plan.as_str()
        );
        if let Err(e) = sender.send(UpstreamFrame::Setup(setup)).await {
            close_sender(sender.as_mut()).await;
            return Err(e.into());
        }

        let reader_cancel = cancel.child_token();
        let (done_tx, mut done_rx) = oneshot::channel();
        let reader = tokio::spawn(relay_upstream(
            receiver,
            outbound,
            reader_cancel.clone(),
            done_tx,
        ));

        let mut inbound = std::pin::pin!(inbound);
        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break BridgeOutcome::Cancelled,
                ended = &mut done_rx => break ended.unwrap_or(BridgeOutcome::UpstreamClosed),
                next = next_inbound(&mut inbound, self.idle_timeout) => {
                    let frame = match next {
                        Inbound::Frame(frame) => frame,
                        Inbound::Ended => break BridgeOutcome::ClientClosed,
                        Inbound::Failed(e) => break BridgeOutcome::ClientError(e.to_string()),
                        Inbound::Idle => break BridgeOutcome::IdleTimeout,
                    };
                    let upstream_frame = match frame {
                        ClientFrame::Binary(bytes) => UpstreamFrame::AudioChunk(bytes),
                        ClientFrame::Text(text) if text == END_OF_SPEECH_TOKEN => {
                            UpstreamFrame::EndOfInput
                        }
                        ClientFrame::Text(text) => {
                            tracing::debug!("Ignoring text frame from client: {}", text);
                            continue;
                        }
                        ClientFrame::Close => break BridgeOutcome::ClientClosed,
                    };
                    if let Err(e) = sender.send(upstream_frame).await {
                        break BridgeOutcome::UpstreamFailed(e);
                    }
                }
            }
        };

        reader_cancel.cancel();
        close_sender(sender.as_mut()).await;
        if let Err(e) = reader.await {
            tracing::warn!("Upstream reader task failed: {}", e);
        }

        tracing::info!("Bridge closed: {:?}", outcome);
        Ok(outcome)
    }
}

async fn close_sender(sender: &mut dyn UpstreamSender) {
    if let Err(e) = sender.close().await {
        tracing::debug!("Failed to close upstream sender: {}", e);
    }
}

async fn next_inbound<S, E>(inbound: &mut Pin<&mut S>, idle_timeout: Option<Duration>) -> Inbound<E>
where
    S: Stream<Item = Result<ClientFrame, E>>,
{
    let next = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, inbound.next()).await {
            Ok(next) => next,
            Err(_) => return Inbound::Idle,
        },
        None => inbound.next().await,
    };
    match next {
        Some(Ok(frame)) => Inbound::Frame(frame),
        Some(Err(e)) => Inbound::Failed(e),
        None => Inbound::Ended,
    }
}

/// 上流 → クライアントの中継。空のフレームは送らない
async fn relay_upstream<K>(
    mut receiver: Box<dyn UpstreamReceiver>,
    outbound: K,
    cancel: CancellationToken,
    done: oneshot::Sender<BridgeOutcome>,
) where
    K: Sink<ClientFrame> + Send,
    K::Error: Display,
{
    let mut outbound = std::pin::pin!(outbound);
    let outcome = loop {
        let reply = tokio::select! {
            _ = cancel.cancelled() => break BridgeOutcome::Cancelled,
            reply = receiver.recv() => reply,
        };
        let frame = match reply {
            None => break BridgeOutcome::UpstreamClosed,
            Some(Err(e)) => break BridgeOutcome::UpstreamFailed(e),
            Some(Ok(UpstreamReply::AudioChunk(bytes))) if bytes.is_empty() => continue,
            Some(Ok(UpstreamReply::AudioChunk(bytes))) => ClientFrame::Binary(bytes),
            Some(Ok(UpstreamReply::TextMessage(text))) if text.is_empty() => continue,
            Some(Ok(UpstreamReply::TextMessage(text))) => ClientFrame::Text(text),
        };
        if let Err(e) = outbound.send(frame).await {
            break BridgeOutcome::ClientWriteFailed(e.to_string());
        }
    };

    if let Err(e) = outbound.close().await {
        tracing::debug!("Failed to close client sink: {}", e);
    }
    // 受信側が既に居なくても問題ない
    let _ = done.send(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Language, Plan, UserId};
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };
    use tokio::sync::mpsc;
    use tokio_util::sync::PollSender;

    #[derive(Default)]
    struct Probe {
        sent: Mutex<Vec<UpstreamFrame>>,
        close_calls: AtomicUsize,
        receiver_dropped: AtomicBool,
    }

    struct FakeSender {
        probe: Arc<Probe>,
        fail_send: bool,
    }

    #[async_trait::async_trait]
    impl UpstreamSender for FakeSender {
        async fn send(&mut self, frame: UpstreamFrame) -> Result<(), UpstreamError> {
            if self.fail_send {
                return Err(UpstreamError::Transport("broken pipe".to_string()));
            }
            self.probe.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), UpstreamError> {
            self.probe.close_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeReceiver {
        probe: Arc<Probe>,
        replies: mpsc::Receiver<Result<UpstreamReply, UpstreamError>>,
    }

    #[async_trait::async_trait]
    impl UpstreamReceiver for FakeReceiver {
        async fn recv(&mut self) -> Option<Result<UpstreamReply, UpstreamError>> {
            self.replies.recv().await
        }
    }

    impl Drop for FakeReceiver {
        fn drop(&mut self) {
            self.probe.receiver_dropped.store(true, Ordering::SeqCst);
        }
    }

    struct FakeConnector {
        stream: Mutex<Option<UpstreamStream>>,
    }

    #[async_trait::async_trait]
    impl UpstreamConnector for FakeConnector {
        async fn open(&self) -> Result<UpstreamStream, UpstreamError> {
            self.stream
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| UpstreamError::Unavailable("no stream".to_string()))
        }
    }

    type UpstreamReplyTx = mpsc::Sender<Result<UpstreamReply, UpstreamError>>;

    fn fake_upstream(fail_send: bool) -> (Arc<FakeConnector>, Arc<Probe>, UpstreamReplyTx) {
        let probe = Arc::new(Probe::default());
        let (reply_tx, replies) = mpsc::channel(16);
        let stream = UpstreamStream {
            sender: Box::new(FakeSender {
                probe: probe.clone(),
                fail_send,
            }),
            receiver: Box::new(FakeReceiver {
                probe: probe.clone(),
                replies,
            }),
        };
        let connector = Arc::new(FakeConnector {
            stream: Mutex::new(Some(stream)),
        });
        (connector, probe, reply_tx)
    }

    fn setup() -> SetupConfig {
        SetupConfig {
            user_id: UserId::new("alice".to_string()).unwrap(),
            username: "alice".to_string(),
            language: Language::new("ja".to_string()).unwrap(),
            character: "friend".to_string(),
            plan: Plan::Lite,
        }
    }

    type ClientTx = mpsc::Sender<Result<ClientFrame, String>>;

    fn client_inbound() -> (
        ClientTx,
        impl Stream<Item = Result<ClientFrame, String>> + Send,
    ) {
        let (tx, mut rx) = mpsc::channel(16);
        let stream = futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx));
        (tx, stream)
    }

    fn client_outbound() -> (PollSender<ClientFrame>, mpsc::Receiver<ClientFrame>) {
        let (tx, rx) = mpsc::channel(16);
        (PollSender::new(tx), rx)
    }

    #[tokio::test]
    async fn test_setup_first_then_client_frames_are_forwarded() {
        // テスト項目: setup が最初に送られ、音声と EOS が上流に届き、その他のテキストは転送されない
        // given (前提条件):
        let (connector, probe, _reply_tx) = fake_upstream(false);
        let usecase = BridgeAudioStreamUseCase::new(connector, None);
        let (client_tx, inbound) = client_inbound();
        let (outbound, _client_rx) = client_outbound();
        client_tx.send(Ok(ClientFrame::Binary(vec![1, 2]))).await.unwrap();
        client_tx.send(Ok(ClientFrame::Text("hello".to_string()))).await.unwrap();
        client_tx.send(Ok(ClientFrame::Text("EOS".to_string()))).await.unwrap();
        drop(client_tx);

        // when (操作):
        let outcome = usecase
            .execute(setup(), inbound, outbound, CancellationToken::new())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, BridgeOutcome::ClientClosed);
        let sent = probe.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                UpstreamFrame::Setup(setup()),
                UpstreamFrame::AudioChunk(vec![1, 2]),
                UpstreamFrame::EndOfInput,
            ]
        );
        assert_eq!(probe.close_calls.load(Ordering::SeqCst), 1);
        assert!(probe.receiver_dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_upstream_replies_are_relayed_and_empty_frames_skipped() {
        // テスト項目: 上流の音声・テキストがクライアントに届き、空のフレームは送られない
        // given (前提条件):
        let (connector, probe, reply_tx) = fake_upstream(false);
        let usecase = BridgeAudioStreamUseCase::new(connector, None);
        let (_client_tx, inbound) = client_inbound();
        let (outbound, mut client_rx) = client_outbound();
        reply_tx.send(Ok(UpstreamReply::AudioChunk(vec![5]))).await.unwrap();
        reply_tx.send(Ok(UpstreamReply::AudioChunk(vec![]))).await.unwrap();
        reply_tx.send(Ok(UpstreamReply::TextMessage(String::new()))).await.unwrap();
        reply_tx.send(Ok(UpstreamReply::TextMessage("hi".to_string()))).await.unwrap();
        drop(reply_tx);

        // when (操作):
        let outcome = usecase
            .execute(setup(), inbound, outbound, CancellationToken::new())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, BridgeOutcome::UpstreamClosed);
        assert_eq!(client_rx.recv().await, Some(ClientFrame::Binary(vec![5])));
        assert_eq!(client_rx.recv().await, Some(ClientFrame::Text("hi".to_string())));
        assert_eq!(client_rx.recv().await, None);
        assert_eq!(probe.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_closes_upstream_once_and_stops_reader() {
        // テスト項目: キャンセルで上流の送信側が一度だけ閉じられ、読み取りタスクもすぐに終わる
        // given (前提条件):
        let (connector, probe, _reply_tx) = fake_upstream(false);
        let usecase = Arc::new(BridgeAudioStreamUseCase::new(connector, None));
        let (_client_tx, inbound) = client_inbound();
        let (outbound, _client_rx) = client_outbound();
        let cancel = CancellationToken::new();
        let task = {
            let usecase = usecase.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { usecase.execute(setup(), inbound, outbound, cancel).await })
        };

        // when (操作):
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), task).await;

        // then (期待する結果):
        let outcome = result.expect("bridge must stop promptly").unwrap().unwrap();
        assert_eq!(outcome, BridgeOutcome::Cancelled);
        assert_eq!(probe.close_calls.load(Ordering::SeqCst), 1);
        assert!(probe.receiver_dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_idle_client_times_out() {
        // テスト項目: 無通信が続くとアイドルタイムアウトで終了する
        // given (前提条件):
        let (connector, probe, _reply_tx) = fake_upstream(false);
        let usecase =
            BridgeAudioStreamUseCase::new(connector, Some(Duration::from_millis(50)));
        let (_client_tx, inbound) = client_inbound();
        let (outbound, _client_rx) = client_outbound();

        // when (操作):
        let outcome = usecase
            .execute(setup(), inbound, outbound, CancellationToken::new())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, BridgeOutcome::IdleTimeout);
        assert!(outcome.ended_by_client());
        assert_eq!(probe.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_client_read_error_ends_bridge() {
        // テスト項目: クライアントからの読み取りエラーで中継が終わる
        // given (前提条件):
        let (connector, probe, _reply_tx) = fake_upstream(false);
        let usecase = BridgeAudioStreamUseCase::new(connector, None);
        let (client_tx, inbound) = client_inbound();
        let (outbound, _client_rx) = client_outbound();
        client_tx.send(Err("reset by peer".to_string())).await.unwrap();

        // when (操作):
        let outcome = usecase
            .execute(setup(), inbound, outbound, CancellationToken::new())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, BridgeOutcome::ClientError("reset by peer".to_string()));
        assert_eq!(probe.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_setup_failure_closes_sender() {
        // テスト項目: setup を送れない場合はエラーになり、送信側は閉じられる
        // given (前提条件):
        let (connector, probe, _reply_tx) = fake_upstream(true);
        let usecase = BridgeAudioStreamUseCase::new(connector, None);
        let (_client_tx, inbound) = client_inbound();
        let (outbound, _client_rx) = client_outbound();

        // when (操作):
        let result = usecase
            .execute(setup(), inbound, outbound, CancellationToken::new())
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(BridgeError::Upstream(UpstreamError::Transport(
                "broken pipe".to_string()
            )))
        );
        assert_eq!(probe.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_upstream_is_error() {
        // テスト項目: 上流を開けない場合はエラーになる
        // given (前提条件):
        let usecase = BridgeAudioStreamUseCase::new(
            Arc::new(FakeConnector {
                stream: Mutex::new(None),
            }),
            None,
        );
        let (_client_tx, inbound) = client_inbound();
        let (outbound, _client_rx) = client_outbound();

        // when (操作):
        let result = usecase
            .execute(setup(), inbound, outbound, CancellationToken::new())
            .await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(BridgeError::Upstream(UpstreamError::Unavailable(_)))
        ));
    }
}
