//! 推論サービスとの双方向ストリームの抽象化

use async_trait::async_trait;

use super::{UpstreamError, UpstreamFrame, UpstreamReply};

/// 上流ストリームの送信側
#[async_trait]
pub trait UpstreamSender: Send {
    async fn send(&mut self, frame: UpstreamFrame) -> Result<(), UpstreamError>;

    /// 送信側を閉じる（上流にこれ以上フレームを送らないことを通知する）
    async fn close(&mut self) -> Result<(), UpstreamError>;
}

/// 上流ストリームの受信側
#[async_trait]
pub trait UpstreamReceiver: Send {
    /// 次のフレームを受信。ストリーム終端では `None`
    async fn recv(&mut self) -> Option<Result<UpstreamReply, UpstreamError>>;
}

/// 開いた上流ストリーム
pub struct UpstreamStream {
    pub sender: Box<dyn UpstreamSender>,
    pub receiver: Box<dyn UpstreamReceiver>,
}

/// 上流ストリームを開く
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    async fn open(&self) -> Result<UpstreamStream, UpstreamError>;
}
