use async_trait::async_trait;

use crate::domain::{UpstreamConnector, UpstreamError, UpstreamStream};

/// 音声ストリームが設定されていない環境（degraded モード）向けのコネクタ
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableUpstreamConnector;

#[async_trait]
impl UpstreamConnector for UnavailableUpstreamConnector {
    async fn open(&self) -> Result<UpstreamStream, UpstreamError> {
        Err(UpstreamError::Unavailable(
            "audio streaming is not configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_always_fails() {
        // テスト項目: degraded モードではストリームを開けない
        // given (前提条件):
        let connector = UnavailableUpstreamConnector;

        // when (操作):
        let result = connector.open().await;

        // then (期待する結果):
        assert!(matches!(result, Err(UpstreamError::Unavailable(_))));
    }
}
