use async_trait::async_trait;

use crate::model::{Request, TransportResponse};

/// 传输层错误
///
/// 网络错误、超时不属于这里，它们被编码为 status 0 的响应
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Transport configuration error: {0}")]
    Configuration(String),
}

/// HTTP 传输
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// 发送已渲染的请求
    ///
    /// 网络/超时失败必须返回 `Ok`（status 0），只有配置类错误返回 `Err`
    async fn send_request(&self, request: &Request) -> Result<TransportResponse, TransportError>;
}
