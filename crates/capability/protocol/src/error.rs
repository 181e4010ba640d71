//! 会话错误类型定义

/// 会话错误
///
/// `Connection` 只出现在建立会话时；其余变体都属于单个轮询周期的传输失败。
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// 建立会话失败
    #[error("connection error: {0}")]
    Connection(String),

    /// 整批读取失败（连接断开、响应异常）
    #[error("transport error: {0}")]
    Transport(String),

    /// 超时
    #[error("timeout: {0}")]
    Timeout(String),

    /// 端点地址无法解析
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// 点位标识无法解析
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),
}

impl SessionError {
    /// 是否属于某个周期的传输失败（下个周期可重试）。
    pub fn is_transport(&self) -> bool {
        matches!(self, SessionError::Transport(_) | SessionError::Timeout(_))
    }
}
