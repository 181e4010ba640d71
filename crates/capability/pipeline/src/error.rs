use domain::Quality;
use uapoll_protocol::SessionError;

/// 轮询链路错误。
///
/// `Transport` 使整个周期跳过；`ReadQuality` 与 `MalformedReading` 只跳过单个点位。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("read quality error: {tag} ({node_id}): {quality}")]
    ReadQuality {
        tag: String,
        node_id: String,
        quality: Quality,
    },
    #[error("malformed reading: {tag} ({node_id}): {value}")]
    MalformedReading {
        tag: String,
        node_id: String,
        value: f64,
    },
    #[error("sink error: {0}")]
    Sink(String),
}

impl From<SessionError> for PipelineError {
    fn from(err: SessionError) -> Self {
        PipelineError::Transport(err.to_string())
    }
}
