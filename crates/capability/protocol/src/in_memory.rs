//! 内存会话实现
//!
//! 仅用于本地测试和演练：可按点位设置当前值，也可预置整批响应。

use crate::error::SessionError;
use crate::session::Session;
use async_trait::async_trait;
use domain::{ReadOutcome, now_epoch_ms};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// 内存会话
#[derive(Default)]
pub struct InMemorySession {
    values: Mutex<HashMap<String, ReadOutcome>>,
    scripted: Mutex<VecDeque<Result<Vec<ReadOutcome>, SessionError>>>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置点位的当前值（good 质量）。
    pub fn set_value(&self, node_id: &str, value: f64, source_ts_ms: i64) {
        self.set_outcome(ReadOutcome::good(node_id, value, source_ts_ms));
    }

    /// 设置点位的完整读取结果。
    pub fn set_outcome(&self, outcome: ReadOutcome) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(outcome.node_id.clone(), outcome);
        }
    }

    /// 预置下一次读取的整批响应，优先于按点位设置的值。
    pub fn push_response(&self, response: Result<Vec<ReadOutcome>, SessionError>) {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.push_back(response);
        }
    }

    /// 已收到的读取请求（用于测试）
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn read(&self, node_ids: &[String]) -> Result<Vec<ReadOutcome>, SessionError> {
        self.requests
            .lock()
            .map_err(|_| SessionError::Transport("lock failed".to_string()))?
            .push(node_ids.to_vec());

        let scripted = self
            .scripted
            .lock()
            .map_err(|_| SessionError::Transport("lock failed".to_string()))?
            .pop_front();
        if let Some(response) = scripted {
            return response;
        }

        let values = self
            .values
            .lock()
            .map_err(|_| SessionError::Transport("lock failed".to_string()))?;
        Ok(node_ids
            .iter()
            .map(|node_id| {
                values
                    .get(node_id)
                    .cloned()
                    .unwrap_or_else(|| ReadOutcome::bad(node_id.clone(), "BadNodeIdUnknown", now_epoch_ms()))
            })
            .collect())
    }
}
