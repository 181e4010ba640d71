//! 轮询链路共享的领域模型。
//!
//! 不依赖任何外部 crate：会话、变化检测、sink 三方只通过这里的类型交互。

pub mod data;

pub use data::{NodeDescriptor, Observation, Quality, ReadOutcome};

/// 获取当前 Unix 时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
