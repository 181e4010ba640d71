//! # 变化检测流水线
//!
//! 把周期性读数转换为有意义的观测值：
//!
//! ```text
//! tick ─▶ Session.read(全部点位) ─▶ 按位置配对 ─▶ engine::evaluate（逐点位）─▶ ObservationSink
//! ```
//!
//! - [`registry`]：点位注册表与点位状态
//! - [`engine`]：死区 + 强制上报间隔判定，纯计算
//! - [`poller`]：轮询循环，处理传输失败、质量码与 sink 交付

pub mod engine;
mod error;
pub mod poller;
pub mod registry;

pub use engine::{Decision, evaluate};
pub use error::PipelineError;
pub use poller::{CycleReport, Poller, PollerOptions};
pub use registry::{MonitoredNode, NodePolicy, NodeRegistry, NodeState};
