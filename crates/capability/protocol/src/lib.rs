//! # 会话能力模块
//!
//! 轮询核心通过 [`Session`] 与服务器交互，本模块提供契约与实现：
//! - **Modbus TCP**：批量读取从设备寄存器（[`ModbusSession`]）
//! - **内存会话**：测试与演练（[`InMemorySession`]）
//!
//! ## 架构设计
//!
//! ```text
//! Poller
//!   │  read(node_ids)  ── 一个周期一次，覆盖全部点位
//!   ▼
//! Session
//!   ├── ModbusSession
//!   └── InMemorySession
//!   │
//!   ▼
//! Vec<ReadOutcome>（与请求顺序一致）
//! ```
//!
//! ## 点位地址格式（Modbus）
//!
//! ```text
//! unit=1;fc=3;addr=100;type=float32;scale=0.1;offset=0
//! ```

mod error;
mod in_memory;
mod modbus;
mod session;
mod types;

pub use error::SessionError;
pub use in_memory::InMemorySession;
pub use modbus::ModbusSession;
pub use session::{parse_endpoint, Session, SessionConfig};
pub use types::*;
