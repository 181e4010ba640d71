//! Modbus TCP 会话实现
//!
//! 一次 [`Session::read`] 在同一连接上依次读取所有点位的寄存器。
//! 点位级问题（地址无法解析、从站异常码、解码失败）体现为 bad 质量码；
//! I/O 或协议帧错误使整批失败，并丢弃连接，下一次读取时重新建连；
//! 读取被取消（调用方超时）同样丢弃连接。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let session = ModbusSession::connect(&SessionConfig::new("modbus+tcp://192.168.1.100:502")).await?;
//! let outcomes = session.read(&["unit=1;fc=3;addr=100;type=float32".to_string()]).await?;
//! ```

use crate::error::SessionError;
use crate::session::{parse_endpoint, Session, SessionConfig};
use crate::types::{decode_registers, ModbusFunctionCode, ModbusNodeId};
use async_trait::async_trait;
use domain::{now_epoch_ms, ReadOutcome};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

/// Modbus TCP 会话
pub struct ModbusSession {
    endpoint: String,
    connect_timeout: Duration,
    ctx: Mutex<Option<Context>>,
}

impl ModbusSession {
    /// 建立会话；失败即 `SessionError::Connection`。
    pub async fn connect(config: &SessionConfig) -> Result<Self, SessionError> {
        let endpoint = parse_endpoint(&config.url)?;
        let ctx = open(&endpoint, config.connect_timeout)
            .await
            .map_err(|err| SessionError::Connection(err.to_string()))?;
        info!("connected to modbus server at {}", endpoint);
        Ok(Self {
            endpoint,
            connect_timeout: config.connect_timeout,
            ctx: Mutex::new(Some(ctx)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Session for ModbusSession {
    async fn read(&self, node_ids: &[String]) -> Result<Vec<ReadOutcome>, SessionError> {
        let mut guard = self.ctx.lock().await;
        // 读取期间连接移出槽位：调用方中途放弃（如超时）时连接随之丢弃，
        // 迟到的响应不会被下一次读取误收
        let mut ctx = match guard.take() {
            Some(ctx) => ctx,
            None => {
                warn!(endpoint = %self.endpoint, "reconnecting to modbus server");
                open(&self.endpoint, self.connect_timeout).await?
            }
        };

        let mut outcomes = Vec::with_capacity(node_ids.len());
        for node_id in node_ids {
            let address = match node_id.parse::<ModbusNodeId>() {
                Ok(address) => address,
                Err(err) => {
                    warn!(node_id = %node_id, error = %err, "modbus node id rejected");
                    outcomes.push(ReadOutcome::bad(
                        node_id.clone(),
                        "BadNodeIdInvalid",
                        now_epoch_ms(),
                    ));
                    continue;
                }
            };

            // I/O 错误时连接不放回，由下一次读取重连
            match read_point(&mut ctx, &address).await? {
                Ok(value) => {
                    outcomes.push(ReadOutcome::good(node_id.clone(), value, now_epoch_ms()))
                }
                Err(status) => {
                    outcomes.push(ReadOutcome::bad(node_id.clone(), status, now_epoch_ms()))
                }
            }
        }

        *guard = Some(ctx);
        Ok(outcomes)
    }
}

async fn open(endpoint: &str, connect_timeout: Duration) -> Result<Context, SessionError> {
    let addr = resolve(endpoint).await?;
    match tokio::time::timeout(connect_timeout, tcp::connect(addr)).await {
        Ok(Ok(ctx)) => Ok(ctx),
        Ok(Err(err)) => Err(SessionError::Transport(err.to_string())),
        Err(_) => Err(SessionError::Timeout(format!("connect to {}", endpoint))),
    }
}

async fn resolve(endpoint: &str) -> Result<SocketAddr, SessionError> {
    if let Ok(addr) = endpoint.parse::<SocketAddr>() {
        return Ok(addr);
    }
    tokio::net::lookup_host(endpoint)
        .await
        .map_err(|err| SessionError::InvalidEndpoint(format!("{}: {}", endpoint, err)))?
        .next()
        .ok_or_else(|| SessionError::InvalidEndpoint(endpoint.to_string()))
}

/// 读取单个点位
///
/// 外层错误表示整批失败；内层 `Err` 是该点位的 bad 状态描述。
async fn read_point(
    ctx: &mut Context,
    address: &ModbusNodeId,
) -> Result<Result<f64, String>, SessionError> {
    ctx.set_slave(Slave(address.unit));

    let registers: Vec<u16> = match address.function {
        ModbusFunctionCode::ReadCoils => {
            match ctx
                .read_coils(address.address, address.count)
                .await
                .map_err(|e| SessionError::Transport(e.to_string()))?
            {
                Ok(bits) => bits.into_iter().map(u16::from).collect(),
                Err(exception) => return Ok(Err(format!("BadModbusException({:?})", exception))),
            }
        }
        ModbusFunctionCode::ReadDiscreteInputs => {
            match ctx
                .read_discrete_inputs(address.address, address.count)
                .await
                .map_err(|e| SessionError::Transport(e.to_string()))?
            {
                Ok(bits) => bits.into_iter().map(u16::from).collect(),
                Err(exception) => return Ok(Err(format!("BadModbusException({:?})", exception))),
            }
        }
        ModbusFunctionCode::ReadHoldingRegisters => {
            match ctx
                .read_holding_registers(address.address, address.count)
                .await
                .map_err(|e| SessionError::Transport(e.to_string()))?
            {
                Ok(registers) => registers,
                Err(exception) => return Ok(Err(format!("BadModbusException({:?})", exception))),
            }
        }
        ModbusFunctionCode::ReadInputRegisters => {
            match ctx
                .read_input_registers(address.address, address.count)
                .await
                .map_err(|e| SessionError::Transport(e.to_string()))?
            {
                Ok(registers) => registers,
                Err(exception) => return Ok(Err(format!("BadModbusException({:?})", exception))),
            }
        }
    };

    debug!(
        slave = address.unit,
        register = address.address,
        count = address.count,
        values = ?registers,
        "read modbus registers"
    );

    Ok(decode_registers(&registers, address.data_type)
        .map(|raw| address.apply_scaling(raw))
        .map_err(|reason| format!("BadDecodingError({})", reason)))
}
