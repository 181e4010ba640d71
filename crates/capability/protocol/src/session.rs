//! 会话契约
//!
//! 轮询核心只依赖 [`Session`]：一次调用读取全部点位，结果与请求按位置一一对应。

use crate::error::SessionError;
use async_trait::async_trait;
use domain::ReadOutcome;
use std::time::Duration;

/// 会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 端点地址
    pub url: String,
    /// 建连超时
    pub connect_timeout: Duration,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// 与远端服务器的有状态会话。
#[async_trait]
pub trait Session: Send + Sync {
    /// 批量读取。
    ///
    /// 返回序列与 `node_ids` 等长且顺序一致；单个点位的问题通过质量码表达，
    /// 只有整批失败才返回 `Err`。
    async fn read(&self, node_ids: &[String]) -> Result<Vec<ReadOutcome>, SessionError>;
}

/// 解析端点为 `host:port`。
///
/// 支持 `modbus+tcp://`、`tcp://` 前缀与裸地址，缺省端口 502。
pub fn parse_endpoint(url: &str) -> Result<String, SessionError> {
    let trimmed = url.trim();
    let rest = if let Some(rest) = trimmed.strip_prefix("modbus+tcp://") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("tcp://") {
        rest
    } else if trimmed.contains("://") {
        return Err(SessionError::InvalidEndpoint(format!(
            "unsupported scheme: {}",
            trimmed
        )));
    } else {
        trimmed
    };
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(SessionError::InvalidEndpoint(url.to_string()));
    }
    let has_port = match authority.rsplit_once(':') {
        Some((_, port)) if authority.starts_with('[') => !port.ends_with(']'),
        Some((_, port)) => port.parse::<u16>().is_ok(),
        None => false,
    };
    if has_port {
        Ok(authority.to_string())
    } else {
        Ok(format!("{}:502", authority))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("modbus+tcp://192.168.1.100:1502").unwrap(),
            "192.168.1.100:1502"
        );
        assert_eq!(parse_endpoint("tcp://plc.local").unwrap(), "plc.local:502");
        assert_eq!(parse_endpoint("10.0.0.5:502/").unwrap(), "10.0.0.5:502");
        assert_eq!(parse_endpoint("[::1]:5020").unwrap(), "[::1]:5020");
        assert_eq!(parse_endpoint("[::1]").unwrap(), "[::1]:502");
    }

    #[test]
    fn test_parse_endpoint_rejects_foreign_scheme() {
        let err = parse_endpoint("opc.tcp://localhost:4840/endpoint").unwrap_err();
        assert!(matches!(err, SessionError::InvalidEndpoint(_)));
        assert!(parse_endpoint("tcp://").is_err());
    }
}
