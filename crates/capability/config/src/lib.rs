//! 应用运行配置加载。
//!
//! - [`AppConfig`]：进程级参数，来自环境变量
//! - [`PollerConfig`]：服务器与点位列表，来自 TOML 文件

use domain::NodeDescriptor;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 随仓库分发的示例点位配置。
pub const SAMPLE_CONFIG: &str = include_str!("../uapoll.sample.toml");

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(String),
}

/// 观测值输出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// InfluxDB 行协议（telegraf 可直接消费）
    Influx,
    /// 每行一个 JSON 对象
    Json,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub poll_interval_ms: u64,
    pub output: OutputFormat,
    pub measurement: String,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let config_path = env::var("UAPOLL_CONFIG")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::Missing("UAPOLL_CONFIG".to_string()))?;
        let poll_interval_ms = read_u64_with_default("UAPOLL_POLL_INTERVAL_MS", 10_000)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "UAPOLL_POLL_INTERVAL_MS".to_string(),
                "0".to_string(),
            ));
        }
        let output = match read_optional("UAPOLL_OUTPUT") {
            None => OutputFormat::Influx,
            Some(value) => parse_output(&value)
                .ok_or_else(|| ConfigError::Invalid("UAPOLL_OUTPUT".to_string(), value))?,
        };
        let measurement =
            read_optional("UAPOLL_MEASUREMENT").unwrap_or_else(|| "opcua".to_string());

        Ok(Self {
            config_path,
            poll_interval_ms,
            output,
            measurement,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_output(value: &str) -> Option<OutputFormat> {
    match value.to_ascii_lowercase().as_str() {
        "influx" | "line" => Some(OutputFormat::Influx),
        "json" => Some(OutputFormat::Json),
        _ => None,
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

/// 服务器与点位配置。
///
/// 键名同时接受旧插件的拼写（`ServerName`、`URL`、`Nodes` ...）；
/// `url` 必须是 Modbus TCP 端点，其他 scheme 在加载期拒绝。
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    #[serde(alias = "ServerName")]
    pub server_name: String,
    #[serde(alias = "URL")]
    pub url: String,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
    #[serde(default, alias = "Nodes")]
    pub nodes: Vec<NodeConfig>,
}

/// 单个点位配置。
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(alias = "Tag")]
    pub tag: String,
    #[serde(alias = "NodeID")]
    pub node_id: String,
    #[serde(default, alias = "AbsDeviation")]
    pub abs_deviation: f64,
    #[serde(default, alias = "AtLeastEvery", with = "humantime_serde")]
    pub at_least_every: Option<Duration>,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(3)
}

impl PollerConfig {
    /// 读取并校验 TOML 配置文件。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 解析并校验 TOML 文本。
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PollerConfig =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 静态校验：加载期拒绝，不留到轮询期。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server_name".to_string(),
                "empty".to_string(),
            ));
        }
        if self.url.trim().is_empty() {
            return Err(ConfigError::Invalid("url".to_string(), "empty".to_string()));
        }
        if !is_supported_url(&self.url) {
            return Err(ConfigError::Invalid(
                "url".to_string(),
                format!("unsupported scheme: {}", self.url),
            ));
        }
        ensure_single_line("server_name", &self.server_name)?;
        for (index, node) in self.nodes.iter().enumerate() {
            if node.node_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    format!("nodes[{}].node_id", index),
                    "empty".to_string(),
                ));
            }
            ensure_single_line(&format!("nodes[{}].tag", index), &node.tag)?;
            ensure_single_line(&format!("nodes[{}].node_id", index), &node.node_id)?;
            if !node.abs_deviation.is_finite() || node.abs_deviation < 0.0 {
                return Err(ConfigError::Invalid(
                    format!("nodes[{}].abs_deviation", index),
                    node.abs_deviation.to_string(),
                ));
            }
        }
        Ok(())
    }

    /// 出现多次的 tag（允许重复，仅供启动时告警）。
    pub fn duplicate_tags(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for node in &self.nodes {
            if !seen.insert(node.tag.as_str()) && !duplicates.contains(&node.tag) {
                duplicates.push(node.tag.clone());
            }
        }
        duplicates
    }

    /// 按配置顺序输出点位描述；零时长的强制间隔视为未配置。
    pub fn descriptors(&self) -> Vec<NodeDescriptor> {
        self.nodes
            .iter()
            .map(|node| NodeDescriptor {
                tag: node.tag.clone(),
                node_id: node.node_id.clone(),
                abs_deviation: node.abs_deviation,
                at_least_every: node.at_least_every.filter(|interval| !interval.is_zero()),
            })
            .collect()
    }
}

/// 会话可打开的端点：`modbus+tcp://`、`tcp://` 或不带 scheme 的 `host:port`。
fn is_supported_url(url: &str) -> bool {
    match url.trim().split_once("://") {
        Some((scheme, _)) => SUPPORTED_SCHEMES.contains(&scheme),
        None => true,
    }
}

const SUPPORTED_SCHEMES: &[&str] = &["modbus+tcp", "tcp"];

/// 标签值会原样进入输出记录，不允许控制字符。
fn ensure_single_line(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.chars().any(char::is_control) {
        return Err(ConfigError::Invalid(
            key.to_string(),
            value.escape_debug().to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_is_valid() {
        let config = PollerConfig::from_toml_str(SAMPLE_CONFIG).expect("sample");
        assert_eq!(config.server_name, "Device");
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.read_timeout, Duration::from_secs(3));
        let descriptors = config.descriptors();
        assert_eq!(descriptors[0].at_least_every, Some(Duration::from_secs(30)));
        assert_eq!(descriptors[1].at_least_every, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn url_scheme_must_be_openable() {
        assert!(is_supported_url("modbus+tcp://127.0.0.1:502"));
        assert!(is_supported_url("tcp://plc.local"));
        assert!(is_supported_url("10.0.0.5:502"));
        assert!(!is_supported_url("opc.tcp://localhost:4840/endpoint"));
        assert!(!is_supported_url("https://example.com"));
    }

    #[test]
    fn parse_output_accepts_known_formats() {
        assert_eq!(parse_output("INFLUX"), Some(OutputFormat::Influx));
        assert_eq!(parse_output("json"), Some(OutputFormat::Json));
        assert_eq!(parse_output("csv"), None);
    }
}
