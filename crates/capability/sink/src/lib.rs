//! # 观测值输出
//!
//! 轮询循环对每个被接受的观测值调用一次 [`ObservationSink::record`]，不做批量；
//! 是否批量由 sink 自己决定。
//!
//! - [`LineProtocolSink`]：InfluxDB 行协议（telegraf 可直接消费）
//! - [`JsonLinesSink`]：每行一个 JSON 对象
//! - [`InMemorySink`]：测试用

use async_trait::async_trait;
use domain::Observation;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use tokio::sync::Mutex;

/// 默认 measurement 名称。
pub const DEFAULT_MEASUREMENT: &str = "opcua";

/// Sink 写入错误。
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(String),
}

/// 时序记录：measurement + tags + fields + 时间戳。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    /// 采样时间（毫秒）
    #[serde(rename = "timestamp_ms")]
    pub ts_ms: i64,
}

impl Measurement {
    /// 按固定标签集（server、tag、NodeID）与字段 value 构造记录。
    pub fn from_observation(name: &str, observation: &Observation) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("server".to_string(), observation.server_name().to_string());
        tags.insert("tag".to_string(), observation.tag().to_string());
        tags.insert("NodeID".to_string(), observation.node_id().to_string());
        let mut fields = BTreeMap::new();
        fields.insert("value".to_string(), observation.value());
        Self {
            name: name.to_string(),
            tags,
            fields,
            ts_ms: observation.source_ts_ms(),
        }
    }

    /// 编码为一行 InfluxDB 行协议（纳秒时间戳，不含换行）。
    pub fn to_line_protocol(&self) -> Result<String, SinkError> {
        if self.name.is_empty() {
            return Err(SinkError::Encode("empty measurement name".to_string()));
        }
        let mut line = escape(&self.name, &[',', ' ']);
        for (key, value) in &self.tags {
            // 行协议不允许空标签值
            if value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&escape(value, &[',', '=', ' ']));
        }
        let mut fields = Vec::with_capacity(self.fields.len());
        for (key, value) in &self.fields {
            if !value.is_finite() {
                return Err(SinkError::Encode(format!("field {} is not finite", key)));
            }
            fields.push(format!("{}={}", escape(key, &[',', '=', ' ']), value));
        }
        if fields.is_empty() {
            return Err(SinkError::Encode("no fields".to_string()));
        }
        line.push(' ');
        line.push_str(&fields.join(","));
        line.push(' ');
        line.push_str(&self.ts_ms.saturating_mul(1_000_000).to_string());
        Ok(line)
    }
}

/// 转义行协议特殊字符；换行与回车写成 `\n`、`\r`，保证一条记录只占一行。
fn escape(raw: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => {
                if ch == '\\' || special.contains(&ch) {
                    escaped.push('\\');
                }
                escaped.push(ch);
            }
        }
    }
    escaped
}

/// 观测值输出抽象。
#[async_trait]
pub trait ObservationSink: Send + Sync {
    async fn record(&self, measurement: &Measurement) -> Result<(), SinkError>;
}

/// 行协议输出。
pub struct LineProtocolSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> LineProtocolSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl LineProtocolSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

#[async_trait]
impl<W: Write + Send> ObservationSink for LineProtocolSink<W> {
    async fn record(&self, measurement: &Measurement) -> Result<(), SinkError> {
        let line = measurement.to_line_protocol()?;
        let mut writer = self.writer.lock().await;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// JSON 行输出。
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

#[async_trait]
impl<W: Write + Send> ObservationSink for JsonLinesSink<W> {
    async fn record(&self, measurement: &Measurement) -> Result<(), SinkError> {
        let line =
            serde_json::to_string(measurement).map_err(|err| SinkError::Encode(err.to_string()))?;
        let mut writer = self.writer.lock().await;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// 内存 sink（用于接线与测试）。
#[derive(Default)]
pub struct InMemorySink {
    measurements: Mutex<Vec<Measurement>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn measurements(&self) -> Vec<Measurement> {
        self.measurements.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.measurements.lock().await.len()
    }
}

#[async_trait]
impl ObservationSink for InMemorySink {
    async fn record(&self, measurement: &Measurement) -> Result<(), SinkError> {
        self.measurements.lock().await.push(measurement.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Measurement {
        let observation = Observation::new(
            "Device",
            "HeatExchanger1 Temp",
            "ns=2;s=TE-800-07/AI1/PV.CV",
            21.5,
            1_700_000_000_123,
        );
        Measurement::from_observation(DEFAULT_MEASUREMENT, &observation)
    }

    #[test]
    fn line_protocol_escapes_tags() {
        let line = sample().to_line_protocol().expect("encode");
        assert_eq!(
            line,
            "opcua,NodeID=ns\\=2;s\\=TE-800-07/AI1/PV.CV,server=Device,tag=HeatExchanger1\\ Temp value=21.5 1700000000123000000"
        );
    }

    #[test]
    fn line_protocol_rejects_non_finite_field() {
        let mut measurement = sample();
        measurement.fields.insert("value".to_string(), f64::NAN);
        assert!(matches!(
            measurement.to_line_protocol(),
            Err(SinkError::Encode(_))
        ));
    }

    #[test]
    fn line_protocol_skips_empty_tag_values() {
        let observation = Observation::new("Device", "", "unit=1;addr=1", 1.0, 1);
        let line = Measurement::from_observation("m", &observation)
            .to_line_protocol()
            .expect("encode");
        assert_eq!(line, "m,NodeID=unit\\=1;addr\\=1,server=Device value=1 1000000");
    }

    #[test]
    fn line_protocol_keeps_multiline_tag_on_one_line() {
        let observation = Observation::new("Device", "HX1\nTemp\r", "unit=1;addr=1", 2.0, 1);
        let line = Measurement::from_observation("m", &observation)
            .to_line_protocol()
            .expect("encode");
        assert!(!line.contains('\n'));
        assert!(!line.contains('\r'));
        assert_eq!(
            line,
            "m,NodeID=unit\\=1;addr\\=1,server=Device,tag=HX1\\nTemp\\r value=2 1000000"
        );
    }
}
