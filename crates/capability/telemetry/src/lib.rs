//! 追踪初始化、轮询周期 ID 与计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub cycle_transport_failures: u64,
    pub nodes_read: u64,
    pub accepted: u64,
    pub forced_accepts: u64,
    pub suppressed: u64,
    pub quality_errors: u64,
    pub malformed_readings: u64,
    pub sink_failures: u64,
    pub read_latency_ms_total: u64,
    pub read_latency_ms_count: u64,
}

/// 基础指标。
pub struct TelemetryMetrics {
    cycles: AtomicU64,
    cycle_transport_failures: AtomicU64,
    nodes_read: AtomicU64,
    accepted: AtomicU64,
    forced_accepts: AtomicU64,
    suppressed: AtomicU64,
    quality_errors: AtomicU64,
    malformed_readings: AtomicU64,
    sink_failures: AtomicU64,
    read_latency_ms_total: AtomicU64,
    read_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            cycle_transport_failures: AtomicU64::new(0),
            nodes_read: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            forced_accepts: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            quality_errors: AtomicU64::new(0),
            malformed_readings: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            read_latency_ms_total: AtomicU64::new(0),
            read_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            cycle_transport_failures: self.cycle_transport_failures.load(Ordering::Relaxed),
            nodes_read: self.nodes_read.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            forced_accepts: self.forced_accepts.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            quality_errors: self.quality_errors.load(Ordering::Relaxed),
            malformed_readings: self.malformed_readings.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            read_latency_ms_total: self.read_latency_ms_total.load(Ordering::Relaxed),
            read_latency_ms_count: self.read_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info），输出到 stderr，stdout 留给观测值。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 生成新的轮询周期 ID。
pub fn new_cycle_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录轮询周期次数。
pub fn record_cycle() {
    metrics().cycles.fetch_add(1, Ordering::Relaxed);
}

/// 记录整批读取失败的周期次数。
pub fn record_cycle_transport_failure() {
    metrics()
        .cycle_transport_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录读取的点位数。
pub fn record_nodes_read(count: u64) {
    metrics().nodes_read.fetch_add(count, Ordering::Relaxed);
}

/// 记录接受次数；`forced` 表示仅因强制间隔而接受。
pub fn record_accepted(forced: bool) {
    let metrics = metrics();
    metrics.accepted.fetch_add(1, Ordering::Relaxed);
    if forced {
        metrics.forced_accepts.fetch_add(1, Ordering::Relaxed);
    }
}

/// 记录抑制次数。
pub fn record_suppressed() {
    metrics().suppressed.fetch_add(1, Ordering::Relaxed);
}

/// 记录质量码异常次数。
pub fn record_quality_error() {
    metrics().quality_errors.fetch_add(1, Ordering::Relaxed);
}

/// 记录非有限读数次数。
pub fn record_malformed_reading() {
    metrics().malformed_readings.fetch_add(1, Ordering::Relaxed);
}

/// 记录 sink 写入失败次数。
pub fn record_sink_failure() {
    metrics().sink_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录批量读取耗时（毫秒）。
pub fn record_read_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .read_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .read_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
