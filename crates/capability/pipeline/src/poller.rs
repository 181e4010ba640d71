//! 轮询循环
//!
//! 每个周期：一次批量读取全部点位 → 按位置配对 → 逐点位判定 → 接受的观测值逐条交给 sink。
//! 周期之间不重叠；停止信号只在周期之间生效。

use crate::engine::{self, Decision};
use crate::error::PipelineError;
use crate::registry::NodeRegistry;
use domain::{Observation, ReadOutcome};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, info, info_span, warn};
use uapoll_protocol::Session;
use uapoll_sink::{DEFAULT_MEASUREMENT, Measurement, ObservationSink};
use uapoll_telemetry::{
    new_cycle_id, record_accepted, record_cycle, record_cycle_transport_failure,
    record_malformed_reading, record_nodes_read, record_quality_error, record_read_latency_ms,
    record_sink_failure, record_suppressed,
};

/// 轮询参数。
#[derive(Debug, Clone)]
pub struct PollerOptions {
    /// 输出的 measurement 名称
    pub measurement: String,
    /// 批量读取超时
    pub read_timeout: Duration,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            measurement: DEFAULT_MEASUREMENT.to_string(),
            read_timeout: Duration::from_secs(3),
        }
    }
}

/// 单个周期的处理结果。
#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycle_id: String,
    /// 被接受并已交给 sink 的观测值（含 sink 写入失败的）
    pub accepted: Vec<Observation>,
    pub suppressed: usize,
    /// 点位级错误：`ReadQuality` 或 `MalformedReading`
    pub node_errors: Vec<PipelineError>,
    pub sink_failures: usize,
}

/// 轮询器：独占注册表，`&mut self` 保证同一时刻只有一个周期在修改点位状态。
pub struct Poller {
    server_name: String,
    registry: NodeRegistry,
    session: Arc<dyn Session>,
    sink: Arc<dyn ObservationSink>,
    options: PollerOptions,
}

impl Poller {
    pub fn new(
        server_name: impl Into<String>,
        registry: NodeRegistry,
        session: Arc<dyn Session>,
        sink: Arc<dyn ObservationSink>,
        options: PollerOptions,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            registry,
            session,
            sink,
            options,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// 执行一个周期；判定时刻取读取完成的时刻。
    pub async fn poll_once(&mut self) -> Result<CycleReport, PipelineError> {
        self.cycle(None).await
    }

    /// 执行一个周期，以给定时刻作为本周期所有点位的 `now`。
    pub async fn poll_once_at(&mut self, now: Instant) -> Result<CycleReport, PipelineError> {
        self.cycle(Some(now)).await
    }

    /// 按固定间隔轮询，直到 `shutdown` 完成。
    ///
    /// 周期内整批读取失败只记录日志，下一个 tick 重试。
    pub async fn run<F>(&mut self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            target: "uapoll.poll",
            server = %self.server_name,
            nodes = self.registry.len(),
            interval_ms = interval.as_millis() as u64,
            "poller_started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            // 周期一旦开始就执行到底
            let _ = self.poll_once().await;
        }

        info!(target: "uapoll.poll", server = %self.server_name, "poller_stopped");
    }

    async fn cycle(&mut self, now: Option<Instant>) -> Result<CycleReport, PipelineError> {
        let cycle_id = new_cycle_id();
        let span = info_span!(
            "poll_cycle",
            cycle_id = %cycle_id,
            server = %self.server_name
        );
        self.run_cycle(cycle_id, now).instrument(span).await
    }

    async fn run_cycle(
        &mut self,
        cycle_id: String,
        now: Option<Instant>,
    ) -> Result<CycleReport, PipelineError> {
        record_cycle();
        let mut report = CycleReport {
            cycle_id,
            ..CycleReport::default()
        };
        if self.registry.is_empty() {
            debug!(target: "uapoll.poll", "poll_cycle_skipped_no_nodes");
            return Ok(report);
        }

        let outcomes = match self.read_batch().await {
            Ok(outcomes) => outcomes,
            Err(err) => {
                record_cycle_transport_failure();
                warn!(target: "uapoll.poll", error = %err, "poll_cycle_failed");
                return Err(err);
            }
        };
        let now = now.unwrap_or_else(Instant::now);

        for (node, outcome) in self.registry.nodes_mut().iter_mut().zip(outcomes) {
            if !outcome.quality.is_good() {
                record_quality_error();
                warn!(
                    target: "uapoll.poll",
                    tag = %node.tag(),
                    node_id = %node.node_id(),
                    quality = %outcome.quality,
                    "node_read_quality_bad"
                );
                report.node_errors.push(PipelineError::ReadQuality {
                    tag: node.tag().to_string(),
                    node_id: node.node_id().to_string(),
                    quality: outcome.quality,
                });
                continue;
            }

            match engine::evaluate(node, outcome.value, now) {
                Ok(Decision::Suppressed { delta }) => {
                    record_suppressed();
                    debug!(
                        target: "uapoll.poll",
                        tag = %node.tag(),
                        value = outcome.value,
                        delta = delta,
                        "node_value_suppressed"
                    );
                    report.suppressed += 1;
                }
                Ok(Decision::Accepted { delta, forced }) => {
                    record_accepted(forced);
                    debug!(
                        target: "uapoll.poll",
                        tag = %node.tag(),
                        value = outcome.value,
                        delta = ?delta,
                        forced = forced,
                        "node_value_accepted"
                    );
                    let observation = Observation::new(
                        self.server_name.as_str(),
                        node.tag(),
                        node.node_id(),
                        outcome.value,
                        outcome.source_ts_ms,
                    );
                    let measurement =
                        Measurement::from_observation(&self.options.measurement, &observation);
                    if let Err(err) = self.sink.record(&measurement).await {
                        record_sink_failure();
                        warn!(
                            target: "uapoll.poll",
                            tag = %node.tag(),
                            error = %err,
                            "sink_record_failed"
                        );
                        report.sink_failures += 1;
                    }
                    report.accepted.push(observation);
                }
                Err(err) => {
                    record_malformed_reading();
                    warn!(target: "uapoll.poll", error = %err, "node_reading_malformed");
                    report.node_errors.push(err);
                }
            }
        }

        info!(
            target: "uapoll.poll",
            accepted = report.accepted.len(),
            suppressed = report.suppressed,
            node_errors = report.node_errors.len(),
            sink_failures = report.sink_failures,
            "poll_cycle_completed"
        );
        Ok(report)
    }

    /// 一次批量读取全部点位，并校验结果与请求按位置对齐。
    async fn read_batch(&self) -> Result<Vec<ReadOutcome>, PipelineError> {
        let node_ids = self.registry.node_ids();
        let started_at = Instant::now();
        let outcomes =
            match tokio::time::timeout(self.options.read_timeout, self.session.read(node_ids))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(PipelineError::Transport(format!(
                        "read timed out after {}ms",
                        self.options.read_timeout.as_millis()
                    )));
                }
            };
        record_read_latency_ms(started_at.elapsed().as_millis() as u64);

        ensure_aligned(node_ids, &outcomes)?;
        record_nodes_read(outcomes.len() as u64);
        Ok(outcomes)
    }
}

fn ensure_aligned(node_ids: &[String], outcomes: &[ReadOutcome]) -> Result<(), PipelineError> {
    if node_ids.len() != outcomes.len() {
        return Err(PipelineError::Transport(format!(
            "misaligned response: requested {} nodes, got {} results",
            node_ids.len(),
            outcomes.len()
        )));
    }
    for (index, (node_id, outcome)) in node_ids.iter().zip(outcomes).enumerate() {
        if node_id != &outcome.node_id {
            return Err(PipelineError::Transport(format!(
                "misaligned response at index {}: expected {}, got {}",
                index, node_id, outcome.node_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_checks_length_and_order() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let ok = vec![ReadOutcome::good("a", 1.0, 1), ReadOutcome::good("b", 2.0, 1)];
        assert!(ensure_aligned(&ids, &ok).is_ok());

        let short = vec![ReadOutcome::good("a", 1.0, 1)];
        assert!(matches!(
            ensure_aligned(&ids, &short),
            Err(PipelineError::Transport(_))
        ));

        let swapped = vec![ReadOutcome::good("b", 2.0, 1), ReadOutcome::good("a", 1.0, 1)];
        assert!(matches!(
            ensure_aligned(&ids, &swapped),
            Err(PipelineError::Transport(_))
        ));
    }
}
