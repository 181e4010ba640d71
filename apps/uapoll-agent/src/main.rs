//! 点位轮询进程：加载配置、建立会话、按固定间隔轮询并输出观测值。
//!
//! 观测值写 stdout（行协议或 JSON 行），日志写 stderr。

use std::sync::Arc;
use tracing::{info, warn};
use uapoll_config::{AppConfig, OutputFormat, PollerConfig};
use uapoll_pipeline::{NodeRegistry, Poller, PollerOptions};
use uapoll_protocol::{ModbusSession, SessionConfig};
use uapoll_sink::{JsonLinesSink, LineProtocolSink, ObservationSink};
use uapoll_telemetry::{init_tracing, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 点位配置：非法参数在这里拒绝，进程不启动
    let poller_config = PollerConfig::from_file(&config.config_path)?;
    for tag in poller_config.duplicate_tags() {
        warn!(tag = %tag, "duplicate node tag configured");
    }
    let registry = NodeRegistry::from_descriptors(&poller_config.descriptors())?;
    for node in registry.all() {
        info!(
            tag = %node.tag(),
            node_id = %node.node_id(),
            abs_deviation = node.policy().abs_deviation,
            at_least_every = ?node.policy().forced_interval,
            "node registered"
        );
    }

    info!(
        server = %poller_config.server_name,
        url = %poller_config.url,
        "starting poller"
    );
    // 建连失败直接退出，由外部重启策略负责
    let session = ModbusSession::connect(&session_config(&poller_config)).await?;

    let mut poller = Poller::new(
        poller_config.server_name.clone(),
        registry,
        Arc::new(session),
        build_sink(config.output),
        PollerOptions {
            measurement: config.measurement.clone(),
            read_timeout: poller_config.read_timeout,
        },
    );
    poller.run(config.poll_interval(), shutdown_signal()).await;

    let snapshot = metrics().snapshot();
    info!(
        cycles = snapshot.cycles,
        failed_cycles = snapshot.cycle_transport_failures,
        accepted = snapshot.accepted,
        suppressed = snapshot.suppressed,
        "poller exited"
    );
    Ok(())
}

fn session_config(config: &PollerConfig) -> SessionConfig {
    SessionConfig {
        url: config.url.clone(),
        connect_timeout: config.connect_timeout,
    }
}

fn build_sink(output: OutputFormat) -> Arc<dyn ObservationSink> {
    match output {
        OutputFormat::Influx => Arc::new(LineProtocolSink::stdout()),
        OutputFormat::Json => Arc::new(JsonLinesSink::stdout()),
    }
}

/// Ctrl-C 或 SIGTERM；轮询器只在周期之间响应。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for sigterm");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::session_config;
    use std::time::Duration;
    use uapoll_config::{PollerConfig, SAMPLE_CONFIG};

    #[test]
    fn session_config_follows_poller_config() {
        let config = PollerConfig::from_toml_str(SAMPLE_CONFIG).expect("sample");
        let session = session_config(&config);
        assert_eq!(session.url, "modbus+tcp://127.0.0.1:502");
        assert_eq!(session.connect_timeout, Duration::from_secs(5));
    }
}
