//! 点位注册表：固定顺序的点位集合及其变化检测状态。

use crate::error::PipelineError;
use domain::NodeDescriptor;
use std::time::{Duration, Instant};

/// 点位过滤策略，注册后不可变。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePolicy {
    /// 绝对死区，0 表示每次读取都上报
    pub abs_deviation: f64,
    /// 强制上报间隔，None 表示只按死区判断
    pub forced_interval: Option<Duration>,
}

/// 点位的可变观测状态。
///
/// `previous` 总是上一次更新前的 `current`；`None` 表示尚无读数。
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    pub(crate) current: Option<f64>,
    pub(crate) previous: Option<f64>,
    pub(crate) last_accepted_at: Instant,
}

impl NodeState {
    fn new(registered_at: Instant) -> Self {
        Self {
            current: None,
            previous: None,
            last_accepted_at: registered_at,
        }
    }

    pub fn current(&self) -> Option<f64> {
        self.current
    }

    pub fn previous(&self) -> Option<f64> {
        self.previous
    }

    pub fn last_accepted_at(&self) -> Instant {
        self.last_accepted_at
    }
}

/// 被监控的点位。只能由注册表创建。
#[derive(Debug)]
pub struct MonitoredNode {
    tag: String,
    node_id: String,
    policy: NodePolicy,
    pub(crate) state: NodeState,
}

impl MonitoredNode {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn policy(&self) -> &NodePolicy {
        &self.policy
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }
}

/// 点位注册表。
///
/// 注册顺序即读取请求顺序，结果按位置回填；不提供删除或重排。
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: Vec<MonitoredNode>,
    node_ids: Vec<String>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置顺序构建注册表。
    pub fn from_descriptors(descriptors: &[NodeDescriptor]) -> Result<Self, PipelineError> {
        let mut registry = Self::new();
        let registered_at = Instant::now();
        for descriptor in descriptors {
            registry.register_at(
                &descriptor.tag,
                &descriptor.node_id,
                descriptor.abs_deviation,
                descriptor.at_least_every,
                registered_at,
            )?;
        }
        Ok(registry)
    }

    /// 追加点位，注册时间取当前时刻。
    pub fn register(
        &mut self,
        tag: &str,
        node_id: &str,
        abs_deviation: f64,
        forced_interval: Option<Duration>,
    ) -> Result<(), PipelineError> {
        self.register_at(tag, node_id, abs_deviation, forced_interval, Instant::now())
    }

    /// 追加点位，强制上报计时从 `registered_at` 开始。
    pub fn register_at(
        &mut self,
        tag: &str,
        node_id: &str,
        abs_deviation: f64,
        forced_interval: Option<Duration>,
        registered_at: Instant,
    ) -> Result<(), PipelineError> {
        if node_id.trim().is_empty() {
            return Err(PipelineError::Configuration(format!(
                "node '{}' has an empty node id",
                tag
            )));
        }
        if !abs_deviation.is_finite() || abs_deviation < 0.0 {
            return Err(PipelineError::Configuration(format!(
                "node '{}' has invalid deadband {}",
                tag, abs_deviation
            )));
        }

        self.nodes.push(MonitoredNode {
            tag: tag.to_string(),
            node_id: node_id.to_string(),
            policy: NodePolicy {
                abs_deviation,
                forced_interval: forced_interval.filter(|interval| !interval.is_zero()),
            },
            state: NodeState::new(registered_at),
        });
        self.node_ids.push(node_id.to_string());
        Ok(())
    }

    pub fn all(&self) -> &[MonitoredNode] {
        &self.nodes
    }

    /// 与 [`all`](Self::all) 同序的点位标识，直接用作读取请求。
    pub fn node_ids(&self) -> &[String] {
        &self.node_ids
    }

    /// 单个点位的可变引用，供 [`evaluate`](crate::engine::evaluate) 使用。
    pub fn node_mut(&mut self, index: usize) -> Option<&mut MonitoredNode> {
        self.nodes.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [MonitoredNode] {
        &mut self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_keeps_order_and_initial_state() {
        let mut registry = NodeRegistry::new();
        registry
            .register("b", "unit=1;addr=2", 0.5, Some(Duration::from_secs(30)))
            .expect("b");
        registry.register("a", "unit=1;addr=1", 0.0, None).expect("a");

        let tags: Vec<&str> = registry.all().iter().map(|node| node.tag()).collect();
        assert_eq!(tags, vec!["b", "a"]);
        assert_eq!(registry.node_ids(), ["unit=1;addr=2", "unit=1;addr=1"]);
        assert_eq!(registry.all()[0].state().current(), None);
        assert_eq!(registry.all()[0].state().previous(), None);
    }

    #[test]
    fn register_rejects_bad_parameters() {
        let mut registry = NodeRegistry::new();
        assert!(matches!(
            registry.register("a", "  ", 0.0, None),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            registry.register("a", "unit=1;addr=1", -0.1, None),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            registry.register("a", "unit=1;addr=1", f64::NAN, None),
            Err(PipelineError::Configuration(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn zero_interval_disables_forcing() {
        let mut registry = NodeRegistry::new();
        registry
            .register("a", "unit=1;addr=1", 1.0, Some(Duration::ZERO))
            .expect("a");
        assert_eq!(registry.all()[0].policy().forced_interval, None);
    }

    #[test]
    fn duplicate_tags_are_allowed() {
        let descriptors = vec![
            NodeDescriptor {
                tag: "same".to_string(),
                node_id: "unit=1;addr=1".to_string(),
                abs_deviation: 0.0,
                at_least_every: None,
            },
            NodeDescriptor {
                tag: "same".to_string(),
                node_id: "unit=1;addr=2".to_string(),
                abs_deviation: 0.0,
                at_least_every: None,
            },
        ];
        let registry = NodeRegistry::from_descriptors(&descriptors).expect("registry");
        assert_eq!(registry.len(), 2);
    }
}
