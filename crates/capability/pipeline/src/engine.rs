//! 变化检测引擎
//!
//! 每个周期对每个点位调用一次 [`evaluate`]：
//!
//! 1. 状态移位：`previous := current`，`current := new`
//! 2. `delta := |current - previous|`（无上一读数时视为变化）
//! 3. `due := forced_interval 已配置 且 now - last_accepted_at >= forced_interval`
//! 4. `delta >= abs_deviation` 或 `due` 时接受，否则抑制
//! 5. 接受时 `last_accepted_at := now`；抑制时不动
//!
//! 等于死区的变化视为有效变化（`>=`），因此死区 0 时每次读取都会上报。

use crate::error::PipelineError;
use crate::registry::MonitoredNode;
use std::time::Instant;

/// 单次判定结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// `delta` 为 None 表示首次读数；`forced` 表示仅因强制间隔而接受。
    Accepted { delta: Option<f64>, forced: bool },
    Suppressed { delta: f64 },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted { .. })
    }
}

/// 对一个点位的新读数做接受/抑制判定，并更新其状态。
///
/// 非有限读数返回 `MalformedReading`，状态保持不变。
pub fn evaluate(
    node: &mut MonitoredNode,
    new_value: f64,
    now: Instant,
) -> Result<Decision, PipelineError> {
    if !new_value.is_finite() {
        return Err(PipelineError::MalformedReading {
            tag: node.tag().to_string(),
            node_id: node.node_id().to_string(),
            value: new_value,
        });
    }

    let policy = *node.policy();
    let state = &mut node.state;

    let previous = state.current;
    state.previous = previous;
    state.current = Some(new_value);

    let delta = previous.map(|previous| (new_value - previous).abs());
    let changed = delta.is_none_or(|delta| delta >= policy.abs_deviation);
    let due = policy.forced_interval.is_some_and(|interval| {
        now.saturating_duration_since(state.last_accepted_at) >= interval
    });

    if changed || due {
        state.last_accepted_at = now;
        Ok(Decision::Accepted {
            delta,
            forced: !changed,
        })
    } else {
        Ok(Decision::Suppressed {
            delta: delta.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeRegistry;
    use std::time::Duration;

    fn single_node(
        abs_deviation: f64,
        forced_interval: Option<Duration>,
        registered_at: Instant,
    ) -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        registry
            .register_at(
                "HeatExchanger1 Temp",
                "unit=1;addr=100",
                abs_deviation,
                forced_interval,
                registered_at,
            )
            .expect("register");
        registry
    }

    #[test]
    fn first_reading_is_accepted_regardless_of_deadband() {
        let t0 = Instant::now();
        let mut registry = single_node(1.0e12, None, t0);
        let node = &mut registry.nodes_mut()[0];

        let decision = evaluate(node, 0.0, t0).expect("decision");
        assert_eq!(
            decision,
            Decision::Accepted {
                delta: None,
                forced: false
            }
        );
        assert_eq!(node.state().current(), Some(0.0));
        assert_eq!(node.state().previous(), None);
    }

    #[test]
    fn change_above_deadband_is_accepted() {
        let t0 = Instant::now();
        let mut registry = single_node(0.10, None, t0);
        let node = &mut registry.nodes_mut()[0];
        evaluate(node, 0.8, t0).expect("first");

        let t1 = t0 + Duration::from_secs(10);
        match evaluate(node, 1.0, t1).expect("second") {
            Decision::Accepted {
                delta: Some(delta),
                forced: false,
            } => assert!((delta - 0.2).abs() < 1e-9),
            other => panic!("unexpected decision: {:?}", other),
        }
        assert_eq!(node.state().previous(), Some(0.8));
        assert_eq!(node.state().last_accepted_at(), t1);
    }

    #[test]
    fn unchanged_value_is_suppressed() {
        let t0 = Instant::now();
        let mut registry = single_node(0.10, None, t0);
        let node = &mut registry.nodes_mut()[0];
        evaluate(node, 1.0, t0).expect("first");

        let decision = evaluate(node, 1.0, t0 + Duration::from_secs(10)).expect("second");
        assert_eq!(decision, Decision::Suppressed { delta: 0.0 });
        assert_eq!(node.state().last_accepted_at(), t0);
    }

    #[test]
    fn forced_interval_accepts_small_change() {
        let t0 = Instant::now();
        let mut registry = single_node(3.0, Some(Duration::from_secs(15)), t0);
        let node = &mut registry.nodes_mut()[0];
        evaluate(node, -15.0, t0).expect("first");

        let t1 = t0 + Duration::from_secs(60);
        let decision = evaluate(node, -16.0, t1).expect("second");
        assert_eq!(
            decision,
            Decision::Accepted {
                delta: Some(1.0),
                forced: true
            }
        );
        assert_eq!(node.state().last_accepted_at(), t1);
    }

    #[test]
    fn forced_interval_not_yet_due_suppresses() {
        let t0 = Instant::now();
        let mut registry = single_node(3.0, Some(Duration::from_secs(90)), t0);
        let node = &mut registry.nodes_mut()[0];
        evaluate(node, -15.0, t0).expect("first");

        let decision = evaluate(node, -16.0, t0 + Duration::from_secs(60)).expect("second");
        assert_eq!(decision, Decision::Suppressed { delta: 1.0 });
        assert_eq!(node.state().last_accepted_at(), t0);
    }

    #[test]
    fn change_equal_to_deadband_is_accepted() {
        let t0 = Instant::now();
        let mut registry = single_node(0.5, None, t0);
        let node = &mut registry.nodes_mut()[0];
        evaluate(node, 1.0, t0).expect("first");
        assert!(evaluate(node, 1.5, t0).expect("second").is_accepted());
    }

    #[test]
    fn zero_deadband_reports_every_read() {
        let t0 = Instant::now();
        let mut registry = single_node(0.0, None, t0);
        let node = &mut registry.nodes_mut()[0];
        for _ in 0..3 {
            assert!(evaluate(node, 7.0, t0).expect("decision").is_accepted());
        }
    }

    #[test]
    fn repeated_suppression_keeps_forcing_clock() {
        let t0 = Instant::now();
        let mut registry = single_node(5.0, Some(Duration::from_secs(30)), t0);
        let node = &mut registry.nodes_mut()[0];
        evaluate(node, 10.0, t0).expect("first");

        for seconds in [10, 20, 29] {
            let decision = evaluate(node, 10.5, t0 + Duration::from_secs(seconds)).expect("tick");
            assert!(!decision.is_accepted());
            assert_eq!(node.state().last_accepted_at(), t0);
        }
        let decision = evaluate(node, 10.5, t0 + Duration::from_secs(30)).expect("due");
        assert_eq!(
            decision,
            Decision::Accepted {
                delta: Some(0.0),
                forced: true
            }
        );
    }

    #[test]
    fn malformed_reading_leaves_state_untouched() {
        let t0 = Instant::now();
        let mut registry = single_node(0.1, Some(Duration::from_secs(1)), t0);
        let node = &mut registry.nodes_mut()[0];
        evaluate(node, 1.0, t0).expect("first");
        evaluate(node, 2.0, t0).expect("second");
        let before = node.state().clone();

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = evaluate(node, bad, t0 + Duration::from_secs(60)).expect_err("malformed");
            assert!(matches!(err, PipelineError::MalformedReading { .. }));
            assert_eq!(node.state(), &before);
        }
    }
}
