use std::fmt;
use std::time::Duration;

/// 读数质量码（协议层状态码的归一化）。
///
/// 非 good 一律归为 `Bad`，附带会话给出的状态描述。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quality {
    Good,
    Bad(String),
}

impl Quality {
    pub fn is_good(&self) -> bool {
        matches!(self, Quality::Good)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Good => write!(f, "good"),
            Quality::Bad(status) => write!(f, "bad({})", status),
        }
    }
}

/// 单个点位在一个轮询周期内的读取结果。
///
/// `node_id` 回显请求中的点位标识，轮询循环据此校验结果与请求的位置对齐。
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub node_id: String,
    pub value: f64,
    pub quality: Quality,
    /// 服务器给出的采样时间（毫秒）
    pub source_ts_ms: i64,
}

impl ReadOutcome {
    /// 构造质量为 good 的读取结果。
    pub fn good(node_id: impl Into<String>, value: f64, source_ts_ms: i64) -> Self {
        Self {
            node_id: node_id.into(),
            value,
            quality: Quality::Good,
            source_ts_ms,
        }
    }

    /// 构造质量为 bad 的读取结果（值无意义）。
    pub fn bad(node_id: impl Into<String>, status: impl Into<String>, source_ts_ms: i64) -> Self {
        Self {
            node_id: node_id.into(),
            value: f64::NAN,
            quality: Quality::Bad(status.into()),
            source_ts_ms,
        }
    }
}

/// 被接受、待交给 sink 的观测值。构造后不可修改。
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    server_name: String,
    tag: String,
    node_id: String,
    value: f64,
    source_ts_ms: i64,
}

impl Observation {
    pub fn new(
        server_name: impl Into<String>,
        tag: impl Into<String>,
        node_id: impl Into<String>,
        value: f64,
        source_ts_ms: i64,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            tag: tag.into(),
            node_id: node_id.into(),
            value,
            source_ts_ms,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn source_ts_ms(&self) -> i64 {
        self.source_ts_ms
    }
}

/// 点位描述：配置层输出，注册表输入。
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    pub tag: String,
    pub node_id: String,
    /// 绝对死区，0 表示每次读取都上报
    pub abs_deviation: f64,
    /// 强制上报间隔，None 表示只按死区判断
    pub at_least_every: Option<Duration>,
}
