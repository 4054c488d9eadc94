//! 总线配置
//!
//! 可直接嵌入宿主程序的配置文件（serde 反序列化，缺省字段取默认值）。
//!
use serde::Deserialize;
use std::path::PathBuf;

use crate::lifecycle::BackoffPolicy;

/// 事件总线配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// 账本根目录，项目账本位于 `<root>/<project_id>/runtime/events.jsonl`
    pub root: PathBuf,
    /// 提交未指定时的重试预算
    pub default_max_attempts: u32,
    /// 提交未指定时的优先级
    pub default_priority: i64,
    /// 失败重排的退避
    pub backoff: BackoffPolicy,
    /// list 单次返回上限
    pub max_list_limit: usize,
    /// 开启后拒绝未登记在事件目录中的 (domain, event_type)
    pub strict_catalog: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("projects"),
            default_max_attempts: 3,
            default_priority: 50,
            backoff: BackoffPolicy::default(),
            max_list_limit: 1000,
            strict_catalog: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: BusConfig =
            serde_json::from_str(r#"{"root": "/tmp/ledger", "backoff": {"max_secs": 60}}"#)
                .unwrap();
        assert_eq!(cfg.root, PathBuf::from("/tmp/ledger"));
        assert_eq!(cfg.default_max_attempts, 3);
        assert_eq!(cfg.default_priority, 50);
        assert_eq!(cfg.backoff.max_secs, 60);
        assert_eq!(cfg.backoff.min_secs, 2);
        assert!(!cfg.strict_catalog);
    }
}
