//! 事件记录（EventRecord）
//!
//! 总线唯一的持久化实体。账本中的每一行即一条完整记录，
//! 以下 13 个字段为必备字段，缺失任一字段的行视为损坏并在读取时跳过：
//! `event_id, project_id, domain, event_type, state, priority, payload,
//! attempt, max_attempts, dedupe_key, created_at, available_at, meta`。
//!
//! 其余诊断字段（`picked_at`、`touched_at`、`done_at`、`error_code`、
//! `error_message`）可缺省。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::state::EventState;
use crate::value_object::{EventId, ProjectId};

/// 负载中禁止出现的业务状态字段：这些状态归属各领域自己的存储，
/// 不得借用总线负载绕开状态机。
pub const FORBIDDEN_PAYLOAD_FIELDS: [&str; 6] = [
    "delivered_at",
    "handled_at",
    "read_at",
    "mail_state",
    "receipt_state",
    "contract_state",
];

/// 错误信息的最大保留长度（字符）
pub const MAX_ERROR_MESSAGE_CHARS: usize = 2000;

/// 路由提示中目标 Agent 的键名
pub const AGENT_ID_KEY: &str = "agent_id";

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct EventRecord {
    /// 事件唯一标识
    pub(crate) event_id: EventId,
    /// 所属项目（分区键）
    pub(crate) project_id: ProjectId,
    /// 生产/消费分组，如 scheduling、mailbox、protocol、runtime
    pub(crate) domain: String,
    /// 领域内的事件名称
    pub(crate) event_type: String,
    #[builder(default = EventState::Queued)]
    pub(crate) state: EventState,
    /// 数值越大越紧急
    #[builder(default)]
    pub(crate) priority: i64,
    /// 领域负载，总线不解释其形状
    #[builder(default)]
    pub(crate) payload: Map<String, Value>,
    #[builder(default)]
    pub(crate) attempt: u32,
    #[builder(default = 3)]
    pub(crate) max_attempts: u32,
    /// 幂等键；字段本身必须存在，值可以为 null
    #[serde(deserialize_with = "Option::deserialize")]
    pub(crate) dedupe_key: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    /// 早于该时间不参与调度
    pub(crate) available_at: DateTime<Utc>,
    /// 路由提示（例如目标 `agent_id`）
    #[builder(default)]
    pub(crate) meta: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) picked_at: Option<DateTime<Utc>>,
    /// 最近一次消费者活动（pick / start / heartbeat），超时回收以此为准
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) touched_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) done_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) error_message: Option<String>,
}

impl EventRecord {
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn dedupe_key(&self) -> Option<&str> {
        self.dedupe_key.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn available_at(&self) -> DateTime<Utc> {
        self.available_at
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn picked_at(&self) -> Option<DateTime<Utc>> {
        self.picked_at
    }

    pub fn touched_at(&self) -> Option<DateTime<Utc>> {
        self.touched_at
    }

    pub fn done_at(&self) -> Option<DateTime<Utc>> {
        self.done_at
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// 目标 Agent：优先取 `meta.agent_id`，其次兼容只写在负载里的 `payload.agent_id`
    pub fn agent_id(&self) -> Option<&str> {
        string_field(&self.meta, AGENT_ID_KEY).or_else(|| string_field(&self.payload, AGENT_ID_KEY))
    }

    /// 最近一次被触碰的时间：touched_at → picked_at → created_at
    pub fn last_touched_at(&self) -> DateTime<Utc> {
        self.touched_at
            .or(self.picked_at)
            .unwrap_or(self.created_at)
    }

    /// 是否可在 `now` 被调度
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.state == EventState::Queued && self.available_at <= now
    }

    /// 调度顺序：优先级降序 → 创建时间升序 → 事件标识升序（保证全序）
    pub fn dispatch_order(a: &EventRecord, b: &EventRecord) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.event_id.cmp(&b.event_id))
    }
}

fn string_field<'a>(bag: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    bag.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 返回负载中出现的禁用字段（已排序）
pub fn forbidden_payload_fields(payload: &Map<String, Value>) -> Vec<&'static str> {
    let mut hits: Vec<&'static str> = FORBIDDEN_PAYLOAD_FIELDS
        .into_iter()
        .filter(|k| payload.contains_key(*k))
        .collect();
    hits.sort_unstable();
    hits
}

/// 截断错误信息到 `MAX_ERROR_MESSAGE_CHARS` 个字符
pub(crate) fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}
