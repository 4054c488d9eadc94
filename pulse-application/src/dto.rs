use chrono::{DateTime, Utc};
use pulse_domain::dispatcher::PulseAssignment;
use pulse_domain::event::{CatalogEntry, EventRecord, EventState};
use pulse_domain::facade::EventStats;
use pulse_domain::reconciler::ReconcileReport;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 数据传输对象（DTO）
///
/// - 作为应用层的输出载体，面向接口/外部系统序列化友好；
/// - 与领域模型解耦，避免将领域对象直接暴露到接口层；
/// - 应保持只读特性与简洁结构，适配不同用例的返回需求。
pub trait Dto: Serialize + Send + Sync + 'static {}

/// 事件记录的对外视图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDto {
    pub event_id: String,
    pub project_id: String,
    pub domain: String,
    pub event_type: String,
    pub state: EventState,
    pub priority: i64,
    pub payload: Map<String, Value>,
    pub attempt: u32,
    pub max_attempts: u32,
    pub dedupe_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub available_at: DateTime<Utc>,
    pub meta: Map<String, Value>,
    pub agent_id: Option<String>,
    pub picked_at: Option<DateTime<Utc>>,
    pub done_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl From<EventRecord> for EventDto {
    fn from(r: EventRecord) -> Self {
        Self {
            event_id: r.event_id().to_string(),
            project_id: r.project_id().to_string(),
            domain: r.domain().to_string(),
            event_type: r.event_type().to_string(),
            state: r.state(),
            priority: r.priority(),
            payload: r.payload().clone(),
            attempt: r.attempt(),
            max_attempts: r.max_attempts(),
            dedupe_key: r.dedupe_key().map(str::to_string),
            created_at: r.created_at(),
            available_at: r.available_at(),
            meta: r.meta().clone(),
            agent_id: r.agent_id().map(str::to_string),
            picked_at: r.picked_at(),
            done_at: r.done_at(),
            error_code: r.error_code().map(str::to_string),
            error_message: r.error_message().map(str::to_string),
        }
    }
}

impl Dto for EventDto {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitResultDto {
    pub event_id: String,
    pub state: EventState,
    pub queued_at: DateTime<Utc>,
    pub event: EventDto,
}

impl From<EventRecord> for SubmitResultDto {
    fn from(r: EventRecord) -> Self {
        let event = EventDto::from(r);
        Self {
            event_id: event.event_id.clone(),
            state: event.state,
            queued_at: event.created_at,
            event,
        }
    }
}

impl Dto for SubmitResultDto {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventListDto {
    pub items: Vec<EventDto>,
}

impl From<Vec<EventRecord>> for EventListDto {
    fn from(rows: Vec<EventRecord>) -> Self {
        Self {
            items: rows.into_iter().map(EventDto::from).collect(),
        }
    }
}

impl Dto for EventListDto {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileResultDto {
    pub recovered_count: usize,
    pub dead_count: usize,
}

impl From<ReconcileReport> for ReconcileResultDto {
    fn from(r: ReconcileReport) -> Self {
        Self {
            recovered_count: r.recovered_count,
            dead_count: r.dead_count,
        }
    }
}

impl Dto for ReconcileResultDto {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentDto {
    pub agent_id: String,
    pub event: EventDto,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResultDto {
    pub items: Vec<AssignmentDto>,
}

impl From<PulseAssignment> for DispatchResultDto {
    fn from(a: PulseAssignment) -> Self {
        Self {
            items: a
                .into_items()
                .into_iter()
                .map(|(agent_id, record)| AssignmentDto {
                    agent_id,
                    event: record.into(),
                })
                .collect(),
        }
    }
}

impl Dto for DispatchResultDto {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsDto {
    pub project_id: String,
    pub by_state: BTreeMap<String, usize>,
    pub total: usize,
}

impl From<EventStats> for StatsDto {
    fn from(s: EventStats) -> Self {
        Self {
            project_id: s.project_id.to_string(),
            by_state: s
                .by_state
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            total: s.total,
        }
    }
}

impl Dto for StatsDto {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogDto {
    pub project_id: String,
    pub items: Vec<CatalogEntry>,
}

impl Dto for CatalogDto {}
