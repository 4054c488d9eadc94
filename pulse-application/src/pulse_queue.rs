//! Agent 唤醒队列（PulseQueue）
//!
//! 通用事件总线之上的窄适配器：只承载 Agent 唤醒，事件固定落在 `pulse` 领域，
//! 类型限定为 `inbox_event`、`timer`、`manual`、`system`，其他类型一律按 `system` 处理。
//! 相同 Agent、相同类型、相同负载的唤醒在开放期间只保留一条。
//!
use pulse_domain::EventBus;
use pulse_domain::dispatcher::DispatchRequest;
use pulse_domain::event::EventState;
use pulse_domain::facade::{ListFilter, SubmitEvent};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::dto::EventDto;
use crate::error::{AppError, AppResult};
use crate::handlers::run_blocking;

/// 唤醒事件所在的领域
pub const PULSE_DOMAIN: &str = "pulse";

/// 唤醒类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PulseKind {
    InboxEvent,
    Timer,
    Manual,
    System,
}

impl PulseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PulseKind::InboxEvent => "inbox_event",
            PulseKind::Timer => "timer",
            PulseKind::Manual => "manual",
            PulseKind::System => "system",
        }
    }

    /// 未知类型按 `system` 处理
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim() {
            "inbox_event" => PulseKind::InboxEvent,
            "timer" => PulseKind::Timer,
            "manual" => PulseKind::Manual,
            _ => PulseKind::System,
        }
    }
}

/// 各唤醒类型的默认优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PulseWeights {
    pub inbox_event: i64,
    pub manual: i64,
    pub system: i64,
    pub timer: i64,
}

impl Default for PulseWeights {
    fn default() -> Self {
        Self {
            inbox_event: 100,
            manual: 80,
            system: 60,
            timer: 10,
        }
    }
}

impl PulseWeights {
    pub fn weight(&self, kind: PulseKind) -> i64 {
        match kind {
            PulseKind::InboxEvent => self.inbox_event,
            PulseKind::Manual => self.manual,
            PulseKind::System => self.system,
            PulseKind::Timer => self.timer,
        }
    }
}

#[derive(Clone)]
pub struct PulseQueue {
    bus: Arc<EventBus>,
    weights: PulseWeights,
}

impl PulseQueue {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_weights(bus, PulseWeights::default())
    }

    pub fn with_weights(bus: Arc<EventBus>, weights: PulseWeights) -> Self {
        Self { bus, weights }
    }

    /// 为 Agent 排入一次唤醒；`priority` 缺省取该类型的权重
    ///
    /// `agent_id` 为空时返回 `AppError::Validation`。
    pub async fn enqueue(
        &self,
        project_id: &str,
        agent_id: &str,
        event_type: &str,
        payload: Map<String, Value>,
        priority: Option<i64>,
    ) -> AppResult<EventDto> {
        let agent_id = agent_id.trim();
        if agent_id.is_empty() {
            return Err(AppError::Validation("pulse agent_id must not be blank".into()));
        }
        let kind = PulseKind::parse_lenient(event_type);
        if kind.as_str() != event_type.trim() {
            debug!(event_type, "unknown pulse type, treating as system");
        }
        // 对象键有序，序列化结果可直接作为负载指纹
        let dedupe_key = format!(
            "{agent_id}:{}:{}",
            kind.as_str(),
            Value::Object(payload.clone())
        );
        let req = SubmitEvent::builder()
            .project_id(project_id)
            .domain(PULSE_DOMAIN)
            .event_type(kind.as_str())
            .priority(priority.unwrap_or_else(|| self.weights.weight(kind)))
            .payload(Value::Object(payload))
            .dedupe_key(dedupe_key)
            .agent_id(agent_id)
            .build();
        let record = run_blocking(&self.bus, move |bus| bus.submit(req)).await?;
        Ok(record.into())
    }

    /// 为活跃 Agent 各取至多一条唤醒，取出即进入 picked
    pub async fn pick(
        &self,
        project_id: &str,
        active_agents: &[String],
        batch_size: usize,
    ) -> AppResult<Vec<EventDto>> {
        let project_id = project_id.to_string();
        let request = DispatchRequest::builder()
            .eligible_agents(active_agents.iter().cloned())
            .batch_size(batch_size.max(1))
            .domain(PULSE_DOMAIN.to_string())
            .build();
        let assignment =
            run_blocking(&self.bus, move |bus| bus.dispatch(&project_id, &request)).await?;
        Ok(assignment
            .into_items()
            .into_iter()
            .map(|(_, record)| record.into())
            .collect())
    }

    /// 唤醒已处理完毕
    pub async fn complete(&self, project_id: &str, event_id: &str) -> AppResult<EventDto> {
        let (project_id, event_id) = (project_id.to_string(), event_id.to_string());
        let record = run_blocking(&self.bus, move |bus| bus.ack(&project_id, &event_id)).await?;
        Ok(record.into())
    }

    /// 活跃 Agent 仍在排队的唤醒数
    pub async fn count_queued(
        &self,
        project_id: &str,
        active_agents: &[String],
    ) -> AppResult<usize> {
        let rows = self
            .list(project_id, None, Some(EventState::Queued), None)
            .await?;
        Ok(rows
            .iter()
            .filter(|r| {
                r.agent_id
                    .as_ref()
                    .is_some_and(|a| active_agents.contains(a))
            })
            .count())
    }

    pub async fn list(
        &self,
        project_id: &str,
        agent_id: Option<&str>,
        state: Option<EventState>,
        limit: Option<usize>,
    ) -> AppResult<Vec<EventDto>> {
        let project_id = project_id.to_string();
        let filter = ListFilter::builder()
            .domain(PULSE_DOMAIN)
            .maybe_agent_id(agent_id.map(str::to_string))
            .maybe_state(state)
            .maybe_limit(limit)
            .build();
        let rows = run_blocking(&self.bus, move |bus| bus.list(&project_id, &filter)).await?;
        Ok(rows.into_iter().map(EventDto::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kinds_become_system() {
        assert_eq!(PulseKind::parse_lenient("timer"), PulseKind::Timer);
        assert_eq!(PulseKind::parse_lenient("mail_event"), PulseKind::System);
        assert_eq!(PulseKind::parse_lenient(""), PulseKind::System);
    }

    #[test]
    fn default_weights_rank_inbox_first() {
        let w = PulseWeights::default();
        assert!(w.weight(PulseKind::InboxEvent) > w.weight(PulseKind::Manual));
        assert!(w.weight(PulseKind::Manual) > w.weight(PulseKind::System));
        assert!(w.weight(PulseKind::System) > w.weight(PulseKind::Timer));

        let custom: PulseWeights = serde_json::from_str(r#"{"timer": 500}"#).unwrap();
        assert_eq!(custom.timer, 500);
        assert_eq!(custom.inbox_event, 100);
    }
}
