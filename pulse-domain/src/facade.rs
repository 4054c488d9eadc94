//! 事件总线门面（EventBus）
//!
//! 生产者、消费者与运维工具唯一的操作入口。每个写操作恰好是一次存储事务，
//! 读操作（list/get/stats/catalog）走不加锁的快照读取。
//!
//! 对终态记录的 ack/retry 等非法迁移不报错，原样返回记录并记 debug 日志。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::clock::{Clock, SystemClock};
use crate::config::BusConfig;
use crate::dedupe::{find_open_duplicate, normalize_key};
use crate::dispatcher::{self, DispatchRequest, PulseAssignment};
use crate::error::{DomainError, DomainResult};
use crate::event::{
    AGENT_ID_KEY, CatalogEntry, EventRecord, EventState, catalog, event_catalog,
    forbidden_payload_fields,
};
use crate::lifecycle::{self, Failure, Transition};
use crate::reconciler::{self, ReconcileReport};
use crate::specification::{AgentIs, AllOf, DomainIs, EventTypeIs, Specification, StateIs};
use crate::store::{EventStore, EventStoreExt, JsonlEventStore};
use crate::value_object::{EventId, ProjectId, normalize_name};

/// 超时回收的最短超时，更短的值按此处理
pub const MIN_RECONCILE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// 提交请求
///
/// # 示例
///
/// ```
/// use pulse_domain::facade::SubmitEvent;
///
/// let req = SubmitEvent::builder()
///     .project_id("demo")
///     .domain("scheduling")
///     .event_type("timer")
///     .priority(10)
///     .dedupe_key("agentA-heartbeat")
///     .agent_id("agentA")
///     .build();
/// assert_eq!(req.priority, Some(10));
/// ```
#[derive(Debug, Clone, Builder)]
pub struct SubmitEvent {
    #[builder(into)]
    pub project_id: String,
    #[builder(into)]
    pub domain: String,
    #[builder(into)]
    pub event_type: String,
    /// 缺省取 `BusConfig::default_priority`
    pub priority: Option<i64>,
    /// 必须是 JSON 对象；`null` 视为空对象
    #[builder(default = Value::Object(Map::new()))]
    pub payload: Value,
    #[builder(into)]
    pub dedupe_key: Option<String>,
    /// 缺省取 `BusConfig::default_max_attempts`
    pub max_attempts: Option<u32>,
    #[builder(default)]
    pub meta: Map<String, Value>,
    /// 目标 Agent 的快捷写法，写入 `meta.agent_id`
    #[builder(into)]
    pub agent_id: Option<String>,
}

/// list 的过滤条件；全部可选
#[derive(Debug, Clone, Default, Builder)]
pub struct ListFilter {
    #[builder(into)]
    pub domain: Option<String>,
    #[builder(into)]
    pub event_type: Option<String>,
    pub state: Option<EventState>,
    #[builder(into)]
    pub agent_id: Option<String>,
    pub limit: Option<usize>,
}

impl ListFilter {
    fn specification(&self) -> DomainResult<AllOf<EventRecord>> {
        let domain = self
            .domain
            .as_deref()
            .map(|d| normalize_name("domain", d))
            .transpose()?;
        let event_type = self
            .event_type
            .as_deref()
            .map(|t| normalize_name("event_type", t))
            .transpose()?;
        let agent = self
            .agent_id
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| AgentIs(a.to_string()));
        Ok(AllOf::new()
            .with_opt(domain.map(DomainIs))
            .with_opt(event_type.map(EventTypeIs))
            .with_opt(self.state.map(StateIs))
            .with_opt(agent))
    }
}

/// 各状态的记录数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventStats {
    pub project_id: ProjectId,
    pub by_state: BTreeMap<&'static str, usize>,
    pub total: usize,
}

#[derive(Builder)]
pub struct EventBus {
    store: Arc<dyn EventStore>,
    #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)]
    clock: Arc<dyn Clock>,
    #[builder(default)]
    config: BusConfig,
}

impl EventBus {
    /// 以 `config.root` 为根目录的 JSONL 账本
    pub fn jsonl(config: BusConfig) -> Self {
        let store = Arc::new(JsonlEventStore::new(config.root.clone()));
        Self::builder().store(store).config(config).build()
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// 提交事件；开放态中存在相同幂等键时原样返回已有记录
    #[instrument(skip_all, fields(project_id = %req.project_id, domain = %req.domain, event_type = %req.event_type))]
    pub fn submit(&self, req: SubmitEvent) -> DomainResult<EventRecord> {
        let project_id = ProjectId::new(req.project_id)?;
        let domain = normalize_name("domain", &req.domain)?;
        let event_type = normalize_name("event_type", &req.event_type)?;

        let max_attempts = req.max_attempts.unwrap_or(self.config.default_max_attempts);
        if max_attempts == 0 {
            return Err(DomainError::validation("max_attempts", "must be >= 1"));
        }
        let payload = match req.payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(DomainError::validation(
                    "payload",
                    format!("must be a JSON object, got {}", json_kind(&other)),
                ));
            }
        };
        let forbidden = forbidden_payload_fields(&payload);
        if !forbidden.is_empty() {
            return Err(DomainError::validation(
                "payload",
                format!("business status fields are not allowed: {}", forbidden.join(", ")),
            ));
        }
        if self.config.strict_catalog && !catalog::is_registered(&domain, &event_type) {
            return Err(DomainError::validation(
                "event_type",
                format!("{domain}/{event_type} is not registered in the event catalog"),
            ));
        }

        let mut meta = req.meta;
        if let Some(agent) = req.agent_id.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            meta.insert(AGENT_ID_KEY.to_string(), Value::String(agent.to_string()));
        }
        let dedupe_key = normalize_key(req.dedupe_key.as_deref());
        let priority = req.priority.unwrap_or(self.config.default_priority);

        let (record, created) = self.store.transaction(&project_id, |rows| {
            if let Some(idx) =
                find_open_duplicate(rows, &domain, &event_type, dedupe_key.as_deref())
            {
                return Ok((rows[idx].clone(), false));
            }
            let now = self.clock.now();
            let mut event_id = EventId::generate();
            while rows.iter().any(|r| r.event_id() == &event_id) {
                event_id = EventId::generate();
            }
            let record = EventRecord::builder()
                .event_id(event_id)
                .project_id(project_id.clone())
                .domain(domain.clone())
                .event_type(event_type.clone())
                .priority(priority)
                .payload(payload.clone())
                .max_attempts(max_attempts)
                .maybe_dedupe_key(dedupe_key.clone())
                .created_at(now)
                .available_at(now)
                .meta(meta.clone())
                .build();
            rows.push(record.clone());
            Ok((record, true))
        })?;

        if created {
            info!(event_id = %record.event_id(), priority, "event submitted");
        } else {
            debug!(event_id = %record.event_id(), "duplicate submit, returning open event");
        }
        Ok(record)
    }

    /// 只读列表：优先级降序、创建时间升序，`limit` 夹在 `1..=max_list_limit`
    #[instrument(skip(self, filter))]
    pub fn list(&self, project_id: &str, filter: &ListFilter) -> DomainResult<Vec<EventRecord>> {
        let project_id = ProjectId::new(project_id)?;
        let spec = filter.specification()?;
        let limit = filter
            .limit
            .unwrap_or(self.config.max_list_limit)
            .clamp(1, self.config.max_list_limit.max(1));

        let mut rows: Vec<EventRecord> = self
            .store
            .load(&project_id)?
            .into_iter()
            .filter(|r| spec.is_satisfied_by(r))
            .collect();
        rows.sort_by(EventRecord::dispatch_order);
        rows.truncate(limit);
        Ok(rows)
    }

    #[instrument(skip(self))]
    pub fn get(&self, project_id: &str, event_id: &str) -> DomainResult<EventRecord> {
        let project_id = ProjectId::new(project_id)?;
        let event_id = EventId::new(event_id)?;
        self.store
            .load(&project_id)?
            .into_iter()
            .find(|r| r.event_id() == &event_id)
            .ok_or_else(|| DomainError::not_found(project_id.as_str(), event_id.as_str()))
    }

    /// 运维重试：failed/dead → queued
    #[instrument(skip(self))]
    pub fn retry(&self, project_id: &str, event_id: &str) -> DomainResult<EventRecord> {
        self.mutate(project_id, event_id, "retry", lifecycle::retry)
    }

    /// 确认完成：任一开放态 → done
    #[instrument(skip(self))]
    pub fn ack(&self, project_id: &str, event_id: &str) -> DomainResult<EventRecord> {
        self.mutate(project_id, event_id, "ack", lifecycle::ack)
    }

    /// picked → processing
    #[instrument(skip(self))]
    pub fn start_processing(&self, project_id: &str, event_id: &str) -> DomainResult<EventRecord> {
        self.mutate(project_id, event_id, "start", lifecycle::start)
    }

    #[instrument(skip(self))]
    pub fn heartbeat(&self, project_id: &str, event_id: &str) -> DomainResult<EventRecord> {
        self.mutate(project_id, event_id, "heartbeat", lifecycle::heartbeat)
    }

    /// 报告处理失败：有预算则按退避重新排队，否则进入死信
    #[instrument(skip(self, error_message))]
    pub fn report_failure(
        &self,
        project_id: &str,
        event_id: &str,
        error_code: &str,
        error_message: &str,
    ) -> DomainResult<EventRecord> {
        let code = match error_code.trim() {
            "" => "UNKNOWN_ERROR",
            code => code,
        };
        let backoff = self.config.backoff;
        self.mutate(project_id, event_id, "fail", |record, now| {
            lifecycle::fail(
                record,
                now,
                &backoff,
                Failure {
                    code,
                    message: error_message,
                },
            )
        })
    }

    /// 为一组有资格的 Agent 各挑选至多一条事件
    #[instrument(skip(self, request), fields(agents = request.eligible_agents.len(), batch_size = request.batch_size))]
    pub fn dispatch(
        &self,
        project_id: &str,
        request: &DispatchRequest,
    ) -> DomainResult<PulseAssignment> {
        let project_id = ProjectId::new(project_id)?;
        request.validate()?;
        if request.eligible_agents.is_empty() {
            return Ok(PulseAssignment::default());
        }
        let assignment = self.store.transaction(&project_id, |rows| {
            dispatcher::dispatch(rows, request, self.clock.now())
        })?;
        if !assignment.is_empty() {
            info!(picked = assignment.len(), "pulse assignment dispatched");
        }
        Ok(assignment)
    }

    /// 回收超时的在途记录；`timeout` 不足 5 秒时按 5 秒处理
    #[instrument(skip(self))]
    pub fn reconcile(
        &self,
        project_id: &str,
        timeout: std::time::Duration,
    ) -> DomainResult<ReconcileReport> {
        let project_id = ProjectId::new(project_id)?;
        let timeout = chrono::Duration::from_std(timeout.max(MIN_RECONCILE_TIMEOUT))
            .map_err(|_| DomainError::validation("timeout", "out of range"))?;
        let report = self.store.transaction(&project_id, |rows| {
            Ok(reconciler::reconcile(rows, self.clock.now(), timeout))
        })?;
        if report.total() > 0 {
            info!(
                recovered = report.recovered_count,
                dead = report.dead_count,
                "reconciled stale events"
            );
        }
        Ok(report)
    }

    #[instrument(skip(self))]
    pub fn stats(&self, project_id: &str) -> DomainResult<EventStats> {
        let project_id = ProjectId::new(project_id)?;
        let rows = self.store.load(&project_id)?;
        let mut by_state: BTreeMap<&'static str, usize> =
            EventState::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for r in &rows {
            *by_state.entry(r.state().as_str()).or_default() += 1;
        }
        Ok(EventStats {
            project_id,
            by_state,
            total: rows.len(),
        })
    }

    /// 已登记目录 + 账本中出现过但未登记的 (domain, event_type)
    #[instrument(skip(self))]
    pub fn catalog(&self, project_id: &str) -> DomainResult<Vec<CatalogEntry>> {
        let project_id = ProjectId::new(project_id)?;
        let mut entries = event_catalog();
        let seen: BTreeSet<(String, String)> = self
            .store
            .load(&project_id)?
            .into_iter()
            .map(|r| (r.domain().to_string(), r.event_type().to_string()))
            .collect();
        for (domain, event_type) in seen {
            if !catalog::is_registered(&domain, &event_type) {
                entries.push(CatalogEntry::unregistered(&domain, &event_type));
            }
        }
        Ok(entries)
    }

    fn mutate<F>(
        &self,
        project_id: &str,
        event_id: &str,
        op: &'static str,
        mut apply: F,
    ) -> DomainResult<EventRecord>
    where
        F: FnMut(&mut EventRecord, DateTime<Utc>) -> Transition,
    {
        let project_id = ProjectId::new(project_id)?;
        let event_id = EventId::new(event_id)?;
        let (record, transition) = self.store.transaction(&project_id, |rows| {
            let record = rows
                .iter_mut()
                .find(|r| r.event_id() == &event_id)
                .ok_or_else(|| DomainError::not_found(project_id.as_str(), event_id.as_str()))?;
            let transition = apply(record, self.clock.now());
            Ok((record.clone(), transition))
        })?;

        match transition {
            Transition::Applied { from, to } => {
                info!(op, event_id = %event_id, %from, %to, "event transitioned");
            }
            Transition::Noop { current } => {
                debug!(op, event_id = %event_id, state = %current, "transition not allowed, record unchanged");
            }
        }
        Ok(record)
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::InMemoryEventStore;
    use chrono::Duration;
    use serde_json::json;

    fn bus() -> (EventBus, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let bus = EventBus::builder()
            .store(Arc::new(InMemoryEventStore::new()))
            .clock(clock.clone())
            .build();
        (bus, clock)
    }

    fn timer(agent: &str) -> SubmitEvent {
        SubmitEvent::builder()
            .project_id("demo")
            .domain("scheduling")
            .event_type("timer")
            .agent_id(agent)
            .build()
    }

    #[test]
    fn submit_applies_defaults_and_normalizes() {
        let (bus, clock) = bus();
        let r = bus
            .submit(
                SubmitEvent::builder()
                    .project_id(" demo ")
                    .domain("Scheduling")
                    .event_type("timer")
                    .payload(json!({"reason": "tick"}))
                    .dedupe_key("  ")
                    .agent_id("agentA")
                    .build(),
            )
            .unwrap();
        assert_eq!(r.project_id().as_str(), "demo");
        assert_eq!(r.domain(), "scheduling");
        assert_eq!(r.priority(), 50);
        assert_eq!(r.max_attempts(), 3);
        assert_eq!(r.dedupe_key(), None);
        assert_eq!(r.agent_id(), Some("agentA"));
        assert_eq!(r.created_at(), clock.now());
        assert_eq!(r.available_at(), r.created_at());
    }

    #[test]
    fn submit_rejects_invalid_requests() {
        let (bus, _) = bus();
        let cases = [
            timer("a").with_project(""),
            SubmitEvent::builder()
                .project_id("demo")
                .domain("")
                .event_type("timer")
                .build(),
            SubmitEvent::builder()
                .project_id("demo")
                .domain("scheduling")
                .event_type("timer")
                .max_attempts(0)
                .build(),
            SubmitEvent::builder()
                .project_id("demo")
                .domain("scheduling")
                .event_type("timer")
                .payload(json!([1, 2]))
                .build(),
            SubmitEvent::builder()
                .project_id("demo")
                .domain("mailbox")
                .event_type("mail_event")
                .payload(json!({"mail_state": "read"}))
                .build(),
        ];
        for req in cases {
            let err = bus.submit(req).unwrap_err();
            assert!(err.is_validation(), "{err}");
        }
        assert!(bus.list("demo", &ListFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn strict_catalog_rejects_unknown_types() {
        let bus = EventBus::builder()
            .store(Arc::new(InMemoryEventStore::new()))
            .config(BusConfig {
                strict_catalog: true,
                ..BusConfig::default()
            })
            .build();
        assert!(bus.submit(timer("a")).is_ok());
        let err = bus
            .submit(
                SubmitEvent::builder()
                    .project_id("demo")
                    .domain("scheduling")
                    .event_type("not_a_thing")
                    .build(),
            )
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn dedupe_returns_open_record_then_allows_reuse_after_done() {
        let (bus, _) = bus();
        let req = timer("a").with_dedupe("hb");
        let first = bus.submit(req.clone()).unwrap();
        let second = bus
            .submit(SubmitEvent {
                payload: json!({"different": true}),
                ..req.clone()
            })
            .unwrap();
        assert_eq!(first.event_id(), second.event_id());
        assert!(second.payload().is_empty());

        bus.ack("demo", first.event_id().as_str()).unwrap();
        let third = bus.submit(req).unwrap();
        assert_ne!(third.event_id(), first.event_id());
    }

    #[test]
    fn list_filters_sorts_and_clamps() {
        let (bus, clock) = bus();
        for (agent, p) in [("a", 1), ("b", 9), ("c", 5)] {
            bus.submit(SubmitEvent {
                priority: Some(p),
                ..timer(agent)
            })
            .unwrap();
            clock.advance(Duration::milliseconds(1));
        }
        let all = bus.list("demo", &ListFilter::default()).unwrap();
        let priorities: Vec<_> = all.iter().map(|r| r.priority()).collect();
        assert_eq!(priorities, vec![9, 5, 1]);

        let one = bus
            .list("demo", &ListFilter::builder().limit(0).build())
            .unwrap();
        assert_eq!(one.len(), 1);

        let by_agent = bus
            .list("demo", &ListFilter::builder().agent_id("c").build())
            .unwrap();
        assert_eq!(by_agent.len(), 1);
        assert_eq!(by_agent[0].priority(), 5);

        let done = bus
            .list("demo", &ListFilter::builder().state(EventState::Done).build())
            .unwrap();
        assert!(done.is_empty());
    }

    #[test]
    fn unknown_event_is_not_found() {
        let (bus, _) = bus();
        assert!(bus.ack("demo", "missing").unwrap_err().is_not_found());
        assert!(bus.retry("demo", "missing").unwrap_err().is_not_found());
        assert!(bus.get("demo", "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn terminal_conflicts_are_noops() {
        let (bus, _) = bus();
        let r = bus.submit(timer("a")).unwrap();
        let id = r.event_id().as_str();
        let done = bus.ack("demo", id).unwrap();
        assert_eq!(done.state(), EventState::Done);
        assert_eq!(bus.ack("demo", id).unwrap(), done);
        assert_eq!(bus.retry("demo", id).unwrap(), done);
        assert_eq!(bus.report_failure("demo", id, "X", "y").unwrap(), done);
    }

    #[test]
    fn consumer_flow_with_backoff() {
        let (bus, clock) = bus();
        let r = bus.submit(timer("a")).unwrap();
        let id = r.event_id().as_str().to_string();
        let req = DispatchRequest::builder()
            .eligible_agents(["a".to_string()])
            .build();

        let picked = bus.dispatch("demo", &req).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(
            bus.start_processing("demo", &id).unwrap().state(),
            EventState::Processing
        );
        clock.advance(Duration::seconds(3));
        let beat = bus.heartbeat("demo", &id).unwrap();
        assert_eq!(beat.touched_at(), Some(clock.now()));

        let failed = bus
            .report_failure("demo", &id, "WORKER_EXEC_ERROR", "boom")
            .unwrap();
        assert_eq!(failed.state(), EventState::Queued);
        assert_eq!(failed.attempt(), 1);
        assert_eq!(failed.available_at(), clock.now() + Duration::seconds(2));

        // 退避期内不可调度
        assert!(bus.dispatch("demo", &req).unwrap().is_empty());
        clock.advance(Duration::seconds(2));
        assert_eq!(bus.dispatch("demo", &req).unwrap().len(), 1);
    }

    #[test]
    fn stats_and_catalog() {
        let (bus, _) = bus();
        let r = bus.submit(timer("a")).unwrap();
        bus.submit(
            SubmitEvent::builder()
                .project_id("demo")
                .domain("custom")
                .event_type("thing_happened")
                .build(),
        )
        .unwrap();
        bus.ack("demo", r.event_id().as_str()).unwrap();

        let stats = bus.stats("demo").unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_state["done"], 1);
        assert_eq!(stats.by_state["queued"], 1);
        assert_eq!(stats.by_state["dead"], 0);

        let catalog = bus.catalog("demo").unwrap();
        let custom = catalog
            .iter()
            .find(|e| e.domain == "custom")
            .expect("unregistered entry");
        assert!(!custom.registered);
        assert!(
            catalog
                .iter()
                .any(|e| e.domain == "scheduling" && e.event_type == "timer" && e.registered)
        );
    }

    #[test]
    fn huge_reconcile_timeout_leaves_ledger_usable() {
        let (bus, clock) = bus();
        let r = bus.submit(timer("a")).unwrap();
        let req = DispatchRequest::builder()
            .eligible_agents(["a".to_string()])
            .build();
        bus.dispatch("demo", &req).unwrap();
        clock.advance(Duration::seconds(600));

        let huge = std::time::Duration::from_secs(10_000_000_000_000);
        assert_eq!(bus.reconcile("demo", huge).unwrap().total(), 0);

        let rows = bus.list("demo", &ListFilter::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state(), EventState::Picked);
        assert_eq!(
            bus.reconcile("demo", std::time::Duration::from_secs(60))
                .unwrap()
                .recovered_count,
            1
        );
        assert_eq!(
            bus.get("demo", r.event_id().as_str()).unwrap().state(),
            EventState::Queued
        );
    }

    impl SubmitEvent {
        fn with_project(self, project_id: &str) -> Self {
            Self {
                project_id: project_id.to_string(),
                ..self
            }
        }

        fn with_dedupe(self, key: &str) -> Self {
            Self {
                dedupe_key: Some(key.to_string()),
                ..self
            }
        }
    }
}
