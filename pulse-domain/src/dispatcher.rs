//! 优先级调度（每个 Agent 至多一条）
//!
//! 在一次存储事务内完成：过滤 → 排序 → 按 Agent 去重选取 → queued→picked。
//! 已有在途记录（picked/processing）的 Agent 本轮不再分配，
//! 未被选中的记录保持 queued 等待下一轮。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::error::{DomainError, DomainResult};
use crate::event::EventRecord;
use crate::lifecycle;
use crate::specification::{AgentIn, AllOf, AvailableAt, DomainIs, Specification};

/// 一次调度请求
#[derive(Debug, Clone, Builder)]
pub struct DispatchRequest {
    /// 本轮有资格被唤醒的 Agent
    #[builder(with = FromIterator::from_iter)]
    pub eligible_agents: HashSet<String>,
    #[builder(default = 1)]
    pub batch_size: usize,
    /// 只调度该领域的记录
    pub domain: Option<String>,
}

impl DispatchRequest {
    pub fn validate(&self) -> DomainResult<()> {
        if self.batch_size == 0 {
            return Err(DomainError::validation("batch_size", "must be >= 1"));
        }
        Ok(())
    }
}

/// 单轮调度结果：按调度顺序排列的 (agent, record)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PulseAssignment {
    items: Vec<(String, EventRecord)>,
}

impl PulseAssignment {
    pub fn items(&self) -> &[(String, EventRecord)] {
        &self.items
    }

    pub fn into_items(self) -> Vec<(String, EventRecord)> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(a, _)| a.as_str())
    }

    pub fn records(&self) -> impl Iterator<Item = &EventRecord> {
        self.items.iter().map(|(_, r)| r)
    }
}

/// 在事务体内执行一次调度，修改 `rows` 并返回选中的记录
pub fn dispatch(
    rows: &mut [EventRecord],
    request: &DispatchRequest,
    now: DateTime<Utc>,
) -> DomainResult<PulseAssignment> {
    request.validate()?;
    if request.eligible_agents.is_empty() {
        return Ok(PulseAssignment::default());
    }

    // 上一轮尚未确认的 Agent
    let mut taken: HashSet<String> = rows
        .iter()
        .filter(|r| r.state().is_in_flight())
        .filter_map(|r| r.agent_id().map(str::to_string))
        .collect();

    let spec = AllOf::new()
        .with(AvailableAt(now))
        .with(AgentIn(request.eligible_agents.clone()))
        .with_opt(request.domain.clone().map(DomainIs));

    let mut candidates: Vec<usize> = (0..rows.len())
        .filter(|&i| spec.is_satisfied_by(&rows[i]))
        .collect();
    candidates.sort_by(|&a, &b| EventRecord::dispatch_order(&rows[a], &rows[b]));

    let mut assignment = PulseAssignment::default();
    for idx in candidates {
        if assignment.len() >= request.batch_size {
            break;
        }
        let Some(agent) = rows[idx].agent_id().map(str::to_string) else {
            continue;
        };
        if !taken.insert(agent.clone()) {
            continue;
        }
        if lifecycle::pick(&mut rows[idx], now).is_applied() {
            assignment.items.push((agent, rows[idx].clone()));
        }
    }
    Ok(assignment)
}
