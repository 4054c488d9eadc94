//! 账本完整性报告
//!
//! 调用期间的损坏行只告警并跳过；需要定位问题时使用离线检查生成本报告。
//!
use serde::Serialize;
use std::path::PathBuf;

use crate::event::{EventRecord, EventState, forbidden_payload_fields};
use crate::value_object::{EventId, ProjectId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// 不是合法 JSON、缺少必备字段或含未知状态
    Unparseable { line: usize, reason: String },
    ForeignProject {
        line: usize,
        event_id: EventId,
        found: ProjectId,
    },
    DuplicateEventId {
        line: usize,
        first_line: usize,
        event_id: EventId,
    },
    ForbiddenPayloadFields {
        line: usize,
        event_id: EventId,
        fields: Vec<String>,
    },
    /// attempt / max_attempts / 时间戳 / 持久化的 failed 等不变式被破坏
    InvariantViolated {
        line: usize,
        event_id: EventId,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub project_id: ProjectId,
    pub path: PathBuf,
    /// 非空行数
    pub total_lines: usize,
    pub valid_records: usize,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub(crate) fn new(project_id: ProjectId, path: PathBuf) -> Self {
        Self {
            project_id,
            path,
            total_lines: 0,
            valid_records: 0,
            issues: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub(crate) fn push(&mut self, issue: IntegrityIssue) {
        self.issues.push(issue);
    }

    pub(crate) fn inspect_record(&mut self, line: usize, record: &EventRecord) {
        let forbidden = forbidden_payload_fields(record.payload());
        if !forbidden.is_empty() {
            self.push(IntegrityIssue::ForbiddenPayloadFields {
                line,
                event_id: record.event_id().clone(),
                fields: forbidden.into_iter().map(str::to_string).collect(),
            });
        }

        let mut violated = |reason: String| {
            self.issues.push(IntegrityIssue::InvariantViolated {
                line,
                event_id: record.event_id().clone(),
                reason,
            });
        };
        if record.max_attempts() == 0 {
            violated("max_attempts must be >= 1".to_string());
        }
        if record.attempt() > record.max_attempts() {
            violated(format!(
                "attempt {} exceeds max_attempts {}",
                record.attempt(),
                record.max_attempts()
            ));
        }
        if record.attempt() >= record.max_attempts()
            && record.max_attempts() > 0
            && record.state() == EventState::Queued
            && record.error_code().is_some()
        {
            // 预算耗尽却仍在排队，只有运维 retry 之后才合理（retry 会清空错误字段）
            violated("retry budget exhausted but record is still queued".to_string());
        }
        if record.available_at() < record.created_at() {
            violated("available_at precedes created_at".to_string());
        }
        if record.state() == EventState::Failed {
            violated("transient state 'failed' was persisted".to_string());
        }
    }
}
