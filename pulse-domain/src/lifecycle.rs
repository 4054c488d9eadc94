//! 生命周期 / 重试状态机
//!
//! ```text
//! queued     --pick-->            picked
//! picked     --start-->           processing
//! processing --ack-->             done      (终态)
//! processing --report failure-->  failed
//! failed     --attempt < max-->   queued    (attempt += 1, available_at = now + backoff)
//! failed     --attempt >= max-->  dead      (终态)
//! processing --reconcile-->       queued / dead（同上规则）
//! failed|dead --retry-->          queued    (运维显式重试，不看剩余次数)
//! ```
//!
//! `failed` 只在单个事务内部出现，事务提交前一定被解析为 `queued` 或 `dead`。
//! 本模块只做纯内存的状态变更，由调用方放进存储事务执行。
//!
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::event::{EventRecord, EventState, truncate_message};

/// 判断状态迁移是否合法
pub fn can_transition(from: EventState, to: EventState) -> bool {
    use EventState::*;
    matches!(
        (from, to),
        (Queued, Picked)
            | (Queued, Done)
            | (Picked, Processing)
            | (Picked, Done)
            | (Picked, Failed)
            | (Picked, Queued)
            | (Picked, Dead)
            | (Processing, Done)
            | (Processing, Failed)
            | (Processing, Queued)
            | (Processing, Dead)
            | (Failed, Queued)
            | (Failed, Dead)
            | (Dead, Queued)
    )
}

/// 一次迁移的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied { from: EventState, to: EventState },
    /// 非法迁移（例如对终态 ack），记录保持不变
    Noop { current: EventState },
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

/// 单次退避的硬上限（7 天）
const MAX_BACKOFF_SECS: u64 = 7 * 24 * 3600;

/// 退避策略：`base * 2^attempt`，并夹在 `[min, max]` 区间内
///
/// 对 attempt 单调不减。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub base_secs: u64,
    pub min_secs: u64,
    pub max_secs: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_secs: 1,
            min_secs: 2,
            max_secs: 30,
        }
    }
}

impl BackoffPolicy {
    /// 不退避，立即重新排队
    pub const fn immediate() -> Self {
        Self {
            base_secs: 0,
            min_secs: 0,
            max_secs: 0,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let raw = self.base_secs.saturating_mul(factor);
        let upper = self.max_secs.max(self.min_secs);
        let secs = raw.max(self.min_secs).min(upper).min(MAX_BACKOFF_SECS);
        Duration::seconds(secs as i64)
    }
}

/// 失败原因
#[derive(Debug, Clone)]
pub struct Failure<'a> {
    pub code: &'a str,
    pub message: &'a str,
}

fn apply(record: &mut EventRecord, to: EventState) -> Transition {
    let from = record.state;
    if !can_transition(from, to) {
        return Transition::Noop { current: from };
    }
    record.state = to;
    Transition::Applied { from, to }
}

/// queued → picked
pub fn pick(record: &mut EventRecord, now: DateTime<Utc>) -> Transition {
    let t = apply(record, EventState::Picked);
    if t.is_applied() {
        record.picked_at = Some(now);
        record.touched_at = Some(now);
    }
    t
}

/// picked → processing
pub fn start(record: &mut EventRecord, now: DateTime<Utc>) -> Transition {
    let t = apply(record, EventState::Processing);
    if t.is_applied() {
        record.touched_at = Some(now);
    }
    t
}

/// 任一开放态 → done
pub fn ack(record: &mut EventRecord, now: DateTime<Utc>) -> Transition {
    let t = apply(record, EventState::Done);
    if t.is_applied() {
        record.done_at = Some(now);
        record.touched_at = Some(now);
    }
    t
}

/// 刷新在途记录的活动时间，避免被超时回收
pub fn heartbeat(record: &mut EventRecord, now: DateTime<Utc>) -> Transition {
    if !record.state.is_in_flight() {
        return Transition::Noop {
            current: record.state,
        };
    }
    record.touched_at = Some(now);
    Transition::Applied {
        from: record.state,
        to: record.state,
    }
}

/// 报告失败：进入 failed 并在同一调用内解析为 queued（带退避）或 dead
///
/// attempt 在达到 max_attempts 时饱和，此时记录一定是 dead。
pub fn fail(
    record: &mut EventRecord,
    now: DateTime<Utc>,
    backoff: &BackoffPolicy,
    failure: Failure<'_>,
) -> Transition {
    let from = record.state;
    if !apply(record, EventState::Failed).is_applied() {
        return Transition::Noop { current: from };
    }

    record.attempt = record.attempt.saturating_add(1).min(record.max_attempts);
    record.error_code = Some(failure.code.to_string());
    record.error_message = Some(truncate_message(failure.message));

    if record.attempt >= record.max_attempts {
        apply(record, EventState::Dead);
        record.done_at = Some(now);
    } else {
        apply(record, EventState::Queued);
        record.available_at = now + backoff.delay(record.attempt);
    }
    Transition::Applied {
        from,
        to: record.state,
    }
}

/// 运维重试：failed/dead → queued，忽略剩余重试次数
pub fn retry(record: &mut EventRecord, now: DateTime<Utc>) -> Transition {
    if !matches!(record.state, EventState::Failed | EventState::Dead) {
        return Transition::Noop {
            current: record.state,
        };
    }
    let t = apply(record, EventState::Queued);
    if t.is_applied() {
        record.available_at = now.max(record.created_at);
        record.picked_at = None;
        record.touched_at = None;
        record.done_at = None;
        record.error_code = None;
        record.error_message = None;
    }
    t
}
