//! 超时回收（Reconciler）
//!
//! 找出最近活动早于 `now - timeout` 的在途记录（picked/processing），
//! 按失败规则处理：仍有重试预算的立即重新排队，否则进入死信。
//! 重复执行是幂等的：被处理过的记录已不再在途。
//!
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::event::{EventRecord, EventState};
use crate::lifecycle::{self, BackoffPolicy, Failure};
use crate::specification::{Specification, StaleBefore};

/// 超时回收的错误码
pub const PROCESSING_TIMEOUT: &str = "PROCESSING_TIMEOUT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// 重新排队的记录数
    pub recovered_count: usize,
    /// 进入死信的记录数
    pub dead_count: usize,
}

impl ReconcileReport {
    pub fn total(&self) -> usize {
        self.recovered_count + self.dead_count
    }
}

/// 在事务体内执行一次回收
///
/// 截止时间早于可表示的最小时刻时，没有记录会超时。
pub fn reconcile(rows: &mut [EventRecord], now: DateTime<Utc>, timeout: Duration) -> ReconcileReport {
    let Some(cutoff) = now.checked_sub_signed(timeout) else {
        return ReconcileReport::default();
    };
    let stale = StaleBefore(cutoff);
    let message = format!(
        "no consumer activity for more than {}s",
        timeout.num_seconds()
    );
    let mut report = ReconcileReport::default();
    for record in rows.iter_mut().filter(|r| stale.is_satisfied_by(r)) {
        let failure = Failure {
            code: PROCESSING_TIMEOUT,
            message: &message,
        };
        if !lifecycle::fail(record, now, &BackoffPolicy::immediate(), failure).is_applied() {
            continue;
        }
        match record.state() {
            EventState::Dead => report.dead_count += 1,
            _ => report.recovered_count += 1,
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_object::{EventId, ProjectId};

    fn in_flight(state: EventState, attempt: u32, touched: DateTime<Utc>) -> EventRecord {
        EventRecord::builder()
            .event_id(EventId::generate())
            .project_id(ProjectId::new("demo").unwrap())
            .domain("scheduling".into())
            .event_type("timer".into())
            .state(state)
            .attempt(attempt)
            .max_attempts(2)
            .created_at(touched)
            .available_at(touched)
            .touched_at(touched)
            .build()
    }

    #[test]
    fn stale_records_are_requeued_or_dead_lettered() {
        let start = Utc::now();
        let now = start + Duration::seconds(120);
        let mut rows = vec![
            in_flight(EventState::Processing, 0, start),
            in_flight(EventState::Picked, 1, start),
            in_flight(EventState::Processing, 0, now),
            in_flight(EventState::Queued, 0, start),
        ];
        let report = reconcile(&mut rows, now, Duration::seconds(60));
        assert_eq!(
            report,
            ReconcileReport {
                recovered_count: 1,
                dead_count: 1
            }
        );
        assert_eq!(rows[0].state(), EventState::Queued);
        assert_eq!(rows[0].attempt(), 1);
        assert_eq!(rows[0].available_at(), now);
        assert_eq!(rows[0].error_code(), Some(PROCESSING_TIMEOUT));
        assert_eq!(rows[1].state(), EventState::Dead);
        assert_eq!(rows[2].state(), EventState::Processing);
        assert_eq!(rows[3].state(), EventState::Queued);

        // 第二次执行无事可做
        assert_eq!(reconcile(&mut rows, now, Duration::seconds(60)).total(), 0);
    }

    #[test]
    fn cutoff_before_representable_time_finds_nothing() {
        let start = Utc::now();
        let mut rows = vec![in_flight(EventState::Processing, 0, start)];
        let report = reconcile(&mut rows, start, Duration::seconds(10_000_000_000_000));
        assert_eq!(report.total(), 0);
        assert_eq!(rows[0].state(), EventState::Processing);
    }
}
