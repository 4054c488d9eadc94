//! 规约（Specification）
//!
//! 把列表过滤与调度候选条件封装成可组合的谓词，列表、统计与调度共用同一套规则。
//!
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::event::{EventRecord, EventState};

/// 规约模式的核心 trait
pub trait Specification<T> {
    /// 检查候选对象是否满足规约
    fn is_satisfied_by(&self, candidate: &T) -> bool;
}

impl<T> Specification<T> for Box<dyn Specification<T>> {
    fn is_satisfied_by(&self, candidate: &T) -> bool {
        self.as_ref().is_satisfied_by(candidate)
    }
}

/// 多个规约同时满足；为空时恒为真
pub struct AllOf<T> {
    specs: Vec<Box<dyn Specification<T>>>,
}

impl<T> Default for AllOf<T> {
    fn default() -> Self {
        Self { specs: Vec::new() }
    }
}

impl<T> AllOf<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<S>(mut self, spec: S) -> Self
    where
        S: Specification<T> + 'static,
    {
        self.specs.push(Box::new(spec));
        self
    }

    /// `Some` 时追加规约，`None` 时保持不变
    pub fn with_opt<S>(self, spec: Option<S>) -> Self
    where
        S: Specification<T> + 'static,
    {
        match spec {
            Some(spec) => self.with(spec),
            None => self,
        }
    }
}

impl<T> Specification<T> for AllOf<T> {
    fn is_satisfied_by(&self, candidate: &T) -> bool {
        self.specs.iter().all(|s| s.is_satisfied_by(candidate))
    }
}

// --- 事件记录上的基础规约 ---

pub struct StateIs(pub EventState);

impl Specification<EventRecord> for StateIs {
    fn is_satisfied_by(&self, r: &EventRecord) -> bool {
        r.state() == self.0
    }
}

/// queued / picked / processing
pub struct IsOpen;

impl Specification<EventRecord> for IsOpen {
    fn is_satisfied_by(&self, r: &EventRecord) -> bool {
        r.is_open()
    }
}

pub struct DomainIs(pub String);

impl Specification<EventRecord> for DomainIs {
    fn is_satisfied_by(&self, r: &EventRecord) -> bool {
        r.domain() == self.0
    }
}

pub struct EventTypeIs(pub String);

impl Specification<EventRecord> for EventTypeIs {
    fn is_satisfied_by(&self, r: &EventRecord) -> bool {
        r.event_type() == self.0
    }
}

pub struct AgentIs(pub String);

impl Specification<EventRecord> for AgentIs {
    fn is_satisfied_by(&self, r: &EventRecord) -> bool {
        r.agent_id() == Some(self.0.as_str())
    }
}

pub struct AgentIn(pub HashSet<String>);

impl Specification<EventRecord> for AgentIn {
    fn is_satisfied_by(&self, r: &EventRecord) -> bool {
        r.agent_id().is_some_and(|a| self.0.contains(a))
    }
}

/// 已排队且 `available_at <= now`
pub struct AvailableAt(pub DateTime<Utc>);

impl Specification<EventRecord> for AvailableAt {
    fn is_satisfied_by(&self, r: &EventRecord) -> bool {
        r.is_available(self.0)
    }
}

/// 在途（picked / processing）且最近活动早于 `cutoff`
pub struct StaleBefore(pub DateTime<Utc>);

impl Specification<EventRecord> for StaleBefore {
    fn is_satisfied_by(&self, r: &EventRecord) -> bool {
        r.state().is_in_flight() && r.last_touched_at() < self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_object::{EventId, ProjectId};
    use chrono::Duration;
    use serde_json::json;

    struct AlwaysTrueSpec;
    impl Specification<i32> for AlwaysTrueSpec {
        fn is_satisfied_by(&self, _: &i32) -> bool {
            true
        }
    }

    struct AlwaysFalseSpec;
    impl Specification<i32> for AlwaysFalseSpec {
        fn is_satisfied_by(&self, _: &i32) -> bool {
            false
        }
    }

    #[test]
    fn test_all_of() {
        assert!(AllOf::<i32>::new().is_satisfied_by(&1));
        assert!(
            !AllOf::new()
                .with(AlwaysTrueSpec)
                .with(AlwaysFalseSpec)
                .is_satisfied_by(&1)
        );
        assert!(
            AllOf::new()
                .with(AlwaysTrueSpec)
                .with_opt(None::<AlwaysFalseSpec>)
                .is_satisfied_by(&1)
        );
    }

    #[test]
    fn test_record_specs() {
        let now = Utc::now();
        let r = EventRecord::builder()
            .event_id(EventId::generate())
            .project_id(ProjectId::new("demo").unwrap())
            .domain("scheduling".into())
            .event_type("timer".into())
            .created_at(now)
            .available_at(now + Duration::seconds(5))
            .meta(json!({"agent_id": "a1"}).as_object().cloned().unwrap())
            .build();

        let spec = AllOf::new()
            .with(DomainIs("scheduling".into()))
            .with(StateIs(EventState::Queued))
            .with_opt(Some(AgentIs("a1".into())))
            .with_opt(None::<EventTypeIs>);
        assert!(spec.is_satisfied_by(&r));

        assert!(!AvailableAt(now).is_satisfied_by(&r));
        assert!(AvailableAt(now + Duration::seconds(5)).is_satisfied_by(&r));
        assert!(AgentIn(HashSet::from(["a1".to_string()])).is_satisfied_by(&r));
        assert!(!AgentIn(HashSet::new()).is_satisfied_by(&r));
        assert!(!StaleBefore(now + Duration::hours(1)).is_satisfied_by(&r));
    }
}
