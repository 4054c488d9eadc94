//! 内存版事件存储（InMemoryEventStore）
//!
//! 每个项目一把互斥锁，事务在副本上执行，成功后整体替换，
//! 与文件账本保持相同的“失败不写回”语义。适用于测试、示例与单进程嵌入。
//!
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

use super::{EventStore, TxBody};
use crate::error::{DomainError, DomainResult};
use crate::event::EventRecord;
use crate::value_object::ProjectId;

type Ledger = Arc<Mutex<Vec<EventRecord>>>;

#[derive(Default)]
pub struct InMemoryEventStore {
    ledgers: DashMap<ProjectId, Ledger>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self, project_id: &ProjectId) -> Ledger {
        self.ledgers.entry(project_id.clone()).or_default().clone()
    }
}

impl EventStore for InMemoryEventStore {
    fn transact(&self, project_id: &ProjectId, body: &mut TxBody<'_>) -> DomainResult<()> {
        let ledger = self.ledger(project_id);
        let mut guard = ledger
            .lock()
            .map_err(|_| DomainError::storage("in-memory ledger lock poisoned"))?;
        let mut work = guard.clone();
        body(&mut work)?;
        *guard = work;
        Ok(())
    }

    fn load(&self, project_id: &ProjectId) -> DomainResult<Vec<EventRecord>> {
        let Some(ledger) = self.ledgers.get(project_id).map(|l| l.clone()) else {
            return Ok(Vec::new());
        };
        let guard = ledger
            .lock()
            .map_err(|_| DomainError::storage("in-memory ledger lock poisoned"))?;
        Ok(guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EventStoreExt;
    use crate::value_object::EventId;
    use chrono::Utc;
    use std::thread;

    fn record(p: &ProjectId) -> EventRecord {
        let now = Utc::now();
        EventRecord::builder()
            .event_id(EventId::generate())
            .project_id(p.clone())
            .domain("scheduling".into())
            .event_type("timer".into())
            .created_at(now)
            .available_at(now)
            .build()
    }

    #[test]
    fn projects_are_isolated() {
        let store = InMemoryEventStore::new();
        let a = ProjectId::new("a").unwrap();
        let b = ProjectId::new("b").unwrap();
        store
            .transaction(&a, |rows| {
                rows.push(record(&a));
                Ok(())
            })
            .unwrap();
        assert_eq!(store.load(&a).unwrap().len(), 1);
        assert!(store.load(&b).unwrap().is_empty());
    }

    #[test]
    fn error_discards_the_working_copy() {
        let store = InMemoryEventStore::new();
        let p = ProjectId::new("p").unwrap();
        let _ = store.transaction(&p, |rows| -> DomainResult<()> {
            rows.push(record(&p));
            Err(DomainError::storage("nope"))
        });
        assert!(store.load(&p).unwrap().is_empty());
    }

    #[test]
    fn concurrent_transactions_are_serialized() {
        let store = Arc::new(InMemoryEventStore::new());
        let p = ProjectId::new("p").unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let p = p.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        store
                            .transaction(&p, |rows| {
                                rows.push(record(&p));
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.load(&p).unwrap().len(), 200);
    }
}
