//! 事件存储（store）
//!
//! 对外只暴露一个原语：在项目级排他锁内对账本执行一次“读取 → 修改 → 写回”，
//! 外加一个不加锁的快照读取（仅用于列表与诊断，可能略滞后于正在进行的写事务）。
//!
//! - `JsonlEventStore`：每个项目一个 JSONL 账本文件 + 一个零长度锁文件；
//! - `InMemoryEventStore`：进程内实现，契约相同，便于测试与嵌入。
//!
//! 物理介质可以替换，门面层（`EventBus`）只依赖 `EventStore` 协议。
//!
mod inmemory;
mod integrity;
mod jsonl;

pub use inmemory::InMemoryEventStore;
pub use integrity::{IntegrityIssue, IntegrityReport};
pub use jsonl::JsonlEventStore;

use crate::error::{DomainError, DomainResult};
use crate::event::EventRecord;
use crate::value_object::ProjectId;
use std::sync::Arc;

/// 事务体：就地修改当前账本记录；返回 `Err` 时整个事务不写回
pub type TxBody<'a> = dyn FnMut(&mut Vec<EventRecord>) -> DomainResult<()> + 'a;

pub trait EventStore: Send + Sync {
    /// 在项目级排他锁内执行事务；等待锁时阻塞，不设超时
    fn transact(&self, project_id: &ProjectId, body: &mut TxBody<'_>) -> DomainResult<()>;

    /// 不加锁读取当前账本快照
    fn load(&self, project_id: &ProjectId) -> DomainResult<Vec<EventRecord>>;
}

pub trait EventStoreExt: EventStore {
    /// 带返回值的事务：`f` 只会被调用一次
    fn transaction<R, F>(&self, project_id: &ProjectId, f: F) -> DomainResult<R>
    where
        F: FnOnce(&mut Vec<EventRecord>) -> DomainResult<R>,
    {
        let mut f = Some(f);
        let mut out = None;
        self.transact(project_id, &mut |rows| {
            let f = f
                .take()
                .ok_or_else(|| DomainError::storage("transaction body invoked twice"))?;
            out = Some(f(rows)?);
            Ok(())
        })?;
        out.ok_or_else(|| DomainError::storage("transaction body was never invoked"))
    }
}

impl<T> EventStoreExt for T where T: EventStore + ?Sized {}

impl<T> EventStore for Arc<T>
where
    T: EventStore + ?Sized,
{
    fn transact(&self, project_id: &ProjectId, body: &mut TxBody<'_>) -> DomainResult<()> {
        (**self).transact(project_id, body)
    }

    fn load(&self, project_id: &ProjectId) -> DomainResult<Vec<EventRecord>> {
        (**self).load(project_id)
    }
}
