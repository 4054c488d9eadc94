//! Pulse 事件总线领域层
//!
//! 多 Agent 编排平台的持久化统一事件总线：记录跨子系统的每一次事件，
//! 负责优先级排序、幂等去重、有界重试与退避、死信以及崩溃后的超时回收，
//! 并提供“每个 Agent 至多一条”的脉冲调度。
//!
//! 模块：
//! - `event`：事件记录、状态与事件目录；
//! - `lifecycle`：状态机、失败处理与退避；
//! - `store`：项目级排他事务的账本（JSONL / 内存）与完整性检查；
//! - `dedupe` / `dispatcher` / `reconciler`：去重、调度与超时回收；
//! - `facade`：对外操作入口 `EventBus`；
//! - `specification`：列表与调度共用的组合谓词。
//!
pub mod clock;
pub mod config;
pub mod dedupe;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod facade;
pub mod lifecycle;
pub mod reconciler;
pub mod specification;
pub mod store;
pub mod value_object;

pub use facade::EventBus;
