//! Pulse 事件总线应用层
//!
//! 把领域层的 `EventBus` 暴露为异步的命令/查询：传输层（HTTP 路由、CLI 工具）
//! 通过进程内命令总线与查询总线调用，阻塞的账本操作在 `spawn_blocking` 上执行。
//! 另含 Agent 唤醒队列适配器与可选的周期回收任务。
//!
pub mod command;
pub mod command_bus;
pub mod command_handler;
pub mod commands;
pub mod context;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod inmemory_command_bus;
pub mod inmemory_query_bus;
pub mod pulse_queue;
pub mod queries;
pub mod query;
pub mod query_bus;
pub mod query_handler;
pub mod reconcile_worker;

pub use handlers::EventBusHandlers;
pub use inmemory_command_bus::InMemoryCommandBus;
pub use inmemory_query_bus::InMemoryQueryBus;
pub use pulse_queue::PulseQueue;
pub use reconcile_worker::{ReconcileWorker, ReconcileWorkerConfig, WorkerHandle};
