//! 事件模型（event）
//!
//! - `EventRecord`：账本中的唯一持久化实体；
//! - `EventState`：生命周期状态；
//! - `catalog`：已登记事件目录。
//!
pub mod catalog;
mod record;
mod state;

pub use catalog::{CatalogEntry, event_catalog, event_meta};
pub use record::{
    AGENT_ID_KEY, EventRecord, FORBIDDEN_PAYLOAD_FIELDS, MAX_ERROR_MESSAGE_CHARS,
    forbidden_payload_fields,
};
pub(crate) use record::truncate_message;
pub use state::EventState;
