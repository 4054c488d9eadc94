//! 事件总线统一错误定义
//!
//! 覆盖提交校验、记录查找、存储读写与序列化等最小必要集合，
//! 上层（应用层/传输层）统一转换为 `DomainError` 后再映射为各自的错误码。
//!
//! 注意：对终态记录的 retry/ack 属于“冲突”，按约定以无操作返回原记录，
//! 因此不在此处建模；账本中的损坏行也只在读取时告警并跳过，不会作为错误抛出。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 提交/请求校验 ---
    #[error("validation failed: field={field}, reason={reason}")]
    Validation { field: &'static str, reason: String },

    // --- 记录查找 ---
    #[error("event not found: project={project_id}, event_id={event_id}")]
    NotFound {
        project_id: String,
        event_id: String,
    },

    // --- 存储 ---
    #[error("storage error: {reason}")]
    Storage { reason: String },
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

impl DomainError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(project_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        DomainError::NotFound {
            project_id: project_id.into(),
            event_id: event_id.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        DomainError::Storage {
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DomainError::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;
