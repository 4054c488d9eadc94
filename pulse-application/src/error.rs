use pulse_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("handler not found: {0}")]
    HandlerNotFound(&'static str),

    #[error("handler already registered: command={command}")]
    AlreadyRegisteredCommand { command: &'static str },

    #[error("handler already registered: query={query}")]
    AlreadyRegisteredQuery { query: &'static str },

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// 阻塞任务被取消或 panic
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn is_validation(&self) -> bool {
        match self {
            AppError::Validation(_) => true,
            AppError::Domain(e) => e.is_validation(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Domain(e) if e.is_not_found())
    }
}

pub type AppResult<T> = Result<T, AppError>;
