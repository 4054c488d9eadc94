//! 值对象（Value Object）
//!
//! 无标识、以值相等为准的对象，用于封装项目标识、事件标识以及
//! 领域/事件类型名称的校验逻辑。
//!

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// 值对象抽象
pub trait ValueObject {
    /// 业务校验失败时的错误类型
    type Error;

    /// 创建值对象时进行验证
    fn validate(&self) -> Result<(), Self::Error>;
}

const MAX_ID_LEN: usize = 128;

/// 项目标识（分区键）
///
/// 同时用作账本目录名，因此只允许 `[A-Za-z0-9_.-]`，且不得以 `.` 开头。
///
/// # 示例
///
/// ```
/// use pulse_domain::value_object::ProjectId;
///
/// let p = ProjectId::new("animal_world").unwrap();
/// assert_eq!(p.as_str(), "animal_world");
/// assert!(ProjectId::new("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let id = Self(value.into().trim().to_string());
        id.validate()?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for ProjectId {
    type Error = DomainError;

    fn validate(&self) -> DomainResult<()> {
        let v = self.0.as_str();
        if v.is_empty() {
            return Err(DomainError::validation("project_id", "must not be empty"));
        }
        if v.len() > MAX_ID_LEN {
            return Err(DomainError::validation(
                "project_id",
                format!("exceeds {MAX_ID_LEN} characters"),
            ));
        }
        if v.starts_with('.') {
            return Err(DomainError::validation(
                "project_id",
                "must not start with '.'",
            ));
        }
        if !v
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(DomainError::validation(
                "project_id",
                "allowed characters: a-z, A-Z, 0-9, '-', '_', '.'",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 事件标识：创建时分配，项目内唯一
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// 生成新的事件标识（UUID v4，无连字符形式）
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let id = Self(value.into().trim().to_string());
        id.validate()?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for EventId {
    type Error = DomainError;

    fn validate(&self) -> DomainResult<()> {
        if self.0.is_empty() {
            return Err(DomainError::validation("event_id", "must not be empty"));
        }
        if self.0.len() > MAX_ID_LEN {
            return Err(DomainError::validation(
                "event_id",
                format!("exceeds {MAX_ID_LEN} characters"),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 校验领域名/事件类型名的形状：小写字母开头，仅含 `[a-z0-9_.-]`
///
/// 返回规范化（去空白、转小写）后的名称。
pub fn normalize_name(field: &'static str, value: &str) -> DomainResult<String> {
    let v = value.trim().to_ascii_lowercase();
    if v.is_empty() {
        return Err(DomainError::validation(field, "is required"));
    }
    if v.len() > MAX_ID_LEN {
        return Err(DomainError::validation(
            field,
            format!("exceeds {MAX_ID_LEN} characters"),
        ));
    }
    if !v.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(DomainError::validation(
            field,
            "must start with a letter",
        ));
    }
    if !v
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
    {
        return Err(DomainError::validation(
            field,
            "allowed characters: a-z, 0-9, '_', '.', '-'",
        ));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_rejects_path_tricks() {
        assert!(ProjectId::new("").is_err());
        assert!(ProjectId::new("   ").is_err());
        assert!(ProjectId::new("..").is_err());
        assert!(ProjectId::new(".hidden").is_err());
        assert!(ProjectId::new("a/b").is_err());
        assert!(ProjectId::new("a\\b").is_err());
        assert!(ProjectId::new("x".repeat(129)).is_err());
    }

    #[test]
    fn project_id_trims_and_accepts_simple_names() {
        let p = ProjectId::new("  demo-1.v2_x ").unwrap();
        assert_eq!(p.as_str(), "demo-1.v2_x");
        assert_eq!(p.to_string(), "demo-1.v2_x");
    }

    #[test]
    fn generated_event_ids_are_distinct_hex() {
        let a = EventId::generate();
        let b = EventId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let p = ProjectId::new("demo").unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"demo\"");
        let back: ProjectId = serde_json::from_str("\"demo\"").unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn normalize_name_lowercases_and_checks_shape() {
        assert_eq!(normalize_name("domain", " Angelia ").unwrap(), "angelia");
        assert_eq!(
            normalize_name("event_type", "interaction.message.sent").unwrap(),
            "interaction.message.sent"
        );
        assert!(normalize_name("domain", "").is_err());
        assert!(normalize_name("domain", "1abc").is_err());
        assert!(normalize_name("event_type", "has space").is_err());
        let err = normalize_name("event_type", "a/b").unwrap_err();
        assert!(err.is_validation());
    }
}
