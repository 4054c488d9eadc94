//! 幂等去重
//!
//! 同一项目内，`domain + event_type + dedupe_key` 相同且仍处于开放态
//! （queued/picked/processing）的记录视为同一事件。终态记录不参与去重，
//! 因此键可以在事件完成后复用。空白键从不去重。
//!
use crate::event::EventRecord;
use crate::specification::{AllOf, DomainIs, EventTypeIs, IsOpen, Specification};

/// 规范化幂等键：去掉首尾空白，空串视为未提供
pub fn normalize_key(key: Option<&str>) -> Option<String> {
    key.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// 查找开放态重复记录的下标
pub fn find_open_duplicate(
    rows: &[EventRecord],
    domain: &str,
    event_type: &str,
    dedupe_key: Option<&str>,
) -> Option<usize> {
    let key = normalize_key(dedupe_key)?;
    let spec = AllOf::new()
        .with(IsOpen)
        .with(DomainIs(domain.to_string()))
        .with(EventTypeIs(event_type.to_string()));
    rows.iter()
        .position(|r| r.dedupe_key() == Some(key.as_str()) && spec.is_satisfied_by(r))
}
