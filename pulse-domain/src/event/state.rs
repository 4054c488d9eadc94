use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// 事件状态
///
/// - 开放态：`Queued` / `Picked` / `Processing`，参与去重与调度；
/// - 终态：`Done` / `Dead`，只有运维 retry 能把 `Dead` 重新排队；
/// - `Failed` 为瞬态，在产生它的同一事务内即被解析为 `Queued` 或 `Dead`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventState {
    Queued,
    Picked,
    Processing,
    Done,
    Failed,
    Dead,
}

impl EventState {
    pub const ALL: [EventState; 6] = [
        EventState::Queued,
        EventState::Picked,
        EventState::Processing,
        EventState::Done,
        EventState::Failed,
        EventState::Dead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::Queued => "queued",
            EventState::Picked => "picked",
            EventState::Processing => "processing",
            EventState::Done => "done",
            EventState::Failed => "failed",
            EventState::Dead => "dead",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self,
            EventState::Queued | EventState::Picked | EventState::Processing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventState::Done | EventState::Dead)
    }

    /// 已被某个消费者占用（尚未确认）
    pub fn is_in_flight(&self) -> bool {
        matches!(self, EventState::Picked | EventState::Processing)
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        EventState::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| DomainError::validation("state", format!("unknown state '{s}'")))
    }
}
