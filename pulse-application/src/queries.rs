//! 事件总线的只读查询
//!
use serde::Deserialize;

use crate::dto::{CatalogDto, EventDto, EventListDto, StatsDto};
use crate::query::Query;
use pulse_domain::event::EventState;

fn default_limit() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListEvents {
    pub project_id: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub state: Option<EventState>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Query for ListEvents {
    const NAME: &'static str = "ListEvents";
    type Dto = EventListDto;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetEvent {
    pub project_id: String,
    pub event_id: String,
}

impl Query for GetEvent {
    const NAME: &'static str = "GetEvent";
    type Dto = EventDto;
}

/// 各状态计数
#[derive(Debug, Clone, Deserialize)]
pub struct GetStats {
    pub project_id: String,
}

impl Query for GetStats {
    const NAME: &'static str = "GetStats";
    type Dto = StatsDto;
}

/// 事件目录（含账本中出现的未登记类型）
#[derive(Debug, Clone, Deserialize)]
pub struct GetCatalog {
    pub project_id: String,
}

impl Query for GetCatalog {
    const NAME: &'static str = "GetCatalog";
    type Dto = CatalogDto;
}
