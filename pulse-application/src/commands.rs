//! 事件总线的写操作命令
//!
//! 字段形状即传输层的请求体，可直接由 JSON 反序列化。
//!
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::command::Command;
use crate::dto::{DispatchResultDto, EventDto, ReconcileResultDto, SubmitResultDto};

fn default_batch_size() -> usize {
    1
}

fn default_timeout_sec() -> u64 {
    60
}

/// 提交事件
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitEvent {
    pub project_id: String,
    pub domain: String,
    pub event_type: String,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub dedupe_key: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub agent_id: Option<String>,
}

impl Command for SubmitEvent {
    const NAME: &'static str = "SubmitEvent";
    type Output = SubmitResultDto;
}

/// 运维重试：failed/dead → queued
#[derive(Debug, Clone, Deserialize)]
pub struct RetryEvent {
    pub project_id: String,
    pub event_id: String,
}

impl Command for RetryEvent {
    const NAME: &'static str = "RetryEvent";
    type Output = EventDto;
}

#[derive(Debug, Clone, Deserialize)]
pub struct AckEvent {
    pub project_id: String,
    pub event_id: String,
}

impl Command for AckEvent {
    const NAME: &'static str = "AckEvent";
    type Output = EventDto;
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartProcessing {
    pub project_id: String,
    pub event_id: String,
}

impl Command for StartProcessing {
    const NAME: &'static str = "StartProcessing";
    type Output = EventDto;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Heartbeat {
    pub project_id: String,
    pub event_id: String,
}

impl Command for Heartbeat {
    const NAME: &'static str = "Heartbeat";
    type Output = EventDto;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportFailure {
    pub project_id: String,
    pub event_id: String,
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub error_message: String,
}

impl Command for ReportFailure {
    const NAME: &'static str = "ReportFailure";
    type Output = EventDto;
}

/// 为一组 Agent 各挑选至多一条事件
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchPulse {
    pub project_id: String,
    pub agent_ids: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub domain: Option<String>,
}

impl Command for DispatchPulse {
    const NAME: &'static str = "DispatchPulse";
    type Output = DispatchResultDto;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileEvents {
    pub project_id: String,
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
}

impl Command for ReconcileEvents {
    const NAME: &'static str = "ReconcileEvents";
    type Output = ReconcileResultDto;
}
