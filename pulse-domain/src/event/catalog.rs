//! 事件目录（Event Catalog）
//!
//! 登记各领域已知的事件类型及其语义说明，并标注该事件是否会进入 Agent 的
//! LLM 上下文。目录只用于展示与（可选的）严格校验，不参与状态机。
//!
use serde::Serialize;

/// 目录条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub domain: String,
    pub event_type: String,
    pub title: String,
    pub description: String,
    /// `None` 表示未登记事件，无法判断
    pub feeds_llm: Option<bool>,
    pub registered: bool,
}

impl CatalogEntry {
    /// 运行中出现但未登记的事件类型
    pub fn unregistered(domain: &str, event_type: &str) -> Self {
        Self {
            domain: domain.to_string(),
            event_type: event_type.to_string(),
            title: "Unregistered event".to_string(),
            description: "Observed in the ledger but missing from the event catalog.".to_string(),
            feeds_llm: None,
            registered: false,
        }
    }
}

// (domain, event_type, title, description, feeds_llm)
const CATALOG: &[(&str, &str, &str, &str, bool)] = &[
    (
        "interaction",
        "interaction.message.sent",
        "Message send request",
        "Entry point for agent/human messages; converted inline into mailbox events.",
        false,
    ),
    (
        "interaction",
        "interaction.message.read",
        "Message read receipt",
        "Updates message handling status in the mailbox domain.",
        false,
    ),
    (
        "interaction",
        "interaction.protocol.notice",
        "Protocol notice",
        "Routes a protocol/contract notification to its target agents.",
        false,
    ),
    (
        "interaction",
        "interaction.detach.notice",
        "Detached job notice",
        "Notifies an agent about a lifecycle change of its detached container job.",
        false,
    ),
    (
        "mailbox",
        "mail_event",
        "Mail available",
        "The inbox holds messages the agent has not consumed yet.",
        true,
    ),
    (
        "mailbox",
        "mail_deliver_event",
        "Mail delivered",
        "Internal delivery step of a mailbox message.",
        false,
    ),
    (
        "mailbox",
        "mail_ack_event",
        "Mail acknowledged",
        "Internal receipt/acknowledgement of a mailbox message.",
        false,
    ),
    (
        "scheduling",
        "timer",
        "Timer trigger",
        "Scheduled trigger for one agent pulse.",
        true,
    ),
    (
        "scheduling",
        "manual",
        "Manual trigger",
        "Operator or tool initiated agent pulse.",
        true,
    ),
    (
        "scheduling",
        "system",
        "System trigger",
        "Pulse requested by an internal subsystem.",
        true,
    ),
    (
        "pulse",
        "inbox_event",
        "Inbox wake-up",
        "Wakes an agent because new mail arrived.",
        true,
    ),
    (
        "pulse",
        "timer",
        "Timer wake-up",
        "Idle heartbeat wake-up of an agent.",
        true,
    ),
    (
        "pulse",
        "manual",
        "Manual wake-up",
        "Operator requested wake-up of an agent.",
        true,
    ),
    (
        "pulse",
        "system",
        "System wake-up",
        "Wake-up requested by an internal subsystem.",
        true,
    ),
    (
        "protocol",
        "protocol_invoked_event",
        "Protocol invoked",
        "A protocol endpoint was invoked.",
        false,
    ),
    (
        "protocol",
        "protocol_job_updated_event",
        "Protocol job updated",
        "Status change of an asynchronous protocol job.",
        false,
    ),
    (
        "protocol",
        "contract_registered_event",
        "Contract registered",
        "A contract was registered.",
        false,
    ),
    (
        "protocol",
        "contract_committed_event",
        "Contract committed",
        "A contract reached a committed milestone.",
        false,
    ),
    (
        "protocol",
        "contract_disabled_event",
        "Contract disabled",
        "A contract was disabled.",
        false,
    ),
    (
        "runtime",
        "detach_submitted_event",
        "Detached job submitted",
        "A detached container job was submitted.",
        false,
    ),
    (
        "runtime",
        "detach_started_event",
        "Detached job started",
        "A detached container job started running.",
        false,
    ),
    (
        "runtime",
        "detach_stopping_event",
        "Detached job stopping",
        "A detached container job entered its stop sequence.",
        false,
    ),
    (
        "runtime",
        "detach_stopped_event",
        "Detached job stopped",
        "A detached container job stopped.",
        false,
    ),
    (
        "runtime",
        "detach_failed_event",
        "Detached job failed",
        "A detached container job failed.",
        false,
    ),
    (
        "runtime",
        "detach_reconciled_event",
        "Detached job reconciled",
        "Runtime state of a detached job was reconciled.",
        false,
    ),
    (
        "runtime",
        "detach_lost_event",
        "Detached job lost",
        "A detached container job can no longer be tracked.",
        false,
    ),
];

fn to_entry(row: &(&str, &str, &str, &str, bool)) -> CatalogEntry {
    let (domain, event_type, title, description, feeds_llm) = *row;
    CatalogEntry {
        domain: domain.to_string(),
        event_type: event_type.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        feeds_llm: Some(feeds_llm),
        registered: true,
    }
}

/// 全部已登记事件，按 (domain, event_type) 排序
pub fn event_catalog() -> Vec<CatalogEntry> {
    let mut out: Vec<CatalogEntry> = CATALOG.iter().map(to_entry).collect();
    out.sort_by(|a, b| {
        a.domain
            .cmp(&b.domain)
            .then_with(|| a.event_type.cmp(&b.event_type))
    });
    out
}

/// 查询单个事件的目录信息
pub fn event_meta(domain: &str, event_type: &str) -> Option<CatalogEntry> {
    CATALOG
        .iter()
        .find(|(d, t, ..)| *d == domain && *t == event_type)
        .map(to_entry)
}

pub fn is_registered(domain: &str, event_type: &str) -> bool {
    event_meta(domain, event_type).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_is_sorted_and_unique() {
        let all = event_catalog();
        let keys: HashSet<_> = all
            .iter()
            .map(|e| (e.domain.clone(), e.event_type.clone()))
            .collect();
        assert_eq!(keys.len(), all.len());
        for pair in all.windows(2) {
            assert!((&pair[0].domain, &pair[0].event_type) < (&pair[1].domain, &pair[1].event_type));
        }
    }

    #[test]
    fn lookup_is_scoped_by_domain() {
        assert!(is_registered("scheduling", "timer"));
        assert!(is_registered("pulse", "timer"));
        assert!(!is_registered("runtime", "timer"));
        let meta = event_meta("mailbox", "mail_event").unwrap();
        assert_eq!(meta.feeds_llm, Some(true));
        assert!(meta.registered);
    }

    #[test]
    fn unregistered_entry_has_unknown_llm_feed() {
        let e = CatalogEntry::unregistered("custom", "thing_happened");
        assert!(!e.registered);
        assert_eq!(e.feeds_llm, None);
    }
}
