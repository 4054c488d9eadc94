use anyhow::Result as AnyResult;
use chrono::Duration as ChronoDuration;
use pulse_application::command_bus::CommandBus;
use pulse_application::commands::{
    AckEvent, DispatchPulse, ReconcileEvents, ReportFailure, RetryEvent, StartProcessing,
    SubmitEvent,
};
use pulse_application::context::AppContext;
use pulse_application::error::AppError;
use pulse_application::queries::{GetCatalog, GetEvent, GetStats, ListEvents};
use pulse_application::query_bus::QueryBus;
use pulse_application::{EventBusHandlers, InMemoryCommandBus, InMemoryQueryBus};
use pulse_domain::EventBus;
use pulse_domain::clock::ManualClock;
use pulse_domain::config::BusConfig;
use pulse_domain::event::EventState;
use serde_json::json;
use std::sync::Arc;

struct Harness {
    commands: InMemoryCommandBus,
    queries: InMemoryQueryBus,
    clock: Arc<ManualClock>,
    _dir: tempfile::TempDir,
}

fn harness() -> AnyResult<Harness> {
    let dir = tempfile::tempdir()?;
    let clock = Arc::new(ManualClock::default());
    let config = BusConfig {
        root: dir.path().to_path_buf(),
        ..BusConfig::default()
    };
    let bus = EventBus::builder()
        .store(Arc::new(pulse_domain::store::JsonlEventStore::new(
            config.root.clone(),
        )))
        .clock(clock.clone())
        .config(config)
        .build();

    let commands = InMemoryCommandBus::new();
    let queries = InMemoryQueryBus::new();
    Arc::new(EventBusHandlers::new(Arc::new(bus))).register_all(&commands, &queries)?;
    Ok(Harness {
        commands,
        queries,
        clock,
        _dir: dir,
    })
}

fn submit(body: serde_json::Value) -> AnyResult<SubmitEvent> {
    Ok(serde_json::from_value(body)?)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submit_list_and_idempotency_key_from_context() -> AnyResult<()> {
    let h = harness()?;
    let ctx = AppContext::builder()
        .correlation_id("cor-1")
        .idempotency_key("agentA-heartbeat")
        .build();
    let body = json!({
        "project_id": "demo",
        "domain": "scheduling",
        "event_type": "timer",
        "agent_id": "agentA",
        "payload": {"reason": "heartbeat"}
    });

    let first = h.commands.dispatch(&ctx, submit(body.clone())?).await?;
    let second = h.commands.dispatch(&ctx, submit(body)?).await?;
    assert_eq!(first.event_id, second.event_id);
    assert_eq!(first.state, EventState::Queued);
    assert_eq!(first.queued_at, first.event.created_at);
    assert_eq!(first.event.dedupe_key.as_deref(), Some("agentA-heartbeat"));

    let listed = h
        .queries
        .dispatch(
            &ctx,
            ListEvents {
                project_id: "demo".into(),
                domain: None,
                event_type: None,
                state: Some(EventState::Queued),
                agent_id: Some("agentA".into()),
                limit: 10,
            },
        )
        .await?;
    assert_eq!(listed.items.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn consumer_lifecycle_through_buses() -> AnyResult<()> {
    let h = harness()?;
    let ctx = AppContext::default();
    let created = h
        .commands
        .dispatch(
            &ctx,
            submit(json!({
                "project_id": "demo",
                "domain": "mailbox",
                "event_type": "mail_event",
                "agent_id": "reader",
                "max_attempts": 1
            }))?,
        )
        .await?;

    let picked = h
        .commands
        .dispatch(
            &ctx,
            DispatchPulse {
                project_id: "demo".into(),
                agent_ids: vec!["reader".into(), "idle".into()],
                batch_size: 5,
                domain: None,
            },
        )
        .await?;
    assert_eq!(picked.items.len(), 1);
    assert_eq!(picked.items[0].agent_id, "reader");

    let started = h
        .commands
        .dispatch(
            &ctx,
            StartProcessing {
                project_id: "demo".into(),
                event_id: created.event_id.clone(),
            },
        )
        .await?;
    assert_eq!(started.state, EventState::Processing);

    let dead = h
        .commands
        .dispatch(
            &ctx,
            ReportFailure {
                project_id: "demo".into(),
                event_id: created.event_id.clone(),
                error_code: "WORKER_EXEC_ERROR".into(),
                error_message: "boom".into(),
            },
        )
        .await?;
    assert_eq!(dead.state, EventState::Dead);

    let retried = h
        .commands
        .dispatch(
            &ctx,
            RetryEvent {
                project_id: "demo".into(),
                event_id: created.event_id.clone(),
            },
        )
        .await?;
    assert_eq!(retried.state, EventState::Queued);

    let done = h
        .commands
        .dispatch(
            &ctx,
            AckEvent {
                project_id: "demo".into(),
                event_id: created.event_id.clone(),
            },
        )
        .await?;
    assert_eq!(done.state, EventState::Done);

    let fetched = h
        .queries
        .dispatch(
            &ctx,
            GetEvent {
                project_id: "demo".into(),
                event_id: created.event_id.clone(),
            },
        )
        .await?;
    assert_eq!(fetched, done);

    let stats = h
        .queries
        .dispatch(
            &ctx,
            GetStats {
                project_id: "demo".into(),
            },
        )
        .await?;
    assert_eq!(stats.total, 1);
    assert_eq!(stats.by_state.get("done"), Some(&1));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reconcile_command_recovers_stale_work() -> AnyResult<()> {
    let h = harness()?;
    let ctx = AppContext::default();
    h.commands
        .dispatch(
            &ctx,
            submit(json!({
                "project_id": "demo",
                "domain": "scheduling",
                "event_type": "timer",
                "agent_id": "a"
            }))?,
        )
        .await?;
    h.commands
        .dispatch(
            &ctx,
            DispatchPulse {
                project_id: "demo".into(),
                agent_ids: vec!["a".into()],
                batch_size: 1,
                domain: None,
            },
        )
        .await?;

    h.clock.advance(ChronoDuration::seconds(120));
    let report = h
        .commands
        .dispatch(
            &ctx,
            ReconcileEvents {
                project_id: "demo".into(),
                timeout_sec: 60,
            },
        )
        .await?;
    assert_eq!((report.recovered_count, report.dead_count), (1, 0));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn domain_errors_surface_through_the_bus() -> AnyResult<()> {
    let h = harness()?;
    let ctx = AppContext::default();

    let err = h
        .commands
        .dispatch(
            &ctx,
            submit(json!({
                "project_id": "demo",
                "domain": "mailbox",
                "event_type": "mail_event",
                "payload": {"read_at": "2024-01-01"}
            }))?,
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = h
        .commands
        .dispatch(
            &ctx,
            AckEvent {
                project_id: "demo".into(),
                event_id: "nope".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, AppError::Domain(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn catalog_lists_unregistered_types_seen_in_ledger() -> AnyResult<()> {
    let h = harness()?;
    let ctx = AppContext::default();
    h.commands
        .dispatch(
            &ctx,
            submit(json!({
                "project_id": "demo",
                "domain": "custom",
                "event_type": "thing_happened"
            }))?,
        )
        .await?;
    let catalog = h
        .queries
        .dispatch(
            &ctx,
            GetCatalog {
                project_id: "demo".into(),
            },
        )
        .await?;
    assert_eq!(catalog.project_id, "demo");
    assert!(
        catalog
            .items
            .iter()
            .any(|e| e.domain == "custom" && e.event_type == "thing_happened" && !e.registered)
    );
    Ok(())
}
