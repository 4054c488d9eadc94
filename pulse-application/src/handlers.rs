//! 事件总线的命令/查询处理器
//!
//! 门面操作是阻塞调用（等待项目锁、同步写盘），统一放到
//! `tokio::task::spawn_blocking` 上执行，避免阻塞异步运行时。
//!
use async_trait::async_trait;
use pulse_domain::EventBus;
use pulse_domain::dispatcher::DispatchRequest;
use pulse_domain::error::DomainResult;
use pulse_domain::facade::{self, ListFilter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Span, instrument};

use crate::command_handler::CommandHandler;
use crate::commands::{
    AckEvent, DispatchPulse, Heartbeat, ReconcileEvents, ReportFailure, RetryEvent,
    StartProcessing, SubmitEvent,
};
use crate::context::AppContext;
use crate::dto::{
    CatalogDto, DispatchResultDto, EventDto, EventListDto, ReconcileResultDto, StatsDto,
    SubmitResultDto,
};
use crate::error::{AppError, AppResult};
use crate::inmemory_command_bus::InMemoryCommandBus;
use crate::inmemory_query_bus::InMemoryQueryBus;
use crate::queries::{GetCatalog, GetEvent, GetStats, ListEvents};
use crate::query_handler::QueryHandler;

/// 以 `EventBus` 为后端的全部处理器
#[derive(Clone)]
pub struct EventBusHandlers {
    bus: Arc<EventBus>,
}

impl EventBusHandlers {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// 把全部命令与查询注册到进程内总线
    pub fn register_all(
        self: Arc<Self>,
        commands: &InMemoryCommandBus,
        queries: &InMemoryQueryBus,
    ) -> AppResult<()> {
        commands.register::<SubmitEvent, _>(self.clone())?;
        commands.register::<RetryEvent, _>(self.clone())?;
        commands.register::<AckEvent, _>(self.clone())?;
        commands.register::<StartProcessing, _>(self.clone())?;
        commands.register::<Heartbeat, _>(self.clone())?;
        commands.register::<ReportFailure, _>(self.clone())?;
        commands.register::<DispatchPulse, _>(self.clone())?;
        commands.register::<ReconcileEvents, _>(self.clone())?;

        queries.register::<ListEvents, _>(self.clone())?;
        queries.register::<GetEvent, _>(self.clone())?;
        queries.register::<GetStats, _>(self.clone())?;
        queries.register::<GetCatalog, _>(self)?;
        Ok(())
    }

    async fn blocking<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&EventBus) -> DomainResult<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(&self.bus, f).await
    }
}

/// 在阻塞线程池上执行一次门面调用，并沿用当前 span
pub(crate) async fn run_blocking<T, F>(bus: &Arc<EventBus>, f: F) -> AppResult<T>
where
    F: FnOnce(&EventBus) -> DomainResult<T> + Send + 'static,
    T: Send + 'static,
{
    let bus = bus.clone();
    let span = Span::current();
    let out = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        f(&bus)
    })
    .await??;
    Ok(out)
}

#[async_trait]
impl CommandHandler<SubmitEvent> for EventBusHandlers {
    #[instrument(name = "submit_event", skip_all, fields(correlation_id = ctx.correlation_id.as_deref()))]
    async fn handle(&self, ctx: &AppContext, cmd: SubmitEvent) -> Result<SubmitResultDto, AppError> {
        let dedupe_key = cmd.dedupe_key.or_else(|| ctx.idempotency_key.clone());
        let req = facade::SubmitEvent::builder()
            .project_id(cmd.project_id)
            .domain(cmd.domain)
            .event_type(cmd.event_type)
            .maybe_priority(cmd.priority)
            .payload(cmd.payload)
            .maybe_dedupe_key(dedupe_key)
            .maybe_max_attempts(cmd.max_attempts)
            .meta(cmd.meta)
            .maybe_agent_id(cmd.agent_id)
            .build();
        let record = self.blocking(move |bus| bus.submit(req)).await?;
        Ok(record.into())
    }
}

#[async_trait]
impl CommandHandler<RetryEvent> for EventBusHandlers {
    #[instrument(name = "retry_event", skip_all, fields(correlation_id = ctx.correlation_id.as_deref()))]
    async fn handle(&self, ctx: &AppContext, cmd: RetryEvent) -> Result<EventDto, AppError> {
        let record = self
            .blocking(move |bus| bus.retry(&cmd.project_id, &cmd.event_id))
            .await?;
        Ok(record.into())
    }
}

#[async_trait]
impl CommandHandler<AckEvent> for EventBusHandlers {
    #[instrument(name = "ack_event", skip_all, fields(correlation_id = ctx.correlation_id.as_deref()))]
    async fn handle(&self, ctx: &AppContext, cmd: AckEvent) -> Result<EventDto, AppError> {
        let record = self
            .blocking(move |bus| bus.ack(&cmd.project_id, &cmd.event_id))
            .await?;
        Ok(record.into())
    }
}

#[async_trait]
impl CommandHandler<StartProcessing> for EventBusHandlers {
    #[instrument(name = "start_processing", skip_all, fields(correlation_id = ctx.correlation_id.as_deref()))]
    async fn handle(&self, ctx: &AppContext, cmd: StartProcessing) -> Result<EventDto, AppError> {
        let record = self
            .blocking(move |bus| bus.start_processing(&cmd.project_id, &cmd.event_id))
            .await?;
        Ok(record.into())
    }
}

#[async_trait]
impl CommandHandler<Heartbeat> for EventBusHandlers {
    async fn handle(&self, _ctx: &AppContext, cmd: Heartbeat) -> Result<EventDto, AppError> {
        let record = self
            .blocking(move |bus| bus.heartbeat(&cmd.project_id, &cmd.event_id))
            .await?;
        Ok(record.into())
    }
}

#[async_trait]
impl CommandHandler<ReportFailure> for EventBusHandlers {
    #[instrument(name = "report_failure", skip_all, fields(correlation_id = ctx.correlation_id.as_deref()))]
    async fn handle(&self, ctx: &AppContext, cmd: ReportFailure) -> Result<EventDto, AppError> {
        let record = self
            .blocking(move |bus| {
                bus.report_failure(
                    &cmd.project_id,
                    &cmd.event_id,
                    &cmd.error_code,
                    &cmd.error_message,
                )
            })
            .await?;
        Ok(record.into())
    }
}

#[async_trait]
impl CommandHandler<DispatchPulse> for EventBusHandlers {
    #[instrument(name = "dispatch_pulse", skip_all, fields(correlation_id = ctx.correlation_id.as_deref()))]
    async fn handle(
        &self,
        ctx: &AppContext,
        cmd: DispatchPulse,
    ) -> Result<DispatchResultDto, AppError> {
        let request = DispatchRequest::builder()
            .eligible_agents(cmd.agent_ids)
            .batch_size(cmd.batch_size)
            .maybe_domain(cmd.domain)
            .build();
        let assignment = self
            .blocking(move |bus| bus.dispatch(&cmd.project_id, &request))
            .await?;
        Ok(assignment.into())
    }
}

#[async_trait]
impl CommandHandler<ReconcileEvents> for EventBusHandlers {
    #[instrument(name = "reconcile_events", skip_all, fields(correlation_id = ctx.correlation_id.as_deref()))]
    async fn handle(
        &self,
        ctx: &AppContext,
        cmd: ReconcileEvents,
    ) -> Result<ReconcileResultDto, AppError> {
        let timeout = Duration::from_secs(cmd.timeout_sec);
        let report = self
            .blocking(move |bus| bus.reconcile(&cmd.project_id, timeout))
            .await?;
        Ok(report.into())
    }
}

#[async_trait]
impl QueryHandler<ListEvents> for EventBusHandlers {
    async fn handle(&self, _ctx: &AppContext, q: ListEvents) -> Result<EventListDto, AppError> {
        let filter = ListFilter::builder()
            .maybe_domain(q.domain)
            .maybe_event_type(q.event_type)
            .maybe_state(q.state)
            .maybe_agent_id(q.agent_id)
            .limit(q.limit)
            .build();
        let rows = self
            .blocking(move |bus| bus.list(&q.project_id, &filter))
            .await?;
        Ok(rows.into())
    }
}

#[async_trait]
impl QueryHandler<GetEvent> for EventBusHandlers {
    async fn handle(&self, _ctx: &AppContext, q: GetEvent) -> Result<EventDto, AppError> {
        let record = self
            .blocking(move |bus| bus.get(&q.project_id, &q.event_id))
            .await?;
        Ok(record.into())
    }
}

#[async_trait]
impl QueryHandler<GetStats> for EventBusHandlers {
    async fn handle(&self, _ctx: &AppContext, q: GetStats) -> Result<StatsDto, AppError> {
        let stats = self.blocking(move |bus| bus.stats(&q.project_id)).await?;
        Ok(stats.into())
    }
}

#[async_trait]
impl QueryHandler<GetCatalog> for EventBusHandlers {
    async fn handle(&self, _ctx: &AppContext, q: GetCatalog) -> Result<CatalogDto, AppError> {
        let project_id = q.project_id.clone();
        let items = self
            .blocking(move |bus| bus.catalog(&q.project_id))
            .await?;
        Ok(CatalogDto { project_id, items })
    }
}
