//! 周期超时回收（ReconcileWorker）
//!
//! 总线本身不持有任何后台线程；需要定期回收的宿主程序自行启动本任务，
//! 按固定间隔对配置中的每个项目调用一次 `reconcile`。
//! 返回的 `WorkerHandle` 负责关闭与等待。
//!
use bon::Builder;
use pulse_domain::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::handlers::run_blocking;

/// 回收间隔下限；更短的配置按此处理
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Builder)]
pub struct ReconcileWorkerConfig {
    /// 需要回收的项目
    #[builder(default)]
    pub projects: Vec<String>,
    /// 两次回收的间隔
    #[builder(default = Duration::from_secs(30))]
    pub interval: Duration,
    /// 在途记录无活动超过该时长即回收
    #[builder(default = Duration::from_secs(60))]
    pub timeout: Duration,
}

impl Default for ReconcileWorkerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

pub struct ReconcileWorker {
    bus: Arc<EventBus>,
    config: ReconcileWorkerConfig,
}

impl ReconcileWorker {
    pub fn new(bus: Arc<EventBus>, config: ReconcileWorkerConfig) -> Self {
        Self { bus, config }
    }

    /// 启动周期任务，返回可用于关闭/等待的句柄
    pub fn start(self) -> WorkerHandle {
        let token = CancellationToken::new();
        let bus = self.bus;
        let config = Arc::new(self.config);

        let task = Self::spawn_periodic(token.clone(), config.interval, move || {
            let bus = bus.clone();
            let config = config.clone();
            async move { Self::sweep(&bus, &config).await }
        });

        WorkerHandle {
            token,
            tasks: vec![task],
        }
    }

    /// 对全部项目执行一轮回收；单个项目失败只告警，不影响其余项目
    pub async fn sweep(bus: &Arc<EventBus>, config: &ReconcileWorkerConfig) {
        for project_id in &config.projects {
            let pid = project_id.clone();
            let timeout = config.timeout;
            match run_blocking(bus, move |bus| bus.reconcile(&pid, timeout)).await {
                Ok(report) if report.total() > 0 => {
                    info!(
                        project_id = %project_id,
                        recovered = report.recovered_count,
                        dead = report.dead_count,
                        "periodic reconcile recovered events"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(project_id = %project_id, error = %err, "periodic reconcile failed");
                }
            }
        }
    }

    fn spawn_periodic<F, Fut>(
        token: CancellationToken,
        interval: Duration,
        mut f: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval.max(MIN_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => f().await,
                }
            }
        })
    }
}

/// 任务运行句柄：用于优雅关闭与等待任务结束
pub struct WorkerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
