use bon::Builder;

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用（命令/查询）所需的横切信息：
/// - 关联追踪 `correlation_id`，写入处理器的 tracing span；
/// - 执行者 `actor_id`（Agent、运维人员或子系统名）；
/// - 幂等键 `idempotency_key`：提交事件时若命令本身未携带幂等键，则以此代替。
///
/// 典型用法：
/// ```rust
/// use pulse_application::context::AppContext;
///
/// let ctx = AppContext::builder()
///     .correlation_id("cor-123")
///     .actor_id("scheduler")
///     .idempotency_key("agentA-heartbeat")
///     .build();
/// assert_eq!(ctx.idempotency_key.as_deref(), Some("agentA-heartbeat"));
/// ```
#[derive(Clone, Debug, Default, Builder)]
pub struct AppContext {
    #[builder(into)]
    pub correlation_id: Option<String>,
    #[builder(into)]
    pub actor_id: Option<String>,
    /// 幂等键（可选）：为空则由命令自身决定是否参与去重
    #[builder(into)]
    pub idempotency_key: Option<String>,
}
