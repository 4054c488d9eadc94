/// 应用层命令（Command）
///
/// 表达“意图”的写操作请求，会修改事件账本。
/// - 与 [`Query`](crate::query::Query) 相对，`Command` 不承担列表类读取；
/// - 总线上的写操作都会返回受影响记录的最新视图，因此命令带有 `Output`；
/// - 命名保持“动宾结构”，如 `SubmitEvent`、`AckEvent`。
///
/// 关联常量：
/// - `NAME`：命令的稳定名称，用于日志、追踪与路由。避免依赖 `type_name::<T>()`。
pub trait Command: Send + Sync + 'static {
    /// 命令的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;

    /// 执行结果
    type Output: Send + 'static;
}
