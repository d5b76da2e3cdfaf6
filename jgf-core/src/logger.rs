use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::time, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化运行时的日志/追踪（tracing）订阅者。
///
/// - 默认会读取环境变量（由 `tracing_subscriber::EnvFilter` 支持），用于覆盖/追加过滤规则。
/// - Debug 构建下 `jgf-core` 输出到 debug 级别；Release 构建下只保留 info 及以上。
///
/// 注意：该函数应在应用启动早期调用一次；重复初始化会返回错误。
pub fn init() -> anyhow::Result<()> {
    init_with_directives(&[])
}

/// 同 [`init`]，并追加应用自己的过滤规则（例如 `"my-game=debug"`）。
pub fn init_with_directives(directives: &[&str]) -> anyhow::Result<()> {
    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_timer(time::uptime()),
        )
        .with(filter(directives)?)
        .try_init()?;
    Ok(())
}

fn filter(directives: &[&str]) -> anyhow::Result<EnvFilter> {
    let core_directive = if cfg!(debug_assertions) {
        "jgf-core=debug"
    } else {
        "jgf-core=info"
    };

    let mut filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?
        .add_directive(core_directive.parse()?);
    for directive in directives {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}
