// 日志初始化
//
// RUST_LOG 优先, 否则使用命令行给出的级别

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 命令行 -v 次数对应的日志级别
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// 安装控制台日志; 重复调用时忽略
pub fn init(verbosity: u8) {
    // 窗口库只记录警告
    let filter_string = format!("{},miniquad=warn", level_for(verbosity));
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_string));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}
