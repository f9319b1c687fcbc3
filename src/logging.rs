use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogConfig;

/// `logs/presence_<YYYYmmdd_HHMMSS>.log`
pub fn log_file_name() -> String {
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("presence_{}.log", ts)
}

/// tracing を初期化する
///
/// 戻り値の guard は main が終わるまで保持すること。落とすとファイル書き込みが止まる。
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    // RUST_LOG があればそちらを優先
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level: {}", config.level))?;

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let (file_layer, guard) = if config.file {
        let dir = Path::new(&config.dir);
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let name = log_file_name();
        let appender = tracing_appender::rolling::never(dir, &name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        eprintln!("Log: {}", dir.join(&name).display());

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("tracing subscriber already installed")?;

    Ok(guard)
}
