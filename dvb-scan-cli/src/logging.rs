//! Structured logging: console output always on, optional daily-rotated
//! file output under a log directory.

use chrono::Local;
use std::io;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the global tracing subscriber. `log_dir` is optional; when
/// given, a second layer writes non-ANSI, file/line-annotated logs there
/// with daily rotation.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let console_layer = fmt::layer()
        .with_writer(io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(LocalTimeTimer);

    let registry = tracing_subscriber::registry().with(env_filter).with(console_layer);

    if let Some(log_dir) = log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "dvb-scan.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leaked so the writer outlives the subscriber for the process lifetime.
        Box::leak(Box::new(guard));

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_timer(LocalTimeTimer);

        registry.with(file_layer).try_init()?;
    } else {
        registry.try_init()?;
    }

    tracing_log::LogTracer::init()?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct LocalTimeTimer;

impl fmt::time::FormatTime for LocalTimeTimer {
    fn format_time(&self, w: &mut fmt::format::Writer) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}
