use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Where `--trace-json` writes: `STRIKECAM_TRACE_LOG` or the temp dir.
pub fn tracing_log_path() -> PathBuf {
    env::var("STRIKECAM_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("strikecam_trace.jsonl"))
}

/// Install the global subscriber once. Later calls are no-ops.
pub fn init_tracing(config: &AppConfig) {
    if config.no_logs {
        return;
    }
    let level = config.log_level.as_tracing();
    let json = config.trace_json;

    let _ = TRACING_INIT.get_or_init(|| {
        if json {
            let path = tracing_log_path();
            let file = match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => file,
                Err(err) => {
                    eprintln!("failed to open trace log {}: {err}", path.display());
                    return;
                }
            };
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_max_level(level)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(file)
                .with_thread_names(true)
                .with_current_span(false)
                .with_span_list(false)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        } else {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(io::stderr)
                .with_target(false)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    });
}
