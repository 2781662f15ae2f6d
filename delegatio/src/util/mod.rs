use std::path::Path;

use crate::constants::{dirs, filenames};
use delegatio_shared::{DelegatioError, DelegatioResult};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize tracing for an orchestrator rooted at `home_dir`.
///
/// Logs go to `{home_dir}/logs/delegatio.log` with daily rotation and to
/// stderr. The returned guard must stay alive to flush the file writer.
/// Honors `RUST_LOG`, defaulting to `info`.
pub fn init_logging_for(home_dir: &Path) -> DelegatioResult<WorkerGuard> {
    let logs_dir = home_dir.join(dirs::LOGS_DIR);
    std::fs::create_dir_all(&logs_dir).map_err(|e| {
        DelegatioError::Storage(format!(
            "Failed to create logs directory {}: {}",
            logs_dir.display(),
            e
        ))
    })?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, filenames::LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    register_to_tracing(non_blocking, env_filter);

    Ok(guard)
}

/// Install the global subscriber. A second call is a no-op.
pub fn register_to_tracing(non_blocking: NonBlocking, env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(false),
        )
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = init_logging_for(dir.path()).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}
