use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Builds the level filter. Without `debug` the level is pinned to `info`
/// and `RUST_LOG` is ignored.
pub fn env_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    }
}

/// Installs the global subscriber, writing to `log_file` when given and to
/// stdout otherwise. Returns false if a subscriber was already installed.
pub fn init(debug: bool, log_file: Option<PathBuf>) -> bool {
    let filter = env_filter(debug);

    let file_target = log_file.and_then(|path| {
        let name = path.file_name()?.to_owned();
        let dir = path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Some((dir, name))
    });

    match file_target {
        Some((dir, name)) => {
            let appender = tracing_appender::rolling::never(dir, name);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(appender)
                .try_init()
                .is_ok()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok(),
    }
}
