use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const MAX_TAIL_ENTRIES: usize = 250;

/// Stderr plus a plain-text file layer. Keep the guard alive for the
/// lifetime of the process or buffered file lines are lost.
pub fn init(log_file: &Path) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let stderr = fmt::layer().with_writer(std::io::stderr).with_filter(filter());

    let dir = log_file.parent().filter(|d| !d.as_os_str().is_empty());
    let file_name = log_file.file_name();
    let created = dir.map_or(Ok(()), std::fs::create_dir_all);

    match (file_name, created) {
        (Some(name), Ok(())) => {
            let appender =
                tracing_appender::rolling::never(dir.unwrap_or_else(|| Path::new(".")), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            let _ = tracing_subscriber::registry()
                .with(stderr)
                .with(file)
                .try_init();
            Some(guard)
        }
        _ => {
            let _ = tracing_subscriber::registry().with(stderr).try_init();
            None
        }
    }
}

/// Last `entries` non-empty lines of the log. `0` or anything above
/// [`MAX_TAIL_ENTRIES`] means the cap. A missing file is an empty tail.
pub fn tail_log(path: &Path, entries: usize) -> std::io::Result<Vec<String>> {
    let limit = if entries == 0 || entries > MAX_TAIL_ENTRIES {
        MAX_TAIL_ENTRIES
    } else {
        entries
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let lines: Vec<&str> = content.lines().filter(|l| !l.is_empty()).collect();
    let start = lines.len().saturating_sub(limit);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}
