use thiserror::Error;

/// Backend failures. Always fatal to a run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("creating database directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unreadable timestamp {0:?} in store")]
    BadTimestamp(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("loading configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("unknown category {category:?} for source {source_name:?}")]
    UnknownCategory {
        source_name: String,
        category: String,
    },
    #[error("source with empty name in configuration")]
    EmptySourceName,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("reading import rows: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Row { line: usize, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ScoutError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("building http client: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T, E = ScoutError> = std::result::Result<T, E>;
