use std::path::PathBuf;

use async_trait::async_trait;

use crate::SampleCollection;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A source that can produce the full sample collection on demand.
///
/// Every call is an independent full fetch. Implementations may take minutes
/// against a live warehouse and may fail transiently.
#[async_trait]
pub trait SampleProvider: Send + Sync {
    async fn execute(&self) -> Result<SampleCollection, ProviderError>;
}

#[derive(Debug)]
pub enum ProviderError {
    Timeout,
    Connect(BoxError),
    Query(BoxError),
    Decode { row: usize, source: BoxError },
    Io { path: PathBuf, source: std::io::Error },
    Malformed(String),
}

impl ProviderError {
    pub fn connect(err: impl Into<BoxError>) -> Self {
        ProviderError::Connect(err.into())
    }

    pub fn query(err: impl Into<BoxError>) -> Self {
        ProviderError::Query(err.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ProviderError::Malformed(message.into())
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Timeout => "timeout",
            ProviderError::Connect(_) => "connect",
            ProviderError::Query(_) => "query",
            ProviderError::Decode { .. } => "decode",
            ProviderError::Io { .. } => "io",
            ProviderError::Malformed(_) => "malformed",
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Timeout => write!(f, "sample source timed out"),
            ProviderError::Connect(err) => write!(f, "database connection error: {}", err),
            ProviderError::Query(err) => write!(f, "query execution error: {}", err),
            ProviderError::Decode { row, source } => {
                write!(f, "error decoding row {}: {}", row, source)
            }
            ProviderError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ProviderError::Malformed(message) => write!(f, "malformed sample data: {}", message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Connect(err) | ProviderError::Query(err) => Some(&**err),
            ProviderError::Decode { source, .. } => Some(&**source),
            ProviderError::Io { source, .. } => Some(source),
            ProviderError::Timeout | ProviderError::Malformed(_) => None,
        }
    }
}
