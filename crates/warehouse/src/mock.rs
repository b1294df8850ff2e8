use std::path::PathBuf;

use async_trait::async_trait;
use gst_contracts::{ProviderError, SampleCollection, SampleProvider};

use crate::tsv;

/// Serves samples from a TSV file in the export layout.
///
/// The file is re-read on every `execute`, so edits show up on the next
/// cache refresh.
#[derive(Debug, Clone)]
pub struct TsvFileProvider {
    path: PathBuf,
}

impl TsvFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SampleProvider for TsvFileProvider {
    async fn execute(&self) -> Result<SampleCollection, ProviderError> {
        let contents =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| ProviderError::Io {
                    path: self.path.clone(),
                    source,
                })?;

        let collection = tsv::read_tsv(&contents)?;
        tracing::debug!(
            path = %self.path.display(),
            rows = collection.len(),
            "mock.read"
        );
        Ok(collection)
    }
}
