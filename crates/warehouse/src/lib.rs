use std::path::PathBuf;
use std::sync::Arc;

use gst_contracts::SampleProvider;
use gst_contracts::settings::{self, ConfigError, Settings};

mod mock;
mod mysql;
pub mod tsv;

pub use mock::TsvFileProvider;
pub use mysql::{MySqlProvider, MySqlSettings};

pub const MOCK_DATA_PATH_KEY: &str = "GST_MOCK_DATA_PATH";

/// Which source backs a provider.
#[derive(Debug, Clone)]
pub enum ProviderOptions {
    MockData(PathBuf),
    MySql(MySqlSettings),
}

impl ProviderOptions {
    /// Mock data when `GST_MOCK_DATA_PATH` is set, otherwise the warehouse.
    pub fn from_kv(kv: &Settings) -> Result<Self, ConfigError> {
        match settings::optional_nonempty(kv, MOCK_DATA_PATH_KEY) {
            Some(path) => Ok(ProviderOptions::MockData(PathBuf::from(path))),
            None => Ok(ProviderOptions::MySql(MySqlSettings::from_kv(kv)?)),
        }
    }
}

/// Builds the provider for `options`.
///
/// A mock data file must exist now, but it is only opened on `execute`.
pub fn new_provider(options: ProviderOptions) -> Result<Arc<dyn SampleProvider>, ConfigError> {
    match options {
        ProviderOptions::MockData(path) => {
            if path.as_os_str().is_empty() {
                return Err(ConfigError {
                    code: "ERR_MISSING_CONFIG",
                    message: "mock data path not provided".to_string(),
                });
            }
            std::fs::metadata(&path).map_err(|err| ConfigError {
                code: "ERR_INVALID_CONFIG",
                message: format!("mock data file error: {}: {}", path.display(), err),
            })?;
            Ok(Arc::new(TsvFileProvider::new(path)))
        }
        ProviderOptions::MySql(settings) => Ok(Arc::new(MySqlProvider::new(settings))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn mock_path_takes_precedence_over_warehouse_settings() {
        let kv = HashMap::from([(MOCK_DATA_PATH_KEY.to_string(), "samples.tsv".to_string())]);
        let options = ProviderOptions::from_kv(&kv).expect("options should resolve");
        assert!(matches!(options, ProviderOptions::MockData(path) if path == PathBuf::from("samples.tsv")));
    }

    #[test]
    fn warehouse_settings_are_required_without_mock_path() {
        let err = ProviderOptions::from_kv(&HashMap::new()).unwrap_err();
        assert_eq!(err.code, "ERR_MISSING_CONFIG");
    }

    #[test]
    fn empty_mock_path_is_rejected() {
        let err = new_provider(ProviderOptions::MockData(PathBuf::new()))
            .err()
            .expect("empty path should fail");
        assert_eq!(err.message, "mock data path not provided");
    }

    #[test]
    fn missing_mock_file_is_rejected_at_construction() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = new_provider(ProviderOptions::MockData(dir.path().join("absent.tsv")))
            .err()
            .expect("missing file should fail");
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }
}
