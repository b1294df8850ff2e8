use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use gst_contracts::settings::{self, ConfigError, Settings};
use gst_contracts::{ProviderError, SampleCollection, SampleProvider, TrackedSample};
use sqlx::Row;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};

const TRACKED_SAMPLES_SQL: &str = include_str!("../sql/tracked_samples.sql");
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Warehouse connection settings (`GST_AUTOMATION_SQL_*`).
#[derive(Clone)]
pub struct MySqlSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl std::fmt::Debug for MySqlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSettings")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

impl MySqlSettings {
    pub fn from_kv(kv: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            user: settings::require_nonempty(kv, "GST_AUTOMATION_SQL_USER")?,
            password: kv
                .get("GST_AUTOMATION_SQL_PASS")
                .cloned()
                .unwrap_or_default(),
            host: settings::require_nonempty(kv, "GST_AUTOMATION_SQL_HOST")?,
            port: settings::parse_u16(kv, "GST_AUTOMATION_SQL_PORT", 3306)?,
            database: settings::require_nonempty(kv, "GST_AUTOMATION_SQL_DB")?,
        })
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Runs the tracked-samples query against the warehouse.
///
/// Each `execute` opens its own single-connection pool and closes it when the
/// rows are decoded; the query is infrequent and may run for minutes.
pub struct MySqlProvider {
    settings: MySqlSettings,
    connect_timeout: Duration,
}

impl MySqlProvider {
    pub fn new(settings: MySqlSettings) -> Self {
        Self {
            settings,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl SampleProvider for MySqlProvider {
    async fn execute(&self) -> Result<SampleCollection, ProviderError> {
        let started = Instant::now();

        let pool = tokio::time::timeout(
            self.connect_timeout,
            MySqlPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(self.connect_timeout)
                .connect_with(self.settings.connect_options()),
        )
        .await
        .map_err(|_| ProviderError::Timeout)?
        .map_err(ProviderError::connect)?;

        let rows = sqlx::query(TRACKED_SAMPLES_SQL).fetch_all(&pool).await;
        pool.close().await;
        let rows = rows.map_err(ProviderError::query)?;

        let samples = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| decode_row(idx + 1, row))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            host = %self.settings.host,
            database = %self.settings.database,
            rows = samples.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "warehouse.query"
        );

        Ok(SampleCollection::new(samples))
    }
}

fn decode_row(row_number: usize, row: &MySqlRow) -> Result<TrackedSample, ProviderError> {
    let decode = |source: sqlx::Error| ProviderError::Decode {
        row: row_number,
        source: Box::new(source),
    };
    let text = |idx: usize| {
        row.try_get::<Option<String>, _>(idx)
            .map(Option::unwrap_or_default)
            .map_err(decode)
    };
    let timestamp = |idx: usize| {
        row.try_get::<Option<NaiveDateTime>, _>(idx)
            .map(|t| t.map(|t| t.and_utc()))
            .map_err(decode)
    };
    let days = |idx: usize| row.try_get::<Option<i64>, _>(idx).map_err(decode);

    Ok(TrackedSample {
        study_id: text(0)?,
        study_name: text(1)?,
        faculty_sponsor: text(2)?,
        programme: text(3)?,
        sanger_sample_id: text(4)?,
        supplier_name: text(5)?,
        manifest_created: timestamp(6)?,
        manifest_uploaded: timestamp(7)?,
        labware_received: timestamp(8)?,
        labware_human_barcode: text(9)?,
        order_made: timestamp(10)?,
        library_start: timestamp(11)?,
        library_complete: timestamp(12)?,
        library_time: days(13)?,
        run_id: text(14)?,
        platform: text(15)?,
        pipeline: text(16)?,
        sequencing_run_start: timestamp(17)?,
        sequencing_qc_complete: timestamp(18)?,
        sequencing_time: days(19)?,
        qc_pass: text(20)?,
    })
}
