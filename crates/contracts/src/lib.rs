use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod provider;
pub mod settings;

pub use provider::{ProviderError, SampleProvider};

/// One row of the sample-tracking query.
///
/// Milestone timestamps and the two turnaround durations are independently
/// optional: a duration may be present while one of its endpoints is not,
/// because the warehouse computes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSample {
    pub study_id: String,
    pub study_name: String,
    pub faculty_sponsor: String,
    pub programme: String,
    pub sanger_sample_id: String,
    pub supplier_name: String,
    pub manifest_created: Option<DateTime<Utc>>,
    pub manifest_uploaded: Option<DateTime<Utc>>,
    pub labware_received: Option<DateTime<Utc>>,
    /// "Plate/Tube" barcode.
    pub labware_human_barcode: String,
    pub order_made: Option<DateTime<Utc>>,
    pub library_start: Option<DateTime<Utc>>,
    pub library_complete: Option<DateTime<Utc>>,
    /// Days from library start to library complete.
    pub library_time: Option<i64>,
    pub run_id: String,
    pub platform: String,
    pub pipeline: String,
    pub sequencing_run_start: Option<DateTime<Utc>>,
    pub sequencing_qc_complete: Option<DateTime<Utc>>,
    /// Days from sequencing run start to sequencing QC complete.
    pub sequencing_time: Option<i64>,
    pub qc_pass: String,
}

/// Records in the order the source produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCollection {
    pub samples: Vec<TrackedSample>,
}

impl SampleCollection {
    pub fn new(samples: Vec<TrackedSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl From<Vec<TrackedSample>> for SampleCollection {
    fn from(samples: Vec<TrackedSample>) -> Self {
        Self::new(samples)
    }
}

/// Parallel series consumed by the dashboard chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub labels: Vec<String>,
    pub sample_ids: Vec<String>,
    pub library_time: Vec<i64>,
    pub sequencing_time: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorsResponse {
    pub faculty_sponsors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudiesResponse {
    pub studies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplesResponse {
    pub has_data: bool,
    pub samples: Vec<TrackedSample>,
}
