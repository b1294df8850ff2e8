//! Pure selection and aggregation over a sample snapshot. Matching is exact:
//! no trimming and no case folding.

use std::collections::BTreeSet;

use gst_contracts::{ChartData, TrackedSample};

/// Distinct non-empty faculty sponsors, ascending.
pub fn unique_sponsors(samples: &[TrackedSample]) -> Vec<String> {
    samples
        .iter()
        .map(|s| s.faculty_sponsor.as_str())
        .filter(|sponsor| !sponsor.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Distinct non-empty study names run under `sponsor`, ascending.
pub fn studies_for_sponsor(samples: &[TrackedSample], sponsor: &str) -> Vec<String> {
    samples
        .iter()
        .filter(|s| s.faculty_sponsor == sponsor)
        .map(|s| s.study_name.as_str())
        .filter(|study| !study.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Samples for `sponsor`, narrowed to `study` when one is given.
///
/// An empty `sponsor` selects everything and ignores `study`. Source order is
/// kept.
pub fn filter_samples(samples: &[TrackedSample], sponsor: &str, study: &str) -> Vec<TrackedSample> {
    if sponsor.is_empty() {
        return samples.to_vec();
    }

    samples
        .iter()
        .filter(|s| s.faculty_sponsor == sponsor)
        .filter(|s| study.is_empty() || s.study_name == study)
        .cloned()
        .collect()
}

pub fn chart_series(samples: &[TrackedSample]) -> ChartData {
    let mut chart = ChartData {
        labels: Vec::with_capacity(samples.len()),
        sample_ids: Vec::with_capacity(samples.len()),
        library_time: Vec::with_capacity(samples.len()),
        sequencing_time: Vec::with_capacity(samples.len()),
    };

    for sample in samples {
        chart.labels.push(sample.sanger_sample_id.clone());
        chart.sample_ids.push(sample.sanger_sample_id.clone());
        chart.library_time.push(sample.library_time.unwrap_or(0));
        chart.sequencing_time.push(sample.sequencing_time.unwrap_or(0));
    }

    chart
}
