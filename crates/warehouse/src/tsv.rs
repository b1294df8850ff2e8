//! Tab-separated encoding of sample collections.
//!
//! The same layout is written by `gst export` and read back by the mock
//! provider, so an export can be served directly by the dashboard.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use csv::StringRecord;
use gst_contracts::{ProviderError, SampleCollection, TrackedSample};

pub const HEADER: [&str; COLUMN_COUNT] = [
    "StudyID",
    "StudyName",
    "FacultySponsor",
    "Programme",
    "SangerSampleID",
    "SupplierName",
    "ManifestCreated",
    "ManifestUploaded",
    "LabwareReceived",
    "Plate/Tube",
    "OrderMade",
    "LibraryStart",
    "LibraryComplete",
    "LibraryTime",
    "RunID",
    "Platform",
    "Pipeline",
    "SequencingRunStart",
    "SequencingQCComplete",
    "SequencingTime",
    "QCPass",
];

pub const COLUMN_COUNT: usize = 21;

pub fn write_tsv<W: Write>(collection: &SampleCollection, out: W) -> std::io::Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
    writer.write_record(HEADER)?;

    for sample in &collection.samples {
        let row = [
            sample.study_id.clone(),
            sample.study_name.clone(),
            sample.faculty_sponsor.clone(),
            sample.programme.clone(),
            sample.sanger_sample_id.clone(),
            sample.supplier_name.clone(),
            format_time(sample.manifest_created),
            format_time(sample.manifest_uploaded),
            format_time(sample.labware_received),
            sample.labware_human_barcode.clone(),
            format_time(sample.order_made),
            format_time(sample.library_start),
            format_time(sample.library_complete),
            format_int(sample.library_time),
            sample.run_id.clone(),
            sample.platform.clone(),
            sample.pipeline.clone(),
            format_time(sample.sequencing_run_start),
            format_time(sample.sequencing_qc_complete),
            format_int(sample.sequencing_time),
            sample.qc_pass.clone(),
        ];
        writer.write_record(&row)?;
    }

    writer.flush()
}

pub fn write_tsv_file(collection: &SampleCollection, path: &Path) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_tsv(collection, std::io::BufWriter::new(file))
}

fn format_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn format_int(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Parses a header line followed by at least one data row. Rows may carry
/// extra trailing columns; short rows are rejected with their data row number.
pub fn read_tsv(contents: &str) -> Result<SampleCollection, ProviderError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(contents.as_bytes());

    let mut samples = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| ProviderError::malformed(format!("invalid TSV data: {}", err)))?;
        if record.len() < COLUMN_COUNT {
            return Err(ProviderError::malformed(format!(
                "row {} has insufficient columns: expected {}, got {}",
                idx + 1,
                COLUMN_COUNT,
                record.len()
            )));
        }
        samples.push(record_to_sample(&record));
    }

    if samples.is_empty() {
        return Err(ProviderError::malformed(
            "mock data file should contain at least header and one data row",
        ));
    }
    Ok(SampleCollection::new(samples))
}

fn record_to_sample(record: &StringRecord) -> TrackedSample {
    TrackedSample {
        study_id: record[0].to_string(),
        study_name: record[1].to_string(),
        faculty_sponsor: record[2].to_string(),
        programme: record[3].to_string(),
        sanger_sample_id: record[4].to_string(),
        supplier_name: record[5].to_string(),
        manifest_created: parse_time(&record[6]),
        manifest_uploaded: parse_time(&record[7]),
        labware_received: parse_time(&record[8]),
        labware_human_barcode: record[9].to_string(),
        order_made: parse_time(&record[10]),
        library_start: parse_time(&record[11]),
        library_complete: parse_time(&record[12]),
        library_time: parse_int(&record[13]),
        run_id: record[14].to_string(),
        platform: record[15].to_string(),
        pipeline: record[16].to_string(),
        sequencing_run_start: parse_time(&record[17]),
        sequencing_qc_complete: parse_time(&record[18]),
        sequencing_time: parse_int(&record[19]),
        qc_pass: record[20].to_string(),
    }
}

// Unparsable values read as absent rather than failing the whole file.
fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_int(value: &str) -> Option<i64> {
    value.parse::<i64>().ok()
}
