//! Output of per-trip statistics.

use anyhow::Result;
use tracing::debug;

use crate::stats::TripStats;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Appends a [`TripStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, stats: &TripStats) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(stats)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_append_record_creates_file() {
        let path = temp_path("segment_pipeline_test_create.csv");
        let _ = fs::remove_file(&path);

        append_record(&path, &TripStats::new("trip")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("trip"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("segment_pipeline_test_header.csv");
        let _ = fs::remove_file(&path);

        append_record(&path, &TripStats::new("a")).unwrap();
        append_record(&path, &TripStats::from_error("b", "source", "down")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.iter().filter(|l| l.starts_with("timestamp")).count(), 1);
        assert!(lines[2].contains("down"));

        fs::remove_file(&path).unwrap();
    }
}
