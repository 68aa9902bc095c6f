// src/audit/range.rs
// =============================================================================
// This module audits one row range of the source URL list.
//
// How it works:
// 1. Validate the range configuration up front - a bad range must fail
//    before any file or network I/O happens
// 2. Stream the source CSV once, keeping the URL column
// 3. Select exactly the rows whose 1-based data-row index (header excluded)
//    falls inside [first_row, last_row]
// 4. Sweep that subset with the bounded-concurrency checker
// 5. Write every non-200 outcome to the range's own output CSV
//    (columns: URL, Status, Error - exactly one of the last two filled)
// 6. Hand the 404 / non-404 counts back to the caller
//
// Row numbering is the part everyone gets wrong: rows are 1-based over DATA
// rows only. Row 1 is the first URL, never the header.
//
// Rust concepts:
// - csv + serde: AuditOutcome serializes straight into the output columns
// - Slices: range selection is a pure function over the loaded list,
//   which is what makes the off-by-one property testable
// =============================================================================

use anyhow::{bail, Context, Result};
use log::info;
use reqwest::Client;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::checker::{check_url, sweep_with, AuditOutcome, AuditSummary, CheckOutcome, SweepConfig};

// One audit assignment: an inclusive 1-based row range plus where the
// non-200 outcomes for it should land
#[derive(Debug, Clone)]
pub struct AuditRange {
    pub first_row: usize,
    pub last_row: usize,
    pub output_csv: PathBuf,
}

impl AuditRange {
    // Configuration errors surface here, synchronously, before any I/O
    pub fn validate(&self) -> Result<()> {
        if self.output_csv.as_os_str().is_empty() {
            bail!("range is missing an output CSV path");
        }
        if self.first_row == 0 {
            bail!("first row must be at least 1 (rows are 1-based, header excluded)");
        }
        if self.last_row == 0 {
            bail!("last row must be at least 1 (rows are 1-based, header excluded)");
        }
        if self.first_row > self.last_row {
            bail!(
                "first row {} is past last row {}",
                self.first_row,
                self.last_row
            );
        }
        Ok(())
    }
}

// Audits one range against the live network
pub async fn audit_range(
    client: &Client,
    source_csv: &Path,
    has_header: bool,
    range: &AuditRange,
    config: &SweepConfig,
) -> Result<AuditSummary> {
    audit_range_with(source_csv, has_header, range, config, |url| {
        let client = client.clone();
        async move { check_url(&client, &url).await }
    })
    .await
}

// The range audit, generic over the checker so tests can script outcomes
pub async fn audit_range_with<F, Fut>(
    source_csv: &Path,
    has_header: bool,
    range: &AuditRange,
    config: &SweepConfig,
    checker: F,
) -> Result<AuditSummary>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = CheckOutcome>,
{
    // Fail fast on bad configuration, before touching anything
    range.validate()?;

    let urls = read_url_column(source_csv, has_header)?;
    let subset = select_range(&urls, range.first_row, range.last_row).to_vec();

    info!(
        "auditing rows {}-{} of {} ({} URLs)",
        range.first_row,
        range.last_row,
        source_csv.display(),
        subset.len()
    );

    let result = sweep_with(subset, config, checker).await;
    write_outcomes(&range.output_csv, &result.outcomes)?;

    info!(
        "rows {}-{}: {} 404s, {} other errors",
        range.first_row, range.last_row, result.summary.count_404, result.summary.non_404_errors
    );
    Ok(result.summary)
}

// Loads the URL column (the first field of every data row)
pub fn read_url_column(path: &Path, has_header: bool) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("cannot read source URL list {}", path.display()))?;

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("bad row in {}", path.display()))?;
        if let Some(url) = record.get(0) {
            let url = url.trim();
            if !url.is_empty() {
                urls.push(url.to_string());
            }
        }
    }
    Ok(urls)
}

// Selects the 1-based inclusive row range, clamped to the list length
//
// Guarantees: for an in-bounds range the slice holds exactly
// last_row - first_row + 1 URLs.
pub fn select_range(urls: &[String], first_row: usize, last_row: usize) -> &[String] {
    let start = first_row.saturating_sub(1).min(urls.len());
    let end = last_row.min(urls.len());
    &urls[start..end.max(start)]
}

// Writes the non-200 outcomes to the range's output CSV
//
// An empty sweep still writes the file (with just the header row) so a
// clean range is distinguishable from a range that never ran.
pub fn write_outcomes(path: &Path, outcomes: &[AuditOutcome]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("cannot write outcome CSV {}", path.display()))?;
    // Written by hand so an empty sweep still gets the header row
    writer.write_record(["URL", "Status", "Error"])?;
    for outcome in outcomes {
        writer.serialize(outcome)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn urls(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("https://example.com/{}", i)).collect()
    }

    #[test]
    fn test_select_range_examines_exactly_the_inclusive_span() {
        let list = urls(100);
        // the off-by-one everyone writes: forgetting rows are 1-based
        assert_eq!(select_range(&list, 1, 10).len(), 10);
        assert_eq!(select_range(&list, 11, 20).len(), 10);
        assert_eq!(select_range(&list, 1, 10)[0], "https://example.com/1");
        assert_eq!(select_range(&list, 11, 20)[0], "https://example.com/11");
        assert_eq!(select_range(&list, 100, 100).len(), 1);
    }

    #[test]
    fn test_select_range_clamps_past_the_end() {
        let list = urls(5);
        assert_eq!(select_range(&list, 4, 50).len(), 2);
        assert_eq!(select_range(&list, 10, 20).len(), 0);
    }

    #[test]
    fn test_validate_rejects_zero_rows_and_missing_output() {
        let bad = AuditRange {
            first_row: 0,
            last_row: 10,
            output_csv: PathBuf::from("out.csv"),
        };
        assert!(bad.validate().is_err());

        let bad = AuditRange {
            first_row: 1,
            last_row: 0,
            output_csv: PathBuf::from("out.csv"),
        };
        assert!(bad.validate().is_err());

        let bad = AuditRange {
            first_row: 5,
            last_row: 2,
            output_csv: PathBuf::from("out.csv"),
        };
        assert!(bad.validate().is_err());

        let bad = AuditRange {
            first_row: 1,
            last_row: 2,
            output_csv: PathBuf::new(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_read_url_column_skips_header_and_blank_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "URL,Notes").unwrap();
        writeln!(file, "https://example.com/1,first").unwrap();
        writeln!(file, "https://example.com/2,").unwrap();
        file.flush().unwrap();

        let urls = read_url_column(file.path(), true).unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0], "https://example.com/1");
    }

    #[test]
    fn test_read_url_column_without_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://example.com/1").unwrap();
        writeln!(file, "https://example.com/2").unwrap();
        file.flush().unwrap();

        let urls = read_url_column(file.path(), false).unwrap();
        assert_eq!(urls.len(), 2);
    }

    #[tokio::test]
    async fn test_audit_range_records_only_non_200_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("urls.csv");
        let mut body = String::from("URL\n");
        for i in 1..=10 {
            body.push_str(&format!("https://example.com/{}\n", i));
        }
        std::fs::write(&source, body).unwrap();

        let range = AuditRange {
            first_row: 3,
            last_row: 7,
            output_csv: dir.path().join("out.csv"),
        };

        // Script: /4 is a 404, /6 is a 500, everything else is fine
        let summary = audit_range_with(
            &source,
            true,
            &range,
            &SweepConfig::default(),
            |url| async move {
                if url.ends_with("/4") {
                    CheckOutcome::HttpStatus(404)
                } else if url.ends_with("/6") {
                    CheckOutcome::HttpStatus(500)
                } else {
                    CheckOutcome::Ok200
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.count_404, 1);
        assert_eq!(summary.non_404_errors, 1);

        let written = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
        assert!(written.contains("https://example.com/4"));
        assert!(written.contains("https://example.com/6"));
        assert!(!written.contains("https://example.com/5"));
    }

    #[tokio::test]
    async fn test_config_error_fails_before_reading_anything() {
        let range = AuditRange {
            first_row: 0,
            last_row: 5,
            output_csv: PathBuf::from("out.csv"),
        };
        // The source path does not exist; validation must trip first
        let err = audit_range_with(
            Path::new("/no/such/source.csv"),
            true,
            &range,
            &SweepConfig::default(),
            |_| async move { CheckOutcome::Ok200 },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("first row"));
    }
}
