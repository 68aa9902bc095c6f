// src/audit/batch.rs
// =============================================================================
// This module sweeps every pending range in the tracking store.
//
// The tracking store is a CSV with one row per range. The columns we need:
//   First Row, Last Row      - the range bounds (1-based, inclusive)
//   404s, Non-404 Errors     - the counts from the last successful audit
// plus whatever identifying columns the sheet carries (Jurisdiction and
// Category feed the output file names when present).
//
// The resumability contract:
// - A range is PENDING when either count cell is blank (empty/whitespace)
// - A successful audit fills both cells in memory
// - A failed audit logs the error and leaves the cells blank, so the range
//   is picked up again on the next run
// - One bad range never aborts the rest of the batch
// - After every range has been attempted, the WHOLE store (touched and
//   untouched rows alike, column order preserved) is written back through
//   a temp file + rename, so a crash mid-write cannot corrupt it
//
// Only two things are fatal: failing to read the store at the start and
// failing to write it back at the end.
//
// Rust concepts:
// - csv::StringRecord: rows stay as loosely-typed records because we must
//   round-trip columns we do not understand
// - Generic auditor parameter: tests drive the orchestration loop with a
//   scripted auditor instead of the network
// =============================================================================

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use reqwest::Client;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::checker::{AuditSummary, SweepConfig};

use super::range::{audit_range, AuditRange};

// Everything one batch run needs to know
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// The master URL list
    pub source_csv: PathBuf,
    /// The range tracking store
    pub ranges_csv: PathBuf,
    /// Directory that receives one outcome CSV per range
    pub output_dir: PathBuf,
    /// Whether the source list has a header row
    pub has_header: bool,
    pub sweep: SweepConfig,
}

// What happened across the whole batch
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchReport {
    /// Ranges audited successfully this run
    pub processed: usize,
    /// Ranges that failed and stay pending
    pub failed: usize,
    /// Ranges skipped because their counts were already filled in
    pub skipped: usize,
}

// The tracking store, loaded whole so it can be written back whole
pub struct TrackingStore {
    headers: csv::StringRecord,
    rows: Vec<csv::StringRecord>,
    first_row_col: usize,
    last_row_col: usize,
    count_404_col: usize,
    non_404_col: usize,
    jurisdiction_col: Option<usize>,
    category_col: Option<usize>,
}

impl TrackingStore {
    // Loads the store. Missing file or missing required columns is fatal.
    pub fn load(path: &Path) -> Result<TrackingStore> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("cannot read range tracking store {}", path.display()))?;

        let headers = reader.headers()?.clone();
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| anyhow!("tracking store {} has no '{}' column", path.display(), name))
        };

        let store = TrackingStore {
            first_row_col: require("First Row")?,
            last_row_col: require("Last Row")?,
            count_404_col: require("404s")?,
            non_404_col: require("Non-404 Errors")?,
            jurisdiction_col: find("Jurisdiction"),
            category_col: find("Category"),
            rows: reader.records().collect::<Result<_, _>>()?,
            headers,
        };
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    // Pending means either count cell is blank (empty or whitespace).
    // A successful audit always fills both, so for rows this tool wrote
    // the two readings agree; OR is the safe reading for hand-edited rows.
    pub fn is_pending(&self, row: usize) -> bool {
        let blank = |col: usize| {
            self.rows[row]
                .get(col)
                .map(|v| v.trim().is_empty())
                .unwrap_or(true)
        };
        blank(self.count_404_col) || blank(self.non_404_col)
    }

    // Builds the AuditRange for one row. Unparseable bounds are a per-range
    // error, handled by the orchestration loop like any other range failure.
    pub fn range_for(&self, row: usize, output_dir: &Path) -> Result<AuditRange> {
        let cell = |col: usize| self.rows[row].get(col).unwrap_or("").trim();
        let bound = |col: usize, name: &str| {
            cell(col)
                .parse::<usize>()
                .with_context(|| format!("row {}: '{}' is not a number in {}", row + 1, cell(col), name))
        };

        Ok(AuditRange {
            first_row: bound(self.first_row_col, "First Row")?,
            last_row: bound(self.last_row_col, "Last Row")?,
            output_csv: output_dir.join(self.output_name(row)),
        })
    }

    // Output files are named after the row's identity columns when present:
    //   007_los_angeles_counties.csv
    fn output_name(&self, row: usize) -> String {
        let cell = |col: Option<usize>| {
            col.and_then(|c| self.rows[row].get(c))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let jurisdiction = cell(self.jurisdiction_col).map(slug).unwrap_or_else(|| "range".to_string());
        let category = cell(self.category_col).map(slug).unwrap_or_else(|| "urls".to_string());
        format!("{:03}_{}_{}.csv", row + 1, jurisdiction, category)
    }

    // Overwrites the count cells for one row (in memory only)
    pub fn set_counts(&mut self, row: usize, summary: AuditSummary) {
        let mut fields: Vec<String> = self.rows[row].iter().map(String::from).collect();
        fields[self.count_404_col] = summary.count_404.to_string();
        fields[self.non_404_col] = summary.non_404_errors.to_string();
        self.rows[row] = csv::StringRecord::from(fields);
    }

    // Writes the whole store back, column order untouched, via temp + rename
    // so a failure partway leaves the original intact
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)
                .with_context(|| format!("cannot write tracking store {}", tmp.display()))?;
            writer.write_record(&self.headers)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)
            .with_context(|| format!("cannot replace tracking store {}", path.display()))?;
        Ok(())
    }
}

// Lowercases and squashes a label into something filesystem-friendly
fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

// Runs the batch against the live network
pub async fn run_batch(client: &Client, config: &BatchConfig) -> Result<BatchReport> {
    run_batch_with(config, |range| {
        let client = client.clone();
        let config = config.clone();
        async move {
            audit_range(&client, &config.source_csv, config.has_header, &range, &config.sweep).await
        }
    })
    .await
}

// The orchestration loop, generic over the per-range auditor
//
// Contract per range, in order:
// - not pending -> skip
// - auditor succeeds -> counts overwritten in memory
// - anything fails (bad bounds, audit error) -> log, leave counts blank,
//   carry on with the next range
// Afterwards the whole store is persisted exactly once.
pub async fn run_batch_with<F, Fut>(config: &BatchConfig, auditor: F) -> Result<BatchReport>
where
    F: Fn(AuditRange) -> Fut,
    Fut: Future<Output = Result<AuditSummary>>,
{
    let mut store = TrackingStore::load(&config.ranges_csv)?;
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("cannot create output directory {}", config.output_dir.display()))?;

    let mut report = BatchReport::default();

    for row in 0..store.len() {
        if !store.is_pending(row) {
            report.skipped += 1;
            continue;
        }

        // Both the bounds parse and the audit itself funnel through one
        // Result so either kind of problem isolates to this range
        let attempt = match store.range_for(row, &config.output_dir) {
            Ok(range) => auditor(range).await,
            Err(e) => Err(e),
        };

        match attempt {
            Ok(summary) => {
                info!(
                    "range {} done: {} 404s, {} other errors",
                    row + 1,
                    summary.count_404,
                    summary.non_404_errors
                );
                store.set_counts(row, summary);
                report.processed += 1;
            }
            Err(e) => {
                error!("range {} failed, will retry next run: {:#}", row + 1, e);
                report.failed += 1;
            }
        }
    }

    store.save(&config.ranges_csv)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const HEADER: &str = "ID,Jurisdiction,Category,First Row,Last Row,404s,Non-404 Errors";

    fn write_store(dir: &Path, rows: &[&str]) -> PathBuf {
        let path = dir.join("ranges.csv");
        let mut body = String::from(HEADER);
        body.push('\n');
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        std::fs::write(&path, body).unwrap();
        path
    }

    fn batch_config(dir: &Path, ranges: PathBuf) -> BatchConfig {
        BatchConfig {
            source_csv: dir.join("urls.csv"),
            ranges_csv: ranges,
            output_dir: dir.join("results"),
            has_header: true,
            sweep: SweepConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_only_pending_ranges_are_audited() {
        let dir = tempfile::tempdir().unwrap();
        let ranges = write_store(
            dir.path(),
            &[
                "1,Alameda,counties,1,100,3,1",   // done
                "2,Butte,counties,101,200,,",     // pending
                "3,Colusa,positions,201,300,0,0", // done (zeros are not blank)
            ],
        );
        let config = batch_config(dir.path(), ranges);

        let calls = Arc::new(AtomicUsize::new(0));
        let report = run_batch_with(&config, |_range| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(AuditSummary {
                    count_404: 2,
                    non_404_errors: 5,
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed, 0);

        let written = std::fs::read_to_string(&config.ranges_csv).unwrap();
        assert!(written.contains("2,Butte,counties,101,200,2,5"));
    }

    #[tokio::test]
    async fn test_rerun_with_all_counts_filled_audits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ranges = write_store(dir.path(), &["1,Alameda,counties,1,100,,"]);
        let config = batch_config(dir.path(), ranges);

        let auditor = |_range: AuditRange| async move {
            Ok(AuditSummary {
                count_404: 0,
                non_404_errors: 0,
            })
        };
        run_batch_with(&config, auditor).await.unwrap();

        // Second run: the counts are filled, so zero audits happen
        let calls = Arc::new(AtomicUsize::new(0));
        let report = run_batch_with(&config, |_range| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(AuditSummary::default())
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_one_failing_range_does_not_abort_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let ranges = write_store(
            dir.path(),
            &[
                "1,Alameda,counties,1,100,,",
                "2,Butte,counties,101,200,,",
                "3,Colusa,positions,201,300,,",
            ],
        );
        let config = batch_config(dir.path(), ranges);

        let report = run_batch_with(&config, |range: AuditRange| async move {
            if range.first_row == 101 {
                Err(anyhow!("simulated network meltdown"))
            } else {
                Ok(AuditSummary {
                    count_404: 1,
                    non_404_errors: 0,
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 1);

        let written = std::fs::read_to_string(&config.ranges_csv).unwrap();
        // ranges 1 and 3 got counts; range 2 stays blank and thus pending
        assert!(written.contains("1,Alameda,counties,1,100,1,0"));
        assert!(written.contains("2,Butte,counties,101,200,,"));
        assert!(written.contains("3,Colusa,positions,201,300,1,0"));
    }

    #[tokio::test]
    async fn test_unparseable_bounds_are_a_per_range_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ranges = write_store(
            dir.path(),
            &["1,Alameda,counties,oops,100,,", "2,Butte,counties,101,200,,"],
        );
        let config = batch_config(dir.path(), ranges);

        let report = run_batch_with(&config, |_range: AuditRange| async move {
            Ok(AuditSummary {
                count_404: 0,
                non_404_errors: 2,
            })
        })
        .await
        .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn test_column_order_and_untouched_rows_survive_the_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let ranges = write_store(
            dir.path(),
            &["1,Alameda,counties,1,100,7,2", "2,Butte,positions,101,200,,"],
        );
        let config = batch_config(dir.path(), ranges);

        run_batch_with(&config, |_range: AuditRange| async move {
            Ok(AuditSummary {
                count_404: 4,
                non_404_errors: 1,
            })
        })
        .await
        .unwrap();

        let written = std::fs::read_to_string(&config.ranges_csv).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next().unwrap(), HEADER);
        assert_eq!(lines.next().unwrap(), "1,Alameda,counties,1,100,7,2");
        assert_eq!(lines.next().unwrap(), "2,Butte,positions,101,200,4,1");
    }

    #[tokio::test]
    async fn test_missing_store_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = batch_config(dir.path(), dir.path().join("missing.csv"));
        let result = run_batch_with(&config, |_range: AuditRange| async move {
            Ok(AuditSummary::default())
        })
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_output_names_use_identity_columns() {
        let dir = tempfile::tempdir().unwrap();
        let ranges = write_store(dir.path(), &["7,Los Angeles,counties,1,10,,"]);
        let store = TrackingStore::load(&ranges).unwrap();
        let range = store.range_for(0, Path::new("results")).unwrap();
        assert_eq!(
            range.output_csv,
            Path::new("results").join("001_los_angeles_counties.csv")
        );
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Los Angeles"), "los_angeles");
        assert_eq!(slug("St. Mary's"), "st_mary_s");
        assert_eq!(slug("counties"), "counties");
    }
}
