// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// clap is a popular Rust library for parsing command-line arguments.
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// Five subcommands, two per subsystem plus the spot check:
// - audit:          one explicit row range of the source URL list
// - sweep:          every pending range in the tracking store
// - validate:       explicit sitemap files/URLs, optionally recursive
// - known-problems: the fixed list of troublesome jurisdictional pairs
// - health:         sampling status sweep across the known endpoints
//
// clap handles the "invalid/missing arguments exit non-zero with usage
// before any I/O" contract for us: parse() prints usage and exits 2.
// =============================================================================

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::checker::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS};
use crate::health::{DEFAULT_BASE_URL, DEFAULT_SAMPLE_RATE};
use crate::sitemap::DEFAULT_MAX_DEPTH;

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "sitemap-guardian",
    version = "0.1.0",
    about = "Audit sitemap URLs for broken links and validate sitemap XML structure",
    long_about = "sitemap-guardian audits large sitemap URL sets for 404s and other HTTP errors, \
                  and validates sitemap XML against the sitemap protocol (namespaces, required \
                  fields, date/priority formats, size limits, duplicates), optionally recursing \
                  through sitemap indexes."
)]
pub struct Cli {
    // The #[command(subcommand)] attribute tells clap that this field
    // will hold one of the subcommands defined in the Commands enum
    #[command(subcommand)]
    pub command: Commands,
}

// This enum defines our subcommands
//
// Each variant represents a different subcommand the user can run
// The fields inside each variant become the arguments for that subcommand
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audit one explicit row range of the source URL list
    ///
    /// Example: sitemap-guardian audit --input urls.csv --output out.csv --first-row 1 --last-row 500
    Audit {
        /// Source URL list CSV (URLs in the first column)
        #[arg(long)]
        input: PathBuf,

        /// Where the non-200 outcomes for this range land
        #[arg(long)]
        output: PathBuf,

        /// First data row to audit (1-based, header excluded)
        #[arg(long)]
        first_row: usize,

        /// Last data row to audit (inclusive)
        #[arg(long)]
        last_row: usize,

        /// Maximum checks in flight at once
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,

        /// Stop dispatching after this many non-404 errors (0 = never)
        #[arg(long, default_value_t = 0)]
        error_threshold: usize,

        /// The source list has no header row
        #[arg(long)]
        no_header: bool,
    },

    /// Audit every pending range in the tracking store
    ///
    /// Example: sitemap-guardian sweep --input urls.csv --ranges ranges.csv --output-dir results
    Sweep {
        /// Source URL list CSV (URLs in the first column)
        #[arg(long)]
        input: PathBuf,

        /// Range tracking store CSV (First Row / Last Row / 404s / Non-404 Errors)
        #[arg(long)]
        ranges: PathBuf,

        /// Directory that receives one outcome CSV per range
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Maximum checks in flight at once
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,

        /// Stop a range after this many non-404 errors (0 = never)
        #[arg(long, default_value_t = 0)]
        error_threshold: usize,

        /// The source list has no header row
        #[arg(long)]
        no_header: bool,
    },

    /// Validate sitemap XML files or URLs against the sitemap protocol
    ///
    /// Example: sitemap-guardian validate https://example.com/sitemap.xml --recursive
    Validate {
        /// Sitemap targets: http(s) URLs or local file paths
        #[arg(required = true)]
        targets: Vec<String>,

        /// Walk into child sitemaps when a target is a sitemap index
        #[arg(long)]
        recursive: bool,

        /// Recursion ceiling (the target itself is depth 0)
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Output results in JSON format instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Validate the known-problem jurisdictional sitemap pairs
    ///
    /// Example: sitemap-guardian known-problems --base-url https://staging.example.org
    KnownProblems {
        /// Where the site's sitemaps live
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// Output results in JSON format instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Sampling status sweep across the known sitemap endpoints
    ///
    /// Example: sitemap-guardian health --sample-rate 0.1 --seed 42
    Health {
        /// Where the site's sitemaps live
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// Fraction of each sitemap's URLs to status-check (1.0 = all)
        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: f64,

        /// Fixed RNG seed for reproducible sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Maximum checks in flight at once
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Per-request timeout in seconds for the sampled status checks
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,

        /// Output results in JSON format instead of a report
        #[arg(long)]
        json: bool,
    },
}
