// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Dispatch to the appropriate subcommand handler
// 3. Print the run report (table or JSON)
// 4. Exit with proper code (0 = clean, 1 = findings, 2 = error)
//
// Error policy, in one sentence: broken URLs and invalid sitemaps are
// findings that land in reports and drive the exit code; only configuration
// problems and storage I/O failures bubble up as errors.
// =============================================================================

// Module declarations - tells Rust about our other source files
mod audit; // src/audit/ - row-range auditing and the batch orchestrator
mod checker; // src/checker/ - HTTP status checks and the bounded sweep
mod cli; // src/cli.rs - command-line parsing
mod health; // src/health/ - known endpoints and the sampling sweep
mod sitemap; // src/sitemap/ - sitemap XML validation and recursion

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use audit::{AuditRange, BatchConfig};
use checker::SweepConfig;
use cli::{Cli, Commands};
use health::HealthOptions;
use sitemap::{ValidationReport, WalkOptions};

// The #[tokio::main] attribute transforms our async main into a real main
// function. It creates a tokio runtime and runs our async code inside it.
#[tokio::main]
async fn main() {
    // RUST_LOG=info turns on sweep progress; the reports below always print
    env_logger::init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // Configuration or storage failure: print it and exit with code 2
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// This is the main application logic
// Returns:
//   Ok(0) = nothing broken
//   Ok(1) = findings (broken URLs, invalid sitemaps, failed ranges)
//   Err   = configuration / storage failure (becomes exit code 2)
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Audit {
            input,
            output,
            first_row,
            last_row,
            concurrency,
            timeout,
            error_threshold,
            no_header,
        } => {
            let config = sweep_config(concurrency, timeout, error_threshold);
            handle_audit(input, output, first_row, last_row, no_header, config).await
        }
        Commands::Sweep {
            input,
            ranges,
            output_dir,
            concurrency,
            timeout,
            error_threshold,
            no_header,
        } => {
            let config = BatchConfig {
                source_csv: input,
                ranges_csv: ranges,
                output_dir,
                has_header: !no_header,
                sweep: sweep_config(concurrency, timeout, error_threshold),
            };
            handle_sweep(config).await
        }
        Commands::Validate {
            targets,
            recursive,
            max_depth,
            json,
        } => {
            let options = WalkOptions {
                recursive,
                max_depth,
            };
            handle_validate(targets, options, json).await
        }
        Commands::KnownProblems { base_url, json } => handle_known_problems(base_url, json).await,
        Commands::Health {
            base_url,
            sample_rate,
            seed,
            concurrency,
            timeout,
            json,
        } => {
            let options = HealthOptions {
                base_url,
                sample_rate,
                seed,
                sweep: sweep_config(concurrency, timeout, 0),
            };
            handle_health(options, json).await
        }
    }
}

fn sweep_config(concurrency: usize, timeout: u64, error_threshold: usize) -> SweepConfig {
    SweepConfig {
        concurrency,
        timeout: Duration::from_secs(timeout),
        error_threshold,
    }
}

// Handles the 'audit' subcommand: one explicit row range
async fn handle_audit(
    input: PathBuf,
    output: PathBuf,
    first_row: usize,
    last_row: usize,
    no_header: bool,
    config: SweepConfig,
) -> Result<i32> {
    let client = checker::build_client(config.timeout)?;
    let range = AuditRange {
        first_row,
        last_row,
        output_csv: output,
    };

    println!("🔍 Auditing rows {}-{} of {}", first_row, last_row, input.display());

    let summary = audit::audit_range(&client, &input, !no_header, &range, &config).await?;

    println!("\n📊 Summary:");
    println!("   ❌ 404s: {}", summary.count_404);
    println!("   ⚠️  Other errors: {}", summary.non_404_errors);
    println!("   📝 Outcomes written to {}", range.output_csv.display());

    Ok(if summary.total() > 0 { 1 } else { 0 })
}

// Handles the 'sweep' subcommand: every pending range in the tracking store
async fn handle_sweep(config: BatchConfig) -> Result<i32> {
    let client = checker::build_client(config.sweep.timeout)?;

    println!(
        "🔍 Sweeping pending ranges from {} against {}",
        config.ranges_csv.display(),
        config.source_csv.display()
    );

    let report = audit::run_batch(&client, &config).await?;

    println!("\n📊 Summary:");
    println!("   ✅ Processed: {}", report.processed);
    println!("   ⏭️  Skipped (already counted): {}", report.skipped);
    println!("   ❌ Failed (still pending): {}", report.failed);
    println!("   📝 Tracking store updated: {}", config.ranges_csv.display());

    Ok(if report.failed > 0 { 1 } else { 0 })
}

// Handles the 'validate' subcommand: explicit sitemap targets
async fn handle_validate(targets: Vec<String>, options: WalkOptions, json: bool) -> Result<i32> {
    let client = sitemap::build_fetch_client()?;

    let mut reports: Vec<(String, ValidationReport)> = Vec::new();
    for target in targets {
        let report = sitemap::validate_target(&client, &target, &options).await;
        reports.push((target, report));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (target, report) in &reports {
            print_validation(target, report, 0);
        }
    }

    // A parent's `valid` does not cover its children, so walk the whole tree
    let any_invalid = reports.iter().any(|(_, r)| tree_has_invalid(r));
    Ok(if any_invalid { 1 } else { 0 })
}

// Handles the 'known-problems' subcommand: the fixed jurisdictional pairs
async fn handle_known_problems(base_url: String, json: bool) -> Result<i32> {
    let client = sitemap::build_fetch_client()?;
    let options = WalkOptions::default();

    let mut reports: Vec<(String, ValidationReport)> = Vec::new();
    for (jurisdiction, pair) in health::known_problem_targets(&base_url) {
        if !json {
            println!("🔍 {}", jurisdiction);
        }
        for target in pair {
            let report = sitemap::validate_target(&client, &target, &options).await;
            if !json {
                print_validation(&target, &report, 1);
            }
            reports.push((target, report));
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    let any_invalid = reports.iter().any(|(_, r)| !r.valid);
    Ok(if any_invalid { 1 } else { 0 })
}

// Handles the 'health' subcommand: the sampling status sweep
async fn handle_health(options: HealthOptions, json: bool) -> Result<i32> {
    let status_client = checker::build_client(options.sweep.timeout)?;
    let fetch_client = sitemap::build_fetch_client()?;

    println!(
        "🔍 Health sweep of {} (sampling {:.0}% of URLs)\n",
        options.base_url,
        options.sample_rate * 100.0
    );

    let report = health::run_health_sweep(&status_client, &fetch_client, &options).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_health(&report);
    }

    let findings =
        report.totals.total() > 0 || !report.broken_sitemaps.is_empty() || !report.empty_sitemaps.is_empty();
    Ok(if findings { 1 } else { 0 })
}

// Prints one validation report tree, indented by depth
fn print_validation(target: &str, report: &ValidationReport, depth: usize) {
    let pad = "  ".repeat(depth);
    let verdict = if report.valid { "✅ VALID" } else { "❌ INVALID" };
    println!("{}{} {}", pad, verdict, target);

    for error in &report.errors {
        println!("{}   error: {}", pad, error);
    }
    for warning in &report.warnings {
        println!("{}   warning: {}", pad, warning);
    }
    for (child, child_report) in &report.children {
        print_validation(child, child_report, depth + 1);
    }
}

// True when this report or any descendant carries errors
fn tree_has_invalid(report: &ValidationReport) -> bool {
    !report.valid || report.children.iter().any(|(_, child)| tree_has_invalid(child))
}

// Prints the health sweep report as a human-readable table
fn print_health(report: &health::HealthReport) {
    println!("{:<66} {:<9} {:>6} {:>8} {:>6} {:>7}", "SITEMAP", "VALID", "URLS", "SAMPLED", "404s", "ERRORS");
    println!("{}", "=".repeat(105));
    for sitemap in &report.sitemaps {
        println!(
            "{:<66} {:<9} {:>6} {:>8} {:>6} {:>7}",
            sitemap.url,
            if sitemap.valid { "✅" } else { "❌" },
            sitemap.url_count,
            sitemap.sampled,
            sitemap.summary.count_404,
            sitemap.summary.non_404_errors
        );
    }

    if !report.broken_sitemaps.is_empty() {
        println!("\n❌ Broken sitemaps:");
        for url in &report.broken_sitemaps {
            println!("   {}", url);
        }
    }
    if !report.empty_sitemaps.is_empty() {
        println!("\n⚠️  Empty sitemaps:");
        for url in &report.empty_sitemaps {
            println!("   {}", url);
        }
    }
    if !report.suspicious.is_empty() {
        println!("\n🔎 Suspicious URL patterns:");
        for (pattern, count) in &report.suspicious {
            println!("   {} ({}x)", pattern, count);
        }
    }

    println!("\n📊 Sampled status checks:");
    println!("   ❌ 404s: {}", report.totals.count_404);
    println!("   ⚠️  Other errors: {}", report.totals.non_404_errors);
}
