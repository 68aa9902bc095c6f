// src/sitemap/walker.rs
// =============================================================================
// This module walks sitemap indexes recursively.
//
// How it works:
// 1. Fetch the target (HTTP for http(s) URLs, the filesystem for anything
//    else - local validation of a downloaded sitemap is a daily workflow)
// 2. Hand the raw text to the content validator
// 3. If the document is a sitemap index and recursion is on and we are
//    above the depth floor, walk each child location with depth + 1
//
// Bounds:
// - Depth: children at depth >= max_depth are listed but not walked.
//   This stop is SILENT - no warning, by contract.
// - Fan-out: at depth 0 every child is walked; below that at most 10 per
//   index, and truncation ALWAYS leaves a warning saying how many were
//   skipped. The two bounds are deliberately distinguishable in output.
//
// Isolation: every child gets its own fresh report - no shared mutable
// error/warning state between siblings or between parent and child. The
// parent owns its children's reports as an ordered (url, report) tree.
//
// Children are walked sequentially, awaiting each in full. The per-request
// timeout is the only latency bound per branch.
//
// Rust concepts:
// - BoxFuture: an async fn cannot call itself directly (its future type
//   would contain itself); boxing breaks the cycle
// =============================================================================

use futures::future::BoxFuture;
use log::info;
use reqwest::Client;
use std::time::Duration;

use super::validator::{validate_content, ValidationReport};

/// Default recursion ceiling
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Maximum children walked per index below the top level
pub const FANOUT_LIMIT: usize = 10;

/// Sitemap fetches get a longer leash than status checks
pub const FETCH_TIMEOUT_SECS: u64 = 30;

// How a walk behaves
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Walk into child sitemaps when the document is an index
    pub recursive: bool,
    /// Depth ceiling; depth 0 is the target itself
    pub max_depth: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            recursive: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Builds the HTTP client used for sitemap fetches (30s timeout, redirects
/// followed - unlike status checks, we want the document, not the status)
pub fn build_fetch_client() -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
}

// Validates one target, recursing through indexes when asked to
//
// Parameters:
//   client: HTTP client for fetches (tests inject one with a short timeout)
//   target: an http(s) URL or a local file path
//   options: recursion switch and depth ceiling
//
// Fetch failures are data: they land in the report's errors, never in a
// Result. The only way this function "fails" is by describing the failure.
pub async fn validate_target(client: &Client, target: &str, options: &WalkOptions) -> ValidationReport {
    walk(client, target.to_string(), options, 0).await
}

// The recursive step. Boxed so the future type does not contain itself.
fn walk<'a>(
    client: &'a Client,
    target: String,
    options: &'a WalkOptions,
    depth: usize,
) -> BoxFuture<'a, ValidationReport> {
    Box::pin(async move {
        info!("validating {} (depth {})", target, depth);

        let raw = match fetch_target(client, &target).await {
            Ok(text) => text,
            Err(e) => {
                // Short-circuit: a target we cannot read has nothing to validate
                let mut report = ValidationReport::empty();
                report.error(format!("failed to fetch {}: {}", target, e));
                return report.finish();
            }
        };

        let mut report = validate_content(&raw);

        if report.is_index() && options.recursive && depth < options.max_depth {
            let total = report.child_sitemaps.len();
            let mut selected = report.child_sitemaps.clone();

            // Fan-out bound applies only below the top level, and always warns
            if depth > 0 && total > FANOUT_LIMIT {
                selected.truncate(FANOUT_LIMIT);
                report.warn(format!(
                    "fan-out limit at depth {}: walking {} of {} child sitemaps, {} skipped",
                    depth,
                    FANOUT_LIMIT,
                    total,
                    total - FANOUT_LIMIT
                ));
            }

            // Sequential, each child with its own fresh report
            for child in selected {
                let child_report = walk(client, child.clone(), options, depth + 1).await;
                report.children.push((child, child_report));
            }
        }
        // depth >= max_depth: children stay listed in child_sitemaps but are
        // not walked, and no warning is recorded - silent by contract

        report
    })
}

// Fetches the raw sitemap text for a target
//
// http(s) targets go over the network; everything else is read as a file.
// A non-success HTTP status means there is no document to validate, so it
// is a fetch failure, not a validation finding.
pub(crate) async fn fetch_target(client: &Client, target: &str) -> anyhow::Result<String> {
    if target.starts_with("http://") || target.starts_with("https://") {
        let response = client.get(target).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status().as_u16());
        }
        Ok(response.text().await?)
    } else {
        Ok(tokio::fs::read_to_string(target).await?)
    }
}
