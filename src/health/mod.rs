// src/health/mod.rs
// =============================================================================
// This module spot-checks the health of the known sitemap endpoints.
//
// Two jobs:
// - known_problem_targets: the fixed list of jurisdictional sitemap pairs
//   (one counties sitemap + one positions sitemap per jurisdiction) that
//   have a history of breaking, for the `known-problems` command
// - run_health_sweep: fetch and validate every known sitemap, sample its
//   URLs (10% by default), status-check the sample, and roll everything
//   into one report: counts, broken sitemaps, empty sitemaps, and a tally
//   of suspicious URL patterns
//
// Sampling is the one nondeterministic piece, so both the rate and the
// random source are injectable: tests pin a seed (or rate 1.0) and get the
// same sample every run.
//
// Rust concepts:
// - StdRng + SeedableRng: a seedable generator instead of thread_rng,
//   which cannot be made deterministic
// =============================================================================

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use serde::Serialize;

use crate::checker::{sweep, AuditSummary, SweepConfig};
use crate::sitemap::{extract_page_urls, fetch_target, validate_content};

/// Where the site's sitemaps live unless --base-url says otherwise
pub const DEFAULT_BASE_URL: &str = "https://www.courtfinder.example.org";

/// Fraction of each sitemap's URLs the health sweep status-checks
pub const DEFAULT_SAMPLE_RATE: f64 = 0.1;

/// The two sitemap categories every jurisdiction publishes
pub const CATEGORIES: [&str; 2] = ["counties", "positions"];

// Jurisdictions whose sitemap pairs keep coming up broken in past audits.
// TODO: move this list into a config file once it stops changing weekly.
pub const KNOWN_PROBLEM_JURISDICTIONS: [&str; 8] = [
    "Fresno",
    "Kern",
    "Los Angeles",
    "Riverside",
    "Sacramento",
    "San Bernardino",
    "San Diego",
    "Santa Clara",
];

// How a health sweep behaves
#[derive(Debug, Clone)]
pub struct HealthOptions {
    pub base_url: String,
    /// 0.0 disables status checks entirely, 1.0 checks every URL
    pub sample_rate: f64,
    /// Fixed RNG seed for reproducible sampling; None draws from entropy
    pub seed: Option<u64>,
    pub sweep: SweepConfig,
}

impl Default for HealthOptions {
    fn default() -> Self {
        HealthOptions {
            base_url: DEFAULT_BASE_URL.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            seed: None,
            sweep: SweepConfig::default(),
        }
    }
}

// Health of one sitemap endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SitemapHealth {
    pub url: String,
    pub valid: bool,
    /// URLs the sitemap lists
    pub url_count: usize,
    /// URLs actually status-checked this run
    pub sampled: usize,
    pub summary: AuditSummary,
    pub errors: Vec<String>,
}

// Everything one health sweep learned
#[derive(Debug, Clone, Serialize, Default)]
pub struct HealthReport {
    pub sitemaps: Vec<SitemapHealth>,
    /// Unreachable or structurally invalid sitemaps
    pub broken_sitemaps: Vec<String>,
    /// Sitemaps that list zero URLs
    pub empty_sitemaps: Vec<String>,
    /// (pattern description, occurrence count), only non-zero entries
    pub suspicious: Vec<(String, usize)>,
    /// Status-check counts across every sample
    pub totals: AuditSummary,
}

/// The sitemap URL for one jurisdiction/category pair, following the site's
/// `/sitemaps/<jurisdiction>-<category>.xml` convention
pub fn sitemap_url(base_url: &str, jurisdiction: &str, category: &str) -> String {
    let slug = jurisdiction
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    format!("{}/sitemaps/{}-{}.xml", base_url.trim_end_matches('/'), slug, category)
}

/// The known-problem pairs: (jurisdiction, [counties sitemap, positions sitemap])
pub fn known_problem_targets(base_url: &str) -> Vec<(String, Vec<String>)> {
    KNOWN_PROBLEM_JURISDICTIONS
        .iter()
        .map(|jurisdiction| {
            let pair = CATEGORIES
                .iter()
                .map(|category| sitemap_url(base_url, jurisdiction, category))
                .collect();
            (jurisdiction.to_string(), pair)
        })
        .collect()
}

// Samples URLs at the given rate using the caller's generator
//
// Rate >= 1.0 short-circuits to "everything" so a forced-deterministic test
// run never depends on the RNG at all.
pub fn sample_urls<R: Rng>(urls: &[String], rate: f64, rng: &mut R) -> Vec<String> {
    if rate >= 1.0 {
        return urls.to_vec();
    }
    if rate <= 0.0 {
        return Vec::new();
    }
    urls.iter()
        .filter(|_| rng.gen::<f64>() < rate)
        .cloned()
        .collect()
}

// Tallies URL shapes that almost always mean a templating bug upstream
//
// Only patterns that actually occurred make it into the result.
pub fn tally_suspicious(urls: &[String]) -> Vec<(String, usize)> {
    let checks: [(&str, fn(&str) -> bool); 4] = [
        ("literal 'undefined' in URL", |u| u.contains("undefined")),
        ("literal 'null' in URL", |u| u.contains("null")),
        ("doubled slash in path", |u| {
            u.splitn(2, "://").nth(1).map(|rest| rest.contains("//")).unwrap_or(false)
        }),
        ("whitespace in URL", |u| u.chars().any(char::is_whitespace)),
    ];

    checks
        .iter()
        .filter_map(|(label, check)| {
            let count = urls.iter().filter(|u| check(u)).count();
            (count > 0).then(|| (label.to_string(), count))
        })
        .collect()
}

// Fetches, validates, samples, and status-checks every known endpoint
//
// Parameters:
//   status_client: short-timeout client for page status checks
//   fetch_client: 30s-timeout client for sitemap downloads
pub async fn run_health_sweep(
    status_client: &Client,
    fetch_client: &Client,
    options: &HealthOptions,
) -> HealthReport {
    let mut rng: StdRng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut report = HealthReport::default();
    let mut all_urls: Vec<String> = Vec::new();

    let targets: Vec<String> = KNOWN_PROBLEM_JURISDICTIONS
        .iter()
        .flat_map(|jurisdiction| {
            CATEGORIES
                .iter()
                .map(|category| sitemap_url(&options.base_url, jurisdiction, category))
        })
        .collect();

    for target in targets {
        info!("health-checking {}", target);

        let raw = match fetch_target(fetch_client, &target).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{} is unreachable: {:#}", target, e);
                report.broken_sitemaps.push(target.clone());
                report.sitemaps.push(SitemapHealth {
                    url: target,
                    valid: false,
                    url_count: 0,
                    sampled: 0,
                    summary: AuditSummary::default(),
                    errors: vec![format!("failed to fetch: {:#}", e)],
                });
                continue;
            }
        };

        let validation = validate_content(&raw);
        let pages = extract_page_urls(&raw);

        if !validation.valid {
            report.broken_sitemaps.push(target.clone());
        }
        if pages.is_empty() {
            report.empty_sitemaps.push(target.clone());
        }

        let sample = sample_urls(&pages, options.sample_rate, &mut rng);
        let sampled = sample.len();
        let result = sweep(status_client, sample, &options.sweep).await;

        report.totals.count_404 += result.summary.count_404;
        report.totals.non_404_errors += result.summary.non_404_errors;
        all_urls.extend(pages.iter().cloned());

        report.sitemaps.push(SitemapHealth {
            url: target,
            valid: validation.valid,
            url_count: pages.len(),
            sampled,
            summary: result.summary,
            errors: validation.errors,
        });
    }

    report.suspicious = tally_suspicious(&all_urls);
    report
}
