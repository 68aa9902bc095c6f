// src/checker/sweep.rs
// =============================================================================
// This module runs the status checker over many URLs with a concurrency cap.
//
// How it works:
// 1. Turn the ordered URL sequence into a stream of check futures
// 2. buffer_unordered(C) keeps at most C checks in flight at any instant
// 3. Drain completions one at a time, updating the 404 / non-404 counters
// 4. If an early-stop threshold is set and the non-404 counter reaches it,
//    stop dispatching new checks (checks already in flight still finish
//    and still count - this is a best-effort stop, not a hard cutoff)
//
// Ordering: dispatch follows input order, but completion order is whatever
// the network gives us. Results are therefore accumulated by URL, never by
// position. Callers must not rely on outcome order.
//
// Rust concepts:
// - Streams: buffer_unordered is our admission counter - it will not pull
//   a new future from the stream until a slot frees up
// - Generics: the sweeper is generic over the checker function so tests can
//   inject a mock instead of hitting the network
// - Atomics: the stop flag is read at dispatch time inside each future
// =============================================================================

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::http::{check_url, CheckOutcome};

/// Default number of checks in flight at once
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

// Tuning knobs for one sweep
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Maximum checks in flight at once (C)
    pub concurrency: usize,
    /// Per-request timeout
    pub timeout: Duration,
    /// Stop dispatching new checks once this many non-404 errors have been
    /// seen. 0 disables the early stop.
    pub error_threshold: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            error_threshold: 0,
        }
    }
}

// One recorded (non-200) outcome
//
// Exactly one of status/error is populated:
// - status: the URL answered with this non-200 HTTP status
// - error: no response was obtainable; this is the transport failure text
//
// The serde renames give us the exact CSV/JSON column names the reports use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditOutcome {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Status")]
    pub status: Option<u16>,
    #[serde(rename = "Error")]
    pub error: Option<String>,
}

impl AuditOutcome {
    /// Builds the recorded form of a non-200 check outcome.
    /// Returns None for Ok200 - successes are never recorded.
    pub fn from_check(url: String, outcome: CheckOutcome) -> Option<AuditOutcome> {
        match outcome {
            CheckOutcome::Ok200 => None,
            CheckOutcome::HttpStatus(code) => Some(AuditOutcome {
                url,
                status: Some(code),
                error: None,
            }),
            CheckOutcome::TransportFailure(message) => Some(AuditOutcome {
                url,
                status: None,
                error: Some(message),
            }),
        }
    }
}

// Final accounting for one sweep
//
// Invariant: count_404 + non_404_errors == number of recorded outcomes.
// Counters only ever go up during a sweep and are frozen afterward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    /// URLs that answered 404
    pub count_404: usize,
    /// Everything else that was not a 200: other statuses + transport failures
    pub non_404_errors: usize,
}

impl AuditSummary {
    /// Total recorded (non-200) outcomes
    pub fn total(&self) -> usize {
        self.count_404 + self.non_404_errors
    }
}

// Everything a sweep produces
#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    /// All non-200 outcomes, in completion order (NOT input order)
    pub outcomes: Vec<AuditOutcome>,
    pub summary: AuditSummary,
}

// Sweeps a URL sequence against the live network
//
// This is the production entry point: it wires the real status checker
// into the generic sweep loop below.
pub async fn sweep(client: &Client, urls: Vec<String>, config: &SweepConfig) -> SweepResult {
    sweep_with(urls, config, |url| {
        let client = client.clone();
        async move { check_url(&client, &url).await }
    })
    .await
}

// The sweep loop itself, generic over the checker
//
// Parameters:
//   urls: ordered sequence to check (dispatch follows this order)
//   config: concurrency ceiling / early-stop threshold
//   checker: async fn(String) -> CheckOutcome
//
// Why generic? So tests can drive the loop with a scripted checker and
// assert the concurrency ceiling and counter arithmetic without a network.
pub async fn sweep_with<F, Fut>(urls: Vec<String>, config: &SweepConfig, checker: F) -> SweepResult
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = CheckOutcome>,
{
    let stop = Arc::new(AtomicBool::new(false));
    let checker = &checker;

    // Each URL becomes a future that first consults the stop flag at
    // dispatch time. A stopped sweep still drains whatever was in flight.
    let check_futures = urls.into_iter().map(|url| {
        let stop = Arc::clone(&stop);
        async move {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            let outcome = checker(url.clone()).await;
            Some((url, outcome))
        }
    });

    let mut in_flight = stream::iter(check_futures).buffer_unordered(config.concurrency.max(1));

    let mut summary = AuditSummary::default();
    let mut outcomes = Vec::new();

    while let Some(completed) = in_flight.next().await {
        // None means the check was skipped after an early stop
        let Some((url, outcome)) = completed else {
            continue;
        };

        if outcome.is_404() {
            summary.count_404 += 1;
        } else if outcome.is_recordable() {
            summary.non_404_errors += 1;
        }

        if let Some(recorded) = AuditOutcome::from_check(url, outcome) {
            outcomes.push(recorded);
        }

        // Best-effort early stop: no new dispatches, in-flight work finishes
        if config.error_threshold > 0 && summary.non_404_errors >= config.error_threshold {
            stop.store(true, Ordering::Relaxed);
        }
    }

    SweepResult { outcomes, summary }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why a while-let drain instead of .collect()?
//    - Collecting into a Vec at once would work, but our counters
//      must update *between* completions so the early-stop flag can be set
//      before the next dispatch
//
// 2. Why can the early stop overshoot?
//    - Up to C-1 checks may already be in flight when the threshold trips
//    - They complete and count; cancelling them would lose real findings
//    - This is an accepted approximation, not a bug
//
// 3. Why Arc<AtomicBool> and not a plain bool?
//    - The flag is read inside futures that the buffer owns; sharing it
//      mutably across them needs either atomics or a lock, and an atomic
//      flag is the lighter tool
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn config(concurrency: usize, threshold: usize) -> SweepConfig {
        SweepConfig {
            concurrency,
            timeout: Duration::from_secs(1),
            error_threshold: threshold,
        }
    }

    // Scripted checker: answers by URL suffix so tests control every outcome
    fn scripted(url: String) -> CheckOutcome {
        if url.ends_with("/ok") {
            CheckOutcome::Ok200
        } else if url.ends_with("/missing") {
            CheckOutcome::HttpStatus(404)
        } else if url.ends_with("/moved") {
            CheckOutcome::HttpStatus(301)
        } else {
            CheckOutcome::TransportFailure("connection reset".to_string())
        }
    }

    #[tokio::test]
    async fn test_counts_partition_recorded_outcomes() {
        let urls = vec![
            "http://t.test/ok".to_string(),
            "http://t.test/missing".to_string(),
            "http://t.test/moved".to_string(),
            "http://t.test/dead".to_string(),
            "http://t.test/2/ok".to_string(),
        ];
        let result = sweep_with(urls, &config(3, 0), |u| async move { scripted(u) }).await;

        assert_eq!(result.summary.count_404, 1);
        assert_eq!(result.summary.non_404_errors, 2);
        // count_404 + non_404_errors == recorded outcomes, 200s never recorded
        assert_eq!(result.summary.total(), result.outcomes.len());
        assert!(result.outcomes.iter().all(|o| !o.url.ends_with("/ok")));
    }

    #[tokio::test]
    async fn test_outcome_has_exactly_one_of_status_or_error() {
        let urls = vec![
            "http://t.test/missing".to_string(),
            "http://t.test/dead".to_string(),
        ];
        let result = sweep_with(urls, &config(2, 0), |u| async move { scripted(u) }).await;

        for outcome in &result.outcomes {
            assert!(outcome.status.is_some() ^ outcome.error.is_some());
        }
    }

    #[tokio::test]
    async fn test_never_more_than_c_in_flight() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let urls: Vec<String> = (0..40).map(|i| format!("http://t.test/{}/ok", i)).collect();

        let c = 5;
        let result = sweep_with(urls, &config(c, 0), |_| {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                CheckOutcome::Ok200
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= c);
        assert_eq!(result.summary.total(), 0);
    }

    #[tokio::test]
    async fn test_early_stop_halts_dispatch_but_keeps_counts() {
        let dispatched = Arc::new(AtomicUsize::new(0));
        let urls: Vec<String> = (0..20).map(|i| format!("http://t.test/{}/dead", i)).collect();

        let result = sweep_with(urls, &config(1, 1), |_| {
            let dispatched = Arc::clone(&dispatched);
            async move {
                dispatched.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                CheckOutcome::TransportFailure("timeout".to_string())
            }
        })
        .await;

        // With C=1 the overshoot window is at most one extra dispatch
        assert!(dispatched.load(Ordering::SeqCst) <= 2);
        assert!(result.summary.non_404_errors >= 1);
        assert_eq!(result.summary.total(), result.outcomes.len());
    }

    #[tokio::test]
    async fn test_threshold_zero_never_stops() {
        let urls: Vec<String> = (0..8).map(|i| format!("http://t.test/{}/dead", i)).collect();
        let result = sweep_with(urls, &config(2, 0), |u| async move { scripted(u) }).await;
        assert_eq!(result.summary.non_404_errors, 8);
    }
}
