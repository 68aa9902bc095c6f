// src/checker/http.rs
// =============================================================================
// This module checks the HTTP status of a single URL.
//
// Key functionality:
// - Makes one GET request per URL (some CMS front-ends answer HEAD with 200
//   for pages that GET 404, and finding 404s is the whole point)
// - Does NOT follow redirects - a 301/302 is a finding we want to record
// - Classifies every outcome into exactly one of three buckets:
//     Ok200            -> nothing to record
//     HttpStatus(code) -> got a response, but not 200 (redirects, 4xx, 5xx)
//     TransportFailure -> no response at all (DNS, timeout, connection reset)
//
// A non-200 response is NOT an error path here. It is a perfectly normal,
// classified outcome that flows into result structures. Only the transport
// layer failing to produce any response counts as a "failure", and even that
// is data, not a fault.
//
// Rust concepts:
// - async/await: For network I/O
// - Enums: To represent the three-way classification
// - Result is deliberately absent from the public contract: every outcome,
//   including failure, is a value of CheckOutcome
// =============================================================================

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// The three-way classification of a single URL check
//
// Classification invariant: every checked URL lands in exactly one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The URL answered 200 OK - nothing to record
    Ok200,
    /// Got a response with any non-200 status (301, 404, 500, ...)
    HttpStatus(u16),
    /// No response was obtainable (DNS failure, timeout, reset, bad URL)
    TransportFailure(String),
}

impl CheckOutcome {
    /// True only for the 404 status, which is accounted separately
    /// from every other kind of problem
    pub fn is_404(&self) -> bool {
        matches!(self, CheckOutcome::HttpStatus(404))
    }

    /// True for anything worth recording (everything except 200)
    pub fn is_recordable(&self) -> bool {
        !matches!(self, CheckOutcome::Ok200)
    }
}

// Builds the HTTP client used for status checks
//
// Why Policy::none() for redirects?
// - The audit wants to know that a URL *answered* with a 301/302,
//   not what lives at the far end of the redirect chain
// - Following redirects would silently turn a finding into a 200
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

// Checks a single URL and classifies the outcome
//
// Parameters:
//   client: reqwest HTTP client (cheap to clone, shared across checks)
//   url: the URL to check
//
// Returns: CheckOutcome - never an Err; transport problems become
// TransportFailure so callers can account for them like any other outcome
pub async fn check_url(client: &Client, url: &str) -> CheckOutcome {
    match client.get(url).send().await {
        Ok(response) => classify_status(response.status().as_u16()),
        Err(e) => CheckOutcome::TransportFailure(describe_error(&e)),
    }
}

// Maps a raw status code onto the classification
fn classify_status(code: u16) -> CheckOutcome {
    if code == 200 {
        CheckOutcome::Ok200
    } else {
        CheckOutcome::HttpStatus(code)
    }
}

// Produces a short human-readable description of a transport failure
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure
// - Connection refused/reset
// - The request could not even be constructed (invalid URL)
fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_builder() || error.is_request() {
        format!("request could not be sent: {}", error)
    } else if error.is_connect() {
        let text = error.to_string();
        if text.contains("dns") {
            "could not resolve hostname".to_string()
        } else {
            format!("connection failed: {}", text)
        }
    } else {
        error.to_string()
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why does check_url not return Result?
//    - Because for an auditor, "the request failed" is an answer, not an error
//    - Encoding it in the CheckOutcome enum forces every caller to handle it
//    - Propagating it with ? would abort a sweep on the first flaky host
//
// 2. Why classify on as_u16() instead of StatusCode helpers?
//    - The audit's contract is "200 or not 200", nothing subtler
//    - is_success() would also accept 201/204, which we want recorded
//
// 3. Why borrow the client (&Client)?
//    - Client is an Arc internally, so cloning is cheap, but the checker
//      itself never needs to own it - callers decide how to share it
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_200_is_ok() {
        assert_eq!(classify_status(200), CheckOutcome::Ok200);
    }

    #[test]
    fn test_classify_non_200_is_recorded_with_status() {
        assert_eq!(classify_status(301), CheckOutcome::HttpStatus(301));
        assert_eq!(classify_status(404), CheckOutcome::HttpStatus(404));
        assert_eq!(classify_status(500), CheckOutcome::HttpStatus(500));
        // 2xx codes other than 200 are still findings
        assert_eq!(classify_status(204), CheckOutcome::HttpStatus(204));
    }

    #[test]
    fn test_only_404_counts_as_404() {
        assert!(CheckOutcome::HttpStatus(404).is_404());
        assert!(!CheckOutcome::HttpStatus(410).is_404());
        assert!(!CheckOutcome::TransportFailure("timeout".into()).is_404());
        assert!(!CheckOutcome::Ok200.is_404());
    }

    #[test]
    fn test_everything_but_200_is_recordable() {
        assert!(!CheckOutcome::Ok200.is_recordable());
        assert!(CheckOutcome::HttpStatus(301).is_recordable());
        assert!(CheckOutcome::TransportFailure("reset".into()).is_recordable());
    }

    #[tokio::test]
    async fn test_unroutable_url_is_transport_failure() {
        let client = build_client(Duration::from_millis(200)).unwrap();
        // Reserved TEST-NET-1 address: nothing should answer here
        let outcome = check_url(&client, "http://192.0.2.1/").await;
        assert!(matches!(outcome, CheckOutcome::TransportFailure(_)));
    }
}
