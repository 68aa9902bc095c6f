// src/checker/mod.rs
// =============================================================================
// This module contains all URL status checking logic.
//
// Submodules:
// - http: Makes one HTTP request and classifies the outcome
// - sweep: Runs checks over many URLs with a concurrency ceiling,
//   404 / non-404 accounting, and an optional early-stop threshold
//
// This file (mod.rs) is the module root - it ties everything together and
// exports the public API that other parts of our application can use.
// =============================================================================

mod http;
mod sweep;

// Re-export public items from submodules
// This lets users write `checker::sweep()` instead of
// `checker::sweep::sweep()`
pub use http::{build_client, check_url, CheckOutcome};
pub use sweep::{
    sweep, sweep_with, AuditOutcome, AuditSummary, SweepConfig, SweepResult, DEFAULT_CONCURRENCY,
    DEFAULT_TIMEOUT_SECS,
};
