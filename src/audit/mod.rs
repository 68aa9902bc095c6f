// src/audit/mod.rs
// =============================================================================
// This module audits row ranges of the master URL list.
//
// Submodules:
// - range: audits one explicit row range and writes its outcome CSV
// - batch: walks the range tracking store, auditing every pending range
//   with per-range failure isolation and a single atomic write-back
//
// This file (mod.rs) is the module root - it ties everything together and
// exports the public API that other parts of our application can use.
// =============================================================================

mod batch;
mod range;

// Re-export public items from submodules
pub use batch::{run_batch, BatchConfig, BatchReport, TrackingStore};
pub use range::{audit_range, AuditRange};
