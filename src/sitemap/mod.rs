// src/sitemap/mod.rs
// =============================================================================
// This module contains all sitemap XML validation logic.
//
// Submodules:
// - rules: the pure predicates (W3C dates, URL validity, changefreq,
//   priority, bare-ampersand handling)
// - validator: validates one document against the sitemap protocol
// - walker: fetches targets and recurses through sitemap indexes with
//   depth and fan-out bounds
//
// This file (mod.rs) is the module root - it ties everything together and
// exports the public API that other parts of our application can use.
// =============================================================================

mod rules;
mod validator;
mod walker;

// Re-export public items from submodules
pub use rules::{
    is_valid_changefreq, is_valid_priority, is_valid_sitemap_url, is_valid_w3c_date,
    CHANGE_FREQUENCIES, SITEMAP_NS,
};
pub use validator::{
    extract_page_urls, validate_content, ValidationReport, MAX_SITEMAP_BYTES, MAX_URLS_PER_SET,
};
pub use walker::{
    build_fetch_client, validate_target, WalkOptions, DEFAULT_MAX_DEPTH, FANOUT_LIMIT,
    FETCH_TIMEOUT_SECS,
};

// The health sweep fetches sitemaps the same way the walker does
pub(crate) use walker::fetch_target;
