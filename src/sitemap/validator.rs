// src/sitemap/validator.rs
// =============================================================================
// This module validates one sitemap XML document against the sitemap
// protocol (https://www.sitemaps.org/protocol.html).
//
// The checks, in order:
// 1. Byte size against the 50 MB ceiling (an error, but we keep validating -
//    an oversized sitemap usually has other problems worth reporting too)
// 2. Well-formedness: a structural XML error is fatal to this document,
//    nothing else gets checked
// 3. Root classification: <sitemapindex> or <urlset>, anything else is fatal
// 4. The namespace declaration
// 5. Per-entry rules: required <loc>, URL validity, unencoded spaces, bare
//    ampersands, <lastmod> dates, <changefreq> values, <priority> range,
//    the 50,000 URL ceiling, and duplicate detection
//
// Severity model: errors make the document invalid; warnings never do.
// Duplicates, bad dates, odd changefreqs and out-of-range priorities are
// warnings - search engines tolerate them, so flagging them as fatal would
// drown real breakage in noise.
//
// One subtlety: `valid` reflects only THIS document's errors. When the
// walker recurses through an index, a parent can be valid while a child is
// not - callers must inspect child reports themselves. Existing consumers
// of the reports depend on this, so do not "fix" it here.
// =============================================================================

use serde::Serialize;
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::rules::{
    decode_basic_entities, escape_bare_ampersands, has_bare_ampersand, is_valid_changefreq,
    is_valid_priority, is_valid_sitemap_url, is_valid_w3c_date, SITEMAP_NS,
};

/// Size ceiling for one sitemap file, per the protocol
pub const MAX_SITEMAP_BYTES: usize = 50 * 1024 * 1024;

/// Maximum URLs one <urlset> may carry, per the protocol
pub const MAX_URLS_PER_SET: usize = 50_000;

// Ceilings bundled so tests can shrink them to practical sizes
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub max_bytes: usize,
    pub max_urls: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_bytes: MAX_SITEMAP_BYTES,
            max_urls: MAX_URLS_PER_SET,
        }
    }
}

// The result of validating one document, and - when the walker recurses -
// the node of a result tree
//
// `children` holds (child URL, child report) pairs in traversal order.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Derived: true iff `errors` is empty for THIS node only
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// For a sitemap index: the child sitemap locations, in document order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub child_sitemaps: Vec<String>,
    /// Filled in by the recursive walker, one entry per traversed child
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<(String, ValidationReport)>,
}

impl ValidationReport {
    pub(crate) fn empty() -> Self {
        ValidationReport {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            child_sitemaps: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Derives `valid` from this node's own errors. Child validity is
    /// deliberately not folded in.
    pub(crate) fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }

    /// True when the document declared itself a sitemap index
    pub fn is_index(&self) -> bool {
        !self.child_sitemaps.is_empty()
    }
}

// Validates raw sitemap XML text with the protocol ceilings
pub fn validate_content(raw: &str) -> ValidationReport {
    validate_with_limits(raw, Limits::default())
}

// The validator proper, with injectable ceilings for tests
pub(crate) fn validate_with_limits(raw: &str, limits: Limits) -> ValidationReport {
    let mut report = ValidationReport::empty();

    // Size first: record and keep going, the structure may still tell us more
    if raw.len() > limits.max_bytes {
        report.error(format!(
            "sitemap is {} bytes, exceeding the {} byte limit",
            raw.len(),
            limits.max_bytes
        ));
    }

    // A strict parser rejects bare ampersands as malformed XML. Repair them
    // up front (remembering which <loc> values were affected) so the rule
    // can be reported per URL instead of as one opaque parse error.
    let bare_amp_locs = locs_with_bare_ampersands(raw);
    let repaired = escape_bare_ampersands(raw);

    let doc = match roxmltree::Document::parse(&repaired) {
        Ok(doc) => doc,
        Err(e) => {
            // Malformed XML is fatal: no further checks
            report.error(format!("XML parse error: {}", e));
            return report.finish();
        }
    };

    let root = doc.root_element();
    match root.tag_name().name() {
        "sitemapindex" => {
            check_namespace(root, &mut report);
            validate_index(root, &mut report);
        }
        "urlset" => {
            check_namespace(root, &mut report);
            validate_url_set(root, &mut report, limits, &bare_amp_locs);
        }
        other => {
            report.error(format!(
                "root element must be either a URL set or a sitemap index, found <{}>",
                other
            ));
        }
    }

    report.finish()
}

// The namespace declaration must carry the sitemap protocol URI
fn check_namespace(root: roxmltree::Node<'_, '_>, report: &mut ValidationReport) {
    let declared = root.namespaces().any(|ns| ns.uri() == SITEMAP_NS);
    if !declared {
        report.error(format!("missing required namespace declaration {}", SITEMAP_NS));
    }
}

// Rules for <sitemapindex>: entries need a <loc> with an absolute http(s)
// URL; <lastmod> is optional but warned about when unparseable
fn validate_index(root: roxmltree::Node<'_, '_>, report: &mut ValidationReport) {
    let entries: Vec<_> = child_elements(root, "sitemap").collect();

    if entries.is_empty() {
        report.warn("sitemap index contains no sitemaps");
    }

    for (position, entry) in entries.iter().enumerate() {
        let label = format!("sitemap entry {}", position + 1);

        match element_text(*entry, "loc") {
            None => report.error(format!("{}: missing <loc>", label)),
            Some(loc) => {
                if !is_valid_sitemap_url(&loc) {
                    report.error(format!("{}: <loc> is not a valid absolute http(s) URL: {}", label, loc));
                }
                // Listed for the caller to traverse even when invalid; the
                // walker records the fetch failure against the child itself
                report.child_sitemaps.push(loc);
            }
        }

        if let Some(lastmod) = element_text(*entry, "lastmod") {
            if !is_valid_w3c_date(&lastmod) {
                report.warn(format!("{}: <lastmod> is not a valid W3C date: {}", label, lastmod));
            }
        }
    }
}

// Rules for <urlset>: everything the index checks, plus the URL ceiling,
// duplicate detection, unencoded spaces, bare ampersands, <changefreq>
// and <priority>
fn validate_url_set(
    root: roxmltree::Node<'_, '_>,
    report: &mut ValidationReport,
    limits: Limits,
    bare_amp_locs: &HashSet<String>,
) {
    let entries: Vec<_> = child_elements(root, "url").collect();

    if entries.is_empty() {
        report.warn("URL set contains no URLs");
    }
    if entries.len() > limits.max_urls {
        report.error(format!(
            "URL set contains {} URLs, exceeding the {} URL limit",
            entries.len(),
            limits.max_urls
        ));
    }

    let mut seen = HashSet::new();

    for (position, entry) in entries.iter().enumerate() {
        let label = format!("URL entry {}", position + 1);

        match element_text(*entry, "loc") {
            None => report.error(format!("{}: missing <loc>", label)),
            Some(loc) => {
                if !seen.insert(loc.clone()) {
                    report.warn(format!("duplicate URL: {}", loc));
                }
                if !is_valid_sitemap_url(&loc) {
                    report.error(format!("{}: <loc> is not a valid absolute http(s) URL: {}", label, loc));
                }
                if loc.chars().any(char::is_whitespace) {
                    report.error(format!("{}: URL contains unencoded space: {}", label, loc));
                }
                if bare_amp_locs.contains(&loc) {
                    report.error(format!("{}: URL contains unescaped ampersand: {}", label, loc));
                }
            }
        }

        if let Some(lastmod) = element_text(*entry, "lastmod") {
            if !is_valid_w3c_date(&lastmod) {
                report.warn(format!("{}: <lastmod> is not a valid W3C date: {}", label, lastmod));
            }
        }
        if let Some(changefreq) = element_text(*entry, "changefreq") {
            if !is_valid_changefreq(&changefreq) {
                report.warn(format!("{}: <changefreq> is not a recognized value: {}", label, changefreq));
            }
        }
        if let Some(priority) = element_text(*entry, "priority") {
            if !is_valid_priority(&priority) {
                report.warn(format!("{}: <priority> is not a number in [0.0, 1.0]: {}", label, priority));
            }
        }
    }
}

// Child elements with the given local name, in document order
//
// Matching on the local name (ignoring the namespace) keeps entry-level
// rules observable even when the namespace declaration itself is wrong -
// that problem is already reported once by check_namespace.
fn child_elements<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> {
    parent
        .children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

// Trimmed text of the first child element with the given name
//
// Trimming matters: pretty-printed sitemaps put newlines and indentation
// inside <loc>, and those must not trip the whitespace rule.
fn element_text(parent: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    child_elements(parent, name)
        .next()
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
}

// Pulls the page URLs out of a <urlset> without validating anything
//
// The health sweep wants the URLs themselves so it can sample and
// status-check them; validation findings are a separate concern.
// Indexes and unparseable documents yield an empty list.
pub fn extract_page_urls(raw: &str) -> Vec<String> {
    let repaired = escape_bare_ampersands(raw);
    let doc = match roxmltree::Document::parse(&repaired) {
        Ok(doc) => doc,
        Err(_) => return Vec::new(),
    };
    let root = doc.root_element();
    if root.tag_name().name() != "urlset" {
        return Vec::new();
    }
    child_elements(root, "url")
        .filter_map(|entry| element_text(entry, "loc"))
        .collect()
}

// Raw <loc> values that carry a bare ampersand, keyed by their decoded form
// so they can be matched against what the parsed tree hands back
static RAW_LOC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<loc>\s*(.*?)\s*</loc>").unwrap());

fn locs_with_bare_ampersands(raw: &str) -> HashSet<String> {
    RAW_LOC
        .captures_iter(raw)
        .filter_map(|cap| {
            let loc = cap.get(1)?.as_str();
            has_bare_ampersand(loc).then(|| decode_basic_entities(loc))
        })
        .collect()
}
