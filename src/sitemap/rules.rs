// src/sitemap/rules.rs
// =============================================================================
// This module holds the small, pure predicates behind sitemap validation:
//
// - W3C datetime validity (the <lastmod> format)
// - URL validity for <loc> fields (absolute http/https only)
// - The seven recognized <changefreq> values
// - <priority> parsing and range checking
// - Bare (unescaped) ampersand detection and repair
//
// Everything here is synchronous and side-effect free, which is why these
// rules get their own file: the validator stays readable and the predicates
// get direct unit tests.
//
// Rust concepts:
// - once_cell Lazy: compile each regex once, share it across calls
// - Cow<str>: return the input untouched unless we actually had to repair it
// =============================================================================

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use url::Url;

/// The sitemap protocol namespace every document must declare
pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// The seven values <changefreq> may take
pub const CHANGE_FREQUENCIES: [&str; 7] = [
    "always", "hourly", "daily", "weekly", "monthly", "yearly", "never",
];

// The four shapes a W3C datetime may take in a sitemap:
//   2024-01-15
//   2024-01-15T09:30+01:00      (numeric UTC offset, seconds optional)
//   2024-01-15T09:30:00Z        (literal Z, seconds optional)
//   2024-01-15T09:30:00.123Z    (fractional seconds, Z required)
static DATE_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static DATETIME_OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2})?[+-]\d{2}:\d{2}$").unwrap()
});
static DATETIME_Z: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2})?Z$").unwrap());
static DATETIME_FRAC_Z: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+Z$").unwrap());

// Rewrites "…Thh:mmZ" / "…Thh:mm+01:00" to include ":00" seconds so the
// string satisfies RFC 3339, which chrono's parser insists on
static MISSING_SECONDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2})(Z|[+-]\d{2}:\d{2})$").unwrap()
});

// An ampersand is fine only when it starts one of the XML entities
static XML_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^&(amp|lt|gt|apos|quot|#[0-9]+|#x[0-9a-fA-F]+);").unwrap());

// Checks whether a string is a valid W3C datetime
//
// Two conditions, both required:
// 1. The string matches one of the four shapes above
// 2. It parses to a real calendar instant (2024-02-31 matches the shape
//    but is not a date)
pub fn is_valid_w3c_date(value: &str) -> bool {
    if DATE_ONLY.is_match(value) {
        return NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
    }

    let shaped = DATETIME_OFFSET.is_match(value)
        || DATETIME_Z.is_match(value)
        || DATETIME_FRAC_Z.is_match(value);
    if !shaped {
        return false;
    }

    let normalized = MISSING_SECONDS.replace(value, "${1}:00${2}");
    DateTime::parse_from_rfc3339(&normalized).is_ok()
}

// Checks whether a <loc> value is an absolute http(s) URL
//
// Relative references, malformed strings, and other schemes (ftp, mailto)
// are all invalid for sitemap purposes.
pub fn is_valid_sitemap_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => url.scheme() == "http" || url.scheme() == "https",
        Err(_) => false,
    }
}

/// True when the value is one of the seven recognized change frequencies
pub fn is_valid_changefreq(value: &str) -> bool {
    CHANGE_FREQUENCIES.contains(&value)
}

/// True when the value parses as a number in [0.0, 1.0]
pub fn is_valid_priority(value: &str) -> bool {
    match value.trim().parse::<f64>() {
        Ok(p) => (0.0..=1.0).contains(&p),
        Err(_) => false,
    }
}

/// True when the string contains an '&' that does not begin an XML entity
pub fn has_bare_ampersand(value: &str) -> bool {
    value
        .match_indices('&')
        .any(|(pos, _)| !XML_ENTITY.is_match(&value[pos..]))
}

// Escapes every bare ampersand so a strict XML parser can proceed
//
// A strict parser rejects a bare '&' outright, which would collapse the
// per-URL ampersand rule into one opaque parse error for the whole
// document. The validator repairs the text first and reports the
// offending <loc> entries individually instead.
//
// Returns Cow::Borrowed when nothing needed repair (the common case).
pub fn escape_bare_ampersands(text: &str) -> Cow<'_, str> {
    if !has_bare_ampersand(text) {
        return Cow::Borrowed(text);
    }

    let mut repaired = String::with_capacity(text.len() + 8);
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        repaired.push_str(&rest[..pos]);
        if XML_ENTITY.is_match(&rest[pos..]) {
            repaired.push('&');
        } else {
            repaired.push_str("&amp;");
        }
        rest = &rest[pos + 1..];
    }
    repaired.push_str(rest);
    Cow::Owned(repaired)
}

// Minimal entity decoding for comparing raw <loc> text against the parsed
// value the XML tree hands back. Order matters: &amp; goes last so we do not
// double-decode "&amp;lt;".
pub fn decode_basic_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_only_shape() {
        assert!(is_valid_w3c_date("2024-01-15"));
        assert!(!is_valid_w3c_date("2024-1-15")); // shape requires zero padding
        assert!(!is_valid_w3c_date("15-01-2024"));
    }

    #[test]
    fn test_datetime_shapes() {
        assert!(is_valid_w3c_date("2024-01-15T09:30+01:00"));
        assert!(is_valid_w3c_date("2024-01-15T09:30:00+01:00"));
        assert!(is_valid_w3c_date("2024-01-15T09:30Z"));
        assert!(is_valid_w3c_date("2024-01-15T09:30:00Z"));
        assert!(is_valid_w3c_date("2024-01-15T09:30:00.123Z"));
        // fractional seconds without the Z are not one of the four shapes
        assert!(!is_valid_w3c_date("2024-01-15T09:30:00.123"));
        // space separator is not a W3C datetime
        assert!(!is_valid_w3c_date("2024-01-15 09:30:00Z"));
    }

    #[test]
    fn test_shape_alone_is_not_enough() {
        // matches the date shape, but Feb 31 is not a real day
        assert!(!is_valid_w3c_date("2024-02-31"));
        // matches the datetime shape, but hour 25 is not a real time
        assert!(!is_valid_w3c_date("2024-01-15T25:00:00Z"));
    }

    #[test]
    fn test_url_validity() {
        assert!(is_valid_sitemap_url("http://example.com/a"));
        assert!(is_valid_sitemap_url("https://example.com/a?b=1"));
        assert!(!is_valid_sitemap_url("/relative/path"));
        assert!(!is_valid_sitemap_url("ftp://example.com/a"));
        assert!(!is_valid_sitemap_url("not a url"));
    }

    #[test]
    fn test_changefreq_values() {
        for value in CHANGE_FREQUENCIES {
            assert!(is_valid_changefreq(value));
        }
        assert!(!is_valid_changefreq("fortnightly"));
        assert!(!is_valid_changefreq("Daily")); // case-sensitive per protocol
    }

    #[test]
    fn test_priority_range() {
        assert!(is_valid_priority("0.0"));
        assert!(is_valid_priority("0.5"));
        assert!(is_valid_priority("1.0"));
        assert!(is_valid_priority("1")); // integers parse too
        assert!(!is_valid_priority("1.5"));
        assert!(!is_valid_priority("-0.1"));
        assert!(!is_valid_priority("abc"));
    }

    #[test]
    fn test_bare_ampersand_detection() {
        assert!(has_bare_ampersand("http://a.com/?x=1&y=2"));
        assert!(!has_bare_ampersand("http://a.com/?x=1&amp;y=2"));
        assert!(!has_bare_ampersand("&#38; and &#x26; are escaped"));
        assert!(has_bare_ampersand("&amp; then & alone"));
    }

    #[test]
    fn test_escape_bare_ampersands_repairs_only_bare_ones() {
        let repaired = escape_bare_ampersands("a=1&b=2&amp;c=3");
        assert_eq!(repaired, "a=1&amp;b=2&amp;c=3");
        // untouched input comes back borrowed
        assert!(matches!(
            escape_bare_ampersands("clean &amp; tidy"),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_decode_basic_entities() {
        assert_eq!(
            decode_basic_entities("http://a.com/?x=1&amp;y=2"),
            "http://a.com/?x=1&y=2"
        );
    }
}
