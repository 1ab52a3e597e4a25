//! Key validation and result filtering.
//!
//! Every raw string a source returns passes through this module before it
//! can reach a sink. In subdomain mode a result must be a valid hostname and
//! must equal the key or sit below it (`*.key`). This is the only gate
//! keeping a misbehaving source from injecting unrelated hosts into output.

use std::collections::BTreeSet;
use std::net::IpAddr;

use crate::types::LookupMode;

/// Maximum length of a full hostname in presentation format.
const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single label.
const MAX_LABEL_LEN: usize = 63;

/// Returns `true` if `s` is a syntactically valid ASCII hostname.
///
/// Rules:
/// - at least two labels separated by `.`
/// - each label 1–63 characters of `[A-Za-z0-9-]`
/// - no label starts or ends with `-`
/// - the final label is at least two characters and not all digits, which
///   also rules out IPv4 literals
/// - total length at most 253
pub fn is_valid_domain(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_DOMAIN_LEN || !s.is_ascii() {
        return false;
    }

    let labels: Vec<&str> = s.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    if labels
        .last()
        .is_some_and(|tld| tld.len() < 2 || tld.bytes().all(|b| b.is_ascii_digit()))
    {
        return false;
    }

    labels.iter().all(|label| is_valid_label(label))
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Returns `true` if `s` is an IPv4 or IPv6 literal.
pub fn is_valid_ip(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok()
}

/// Canonicalize a raw candidate string from a source.
///
/// Trims whitespace, drops a trailing root dot and a leading `*.` wildcard
/// label, and lowercases. Returns `None` if nothing is left.
pub fn normalize_candidate(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('.');
    let trimmed = trimmed.strip_prefix("*.").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}

/// Keep only candidates equal to `domain` or ending with `.domain`.
///
/// Candidates are normalized first; anything that is not a valid hostname
/// afterwards is dropped silently.
pub fn filter_valid_subdomains<I, S>(candidates: I, domain: &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let Some(domain) = normalize_candidate(domain) else {
        return BTreeSet::new();
    };
    let suffix = format!(".{domain}");

    candidates
        .into_iter()
        .filter_map(|c| normalize_candidate(c.as_ref()))
        .filter(|c| is_valid_domain(c))
        .filter(|c| *c == domain || c.ends_with(&suffix))
        .collect()
}

/// Keep only candidates that are valid hostnames.
///
/// Used for reverse-IP lookups, where results have no relation to the key.
pub fn filter_valid_hostnames<I, S>(candidates: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .filter_map(|c| normalize_candidate(c.as_ref()))
        .filter(|c| is_valid_domain(c))
        .collect()
}

impl LookupMode {
    /// Returns `true` if `key` is a well-formed input key for this mode.
    pub fn accepts_key(&self, key: &str) -> bool {
        match self {
            Self::Subdomain => is_valid_domain(key),
            Self::ReverseIp => is_valid_ip(key),
        }
    }

    /// Apply this mode's result filter to a source's raw output for `key`.
    pub fn filter_results<I, S>(&self, candidates: I, key: &str) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self {
            Self::Subdomain => filter_valid_subdomains(candidates, key),
            Self::ReverseIp => filter_valid_hostnames(candidates),
        }
    }
}
