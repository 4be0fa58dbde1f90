//! Admissibility check for observed domain names.
//!
//! Sources emit whatever looks like a hostname in their input, so most of the
//! noise (bare hostnames, mDNS names, junk tokens) is filtered here rather
//! than at every call site.

use regex::Regex;
use std::sync::LazyLock;

/// Lower bound on name length. The grammar also needs a final label of at
/// least two characters, so the shortest name actually admitted is `a.bc`.
pub const MIN_DOMAIN_LENGTH: usize = 3;

/// Longest admissible name in presentation form (RFC 1035).
pub const MAX_DOMAIN_LENGTH: usize = 253;

/// Suffixes reserved for link-local resolution; never submitted.
const LOCAL_SUFFIXES: [&str; 2] = [".local", ".localhost"];

/// DNS name grammar: labels of `[a-z0-9-]`, 1-63 chars, no leading or
/// trailing hyphen, joined by dots. Unanchored on purpose: the check is a
/// search, so callers strip surrounding punctuation first.
static DNS_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9][a-z0-9-]{0,61}[a-z0-9]")
        .expect("DNS name pattern is valid")
});

/// Returns `true` if `candidate` may be admitted to the domain queue.
///
/// # Rules
///
/// 1. Length within [`MIN_DOMAIN_LENGTH`]..=[`MAX_DOMAIN_LENGTH`]
/// 2. Not under `.local` or `.localhost` (compared case-insensitively)
/// 3. At least two dot-separated parts
/// 4. Contains a well-formed DNS name
///
/// The check is pure and case-insensitive; the queue stores the lowercased
/// form.
///
/// # Examples
///
/// ```
/// use pdns_sensor::utils::domain_validator::is_valid_domain;
///
/// assert!(is_valid_domain("example.com"));
/// assert!(is_valid_domain("API.Example.ORG"));
/// assert!(!is_valid_domain("example"));
/// assert!(!is_valid_domain("printer.local"));
/// ```
pub fn is_valid_domain(candidate: &str) -> bool {
    if candidate.len() < MIN_DOMAIN_LENGTH || candidate.len() > MAX_DOMAIN_LENGTH {
        return false;
    }

    if LOCAL_SUFFIXES
        .iter()
        .any(|suffix| ends_with_ignore_ascii_case(candidate, suffix))
    {
        return false;
    }

    if candidate.split('.').count() < 2 {
        return false;
    }

    DNS_NAME_REGEX.is_match(candidate)
}

fn ends_with_ignore_ascii_case(value: &str, suffix: &str) -> bool {
    value.len() >= suffix.len()
        && value.as_bytes()[value.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_names() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("www.example.org"));
        assert!(is_valid_domain("a-b.c-d.example.co.uk"));
        assert!(is_valid_domain("xn--80ak6aa92e.com"));
        assert!(is_valid_domain("1.2.3.io"));
    }

    #[test]
    fn test_rejects_length_bounds() {
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("a."));

        let label = "a".repeat(63);
        let long = format!("{label}.{label}.{label}.{label}.com");
        assert!(long.len() > MAX_DOMAIN_LENGTH);
        assert!(!is_valid_domain(&long));

        let max = format!("{label}.{label}.{label}.{}", "b".repeat(61));
        assert_eq!(max.len(), MAX_DOMAIN_LENGTH);
        assert!(is_valid_domain(&max));
    }

    #[test]
    fn test_shortest_admitted_name() {
        assert_eq!("a.b".len(), MIN_DOMAIN_LENGTH);
        assert!(!is_valid_domain("a.b"));
        assert!(is_valid_domain("a.bc"));
    }

    #[test]
    fn test_rejects_single_label() {
        assert!(!is_valid_domain("example"));
        assert!(!is_valid_domain("localhost"));
    }

    #[test]
    fn test_rejects_local_suffixes() {
        assert!(!is_valid_domain("x.local"));
        assert!(!is_valid_domain("printer.local"));
        assert!(!is_valid_domain("x.localhost"));
        assert!(!is_valid_domain("Printer.LOCAL"));
    }

    #[test]
    fn test_local_suffix_requires_label_boundary() {
        assert!(is_valid_domain("example.locale.com"));
        assert!(is_valid_domain("mylocal.com"));
    }

    #[test]
    fn test_rejects_malformed_labels() {
        assert!(!is_valid_domain("-.-"));
        assert!(!is_valid_domain("..."));
        assert!(!is_valid_domain("a_b.c_d"));
        // The final label must be at least two characters long.
        assert!(!is_valid_domain("example.c"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(is_valid_domain("EXAMPLE.COM"));
        assert!(is_valid_domain("Mixed.Case.Net"));
    }

    #[test]
    fn test_unanchored_search_accepts_embedded_name() {
        assert!(is_valid_domain("_dmarc.example.com"));
        assert!(is_valid_domain("example.com:"));
    }
}
