//! Parsing of clusterset-local query names.
//!
//! The recognized shape is `<service>.<namespace>.svc.clusterset.local`,
//! optionally terminated by a single trailing dot. Labels in front of the
//! service are accepted and ignored.

use crate::config::SuffixCase;

/// Label separator.
pub const LABEL_SEPARATOR: char = '.';

/// The suffix labels, outermost last.
pub const CLUSTERSET_SUFFIX: [&str; 3] = ["svc", "clusterset", "local"];

/// The clusterset domain as a dotted string.
pub const CLUSTERSET_DOMAIN: &str = "svc.clusterset.local";

/// Minimum label count of a valid name.
pub const MIN_LABELS: usize = 5;

/// Result of parsing a query name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Service label.
    pub service: String,
    /// Namespace label.
    pub namespace: String,
    /// Whether the name had the clusterset-local shape.
    pub valid: bool,
}

impl ParsedQuery {
    /// An invalid result with empty labels.
    #[must_use]
    pub fn invalid() -> Self {
        Self::default()
    }

    /// A valid result.
    #[must_use]
    pub fn new(service: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            namespace: namespace.into(),
            valid: true,
        }
    }

    /// Returns the canonical name for this service, with trailing dot.
    #[must_use]
    pub fn fqdn(&self) -> String {
        format!("{}.{}.{CLUSTERSET_DOMAIN}.", self.service, self.namespace)
    }
}

/// Parses clusterset-local names.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainParser {
    suffix_case: SuffixCase,
}

impl DomainParser {
    /// Creates a parser with the given suffix comparison.
    #[must_use]
    pub const fn new(suffix_case: SuffixCase) -> Self {
        Self { suffix_case }
    }

    /// Parses `name` into service and namespace.
    #[must_use]
    pub fn parse(&self, name: &str) -> ParsedQuery {
        let name = name.strip_suffix(LABEL_SEPARATOR).unwrap_or(name);
        let labels: Vec<&str> = name.split(LABEL_SEPARATOR).collect();

        if labels.len() < MIN_LABELS {
            return ParsedQuery::invalid();
        }

        let (head, suffix) = labels.split_at(labels.len() - CLUSTERSET_SUFFIX.len());
        let suffix_matches = suffix
            .iter()
            .zip(CLUSTERSET_SUFFIX)
            .all(|(label, expected)| self.label_eq(label, expected));
        if !suffix_matches {
            return ParsedQuery::invalid();
        }

        let namespace = head[head.len() - 1];
        let service = head[head.len() - 2];
        if service.is_empty() || namespace.is_empty() {
            return ParsedQuery::invalid();
        }

        ParsedQuery::new(service, namespace)
    }

    fn label_eq(&self, label: &str, expected: &str) -> bool {
        match self.suffix_case {
            SuffixCase::Exact => label == expected,
            SuffixCase::IgnoreAsciiCase => label.eq_ignore_ascii_case(expected),
        }
    }
}

/// Parses `name` with literal suffix comparison.
#[must_use]
pub fn parse_clusterset_name(name: &str) -> ParsedQuery {
    DomainParser::default().parse(name)
}

/// Appends a trailing dot unless one is present.
#[must_use]
pub fn normalize_query_name(name: &str) -> String {
    if name.ends_with(LABEL_SEPARATOR) {
        name.to_string()
    } else {
        format!("{name}{LABEL_SEPARATOR}")
    }
}
