//! Finding deduplication, ordering and filtering.
//!
//! Two findings are duplicates iff their [`FindingKey`]s are equal: same
//! type, same normalized title, and same first 100 characters of the
//! normalized description. Matching is exact on those fields; there is no
//! fuzzy comparison.

use std::collections::{BTreeMap, HashSet};

use deckscope_state::{FindingRecord, FindingType, Severity};

/// Description prefix length that participates in the key.
pub const DESCRIPTION_KEY_CHARS: usize = 100;

/// Derived identity of a finding. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FindingKey {
    pub finding_type: FindingType,
    pub title: String,
    pub description_prefix: String,
}

impl FindingKey {
    pub fn of(finding: &FindingRecord) -> Self {
        let description = normalize(&finding.description);
        Self {
            finding_type: finding.finding_type,
            title: normalize(&finding.title),
            description_prefix: description.chars().take(DESCRIPTION_KEY_CHARS).collect(),
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Drop findings whose key was already seen, keeping first occurrences in order.
pub fn dedupe(findings: Vec<FindingRecord>) -> Vec<FindingRecord> {
    let mut seen = HashSet::new();
    findings
        .into_iter()
        .filter(|f| seen.insert(FindingKey::of(f)))
        .collect()
}

/// Flatten several finding lists, then [`dedupe`].
pub fn merge(lists: impl IntoIterator<Item = Vec<FindingRecord>>) -> Vec<FindingRecord> {
    dedupe(lists.into_iter().flatten().collect())
}

/// Stable sort, most severe first.
pub fn sort_by_severity(mut findings: Vec<FindingRecord>) -> Vec<FindingRecord> {
    findings.sort_by_key(|f| f.severity.rank());
    findings
}

/// Keep findings at least as severe as `threshold` (inclusive).
pub fn filter_by_severity(findings: Vec<FindingRecord>, threshold: Severity) -> Vec<FindingRecord> {
    findings
        .into_iter()
        .filter(|f| f.severity.rank() <= threshold.rank())
        .collect()
}

/// Number of findings per severity, most severe first.
pub fn count_by_severity(findings: &[FindingRecord]) -> BTreeMap<u8, (Severity, usize)> {
    let mut counts = BTreeMap::new();
    for f in findings {
        counts
            .entry(f.severity.rank())
            .or_insert((f.severity, 0usize))
            .1 += 1;
    }
    counts
}
