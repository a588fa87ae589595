// 🔍 Similarity Detector - Flag near-duplicate catalog names
//
// Operator aid, never an automatic action: flagged pairs feed the merge
// dialog, where a human confirms. Over- and under-flagging are both
// acceptable — a merge can always be invoked manually on any two items.
//
// Two rules, applied to names with all whitespace removed and lowercased:
// containment (one is a substring of the other) and shared prefix
// (char lengths within tolerance and an identical prefix of min(len)-1
// chars). Cheap on purpose; brand catalogs are tens to low hundreds of
// items, so the O(n²) sweep is fine.

use serde::{Deserialize, Serialize};

// ============================================================================
// MATCH RULE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchRule {
    /// One normalized name contains the other.
    Containment,

    /// Lengths within tolerance and identical prefix up to min(len) - 1.
    SharedPrefix,
}

// ============================================================================
// CANDIDATES AND PAIRS
// ============================================================================

/// One item to screen. Build these from a brand's masters (the usual case)
/// or from a single vehicle's entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityCandidate {
    pub id: String,
    pub name: String,
}

/// An unordered pair the operator should review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarPair {
    pub left_id: String,
    pub right_id: String,
    pub left_name: String,
    pub right_name: String,
    pub rule: MatchRule,
    pub reason: String,
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct SimilarityDetector {
    /// Max char-length difference for the shared-prefix rule (default: 2).
    pub length_tolerance: usize,
}

impl SimilarityDetector {
    pub fn new() -> Self {
        SimilarityDetector {
            length_tolerance: 2,
        }
    }

    /// Compare every unordered pair once; (a,b) and (b,a) are the same
    /// pair and an item never pairs with itself.
    pub fn find_similar_pairs(&self, items: &[SimilarityCandidate]) -> Vec<SimilarPair> {
        let mut pairs = Vec::new();

        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let left = &items[i];
                let right = &items[j];

                if let Some(rule) = self.compare(&left.name, &right.name) {
                    let reason = match rule {
                        MatchRule::Containment => format!(
                            "'{}' and '{}' match by containment after normalization",
                            left.name, right.name
                        ),
                        MatchRule::SharedPrefix => format!(
                            "'{}' and '{}' share a prefix and differ by at most {} chars",
                            left.name, right.name, self.length_tolerance
                        ),
                    };

                    pairs.push(SimilarPair {
                        left_id: left.id.clone(),
                        right_id: right.id.clone(),
                        left_name: left.name.clone(),
                        right_name: right.name.clone(),
                        rule,
                        reason,
                    });
                }
            }
        }

        pairs
    }

    /// Apply both rules to one name pair. Symmetric in its arguments.
    /// Names that normalize to nothing are skipped entirely: an empty
    /// string is a substring of everything and would pair with the whole
    /// list (the integrity auditor flags blank names instead).
    pub fn compare(&self, left: &str, right: &str) -> Option<MatchRule> {
        let a = normalize_name(left);
        let b = normalize_name(right);

        if a.is_empty() || b.is_empty() {
            return None;
        }

        if a.contains(&b) || b.contains(&a) {
            return Some(MatchRule::Containment);
        }

        // Char-based, not byte-based: catalog names are rarely ASCII
        let a_chars: Vec<char> = a.chars().collect();
        let b_chars: Vec<char> = b.chars().collect();
        let (shorter, longer) = if a_chars.len() <= b_chars.len() {
            (&a_chars, &b_chars)
        } else {
            (&b_chars, &a_chars)
        };

        if longer.len() - shorter.len() > self.length_tolerance {
            return None;
        }

        let prefix_len = shorter.len() - 1;
        if shorter[..prefix_len] == longer[..prefix_len] {
            return Some(MatchRule::SharedPrefix);
        }

        None
    }
}

impl Default for SimilarityDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove all whitespace, then lowercase.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

// ============================================================================
// TESTS
// ============================================================================
