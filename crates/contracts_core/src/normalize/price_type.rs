//! Price-type label normalizer.
//!
//! # Responsibility
//! - Map raw price-type text onto a configured canonical label set.
//! - Recognize deliberately out-of-scope labels via an exclusion list.
//! - Surface low-confidence inputs as `Unknown` for manual review.
//!
//! # Invariants
//! - Policy order is fixed: exact canonical, exact exclusion, fuzzy nearest
//!   over both sets, then unknown.
//! - The three-way outcome never collapses into accept/reject; callers
//!   branch on all three variants.
//! - Candidate lists and the similarity threshold are injected configuration,
//!   never ambient state.

use crate::normalize::distance::levenshtein;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static NON_ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid token fold regex"));

/// Externally supplied normalizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Canonical labels, in priority order for tie-breaking.
    pub canonical: Vec<String>,
    /// Labels that look like price types but are deliberately out of scope.
    #[serde(default)]
    pub exclusions: Vec<String>,
    /// Maximum accepted edit distance as a fraction of the longer token
    /// length. Matches farther away resolve to `Unknown`.
    #[serde(default = "default_max_distance_ratio")]
    pub max_distance_ratio: f64,
}

fn default_max_distance_ratio() -> f64 {
    0.3
}

/// Configuration failure detected at normalizer construction.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizerConfigError {
    /// The canonical set must name at least one label.
    EmptyCanonicalSet,
    /// A configured label is blank or folds to an empty token.
    BlankLabel(String),
    /// Ratio must be in `(0, 1]`.
    InvalidDistanceRatio(f64),
}

impl Display for NormalizerConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCanonicalSet => write!(f, "canonical label set cannot be empty"),
            Self::BlankLabel(label) => write!(f, "configured label `{label}` is blank"),
            Self::InvalidDistanceRatio(ratio) => {
                write!(f, "max_distance_ratio must be in (0, 1], got {ratio}")
            }
        }
    }
}

impl Error for NormalizerConfigError {}

/// Three-way resolution outcome for one raw label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelResolution {
    /// Accepted onto the canonical set.
    Mapped { label: String, reason: String },
    /// Recognized as deliberately out of scope; callers discard the input.
    Excluded { rule: String, reason: String },
    /// No candidate within threshold; surfaced for manual review.
    Unknown { reason: String },
}

impl LabelResolution {
    /// Canonical label when mapped, `None` otherwise.
    pub fn mapped(&self) -> Option<&str> {
        match self {
            Self::Mapped { label, .. } => Some(label),
            _ => None,
        }
    }

    /// True only for the exclusion outcome.
    pub fn is_excluded(&self) -> bool {
        matches!(self, Self::Excluded { .. })
    }

    /// Decision trail for logs and review queues.
    pub fn reason(&self) -> &str {
        match self {
            Self::Mapped { reason, .. }
            | Self::Excluded { reason, .. }
            | Self::Unknown { reason } => reason,
        }
    }
}

#[derive(Debug, Clone)]
enum CandidateRole {
    Canonical,
    Exclusion,
}

#[derive(Debug, Clone)]
struct Candidate {
    /// Display form, as configured.
    label: String,
    /// Folded comparison token.
    token: String,
    role: CandidateRole,
}

/// Nearest-match resolver for price-type labels.
///
/// Construction folds every configured label once; `resolve` is pure and
/// cheap enough to call per price line.
#[derive(Debug, Clone)]
pub struct PriceTypeNormalizer {
    candidates: Vec<Candidate>,
    max_distance_ratio: f64,
}

impl PriceTypeNormalizer {
    /// Builds a normalizer from validated configuration.
    pub fn try_new(config: NormalizerConfig) -> Result<Self, NormalizerConfigError> {
        if config.canonical.is_empty() {
            return Err(NormalizerConfigError::EmptyCanonicalSet);
        }
        if !(config.max_distance_ratio > 0.0 && config.max_distance_ratio <= 1.0) {
            return Err(NormalizerConfigError::InvalidDistanceRatio(
                config.max_distance_ratio,
            ));
        }

        // Canonical candidates precede exclusions so that exact-match and
        // tie-break order follow the documented policy.
        let mut candidates = Vec::with_capacity(config.canonical.len() + config.exclusions.len());
        for label in config.canonical {
            candidates.push(build_candidate(label, CandidateRole::Canonical)?);
        }
        for label in config.exclusions {
            candidates.push(build_candidate(label, CandidateRole::Exclusion)?);
        }

        Ok(Self {
            candidates,
            max_distance_ratio: config.max_distance_ratio,
        })
    }

    /// Resolves one raw label to a canonical, excluded or unknown outcome.
    ///
    /// Never fails: low-confidence input is reported as `Unknown`.
    pub fn resolve(&self, raw_label: &str) -> LabelResolution {
        let trimmed = raw_label.trim();

        for candidate in &self.candidates {
            if candidate.label.eq_ignore_ascii_case(trimmed) {
                return candidate.outcome(format!("exact match on `{}`", candidate.label));
            }
        }

        let token = fold_token(trimmed);
        if token.is_empty() {
            return LabelResolution::Unknown {
                reason: "unknown type".to_string(),
            };
        }

        let mut best: Option<(usize, &Candidate)> = None;
        for candidate in &self.candidates {
            let distance = levenshtein(&token, &candidate.token);
            // Strict comparison keeps the earlier candidate on ties, which
            // makes resolution deterministic for equal-distance labels.
            if best.map_or(true, |(best_distance, _)| distance < best_distance) {
                best = Some((distance, candidate));
            }
        }

        if let Some((distance, candidate)) = best {
            let longer = token.chars().count().max(candidate.token.chars().count());
            if (distance as f64) <= self.max_distance_ratio * (longer as f64) {
                return candidate.outcome(format!(
                    "fuzzy match -> `{}` (distance {distance})",
                    candidate.label
                ));
            }
        }

        LabelResolution::Unknown {
            reason: "unknown type".to_string(),
        }
    }
}

impl Candidate {
    fn outcome(&self, reason: String) -> LabelResolution {
        match self.role {
            CandidateRole::Canonical => LabelResolution::Mapped {
                label: self.label.clone(),
                reason,
            },
            CandidateRole::Exclusion => LabelResolution::Excluded {
                rule: self.label.clone(),
                reason,
            },
        }
    }
}

fn build_candidate(label: String, role: CandidateRole) -> Result<Candidate, NormalizerConfigError> {
    let token = fold_token(&label);
    if token.is_empty() {
        return Err(NormalizerConfigError::BlankLabel(label));
    }
    Ok(Candidate { label, token, role })
}

/// Folds a label into its comparison token: lowercase alphanumerics only.
fn fold_token(label: &str) -> String {
    NON_ALNUM_RE
        .replace_all(&label.to_lowercase(), "")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::{fold_token, LabelResolution, NormalizerConfig, PriceTypeNormalizer};

    fn normalizer() -> PriceTypeNormalizer {
        PriceTypeNormalizer::try_new(NormalizerConfig {
            canonical: vec![
                "Contract Price".to_string(),
                "Contract Price at Time of Purchase".to_string(),
                "List at Time of Purchase/No Bid".to_string(),
                "Suspended".to_string(),
            ],
            exclusions: vec!["Discontinued".to_string()],
            max_distance_ratio: 0.3,
        })
        .unwrap()
    }

    #[test]
    fn fold_token_strips_case_punctuation_and_spaces() {
        assert_eq!(
            fold_token("List at Time of Purchase/No Bid"),
            "listattimeofpurchasenobid"
        );
    }

    #[test]
    fn exact_match_is_case_insensitive_and_trimmed() {
        let resolution = normalizer().resolve("  contract price  ");
        assert_eq!(resolution.mapped(), Some("Contract Price"));
        assert!(resolution.reason().starts_with("exact match"));
    }

    #[test]
    fn misspelled_label_maps_via_fuzzy_match() {
        let resolution = normalizer().resolve("Suspnded");
        assert_eq!(resolution.mapped(), Some("Suspended"));
        assert!(resolution.reason().contains("fuzzy match"));
    }

    #[test]
    fn exclusion_label_is_excluded_not_unknown() {
        let resolution = normalizer().resolve("Discontinued");
        assert!(resolution.is_excluded());
        assert_eq!(resolution.mapped(), None);
    }

    #[test]
    fn misspelled_exclusion_is_still_excluded() {
        let resolution = normalizer().resolve("Discontinuedd");
        assert!(resolution.is_excluded());
        assert!(resolution.reason().contains("fuzzy match"));
    }

    #[test]
    fn far_off_label_is_unknown_not_excluded() {
        let resolution = normalizer().resolve("Random Unknown Type");
        assert_eq!(
            resolution,
            LabelResolution::Unknown {
                reason: "unknown type".to_string()
            }
        );
        assert!(!resolution.is_excluded());
    }

    #[test]
    fn blank_input_is_unknown() {
        assert!(matches!(
            normalizer().resolve("   "),
            LabelResolution::Unknown { .. }
        ));
    }
}
