//! Cross-record business rules for participants.
//!
//! # Responsibility
//! - Check that the participation total stays within 100%.
//! - Check that first+last name combinations stay unique.
//!
//! # Invariants
//! - Rules only read through the repository; they never write.
//! - Callers that act on a passing check must run it inside
//!   `ParticipantRepository::write_atomically` together with the write.

use crate::model::participant::{ParticipantId, PARTICIPATION_MAX};
use crate::repo::participant_repo::{ParticipantRepository, RepoResult};

/// Absorbs float summation noise: `0.2 + 83.9 + 15.9` sums to
/// `100.00000000000001` in `f64`.
const TOTAL_EPSILON: f64 = 1e-9;

/// Outcome of the participation-total rule.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalCheck {
    pub valid: bool,
    /// Sum over stored participants, minus the excluded one.
    pub current_total: f64,
    /// `current_total + candidate`.
    pub new_total: f64,
    pub error: Option<String>,
}

impl TotalCheck {
    /// Headroom left before the cap: `100 - current_total`.
    pub fn max_allowed(&self) -> f64 {
        PARTICIPATION_MAX - self.current_total
    }
}

/// Outcome of the name-uniqueness rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueCheck {
    pub valid: bool,
    pub error: Option<String>,
}

/// Checks whether adding `candidate` keeps the total at or below 100%.
///
/// `exclude` skips the record being edited so its old value is not counted.
/// Totals up to `100 + 1e-9` still pass, so decimal inputs that add up to
/// exactly 100 are not rejected over binary rounding.
pub fn validate_total<R: ParticipantRepository>(
    repo: &R,
    candidate: f64,
    exclude: Option<ParticipantId>,
) -> RepoResult<TotalCheck> {
    let current_total = repo.participation_total(exclude)?;
    Ok(evaluate_total(current_total, candidate))
}

/// Pure form of [`validate_total`] over an already-known total.
pub fn evaluate_total(current_total: f64, candidate: f64) -> TotalCheck {
    let new_total = current_total + candidate;

    if new_total > PARTICIPATION_MAX + TOTAL_EPSILON {
        return TotalCheck {
            valid: false,
            current_total,
            new_total,
            error: Some(format!(
                "Total participation would be {}%, which exceeds 100%. Current total is {}%, so the maximum allowed participation is {}%.",
                format_percent(new_total),
                format_percent(current_total),
                format_percent(PARTICIPATION_MAX - current_total),
            )),
        };
    }

    TotalCheck {
        valid: true,
        current_total,
        new_total,
        error: None,
    }
}

/// Checks that no other participant already uses `first_name last_name`.
///
/// Comparison ignores ASCII case.
pub fn validate_unique<R: ParticipantRepository>(
    repo: &R,
    first_name: &str,
    last_name: &str,
    exclude: Option<ParticipantId>,
) -> RepoResult<UniqueCheck> {
    if repo.find_by_name(first_name, last_name, exclude)?.is_some() {
        return Ok(UniqueCheck {
            valid: false,
            error: Some(duplicate_name_message(first_name, last_name)),
        });
    }

    Ok(UniqueCheck {
        valid: true,
        error: None,
    })
}

pub(crate) fn duplicate_name_message(first_name: &str, last_name: &str) -> String {
    format!("A participant with the name \"{first_name} {last_name}\" already exists.")
}

/// Formats a percentage with at most two decimals and no trailing `.0`.
pub fn format_percent(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{rounded}")
}
