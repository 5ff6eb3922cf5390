//! # Priority Engine
//!
//! Pure scoring of queue priority from customer eligibility flags.
//!
//! ## Scoring Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Priority Scoring                                   │
//! │                                                                         │
//! │  Regular customer                    score = 0                          │
//! │  Senior citizen                      score = 100                        │
//! │  Pregnant                            score = 100                        │
//! │  PWD                                 score = 100                        │
//! │  Senior citizen + PWD                score = 200   (additive!)          │
//! │  All three flags                     score = 300                        │
//! │                                                                         │
//! │  Ties (equal score) are broken by earliest created_at - FIFO.          │
//! │  The tie-break lives in the ordering comparator, not in the score:     │
//! │  the score is a pure function of the flags and nothing else.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The function is deterministic and total: every flag combination,
//! including all-false, produces a defined score.

use crate::types::PriorityFlags;

// =============================================================================
// Weights
// =============================================================================

/// Score contribution of the senior-citizen flag.
pub const SENIOR_CITIZEN_WEIGHT: i64 = 100;

/// Score contribution of the pregnant flag.
pub const PREGNANT_WEIGHT: i64 = 100;

/// Score contribution of the PWD flag.
pub const PWD_WEIGHT: i64 = 100;

// =============================================================================
// Scoring
// =============================================================================

/// Computes the priority score for a set of eligibility flags.
///
/// Weights are additive, not mutually exclusive: a customer with two flags
/// scores higher than one with a single flag. Regular customers score 0.
///
/// ## Example
/// ```rust
/// use pila_core::priority::priority_score;
/// use pila_core::types::PriorityFlags;
///
/// assert_eq!(priority_score(&PriorityFlags::default()), 0);
///
/// let senior_pwd = PriorityFlags {
///     senior_citizen: true,
///     pwd: true,
///     ..Default::default()
/// };
/// assert_eq!(priority_score(&senior_pwd), 200);
/// ```
pub const fn priority_score(flags: &PriorityFlags) -> i64 {
    let mut score = 0;
    if flags.senior_citizen {
        score += SENIOR_CITIZEN_WEIGHT;
    }
    if flags.pregnant {
        score += PREGNANT_WEIGHT;
    }
    if flags.pwd {
        score += PWD_WEIGHT;
    }
    score
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(senior_citizen: bool, pregnant: bool, pwd: bool) -> PriorityFlags {
        PriorityFlags {
            senior_citizen,
            pregnant,
            pwd,
        }
    }

    #[test]
    fn test_regular_customer_scores_zero() {
        assert_eq!(priority_score(&flags(false, false, false)), 0);
    }

    #[test]
    fn test_single_flags() {
        assert_eq!(priority_score(&flags(true, false, false)), SENIOR_CITIZEN_WEIGHT);
        assert_eq!(priority_score(&flags(false, true, false)), PREGNANT_WEIGHT);
        assert_eq!(priority_score(&flags(false, false, true)), PWD_WEIGHT);
    }

    #[test]
    fn test_flags_are_additive() {
        // Two flags outrank any single flag
        let two = priority_score(&flags(true, false, true));
        assert_eq!(two, SENIOR_CITIZEN_WEIGHT + PWD_WEIGHT);
        assert!(two > priority_score(&flags(true, false, false)));
        assert!(two > priority_score(&flags(false, false, true)));

        // All three outrank any two
        let three = priority_score(&flags(true, true, true));
        assert_eq!(three, SENIOR_CITIZEN_WEIGHT + PREGNANT_WEIGHT + PWD_WEIGHT);
        assert!(three > two);
    }

    #[test]
    fn test_total_over_all_combinations() {
        // Deterministic and non-negative for every combination
        for senior in [false, true] {
            for pregnant in [false, true] {
                for pwd in [false, true] {
                    let f = flags(senior, pregnant, pwd);
                    let score = priority_score(&f);
                    assert!(score >= 0);
                    assert_eq!(score, priority_score(&f), "must be deterministic");
                }
            }
        }
    }
}
