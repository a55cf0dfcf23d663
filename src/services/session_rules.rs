use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::utils::time::elapsed_secs;

/// Attempts still allowed on a problem. Never negative.
pub fn remaining_attempts(max_attempts: i32, attempt_count: i64) -> i64 {
    (i64::from(max_attempts) - attempt_count).max(0)
}

pub fn can_retake(max_attempts: i32, attempt_count: i64) -> bool {
    attempt_count < i64::from(max_attempts)
}

/// A problem unlocks once the one before it has been attempted.
pub fn is_available(index: usize, completed: &[bool]) -> bool {
    index == 0 || completed.get(index - 1).copied().unwrap_or(false)
}

pub fn time_remaining(time_limit_secs: i32, started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (i64::from(time_limit_secs) - elapsed_secs(started_at, now)).max(0)
}

pub fn time_spent(time_limit_secs: i32, started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    elapsed_secs(started_at, now).min(i64::from(time_limit_secs))
}

pub fn is_expired(time_limit_secs: i32, started_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    time_remaining(time_limit_secs, started_at, now) == 0
}

pub fn is_finished(problems_completed: i32, total_problems: i32) -> bool {
    problems_completed >= total_problems
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProblemAction {
    Start,
    Locked,
    Retake { attempts: i64, max_attempts: i32 },
    Review,
    NoAttemptsLeft,
}

impl ProblemAction {
    pub fn label(&self) -> String {
        match self {
            ProblemAction::Start => "Start Problem".to_string(),
            ProblemAction::Locked => "Locked".to_string(),
            ProblemAction::Retake { attempts, max_attempts } => {
                format!("Retake Problem ({}/{})", attempts, max_attempts)
            }
            ProblemAction::Review => "Review Problem".to_string(),
            ProblemAction::NoAttemptsLeft => "No Attempts Left".to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ProblemAction::Start | ProblemAction::Retake { .. })
    }
}

/// What the candidate can do with a problem card in a session.
pub fn problem_action(
    available: bool,
    completed: bool,
    passed: bool,
    attempt_count: i64,
    max_attempts: i32,
) -> ProblemAction {
    if completed {
        if can_retake(max_attempts, attempt_count) {
            ProblemAction::Retake {
                attempts: attempt_count,
                max_attempts,
            }
        } else if passed {
            ProblemAction::Review
        } else {
            ProblemAction::NoAttemptsLeft
        }
    } else if available {
        ProblemAction::Start
    } else {
        ProblemAction::Locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn remaining_attempts_never_negative() {
        assert_eq!(remaining_attempts(3, 0), 3);
        assert_eq!(remaining_attempts(3, 2), 1);
        assert_eq!(remaining_attempts(3, 3), 0);
        assert_eq!(remaining_attempts(3, 7), 0);
    }

    #[test]
    fn second_problem_unlocks_after_first() {
        let completed = [true, false, false];
        assert!(is_available(0, &completed));
        assert!(is_available(1, &completed));
        assert!(!is_available(2, &completed));
    }

    #[test]
    fn first_problem_always_available() {
        assert!(is_available(0, &[]));
    }

    #[test]
    fn time_remaining_clamps_at_zero() {
        let start = t0();
        assert_eq!(time_remaining(600, start, start + Duration::seconds(100)), 500);
        assert_eq!(time_remaining(600, start, start + Duration::seconds(600)), 0);
        assert_eq!(time_remaining(600, start, start + Duration::seconds(9000)), 0);
        assert!(is_expired(600, start, start + Duration::seconds(601)));
        assert!(!is_expired(600, start, start + Duration::seconds(599)));
    }

    #[test]
    fn time_spent_is_bounded_by_limit() {
        let start = t0();
        assert_eq!(time_spent(60, start, start + Duration::seconds(30)), 30);
        assert_eq!(time_spent(60, start, start + Duration::seconds(90)), 60);
    }

    #[test]
    fn finished_when_all_problems_done() {
        assert!(!is_finished(2, 3));
        assert!(is_finished(3, 3));
    }

    #[test]
    fn single_attempt_failed_means_no_attempts_left() {
        assert!(!can_retake(1, 1));
        let action = problem_action(true, true, false, 1, 1);
        assert_eq!(action, ProblemAction::NoAttemptsLeft);
        assert_eq!(action.label(), "No Attempts Left");
        assert!(!action.is_enabled());
    }

    #[test]
    fn passed_and_exhausted_means_review() {
        assert_eq!(problem_action(true, true, true, 2, 2).label(), "Review Problem");
    }

    #[test]
    fn retake_label_shows_counts() {
        assert_eq!(problem_action(true, true, false, 1, 3).label(), "Retake Problem (1/3)");
    }

    #[test]
    fn untouched_problems_are_start_or_locked() {
        assert_eq!(problem_action(true, false, false, 0, 3), ProblemAction::Start);
        assert_eq!(problem_action(false, false, false, 0, 3), ProblemAction::Locked);
    }
}
