use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::practice_attempt::{AttemptSummary, PracticeAttempt};
use crate::models::problem::{
    CodingDetails, MultipleChoiceDetails, Problem, ProblemDetails, ProblemType, ShortAnswerDetails,
    TestCase, DEFAULT_MAX_ATTEMPTS,
};
use crate::services::grading_service::TestCaseOutcome;
use crate::services::session_rules;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySection {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProblemPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(custom(function = "crate::utils::validation::validate_difficulty"))]
    pub difficulty: String,
    #[validate(custom(function = "crate::utils::validation::validate_problem_type"))]
    pub problem_type: String,
    #[validate(range(min = 0, max = 1000))]
    pub points: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: Option<i32>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_public: Option<bool>,
    #[validate(range(min = 1, max = 600))]
    pub estimated_time: Option<i32>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub learning_resources: Vec<JsonValue>,
    #[serde(default)]
    pub study_sections: Vec<StudySection>,

    // coding
    #[serde(default)]
    pub allowed_languages: Vec<String>,
    pub time_limit: Option<i32>,
    pub memory_limit: Option<i32>,
    pub starter_code: Option<String>,
    pub solution: Option<String>,
    #[serde(default)]
    pub visible_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub hidden_test_cases: Vec<TestCase>,

    // multiple choice
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: Option<i32>,
    pub explanation: Option<String>,

    // short answer
    pub answer_template: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub max_char_limit: Option<i32>,
}

impl ProblemPayload {
    pub fn kind(&self) -> Result<ProblemType> {
        ProblemType::parse(&self.problem_type)
            .ok_or_else(|| Error::BadRequest(format!("Unknown problem type '{}'", self.problem_type)))
    }

    pub fn max_attempts_or_default(&self) -> i32 {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    /// Type-specific payload, checked.
    pub fn details(&self) -> Result<ProblemDetails> {
        let details = match self.kind()? {
            ProblemType::Coding => ProblemDetails::Coding(CodingDetails {
                allowed_languages: self
                    .allowed_languages
                    .iter()
                    .map(|l| l.trim().to_lowercase())
                    .filter(|l| !l.is_empty())
                    .collect(),
                time_limit: self.time_limit,
                memory_limit: self.memory_limit,
                starter_code: self.starter_code.clone(),
                solution: self.solution.clone(),
                visible_test_cases: self.visible_test_cases.clone(),
                hidden_test_cases: self.hidden_test_cases.clone(),
            }),
            ProblemType::MultipleChoice => ProblemDetails::MultipleChoice(MultipleChoiceDetails {
                options: self.options.clone(),
                correct_answer: self.correct_answer.ok_or_else(|| {
                    Error::BadRequest("correct_answer is required for multiple choice".into())
                })?,
                explanation: self.explanation.clone(),
            }),
            ProblemType::ShortAnswer => ProblemDetails::ShortAnswer(ShortAnswerDetails {
                answer_template: self.answer_template.clone(),
                keywords: self
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect(),
                max_char_limit: self.max_char_limit,
            }),
        };
        details.check()?;
        Ok(details)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProblemListQuery {
    pub category_id: Option<Uuid>,
    pub difficulty: Option<String>,
    pub problem_type: Option<String>,
    pub search: Option<String>,
}

/// Body of `POST /practice-problems/:id/attempt`. Coding sends `code_submission`,
/// the other types send `answer`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitAttemptPayload {
    pub answer: Option<JsonValue>,
    #[validate(length(max = 100000))]
    pub code_submission: Option<String>,
    pub language: Option<String>,
    /// Unix seconds when the candidate started.
    pub start_time: Option<f64>,
    #[validate(range(min = 0))]
    pub time_taken: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResultResponse {
    pub attempt_id: Uuid,
    pub passed: bool,
    pub score: i32,
    pub max_score: i32,
    pub points_earned: i32,
    pub attempt_number: i32,
    pub remaining_attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_results: Option<Vec<TestCaseOutcome>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResponse {
    pub id: Uuid,
    pub problem_id: Uuid,
    pub problem_title: Option<String>,
    pub session_id: Option<Uuid>,
    pub answer: JsonValue,
    pub language: Option<String>,
    pub score: i32,
    pub max_score: i32,
    pub passed: bool,
    pub points_earned: i32,
    pub time_taken: Option<i32>,
    pub attempt_number: i32,
    pub test_case_results: Option<JsonValue>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl AttemptResponse {
    pub fn new(attempt: PracticeAttempt, problem_title: Option<String>) -> Self {
        Self {
            id: attempt.id,
            problem_id: attempt.problem_id,
            problem_title,
            session_id: attempt.session_id,
            answer: attempt.answer,
            language: attempt.language,
            score: attempt.score,
            max_score: attempt.max_score,
            passed: attempt.passed,
            points_earned: attempt.points_earned,
            time_taken: attempt.time_taken,
            attempt_number: attempt.attempt_number,
            test_case_results: attempt.test_case_results,
            created_at: attempt.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatisticsResponse {
    pub problems_solved: i64,
    pub success_rate: f64,
    /// Seconds per attempt.
    pub avg_time: f64,
    pub streak: i64,
    pub total_attempts: i64,
    pub total_points: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveProblemPayload {
    pub problem_id: Uuid,
}

/// Problem as JSON. Candidates get the redacted form plus their own progress.
pub fn problem_json(
    problem: &Problem,
    include_answers: bool,
    progress: Option<&AttemptSummary>,
) -> Result<JsonValue> {
    let details = problem.parsed_details()?;
    let mut value = json!({
        "id": problem.id,
        "title": problem.title,
        "description": problem.description,
        "difficulty": problem.difficulty,
        "problem_type": problem.problem_type,
        "points": problem.points,
        "max_attempts": problem.max_attempts,
        "category_id": problem.category_id,
        "tags": problem.tags,
        "is_public": problem.is_public,
        "estimated_time": problem.estimated_time,
        "hints": problem.hints,
        "learning_resources": problem.learning_resources,
        "study_sections": problem.study_sections,
        "created_at": problem.created_at,
        "updated_at": problem.updated_at,
    });
    let extra = if include_answers {
        serde_json::to_value(&details)?
    } else {
        details.redacted()
    };
    merge_object(&mut value, extra);

    if !include_answers {
        let attempt_count = progress.map(|p| p.attempt_count).unwrap_or(0);
        merge_object(
            &mut value,
            json!({
                "attempt_count": attempt_count,
                "remaining_attempts": session_rules::remaining_attempts(problem.max_attempts, attempt_count),
                "best_score": progress.map(|p| p.best_score),
                "passed": progress.map(|p| p.ever_passed).unwrap_or(false),
            }),
        );
    }
    Ok(value)
}

fn merge_object(target: &mut JsonValue, extra: JsonValue) {
    if let (Some(target), JsonValue::Object(extra)) = (target.as_object_mut(), extra) {
        for (k, v) in extra {
            target.insert(k, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(problem_type: &str) -> ProblemPayload {
        serde_json::from_value(json!({
            "title": "Two Sum",
            "description": "Find two numbers",
            "difficulty": "Easy",
            "problem_type": problem_type,
        }))
        .unwrap()
    }

    #[test]
    fn defaults_max_attempts_to_three() {
        assert_eq!(payload("coding").max_attempts_or_default(), 3);
    }

    #[test]
    fn coding_without_tests_is_rejected() {
        assert!(payload("coding").details().is_err());
    }

    #[test]
    fn hyphenated_multiple_choice_builds_details() {
        let mut p = payload("multiple-choice");
        p.options = vec!["a".into(), "b".into()];
        p.correct_answer = Some(0);
        assert!(p.validate().is_ok());
        assert_eq!(p.details().unwrap().problem_type(), ProblemType::MultipleChoice);
    }

    #[test]
    fn unknown_difficulty_fails_validation() {
        let mut p = payload("coding");
        p.difficulty = "Impossible".into();
        assert!(p.validate().is_err());
    }
}
