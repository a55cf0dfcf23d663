use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Problem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty: String,
    pub problem_type: String,
    pub points: i32,
    pub max_attempts: i32,
    pub category_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub estimated_time: Option<i32>,
    pub hints: JsonValue,
    pub learning_resources: JsonValue,
    pub study_sections: JsonValue,
    pub details: JsonValue,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(alias = "easy")]
    Easy,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "hard")]
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemType {
    #[serde(rename = "coding")]
    Coding,
    #[serde(rename = "multiple_choice", alias = "multiple-choice")]
    MultipleChoice,
    #[serde(rename = "short_answer", alias = "short-answer")]
    ShortAnswer,
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemType::Coding => "coding",
            ProblemType::MultipleChoice => "multiple_choice",
            ProblemType::ShortAnswer => "short_answer",
        }
    }

    /// Accepts both the underscore and the hyphenated spelling.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().replace('-', "_").as_str() {
            "coding" => Some(ProblemType::Coding),
            "multiple_choice" => Some(ProblemType::MultipleChoice),
            "short_answer" => Some(ProblemType::ShortAnswer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    #[serde(rename = "expectedOutput", alias = "expected_output", alias = "expected")]
    pub expected_output: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodingDetails {
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
}

impl CodingDetails {
    pub fn all_test_cases(&self) -> Vec<TestCase> {
        self.visible_test_cases
            .iter()
            .chain(self.hidden_test_cases.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultipleChoiceDetails {
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: i32,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShortAnswerDetails {
    pub answer_template: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub max_char_limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProblemDetails {
    Coding(CodingDetails),
    MultipleChoice(MultipleChoiceDetails),
    ShortAnswer(ShortAnswerDetails),
}

impl ProblemDetails {
    pub fn from_json(problem_type: ProblemType, raw: JsonValue) -> Result<Self> {
        let details = match problem_type {
            ProblemType::Coding => ProblemDetails::Coding(serde_json::from_value(raw)?),
            ProblemType::MultipleChoice => ProblemDetails::MultipleChoice(serde_json::from_value(raw)?),
            ProblemType::ShortAnswer => ProblemDetails::ShortAnswer(serde_json::from_value(raw)?),
        };
        Ok(details)
    }

    pub fn problem_type(&self) -> ProblemType {
        match self {
            ProblemDetails::Coding(_) => ProblemType::Coding,
            ProblemDetails::MultipleChoice(_) => ProblemType::MultipleChoice,
            ProblemDetails::ShortAnswer(_) => ProblemType::ShortAnswer,
        }
    }

    /// Type-specific rules that the field-level validator cannot express.
    pub fn check(&self) -> Result<()> {
        match self {
            ProblemDetails::Coding(c) => {
                if c.visible_test_cases.is_empty() && c.hidden_test_cases.is_empty() {
                    return Err(Error::BadRequest(
                        "Coding problems need at least one test case".into(),
                    ));
                }
                if c.time_limit.is_some_and(|t| t <= 0) {
                    return Err(Error::BadRequest("time_limit must be positive".into()));
                }
            }
            ProblemDetails::MultipleChoice(mc) => {
                if mc.options.len() < 2 {
                    return Err(Error::BadRequest(
                        "Multiple choice problems need at least two options".into(),
                    ));
                }
                if mc.options.iter().any(|o| o.trim().is_empty()) {
                    return Err(Error::BadRequest("Options cannot be blank".into()));
                }
                if mc.correct_answer < 0 || mc.correct_answer as usize >= mc.options.len() {
                    return Err(Error::BadRequest("correct_answer is out of range".into()));
                }
            }
            ProblemDetails::ShortAnswer(sa) => {
                let has_template = sa
                    .answer_template
                    .as_deref()
                    .is_some_and(|t| !t.trim().is_empty());
                if sa.keywords.is_empty() && !has_template {
                    return Err(Error::BadRequest(
                        "Short answer problems need keywords or an answer template".into(),
                    ));
                }
                if sa.max_char_limit.is_some_and(|l| l <= 0) {
                    return Err(Error::BadRequest("max_char_limit must be positive".into()));
                }
            }
        }
        Ok(())
    }

    /// Copy with solutions, hidden tests and answer keys removed.
    pub fn redacted(&self) -> JsonValue {
        match self {
            ProblemDetails::Coding(c) => serde_json::json!({
                "allowed_languages": c.allowed_languages,
                "time_limit": c.time_limit,
                "memory_limit": c.memory_limit,
                "starter_code": c.starter_code,
                "visible_test_cases": c.visible_test_cases,
                "hidden_test_case_count": c.hidden_test_cases.len(),
            }),
            ProblemDetails::MultipleChoice(mc) => serde_json::json!({
                "options": mc.options,
            }),
            ProblemDetails::ShortAnswer(sa) => serde_json::json!({
                "max_char_limit": sa.max_char_limit,
            }),
        }
    }
}

impl Problem {
    pub fn kind(&self) -> Result<ProblemType> {
        ProblemType::parse(&self.problem_type).ok_or_else(|| {
            Error::Internal(format!("Unknown problem type '{}'", self.problem_type))
        })
    }

    pub fn parsed_details(&self) -> Result<ProblemDetails> {
        ProblemDetails::from_json(self.kind()?, self.details.clone())
    }

    pub fn difficulty_level(&self) -> Difficulty {
        Difficulty::parse(&self.difficulty).unwrap_or(Difficulty::Medium)
    }

    /// Minutes this problem contributes to a category session.
    pub fn time_budget_minutes(&self) -> i32 {
        let coding_limit = match self.parsed_details() {
            Ok(ProblemDetails::Coding(c)) => c.time_limit,
            _ => None,
        };
        coding_limit
            .or(self.estimated_time)
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_TIME_BUDGET_MINUTES)
    }
}

pub const DEFAULT_TIME_BUDGET_MINUTES: i32 = 10;
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn problem_type_accepts_hyphenated_alias() {
        assert_eq!(ProblemType::parse("multiple-choice"), Some(ProblemType::MultipleChoice));
        assert_eq!(ProblemType::parse("short_answer"), Some(ProblemType::ShortAnswer));
        let parsed: ProblemType = serde_json::from_value(json!("short-answer")).unwrap();
        assert_eq!(parsed, ProblemType::ShortAnswer);
    }

    #[test]
    fn difficulty_orders_easy_to_hard() {
        let mut levels = vec![Difficulty::Hard, Difficulty::Easy, Difficulty::Medium];
        levels.sort();
        assert_eq!(levels, vec![Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]);
    }

    #[test]
    fn test_case_reads_client_field_name() {
        let tc: TestCase = serde_json::from_value(json!({"input": "1 2", "expectedOutput": "3"})).unwrap();
        assert_eq!(tc.expected_output, "3");
        assert_eq!(serde_json::to_value(&tc).unwrap()["expectedOutput"], "3");
    }

    #[test]
    fn multiple_choice_rejects_out_of_range_answer() {
        let details = ProblemDetails::MultipleChoice(MultipleChoiceDetails {
            options: vec!["a".into(), "b".into()],
            correct_answer: 2,
            explanation: None,
        });
        assert!(details.check().is_err());
    }

    #[test]
    fn multiple_choice_rejects_blank_option() {
        let details = ProblemDetails::MultipleChoice(MultipleChoiceDetails {
            options: vec!["a".into(), "  ".into()],
            correct_answer: 0,
            explanation: None,
        });
        assert!(details.check().is_err());
    }

    #[test]
    fn redacted_coding_hides_solution_and_hidden_tests() {
        let details = ProblemDetails::Coding(CodingDetails {
            solution: Some("print(42)".into()),
            hidden_test_cases: vec![TestCase { input: "x".into(), expected_output: "y".into() }],
            visible_test_cases: vec![TestCase { input: "a".into(), expected_output: "b".into() }],
            ..Default::default()
        });
        let view = details.redacted();
        assert!(view.get("solution").is_none());
        assert!(view.get("hidden_test_cases").is_none());
        assert_eq!(view["hidden_test_case_count"], 1);
        assert_eq!(view["visible_test_cases"][0]["expectedOutput"], "b");
    }

    #[test]
    fn redacted_multiple_choice_hides_answer() {
        let details = ProblemDetails::MultipleChoice(MultipleChoiceDetails {
            options: vec!["a".into(), "b".into()],
            correct_answer: 1,
            explanation: Some("because".into()),
        });
        let view = details.redacted();
        assert!(view.get("correct_answer").is_none());
        assert!(view.get("explanation").is_none());
    }
}
