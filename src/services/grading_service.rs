use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::error::{Error, Result};
use crate::models::problem::{MultipleChoiceDetails, ShortAnswerDetails};
use crate::models::question::{Question, QuestionDetails};
use crate::models::review::GradedAnswer;

/// Outcome of one test case run by the sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseOutcome {
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PracticeGrade {
    pub score: i32,
    pub max_score: i32,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_results: Option<Vec<TestCaseOutcome>>,
}

pub struct GradingService;

impl GradingService {
    /// Accepts an option index, the option text, or `{"selected": n}`.
    pub fn grade_multiple_choice(
        details: &MultipleChoiceDetails,
        points: i32,
        answer: &JsonValue,
    ) -> PracticeGrade {
        let selected = Self::selected_index(&details.options, answer);
        let passed = selected == Some(details.correct_answer as usize);
        PracticeGrade {
            score: if passed { points } else { 0 },
            max_score: points,
            passed,
            test_case_results: None,
        }
    }

    fn selected_index(options: &[String], answer: &JsonValue) -> Option<usize> {
        let raw = match answer {
            JsonValue::Object(map) => map.get("selected").unwrap_or(&JsonValue::Null),
            other => other,
        };
        match raw {
            JsonValue::Number(n) => n.as_u64().map(|i| i as usize).filter(|i| *i < options.len()),
            JsonValue::String(s) => {
                if let Ok(idx) = s.trim().parse::<usize>() {
                    if idx < options.len() {
                        return Some(idx);
                    }
                }
                options.iter().position(|o| o.trim() == s.trim())
            }
            _ => None,
        }
    }

    /// Keyword share drives the score. Passing needs every keyword present.
    pub fn grade_short_answer(
        details: &ShortAnswerDetails,
        points: i32,
        answer: &str,
    ) -> Result<PracticeGrade> {
        let trimmed = answer.trim();
        if trimmed.is_empty() {
            return Err(Error::BadRequest("Answer cannot be empty".into()));
        }
        if let Some(limit) = details.max_char_limit {
            if trimmed.chars().count() > limit.max(0) as usize {
                return Err(Error::BadRequest(format!(
                    "Answer exceeds the {} character limit",
                    limit
                )));
            }
        }

        let normalized = normalize(trimmed);
        let keywords: Vec<String> = details
            .keywords
            .iter()
            .map(|k| normalize(k))
            .filter(|k| !k.is_empty())
            .collect();

        let (score, passed) = if !keywords.is_empty() {
            let matched = keywords.iter().filter(|k| normalized.contains(k.as_str())).count();
            let score = ((points as f64) * (matched as f64) / (keywords.len() as f64)).round() as i32;
            (score, matched == keywords.len())
        } else if let Some(template) = details
            .answer_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
        {
            let passed = normalize(template) == normalized;
            (if passed { points } else { 0 }, passed)
        } else {
            (points, true)
        };

        Ok(PracticeGrade {
            score,
            max_score: points,
            passed,
            test_case_results: None,
        })
    }

    pub fn grade_coding(points: i32, outcomes: Vec<TestCaseOutcome>) -> PracticeGrade {
        let total = outcomes.len();
        let passed_count = outcomes.iter().filter(|o| o.passed).count();
        let score = if total == 0 {
            0
        } else {
            ((points as f64) * (passed_count as f64) / (total as f64)).round() as i32
        };
        PracticeGrade {
            score,
            max_score: points,
            passed: total > 0 && passed_count == total,
            test_case_results: Some(outcomes),
        }
    }

    /// Auto-grades an assessment submission. Only multiple choice is scored here;
    /// every other answer is left for a reviewer.
    pub fn grade_assessment(questions: &[Question], answers: &JsonValue) -> (Vec<GradedAnswer>, bool) {
        let mut graded = Vec::with_capacity(questions.len());
        let mut needs_review = false;

        for (idx, q) in questions.iter().enumerate() {
            let question_id = q.id.max((idx as i32) + 1);
            let candidate_answer = answers
                .get(question_id.to_string())
                .cloned()
                .unwrap_or(JsonValue::Null);

            let entry = match &q.details {
                QuestionDetails::MultipleChoice(mc) => {
                    let selected = Self::selected_index(&mc.options, &candidate_answer);
                    let is_correct = selected == Some(mc.correct_answer as usize);
                    GradedAnswer {
                        question_id,
                        question_text: q.question.clone(),
                        question_type: q.question_type().as_str().to_string(),
                        candidate_answer: selected
                            .and_then(|i| mc.options.get(i))
                            .map(|o| json!(o))
                            .unwrap_or(candidate_answer),
                        correct_answer: q.reference_answer(),
                        max_points: q.points,
                        auto_score: if is_correct { q.points } else { 0 },
                        auto_is_correct: Some(is_correct),
                        manual_score: None,
                        manual_is_correct: None,
                        review_notes: None,
                        needs_review: false,
                    }
                }
                _ => {
                    needs_review = true;
                    GradedAnswer {
                        question_id,
                        question_text: q.question.clone(),
                        question_type: q.question_type().as_str().to_string(),
                        candidate_answer,
                        correct_answer: q.reference_answer(),
                        max_points: q.points,
                        auto_score: 0,
                        auto_is_correct: None,
                        manual_score: None,
                        manual_is_correct: None,
                        review_notes: None,
                        needs_review: true,
                    }
                }
            };
            graded.push(entry);
        }

        (graded, needs_review)
    }

    /// Earned and maximum points over a set of graded answers.
    pub fn totals(graded: &[GradedAnswer]) -> (i32, i32) {
        graded.iter().fold((0, 0), |(earned, max), a| {
            (earned + a.effective_score(), max + a.max_points)
        })
    }

    pub fn percentage(earned: i32, max: i32) -> Decimal {
        if max <= 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(earned) * Decimal::from(100) / Decimal::from(max)).round_dp(2)
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{MultipleChoiceDetails as McQuestion, OpenDetails};

    fn mc() -> MultipleChoiceDetails {
        MultipleChoiceDetails {
            options: vec!["Vec".into(), "HashMap".into(), "BTreeMap".into()],
            correct_answer: 2,
            explanation: None,
        }
    }

    #[test]
    fn multiple_choice_accepts_index_and_text() {
        assert!(GradingService::grade_multiple_choice(&mc(), 5, &json!(2)).passed);
        assert!(GradingService::grade_multiple_choice(&mc(), 5, &json!("BTreeMap")).passed);
        assert!(GradingService::grade_multiple_choice(&mc(), 5, &json!({"selected": 2})).passed);
        let wrong = GradingService::grade_multiple_choice(&mc(), 5, &json!(0));
        assert!(!wrong.passed);
        assert_eq!(wrong.score, 0);
        assert_eq!(wrong.max_score, 5);
    }

    #[test]
    fn multiple_choice_out_of_range_is_wrong() {
        assert!(!GradingService::grade_multiple_choice(&mc(), 5, &json!(17)).passed);
    }

    #[test]
    fn short_answer_scores_keyword_share() {
        let details = ShortAnswerDetails {
            answer_template: None,
            keywords: vec!["ownership".into(), "borrow".into()],
            max_char_limit: Some(200),
        };
        let half = GradingService::grade_short_answer(&details, 10, "Ownership moves values").unwrap();
        assert_eq!(half.score, 5);
        assert!(!half.passed);
        let full =
            GradingService::grade_short_answer(&details, 10, "OWNERSHIP and the BORROW checker").unwrap();
        assert_eq!(full.score, 10);
        assert!(full.passed);
    }

    #[test]
    fn short_answer_enforces_char_limit() {
        let details = ShortAnswerDetails {
            answer_template: Some("x".into()),
            keywords: vec![],
            max_char_limit: Some(5),
        };
        assert!(GradingService::grade_short_answer(&details, 10, "way too long").is_err());
        assert!(GradingService::grade_short_answer(&details, 10, "   ").is_err());
    }

    #[test]
    fn short_answer_falls_back_to_template() {
        let details = ShortAnswerDetails {
            answer_template: Some("Stack  and heap".into()),
            keywords: vec![],
            max_char_limit: None,
        };
        assert!(GradingService::grade_short_answer(&details, 4, "stack and HEAP").unwrap().passed);
        assert!(!GradingService::grade_short_answer(&details, 4, "heap").unwrap().passed);
    }

    #[test]
    fn coding_needs_every_case_to_pass() {
        let outcomes = vec![
            TestCaseOutcome { passed: true, output: Some("1".into()), runtime_error: None },
            TestCaseOutcome { passed: false, output: Some("2".into()), runtime_error: None },
            TestCaseOutcome { passed: true, output: Some("3".into()), runtime_error: None },
            TestCaseOutcome { passed: true, output: Some("4".into()), runtime_error: None },
        ];
        let grade = GradingService::grade_coding(20, outcomes);
        assert_eq!(grade.score, 15);
        assert!(!grade.passed);
        assert_eq!(grade.test_case_results.as_ref().map(Vec::len), Some(4));
    }

    #[test]
    fn coding_without_cases_fails() {
        let grade = GradingService::grade_coding(20, vec![]);
        assert_eq!(grade.score, 0);
        assert!(!grade.passed);
    }

    #[test]
    fn assessment_grades_mcq_and_flags_open_questions() {
        let questions = vec![
            Question {
                id: 1,
                question: "Pick".into(),
                points: 2,
                explanation: None,
                details: QuestionDetails::MultipleChoice(McQuestion {
                    options: vec!["a".into(), "b".into()],
                    correct_answer: 1,
                }),
            },
            Question {
                id: 2,
                question: "Discuss".into(),
                points: 8,
                explanation: None,
                details: QuestionDetails::Essay(OpenDetails::default()),
            },
        ];
        let answers = json!({"1": 1, "2": "A long essay"});
        let (graded, needs_review) = GradingService::grade_assessment(&questions, &answers);
        assert!(needs_review);
        assert_eq!(graded[0].auto_score, 2);
        assert_eq!(graded[0].candidate_answer, json!("b"));
        assert!(graded[1].needs_review);
        assert_eq!(GradingService::totals(&graded), (2, 10));
        assert_eq!(GradingService::percentage(2, 10), Decimal::from(20));
    }

    #[test]
    fn manual_score_overrides_auto() {
        let mut answer = GradedAnswer {
            question_id: 1,
            question_text: "q".into(),
            question_type: "essay".into(),
            candidate_answer: json!("text"),
            correct_answer: JsonValue::Null,
            max_points: 10,
            auto_score: 0,
            auto_is_correct: None,
            manual_score: None,
            manual_is_correct: None,
            review_notes: None,
            needs_review: true,
        };
        assert_eq!(answer.effective_score(), 0);
        answer.manual_score = Some(7);
        assert_eq!(answer.effective_score(), 7);
    }

    #[test]
    fn percentage_of_empty_is_zero() {
        assert_eq!(GradingService::percentage(0, 0), Decimal::ZERO);
    }
}
