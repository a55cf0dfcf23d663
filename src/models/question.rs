use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::models::problem::TestCase;

/// A question embedded in an assessment. Ids are 1-based and stable within the assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: i32,
    pub question: String,
    #[serde(default = "default_points")]
    pub points: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub details: QuestionDetails,
}

fn default_points() -> i32 {
    1
}

/// Editors send throwaway ids (timestamps). Anything outside i32 becomes 0 and is renumbered.
fn lenient_id<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|v| match v {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::String(s) => s.parse::<i64>().ok(),
            _ => None,
        })
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(0))
}

/// Test cases arrive either as an array or as a JSON-encoded string of one.
fn test_cases_or_string<'de, D>(deserializer: D) -> Result<Vec<TestCase>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<JsonValue>::deserialize(deserializer)?;
    match raw {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(JsonValue::String(s)) => serde_json::from_str(&s).map_err(serde::de::Error::custom),
        Some(other) => serde_json::from_value(other).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    Coding,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Coding => "coding",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Essay => "essay",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionDetails {
    #[serde(alias = "multiple-choice")]
    MultipleChoice(MultipleChoiceDetails),
    #[serde(alias = "code")]
    Coding(CodingQuestionDetails),
    #[serde(alias = "short-answer")]
    ShortAnswer(OpenDetails),
    Essay(OpenDetails),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipleChoiceDetails {
    pub options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub correct_answer: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodingQuestionDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, alias = "starterCode")]
    pub starter_code: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default, deserialize_with = "test_cases_or_string")]
    pub test_cases: Vec<TestCase>,
}

/// Short answer and essay questions. Graded by a reviewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenDetails {
    /// Model answer shown to reviewers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_words: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_words: Option<i32>,
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        match &self.details {
            QuestionDetails::MultipleChoice(_) => QuestionType::MultipleChoice,
            QuestionDetails::Coding(_) => QuestionType::Coding,
            QuestionDetails::ShortAnswer(_) => QuestionType::ShortAnswer,
            QuestionDetails::Essay(_) => QuestionType::Essay,
        }
    }

    pub fn check(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err(format!("Question {} has no text", self.id));
        }
        if self.points < 0 {
            return Err(format!("Question {} has negative points", self.id));
        }
        if let QuestionDetails::MultipleChoice(mc) = &self.details {
            if mc.options.len() < 2 || mc.options.iter().any(|o| o.trim().is_empty()) {
                return Err(format!("Question {} needs at least two non-empty options", self.id));
            }
            if mc.correct_answer < 0 || mc.correct_answer as usize >= mc.options.len() {
                return Err(format!("Question {} has an out-of-range correct answer", self.id));
            }
        }
        Ok(())
    }

    /// Reference answer in display form: the correct option text, the solution or the model answer.
    pub fn reference_answer(&self) -> JsonValue {
        match &self.details {
            QuestionDetails::MultipleChoice(mc) => mc
                .options
                .get(mc.correct_answer.max(0) as usize)
                .map(|o| json!(o))
                .unwrap_or(JsonValue::Null),
            QuestionDetails::Coding(c) => c.solution.as_ref().map(|s| json!(s)).unwrap_or(JsonValue::Null),
            QuestionDetails::ShortAnswer(o) | QuestionDetails::Essay(o) => {
                o.answer.as_ref().map(|s| json!(s)).unwrap_or(JsonValue::Null)
            }
        }
    }

    /// The question as a candidate sees it while taking the assessment.
    pub fn candidate_view(&self) -> JsonValue {
        let mut value = json!({
            "id": self.id,
            "type": self.question_type().as_str(),
            "question": self.question,
            "points": self.points,
        });
        let extra = match &self.details {
            QuestionDetails::MultipleChoice(mc) => json!({ "options": mc.options }),
            QuestionDetails::Coding(c) => json!({
                "language": c.language,
                "starter_code": c.starter_code.clone().unwrap_or_default(),
                "test_cases": c.test_cases,
            }),
            QuestionDetails::ShortAnswer(o) | QuestionDetails::Essay(o) => json!({
                "min_words": o.min_words,
                "max_words": o.max_words,
            }),
        };
        if let (Some(target), JsonValue::Object(extra)) = (value.as_object_mut(), extra) {
            target.extend(extra);
        }
        value
    }
}

/// Assigns sequential ids by position.
pub fn number_questions(questions: &mut [Question]) {
    for (idx, q) in questions.iter_mut().enumerate() {
        q.id = (idx as i32) + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_each_question_shape() {
        let raw = json!([
            {"type": "multiple_choice", "question": "2+2?", "points": 2, "options": ["3", "4"], "correct_answer": 1},
            {"type": "coding", "question": "fizzbuzz", "language": "python", "test_cases": []},
            {"type": "short_answer", "question": "Explain ownership"},
            {"type": "essay", "question": "Tell us about yourself", "min_words": 100}
        ]);
        let mut questions: Vec<Question> = serde_json::from_value(raw).unwrap();
        number_questions(&mut questions);
        assert_eq!(questions[0].id, 1);
        assert_eq!(questions[0].question_type(), QuestionType::MultipleChoice);
        assert_eq!(questions[1].question_type(), QuestionType::Coding);
        assert_eq!(questions[2].question_type(), QuestionType::ShortAnswer);
        assert_eq!(questions[3].question_type(), QuestionType::Essay);
        assert!(questions.iter().all(|q| q.check().is_ok()));
    }

    #[test]
    fn accepts_editor_field_spellings() {
        let raw = json!({
            "id": 1_767_225_600_000_i64,
            "type": "multiple-choice",
            "question": "Pick",
            "points": 10,
            "options": ["a", "b"],
            "correctAnswer": 1,
            "explanation": ""
        });
        let q: Question = serde_json::from_value(raw).unwrap();
        assert_eq!(q.id, 0);
        assert_eq!(q.reference_answer(), json!("b"));

        let coding: Question = serde_json::from_value(json!({
            "type": "coding",
            "question": "Sum",
            "starter_code": "",
            "solution": "print(1)",
            "test_cases": "[{\"input\":\"1\",\"expectedOutput\":\"1\"}]"
        }))
        .unwrap();
        match coding.details {
            QuestionDetails::Coding(c) => assert_eq!(c.test_cases.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn out_of_range_correct_answer_fails_check() {
        let q: Question = serde_json::from_value(json!({
            "type": "multiple_choice", "question": "pick one", "options": ["a", "b"], "correct_answer": 5
        }))
        .unwrap();
        assert!(q.check().is_err());
    }

    #[test]
    fn candidate_view_hides_answers() {
        let q: Question = serde_json::from_value(json!({
            "id": 3, "type": "short-answer", "question": "Why?", "answer": "Because"
        }))
        .unwrap();
        let view = q.candidate_view();
        assert_eq!(view["type"], "short_answer");
        assert!(view.get("answer").is_none());
    }
}
