use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::Result;
use crate::models::question::Question;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assessment {
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub assessment_type: String,
    pub difficulty: Option<String>,
    pub duration: i32,
    pub passing_score: Decimal,
    pub instructions: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub deadline: Option<DateTime<Utc>>,
    pub questions: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assessment {
    pub fn parsed_questions(&self) -> Result<Vec<Question>> {
        Ok(serde_json::from_value(self.questions.clone())?)
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub interviewee_id: Uuid,
    pub status: String,
    pub message: Option<String>,
    pub invited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssessmentAttempt {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub interviewee_id: Uuid,
    pub answers: JsonValue,
    pub current_question: i32,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}
