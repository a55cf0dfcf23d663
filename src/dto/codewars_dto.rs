use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kata document from the CodeWars API. Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rank: Option<Rank>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rank {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Challenge {
    /// Kyu level from the rank name ("6 kyu") or the negative rank id (-6).
    pub fn kyu(&self) -> Option<i32> {
        let rank = self.rank.as_ref()?;
        rank.name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
            .and_then(|n| n.parse::<i32>().ok())
            .or_else(|| rank.id.filter(|id| *id < 0).map(|id| -id))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub difficulty: Option<String>,
    pub language: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
}

impl SearchQuery {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportPayload {
    pub category_id: Option<Uuid>,
}

/// A challenge mapped onto practice-problem fields.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengePreview {
    pub codewars_id: String,
    pub codewars_slug: Option<String>,
    pub codewars_url: Option<String>,
    pub title: String,
    pub description: String,
    pub difficulty: String,
    pub rank: Option<String>,
    pub language: String,
    pub languages: Vec<String>,
    pub starter_code: String,
    pub tags: Vec<String>,
}
