use std::time::Duration;

use reqwest::{Client, StatusCode};
use uuid::Uuid;

use crate::dto::codewars_dto::{Challenge, ChallengePreview, SearchQuery};
use crate::dto::practice_dto::ProblemPayload;
use crate::error::{Error, Result};
use crate::models::problem::{Difficulty, Problem, TestCase};
use crate::services::practice_service::PracticeService;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Well-known beginner katas; the public API has no search endpoint.
pub const CURATED_SLUGS: &[&str] = &[
    "valid-braces",
    "sum-of-positive",
    "opposite-number",
    "remove-first-and-last-character",
    "convert-a-string-to-a-number",
    "even-or-odd",
    "return-negative",
    "string-repeat",
    "century-from-year",
    "grasshopper-summation",
];

/// 8-7 kyu are easy, 6-4 kyu medium, 3-1 kyu hard.
pub fn difficulty_for_kyu(kyu: Option<i32>) -> Difficulty {
    match kyu {
        Some(k) if k >= 7 => Difficulty::Easy,
        Some(k) if k >= 4 => Difficulty::Medium,
        Some(_) => Difficulty::Hard,
        None => Difficulty::Medium,
    }
}

fn function_name(challenge_name: &str) -> String {
    let name: String = challenge_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let name = name.trim_matches('_').to_string();
    match name.chars().next() {
        None => "solution".to_string(),
        Some(c) if c.is_ascii_digit() => format!("kata_{}", name),
        Some(_) => name,
    }
}

pub fn starter_code(language: &str, challenge_name: &str) -> String {
    let name = function_name(challenge_name);
    match language {
        "javascript" => format!("function {name}() {{\n    // Your code here\n    return null;\n}}"),
        "python" => format!("def {name}():\n    # Your code here\n    pass"),
        "java" => format!(
            "public class Solution {{\n    public static String {name}() {{\n        // Your code here\n        return null;\n    }}\n}}"
        ),
        other => format!("// {other} starter code for {challenge_name}"),
    }
}

pub fn preview(challenge: &Challenge) -> ChallengePreview {
    let language = challenge
        .languages
        .first()
        .cloned()
        .unwrap_or_else(|| "javascript".to_string());
    ChallengePreview {
        codewars_id: challenge.id.clone(),
        codewars_slug: challenge.slug.clone(),
        codewars_url: challenge.url.clone(),
        title: challenge.name.clone(),
        description: challenge.description.clone(),
        difficulty: difficulty_for_kyu(challenge.kyu()).as_str().to_string(),
        rank: challenge.rank.as_ref().and_then(|r| r.name.clone()),
        starter_code: starter_code(&language, &challenge.name),
        language,
        languages: challenge.languages.clone(),
        tags: challenge.tags.clone(),
    }
}

/// True when the challenge passes every filter that was given.
pub fn matches(challenge: &Challenge, query: &SearchQuery) -> bool {
    if let Some(difficulty) = query.difficulty.as_deref().filter(|d| !d.is_empty()) {
        let wanted = Difficulty::parse(difficulty);
        let rank_name = challenge.rank.as_ref().and_then(|r| r.name.as_deref());
        let by_level = wanted.is_some_and(|w| w == difficulty_for_kyu(challenge.kyu()));
        if !by_level && rank_name != Some(difficulty) {
            return false;
        }
    }
    if let Some(language) = query.language.as_deref().filter(|l| !l.is_empty()) {
        if !challenge.languages.iter().any(|l| l.eq_ignore_ascii_case(language)) {
            return false;
        }
    }
    let tags = query.tag_list();
    if !tags.is_empty() && !challenge.tags.iter().any(|t| tags.contains(&t.to_lowercase())) {
        return false;
    }
    true
}

#[derive(Clone)]
pub struct CodewarsService {
    client: Client,
    base_url: String,
    practice: PracticeService,
}

impl CodewarsService {
    pub fn new(client: Client, base_url: String, practice: PracticeService) -> Self {
        Self {
            client,
            base_url,
            practice,
        }
    }

    pub async fn fetch(&self, id: &str) -> Result<Challenge> {
        let url = format!("{}/code-challenges/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, "SmartRecruiter/1.0")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, challenge = id, "codewars request failed");
                Error::Upstream(format!("CodeWars is unreachable: {}", e))
            })?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<Challenge>().await?),
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!("CodeWars challenge '{}' not found", id))),
            status => {
                tracing::warn!(status = %status, challenge = id, "codewars returned an error");
                Err(Error::Upstream(format!("CodeWars returned {}", status)))
            }
        }
    }

    pub async fn challenge(&self, id: &str) -> Result<ChallengePreview> {
        Ok(preview(&self.fetch(id).await?))
    }

    /// Filters the curated list. Katas that fail to load are skipped.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<ChallengePreview>> {
        let mut results = Vec::new();
        for slug in CURATED_SLUGS {
            match self.fetch(slug).await {
                Ok(challenge) if matches(&challenge, query) => results.push(preview(&challenge)),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, slug, "skipping codewars challenge"),
            }
        }
        tracing::info!(found = results.len(), total = CURATED_SLUGS.len(), "codewars search finished");
        Ok(results)
    }

    /// Creates an unpublished coding problem. The placeholder test case must be replaced before publishing.
    pub async fn import(&self, id: &str, category_id: Option<Uuid>, created_by: Uuid) -> Result<Problem> {
        let challenge = self.fetch(id).await?;
        let mapped = preview(&challenge);

        let payload = ProblemPayload {
            title: mapped.title.clone(),
            description: if mapped.description.trim().is_empty() {
                mapped.title.clone()
            } else {
                mapped.description.clone()
            },
            difficulty: mapped.difficulty.clone(),
            problem_type: "coding".into(),
            points: Some(10),
            max_attempts: None,
            category_id,
            tags: mapped.tags.clone(),
            is_public: Some(false),
            estimated_time: None,
            hints: vec![],
            learning_resources: mapped
                .codewars_url
                .iter()
                .map(|u| serde_json::json!({ "title": "CodeWars kata", "url": u }))
                .collect(),
            study_sections: vec![],
            allowed_languages: vec![mapped.language.clone()],
            time_limit: None,
            memory_limit: None,
            starter_code: Some(mapped.starter_code.clone()),
            solution: None,
            visible_test_cases: vec![TestCase {
                input: String::new(),
                expected_output: String::new(),
            }],
            hidden_test_cases: vec![],
            options: vec![],
            correct_answer: None,
            explanation: Some(format!("Challenge from CodeWars: {}", challenge.name)),
            answer_template: None,
            keywords: vec![],
            max_char_limit: None,
        };

        let problem = self.practice.create(payload, created_by).await?;
        tracing::info!(problem_id = %problem.id, codewars_id = %challenge.id, "codewars challenge imported");
        Ok(problem)
    }
}
