pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    assessment_service::AssessmentService, attempt_service::AttemptService,
    audit_service::AuditService, candidate_service::CandidateService,
    category_service::CategoryService, code_runner::CodeRunner,
    codewars_service::CodewarsService, draft_service::DraftService,
    feedback_service::FeedbackService, interview_service::InterviewService,
    practice_service::PracticeService, profile_service::ProfileService,
    review_service::ReviewService, session_service::SessionService,
};
use crate::utils::time::{Clock, SystemClock};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt_secret: Arc<str>,
    pub clock: Arc<dyn Clock>,
    pub code_runner: CodeRunner,
    pub category_service: CategoryService,
    pub practice_service: PracticeService,
    pub draft_service: DraftService,
    pub session_service: SessionService,
    pub assessment_service: AssessmentService,
    pub attempt_service: AttemptService,
    pub review_service: ReviewService,
    pub interview_service: InterviewService,
    pub candidate_service: CandidateService,
    pub feedback_service: FeedbackService,
    pub profile_service: ProfileService,
    pub codewars_service: CodewarsService,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        Self::with_clock(pool, config, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.code_runner_timeout_secs))
            .build()?;

        let audit = AuditService::new(pool.clone());
        let code_runner = CodeRunner::new(http_client.clone(), config.code_runner_url.clone());
        let practice_service = PracticeService::new(pool.clone(), code_runner.clone(), audit.clone());
        let assessment_service = AssessmentService::new(pool.clone(), audit.clone());

        Ok(Self {
            jwt_secret: Arc::from(config.jwt_secret.as_str()),
            category_service: CategoryService::new(pool.clone(), audit.clone()),
            draft_service: DraftService::new(pool.clone()),
            session_service: SessionService::new(pool.clone(), practice_service.clone(), clock.clone()),
            attempt_service: AttemptService::new(pool.clone(), assessment_service.clone(), clock.clone()),
            review_service: ReviewService::new(pool.clone(), audit.clone()),
            interview_service: InterviewService::new(pool.clone(), audit),
            candidate_service: CandidateService::new(pool.clone()),
            feedback_service: FeedbackService::new(pool.clone()),
            profile_service: ProfileService::new(pool.clone()),
            codewars_service: CodewarsService::new(
                http_client,
                config.codewars_base_url.clone(),
                practice_service.clone(),
            ),
            assessment_service,
            practice_service,
            code_runner,
            clock,
            pool,
        })
    }
}
