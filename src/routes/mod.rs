pub mod assessments;
pub mod candidates;
pub mod categories;
pub mod codewars;
pub mod feedback;
pub mod health;
pub mod interviewee;
pub mod interviews;
pub mod practice;
pub mod profile;
pub mod run_code;
pub mod sessions;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::middleware::{
    auth::{require_auth, require_recruiter},
    rate_limit::{new_rps_state, rps_middleware},
};
use crate::AppState;

/// Every route of the service. Cross-cutting layers (CORS, tracing, body limit) are added by the caller.
pub fn app_router(state: AppState, api_rps: u32, public_rps: u32) -> Router {
    let public_api = Router::new()
        .route("/health", get(health::health))
        .route("/api/public/practice-problems", get(practice::list_public_problems))
        .layer(from_fn_with_state(new_rps_state(public_rps), rps_middleware));

    let user_api = Router::new()
        .route(
            "/practice-problems",
            get(practice::list_problems).post(practice::create_problem),
        )
        .route("/practice-problems/attempts", get(practice::my_attempts))
        .route("/practice-problems/statistics", get(practice::statistics))
        .route(
            "/practice-problems/active",
            get(practice::get_active)
                .put(practice::set_active)
                .delete(practice::clear_active),
        )
        .route(
            "/practice-problems/:id",
            get(practice::get_problem)
                .put(practice::update_problem)
                .delete(practice::delete_problem),
        )
        .route("/practice-problems/:id/attempt", post(practice::submit_attempt))
        .route("/practice-problems/:id/attempts", get(practice::problem_attempts))
        .route(
            "/practice-problems/:id/draft",
            get(practice::get_draft)
                .put(practice::save_draft)
                .delete(practice::delete_draft),
        )
        .route("/practice-categories", get(sessions::list_practice_categories))
        .route(
            "/practice-categories/:id/start-session",
            post(sessions::start_session),
        )
        .route("/practice-categories/sessions/:id", get(sessions::get_session))
        .route(
            "/practice-categories/sessions/:id/submit-problem",
            post(sessions::submit_problem),
        )
        .route("/run-code", post(run_code::run_code))
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route(
            "/interviews",
            get(interviews::list_interviews).post(interviews::create_interview),
        )
        .route(
            "/interviews/:id",
            put(interviews::update_interview).delete(interviews::delete_interview),
        )
        .route("/invitations", get(interviewee::list_invitations))
        .route("/invitations/:id/accept", post(interviewee::accept_invitation))
        .route("/interviewee/assessment/:id", get(interviewee::view_assessment))
        .route(
            "/interviewee/assessments/:id/start",
            post(interviewee::start_assessment),
        )
        .route(
            "/interviewee/assessments/:id/attempt",
            get(interviewee::get_assessment_attempt),
        )
        .route("/interviewee/attempts/summary", get(interviewee::attempts_summary))
        .route("/interviewee/attempts/:id", get(interviewee::get_attempt))
        .route("/interviewee/attempts/:id/answer", post(interviewee::save_answer))
        .route("/interviewee/attempts/:id/submit", post(interviewee::submit_assessment))
        .route("/interviewee/attempts/:id/review", get(interviewee::attempt_review))
        .route("/tests/available", get(interviewee::available_tests))
        .route("/public/test-assessments", get(interviewee::test_assessments))
        .route(
            "/feedback",
            get(feedback::list_feedback).post(feedback::create_feedback),
        )
        .route(
            "/profile",
            get(profile::get_profile).post(profile::update_profile),
        )
        .route(
            "/settings/notifications",
            get(profile::get_notifications).post(profile::update_notifications),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let recruiter_api = Router::new()
        .route(
            "/assessments",
            get(assessments::list_assessments).post(assessments::create_assessment),
        )
        .route(
            "/assessments/:id",
            get(assessments::get_assessment)
                .put(assessments::update_assessment)
                .delete(assessments::delete_assessment),
        )
        .route("/assessments/:id/results", get(assessments::assessment_results))
        .route(
            "/assessments/:id/results/export",
            get(assessments::export_results),
        )
        .route(
            "/assessments/:id/submissions/:attempt_id/review",
            get(assessments::get_submission_review),
        )
        .route(
            "/assessments/reviews/:review_id/answers/:question_id",
            put(assessments::update_review_answer),
        )
        .route(
            "/assessments/reviews/:review_id/complete",
            post(assessments::complete_review),
        )
        .route(
            "/assessments/reviews/:review_id/release",
            post(assessments::release_results),
        )
        .route("/send-invite", post(assessments::send_invite))
        .route("/candidates", get(candidates::list_candidates))
        .route("/candidates/:id/status", put(candidates::update_candidate_status))
        .route("/interviews/candidates", get(interviews::schedulable_candidates))
        .route("/feedback/stats", get(feedback::feedback_stats))
        .route("/feedback/:id", put(feedback::update_feedback))
        .route("/codewars/challenge/:id", get(codewars::get_challenge))
        .route("/codewars/search", get(codewars::search_challenges))
        .route("/codewars/import/:id", post(codewars::import_challenge))
        .route_layer(from_fn_with_state(state.clone(), require_recruiter));

    let api = user_api
        .merge(recruiter_api)
        .layer(from_fn_with_state(new_rps_state(api_rps), rps_middleware));

    public_api.nest("/api", api).with_state(state)
}
