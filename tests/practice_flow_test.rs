mod common;

use std::env;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::{http::StatusCode, Router};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value as JsonValue};
use smartrecruiter_backend::{
    config::Config,
    database::pool::{create_pool, run_migrations},
    utils::time::Clock,
};
use sqlx::PgPool;
use uuid::Uuid;

use common::{json_request, lazy_app, lazy_app_with_clock, send, test_config, token};

mockall::mock! {
    pub TestClock {}
    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc>;
    }
}

/// A clock pinned to `base` plus whatever offset the test dials in.
fn shifted_clock(base: DateTime<Utc>, offset_secs: Arc<AtomicI64>) -> Arc<dyn Clock> {
    let mut clock = MockTestClock::new();
    clock
        .expect_now()
        .returning(move || base + Duration::seconds(offset_secs.load(Ordering::SeqCst)));
    Arc::new(clock)
}

async fn database() -> Option<(Config, PgPool)> {
    dotenvy::dotenv().ok();
    if env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    }
    let config = test_config("http://127.0.0.1:1");
    let pool = create_pool(&config).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    Some((config, pool))
}

async fn seed_user(pool: &PgPool, role: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, full_name, role) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(format!("{}_{}@example.com", role, id))
        .bind(format!("Test {}", role))
        .bind(role)
        .execute(pool)
        .await
        .expect("seed user");
    id
}

/// Creates a category holding `count` single-attempt multiple-choice problems.
async fn seed_category(app: &Router, recruiter: &str, count: usize) -> String {
    let (status, category) = send(
        app,
        json_request(
            "POST",
            "/api/categories",
            Some(recruiter),
            Some(json!({"name": format!("Flow {}", Uuid::new_v4())})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let category_id = category["id"].as_str().unwrap().to_string();

    for n in 1..=count {
        let (status, _) = send(
            app,
            json_request(
                "POST",
                "/api/practice-problems",
                Some(recruiter),
                Some(json!({
                    "title": format!("Question {}", n),
                    "description": "Pick the second option",
                    "difficulty": "Easy",
                    "problem_type": "multiple_choice",
                    "options": ["first", "second"],
                    "correct_answer": 1,
                    "points": 10,
                    "max_attempts": 1,
                    "category_id": category_id,
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    category_id
}

async fn start_session(app: &Router, candidate: &str, category_id: &str) -> (StatusCode, JsonValue) {
    send(
        app,
        json_request(
            "POST",
            &format!("/api/practice-categories/{}/start-session", category_id),
            Some(candidate),
            None,
        ),
    )
    .await
}

async fn submit(app: &Router, candidate: &str, session_id: &str, problem_id: &str) -> (StatusCode, JsonValue) {
    send(
        app,
        json_request(
            "POST",
            &format!("/api/practice-categories/sessions/{}/submit-problem", session_id),
            Some(candidate),
            Some(json!({"problem_id": problem_id, "answer": 1})),
        ),
    )
    .await
}

async fn get_session(app: &Router, candidate: &str, session_id: &str) -> (StatusCode, JsonValue) {
    send(
        app,
        json_request(
            "GET",
            &format!("/api/practice-categories/sessions/{}", session_id),
            Some(candidate),
            None,
        ),
    )
    .await
}

fn ids(session: &JsonValue) -> Vec<String> {
    session["problems"]
        .as_array()
        .expect("problems")
        .iter()
        .map(|p| p["id"].as_str().expect("id").to_string())
        .collect()
}

async fn audit_rows(pool: &PgPool, action: &str, entity_id: &str, user_id: Uuid) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs WHERE action = $1 AND entity_id = $2 AND user_id = $3",
    )
    .bind(action)
    .bind(Uuid::parse_str(entity_id).unwrap())
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn category_session_runs_to_completion() {
    let Some((config, pool)) = database().await else { return };
    let app = lazy_app(&config);

    let recruiter_id = seed_user(&pool, "recruiter").await;
    let recruiter = token(recruiter_id, "recruiter");
    let candidate = token(seed_user(&pool, "interviewee").await, "interviewee");
    let category_id = seed_category(&app, &recruiter, 3).await;

    let (status, session) = start_session(&app, &candidate, &category_id).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["total_problems"], 3);
    assert_eq!(session["max_score"], 30);
    let session_id = session["session_id"].as_str().unwrap().to_string();
    let order = ids(&session);
    assert_eq!(session["problems"][0]["available"], true);
    assert_eq!(session["problems"][2]["available"], false);

    let (status, resumed) = start_session(&app, &candidate, &category_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resumed["session_id"], session["session_id"]);

    let (status, body) = submit(&app, &candidate, &session_id, &order[2]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Problem is locked");

    let (status, body) = submit(&app, &candidate, &session_id, &order[0]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["passed"], true);
    assert_eq!(body["session_progress"]["problems_completed"], 1);
    assert_eq!(body["session_progress"]["total_score"], 10);
    assert_eq!(body["session_progress"]["status"], "in_progress");

    let (status, body) = submit(&app, &candidate, &session_id, &order[0]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Problem already attempted in this session");

    let (status, view) = get_session(&app, &candidate, &session_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["problems"][1]["available"], true);
    assert_eq!(view["problems"][2]["available"], false);
    assert_eq!(view["problems"][0]["can_retake"], false);
    assert_eq!(view["problems"][0]["action_label"], "Review Problem");

    let (status, _) = submit(&app, &candidate, &session_id, &order[1]).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = submit(&app, &candidate, &session_id, &order[2]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_progress"]["problems_completed"], 3);
    assert_eq!(body["session_progress"]["total_score"], 30);
    assert_eq!(body["session_progress"]["status"], "completed");

    let (status, body) = submit(&app, &candidate, &session_id, &order[2]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Session is not in progress");

    let attempts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM practice_attempts WHERE session_id = $1")
        .bind(Uuid::parse_str(&session_id).unwrap())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(attempts, 3);

    let (status, _) = send(
        &app,
        json_request("DELETE", &format!("/api/categories/{}", category_id), Some(&recruiter), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(audit_rows(&pool, "category_deleted", &category_id, recruiter_id).await, 1);
}

#[tokio::test]
async fn deleted_problem_leaves_session_completable() {
    let Some((config, pool)) = database().await else { return };
    let app = lazy_app(&config);

    let recruiter_id = seed_user(&pool, "recruiter").await;
    let recruiter = token(recruiter_id, "recruiter");
    let candidate = token(seed_user(&pool, "interviewee").await, "interviewee");
    let category_id = seed_category(&app, &recruiter, 3).await;

    let (_, session) = start_session(&app, &candidate, &category_id).await;
    let session_id = session["session_id"].as_str().unwrap().to_string();
    let order = ids(&session);

    let (status, _) = submit(&app, &candidate, &session_id, &order[0]).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        json_request("DELETE", &format!("/api/practice-problems/{}", order[1]), Some(&recruiter), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(audit_rows(&pool, "practice_problem_deleted", &order[1], recruiter_id).await, 1);

    let (status, view) = get_session(&app, &candidate, &session_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["total_problems"], 2);
    assert_eq!(view["max_score"], 20);
    assert_eq!(ids(&view), vec![order[0].clone(), order[2].clone()]);
    assert_eq!(view["problems"][1]["available"], true);

    let (status, body) = submit(&app, &candidate, &session_id, &order[2]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_progress"]["problems_completed"], 2);
    assert_eq!(body["session_progress"]["total_problems"], 2);
    assert_eq!(body["session_progress"]["status"], "completed");
}

#[tokio::test]
async fn draft_expiry_is_reported_once_per_save() {
    let Some((config, pool)) = database().await else { return };
    let app = lazy_app(&config);

    let recruiter = token(seed_user(&pool, "recruiter").await, "recruiter");
    let candidate = token(seed_user(&pool, "interviewee").await, "interviewee");
    let category_id = seed_category(&app, &recruiter, 1).await;
    let (_, session) = start_session(&app, &candidate, &category_id).await;
    let problem_id = ids(&session).remove(0);
    let uri = format!("/api/practice-problems/{}/draft?kind=coding", problem_id);

    let (status, body) = send(
        &app,
        json_request("PUT", &uri, Some(&candidate), Some(json!({"code": "x", "time_left": 0}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expired"], false);

    let (_, first) = send(&app, json_request("GET", &uri, Some(&candidate), None)).await;
    let (_, second) = send(&app, json_request("GET", &uri, Some(&candidate), None)).await;
    assert_eq!(first["expired"], true);
    assert_eq!(second["expired"], false);
    assert_eq!(second["code"], "x");
    assert!(second.get("expired_reported").is_none());

    send(
        &app,
        json_request("PUT", &uri, Some(&candidate), Some(json!({"code": "y", "time_left": 0}))),
    )
    .await;
    let (_, again) = send(&app, json_request("GET", &uri, Some(&candidate), None)).await;
    assert_eq!(again["expired"], true);
    assert_eq!(again["code"], "y");

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &uri,
            Some(&candidate),
            Some(json!({"code": "z", "panel_sizes": [200, 300, 200], "viewport_width": -1})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_sessions_time_out_exactly_once() {
    let Some((config, pool)) = database().await else { return };
    let offset = Arc::new(AtomicI64::new(0));
    let base = Utc::now() - Duration::days(30);
    let (app, state) = lazy_app_with_clock(&config, shifted_clock(base, offset.clone()));

    let recruiter = token(seed_user(&pool, "recruiter").await, "recruiter");
    let first = token(seed_user(&pool, "interviewee").await, "interviewee");
    let second = token(seed_user(&pool, "interviewee").await, "interviewee");
    let category_id = seed_category(&app, &recruiter, 1).await;

    let (status, session) = start_session(&app, &first, &category_id).await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = session["session_id"].as_str().unwrap().to_string();
    let problem_id = ids(&session).remove(0);
    let (status, other) = start_session(&app, &second, &category_id).await;
    assert_eq!(status, StatusCode::CREATED);
    let other_id = Uuid::parse_str(other["session_id"].as_str().unwrap()).unwrap();

    offset.store(Duration::days(10).num_seconds(), Ordering::SeqCst);

    let (status, body) = submit(&app, &first, &session_id, &problem_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Session time limit exceeded");

    let (status, view) = get_session(&app, &first, &session_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "timeout");
    assert_eq!(view["session_progress"]["time_remaining"], 0);

    let (status, body) = submit(&app, &first, &session_id, &problem_id).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Session is not in progress");

    let at_deadline: bool = sqlx::query_scalar(
        "SELECT completed_at = started_at + make_interval(secs => time_limit) FROM category_sessions WHERE id = $1",
    )
    .bind(Uuid::parse_str(&session_id).unwrap())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(at_deadline);

    let swept = state.session_service.sweep_expired().await.expect("sweep");
    assert!(swept >= 1);
    let other_status: String = sqlx::query_scalar("SELECT status FROM category_sessions WHERE id = $1")
        .bind(other_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(other_status, "timeout");
    assert_eq!(state.session_service.sweep_expired().await.expect("sweep"), 0);

    let attempts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM practice_attempts WHERE session_id = $1")
        .bind(Uuid::parse_str(&session_id).unwrap())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(attempts, 0);
}
