mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use uuid::Uuid;

use common::{fake_sandbox, json_request, lazy_app, send, test_config, token};

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = lazy_app(&test_config("http://127.0.0.1:1"));
    let (status, body) = send(&app, json_request("GET", "/api/practice-problems", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_authorization");
}

#[tokio::test]
async fn forged_token_is_unauthorized() {
    let app = lazy_app(&test_config("http://127.0.0.1:1"));
    let (status, body) = send(
        &app,
        json_request("GET", "/api/profile", Some("not.a.token"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn candidates_cannot_reach_recruiter_routes() {
    let app = lazy_app(&test_config("http://127.0.0.1:1"));
    let candidate = token(Uuid::new_v4(), "interviewee");
    for uri in ["/api/assessments", "/api/candidates", "/api/feedback/stats", "/api/interviews/candidates"] {
        let (status, body) = send(&app, json_request("GET", uri, Some(&candidate), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["error"], "forbidden");
    }
}

#[tokio::test]
async fn candidates_cannot_write_problems_or_categories() {
    let app = lazy_app(&test_config("http://127.0.0.1:1"));
    let candidate = token(Uuid::new_v4(), "candidate");
    let (status, _) = send(
        &app,
        json_request("POST", "/api/categories", Some(&candidate), Some(json!({"name": "Arrays"}))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        json_request("DELETE", &format!("/api/practice-problems/{}", Uuid::new_v4()), Some(&candidate), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn blank_category_name_fails_validation() {
    let app = lazy_app(&test_config("http://127.0.0.1:1"));
    let recruiter = token(Uuid::new_v4(), "recruiter");
    let (status, body) = send(
        &app,
        json_request("POST", "/api/categories", Some(&recruiter), Some(json!({"name": "   "}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn run_code_rejects_blank_input() {
    let app = lazy_app(&test_config("http://127.0.0.1:1"));
    let candidate = token(Uuid::new_v4(), "interviewee");
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/run-code",
            Some(&candidate),
            Some(json!({"code": "print(input())", "language": "python", "input": "  "})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please provide input for your code.");
}

#[tokio::test]
async fn access_token_cookie_authenticates() {
    let app = lazy_app(&test_config("http://127.0.0.1:1"));
    let candidate = token(Uuid::new_v4(), "interviewee");
    let request = Request::builder()
        .method("POST")
        .uri("/api/run-code")
        .header(header::COOKIE, format!("theme=dark; access_token={}", candidate))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"code": "x", "language": "python"}).to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn run_code_forwards_input_to_sandbox() {
    let sandbox = fake_sandbox(json!({"output": "42\n"})).await;
    let app = lazy_app(&test_config(&sandbox));
    let candidate = token(Uuid::new_v4(), "interviewee");
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/run-code",
            Some(&candidate),
            Some(json!({"code": "print(42)", "language": "Python", "input": "1"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "output", "output": "42\n"}));
}

#[tokio::test]
async fn run_code_compile_error_wins() {
    let sandbox = fake_sandbox(json!({
        "compile_error": "SyntaxError: invalid syntax",
        "error": "ignored",
        "output": "ignored",
    }))
    .await;
    let app = lazy_app(&test_config(&sandbox));
    let candidate = token(Uuid::new_v4(), "interviewee");
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/run-code",
            Some(&candidate),
            Some(json!({"code": "def", "language": "python", "input": "1"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "compile_error");
    assert_eq!(body["error"], "SyntaxError: invalid syntax");
    assert_eq!(body["compile_error"], true);
}

#[tokio::test]
async fn misaligned_test_case_results_are_a_bad_gateway() {
    let sandbox = fake_sandbox(json!({"test_case_results": [{"passed": true, "output": "1"}]})).await;
    let app = lazy_app(&test_config(&sandbox));
    let candidate = token(Uuid::new_v4(), "interviewee");
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/run-code",
            Some(&candidate),
            Some(json!({
                "code": "print(input())",
                "language": "python",
                "test_cases": [
                    {"input": "1", "expectedOutput": "1"},
                    {"input": "2", "expectedOutput": "2"}
                ]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("2 test cases"));
}

#[tokio::test]
async fn sandbox_timeout_gets_default_message() {
    let sandbox = fake_sandbox(json!({"timeout": true, "output": ""})).await;
    let app = lazy_app(&test_config(&sandbox));
    let candidate = token(Uuid::new_v4(), "interviewee");
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/run-code",
            Some(&candidate),
            Some(json!({"code": "while True: pass", "language": "python", "input": "1"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "timeout");
    assert_eq!(
        body["output"],
        "Error: Code execution timed out (possible infinite loop)"
    );
}

#[tokio::test]
async fn api_routes_are_rate_limited() {
    let mut config = test_config("http://127.0.0.1:1");
    config.api_rps = 1;
    let app = lazy_app(&config);
    let candidate = token(Uuid::new_v4(), "interviewee");
    let body = json!({"code": "x", "language": "python"});

    let (first, _) = send(&app, json_request("POST", "/api/run-code", Some(&candidate), Some(body.clone()))).await;
    let (second, payload) = send(&app, json_request("POST", "/api/run-code", Some(&candidate), Some(body))).await;
    assert_eq!(first, StatusCode::BAD_REQUEST);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(payload["error"], "Too many requests");
}

#[tokio::test]
async fn unknown_api_paths_are_not_found() {
    let app = lazy_app(&test_config("http://127.0.0.1:1"));
    let (status, _) = send(&app, json_request("GET", "/api/no-such-page", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let recruiter = token(Uuid::new_v4(), "recruiter");
    let (status, _) = send(&app, json_request("GET", "/api/assessments/x/y/z", Some(&recruiter), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
