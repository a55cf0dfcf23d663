use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::run_code_dto::{RunCodePayload, RunCodeResponse, RunMode},
    error::Result,
    AppState,
};

#[axum::debug_handler]
pub async fn run_code(
    State(state): State<AppState>,
    Json(payload): Json<RunCodePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let language = payload.language.trim().to_lowercase();
    let outcome = match payload.mode()? {
        RunMode::Input(input) => {
            state
                .code_runner
                .run_with_input(&payload.code, &language, input)
                .await?
        }
        RunMode::TestCases(cases) => {
            state
                .code_runner
                .run_test_cases(&payload.code, &language, cases)
                .await?
        }
    };
    Ok(Json(RunCodeResponse::from(outcome)))
}
