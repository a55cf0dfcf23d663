use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::problem::TestCase;
use crate::services::code_runner::RunOutcome;
use crate::services::grading_service::TestCaseOutcome;

pub const MISSING_INPUT: &str = "Please provide input for your code.";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RunCodePayload {
    #[validate(length(min = 1, max = 100000))]
    pub code: String,
    #[validate(length(min = 1, max = 30))]
    pub language: String,
    pub input: Option<String>,
    pub test_cases: Option<Vec<TestCase>>,
}

/// What the sandbox should do with a run request.
#[derive(Debug, Clone, PartialEq)]
pub enum RunMode<'a> {
    Input(&'a str),
    TestCases(&'a [TestCase]),
}

impl RunCodePayload {
    /// Test cases win when both are sent. Blank input is rejected.
    pub fn mode(&self) -> Result<RunMode<'_>> {
        if let Some(cases) = self.test_cases.as_deref().filter(|c| !c.is_empty()) {
            return Ok(RunMode::TestCases(cases));
        }
        match self.input.as_deref() {
            Some(input) if !input.trim().is_empty() => Ok(RunMode::Input(input)),
            _ => Err(Error::BadRequest(MISSING_INPUT.into())),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunCodeResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_results: Option<Vec<TestCaseOutcome>>,
}

impl From<RunOutcome> for RunCodeResponse {
    fn from(outcome: RunOutcome) -> Self {
        let empty = RunCodeResponse {
            status: "output",
            output: None,
            error: None,
            compile_error: None,
            timeout: None,
            code: None,
            test_case_results: None,
        };
        match outcome {
            RunOutcome::CompileError { error, code } => RunCodeResponse {
                status: "compile_error",
                error: Some(error),
                compile_error: Some(true),
                code,
                ..empty
            },
            RunOutcome::RuntimeError { error } => RunCodeResponse {
                status: "runtime_error",
                error: Some(error),
                ..empty
            },
            RunOutcome::Timeout { output } => RunCodeResponse {
                status: "timeout",
                output: Some(output),
                timeout: Some(true),
                ..empty
            },
            RunOutcome::TestCases { test_case_results } => RunCodeResponse {
                status: "test_cases",
                test_case_results: Some(test_case_results),
                ..empty
            },
            RunOutcome::Output { output } => RunCodeResponse {
                output: Some(output),
                ..empty
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> RunCodePayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn blank_input_is_rejected() {
        let p = payload(json!({"code": "print(1)", "language": "python", "input": "   "}));
        let err = p.mode().unwrap_err();
        assert_eq!(err.to_string(), format!("Bad request: {}", MISSING_INPUT));

        let none = payload(json!({"code": "print(1)", "language": "python"}));
        assert!(none.mode().is_err());
    }

    #[test]
    fn test_cases_take_precedence() {
        let p = payload(json!({
            "code": "x", "language": "python", "input": "1",
            "test_cases": [{"input": "1", "expectedOutput": "1"}]
        }));
        assert!(matches!(p.mode().unwrap(), RunMode::TestCases(cases) if cases.len() == 1));
    }

    #[test]
    fn outcome_maps_to_status_tag() {
        let resp = RunCodeResponse::from(RunOutcome::CompileError { error: "bad".into(), code: None });
        assert_eq!(resp.status, "compile_error");
        assert_eq!(resp.compile_error, Some(true));

        let resp = RunCodeResponse::from(RunOutcome::Output { output: "42".into() });
        let body = serde_json::to_value(&resp).unwrap();
        assert_eq!(body, json!({"status": "output", "output": "42"}));
    }
}
