use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::models::problem::TestCase;
use crate::services::grading_service::TestCaseOutcome;

pub const TIMEOUT_MESSAGE: &str = "Error: Code execution timed out (possible infinite loop)";
pub const NO_OUTPUT_MESSAGE: &str = "No output.";

/// The sandbox sometimes reports `compile_error` as a flag and sometimes as the message.
fn deserialize_compile_error<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(JsonValue::Null) | Some(JsonValue::Bool(false)) => None,
        Some(JsonValue::Bool(true)) => Some(String::new()),
        Some(JsonValue::String(s)) if s.is_empty() => None,
        Some(JsonValue::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct SandboxRequest<'a> {
    pub code: &'a str,
    pub language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<&'a [TestCase]>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SandboxResponse {
    pub output: Option<String>,
    pub error: Option<String>,
    #[serde(default, deserialize_with = "deserialize_compile_error")]
    pub compile_error: Option<String>,
    #[serde(default)]
    pub timeout: bool,
    pub test_case_results: Option<Vec<TestCaseOutcome>>,
    /// Code as the sandbox compiled it.
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    CompileError { error: String, code: Option<String> },
    RuntimeError { error: String },
    Timeout { output: String },
    TestCases { test_case_results: Vec<TestCaseOutcome> },
    Output { output: String },
}

impl RunOutcome {
    /// Priority: compile_error, error, timeout, test_case_results, output.
    pub fn classify(resp: SandboxResponse, expected_cases: Option<usize>) -> Result<Self> {
        if let Some(error) = resp.compile_error {
            let error = if error.is_empty() {
                resp.error.unwrap_or_else(|| "Compile Error".to_string())
            } else {
                error
            };
            return Ok(RunOutcome::CompileError { error, code: resp.code });
        }
        if let Some(error) = resp.error.filter(|e| !e.is_empty()) {
            return Ok(RunOutcome::RuntimeError { error });
        }
        if resp.timeout {
            let output = resp
                .output
                .filter(|o| !o.trim().is_empty())
                .unwrap_or_else(|| TIMEOUT_MESSAGE.to_string());
            return Ok(RunOutcome::Timeout { output });
        }
        if let Some(results) = resp.test_case_results.filter(|r| !r.is_empty()) {
            if let Some(expected) = expected_cases {
                if results.len() != expected {
                    return Err(Error::Upstream(format!(
                        "Sandbox returned {} results for {} test cases",
                        results.len(),
                        expected
                    )));
                }
            }
            return Ok(RunOutcome::TestCases { test_case_results: results });
        }
        if expected_cases.is_some_and(|n| n > 0) {
            return Err(Error::Upstream("Sandbox returned no test case results".into()));
        }
        let output = resp
            .output
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| NO_OUTPUT_MESSAGE.to_string());
        Ok(RunOutcome::Output { output })
    }
}

#[derive(Clone)]
pub struct CodeRunner {
    client: Client,
    base_url: String,
}

impl CodeRunner {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn execute(&self, request: &SandboxRequest<'_>) -> Result<SandboxResponse> {
        let url = format!("{}/run", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(%status, "code sandbox rejected run request");
            return Err(Error::Upstream(format!("Code sandbox responded with {}", status)));
        }
        Ok(response.json::<SandboxResponse>().await?)
    }

    /// Runs code against ad hoc input. Input goes to the sandbox verbatim.
    pub async fn run_with_input(&self, code: &str, language: &str, input: &str) -> Result<RunOutcome> {
        let request = SandboxRequest {
            code,
            language,
            input: Some(input),
            test_cases: None,
        };
        let resp = self.execute(&request).await?;
        RunOutcome::classify(resp, None)
    }

    pub async fn run_test_cases(
        &self,
        code: &str,
        language: &str,
        test_cases: &[TestCase],
    ) -> Result<RunOutcome> {
        let request = SandboxRequest {
            code,
            language,
            input: None,
            test_cases: Some(test_cases),
        };
        let resp = self.execute(&request).await?;
        RunOutcome::classify(resp, Some(test_cases.len()))
    }

    /// Per-case outcomes for grading. Compile and runtime failures fail every case.
    pub async fn evaluate(
        &self,
        code: &str,
        language: &str,
        test_cases: &[TestCase],
    ) -> Result<Vec<TestCaseOutcome>> {
        let outcome = self.run_test_cases(code, language, test_cases).await?;
        Ok(match outcome {
            RunOutcome::TestCases { test_case_results } => test_case_results,
            RunOutcome::CompileError { error, .. } | RunOutcome::RuntimeError { error } => {
                failed_cases(test_cases.len(), error)
            }
            RunOutcome::Timeout { output } => failed_cases(test_cases.len(), output),
            RunOutcome::Output { output } => failed_cases(test_cases.len(), output),
        })
    }
}

fn failed_cases(count: usize, reason: String) -> Vec<TestCaseOutcome> {
    (0..count)
        .map(|_| TestCaseOutcome {
            passed: false,
            output: None,
            runtime_error: Some(reason.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: JsonValue) -> SandboxResponse {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn compile_error_wins_over_everything() {
        let resp = parse(json!({
            "compile_error": true,
            "error": "expected ';'",
            "timeout": true,
            "output": "partial",
            "code": "int main() {"
        }));
        let outcome = RunOutcome::classify(resp, None).unwrap();
        assert_eq!(
            outcome,
            RunOutcome::CompileError { error: "expected ';'".into(), code: Some("int main() {".into()) }
        );
    }

    #[test]
    fn runtime_error_beats_timeout() {
        let resp = parse(json!({"error": "ZeroDivisionError", "timeout": true}));
        assert!(matches!(RunOutcome::classify(resp, None).unwrap(), RunOutcome::RuntimeError { .. }));
    }

    #[test]
    fn timeout_without_output_gets_default_message() {
        let resp = parse(json!({"timeout": true, "output": ""}));
        assert_eq!(
            RunOutcome::classify(resp, None).unwrap(),
            RunOutcome::Timeout { output: TIMEOUT_MESSAGE.into() }
        );
    }

    #[test]
    fn timeout_beats_test_results() {
        let resp = parse(json!({"timeout": true, "test_case_results": [{"passed": true}]}));
        assert!(matches!(RunOutcome::classify(resp, Some(1)).unwrap(), RunOutcome::Timeout { .. }));
    }

    #[test]
    fn empty_output_becomes_placeholder() {
        let resp = parse(json!({"output": ""}));
        assert_eq!(
            RunOutcome::classify(resp, None).unwrap(),
            RunOutcome::Output { output: NO_OUTPUT_MESSAGE.into() }
        );
    }

    #[test]
    fn test_results_must_align_with_request() {
        let resp = parse(json!({"test_case_results": [{"passed": true, "output": "1"}]}));
        let err = RunOutcome::classify(resp, Some(2)).unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[test]
    fn test_results_are_returned_in_order() {
        let resp = parse(json!({"test_case_results": [
            {"passed": true, "output": "1"},
            {"passed": false, "runtime_error": "IndexError"}
        ]}));
        match RunOutcome::classify(resp, Some(2)).unwrap() {
            RunOutcome::TestCases { test_case_results } => {
                assert!(test_case_results[0].passed);
                assert_eq!(test_case_results[1].runtime_error.as_deref(), Some("IndexError"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn compile_error_string_is_message() {
        let resp = parse(json!({"compile_error": "missing semicolon"}));
        assert_eq!(
            RunOutcome::classify(resp, None).unwrap(),
            RunOutcome::CompileError { error: "missing semicolon".into(), code: None }
        );
    }
}
