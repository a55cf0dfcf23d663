pub mod assessment_service;
pub mod attempt_service;
pub mod audit_service;
pub mod candidate_service;
pub mod category_service;
pub mod code_runner;
pub mod codewars_service;
pub mod draft_service;
pub mod export_service;
pub mod feedback_service;
pub mod grading_service;
pub mod interview_service;
pub mod practice_service;
pub mod profile_service;
pub mod review_service;
pub mod session_rules;
pub mod session_service;
