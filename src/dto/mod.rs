pub mod assessment_dto;
pub mod candidate_dto;
pub mod category_dto;
pub mod codewars_dto;
pub mod feedback_dto;
pub mod interview_dto;
pub mod practice_dto;
pub mod profile_dto;
pub mod review_dto;
pub mod run_code_dto;
pub mod session_dto;
