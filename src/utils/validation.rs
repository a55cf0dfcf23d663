use validator::ValidationError;

use crate::models::problem::{Difficulty, ProblemType};

pub fn validate_difficulty(value: &str) -> Result<(), ValidationError> {
    Difficulty::parse(value)
        .map(|_| ())
        .ok_or_else(|| ValidationError::new("invalid_difficulty"))
}

pub fn validate_problem_type(value: &str) -> Result<(), ValidationError> {
    ProblemType::parse(value)
        .map(|_| ())
        .ok_or_else(|| ValidationError::new("invalid_problem_type"))
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

pub fn validate_one_of(value: &str, allowed: &[&str], code: &'static str) -> Result<(), ValidationError> {
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
        Ok(())
    } else {
        Err(ValidationError::new(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_is_case_insensitive() {
        assert!(validate_difficulty("easy").is_ok());
        assert!(validate_difficulty("Hard").is_ok());
        assert!(validate_difficulty("extreme").is_err());
    }

    #[test]
    fn blank_strings_are_rejected() {
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank("x").is_ok());
    }
}
