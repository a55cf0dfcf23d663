use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CategoryPayload {
    #[validate(
        length(min = 1, max = 100),
        custom(function = "crate::utils::validation::validate_not_blank")
    )]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

impl CategoryPayload {
    pub fn description_trimmed(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_is_rejected() {
        let payload = CategoryPayload {
            name: "   ".into(),
            description: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn empty_description_becomes_none() {
        let payload = CategoryPayload {
            name: "Arrays".into(),
            description: Some("  ".into()),
        };
        assert!(payload.validate().is_ok());
        assert_eq!(payload.description_trimmed(), None);
    }
}
