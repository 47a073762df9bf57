//! Applicant eligibility rule
//!
//! Indian citizens holding an Indian-issued passport cannot apply. The same
//! function backs the advisory endpoint and the check made at submission.

use serde::{Deserialize, Serialize};

const INDIA_ALIASES: &[&str] = &["india", "in", "ind", "indian", "republic of india", "bharat"];

pub const INELIGIBLE_REASON: &str =
    "Indian citizens holding an Indian passport are not eligible to apply for this visa";

/// Inputs to the rule, as stored on the application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityInput {
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub nationality_by_birth: Option<bool>,
    #[serde(default)]
    pub passport_place_of_issue: Option<String>,
    /// Accepted for completeness; not part of the decision
    #[serde(default)]
    pub country_of_birth: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EligibilityResult {
    fn eligible() -> Self {
        Self {
            eligible: true,
            error: None,
        }
    }

    fn ineligible() -> Self {
        Self {
            eligible: false,
            error: Some(INELIGIBLE_REASON.to_string()),
        }
    }
}

pub fn is_india(value: Option<&str>) -> bool {
    let Some(value) = value else {
        return false;
    };
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    INDIA_ALIASES.contains(&normalized.as_str()) || normalized.contains("india")
}

pub fn evaluate(input: &EligibilityInput) -> EligibilityResult {
    // An unset by-birth flag counts as by birth.
    let by_birth = input.nationality_by_birth != Some(false);

    if is_india(input.nationality.as_deref())
        && is_india(input.passport_place_of_issue.as_deref())
        && by_birth
    {
        EligibilityResult::ineligible()
    } else {
        EligibilityResult::eligible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(nationality: &str, by_birth: Option<bool>, issued: &str) -> EligibilityInput {
        EligibilityInput {
            nationality: Some(nationality.to_string()),
            nationality_by_birth: by_birth,
            passport_place_of_issue: Some(issued.to_string()),
            country_of_birth: None,
        }
    }

    #[test]
    fn decision_table() {
        let cases = [
            (input("India", Some(true), "India"), false),
            (input("India", Some(false), "India"), true),
            (input("India", Some(true), "France"), true),
            (input("France", Some(true), "India"), true),
            (input("India", None, "India"), false),
        ];
        for (case, expected) in cases {
            assert_eq!(evaluate(&case).eligible, expected, "{:?}", case);
        }
    }

    #[test]
    fn aliases_are_normalized() {
        assert!(is_india(Some("  IN ")));
        assert!(is_india(Some("Bharat")));
        assert!(is_india(Some("Republic of India")));
        assert!(is_india(Some("New Delhi, India")));
        assert!(!is_india(Some("Indonesia")));
        assert!(!is_india(Some("")));
        assert!(!is_india(None));
    }

    #[test]
    fn ineligible_result_carries_reason() {
        let result = evaluate(&input("ind", Some(true), "indian"));
        assert!(!result.eligible);
        assert_eq!(result.error.as_deref(), Some(INELIGIBLE_REASON));
    }

    #[test]
    fn country_of_birth_is_ignored() {
        let mut case = input("France", Some(true), "France");
        case.country_of_birth = Some("India".to_string());
        assert!(evaluate(&case).eligible);
    }

    #[test]
    fn missing_fields_are_eligible() {
        assert!(evaluate(&EligibilityInput::default()).eligible);
    }
}
