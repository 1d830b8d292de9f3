//! Local form validation
//!
//! Runs before any write is attempted. A failing form never reaches the
//! transport.

use super::error::{FieldError, Result, SheetError};
use super::values::parse_amount;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Field name → entered value
pub type FormValues = BTreeMap<String, String>;

/// A single check on one field
///
/// In layout JSON: `"required"`, `"amount"`, `"email"`, `{"digits": 10}`,
/// `{"maxLen": 80}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rule {
    Required,
    /// Positive number after currency cleaning
    Amount,
    /// Exactly this many ASCII digits
    Digits(usize),
    Email,
    MaxLen(usize),
}

impl Rule {
    fn check(&self, value: &str) -> Option<String> {
        let value = value.trim();

        // Only `Required` cares about blank fields
        if value.is_empty() {
            return match self {
                Rule::Required => Some("is required".to_string()),
                _ => None,
            };
        }

        match self {
            Rule::Required => None,
            Rule::Amount => match parse_amount(value) {
                Some(_) => None,
                None => Some("must be a positive amount".to_string()),
            },
            Rule::Digits(n) => {
                if value.len() == *n && value.chars().all(|c| c.is_ascii_digit()) {
                    None
                } else {
                    Some(format!("must be {} digits", n))
                }
            }
            Rule::Email => {
                if looks_like_email(value) {
                    None
                } else {
                    Some("must be a valid email address".to_string())
                }
            }
            Rule::MaxLen(max) => {
                if value.chars().count() <= *max {
                    None
                } else {
                    Some(format!("must be at most {} characters", max))
                }
            }
        }
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

fn looks_like_email(value: &str) -> bool {
    email_pattern().is_match(value)
}

/// Validate a form against per-field rules
///
/// Every field is checked; the first failing rule of each field is reported.
pub fn validate(form: &FormValues, rules: &BTreeMap<String, Vec<Rule>>) -> Result<()> {
    let errors: Vec<FieldError> = rules
        .iter()
        .filter_map(|(field, field_rules)| {
            let value = form.get(field).map(String::as_str).unwrap_or("");
            field_rules
                .iter()
                .find_map(|rule| rule.check(value))
                .map(|message| FieldError::new(field.clone(), message))
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SheetError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> BTreeMap<String, Vec<Rule>> {
        let mut rules = BTreeMap::new();
        rules.insert("dealerCode".to_string(), vec![Rule::Required, Rule::MaxLen(8)]);
        rules.insert("phone".to_string(), vec![Rule::Required, Rule::Digits(10)]);
        rules.insert("email".to_string(), vec![Rule::Email]);
        rules.insert("sales".to_string(), vec![Rule::Amount]);
        rules
    }

    fn form(pairs: &[(&str, &str)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_valid_form() {
        let form = form(&[
            ("dealerCode", "D-001"),
            ("phone", "9876543210"),
            ("sales", "₹1,200"),
        ]);
        assert!(validate(&form, &rules()).is_ok());
    }

    #[test]
    fn test_every_failing_field_is_reported() {
        let form = form(&[("phone", "12345"), ("email", "nobody"), ("sales", "abc")]);
        match validate(&form, &rules()) {
            Err(SheetError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["dealerCode", "email", "phone", "sales"]);
                assert_eq!(errors[0].message, "is required");
                assert_eq!(errors[2].message, "must be 10 digits");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_optional_rules_skip_blank_values() {
        let form = form(&[("dealerCode", "D1"), ("phone", "9876543210"), ("email", " ")]);
        assert!(validate(&form, &rules()).is_ok());
    }

    #[test]
    fn test_email_shapes() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a@@b.co"));
        assert!(!looks_like_email("a b@c.co"));
        assert!(!looks_like_email("a@b."));
        assert!(!looks_like_email("a@.co"));
        assert!(looks_like_email("first.last@mail.example.in"));
    }

    #[test]
    fn test_rules_deserialize() {
        let rules: Vec<Rule> =
            serde_json::from_str(r#"["required", {"digits": 10}, {"maxLen": 5}, "email"]"#)
                .unwrap();
        assert_eq!(
            rules,
            vec![Rule::Required, Rule::Digits(10), Rule::MaxLen(5), Rule::Email]
        );
    }
}
