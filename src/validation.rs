//! Required-field checks for the reply form.

use crate::request::GenerationRequest;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    UserName,
    SenderName,
    ReceivedEmail,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::UserName => "userName",
            Field::SenderName => "senderName",
            Field::ReceivedEmail => "receivedEmail",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Field::UserName => "Please enter your name",
            Field::SenderName => "Please enter the sender's name",
            Field::ReceivedEmail => "Please enter the received email content",
        }
    }
}

/// Field-level messages; a field with no entry is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<Field, String>);

impl ValidationErrors {
    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    /// Drops one field's message once the user edits it. Other fields are untouched.
    pub fn clear(&mut self, field: Field) {
        self.0.remove(&field);
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Checks the three required fields. Pure; never fails.
pub fn validate(user_name: &str, sender_name: &str, received_email: &str) -> ValidationErrors {
    let mut errors = BTreeMap::new();
    for (field, value) in [
        (Field::UserName, user_name),
        (Field::SenderName, sender_name),
        (Field::ReceivedEmail, received_email),
    ] {
        if is_blank(value) {
            errors.insert(field, field.message().to_string());
        }
    }
    ValidationErrors(errors)
}

/// Validator carrying the configured advisory email length.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    max_email_length: usize,
}

impl Validator {
    pub fn new(max_email_length: usize) -> Self {
        Self { max_email_length }
    }

    pub fn max_email_length(&self) -> usize {
        self.max_email_length
    }

    /// Validates a request. Exceeding the email length only logs a warning.
    pub fn validate(&self, request: &GenerationRequest) -> ValidationErrors {
        let errors = validate(
            &request.user_name,
            &request.sender_name,
            &request.received_email,
        );
        if self.exceeds_email_length(&request.received_email) {
            warn!(
                "Received email is {} characters, above the advised maximum of {}",
                request.received_email.chars().count(),
                self.max_email_length
            );
        }
        errors
    }

    pub fn exceeds_email_length(&self, email: &str) -> bool {
        email.chars().count() > self.max_email_length
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_EMAIL_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Tone;

    #[test]
    fn test_all_present_is_valid() {
        let errors = validate("John", "Jane", "Hello");
        assert!(errors.is_valid());
        assert_eq!(errors.len(), 0);
    }

    #[test]
    fn test_every_subset_of_blank_fields() {
        let blanks = ["", "   ", "\t\n"];
        for mask in 0u8..8 {
            let pick = |bit: u8, good: &'static str| -> &'static str {
                if mask & bit != 0 { blanks[(bit as usize) % 3] } else { good }
            };
            let errors = validate(pick(1, "John"), pick(2, "Jane"), pick(4, "Body"));

            assert_eq!(errors.is_valid(), mask == 0);
            for (bit, field) in [(1, Field::UserName), (2, Field::SenderName), (4, Field::ReceivedEmail)] {
                let message = errors.get(field);
                if mask & bit != 0 {
                    assert!(message.is_some_and(|m| !m.is_empty()), "{:?} should fail", field);
                } else {
                    assert!(message.is_none(), "{:?} should pass", field);
                }
            }
        }
    }

    #[test]
    fn test_clear_drops_only_one_field() {
        let mut errors = validate("", "", "x");
        errors.clear(Field::UserName);
        assert!(errors.get(Field::UserName).is_none());
        assert!(errors.get(Field::SenderName).is_some());
        assert!(!errors.is_valid());

        errors.clear(Field::ReceivedEmail);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_length_limit_is_advisory() {
        let validator = Validator::new(10);
        let request = GenerationRequest::new("a", "b", "x".repeat(50), Tone::Casual);
        assert!(validator.exceeds_email_length(&request.received_email));
        assert!(validator.validate(&request).is_valid());
    }

    #[test]
    fn test_errors_serialize_by_field_name() {
        let errors = validate("", "Jane", "Body");
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value["userName"], "Please enter your name");
        assert!(value.get("senderName").is_none());
    }
}
