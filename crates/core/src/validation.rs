//! Field-level validation errors (form semantics).

use std::collections::BTreeMap;

use serde::Serialize;

/// Accumulates validation messages per field.
///
/// The special field `__all__` carries errors that are not tied to a single
/// input (e.g. "passwords do not match").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub const NON_FIELD: &'static str = "__all__";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.add(Self::NON_FIELD, message);
    }

    /// Append every message from `other`.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Check a required text field, trimming whitespace.
    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "This field is required.");
        }
    }

    /// Check a maximum length in characters.
    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("Ensure this value has at most {max} characters."));
        }
    }

    /// Check a basic email shape (`local@domain.tld`). Empty values pass.
    pub fn email(&mut self, field: &str, value: &str) {
        if !value.is_empty() && !is_plausible_email(value) {
            self.add(field, "Enter a valid email address.");
        }
    }

    /// `Ok(())` when no errors were recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl core::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for m in messages {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{field}: {m}")?;
            }
        }
        Ok(())
    }
}

/// Basic email format check (not RFC 5322).
pub fn is_plausible_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_messages_per_field() {
        let mut errors = FieldErrors::new();
        errors.require("name", "   ");
        errors.max_len("name", "abcdef", 3);
        errors.email("email", "nope");

        assert_eq!(errors.get("name").map(|m| m.len()), Some(2));
        assert!(errors.contains("email"));
        assert!(errors.clone().into_result().is_err());
    }

    #[test]
    fn email_shapes() {
        assert!(is_plausible_email("ivan@example.com"));
        assert!(!is_plausible_email("ivan@example"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("a b@example.com"));
        assert!(!is_plausible_email("a@b@c.com"));
    }

    #[test]
    fn merge_keeps_both_sides() {
        let mut errors = FieldErrors::new();
        errors.add("email", "taken");
        let mut other = FieldErrors::new();
        other.add("email", "invalid");
        other.add("phone", "too long");
        errors.merge(other);

        assert_eq!(errors.get("email").map(|m| m.len()), Some(2));
        assert!(errors.contains("phone"));
    }

    #[test]
    fn display_joins_fields() {
        let mut errors = FieldErrors::new();
        errors.add("a", "x");
        errors.add_non_field("y");
        assert_eq!(errors.to_string(), "__all__: y; a: x");
    }
}
