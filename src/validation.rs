//! Field-level form validation.
//!
//! A [`Validator`] runs individual checks and records the first failure per
//! field into a [`ValidationErrors`] map, which is rendered verbatim as the
//! `validationErrors` object of an error response.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Field name → human readable message.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    /// Records `message` unless `field` already failed.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[cfg(test)]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blank string check. Returns the trimmed value when present.
    pub fn required<'a>(
        &mut self,
        field: &str,
        value: Option<&'a str>,
        message: &str,
    ) -> Option<&'a str> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.errors.add(field, message);
                None
            }
        }
    }

    pub fn required_value<T>(&mut self, field: &str, value: Option<T>, message: &str) -> Option<T> {
        if value.is_none() {
            self.errors.add(field, message);
        }
        value
    }

    #[allow(dead_code)]
    pub fn min_len(&mut self, field: &str, value: &str, min: usize, message: &str) -> bool {
        self.check(field, value.chars().count() >= min, message)
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize, message: &str) -> bool {
        self.check(field, value.chars().count() <= max, message)
    }

    pub fn min(&mut self, field: &str, value: i64, min: i64, message: &str) -> bool {
        self.check(field, value >= min, message)
    }

    pub fn max(&mut self, field: &str, value: i64, max: i64, message: &str) -> bool {
        self.check(field, value <= max, message)
    }

    pub fn matches(&mut self, field: &str, value: &str, re: &Regex, message: &str) -> bool {
        self.check(field, re.is_match(value), message)
    }

    pub fn email(&mut self, field: &str, value: &str, message: &str) -> bool {
        self.check(field, is_valid_email(value), message)
    }

    /// Records a failure found outside the built-in checks.
    pub fn error(&mut self, field: &str, message: &str) {
        self.errors.add(field, message);
    }

    #[cfg(test)]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn check(&mut self, field: &str, ok: bool, message: &str) -> bool {
        if !ok {
            self.errors.add(field, message);
        }
        ok
    }
}
