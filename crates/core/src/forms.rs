//! Field-level form errors shared by services and the HTML layer.

use std::collections::BTreeMap;
use std::fmt;

use validator::{ValidationError, ValidationErrors};
use yatube_common::AppError;

/// Error messages keyed by form field name.
///
/// Errors not tied to one field are stored under [`FormErrors::NON_FIELD`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    /// Key for errors that concern the whole form.
    pub const NON_FIELD: &'static str = "__all__";

    /// Create an empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Whether no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Messages recorded for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether `field` has any message.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    /// Messages that concern the whole form.
    #[must_use]
    pub fn non_field(&self) -> &[String] {
        self.get(Self::NON_FIELD)
    }

    /// Fold derive-based validation results into this set.
    pub fn extend_from(&mut self, errors: &ValidationErrors) {
        for (field, list) in errors.field_errors() {
            for error in list {
                self.add(field.as_ref(), describe(error));
            }
        }
    }

    /// `Ok(())` when empty, otherwise a validation error carrying every message.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.to_string()))
        }
    }
}

/// Result of submitting a form to a service.
#[derive(Debug, Clone)]
pub enum Submission<T> {
    /// The input was valid and the change was written.
    Accepted(T),
    /// The input was invalid; nothing was written.
    Rejected(FormErrors),
}

impl<T> Submission<T> {
    /// The accepted value, if any.
    pub fn accepted(self) -> Option<T> {
        match self {
            Self::Accepted(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    /// The form errors, if rejected.
    pub fn rejected(self) -> Option<FormErrors> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(errors) => Some(errors),
        }
    }
}

impl From<&ValidationErrors> for FormErrors {
    fn from(errors: &ValidationErrors) -> Self {
        let mut form = Self::new();
        form.extend_from(errors);
        form
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    match &*error.code {
        "length" => "Ensure this value has a valid length.".to_string(),
        "email" => "Enter a valid email address.".to_string(),
        "required" => "This field is required.".to_string(),
        other => format!("Invalid value ({other})."),
    }
}

/// Reject empty or whitespace-only text.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("This field is required.".into());
        return Err(error);
    }
    Ok(())
}
