// Validation result types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub touched: bool,
}

impl StepValidationResult {
    /// Result for a step with nothing to check (hidden conditional steps).
    pub fn pass() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn has_error_on(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn has_warning_on(&self, field: &str) -> bool {
        self.warnings.iter().any(|w| w.field == field)
    }
}

/// Accumulates findings for one step; `finish` derives the `valid` flag.
#[derive(Debug, Default)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: impl Into<String>, code: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
            code: code.to_string(),
            severity: Severity::Error,
        });
    }

    pub fn critical(&mut self, field: impl Into<String>, code: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
            code: code.to_string(),
            severity: Severity::Critical,
        });
    }

    pub fn warning(&mut self, field: impl Into<String>, code: &str, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            field: field.into(),
            message: message.into(),
            code: code.to_string(),
        });
    }

    /// Record a required-field error when `value` is blank. Returns true when present.
    pub fn require(&mut self, field: &str, value: &str, label: &str) -> bool {
        if value.trim().is_empty() {
            self.error(field, codes::REQUIRED, format!("{} is required", label));
            return false;
        }
        true
    }

    pub fn finish(self) -> StepValidationResult {
        StepValidationResult {
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            touched: true,
        }
    }
}

/// Machine-readable validation codes shared by all flows.
pub mod codes {
    pub const REQUIRED: &str = "REQUIRED";
    pub const TOO_LONG: &str = "TOO_LONG";
    pub const TOO_SHORT: &str = "TOO_SHORT";
    pub const INVALID_FORMAT: &str = "INVALID_FORMAT";
    pub const INVALID_OWNER_ID: &str = "INVALID_OWNER_ID";
    pub const INVALID_EMAIL: &str = "INVALID_EMAIL";
    pub const INVALID_URL: &str = "INVALID_URL";
    pub const INSECURE_URL: &str = "INSECURE_URL";
    pub const MIN_ITEMS: &str = "MIN_ITEMS";
    pub const UNSUPPORTED: &str = "UNSUPPORTED";
    pub const DUPLICATE: &str = "DUPLICATE";
    pub const OUT_OF_RANGE: &str = "OUT_OF_RANGE";
    pub const OWNERS_MUST_DIFFER: &str = "OWNERS_MUST_DIFFER";
    pub const NOT_CONFIRMED: &str = "NOT_CONFIRMED";
    pub const RECOMMENDED: &str = "RECOMMENDED";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalValidationResult<S> {
    pub valid: bool,
    pub completed_steps: Vec<S>,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub can_proceed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationState<S: Eq + Hash> {
    pub step_validation: HashMap<S, StepValidationResult>,
    pub global_validation: GlobalValidationResult<S>,
    pub is_dirty: bool,
}

impl<S: Eq + Hash> Default for ValidationState<S> {
    fn default() -> Self {
        Self {
            step_validation: HashMap::new(),
            global_validation: GlobalValidationResult {
                valid: false,
                completed_steps: Vec::new(),
                total_errors: 0,
                total_warnings: 0,
                can_proceed: false,
            },
            is_dirty: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_without_errors_is_valid_even_with_warnings() {
        let mut report = ValidationReport::new();
        report.warning("description", codes::RECOMMENDED, "Add a description");
        let result = report.finish();
        assert!(result.valid);
        assert!(result.touched);
        assert!(result.has_warning_on("description"));
    }

    #[test]
    fn require_flags_blank_values() {
        let mut report = ValidationReport::new();
        assert!(!report.require("name", "   ", "Project name"));
        assert!(report.require("owner", "A123456", "Owner"));
        let result = report.finish();
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, codes::REQUIRED);
        assert_eq!(result.errors[0].severity, Severity::Error);
    }

    #[test]
    fn pass_is_valid_and_untouched() {
        let result = StepValidationResult::pass();
        assert!(result.valid);
        assert!(!result.touched);
        assert!(result.errors.is_empty());
    }
}
