//! Core engine for clinical calculators: unit conversion, validation, form
//! state, scoring and the calculator registry.

use serde::{Deserialize, Serialize};

pub mod calculator;
pub mod codes;
pub mod form;
pub mod formula;
pub mod library;
pub mod registry;
pub mod scoring;
pub mod units;
pub mod validation;

pub use calculator::{
    Assessment, CalcResult, Calculator, CanonicalUnit, DataRequirement, ResultItem,
};
pub use form::{CalculationInput, FieldValue, FormState};
pub use registry::Registry;
pub use units::{UnitConverter, UnitDomain};
pub use validation::{validate_calculator_input, ValidationResult, ValidationRule, ValidationSchema};

/// Runtime settings shared by every calculator view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalcConfig {
    /// Age (days) after which an auto-populated observation is flagged stale.
    pub staleness_threshold_days: u32,
    /// `_count` sent with observation searches.
    pub observation_count: u32,
    /// Optional client timeout for HTTP FHIR sources.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            staleness_threshold_days: 90,
            observation_count: 1,
            request_timeout_secs: None,
        }
    }
}

/// Presentation class attached to results and alerts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }

    /// CSS class used by alert boxes, e.g. `ui-alert-danger`.
    pub fn alert_class(self) -> String {
        format!("ui-alert-{}", self.as_str())
    }

    pub fn icon(self) -> &'static str {
        match self {
            Severity::Success => "✓",
            Severity::Info => "ℹ",
            Severity::Warning => "⚠",
            Severity::Danger => "⚠",
        }
    }
}

/// Error taxonomy shared by the calculator pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("Input validation failed: {0}")]
    Validation(String),
    #[error("FHIR data error: {0}")]
    FhirData(String),
    #[error("Calculation failed: {0}")]
    Calculation(String),
    #[error("Unknown calculator: {0}")]
    UnknownCalculator(String),
    #[error("Unit {unit} is not supported for {domain}")]
    UnknownUnit { unit: String, domain: String },
    #[error("Calculator {0} is already registered")]
    DuplicateCalculator(String),
}

impl CalcError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CalcError::Validation(_) => "VALIDATION_ERROR",
            CalcError::FhirData(_) => "FHIR_DATA_ERROR",
            CalcError::Calculation(_) => "CALCULATION_ERROR",
            CalcError::UnknownCalculator(_) => "UNKNOWN_CALCULATOR",
            CalcError::UnknownUnit { .. } => "UNKNOWN_UNIT",
            CalcError::DuplicateCalculator(_) => "DUPLICATE_CALCULATOR",
        }
    }

    /// Text safe to show to clinicians.
    pub fn user_message(&self) -> String {
        match self {
            CalcError::Validation(message) => format!("Input validation failed: {message}"),
            CalcError::FhirData(_) => "Unable to retrieve patient data from EHR system. Please check connection or enter data manually.".to_string(),
            CalcError::UnknownCalculator(id) => format!("Calculator \"{id}\" was not found."),
            CalcError::UnknownUnit { unit, domain } => {
                format!("Unit \"{unit}\" cannot be used for {domain}.")
            }
            CalcError::Calculation(_) | CalcError::DuplicateCalculator(_) => {
                "Calculator encountered an error. Please refresh the page and try again or contact support.".to_string()
            }
        }
    }
}

/// Report a pipeline error with its calculator and action context.
pub fn log_error(error: &CalcError, calculator: &str, action: &str) {
    tracing::error!(
        calculator,
        action,
        code = error.code(),
        "{error}"
    );
}

/// Reject NaN and infinities produced by a formula.
pub fn ensure_finite(label: &str, value: f64) -> Result<f64, CalcError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError::Calculation(format!(
            "{label} produced a non-finite value"
        )))
    }
}

/// Round to a fixed number of decimals.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_ninety_day_threshold() {
        let config = CalcConfig::default();
        assert_eq!(config.staleness_threshold_days, 90);
        assert_eq!(config.observation_count, 1);
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: CalcConfig =
            serde_json::from_str(r#"{"staleness_threshold_days": 30, "observation_count": 3}"#)
                .expect("config");
        assert_eq!(config.staleness_threshold_days, 30);
        assert_eq!(config.request_timeout_secs, None);
    }

    #[test]
    fn fhir_errors_hide_details_from_users() {
        let err = CalcError::FhirData("503 from server".into());
        assert!(!err.user_message().contains("503"));
        assert_eq!(err.code(), "FHIR_DATA_ERROR");
    }

    #[test]
    fn ensure_finite_rejects_nan() {
        assert!(ensure_finite("bmi", f64::NAN).is_err());
        assert_eq!(ensure_finite("bmi", 1.5), Ok(1.5));
    }
}
