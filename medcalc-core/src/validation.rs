//! Declarative validation of calculator input.

use serde::{Deserialize, Serialize};

use crate::form::{CalculationInput, FieldValue};
use crate::CalcError;

/// Constraint attached to one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ValidationRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

/// Cross-field check; returns an error message when the combination is invalid.
pub type CrossCheck = fn(&CalculationInput) -> Option<String>;

#[derive(Clone)]
struct CrossRule {
    fields: Vec<String>,
    check: CrossCheck,
}

impl std::fmt::Debug for CrossRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossRule")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Ordered per-field rules plus cross-field checks.
#[derive(Debug, Clone, Default)]
pub struct ValidationSchema {
    fields: Vec<(String, ValidationRule)>,
    cross: Vec<CrossRule>,
}

impl ValidationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, rule: ValidationRule) -> Self {
        self.fields.push((key.to_string(), rule));
        self
    }

    /// Run `check` once every field in `fields` is present.
    pub fn cross(mut self, fields: &[&str], check: CrossCheck) -> Self {
        self.cross.push(CrossRule {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            check,
        });
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ValidationRule)> {
        self.fields.iter().map(|(key, rule)| (key.as_str(), rule))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn rule(&self, key: &str) -> Option<&ValidationRule> {
        self.fields
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, rule)| rule)
    }
}

impl FromIterator<(String, ValidationRule)> for ValidationSchema {
    fn from_iter<T: IntoIterator<Item = (String, ValidationRule)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
            cross: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Required,
    OutOfRange,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub kind: IssueKind,
    pub message: String,
}

/// Ordered list of issues; valid iff empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn errors(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.message.as_str()).collect()
    }

    /// First issue that is not a missing-required-field complaint.
    pub fn first_non_required(&self) -> Option<&ValidationIssue> {
        self.issues
            .iter()
            .find(|issue| issue.kind != IssueKind::Required)
    }

    /// JSON shape exposed to JavaScript: `{ isValid, errors }`.
    pub fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "isValid": self.is_valid(),
            "errors": self.errors(),
        })
    }
}

fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

fn range_message(label: &str, rule: &ValidationRule) -> String {
    match (rule.min, rule.max) {
        (Some(min), Some(max)) => format!(
            "{label} must be between {} and {}",
            format_bound(min),
            format_bound(max)
        ),
        (Some(min), None) => format!("{label} must be at least {}", format_bound(min)),
        (None, Some(max)) => format!("{label} must be at most {}", format_bound(max)),
        (None, None) => format!("{label} is invalid"),
    }
}

/// Validate `values` against `schema`, collecting every issue in schema
/// order. Keys absent from the schema are ignored.
pub fn validate_calculator_input(
    values: &CalculationInput,
    schema: &ValidationSchema,
) -> ValidationResult {
    let mut issues = Vec::new();

    for (key, rule) in &schema.fields {
        let label = rule.label.as_deref().unwrap_or(key);
        let value = values.get(key).unwrap_or(&FieldValue::Missing);

        if !value.is_present() {
            if rule.required {
                issues.push(ValidationIssue {
                    field: key.clone(),
                    kind: IssueKind::Required,
                    message: format!("{label} is required"),
                });
            }
            continue;
        }

        let Some(number) = value.as_number() else {
            continue;
        };

        let below = rule.min.map(|min| number < min).unwrap_or(false);
        let above = rule.max.map(|max| number > max).unwrap_or(false);
        if below || above {
            issues.push(ValidationIssue {
                field: key.clone(),
                kind: IssueKind::OutOfRange,
                message: rule
                    .message
                    .clone()
                    .unwrap_or_else(|| range_message(label, rule)),
            });
        }
    }

    for cross in &schema.cross {
        if !cross.fields.iter().all(|field| values.is_present(field)) {
            continue;
        }
        if let Some(message) = (cross.check)(values) {
            issues.push(ValidationIssue {
                field: cross.fields.join(","),
                kind: IssueKind::Custom,
                message,
            });
        }
    }

    ValidationResult { issues }
}

/// Validate and fold the issues into a single [`CalcError::Validation`].
pub fn validate_or_err(values: &CalculationInput, schema: &ValidationSchema) -> Result<(), CalcError> {
    let result = validate_calculator_input(values, schema);
    if result.is_valid() {
        Ok(())
    } else {
        Err(CalcError::Validation(result.errors().join("; ")))
    }
}

/// Physiological ranges shared across calculators.
pub mod rules {
    use super::ValidationRule;

    fn preset(label: &str, min: f64, max: f64, message: &str) -> ValidationRule {
        ValidationRule::range(min, max)
            .required()
            .label(label)
            .message(message)
    }

    pub fn age() -> ValidationRule {
        preset("Age", 0.0, 150.0, "Please enter a valid age between 0-150 years.")
    }

    pub fn temperature() -> ValidationRule {
        preset("Temperature", 20.0, 45.0, "Temperature must be between 20-45°C.")
    }

    pub fn systolic_bp() -> ValidationRule {
        preset("Systolic BP", 50.0, 250.0, "Systolic BP must be between 50-250 mmHg.")
    }

    pub fn diastolic_bp() -> ValidationRule {
        preset("Diastolic BP", 30.0, 150.0, "Diastolic BP must be between 30-150 mmHg.")
    }

    pub fn heart_rate() -> ValidationRule {
        preset("Heart rate", 20.0, 250.0, "Heart rate must be between 20-250 bpm.")
    }

    pub fn respiratory_rate() -> ValidationRule {
        preset("Respiratory rate", 0.0, 100.0, "Respiratory rate must be between 0-100 breaths/min.")
    }

    pub fn ph() -> ValidationRule {
        preset("pH", 6.5, 8.0, "pH must be between 6.5-8.0.")
    }

    pub fn weight() -> ValidationRule {
        preset("Weight", 0.5, 500.0, "Weight must be between 0.5-500 kg.")
    }

    pub fn height() -> ValidationRule {
        preset("Height", 30.0, 250.0, "Height must be between 30-250 cm.")
    }

    pub fn gcs() -> ValidationRule {
        preset("GCS", 3.0, 15.0, "Glasgow Coma Scale must be between 3-15.")
    }

    pub fn map() -> ValidationRule {
        preset("MAP", 20.0, 300.0, "MAP must be between 20-300 mmHg.")
    }

    pub fn qt_interval() -> ValidationRule {
        preset("QT interval", 200.0, 800.0, "QT interval must be between 200-800 ms.")
    }

    pub fn glucose() -> ValidationRule {
        preset("Glucose", 10.0, 2000.0, "Glucose must be between 10-2000 mg/dL.")
    }

    pub fn bun() -> ValidationRule {
        preset("BUN", 1.0, 200.0, "BUN must be between 1-200 mg/dL.")
    }

    pub fn creatinine() -> ValidationRule {
        preset("Creatinine", 0.1, 20.0, "Creatinine must be between 0.1-20 mg/dL.")
    }

    pub fn sodium() -> ValidationRule {
        preset("Sodium", 100.0, 200.0, "Sodium must be between 100-200 mEq/L.")
    }

    pub fn potassium() -> ValidationRule {
        preset("Potassium", 1.5, 10.0, "Potassium must be between 1.5-10 mEq/L.")
    }

    pub fn chloride() -> ValidationRule {
        preset("Chloride", 50.0, 150.0, "Chloride must be between 50-150 mEq/L.")
    }

    pub fn bicarbonate() -> ValidationRule {
        preset("Bicarbonate", 1.0, 60.0, "Bicarbonate must be between 1-60 mEq/L.")
    }

    pub fn calcium() -> ValidationRule {
        preset("Calcium", 2.0, 20.0, "Calcium must be between 2-20 mg/dL.")
    }

    pub fn albumin() -> ValidationRule {
        preset("Albumin", 0.5, 8.0, "Albumin must be between 0.5-8 g/dL.")
    }

    pub fn bilirubin() -> ValidationRule {
        preset("Bilirubin", 0.1, 80.0, "Bilirubin must be between 0.1-80 mg/dL.")
    }

    pub fn inr() -> ValidationRule {
        preset("INR", 0.5, 20.0, "INR must be between 0.5-20.")
    }

    pub fn platelets() -> ValidationRule {
        preset("Platelets", 1.0, 2000.0, "Platelets must be between 1-2000 ×10⁹/L.")
    }

    pub fn hematocrit() -> ValidationRule {
        preset("Hematocrit", 5.0, 80.0, "Hematocrit must be between 5-80%.")
    }

    pub fn wbc() -> ValidationRule {
        preset("WBC", 0.0, 500.0, "WBC must be between 0-500 ×10⁹/L.")
    }

    pub fn fio2() -> ValidationRule {
        preset("FiO₂", 0.21, 1.0, "FiO₂ must be between 0.21-1.0.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ValidationSchema {
        ValidationSchema::new()
            .field("age", ValidationRule::range(0.0, 150.0).required().label("Age"))
            .field("weight", ValidationRule::new().min(0.5).label("Weight"))
            .field("note", ValidationRule::new().max(10.0))
    }

    #[test]
    fn reports_required_and_range_in_order() {
        let values = CalculationInput::new()
            .with("weight", FieldValue::Number(0.1))
            .with("note", FieldValue::Number(11.0))
            .with("extra", FieldValue::Number(-1.0));
        let result = validate_calculator_input(&values, &schema());
        assert_eq!(
            result.errors(),
            vec![
                "Age is required",
                "Weight must be at least 0.5",
                "note must be at most 10"
            ]
        );
        assert_eq!(
            result.first_non_required().map(|issue| issue.field.as_str()),
            Some("weight")
        );
    }

    #[test]
    fn validation_is_deterministic() {
        let values = CalculationInput::new().with("age", FieldValue::Number(151.0));
        let first = validate_calculator_input(&values, &schema());
        let second = validate_calculator_input(&values, &schema());
        assert_eq!(first, second);
        assert_eq!(first.errors(), vec!["Age must be between 0 and 150"]);
    }

    #[test]
    fn nan_and_blank_count_as_missing() {
        let values = CalculationInput::new()
            .with("age", FieldValue::Number(f64::NAN))
            .with("weight", FieldValue::Text("  ".into()));
        let result = validate_calculator_input(&values, &schema());
        assert_eq!(result.errors(), vec!["Age is required"]);
    }

    #[test]
    fn custom_message_wins() {
        let schema = ValidationSchema::new().field("hr", super::rules::heart_rate());
        let values = CalculationInput::new().with("hr", FieldValue::Number(300.0));
        let result = validate_calculator_input(&values, &schema);
        assert_eq!(result.errors(), vec!["Heart rate must be between 20-250 bpm."]);
        assert!(validate_or_err(&values, &schema).is_err());
    }

    #[test]
    fn cross_checks_need_all_fields() {
        let schema = ValidationSchema::new().cross(&["a", "b"], |values| {
            let (a, b) = (values.number("a")?, values.number("b")?);
            (a <= b).then(|| "a must exceed b".to_string())
        });
        let only_a = CalculationInput::new().with("a", FieldValue::Number(1.0));
        assert!(validate_calculator_input(&only_a, &schema).is_valid());
        let both = only_a.with("b", FieldValue::Number(2.0));
        let result = validate_calculator_input(&both, &schema);
        assert_eq!(result.issues()[0].kind, IssueKind::Custom);
    }

    #[test]
    fn report_matches_js_shape() {
        let result = validate_calculator_input(&CalculationInput::new(), &schema());
        let report = result.report();
        assert_eq!(report["isValid"], false);
        assert_eq!(report["errors"][0], "Age is required");
    }
}
