//! Calculator trait, outcomes and FHIR data requirements.

use serde::{Deserialize, Serialize};

use crate::form::{CalculationInput, Section};
use crate::units::UnitDomain;
use crate::validation::{validate_calculator_input, ValidationSchema};
use crate::{log_error, CalcError, Severity};

/// One line of a rendered result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub label: String,
    pub value: String,
    pub unit: Option<String>,
    pub interpretation: Option<String>,
    pub severity: Option<Severity>,
    /// Large score display (`.ui-result-score`) rather than a value row.
    #[serde(default)]
    pub is_score: bool,
}

impl ResultItem {
    pub fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
            unit: None,
            interpretation: None,
            severity: None,
            is_score: false,
        }
    }

    pub fn score(label: &str, value: impl Into<String>) -> Self {
        Self {
            is_score: true,
            ..Self::new(label, value)
        }
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn interpretation(mut self, text: &str, severity: Severity) -> Self {
        self.interpretation = Some(text.to_string());
        self.severity = Some(severity);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    pub fn new(severity: Severity, message: &str) -> Self {
        Self {
            severity,
            message: message.to_string(),
        }
    }
}

/// Computed score or derived value with its interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcResult {
    pub value: f64,
    pub severity: Severity,
    pub items: Vec<ResultItem>,
    pub alerts: Vec<Alert>,
}

impl CalcResult {
    pub fn new(value: f64, severity: Severity) -> Self {
        Self {
            value,
            severity,
            items: Vec::new(),
            alerts: Vec::new(),
        }
    }

    pub fn item(mut self, item: ResultItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn alert(mut self, severity: Severity, message: &str) -> Self {
        self.alerts.push(Alert::new(severity, message));
        self
    }
}

/// What the view should show after a recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Assessment {
    /// Nothing entered yet; result stays hidden.
    Empty,
    /// Partially filled input with a problem to show.
    Invalid { message: String },
    Complete { result: CalcResult },
    /// Formula failure; the message is the user-facing text.
    Failed { message: String },
}

impl Assessment {
    pub fn result(&self) -> Option<&CalcResult> {
        match self {
            Assessment::Complete { result } => Some(result),
            _ => None,
        }
    }
}

/// Where a patient's age lands in the form.
#[derive(Debug, Clone, Copy)]
pub enum AgeTarget {
    /// Numeric input receiving the age in years.
    Field(&'static str),
    /// Radio group; `pick` maps the age to an option value.
    Choice {
        group: &'static str,
        pick: fn(u32) -> &'static str,
    },
    /// Yes/no criterion affirmed when `when(age)` holds.
    Flag {
        id: &'static str,
        when: fn(u32) -> bool,
    },
}

/// Unit a requirement's threshold is written in. Observations reported in
/// another unit of `domain` are converted before the threshold is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalUnit {
    pub domain: UnitDomain,
    pub unit: &'static str,
}

impl CanonicalUnit {
    pub const fn new(domain: UnitDomain, unit: &'static str) -> Self {
        Self { domain, unit }
    }
}

/// FHIR data a calculator can pre-fill.
#[derive(Debug, Clone)]
pub enum DataRequirement {
    /// Most recent observation with `code` (comma-separated codes allowed)
    /// written into numeric input `field`.
    Observation {
        code: &'static str,
        field: &'static str,
        label: &'static str,
    },
    /// Component `component` of a panel observation `panel`.
    PanelComponent {
        panel: &'static str,
        component: &'static str,
        field: &'static str,
        label: &'static str,
    },
    /// Affirm `id` when the most recent value satisfies `when`. With a
    /// `canonical` unit, values that cannot be converted into it are skipped.
    ObservationFlag {
        code: &'static str,
        id: &'static str,
        label: &'static str,
        canonical: Option<CanonicalUnit>,
        when: fn(f64) -> bool,
    },
    /// Select `pick(value)` in radio group `group`.
    ObservationChoice {
        code: &'static str,
        group: &'static str,
        label: &'static str,
        canonical: Option<CanonicalUnit>,
        pick: fn(f64) -> &'static str,
    },
    PatientAge(AgeTarget),
    /// Select `male` / `female` option values of `group` from Patient.gender.
    PatientGender {
        group: &'static str,
        male: &'static str,
        female: &'static str,
    },
    /// Active condition with any of `codes` affirms `target`, or selects
    /// `value` when given.
    Condition {
        codes: &'static [&'static str],
        target: &'static str,
        label: &'static str,
        value: Option<&'static str>,
    },
}

impl DataRequirement {
    /// Human label used in the population summary.
    pub fn label(&self) -> &'static str {
        match self {
            DataRequirement::Observation { label, .. }
            | DataRequirement::PanelComponent { label, .. }
            | DataRequirement::ObservationFlag { label, .. }
            | DataRequirement::ObservationChoice { label, .. }
            | DataRequirement::Condition { label, .. } => *label,
            DataRequirement::PatientAge(_) => "Age",
            DataRequirement::PatientGender { .. } => "Sex",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaItem {
    pub label: String,
    pub formula: String,
}

/// Static explanatory content rendered around the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Notes {
    pub info: Option<String>,
    pub warning: Option<String>,
    pub formulas: Vec<FormulaItem>,
    pub references: Vec<String>,
}

impl Notes {
    pub fn info(mut self, text: &str) -> Self {
        self.info = Some(text.to_string());
        self
    }

    pub fn warning(mut self, text: &str) -> Self {
        self.warning = Some(text.to_string());
        self
    }

    pub fn formula(mut self, label: &str, formula: &str) -> Self {
        self.formulas.push(FormulaItem {
            label: label.to_string(),
            formula: formula.to_string(),
        });
        self
    }

    pub fn reference(mut self, citation: &str) -> Self {
        self.references.push(citation.to_string());
        self
    }
}

/// Summary used by listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorSummary {
    pub id: String,
    pub title: String,
    pub description: String,
}

/// Metadata and declarations shared by the calculator factories.
#[derive(Debug, Clone)]
pub struct Definition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub sections: Vec<Section>,
    pub notes: Notes,
    pub requirements: Vec<DataRequirement>,
    pub schema: ValidationSchema,
}

impl Definition {
    pub fn new(id: &str, title: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            sections: Vec::new(),
            notes: Notes::default(),
            requirements: Vec::new(),
            schema: ValidationSchema::default(),
        }
    }
}

/// A clinical calculator module. Implementations are immutable once
/// registered.
pub trait Calculator: Send + Sync {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn description(&self) -> &str;
    fn sections(&self) -> &[Section];
    fn notes(&self) -> &Notes;
    fn requirements(&self) -> &[DataRequirement];
    fn schema(&self) -> &ValidationSchema;

    /// Run the formula on validated input. `Ok(None)` means the input is not
    /// complete enough to produce a result.
    fn compute(&self, input: &CalculationInput) -> Result<Option<CalcResult>, CalcError>;

    fn summary(&self) -> CalculatorSummary {
        CalculatorSummary {
            id: self.id().to_string(),
            title: self.title().to_string(),
            description: self.description().to_string(),
        }
    }

    /// Validate then compute, deciding what the view should display.
    fn assess(&self, input: &CalculationInput) -> Assessment {
        let schema = self.schema();
        let validation = validate_calculator_input(input, schema);

        if !validation.is_valid() {
            let untouched = schema.fields().all(|(key, _)| !input.is_present(key));
            if untouched {
                return Assessment::Empty;
            }
            return match validation.first_non_required() {
                Some(issue) => Assessment::Invalid {
                    message: issue.message.clone(),
                },
                None => Assessment::Empty,
            };
        }

        match self.compute(input) {
            Ok(Some(result)) => Assessment::Complete { result },
            Ok(None) => Assessment::Empty,
            Err(err) => {
                log_error(&err, self.id(), "calculate");
                Assessment::Failed {
                    message: err.user_message(),
                }
            }
        }
    }
}
