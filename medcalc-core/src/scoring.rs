//! Point-sum calculators built from radio groups, yes/no questions and
//! checkboxes.

use crate::calculator::{CalcResult, Calculator, DataRequirement, Definition, Notes, ResultItem};
use crate::form::{format_points, CalculationInput, InputSpec, Section};
use crate::validation::ValidationSchema;
use crate::{CalcError, Severity};

/// Interpretation applied when the score reaches `min`.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskBand {
    pub min: f64,
    pub label: &'static str,
    pub risk: Option<&'static str>,
    pub severity: Severity,
    pub advice: Option<&'static str>,
}

impl RiskBand {
    pub fn new(min: f64, label: &'static str, severity: Severity) -> Self {
        Self {
            min,
            label,
            risk: None,
            severity,
            advice: None,
        }
    }

    pub fn risk(mut self, risk: &'static str) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn advice(mut self, advice: &'static str) -> Self {
        self.advice = Some(advice);
        self
    }
}

/// Additional result rows derived from the final score.
pub type ExtraItems = fn(f64, &CalculationInput) -> Vec<ResultItem>;

pub struct ScoringCalculator {
    def: Definition,
    bands: Vec<RiskBand>,
    score_label: String,
    risk_label: String,
    extra: Option<ExtraItems>,
}

impl ScoringCalculator {
    pub fn new(id: &str, title: &str, description: &str) -> Self {
        Self {
            def: Definition::new(id, title, description),
            bands: Vec::new(),
            score_label: "Total Score".to_string(),
            risk_label: "Risk".to_string(),
            extra: None,
        }
    }

    pub fn section(mut self, section: Section) -> Self {
        self.def.sections.push(section);
        self
    }

    pub fn requirement(mut self, requirement: DataRequirement) -> Self {
        self.def.requirements.push(requirement);
        self
    }

    pub fn schema(mut self, schema: ValidationSchema) -> Self {
        self.def.schema = schema;
        self
    }

    pub fn notes(mut self, notes: Notes) -> Self {
        self.def.notes = notes;
        self
    }

    /// Bands must be added in ascending `min` order.
    pub fn band(mut self, band: RiskBand) -> Self {
        self.bands.push(band);
        self
    }

    pub fn score_label(mut self, label: &str) -> Self {
        self.score_label = label.to_string();
        self
    }

    pub fn risk_label(mut self, label: &str) -> Self {
        self.risk_label = label.to_string();
        self
    }

    pub fn extra(mut self, extra: ExtraItems) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Sum of selected option values and checked checkbox points. `None`
    /// while any radio group or select has no numeric selection.
    pub fn score(&self, input: &CalculationInput) -> Option<f64> {
        let mut total = 0.0;
        for spec in self.def.sections.iter().flat_map(|s| s.inputs.iter()) {
            match spec {
                InputSpec::Radio(_) | InputSpec::Select(_) => {
                    total += input.number(spec.key())?;
                }
                InputSpec::Checkbox(checkbox) => {
                    if input.flag(&checkbox.id) {
                        total += checkbox.points;
                    }
                }
                InputSpec::Number(_) => {}
            }
        }
        Some(total)
    }

    pub fn band_for(&self, score: f64) -> Option<&RiskBand> {
        self.bands
            .iter()
            .rev()
            .find(|band| score >= band.min)
            .or_else(|| self.bands.first())
    }
}

impl Calculator for ScoringCalculator {
    fn id(&self) -> &str {
        &self.def.id
    }

    fn title(&self) -> &str {
        &self.def.title
    }

    fn description(&self) -> &str {
        &self.def.description
    }

    fn sections(&self) -> &[Section] {
        &self.def.sections
    }

    fn notes(&self) -> &Notes {
        &self.def.notes
    }

    fn requirements(&self) -> &[DataRequirement] {
        &self.def.requirements
    }

    fn schema(&self) -> &ValidationSchema {
        &self.def.schema
    }

    fn compute(&self, input: &CalculationInput) -> Result<Option<CalcResult>, CalcError> {
        let Some(score) = self.score(input) else {
            return Ok(None);
        };
        let band = self.band_for(score).ok_or_else(|| {
            CalcError::Calculation(format!("{} has no risk bands", self.def.id))
        })?;

        let mut result = CalcResult::new(score, band.severity).item(
            ResultItem::score(&self.score_label, format_points(score))
                .unit("points")
                .interpretation(band.label, band.severity),
        );
        if let Some(risk) = band.risk {
            result = result.item(ResultItem::new(&self.risk_label, risk));
        }
        if let Some(extra) = self.extra {
            result.items.extend(extra(score, input));
        }
        if let Some(advice) = band.advice {
            result = result.alert(band.severity, advice);
        }
        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{ChoiceOption, Checkbox, FieldValue, RadioGroup};

    fn calculator() -> ScoringCalculator {
        ScoringCalculator::new("demo", "Demo", "Demo score")
            .section(Section::new(
                "Criteria",
                vec![
                    InputSpec::Radio(RadioGroup::new(
                        "level",
                        "Level",
                        vec![ChoiceOption::new("0", "Low"), ChoiceOption::new("2", "High")],
                    )),
                    InputSpec::Checkbox(Checkbox::new("extra", "Extra", 1.5)),
                ],
            ))
            .band(RiskBand::new(0.0, "Low", Severity::Success))
            .band(RiskBand::new(3.0, "High", Severity::Danger).risk("50%"))
    }

    #[test]
    fn unselected_radio_gives_no_result() {
        let calc = calculator();
        let input = CalculationInput::new().with("extra", FieldValue::Flag(true));
        assert_eq!(calc.compute(&input), Ok(None));
    }

    #[test]
    fn sums_and_bands() {
        let calc = calculator();
        let input = CalculationInput::new()
            .with("level", FieldValue::Text("2".into()))
            .with("extra", FieldValue::Flag(true));
        let result = calc.compute(&input).expect("compute").expect("result");
        assert_eq!(result.value, 3.5);
        assert_eq!(result.severity, Severity::Danger);
        assert_eq!(result.items[0].value, "3.5");
        assert_eq!(result.items[1].value, "50%");
    }

    #[test]
    fn scores_below_first_band_use_it() {
        let calc = calculator();
        assert_eq!(calc.band_for(-1.0).map(|band| band.label), Some("Low"));
    }
}
