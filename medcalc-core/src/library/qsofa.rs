use crate::calculator::{CanonicalUnit, DataRequirement, Notes};
use crate::codes::loinc;
use crate::form::{InputSpec, RadioGroup, Section};
use crate::scoring::{RiskBand, ScoringCalculator};
use crate::units::UnitDomain;
use crate::Severity;

pub fn calculator() -> ScoringCalculator {
    ScoringCalculator::new(
        "qsofa",
        "qSOFA Score for Sepsis",
        "Identifies patients with suspected infection at risk of poor outcome outside the ICU.",
    )
    .section(Section::new(
        "qSOFA Criteria",
        vec![
            InputSpec::Radio(RadioGroup::yes_no("qsofa-rr", "Respiratory rate ≥ 22/min", 1.0)),
            InputSpec::Radio(RadioGroup::yes_no("qsofa-ams", "Altered mental status", 1.0)),
            InputSpec::Radio(RadioGroup::yes_no("qsofa-sbp", "Systolic BP ≤ 100 mmHg", 1.0)),
        ],
    ))
    .requirement(DataRequirement::ObservationFlag {
        code: loinc::RESPIRATORY_RATE,
        id: "qsofa-rr",
        label: "Respiratory Rate",
        canonical: None,
        when: |rr| rr >= 22.0,
    })
    .requirement(DataRequirement::ObservationFlag {
        code: loinc::SYSTOLIC_BP,
        id: "qsofa-sbp",
        label: "Systolic BP",
        canonical: Some(CanonicalUnit::new(UnitDomain::Pressure, "mmHg")),
        when: |sbp| sbp <= 100.0,
    })
    .band(RiskBand::new(0.0, "Negative", Severity::Success).advice(
        "qSOFA negative. Continue to monitor if infection is suspected.",
    ))
    .band(RiskBand::new(2.0, "Positive", Severity::Danger).advice(
        "qSOFA positive: higher risk of poor outcome. Assess for organ dysfunction (full SOFA) and escalate care.",
    ))
    .score_label("qSOFA Score")
    .notes(Notes::default().reference(
        "Seymour CW, et al. Assessment of Clinical Criteria for Sepsis (Sepsis-3). JAMA. 2016;315(8):762-774.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Calculator;
    use crate::form::{CalculationInput, FieldValue};

    #[test]
    fn two_criteria_are_positive() {
        let input = CalculationInput::new()
            .with("qsofa-rr", FieldValue::Text("1".into()))
            .with("qsofa-ams", FieldValue::Text("1".into()))
            .with("qsofa-sbp", FieldValue::Text("0".into()));
        let result = calculator().compute(&input).expect("compute").expect("result");
        assert_eq!(result.severity, Severity::Danger);
    }
}
