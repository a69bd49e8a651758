use crate::calculator::{DataRequirement, Notes, ResultItem};
use crate::codes::{loinc, snomed};
use crate::form::{CalculationInput, Checkbox, InputSpec, Section};
use crate::scoring::{RiskBand, ScoringCalculator};
use crate::Severity;

fn two_tier(score: f64, _input: &CalculationInput) -> Vec<ResultItem> {
    let model = if score > 4.0 {
        "PE Likely (score > 4)"
    } else {
        "PE Unlikely (score ≤ 4)"
    };
    vec![ResultItem::new("Two-Tier Model", model)]
}

pub fn calculator() -> ScoringCalculator {
    ScoringCalculator::new(
        "wells-pe",
        "Wells' Criteria for Pulmonary Embolism",
        "Objectifies risk of pulmonary embolism.",
    )
    .section(Section::new(
        "Clinical Criteria",
        vec![
            InputSpec::Checkbox(Checkbox::new("wells-dvt", "Clinical signs and symptoms of DVT", 3.0)),
            InputSpec::Checkbox(Checkbox::new("wells-alt", "PE is #1 diagnosis OR equally likely", 3.0)),
            InputSpec::Checkbox(Checkbox::new("wells-hr", "Heart rate > 100 bpm", 1.5)),
            InputSpec::Checkbox(Checkbox::new(
                "wells-immo",
                "Immobilization (at least 3 days) or surgery in previous 4 weeks",
                1.5,
            )),
            InputSpec::Checkbox(Checkbox::new("wells-prev", "Previous, objectively diagnosed PE or DVT", 1.5)),
            InputSpec::Checkbox(Checkbox::new("wells-hemo", "Hemoptysis", 1.0)),
            InputSpec::Checkbox(Checkbox::new(
                "wells-malignancy",
                "Malignancy (with treatment within 6 months, or palliative)",
                1.0,
            )),
        ],
    ))
    .requirement(DataRequirement::ObservationFlag {
        code: loinc::HEART_RATE,
        id: "wells-hr",
        label: "Heart Rate",
        canonical: None,
        when: |hr| hr > 100.0,
    })
    .requirement(DataRequirement::Condition {
        codes: &[
            snomed::PULMONARY_EMBOLISM,
            snomed::DEEP_VEIN_THROMBOSIS,
            snomed::HISTORY_OF_VTE,
        ],
        target: "wells-prev",
        label: "Prior PE/DVT",
        value: None,
    })
    .requirement(DataRequirement::Condition {
        codes: &[snomed::HEMOPTYSIS],
        target: "wells-hemo",
        label: "Hemoptysis",
        value: None,
    })
    .requirement(DataRequirement::Condition {
        codes: &[snomed::MALIGNANCY, snomed::METASTATIC_CANCER],
        target: "wells-malignancy",
        label: "Malignancy",
        value: None,
    })
    .band(RiskBand::new(0.0, "Low Risk", Severity::Success).advice(
        "PE is unlikely. Consider D-dimer testing. If negative, PE can be safely excluded.",
    ))
    .band(RiskBand::new(1.5, "Low-Moderate Risk", Severity::Warning).advice(
        "PE is less likely but not excluded. Consider D-dimer testing before proceeding to imaging.",
    ))
    .band(RiskBand::new(4.5, "Moderate-High Risk", Severity::Danger).advice(
        "PE is likely. Proceed directly to CT pulmonary angiography (CTPA) for definitive diagnosis.",
    ))
    .band(RiskBand::new(6.5, "High Risk", Severity::Danger).advice(
        "PE is highly likely. Proceed directly to CTPA. Consider empiric anticoagulation if no contraindications while awaiting imaging.",
    ))
    .extra(two_tier)
    .notes(Notes::default().reference(
        "Wells PS, Anderson DR, Rodger M, et al. Derivation of a simple clinical model to categorize patients probability of pulmonary embolism. Thromb Haemost. 2000;83(3):416-420.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Calculator;
    use crate::form::FieldValue;

    #[test]
    fn half_points_and_two_tier() {
        let input = CalculationInput::new()
            .with("wells-dvt", FieldValue::Flag(true))
            .with("wells-hr", FieldValue::Flag(true));
        let result = calculator().compute(&input).expect("compute").expect("result");
        assert_eq!(result.value, 4.5);
        assert_eq!(result.items[0].value, "4.5");
        assert_eq!(result.items[0].interpretation.as_deref(), Some("Moderate-High Risk"));
        assert_eq!(result.items[1].value, "PE Likely (score > 4)");
    }

    #[test]
    fn nothing_checked_is_low() {
        let result = calculator()
            .compute(&CalculationInput::new())
            .expect("compute")
            .expect("result");
        assert_eq!(result.value, 0.0);
        assert_eq!(result.severity, Severity::Success);
    }
}
