use crate::calculator::{AgeTarget, CanonicalUnit, DataRequirement, Notes};
use crate::codes::loinc;
use crate::form::{Checkbox, ChoiceOption, InputSpec, RadioGroup, Section};
use crate::scoring::{RiskBand, ScoringCalculator};
use crate::units::UnitDomain;
use crate::Severity;

fn age_option(age: u32) -> &'static str {
    match age {
        3..=14 => "1",
        0..=44 => "0",
        _ => "-1",
    }
}

pub fn calculator() -> ScoringCalculator {
    ScoringCalculator::new(
        "centor",
        "Centor Score (Modified/McIsaac) for Strep Pharyngitis",
        "Estimates likelihood that pharyngitis is streptococcal and suggests management.",
    )
    .section(Section::new(
        "Criteria",
        vec![
            InputSpec::Checkbox(Checkbox::new("centor-exudates", "Tonsillar exudate or swelling", 1.0)),
            InputSpec::Checkbox(Checkbox::new(
                "centor-nodes",
                "Tender/swollen anterior cervical lymph nodes",
                1.0,
            )),
            InputSpec::Checkbox(Checkbox::new("centor-fever", "Temperature > 38°C (100.4°F)", 1.0)),
            InputSpec::Checkbox(Checkbox::new("centor-cough", "Cough absent", 1.0)),
        ],
    ))
    .section(Section::new(
        "McIsaac Modification",
        vec![InputSpec::Radio(RadioGroup::new(
            "centor-age",
            "Age",
            vec![
                ChoiceOption::new("1", "3-14 years (+1)"),
                ChoiceOption::new("0", "15-44 years (+0)").checked(),
                ChoiceOption::new("-1", "≥45 years (-1)"),
            ],
        ))],
    ))
    .requirement(DataRequirement::PatientAge(AgeTarget::Choice {
        group: "centor-age",
        pick: age_option,
    }))
    .requirement(DataRequirement::ObservationFlag {
        code: loinc::TEMPERATURE,
        id: "centor-fever",
        label: "Temperature",
        canonical: Some(CanonicalUnit::new(UnitDomain::Temperature, "°C")),
        when: |celsius| celsius > 38.0,
    })
    .band(
        RiskBand::new(f64::NEG_INFINITY, "Low probability", Severity::Success)
            .risk("<10%")
            .advice("No further testing or antibiotics."),
    )
    .band(
        RiskBand::new(1.0, "Low probability", Severity::Success)
            .risk("≈17%")
            .advice("No further testing or antibiotics."),
    )
    .band(
        RiskBand::new(2.0, "Intermediate probability", Severity::Warning)
            .risk("≈35%")
            .advice("Optional rapid strep testing and/or culture."),
    )
    .band(
        RiskBand::new(3.0, "Intermediate probability", Severity::Warning)
            .risk("≈56%")
            .advice("Consider rapid strep testing and/or culture."),
    )
    .band(
        RiskBand::new(4.0, "High probability", Severity::Danger)
            .risk(">85%")
            .advice("Consider rapid strep testing and/or culture. Empiric antibiotics may be appropriate."),
    )
    .score_label("Centor Score")
    .risk_label("Probability of strep pharyngitis")
    .notes(Notes::default().reference(
        "McIsaac WJ, et al. A clinical score to reduce unnecessary antibiotic use in patients with sore throat. CMAJ. 1998;158(1):75-83.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Calculator;
    use crate::form::{CalculationInput, FieldValue};

    #[test]
    fn older_adults_lose_a_point() {
        let input = CalculationInput::new()
            .with("centor-fever", FieldValue::Flag(true))
            .with("centor-age", FieldValue::Text("-1".into()));
        let result = calculator().compute(&input).expect("compute").expect("result");
        assert_eq!(result.value, 0.0);
        assert_eq!(result.items[1].value, "<10%");
    }

    #[test]
    fn age_options() {
        assert_eq!(age_option(10), "1");
        assert_eq!(age_option(2), "0");
        assert_eq!(age_option(30), "0");
        assert_eq!(age_option(45), "-1");
    }
}
