use crate::calculator::{AgeTarget, DataRequirement, Notes};
use crate::form::{ChoiceOption, InputSpec, RadioGroup, Section};
use crate::scoring::{RiskBand, ScoringCalculator};
use crate::Severity;

fn criterion(name: &str, label: &str, options: [&str; 3]) -> InputSpec {
    InputSpec::Radio(RadioGroup::new(
        name,
        label,
        vec![
            ChoiceOption::new("0", &format!("{} (+0)", options[0])).checked(),
            ChoiceOption::new("1", &format!("{} (+1)", options[1])),
            ChoiceOption::new("2", &format!("{} (+2)", options[2])),
        ],
    ))
}

fn age_option(age: u32) -> &'static str {
    if age < 45 {
        "0"
    } else if age <= 64 {
        "1"
    } else {
        "2"
    }
}

pub fn calculator() -> ScoringCalculator {
    ScoringCalculator::new(
        "heart-score",
        "HEART Score for Major Cardiac Events",
        "Predicts 6-week risk of major adverse cardiac events in patients with chest pain.",
    )
    .section(Section::new(
        "HEART Criteria",
        vec![
            criterion(
                "heart-history",
                "History",
                ["Slightly suspicious", "Moderately suspicious", "Highly suspicious"],
            ),
            criterion(
                "heart-ecg",
                "EKG",
                [
                    "Normal",
                    "Non-specific repolarization disturbance",
                    "Significant ST deviation",
                ],
            ),
            criterion("heart-age", "Age", ["<45", "45-64", "≥65"]),
            criterion(
                "heart-risk",
                "Risk factors",
                [
                    "No known risk factors",
                    "1-2 risk factors",
                    "≥3 risk factors or history of atherosclerotic disease",
                ],
            ),
            criterion(
                "heart-troponin",
                "Initial troponin",
                ["≤normal limit", "1-3× normal limit", ">3× normal limit"],
            ),
        ],
    ))
    .requirement(DataRequirement::PatientAge(AgeTarget::Choice {
        group: "heart-age",
        pick: age_option,
    }))
    .band(
        RiskBand::new(0.0, "Low Risk", Severity::Success)
            .risk("0.9-1.7%")
            .advice("Supports early discharge with outpatient follow-up."),
    )
    .band(
        RiskBand::new(4.0, "Moderate Risk", Severity::Warning)
            .risk("12-16.6%")
            .advice("Admit for clinical observation and further testing."),
    )
    .band(
        RiskBand::new(7.0, "High Risk", Severity::Danger)
            .risk("50-65%")
            .advice("Candidate for early invasive measures."),
    )
    .score_label("HEART Score")
    .risk_label("6-week MACE risk")
    .notes(
        Notes::default()
            .warning("Every criterion starts at its 0-point option. Confirm each one before relying on the score.")
            .reference(
                "Six AJ, Backus BE, Kelder JC. Chest pain in the emergency room: value of the HEART score. Neth Heart J. 2008;16(6):191-196.",
            ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Calculator;
    use crate::form::FormState;
    use crate::units::UnitConverter;

    #[test]
    fn defaults_score_zero() {
        let calc = calculator();
        let form = FormState::from_sections(calc.sections());
        let input = form.collect(&UnitConverter::standard());
        let result = calc.assess(&input);
        let result = result.result().expect("defaults produce a score");
        assert_eq!(result.value, 0.0);
        assert_eq!(result.items[1].value, "0.9-1.7%");
    }

    #[test]
    fn age_mapping() {
        assert_eq!(age_option(44), "0");
        assert_eq!(age_option(64), "1");
        assert_eq!(age_option(65), "2");
    }
}
