use crate::calculator::{AgeTarget, CanonicalUnit, DataRequirement, Notes};
use crate::codes::loinc;
use crate::form::{InputSpec, RadioGroup, Section};
use crate::scoring::{RiskBand, ScoringCalculator};
use crate::units::UnitDomain;
use crate::Severity;

pub fn calculator() -> ScoringCalculator {
    ScoringCalculator::new(
        "curb-65",
        "CURB-65 Score for Pneumonia Severity",
        "Estimates mortality of community-acquired pneumonia to help determine inpatient vs. outpatient treatment.",
    )
    .section(Section::new(
        "CURB-65 Criteria",
        vec![
            InputSpec::Radio(RadioGroup::yes_no("curb-confusion", "Confusion", 1.0)),
            InputSpec::Radio(RadioGroup::yes_no("curb-bun", "BUN > 19 mg/dL (> 7 mmol/L)", 1.0)),
            InputSpec::Radio(RadioGroup::yes_no("curb-rr", "Respiratory rate ≥ 30", 1.0)),
            InputSpec::Radio(RadioGroup::yes_no(
                "curb-bp",
                "Systolic BP < 90 or diastolic BP ≤ 60 mmHg",
                1.0,
            )),
            InputSpec::Radio(RadioGroup::yes_no("curb-age", "Age ≥ 65", 1.0)),
        ],
    ))
    .requirement(DataRequirement::ObservationFlag {
        code: loinc::BUN,
        id: "curb-bun",
        label: "BUN",
        canonical: Some(CanonicalUnit::new(UnitDomain::Bun, "mg/dL")),
        when: |bun| bun > 19.0,
    })
    .requirement(DataRequirement::ObservationFlag {
        code: loinc::RESPIRATORY_RATE,
        id: "curb-rr",
        label: "Respiratory Rate",
        canonical: None,
        when: |rr| rr >= 30.0,
    })
    .requirement(DataRequirement::PatientAge(AgeTarget::Flag {
        id: "curb-age",
        when: |age| age >= 65,
    }))
    .band(
        RiskBand::new(0.0, "Low risk", Severity::Success)
            .risk("0.6%")
            .advice("Consider outpatient treatment."),
    )
    .band(
        RiskBand::new(1.0, "Low risk", Severity::Success)
            .risk("2.7%")
            .advice("Consider outpatient treatment."),
    )
    .band(
        RiskBand::new(2.0, "Moderate risk", Severity::Warning)
            .risk("6.8%")
            .advice("Consider short inpatient hospitalization or closely supervised outpatient treatment."),
    )
    .band(
        RiskBand::new(3.0, "High risk", Severity::Danger)
            .risk("14.0%")
            .advice("Hospitalize; consider ICU admission for scores of 4 or 5."),
    )
    .band(
        RiskBand::new(4.0, "Very high risk", Severity::Danger)
            .risk("27.8%")
            .advice("Hospitalize and assess for ICU admission."),
    )
    .score_label("CURB-65 Score")
    .risk_label("30-day mortality")
    .notes(Notes::default().reference(
        "Lim WS, et al. Defining community acquired pneumonia severity on presentation to hospital. Thorax. 2003;58(5):377-82.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Calculator;
    use crate::form::{CalculationInput, FieldValue};

    #[test]
    fn five_points_share_top_band() {
        let calc = calculator();
        let input: CalculationInput = ["curb-confusion", "curb-bun", "curb-rr", "curb-bp", "curb-age"]
            .into_iter()
            .map(|key| (key.to_string(), FieldValue::Text("1".into())))
            .collect();
        let result = calc.compute(&input).expect("compute").expect("result");
        assert_eq!(result.value, 5.0);
        assert_eq!(result.items[1].value, "27.8%");
    }
}
