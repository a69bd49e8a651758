use crate::calculator::{AgeTarget, CalcResult, DataRequirement, Notes, ResultItem};
use crate::codes::loinc;
use crate::form::{CalculationInput, ChoiceOption, InputSpec, NumberInput, RadioGroup, Section};
use crate::formula::FormulaCalculator;
use crate::units::UnitDomain;
use crate::validation::{rules, ValidationRule, ValidationSchema};
use crate::{ensure_finite, CalcError, Severity};

pub fn calculator() -> FormulaCalculator {
    FormulaCalculator::new(
        "crcl",
        "Creatinine Clearance (Cockcroft-Gault Equation)",
        "Calculates CrCl according to the Cockcroft-Gault equation.",
        compute,
    )
    .section(Section::new(
        "Patient",
        vec![
            InputSpec::Radio(RadioGroup::new(
                "crcl-gender",
                "Gender",
                vec![
                    ChoiceOption::new("male", "Male").checked(),
                    ChoiceOption::new("female", "Female"),
                ],
            )),
            InputSpec::Number(NumberInput::new("crcl-age", "Age").unit("years")),
            InputSpec::Number(
                NumberInput::new("crcl-weight", "Weight")
                    .step(0.1)
                    .toggle(UnitDomain::Weight, &["kg", "lbs"]),
            ),
            InputSpec::Number(
                NumberInput::new("crcl-creatinine", "Serum Creatinine")
                    .step(0.01)
                    .toggle(UnitDomain::Creatinine, &["mg/dL", "µmol/L"]),
            ),
        ],
    ))
    .requirement(DataRequirement::PatientAge(AgeTarget::Field("crcl-age")))
    .requirement(DataRequirement::PatientGender {
        group: "crcl-gender",
        male: "male",
        female: "female",
    })
    .requirement(DataRequirement::Observation {
        code: loinc::WEIGHT,
        field: "crcl-weight",
        label: "Weight",
    })
    .requirement(DataRequirement::Observation {
        code: loinc::CREATININE,
        field: "crcl-creatinine",
        label: "Creatinine",
    })
    .schema(
        ValidationSchema::new()
            .field("crcl-age", age_rule())
            .field("crcl-weight", rules::weight())
            .field("crcl-creatinine", rules::creatinine()),
    )
    .notes(
        Notes::default()
            .formula("Male", "[(140 - Age) × Weight] / (72 × Serum Creatinine)")
            .formula("Female", "[(140 - Age) × Weight × 0.85] / (72 × Serum Creatinine)")
            .reference("Cockcroft DW, Gault MH. Prediction of creatinine clearance from serum creatinine. Nephron. 1976;16(1):31-41."),
    )
}

/// `(140 - age)` turns negative past 140.
fn age_rule() -> ValidationRule {
    ValidationRule::range(0.0, 140.0)
        .required()
        .label("Age")
        .message("Please enter an age between 0-140 years for the Cockcroft-Gault equation.")
}

fn interpret(crcl: f64) -> (&'static str, Severity, &'static str) {
    if crcl >= 90.0 {
        ("Normal kidney function", Severity::Success, "Normal creatinine clearance.")
    } else if crcl >= 60.0 {
        ("Mild reduction", Severity::Success, "Mildly reduced creatinine clearance.")
    } else if crcl >= 30.0 {
        (
            "Moderate reduction",
            Severity::Warning,
            "Moderate reduction in kidney function. Consider nephrology referral and dose adjustment for renally cleared medications.",
        )
    } else if crcl >= 15.0 {
        (
            "Severe reduction",
            Severity::Danger,
            "Severe reduction in kidney function. Nephrology referral required. Careful medication dosing adjustments necessary.",
        )
    } else {
        (
            "Kidney failure",
            Severity::Danger,
            "Kidney failure. Consider dialysis or transplantation. Avoid renally cleared medications.",
        )
    }
}

fn compute(input: &CalculationInput) -> Result<Option<CalcResult>, CalcError> {
    let (Some(age), Some(weight), Some(creatinine), Some(gender)) = (
        input.number("crcl-age"),
        input.number("crcl-weight"),
        input.number("crcl-creatinine"),
        input.text("crcl-gender"),
    ) else {
        return Ok(None);
    };

    let mut crcl = ((140.0 - age) * weight) / (72.0 * creatinine);
    if gender == "female" {
        crcl *= 0.85;
    }
    let crcl = ensure_finite("CrCl", crcl)?;
    let (category, severity, advice) = interpret(crcl);
    let alert_severity = if severity == Severity::Success {
        Severity::Info
    } else {
        severity
    };

    Ok(Some(
        CalcResult::new(crcl, severity)
            .item(
                ResultItem::score("Creatinine Clearance", format!("{crcl:.1}"))
                    .unit("mL/min")
                    .interpretation(category, severity),
            )
            .alert(alert_severity, advice),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{Assessment, Calculator};
    use crate::form::FieldValue;

    fn input(gender: &str) -> CalculationInput {
        CalculationInput::new()
            .with("crcl-gender", FieldValue::Text(gender.into()))
            .with("crcl-age", FieldValue::Number(70.0))
            .with("crcl-weight", FieldValue::Number(80.0))
            .with("crcl-creatinine", FieldValue::Number(1.0))
    }

    #[test]
    fn male_and_female() {
        let male = compute(&input("male")).expect("compute").expect("result");
        assert_eq!(male.items[0].value, "77.8");
        let female = compute(&input("female")).expect("compute").expect("result");
        assert_eq!(female.items[0].value, "66.1");
        assert_eq!(female.severity, Severity::Success);
    }

    #[test]
    fn ages_past_140_are_rejected() {
        let calc = calculator();
        let old = input("male").with("crcl-age", FieldValue::Number(141.0));
        match calc.assess(&old) {
            Assessment::Invalid { message } => assert!(message.contains("0-140")),
            other => panic!("expected invalid input, got {other:?}"),
        }
        let edge = input("male").with("crcl-age", FieldValue::Number(140.0));
        assert_eq!(calc.assess(&edge).result().map(|r| r.value), Some(0.0));
    }
}
