use crate::calculator::{CalcResult, DataRequirement, Notes, ResultItem};
use crate::codes::loinc;
use crate::form::{CalculationInput, InputSpec, NumberInput, Section};
use crate::formula::FormulaCalculator;
use crate::units::UnitDomain;
use crate::validation::{rules, ValidationSchema};
use crate::{ensure_finite, CalcError, Severity};

pub fn calculator() -> FormulaCalculator {
    FormulaCalculator::new(
        "bmi-bsa",
        "BMI & Body Surface Area",
        "Calculates Body Mass Index (BMI) and Body Surface Area (BSA) for clinical assessment and drug dosing.",
        compute,
    )
    .section(
        Section::new(
            "Patient Measurements",
            vec![
                InputSpec::Number(
                    NumberInput::new("bmi-bsa-weight", "Weight")
                        .placeholder("e.g., 70")
                        .step(0.1)
                        .toggle(UnitDomain::Weight, &["kg", "lbs"]),
                ),
                InputSpec::Number(
                    NumberInput::new("bmi-bsa-height", "Height")
                        .placeholder("e.g., 175")
                        .step(0.1)
                        .toggle(UnitDomain::Height, &["cm", "in"]),
                ),
            ],
        )
        .icon("📏"),
    )
    .requirement(DataRequirement::Observation {
        code: loinc::WEIGHT,
        field: "bmi-bsa-weight",
        label: "Weight",
    })
    .requirement(DataRequirement::Observation {
        code: loinc::HEIGHT,
        field: "bmi-bsa-height",
        label: "Height",
    })
    .schema(
        ValidationSchema::new()
            .field("bmi-bsa-weight", rules::weight())
            .field("bmi-bsa-height", rules::height()),
    )
    .notes(
        Notes::default()
            .formula("BMI", "Weight (kg) / Height² (m²)")
            .formula("BSA (Du Bois)", "0.007184 × Weight^0.425 × Height^0.725")
            .reference("Du Bois D, Du Bois EF. A formula to estimate the approximate surface area if height and weight be known. Arch Intern Med. 1916;17:863-871."),
    )
}

fn bmi_category(bmi: f64) -> (&'static str, Severity) {
    if bmi < 18.5 {
        ("Underweight", Severity::Warning)
    } else if bmi < 25.0 {
        ("Normal weight", Severity::Success)
    } else if bmi < 30.0 {
        ("Overweight", Severity::Warning)
    } else if bmi < 35.0 {
        ("Obese (Class I)", Severity::Danger)
    } else if bmi < 40.0 {
        ("Obese (Class II)", Severity::Danger)
    } else {
        ("Obese (Class III)", Severity::Danger)
    }
}

fn compute(input: &CalculationInput) -> Result<Option<CalcResult>, CalcError> {
    let (Some(weight), Some(height)) = (
        input.number("bmi-bsa-weight"),
        input.number("bmi-bsa-height"),
    ) else {
        return Ok(None);
    };

    let meters = height / 100.0;
    let bmi = ensure_finite("BMI", weight / (meters * meters))?;
    let bsa = ensure_finite("BSA", 0.007184 * weight.powf(0.425) * height.powf(0.725))?;
    let (category, severity) = bmi_category(bmi);

    Ok(Some(
        CalcResult::new(bmi, severity)
            .item(
                ResultItem::new("Body Mass Index (BMI)", format!("{bmi:.1}"))
                    .unit("kg/m²")
                    .interpretation(category, severity),
            )
            .item(ResultItem::new("Body Surface Area (BSA)", format!("{bsa:.2}")).unit("m²")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{Assessment, Calculator};
    use crate::form::FieldValue;

    #[test]
    fn bmi_for_seventy_kilograms_and_165_centimeters() {
        let input = CalculationInput::new()
            .with("bmi-bsa-weight", FieldValue::Number(70.0))
            .with("bmi-bsa-height", FieldValue::Number(165.0));
        let result = compute(&input).expect("compute").expect("result");
        assert_eq!(result.items[0].value, "25.7");
        assert_eq!(result.items[0].unit.as_deref(), Some("kg/m²"));
        assert_eq!(result.items[1].value, "1.77");
    }

    #[test]
    fn weight_alone_yields_no_result() {
        let calc = calculator();
        let input = CalculationInput::new()
            .with("bmi-bsa-weight", FieldValue::Number(70.0))
            .with("bmi-bsa-height", FieldValue::Missing);
        assert_eq!(calc.assess(&input), Assessment::Empty);
    }

    #[test]
    fn categories() {
        assert_eq!(bmi_category(17.0).0, "Underweight");
        assert_eq!(bmi_category(24.9).0, "Normal weight");
        assert_eq!(bmi_category(41.0).0, "Obese (Class III)");
    }
}
