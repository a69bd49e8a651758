use crate::calculator::{CalcResult, DataRequirement, Notes, ResultItem};
use crate::codes::loinc;
use crate::form::{CalculationInput, InputSpec, NumberInput, Section};
use crate::formula::FormulaCalculator;
use crate::units::UnitDomain;
use crate::validation::{rules, ValidationSchema};
use crate::{ensure_finite, CalcError, Severity};

const NORMAL_ALBUMIN: f64 = 4.0;

pub fn calculator() -> FormulaCalculator {
    FormulaCalculator::new(
        "calcium-correction",
        "Calcium Correction for Hypoalbuminemia",
        "Calculates corrected calcium level for patients with hypoalbuminemia.",
        compute,
    )
    .section(Section::new(
        "Lab Values",
        vec![
            InputSpec::Number(
                NumberInput::new("ca-total", "Total Calcium")
                    .step(0.1)
                    .toggle(UnitDomain::Calcium, &["mg/dL", "mmol/L"]),
            ),
            InputSpec::Number(
                NumberInput::new("ca-albumin", "Albumin")
                    .step(0.1)
                    .toggle(UnitDomain::Albumin, &["g/dL", "g/L"]),
            ),
        ],
    ))
    .requirement(DataRequirement::Observation {
        code: loinc::CALCIUM,
        field: "ca-total",
        label: "Calcium",
    })
    .requirement(DataRequirement::Observation {
        code: loinc::ALBUMIN,
        field: "ca-albumin",
        label: "Albumin",
    })
    .schema(
        ValidationSchema::new()
            .field("ca-total", rules::calcium())
            .field("ca-albumin", rules::albumin()),
    )
    .notes(
        Notes::default()
            .formula(
                "Corrected Calcium",
                "Total Calcium + 0.8 × (Normal Albumin - Patient Albumin)",
            )
            .info("Normal albumin is taken as 4.0 g/dL."),
    )
}

fn compute(input: &CalculationInput) -> Result<Option<CalcResult>, CalcError> {
    let (Some(calcium), Some(albumin)) = (input.number("ca-total"), input.number("ca-albumin"))
    else {
        return Ok(None);
    };

    let corrected = ensure_finite("Corrected calcium", calcium + 0.8 * (NORMAL_ALBUMIN - albumin))?;
    let (label, severity) = if corrected < 8.5 {
        ("Hypocalcemia", Severity::Warning)
    } else if corrected > 10.5 {
        ("Hypercalcemia", Severity::Warning)
    } else {
        ("Normal", Severity::Success)
    };

    Ok(Some(
        CalcResult::new(corrected, severity).item(
            ResultItem::score("Corrected Calcium", format!("{corrected:.2}"))
                .unit("mg/dL")
                .interpretation(label, severity),
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FieldValue;

    #[test]
    fn corrects_for_low_albumin() {
        let input = CalculationInput::new()
            .with("ca-total", FieldValue::Number(9.0))
            .with("ca-albumin", FieldValue::Number(2.5));
        let result = compute(&input).expect("compute").expect("result");
        assert_eq!(result.items[0].value, "10.20");
        assert_eq!(result.severity, Severity::Success);
    }
}
