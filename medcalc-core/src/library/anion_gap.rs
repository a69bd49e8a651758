use crate::calculator::{CalcResult, DataRequirement, Notes, ResultItem};
use crate::codes::loinc;
use crate::form::{CalculationInput, InputSpec, NumberInput, Section};
use crate::formula::FormulaCalculator;
use crate::units::UnitDomain;
use crate::validation::{rules, ValidationRule, ValidationSchema};
use crate::{ensure_finite, CalcError, Severity};

fn electrolyte(id: &str, label: &str) -> InputSpec {
    InputSpec::Number(
        NumberInput::new(id, label).toggle(UnitDomain::Electrolyte, &["mEq/L", "mmol/L"]),
    )
}

pub fn calculator() -> FormulaCalculator {
    FormulaCalculator::new(
        "serum-anion-gap",
        "Serum Anion Gap",
        "Evaluates states of metabolic acidosis.",
        compute,
    )
    .section(Section::new(
        "Electrolytes",
        vec![
            electrolyte("sag-na", "Sodium (Na⁺)"),
            electrolyte("sag-cl", "Chloride (Cl⁻)"),
            electrolyte("sag-hco3", "Bicarbonate (HCO₃⁻)"),
        ],
    ))
    .section(
        Section::new(
            "Albumin Correction",
            vec![InputSpec::Number(
                NumberInput::new("sag-albumin", "Albumin")
                    .help("Optional. Corrects the gap for hypoalbuminemia.")
                    .toggle(UnitDomain::Albumin, &["g/dL", "g/L"]),
            )],
        )
        .subtitle("Optional"),
    )
    .requirement(DataRequirement::Observation {
        code: loinc::SODIUM,
        field: "sag-na",
        label: "Sodium",
    })
    .requirement(DataRequirement::Observation {
        code: loinc::CHLORIDE,
        field: "sag-cl",
        label: "Chloride",
    })
    .requirement(DataRequirement::Observation {
        code: loinc::BICARBONATE,
        field: "sag-hco3",
        label: "Bicarbonate",
    })
    .requirement(DataRequirement::Observation {
        code: loinc::ALBUMIN,
        field: "sag-albumin",
        label: "Albumin",
    })
    .schema(
        ValidationSchema::new()
            .field("sag-na", rules::sodium())
            .field("sag-cl", rules::chloride())
            .field("sag-hco3", rules::bicarbonate())
            .field(
                "sag-albumin",
                ValidationRule::range(0.5, 8.0).label("Albumin"),
            ),
    )
    .notes(
        Notes::default()
            .formula("Anion Gap", "Na⁺ - (Cl⁻ + HCO₃⁻)")
            .formula("Albumin-corrected", "Anion Gap + 2.5 × (4 - Albumin [g/dL])")
            .info("Normal anion gap: 6-12 mEq/L."),
    )
}

fn interpret(gap: f64) -> (&'static str, Severity) {
    if gap > 12.0 {
        ("High Anion Gap", Severity::Danger)
    } else if gap < 6.0 {
        ("Low Anion Gap", Severity::Warning)
    } else {
        ("Normal Anion Gap", Severity::Success)
    }
}

fn compute(input: &CalculationInput) -> Result<Option<CalcResult>, CalcError> {
    let (Some(sodium), Some(chloride), Some(bicarbonate)) = (
        input.number("sag-na"),
        input.number("sag-cl"),
        input.number("sag-hco3"),
    ) else {
        return Ok(None);
    };

    let gap = ensure_finite("Anion gap", sodium - (chloride + bicarbonate))?;
    let (label, severity) = interpret(gap);
    let mut result = CalcResult::new(gap, severity).item(
        ResultItem::score("Anion Gap", format!("{gap:.1}"))
            .unit("mEq/L")
            .interpretation(label, severity),
    );

    if let Some(albumin) = input.number("sag-albumin") {
        let corrected = gap + 2.5 * (4.0 - albumin);
        let (label, severity) = interpret(corrected);
        result = result.item(
            ResultItem::new("Albumin-Corrected Anion Gap", format!("{corrected:.1}"))
                .unit("mEq/L")
                .interpretation(label, severity),
        );
    }

    if gap > 12.0 {
        result = result.alert(
            Severity::Warning,
            "Consider MUDPILES causes: methanol, uremia, DKA, propylene glycol, isoniazid, lactic acidosis, ethylene glycol, salicylates.",
        );
    }
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FieldValue;

    fn base() -> CalculationInput {
        CalculationInput::new()
            .with("sag-na", FieldValue::Number(140.0))
            .with("sag-cl", FieldValue::Number(104.0))
            .with("sag-hco3", FieldValue::Number(24.0))
    }

    #[test]
    fn normal_gap() {
        let result = compute(&base()).expect("compute").expect("result");
        assert_eq!(result.value, 12.0);
        assert_eq!(result.severity, Severity::Success);
        assert_eq!(result.items.len(), 1);
    }

    #[test]
    fn low_albumin_raises_corrected_gap() {
        let input = base().with("sag-albumin", FieldValue::Number(2.0));
        let result = compute(&input).expect("compute").expect("result");
        assert_eq!(result.items[1].value, "17.0");
        assert_eq!(
            result.items[1].interpretation.as_deref(),
            Some("High Anion Gap")
        );
    }
}
