use crate::calculator::{CalcResult, DataRequirement, Notes, ResultItem};
use crate::codes::loinc;
use crate::form::{CalculationInput, InputSpec, NumberInput, Section};
use crate::formula::FormulaCalculator;
use crate::units::UnitDomain;
use crate::validation::{rules, ValidationSchema};
use crate::{ensure_finite, CalcError, Severity};

pub fn calculator() -> FormulaCalculator {
    FormulaCalculator::new(
        "map",
        "Mean Arterial Pressure (MAP)",
        "Calculates the average arterial pressure during one cardiac cycle, reflecting organ perfusion.",
        compute,
    )
    .section(Section::new(
        "Blood Pressure",
        vec![
            InputSpec::Number(
                NumberInput::new("map-sbp", "Systolic BP")
                    .placeholder("e.g., 120")
                    .toggle(UnitDomain::Pressure, &["mmHg", "kPa"]),
            ),
            InputSpec::Number(
                NumberInput::new("map-dbp", "Diastolic BP")
                    .placeholder("e.g., 80")
                    .toggle(UnitDomain::Pressure, &["mmHg", "kPa"]),
            ),
        ],
    ))
    .requirement(DataRequirement::PanelComponent {
        panel: loinc::BP_PANEL,
        component: loinc::SYSTOLIC_BP,
        field: "map-sbp",
        label: "Systolic BP",
    })
    .requirement(DataRequirement::PanelComponent {
        panel: loinc::BP_PANEL,
        component: loinc::DIASTOLIC_BP,
        field: "map-dbp",
        label: "Diastolic BP",
    })
    .schema(
        ValidationSchema::new()
            .field("map-sbp", rules::systolic_bp())
            .field("map-dbp", rules::diastolic_bp())
            .cross(&["map-sbp", "map-dbp"], |input| {
                let sbp = input.number("map-sbp")?;
                let dbp = input.number("map-dbp")?;
                (sbp <= dbp)
                    .then(|| "Systolic BP must be greater than Diastolic BP".to_string())
            }),
    )
    .notes(
        Notes::default()
            .formula("MAP", "DBP + (SBP − DBP) / 3")
            .info("MAP ≥ 65 mmHg is the usual target for adequate organ perfusion in shock."),
    )
}

fn interpret(map: f64) -> (&'static str, Severity) {
    if map < 60.0 {
        ("Critically Low (Shock Risk)", Severity::Danger)
    } else if map < 70.0 {
        ("Below Normal", Severity::Warning)
    } else if map <= 100.0 {
        ("Normal", Severity::Success)
    } else {
        ("Elevated (Hypertension)", Severity::Danger)
    }
}

fn compute(input: &CalculationInput) -> Result<Option<CalcResult>, CalcError> {
    let (Some(sbp), Some(dbp)) = (input.number("map-sbp"), input.number("map-dbp")) else {
        return Ok(None);
    };
    if sbp <= dbp {
        return Err(CalcError::Calculation(
            "systolic pressure must exceed diastolic pressure".to_string(),
        ));
    }

    let map = ensure_finite("MAP", dbp + (sbp - dbp) / 3.0)?;
    let (label, severity) = interpret(map);
    let mut result = CalcResult::new(map, severity).item(
        ResultItem::score("Mean Arterial Pressure", format!("{map:.1}"))
            .unit("mmHg")
            .interpretation(label, severity),
    );
    if map < 65.0 {
        result = result.alert(
            Severity::Danger,
            "MAP below 65 mmHg may compromise organ perfusion. Consider vasopressors or fluid resuscitation.",
        );
    }
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{Assessment, Calculator};
    use crate::form::FieldValue;

    fn input(sbp: f64, dbp: f64) -> CalculationInput {
        CalculationInput::new()
            .with("map-sbp", FieldValue::Number(sbp))
            .with("map-dbp", FieldValue::Number(dbp))
    }

    #[test]
    fn normal_map() {
        let result = compute(&input(120.0, 80.0)).expect("compute").expect("result");
        assert_eq!(result.items[0].value, "93.3");
        assert_eq!(result.items[0].interpretation.as_deref(), Some("Normal"));
        assert_eq!(result.severity, Severity::Success);
    }

    #[test]
    fn systolic_not_above_diastolic_is_a_validation_error() {
        let assessment = calculator().assess(&input(80.0, 80.0));
        assert_eq!(
            assessment,
            Assessment::Invalid {
                message: "Systolic BP must be greater than Diastolic BP".into()
            }
        );
    }

    #[test]
    fn low_map_adds_alert() {
        let result = compute(&input(80.0, 50.0)).expect("compute").expect("result");
        assert_eq!(result.severity, Severity::Warning);
        assert_eq!(result.alerts.len(), 1);
    }
}
