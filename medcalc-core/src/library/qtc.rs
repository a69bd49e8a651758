use crate::calculator::{CalcResult, DataRequirement, Notes, ResultItem};
use crate::codes::loinc;
use crate::form::{CalculationInput, ChoiceOption, InputSpec, NumberInput, RadioGroup, Section};
use crate::formula::FormulaCalculator;
use crate::validation::{rules, ValidationSchema};
use crate::{ensure_finite, CalcError, Severity};

pub fn calculator() -> FormulaCalculator {
    FormulaCalculator::new(
        "qtc",
        "QTc Calculator",
        "Corrects the QT interval for heart rate.",
        compute,
    )
    .section(Section::new(
        "ECG Measurements",
        vec![
            InputSpec::Number(NumberInput::new("qtc-qt", "QT Interval").unit("ms")),
            InputSpec::Number(NumberInput::new("qtc-hr", "Heart Rate").unit("bpm")),
        ],
    ))
    .section(Section::new(
        "Correction Formula",
        vec![InputSpec::Radio(RadioGroup::new(
            "qtc-formula",
            "Formula",
            vec![
                ChoiceOption::new("bazett", "Bazett (most common)").checked(),
                ChoiceOption::new("fridericia", "Fridericia (better at extreme HR)"),
                ChoiceOption::new("hodges", "Hodges (linear correction)"),
                ChoiceOption::new("framingham", "Framingham"),
            ],
        ))],
    ))
    .requirement(DataRequirement::Observation {
        code: loinc::QT_INTERVAL,
        field: "qtc-qt",
        label: "QT Interval",
    })
    .requirement(DataRequirement::Observation {
        code: loinc::HEART_RATE,
        field: "qtc-hr",
        label: "Heart Rate",
    })
    .schema(
        ValidationSchema::new()
            .field("qtc-qt", rules::qt_interval())
            .field("qtc-hr", rules::heart_rate()),
    )
    .notes(
        Notes::default()
            .formula("Bazett", "QTc = QT / √RR")
            .formula("Fridericia", "QTc = QT / ∛RR")
            .formula("Hodges", "QTc = QT + 1.75 × (HR - 60)")
            .formula("Framingham", "QTc = QT + 154 × (1 - RR)")
            .formula("Note", "RR = 60 / Heart Rate (in seconds)"),
    )
}

/// Corrected QT in milliseconds for the named formula.
pub fn corrected_qt(formula: &str, qt: f64, hr: f64) -> Result<(f64, &'static str), CalcError> {
    let rr = 60.0 / hr;
    let (value, name) = match formula {
        "bazett" => (qt / rr.sqrt(), "Bazett"),
        "fridericia" => (qt / rr.cbrt(), "Fridericia"),
        "hodges" => (qt + 1.75 * (hr - 60.0), "Hodges"),
        "framingham" => (qt + 154.0 * (1.0 - rr), "Framingham"),
        other => {
            return Err(CalcError::Calculation(format!(
                "unknown QTc formula {other}"
            )))
        }
    };
    Ok((ensure_finite("QTc", value)?, name))
}

fn compute(input: &CalculationInput) -> Result<Option<CalcResult>, CalcError> {
    let (Some(qt), Some(hr)) = (input.number("qtc-qt"), input.number("qtc-hr")) else {
        return Ok(None);
    };
    let formula = input.text("qtc-formula").unwrap_or("bazett");
    let (qtc, name) = corrected_qt(formula, qt, hr)?;

    let (label, severity, message) = if qtc > 500.0 {
        (
            "Prolonged",
            Severity::Danger,
            "QTc >500ms significantly increases risk of Torsades de Pointes and sudden cardiac death.",
        )
    } else if qtc > 460.0 {
        ("Borderline", Severity::Warning, "Borderline prolonged QTc.")
    } else {
        ("Normal", Severity::Success, "Normal: Men <450ms, Women <460ms")
    };

    Ok(Some(
        CalcResult::new(qtc, severity)
            .item(
                ResultItem::score(&format!("Corrected QT Interval ({name})"), format!("{qtc:.0}"))
                    .unit("ms")
                    .interpretation(label, severity),
            )
            .alert(severity, message),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bazett_at_75_bpm() {
        let (qtc, name) = corrected_qt("bazett", 400.0, 75.0).expect("qtc");
        assert_eq!(name, "Bazett");
        assert_eq!(qtc.round(), 447.0);
    }

    #[test]
    fn hodges_is_linear() {
        let (qtc, _) = corrected_qt("hodges", 400.0, 100.0).expect("qtc");
        assert_eq!(qtc, 470.0);
    }

    #[test]
    fn unknown_formula_is_an_error() {
        assert!(corrected_qt("mystery", 400.0, 60.0).is_err());
    }
}
