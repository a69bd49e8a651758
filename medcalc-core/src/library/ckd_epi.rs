use crate::calculator::{AgeTarget, CalcResult, DataRequirement, Notes, ResultItem};
use crate::codes::loinc;
use crate::form::{CalculationInput, ChoiceOption, InputSpec, NumberInput, RadioGroup, Section};
use crate::formula::FormulaCalculator;
use crate::units::UnitDomain;
use crate::validation::{rules, ValidationSchema};
use crate::{ensure_finite, CalcError, Severity};

pub fn calculator() -> FormulaCalculator {
    FormulaCalculator::new(
        "ckd-epi",
        "CKD-EPI GFR (2021 Refit)",
        "Estimates GFR using the race-free 2021 CKD-EPI creatinine equation.",
        compute,
    )
    .section(Section::new(
        "Patient",
        vec![
            InputSpec::Radio(RadioGroup::new(
                "ckd-epi-gender",
                "Gender",
                vec![
                    ChoiceOption::new("male", "Male").checked(),
                    ChoiceOption::new("female", "Female"),
                ],
            )),
            InputSpec::Number(NumberInput::new("ckd-epi-age", "Age").unit("years")),
            InputSpec::Number(
                NumberInput::new("ckd-epi-creatinine", "Serum Creatinine")
                    .step(0.01)
                    .toggle(UnitDomain::Creatinine, &["mg/dL", "µmol/L"]),
            ),
        ],
    ))
    .requirement(DataRequirement::PatientAge(AgeTarget::Field("ckd-epi-age")))
    .requirement(DataRequirement::PatientGender {
        group: "ckd-epi-gender",
        male: "male",
        female: "female",
    })
    .requirement(DataRequirement::Observation {
        code: loinc::CREATININE,
        field: "ckd-epi-creatinine",
        label: "Creatinine",
    })
    .schema(
        ValidationSchema::new()
            .field("ckd-epi-age", rules::age())
            .field("ckd-epi-creatinine", rules::creatinine()),
    )
    .notes(
        Notes::default()
            .formula(
                "eGFR",
                "142 × min(Scr/κ, 1)^α × max(Scr/κ, 1)^-1.200 × 0.9938^Age × 1.012 [if female]",
            )
            .formula("κ / α", "Female: 0.7 / -0.241; Male: 0.9 / -0.302")
            .reference("Inker LA, et al. New Creatinine- and Cystatin C-Based Equations to Estimate GFR without Race. N Engl J Med. 2021;385:1737-1749."),
    )
}

/// 2021 CKD-EPI creatinine equation (mL/min/1.73 m²).
pub fn egfr(creatinine: f64, age: f64, female: bool) -> f64 {
    let (kappa, alpha) = if female { (0.7, -0.241) } else { (0.9, -0.302) };
    let ratio = creatinine / kappa;
    let mut gfr = 142.0 * ratio.min(1.0).powf(alpha) * ratio.max(1.0).powf(-1.2) * 0.9938f64.powf(age);
    if female {
        gfr *= 1.012;
    }
    gfr
}

fn stage(gfr: f64) -> (&'static str, Severity) {
    if gfr >= 90.0 {
        ("Stage 1 (Normal or high)", Severity::Success)
    } else if gfr >= 60.0 {
        ("Stage 2 (Mild)", Severity::Success)
    } else if gfr >= 45.0 {
        ("Stage 3a (Mild to moderate)", Severity::Warning)
    } else if gfr >= 30.0 {
        ("Stage 3b (Moderate to severe)", Severity::Warning)
    } else if gfr >= 15.0 {
        ("Stage 4 (Severe)", Severity::Danger)
    } else {
        ("Stage 5 (Kidney failure)", Severity::Danger)
    }
}

fn compute(input: &CalculationInput) -> Result<Option<CalcResult>, CalcError> {
    let (Some(age), Some(creatinine), Some(gender)) = (
        input.number("ckd-epi-age"),
        input.number("ckd-epi-creatinine"),
        input.text("ckd-epi-gender"),
    ) else {
        return Ok(None);
    };

    let gfr = ensure_finite("eGFR", egfr(creatinine, age, gender == "female"))?;
    let (label, severity) = stage(gfr);
    let mut result = CalcResult::new(gfr, severity).item(
        ResultItem::score("eGFR", format!("{gfr:.0}"))
            .unit("mL/min/1.73m²")
            .interpretation(label, severity),
    );
    if gfr < 30.0 {
        result = result.alert(
            Severity::Danger,
            "Severe reduction in GFR. Nephrology referral and renal dose adjustment recommended.",
        );
    }
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_values() {
        // 50-year-old male, creatinine 1.0 mg/dL -> ~92
        assert_eq!(egfr(1.0, 50.0, false).round(), 92.0);
        // 60-year-old female, creatinine 1.2 mg/dL -> ~52
        assert_eq!(egfr(1.2, 60.0, true).round(), 52.0);
    }

    #[test]
    fn stages() {
        assert_eq!(stage(95.0).0, "Stage 1 (Normal or high)");
        assert_eq!(stage(44.9).1, Severity::Warning);
        assert_eq!(stage(10.0).0, "Stage 5 (Kidney failure)");
    }
}
