use crate::calculator::{AgeTarget, CalcResult, DataRequirement, Notes, ResultItem};
use crate::codes::loinc;
use crate::form::{CalculationInput, ChoiceOption, InputSpec, NumberInput, RadioGroup, Section};
use crate::formula::FormulaCalculator;
use crate::units::UnitDomain;
use crate::validation::{rules, ValidationSchema};
use crate::{CalcError, Severity};

pub fn calculator() -> FormulaCalculator {
    FormulaCalculator::new(
        "grace-acs",
        "GRACE ACS Risk Score",
        "Estimates in-hospital mortality risk for patients with acute coronary syndrome.",
        compute,
    )
    .section(Section::new(
        "Vital Signs & Labs",
        vec![
            InputSpec::Number(NumberInput::new("grace-age", "Age").unit("years")),
            InputSpec::Number(NumberInput::new("grace-hr", "Heart Rate").unit("bpm")),
            InputSpec::Number(
                NumberInput::new("grace-sbp", "Systolic BP")
                    .toggle(UnitDomain::Pressure, &["mmHg", "kPa"]),
            ),
            InputSpec::Number(
                NumberInput::new("grace-creatinine", "Creatinine")
                    .toggle(UnitDomain::Creatinine, &["mg/dL", "µmol/L"]),
            ),
        ],
    ))
    .section(Section::new(
        "Clinical Findings",
        vec![
            InputSpec::Radio(RadioGroup::new(
                "grace-killip",
                "Killip Class",
                vec![
                    ChoiceOption::new("0", "Class I: No CHF (+0)").checked(),
                    ChoiceOption::new("20", "Class II: Rales and/or JVD (+20)"),
                    ChoiceOption::new("39", "Class III: Pulmonary edema (+39)"),
                    ChoiceOption::new("59", "Class IV: Cardiogenic shock (+59)"),
                ],
            )),
            InputSpec::Radio(RadioGroup::yes_no(
                "grace-arrest",
                "Cardiac arrest at admission",
                39.0,
            )),
            InputSpec::Radio(RadioGroup::yes_no("grace-st", "ST segment deviation", 28.0)),
            InputSpec::Radio(RadioGroup::yes_no(
                "grace-enzymes",
                "Abnormal cardiac enzymes",
                14.0,
            )),
        ],
    ))
    .requirement(DataRequirement::PatientAge(AgeTarget::Field("grace-age")))
    .requirement(DataRequirement::Observation {
        code: loinc::HEART_RATE,
        field: "grace-hr",
        label: "Heart Rate",
    })
    .requirement(DataRequirement::PanelComponent {
        panel: loinc::BP_PANEL,
        component: loinc::SYSTOLIC_BP,
        field: "grace-sbp",
        label: "Systolic BP",
    })
    .requirement(DataRequirement::Observation {
        code: loinc::CREATININE,
        field: "grace-creatinine",
        label: "Creatinine",
    })
    .schema(
        ValidationSchema::new()
            .field("grace-age", rules::age())
            .field("grace-hr", rules::heart_rate())
            .field("grace-sbp", rules::systolic_bp())
            .field("grace-creatinine", rules::creatinine()),
    )
    .notes(
        Notes::default()
            .info("Score ≤118 low, 119-140 intermediate, >140 high in-hospital mortality risk.")
            .reference("Granger CB, et al. Predictors of hospital mortality in the global registry of acute coronary events. Arch Intern Med. 2003;163(19):2345-53."),
    )
}

fn age_points(age: f64) -> f64 {
    match age {
        a if a >= 80.0 => 91.0,
        a if a >= 70.0 => 73.0,
        a if a >= 60.0 => 55.0,
        a if a >= 50.0 => 36.0,
        a if a >= 40.0 => 18.0,
        _ => 0.0,
    }
}

fn heart_rate_points(hr: f64) -> f64 {
    match hr {
        h if h >= 200.0 => 36.0,
        h if h >= 150.0 => 23.0,
        h if h >= 110.0 => 13.0,
        h if h >= 90.0 => 7.0,
        h if h >= 70.0 => 3.0,
        _ => 0.0,
    }
}

fn systolic_points(sbp: f64) -> f64 {
    match sbp {
        s if s >= 200.0 => 0.0,
        s if s >= 160.0 => 10.0,
        s if s >= 140.0 => 18.0,
        s if s >= 120.0 => 24.0,
        s if s >= 100.0 => 34.0,
        s if s >= 80.0 => 43.0,
        _ => 53.0,
    }
}

fn creatinine_points(creatinine: f64) -> f64 {
    match creatinine {
        c if c >= 4.0 => 28.0,
        c if c >= 2.0 => 21.0,
        c if c >= 1.6 => 13.0,
        c if c >= 1.2 => 10.0,
        c if c >= 0.8 => 7.0,
        c if c >= 0.4 => 4.0,
        _ => 1.0,
    }
}

/// Risk category for a GRACE score: label, mortality and severity.
pub fn grace_risk(score: f64) -> (&'static str, &'static str, Severity) {
    if score > 140.0 {
        ("High Risk", ">3%", Severity::Danger)
    } else if score > 118.0 {
        ("Intermediate Risk", "1-3%", Severity::Warning)
    } else {
        ("Low Risk", "<1%", Severity::Success)
    }
}

fn risk_advice(severity: Severity) -> (Severity, &'static str) {
    match severity {
        Severity::Danger => (
            Severity::Danger,
            "High risk of in-hospital mortality. Consider intensive monitoring and aggressive intervention.",
        ),
        Severity::Warning => (
            Severity::Warning,
            "Intermediate risk of in-hospital mortality. Close monitoring recommended.",
        ),
        _ => (Severity::Info, "Low risk of in-hospital mortality."),
    }
}

fn compute(input: &CalculationInput) -> Result<Option<CalcResult>, CalcError> {
    let (Some(age), Some(hr), Some(sbp), Some(creatinine)) = (
        input.number("grace-age"),
        input.number("grace-hr"),
        input.number("grace-sbp"),
        input.number("grace-creatinine"),
    ) else {
        return Ok(None);
    };

    let mut score = age_points(age)
        + heart_rate_points(hr)
        + systolic_points(sbp)
        + creatinine_points(creatinine);
    for group in ["grace-killip", "grace-arrest", "grace-st", "grace-enzymes"] {
        let Some(points) = input.number(group) else {
            return Ok(None);
        };
        score += points;
    }

    let (label, mortality, severity) = grace_risk(score);
    let (alert_severity, advice) = risk_advice(severity);
    Ok(Some(
        CalcResult::new(score, severity)
            .item(
                ResultItem::score("Total GRACE Score", format!("{score:.0}"))
                    .unit("points")
                    .interpretation(label, severity),
            )
            .item(ResultItem::new("In-Hospital Mortality", mortality))
            .alert(alert_severity, advice),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FieldValue;

    #[test]
    fn risk_boundaries() {
        assert_eq!(grace_risk(118.0).0, "Low Risk");
        assert_eq!(grace_risk(119.0).0, "Intermediate Risk");
        assert_eq!(grace_risk(140.0).0, "Intermediate Risk");
        assert_eq!(grace_risk(141.0).0, "High Risk");
    }

    fn input(age: f64, st: &str) -> CalculationInput {
        CalculationInput::new()
            .with("grace-age", FieldValue::Number(age))
            .with("grace-hr", FieldValue::Number(95.0))
            .with("grace-sbp", FieldValue::Number(130.0))
            .with("grace-creatinine", FieldValue::Number(1.0))
            .with("grace-killip", FieldValue::Text("0".into()))
            .with("grace-arrest", FieldValue::Text("0".into()))
            .with("grace-st", FieldValue::Text(st.into()))
            .with("grace-enzymes", FieldValue::Text("0".into()))
    }

    #[test]
    fn sums_every_component() {
        // 55 (age) + 7 (hr) + 24 (sbp) + 7 (creatinine) + 28 (ST)
        let result = compute(&input(65.0, "28")).expect("compute").expect("result");
        assert_eq!(result.value, 121.0);
        assert_eq!(result.severity, Severity::Warning);
        assert_eq!(result.items[1].value, "1-3%");
    }

    #[test]
    fn low_risk_without_findings() {
        let result = compute(&input(45.0, "0")).expect("compute").expect("result");
        assert_eq!(result.value, 56.0);
        assert_eq!(result.items[0].interpretation.as_deref(), Some("Low Risk"));
        assert_eq!(result.alerts[0].severity, Severity::Info);
    }

    #[test]
    fn high_risk_raises_danger_alert() {
        // 91 (age) + 7 (hr) + 24 (sbp) + 7 (creatinine) + 28 (ST)
        let result = compute(&input(85.0, "28")).expect("compute").expect("result");
        assert_eq!(result.severity, Severity::Danger);
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].severity, Severity::Danger);
        assert!(result.alerts[0].message.starts_with("High risk of in-hospital mortality"));
    }
}
