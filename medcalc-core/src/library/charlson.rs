use crate::calculator::{AgeTarget, DataRequirement, Notes, ResultItem};
use crate::codes::snomed;
use crate::form::{CalculationInput, ChoiceOption, InputSpec, RadioGroup, Section};
use crate::scoring::{RiskBand, ScoringCalculator};
use crate::Severity;

fn age_option(age: u32) -> &'static str {
    match age {
        0..=49 => "0",
        50..=59 => "1",
        60..=69 => "2",
        70..=79 => "3",
        _ => "4",
    }
}

fn yes_no(name: &str, label: &str, points: f64) -> InputSpec {
    InputSpec::Radio(RadioGroup::yes_no(name, label, points))
}

fn levels(name: &str, label: &str, options: &[(&str, &str)]) -> InputSpec {
    let options = options
        .iter()
        .enumerate()
        .map(|(index, (value, text))| {
            let option = ChoiceOption::new(value, text);
            if index == 0 {
                option.checked()
            } else {
                option
            }
        })
        .collect();
    InputSpec::Radio(RadioGroup::new(name, label, options))
}

fn survival(score: f64, _input: &CalculationInput) -> Vec<ResultItem> {
    let survival = 0.983f64.powf((0.9 * score).exp()) * 100.0;
    vec![ResultItem::new("Estimated 10-year survival", format!("{survival:.0}")).unit("%")]
}

fn condition(
    codes: &'static [&'static str],
    target: &'static str,
    label: &'static str,
    value: Option<&'static str>,
) -> DataRequirement {
    DataRequirement::Condition {
        codes,
        target,
        label,
        value,
    }
}

pub fn calculator() -> ScoringCalculator {
    ScoringCalculator::new(
        "charlson",
        "Charlson Comorbidity Index (CCI)",
        "Predicts 10-year survival in patients with multiple comorbidities.",
    )
    .section(Section::new(
        "Age",
        vec![levels(
            "cci-age",
            "Age",
            &[
                ("0", "<50 years (+0)"),
                ("1", "50-59 years (+1)"),
                ("2", "60-69 years (+2)"),
                ("3", "70-79 years (+3)"),
                ("4", "≥80 years (+4)"),
            ],
        )],
    ))
    .section(Section::new(
        "Comorbidities",
        vec![
            yes_no("cci-mi", "Myocardial infarction", 1.0),
            yes_no("cci-chf", "Congestive heart failure", 1.0),
            yes_no("cci-pvd", "Peripheral vascular disease", 1.0),
            yes_no("cci-cva", "Cerebrovascular accident or TIA", 1.0),
            yes_no("cci-dementia", "Dementia", 1.0),
            yes_no("cci-cpd", "Chronic pulmonary disease", 1.0),
            yes_no("cci-ctd", "Connective tissue disease", 1.0),
            yes_no("cci-pud", "Peptic ulcer disease", 1.0),
            levels(
                "cci-liver",
                "Liver disease",
                &[
                    ("0", "None (+0)"),
                    ("1", "Mild (+1)"),
                    ("3", "Moderate to severe (+3)"),
                ],
            ),
            levels(
                "cci-diabetes",
                "Diabetes mellitus",
                &[
                    ("0", "None or diet-controlled (+0)"),
                    ("1", "Uncomplicated (+1)"),
                    ("2", "End-organ damage (+2)"),
                ],
            ),
            yes_no("cci-hemiplegia", "Hemiplegia", 2.0),
            yes_no("cci-ckd", "Moderate to severe CKD", 2.0),
            levels(
                "cci-tumor",
                "Solid tumor",
                &[
                    ("0", "None (+0)"),
                    ("2", "Localized (+2)"),
                    ("6", "Metastatic (+6)"),
                ],
            ),
            yes_no("cci-leukemia", "Leukemia", 2.0),
            yes_no("cci-lymphoma", "Lymphoma", 2.0),
            yes_no("cci-aids", "AIDS", 6.0),
        ],
    ))
    .requirement(DataRequirement::PatientAge(AgeTarget::Choice {
        group: "cci-age",
        pick: age_option,
    }))
    .requirement(condition(&[snomed::MYOCARDIAL_INFARCTION], "cci-mi", "Myocardial infarction", None))
    .requirement(condition(
        &[snomed::CONGESTIVE_HEART_FAILURE, snomed::HEART_FAILURE],
        "cci-chf",
        "Heart failure",
        None,
    ))
    .requirement(condition(
        &[snomed::PERIPHERAL_VASCULAR_DISEASE],
        "cci-pvd",
        "Peripheral vascular disease",
        None,
    ))
    .requirement(condition(&[snomed::STROKE, snomed::TIA], "cci-cva", "Stroke/TIA", None))
    .requirement(condition(&[snomed::DEMENTIA], "cci-dementia", "Dementia", None))
    .requirement(condition(&[snomed::COPD], "cci-cpd", "Chronic pulmonary disease", None))
    .requirement(condition(
        &[snomed::CONNECTIVE_TISSUE_DISEASE],
        "cci-ctd",
        "Connective tissue disease",
        None,
    ))
    .requirement(condition(&[snomed::PEPTIC_ULCER], "cci-pud", "Peptic ulcer disease", None))
    .requirement(condition(&[snomed::CIRRHOSIS], "cci-liver", "Liver disease", Some("1")))
    .requirement(condition(&[snomed::DIABETES], "cci-diabetes", "Diabetes", Some("1")))
    .requirement(condition(&[snomed::HEMIPLEGIA], "cci-hemiplegia", "Hemiplegia", None))
    .requirement(condition(
        &[snomed::CHRONIC_KIDNEY_DISEASE],
        "cci-ckd",
        "Chronic kidney disease",
        None,
    ))
    .requirement(condition(&[snomed::MALIGNANCY], "cci-tumor", "Solid tumor", Some("2")))
    .requirement(condition(
        &[snomed::METASTATIC_CANCER],
        "cci-tumor",
        "Metastatic tumor",
        Some("6"),
    ))
    .requirement(condition(&[snomed::LEUKEMIA], "cci-leukemia", "Leukemia", None))
    .requirement(condition(&[snomed::LYMPHOMA], "cci-lymphoma", "Lymphoma", None))
    .requirement(condition(&[snomed::AIDS], "cci-aids", "AIDS", None))
    .band(RiskBand::new(0.0, "No comorbidity burden", Severity::Success))
    .band(RiskBand::new(1.0, "Mild comorbidity", Severity::Info))
    .band(RiskBand::new(3.0, "Moderate comorbidity", Severity::Warning))
    .band(RiskBand::new(5.0, "Severe comorbidity", Severity::Danger))
    .score_label("Charlson Comorbidity Index")
    .extra(survival)
    .notes(
        Notes::default()
            .formula("10-year survival", "0.983^(e^(0.9 × CCI))")
            .reference("Charlson ME, et al. A new method of classifying prognostic comorbidity in longitudinal studies. J Chronic Dis. 1987;40(5):373-83."),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Calculator;
    use crate::form::FormState;
    use crate::units::UnitConverter;

    #[test]
    fn survival_for_three_points() {
        let calc = calculator();
        let mut form = FormState::from_sections(calc.sections());
        form.select("cci-age", "2").expect("age");
        form.affirm("cci-mi");
        let input = form.collect(&UnitConverter::standard());
        let result = calc.compute(&input).expect("compute").expect("result");
        assert_eq!(result.value, 3.0);
        assert_eq!(result.items[1].value, "77");
        assert_eq!(result.severity, Severity::Warning);
    }

    #[test]
    fn age_groups() {
        assert_eq!(age_option(49), "0");
        assert_eq!(age_option(80), "4");
    }
}
