//! Static calculator markup and the fragments that change on recalculation.

use maud::{html, Markup, DOCTYPE, PreEscaped};
use medcalc_core::{Assessment, Calculator, Severity};

use crate::builder;
use crate::styles::DEFAULT_STYLES;

pub const STALENESS_CONTAINER_ID: &str = "staleness-warnings";
pub const SUMMARY_CONTAINER_ID: &str = "fhir-data-summary";

pub fn result_id(calculator_id: &str) -> String {
    format!("{calculator_id}-result")
}

pub fn error_container_id(calculator_id: &str) -> String {
    format!("{calculator_id}-error-container")
}

/// Card markup for `calculator`. Pure: same calculator, same string.
#[rustfmt::skip::macros(html)]
pub fn calculator_card(calculator: &dyn Calculator) -> Markup {
    let id = calculator.id();
    html! {
        div.calculator-card data-calculator=(id) {
            div.calculator-header {
                h3 { (calculator.title()) }
                p.description { (calculator.description()) }
            }
            div.staleness-warning-container id=(STALENESS_CONTAINER_ID) {}
            div id=(SUMMARY_CONTAINER_ID) {}
            @for section in calculator.sections() {
                (builder::section(section))
            }
            div.error-container id=(error_container_id(id)) {}
            (builder::result_box(&result_id(id), None))
            (builder::notes(calculator.notes()))
        }
    }
}

pub fn generate_html(calculator: &dyn Calculator) -> String {
    calculator_card(calculator).into_string()
}

/// Standalone document embedding the card and the default styles.
#[rustfmt::skip::macros(html)]
pub fn generate_page(calculator: &dyn Calculator) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (calculator.title()) }
                style data-medcalc-ui="v1" { (PreEscaped(DEFAULT_STYLES)) }
            }
            body {
                div id="calculator-container" {
                    (calculator_card(calculator))
                }
            }
        }
    }
    .into_string()
}

/// Contents of the result box, or `None` when it stays hidden.
pub fn result_body(assessment: &Assessment) -> Option<Markup> {
    assessment.result().map(builder::result_content)
}

/// Contents of the error container.
pub fn error_body(assessment: &Assessment) -> Markup {
    match assessment {
        Assessment::Invalid { message } => builder::alert_box(Severity::Warning, message),
        Assessment::Failed { message } => builder::alert_box(Severity::Danger, message),
        Assessment::Empty | Assessment::Complete { .. } => html! {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medcalc_core::library;
    use medcalc_core::CalcResult;

    #[test]
    fn generate_html_is_idempotent() {
        for calculator in library::all() {
            let first = generate_html(calculator.as_ref());
            let second = generate_html(calculator.as_ref());
            assert_eq!(first, second, "{}", calculator.id());
        }
    }

    #[test]
    fn card_exposes_dom_contract() {
        let calculator = library::map::calculator();
        let markup = generate_html(&calculator);
        assert!(markup.contains(r#"class="calculator-card" data-calculator="map""#));
        assert!(markup.contains(r#"id="map-result""#));
        assert!(markup.contains(r#"id="map-error-container""#));
        assert!(markup.contains(r#"id="staleness-warnings""#));
        assert!(markup.contains(r#"id="fhir-data-summary""#));
    }

    #[test]
    fn page_embeds_styles() {
        let calculator = library::heart::calculator();
        let page = generate_page(&calculator);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains(".ui-result-box.show"));
    }

    #[test]
    fn assessment_fragments() {
        let failed = Assessment::Failed {
            message: "boom".into(),
        };
        assert!(result_body(&failed).is_none());
        assert!(error_body(&failed).into_string().contains("ui-alert-danger"));

        let complete = Assessment::Complete {
            result: CalcResult::new(1.0, Severity::Success),
        };
        assert!(result_body(&complete).is_some());
        assert!(error_body(&complete).into_string().is_empty());
    }
}
