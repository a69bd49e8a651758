//! Markup fragments shared by every calculator card.

use maud::{html, Markup};
use medcalc_core::calculator::{CalcResult, FormulaItem, Notes, ResultItem};
use medcalc_core::form::{Checkbox, InputSpec, NumberInput, RadioGroup, Section, Select};
use medcalc_core::Severity;
use medcalc_fhir::{PopulationSummary, StalenessInfo};
use serde_json::json;

fn step_attr(step: Option<f64>) -> String {
    step.map(|s| s.to_string()).unwrap_or_else(|| "any".to_string())
}

#[rustfmt::skip::macros(html)]
pub fn section(section: &Section) -> Markup {
    html! {
        div.ui-section {
            div.ui-section-title {
                @if let Some(icon) = &section.icon {
                    span.section-icon { (icon) }
                }
                (section.title)
            }
            @if let Some(subtitle) = &section.subtitle {
                div.ui-section-subtitle { (subtitle) }
            }
            @for spec in &section.inputs {
                (input(spec))
            }
        }
    }
}

pub fn input(spec: &InputSpec) -> Markup {
    match spec {
        InputSpec::Number(number) => number_input(number),
        InputSpec::Radio(group) => radio_group(group),
        InputSpec::Checkbox(checkbox) => checkbox_option(checkbox),
        InputSpec::Select(select) => select_input(select),
    }
}

#[rustfmt::skip::macros(html)]
pub fn number_input(spec: &NumberInput) -> Markup {
    let toggle = spec.toggle.as_ref().map(|toggle| {
        json!({ "type": toggle.domain.as_str(), "units": toggle.units }).to_string()
    });
    html! {
        div.ui-input-group {
            label for=(spec.id) { (spec.label) }
            div.ui-input-wrapper data-unit-toggle=[toggle] {
                input.ui-input id=(spec.id) name=(spec.id) type="number"
                    placeholder=[spec.placeholder.as_deref()]
                    min=[spec.min] max=[spec.max] step=(step_attr(spec.step));
                @match (&spec.toggle, &spec.unit) {
                    (Some(toggle), _) => {
                        button.unit-toggle-btn type="button" data-input=(spec.id)
                            title="Click to change unit" {
                            (toggle.units.first().map(String::as_str).unwrap_or_default())
                        }
                    }
                    (None, Some(unit)) => {
                        span.ui-input-unit { (unit) }
                    }
                    (None, None) => {}
                }
            }
            @if let Some(help) = &spec.help {
                div.help-text { (help) }
            }
        }
    }
}

#[rustfmt::skip::macros(html)]
pub fn radio_group(group: &RadioGroup) -> Markup {
    html! {
        div.ui-input-group {
            label { (group.label) }
            div.ui-radio-group {
                @for (index, option) in group.options.iter().enumerate() {
                    @let id = format!("{}-{}-{index}", group.name, option.value);
                    div.ui-radio-option {
                        input type="radio" id=(id) name=(group.name) value=(option.value)
                            checked[option.checked];
                        label.radio-label for=(id) { (option.label) }
                    }
                }
            }
            @if let Some(help) = &group.help {
                div.help-text { (help) }
            }
        }
    }
}

#[rustfmt::skip::macros(html)]
pub fn checkbox_option(checkbox: &Checkbox) -> Markup {
    html! {
        div.ui-checkbox-option {
            input type="checkbox" id=(checkbox.id) name=(checkbox.id)
                value=(medcalc_core::form::format_points(checkbox.points))
                checked[checkbox.checked];
            label.checkbox-label for=(checkbox.id) { (checkbox.label) }
        }
    }
}

#[rustfmt::skip::macros(html)]
pub fn select_input(select: &Select) -> Markup {
    html! {
        div.ui-input-group {
            label for=(select.id) { (select.label) }
            select.ui-select id=(select.id) name=(select.id) {
                @for option in &select.options {
                    option value=(option.value) selected[option.checked] { (option.label) }
                }
            }
        }
    }
}

/// Result container; `.show` makes it visible.
#[rustfmt::skip::macros(html)]
pub fn result_box(id: &str, content: Option<Markup>) -> Markup {
    html! {
        div.ui-result-box.show[content.is_some()] id=(id) {
            div.ui-result-header { span { "Results" } }
            div.ui-result-content {
                @if let Some(content) = content {
                    (content)
                }
            }
        }
    }
}

#[rustfmt::skip::macros(html)]
pub fn result_item(item: &ResultItem) -> Markup {
    let interpretation_class = item.severity.map(Severity::alert_class);
    html! {
        @if item.is_score {
            div.ui-result-score {
                div.ui-result-label { (item.label) }
                div.ui-result-value {
                    (item.value)
                    @if let Some(unit) = &item.unit {
                        span.ui-result-unit { (unit) }
                    }
                }
            }
        } @else {
            div.ui-result-item {
                span.ui-result-item-label { (item.label) }
                span.ui-result-item-value {
                    (item.value)
                    @if let Some(unit) = &item.unit {
                        " " span.ui-result-unit { (unit) }
                    }
                }
            }
        }
        @if let Some(text) = &item.interpretation {
            div class={ "ui-result-interpretation " (interpretation_class.unwrap_or_default()) } {
                (text)
            }
        }
    }
}

#[rustfmt::skip::macros(html)]
pub fn result_content(result: &CalcResult) -> Markup {
    html! {
        @for item in &result.items {
            (result_item(item))
        }
        @for alert in &result.alerts {
            (alert_box(alert.severity, &alert.message))
        }
    }
}

#[rustfmt::skip::macros(html)]
pub fn alert_box(severity: Severity, message: &str) -> Markup {
    html! {
        div class={ "ui-alert " (severity.alert_class()) } {
            span.ui-alert-icon { (severity.icon()) }
            div.ui-alert-content { (message) }
        }
    }
}

#[rustfmt::skip::macros(html)]
pub fn formula_section(items: &[FormulaItem]) -> Markup {
    html! {
        div.ui-formula-section {
            div.ui-formula-title { "Formulas" }
            @for item in items {
                div.ui-formula-item {
                    strong { (item.label) ":" }
                    div.ui-formula-math { (item.formula) }
                }
            }
        }
    }
}

#[rustfmt::skip::macros(html)]
pub fn notes(notes: &Notes) -> Markup {
    html! {
        @if !notes.formulas.is_empty() {
            (formula_section(&notes.formulas))
        }
        @if let Some(info) = &notes.info {
            (alert_box(Severity::Info, info))
        }
        @if let Some(warning) = &notes.warning {
            (alert_box(Severity::Warning, warning))
        }
        @if !notes.references.is_empty() {
            div.info-section {
                h4 { "References" }
                ol.ui-list {
                    @for reference in &notes.references {
                        li { (reference) }
                    }
                }
            }
        }
    }
}

/// Body of `#staleness-warnings`; empty when nothing is stale.
#[rustfmt::skip::macros(html)]
pub fn staleness_warning(items: &[StalenessInfo], threshold_days: i64) -> Markup {
    html! {
        @if !items.is_empty() {
            div.staleness-warning.ui-alert.ui-alert-warning {
                span.ui-alert-icon { (Severity::Warning.icon()) }
                div.ui-alert-content {
                    strong { "Stale Data Warning" }
                    p {
                        "The following auto-populated values are older than "
                        (threshold_days) " days. Please verify if updates are needed:"
                    }
                    ul.staleness-list {
                        @for item in items {
                            li.staleness-item data-field=(item.selector) {
                                strong { (item.label) } ": "
                                span.staleness-date { (item.date_text) }
                                " "
                                span.staleness-age { "(" (item.age_text) ")" }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Body of `#fhir-data-summary`.
#[rustfmt::skip::macros(html)]
pub fn data_summary(summary: &PopulationSummary) -> Markup {
    let severity = if summary.missing.is_empty() {
        Severity::Success
    } else {
        Severity::Info
    };
    html! {
        @if !summary.loaded.is_empty() || !summary.missing.is_empty() {
            div class={ "fhir-data-summary ui-alert " (severity.alert_class()) } {
                span.ui-alert-icon { (severity.icon()) }
                div.ui-alert-content {
                    @if !summary.loaded.is_empty() {
                        div.data-loaded {
                            strong { "Loaded from EHR: " }
                            (summary.loaded.join(", "))
                        }
                    }
                    @if !summary.missing.is_empty() {
                        div.data-missing {
                            strong { "Not found, please enter manually: " }
                            (summary.missing.join(", "))
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medcalc_core::form::ChoiceOption;
    use medcalc_core::UnitDomain;

    #[test]
    fn toggled_input_carries_unit_data() {
        let spec = NumberInput::new("w", "Weight").toggle(UnitDomain::Weight, &["kg", "lbs"]);
        let markup = number_input(&spec).into_string();
        assert!(markup.contains(r#"data-unit-toggle="{&quot;type&quot;:&quot;weight&quot;"#));
        assert!(markup.contains(r#"class="unit-toggle-btn""#));
        assert!(!markup.contains("ui-input-unit"));
    }

    #[test]
    fn radio_options_keep_default_check() {
        let group = RadioGroup::new(
            "g",
            "Group",
            vec![ChoiceOption::new("0", "No").checked(), ChoiceOption::new("2", "Yes")],
        );
        let markup = radio_group(&group).into_string();
        assert!(markup.contains(r#"id="g-0-0" name="g" value="0" checked"#));
        assert!(markup.contains(r#"id="g-2-1""#));
    }

    #[test]
    fn fhir_text_is_escaped() {
        let summary = PopulationSummary {
            loaded: vec!["<script>x</script>".into()],
            missing: Vec::new(),
            cancelled: false,
        };
        let markup = data_summary(&summary).into_string();
        assert!(markup.contains("&lt;script&gt;"));
        assert!(markup.contains("ui-alert-success"));
    }

    #[test]
    fn result_box_visibility() {
        assert!(!result_box("x-result", None).into_string().contains("show"));
        let shown = result_box("x-result", Some(html! { "ok" })).into_string();
        assert!(shown.contains(r#"class="ui-result-box show""#));
    }
}
