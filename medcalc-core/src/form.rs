//! Declarative input specs and the mutable form state built from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::units::{format_value, UnitConverter, UnitDomain};
use crate::CalcError;

/// One value read from the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Flag(bool),
    Text(String),
    Missing,
}

impl FieldValue {
    /// Blank text, NaN and `Missing` count as absent.
    pub fn is_present(&self) -> bool {
        match self {
            FieldValue::Number(value) => !value.is_nan(),
            FieldValue::Flag(_) => true,
            FieldValue::Text(text) => !text.trim().is_empty(),
            FieldValue::Missing => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) if !value.is_nan() => Some(*value),
            FieldValue::Text(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }
}

/// Snapshot of a form, keyed by field id. Rebuilt on every recalculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalculationInput(BTreeMap<String, FieldValue>);

impl CalculationInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        self.0.insert(key.into(), value);
    }

    /// Builder-style insert, convenient in tests and the JS bridge.
    pub fn with(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn is_present(&self, key: &str) -> bool {
        self.0.get(key).map(FieldValue::is_present).unwrap_or(false)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(FieldValue::as_number)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(FieldValue::Text(text)) if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(FieldValue::Flag(true)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, FieldValue)> for CalculationInput {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Unit toggle declaration for a numeric input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToggleSpec {
    pub domain: UnitDomain,
    pub units: Vec<String>,
}

/// Numeric text input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberInput {
    pub id: String,
    pub label: String,
    pub unit: Option<String>,
    pub placeholder: Option<String>,
    pub step: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub help: Option<String>,
    pub toggle: Option<ToggleSpec>,
    /// Unit the formula expects; values are converted into it on collect.
    pub standard_unit: Option<String>,
    pub decimals: Option<usize>,
}

impl NumberInput {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            unit: None,
            placeholder: None,
            step: None,
            min: None,
            max: None,
            help: None,
            toggle: None,
            standard_unit: None,
            decimals: None,
        }
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn decimals(mut self, decimals: usize) -> Self {
        self.decimals = Some(decimals);
        self
    }

    /// Attach a unit toggle. The first unit is displayed initially and is
    /// the unit handed to the formula.
    pub fn toggle(mut self, domain: UnitDomain, units: &[&str]) -> Self {
        let units: Vec<String> = units.iter().map(|unit| unit.to_string()).collect();
        if let Some(first) = units.first() {
            self.unit = Some(first.clone());
            if self.standard_unit.is_none() {
                self.standard_unit = Some(first.clone());
            }
        }
        self.toggle = Some(ToggleSpec { domain, units });
        self
    }

    pub fn standard(mut self, unit: &str) -> Self {
        self.standard_unit = Some(unit.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
    pub checked: bool,
}

impl ChoiceOption {
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            checked: false,
        }
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadioGroup {
    pub name: String,
    pub label: String,
    pub options: Vec<ChoiceOption>,
    pub help: Option<String>,
}

impl RadioGroup {
    pub fn new(name: &str, label: &str, options: Vec<ChoiceOption>) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            options,
            help: None,
        }
    }

    /// Two-option group valued `0` (No, preselected) and `points` (Yes).
    pub fn yes_no(name: &str, label: &str, points: f64) -> Self {
        Self::new(
            name,
            label,
            vec![
                ChoiceOption::new("0", "No").checked(),
                ChoiceOption::new(&format_points(points), &format!("Yes ({})", signed(points))),
            ],
        )
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Checkbox {
    pub id: String,
    pub label: String,
    pub points: f64,
    pub checked: bool,
}

impl Checkbox {
    pub fn new(id: &str, label: &str, points: f64) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            points,
            checked: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Select {
    pub id: String,
    pub label: String,
    pub options: Vec<ChoiceOption>,
}

/// A single form control.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputSpec {
    Number(NumberInput),
    Radio(RadioGroup),
    Checkbox(Checkbox),
    Select(Select),
}

impl InputSpec {
    pub fn key(&self) -> &str {
        match self {
            InputSpec::Number(input) => &input.id,
            InputSpec::Radio(group) => &group.name,
            InputSpec::Checkbox(checkbox) => &checkbox.id,
            InputSpec::Select(select) => &select.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            InputSpec::Number(input) => &input.label,
            InputSpec::Radio(group) => &group.label,
            InputSpec::Checkbox(checkbox) => &checkbox.label,
            InputSpec::Select(select) => &select.label,
        }
    }
}

/// Titled group of inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub title: String,
    pub subtitle: Option<String>,
    pub icon: Option<String>,
    pub inputs: Vec<InputSpec>,
}

impl Section {
    pub fn new(title: &str, inputs: Vec<InputSpec>) -> Self {
        Self {
            title: title.to_string(),
            subtitle: None,
            icon: None,
            inputs,
        }
    }

    pub fn subtitle(mut self, subtitle: &str) -> Self {
        self.subtitle = Some(subtitle.to_string());
        self
    }

    pub fn icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }
}

/// Displayed-unit state of one numeric input.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitToggle {
    domain: UnitDomain,
    units: Vec<String>,
    index: usize,
}

impl UnitToggle {
    fn from_spec(spec: &ToggleSpec) -> Self {
        Self {
            domain: spec.domain,
            units: spec.units.clone(),
            index: 0,
        }
    }

    pub fn domain(&self) -> UnitDomain {
        self.domain
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn current(&self) -> &str {
        self.units.get(self.index).map(String::as_str).unwrap_or("")
    }

    /// Advance to the next unit, wrapping around.
    pub fn cycle(&mut self) {
        if !self.units.is_empty() {
            self.index = (self.index + 1) % self.units.len();
        }
    }
}

/// Numeric input state: raw text plus the unit it is displayed in.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberField {
    raw: String,
    toggle: Option<UnitToggle>,
    standard: Option<String>,
    decimals: Option<usize>,
}

impl NumberField {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            toggle: None,
            standard: None,
            decimals: None,
        }
    }

    pub fn with_toggle(raw: &str, domain: UnitDomain, units: &[&str]) -> Self {
        Self {
            raw: raw.to_string(),
            toggle: Some(UnitToggle {
                domain,
                units: units.iter().map(|unit| unit.to_string()).collect(),
                index: 0,
            }),
            standard: None,
            decimals: None,
        }
    }

    fn from_spec(spec: &NumberInput) -> Self {
        Self {
            raw: String::new(),
            toggle: spec.toggle.as_ref().map(UnitToggle::from_spec),
            standard: spec.standard_unit.clone(),
            decimals: spec.decimals,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed value in the displayed unit.
    pub fn parsed(&self) -> Option<f64> {
        self.raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
    }

    pub fn toggle(&self) -> Option<&UnitToggle> {
        self.toggle.as_ref()
    }

    pub fn display_unit(&self) -> Option<&str> {
        self.toggle.as_ref().map(UnitToggle::current)
    }
}

/// Live state of one control.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldState {
    Number(NumberField),
    Choice {
        options: Vec<String>,
        selected: Option<String>,
    },
    Flag {
        checked: bool,
    },
}

/// Mutable form state owned by a single calculator view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    fields: BTreeMap<String, FieldState>,
}

impl FormState {
    /// Initial state: empty numbers, toggles on their first unit, default
    /// options selected.
    pub fn from_sections(sections: &[Section]) -> Self {
        let mut fields = BTreeMap::new();
        for input in sections.iter().flat_map(|section| section.inputs.iter()) {
            let state = match input {
                InputSpec::Number(spec) => FieldState::Number(NumberField::from_spec(spec)),
                InputSpec::Radio(group) => FieldState::Choice {
                    options: group.options.iter().map(|o| o.value.clone()).collect(),
                    selected: group
                        .options
                        .iter()
                        .find(|option| option.checked)
                        .map(|option| option.value.clone()),
                },
                InputSpec::Select(select) => FieldState::Choice {
                    options: select.options.iter().map(|o| o.value.clone()).collect(),
                    selected: select
                        .options
                        .iter()
                        .find(|option| option.checked)
                        .or_else(|| select.options.first())
                        .map(|option| option.value.clone()),
                },
                InputSpec::Checkbox(checkbox) => FieldState::Flag {
                    checked: checkbox.checked,
                },
            };
            fields.insert(input.key().to_string(), state);
        }
        Self { fields }
    }

    pub fn field(&self, key: &str) -> Option<&FieldState> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    fn unknown(key: &str) -> CalcError {
        CalcError::Validation(format!("unknown field \"{key}\""))
    }

    /// Set a field from user text: numbers take the raw text, choices the
    /// option value, flags `true`/`false`.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<(), CalcError> {
        match self.fields.get(key) {
            Some(FieldState::Number(_)) => self.set_number(key, raw),
            Some(FieldState::Choice { .. }) => self.select(key, raw),
            Some(FieldState::Flag { .. }) => {
                let checked = matches!(raw.trim(), "true" | "1" | "yes" | "on");
                self.check(key, checked)
            }
            None => Err(Self::unknown(key)),
        }
    }

    pub fn set_number(&mut self, key: &str, raw: &str) -> Result<(), CalcError> {
        match self.fields.get_mut(key) {
            Some(FieldState::Number(field)) => {
                field.raw = raw.trim().to_string();
                Ok(())
            }
            _ => Err(Self::unknown(key)),
        }
    }

    pub fn select(&mut self, key: &str, value: &str) -> Result<(), CalcError> {
        match self.fields.get_mut(key) {
            Some(FieldState::Choice { options, selected }) => {
                if options.iter().any(|option| option == value) {
                    *selected = Some(value.to_string());
                    Ok(())
                } else {
                    Err(CalcError::Validation(format!(
                        "\"{value}\" is not an option of \"{key}\""
                    )))
                }
            }
            _ => Err(Self::unknown(key)),
        }
    }

    pub fn check(&mut self, key: &str, checked: bool) -> Result<(), CalcError> {
        match self.fields.get_mut(key) {
            Some(FieldState::Flag { checked: current }) => {
                *current = checked;
                Ok(())
            }
            _ => Err(Self::unknown(key)),
        }
    }

    /// Mark a criterion as present: checks a checkbox or picks the "yes"
    /// option (first non-zero value) of a choice group.
    pub fn affirm(&mut self, key: &str) -> bool {
        match self.fields.get_mut(key) {
            Some(FieldState::Flag { checked }) => {
                *checked = true;
                true
            }
            Some(FieldState::Choice { options, selected }) => {
                let yes = options.iter().find(|option| {
                    !matches!(option.as_str(), "0" | "no" | "false")
                        && option.parse::<f64>().map(|v| v != 0.0).unwrap_or(true)
                });
                match yes {
                    Some(option) => {
                        *selected = Some(option.clone());
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// Select `value` only when it outranks the current selection
    /// numerically, so several writers to one group settle on the highest.
    pub fn raise(&mut self, key: &str, value: &str) -> Result<bool, CalcError> {
        let current = match self.fields.get(key) {
            Some(FieldState::Choice { selected, .. }) => selected.clone(),
            _ => return Err(Self::unknown(key)),
        };
        let rank = |v: &str| v.parse::<f64>().unwrap_or(f64::NEG_INFINITY);
        if let Some(current) = current {
            if rank(&current) >= rank(value) {
                return Ok(false);
            }
        }
        self.select(key, value)?;
        Ok(true)
    }

    /// Cycle the displayed unit of a numeric field, converting the current
    /// value. Returns the new unit.
    pub fn cycle_unit(&mut self, key: &str, converter: &UnitConverter) -> Option<String> {
        let Some(FieldState::Number(field)) = self.fields.get_mut(key) else {
            return None;
        };
        let value = field.parsed();
        let toggle = field.toggle.as_mut()?;
        let from = toggle.current().to_string();
        toggle.cycle();
        let to = toggle.current().to_string();
        if let Some(value) = value {
            match converter.convert(value, &from, &to, toggle.domain) {
                Some(converted) => {
                    let decimals = converter.decimal_places(toggle.domain, &to);
                    field.raw = format_value(converted, decimals);
                }
                None => field.raw.clear(),
            }
        }
        Some(to)
    }

    /// Write an externally observed value, converting `unit` into the
    /// displayed unit. Returns `false` (field untouched) when the field is
    /// not numeric or the unit cannot be converted.
    pub fn set_observed(
        &mut self,
        key: &str,
        value: f64,
        unit: Option<&str>,
        converter: &UnitConverter,
    ) -> bool {
        if !value.is_finite() {
            return false;
        }
        let Some(FieldState::Number(field)) = self.fields.get_mut(key) else {
            return false;
        };
        match (&field.toggle, unit) {
            (Some(toggle), Some(unit)) => {
                let target = toggle.current();
                let Some(converted) = converter.convert(value, unit, target, toggle.domain) else {
                    tracing::warn!(field = key, unit, displayed = target, "observed unit not convertible");
                    return false;
                };
                let decimals = field
                    .decimals
                    .unwrap_or_else(|| converter.decimal_places(toggle.domain, target));
                field.raw = format_value(converted, decimals);
            }
            (Some(toggle), None) => {
                let decimals = converter.decimal_places(toggle.domain, toggle.current());
                field.raw = format_value(value, field.decimals.unwrap_or(decimals));
            }
            (None, _) => {
                field.raw = match field.decimals {
                    Some(decimals) => format_value(value, decimals),
                    None => trim_number(value),
                };
            }
        }
        true
    }

    /// Snapshot the form, converting numbers into each field's standard unit.
    pub fn collect(&self, converter: &UnitConverter) -> CalculationInput {
        self.fields
            .iter()
            .map(|(key, state)| {
                let value = match state {
                    FieldState::Number(field) => {
                        let number = match &field.standard {
                            Some(standard) => converter.get_standard_value(field, standard),
                            None => field.parsed(),
                        };
                        number.map(FieldValue::Number).unwrap_or(FieldValue::Missing)
                    }
                    FieldState::Choice { selected, .. } => selected
                        .clone()
                        .map(FieldValue::Text)
                        .unwrap_or(FieldValue::Missing),
                    FieldState::Flag { checked } => FieldValue::Flag(*checked),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

fn trim_number(value: f64) -> String {
    let text = format_value(value, 2);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.to_string()
}

/// Render a point value the way option values are written (`1`, `1.5`).
pub fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{points:.0}")
    } else {
        format!("{points}")
    }
}

fn signed(points: f64) -> String {
    if points >= 0.0 {
        format!("+{}", format_points(points))
    } else {
        format_points(points)
    }
}
