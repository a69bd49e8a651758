//! Framework-neutral WASM <-> JavaScript bridge.

use medcalc_core::{
    CalcConfig, CalcError, CalculationInput, Registry, UnitConverter, UnitDomain,
    ValidationRule, ValidationSchema,
};
use medcalc_fhir::{Observation, StalenessTracker};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsCalcConfig {
    #[serde(default)]
    staleness_threshold_days: Option<u32>,
    #[serde(default)]
    observation_count: Option<u32>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
}

impl From<JsCalcConfig> for CalcConfig {
    fn from(cfg: JsCalcConfig) -> Self {
        let mut base = CalcConfig::default();
        if let Some(days) = cfg.staleness_threshold_days {
            base.staleness_threshold_days = days;
        }
        if let Some(count) = cfg.observation_count {
            base.observation_count = count;
        }
        if cfg.request_timeout_secs.is_some() {
            base.request_timeout_secs = cfg.request_timeout_secs;
        }
        base
    }
}

/// One entry of the schema array accepted by [`validate`].
#[derive(Deserialize)]
struct JsRule {
    key: String,
    #[serde(flatten)]
    rule: ValidationRule,
}

fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn format_calc_error(err: CalcError) -> JsValue {
    JsValue::from_str(&format!("{}: {}", err.code(), err.user_message()))
}

/// Plain objects rather than `Map`s on the JS side.
fn to_js<T: Serialize>(value: &T, what: &str) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Cannot serialize {what}: {err}")))
}

fn read_config(config: Option<JsValue>) -> Result<CalcConfig, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsCalcConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Cannot read config: {err}")))?;
            Ok(CalcConfig::from(cfg))
        }
        _ => Ok(CalcConfig::default()),
    }
}

fn read_values(values: JsValue) -> Result<CalculationInput, JsValue> {
    from_value(values).map_err(|err| JsValue::from_str(&format!("Cannot read form values: {err}")))
}

#[wasm_bindgen]
pub fn list_calculators() -> Result<JsValue, JsValue> {
    init();
    to_js(&Registry::standard().summaries(), "calculators")
}

#[wasm_bindgen]
pub fn search_calculators(query: &str) -> Result<JsValue, JsValue> {
    init();
    to_js(&Registry::standard().search(query), "calculators")
}

#[wasm_bindgen]
pub fn generate_html(calculator_id: &str) -> Result<String, JsValue> {
    init();
    let calculator = Registry::standard()
        .get(calculator_id)
        .map_err(format_calc_error)?;
    Ok(medcalc_ui::generate_html(calculator.as_ref()))
}

/// Validate and compute `values` (an object keyed by field id). Returns the
/// assessment tagged by `status`.
#[wasm_bindgen]
pub fn calculate(calculator_id: &str, values: JsValue) -> Result<JsValue, JsValue> {
    init();
    let calculator = Registry::standard()
        .get(calculator_id)
        .map_err(format_calc_error)?;
    let input = read_values(values)?;
    to_js(&calculator.assess(&input), "result")
}

#[wasm_bindgen]
pub fn convert_unit(value: f64, from: &str, to: &str, domain: &str) -> Result<f64, JsValue> {
    init();
    let domain: UnitDomain = domain.parse().map_err(format_calc_error)?;
    UnitConverter::standard()
        .try_convert(value, from, to, domain)
        .map_err(format_calc_error)
}

/// `schema` is an array of `{ key, min?, max?, required?, label?, message? }`.
/// Returns `{ isValid, errors }`.
#[wasm_bindgen]
pub fn validate(values: JsValue, schema: JsValue) -> Result<JsValue, JsValue> {
    init();
    let input = read_values(values)?;
    let rules: Vec<JsRule> = from_value(schema)
        .map_err(|err| JsValue::from_str(&format!("Cannot read schema: {err}")))?;
    let schema: ValidationSchema = rules.into_iter().map(|r| (r.key, r.rule)).collect();
    let report = medcalc_core::validate_calculator_input(&input, &schema).report();
    to_js(&report, "report")
}

/// Staleness of one Observation resource; `null` when it carries no date.
#[wasm_bindgen]
pub fn check_staleness(observation: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    init();
    let value = from_value::<serde_json::Value>(observation)
        .map_err(|err| JsValue::from_str(&format!("Cannot read observation JSON: {err}")))?;
    let observation =
        Observation::from_value(value).map_err(|err| JsValue::from_str(&err.to_string()))?;
    let cfg = read_config(config)?;

    let code = observation.codes().first().map(|code| code.to_string()).unwrap_or_default();
    let mut tracker = StalenessTracker::new(&cfg);
    let info = tracker.track_observation(
        observation.id().unwrap_or("observation"),
        &observation,
        &code,
        None,
    );
    to_js(&info, "staleness")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_merges_over_defaults() {
        let cfg = CalcConfig::from(JsCalcConfig {
            staleness_threshold_days: Some(30),
            observation_count: None,
            request_timeout_secs: None,
        });
        assert_eq!(cfg.staleness_threshold_days, 30);
        assert_eq!(cfg.observation_count, CalcConfig::default().observation_count);
    }

    #[test]
    fn schema_entries_flatten_rules() {
        let rule: JsRule = serde_json::from_str(
            r#"{"key": "weight", "min": 0.5, "max": 500, "required": true, "label": "Weight"}"#,
        )
        .expect("rule");
        assert_eq!(rule.key, "weight");
        assert_eq!(rule.rule.max, Some(500.0));
        assert!(rule.rule.required);
    }
}
