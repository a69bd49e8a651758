#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{JsCast, JsValue};
#[cfg(target_arch = "wasm32")]
use web_sys::{Document, Node};

#[cfg(target_arch = "wasm32")]
const STYLE_TAG_SELECTOR: &str = "style[data-medcalc-ui]";

/// Default CSS for calculator cards along with easy-to-override design tokens.
pub const DEFAULT_STYLES: &str = r#"
:root {
  --medcalc-font-family: 'Inter', system-ui, -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
  --medcalc-card-bg: #ffffff;
  --medcalc-card-border: rgba(148, 163, 184, 0.28);
  --medcalc-radius: 12px;
  --medcalc-text: #1f2933;
  --medcalc-muted: #52606d;
  --medcalc-heading: #11181c;
  --medcalc-surface: #f8fafc;
  --medcalc-accent: #2563eb;
  --medcalc-success: #047857;
  --medcalc-success-bg: rgba(16, 185, 129, 0.12);
  --medcalc-info: #1d4ed8;
  --medcalc-info-bg: rgba(59, 130, 246, 0.12);
  --medcalc-warning: #b54708;
  --medcalc-warning-bg: rgba(220, 104, 3, 0.14);
  --medcalc-danger: #b42318;
  --medcalc-danger-bg: rgba(240, 68, 56, 0.12);
}

.calculator-card {
  font-family: var(--medcalc-font-family);
  color: var(--medcalc-text);
  background: var(--medcalc-card-bg);
  border: 1px solid var(--medcalc-card-border);
  border-radius: var(--medcalc-radius);
  padding: 24px;
  max-width: 860px;
}

.calculator-header h3 {
  margin: 0 0 6px;
  color: var(--medcalc-heading);
}

.calculator-header .description {
  margin: 0 0 16px;
  color: var(--medcalc-muted);
}

.ui-section {
  margin-bottom: 20px;
  padding: 16px;
  background: var(--medcalc-surface);
  border-radius: var(--medcalc-radius);
}

.ui-section-title {
  font-weight: 600;
  margin-bottom: 8px;
}

.ui-section-subtitle,
.help-text {
  font-size: 0.85rem;
  color: var(--medcalc-muted);
}

.ui-input-group {
  margin-bottom: 12px;
}

.ui-input-group > label {
  display: block;
  font-weight: 500;
  margin-bottom: 4px;
}

.ui-input-wrapper {
  display: flex;
  align-items: center;
  gap: 8px;
}

.ui-input,
.ui-select {
  flex: 1;
  padding: 8px 10px;
  border: 1px solid var(--medcalc-card-border);
  border-radius: 8px;
  font: inherit;
}

.ui-input-unit,
.unit-toggle-btn {
  min-width: 64px;
  text-align: center;
  font-size: 0.85rem;
  color: var(--medcalc-muted);
}

.unit-toggle-btn {
  padding: 6px 8px;
  border: 1px solid var(--medcalc-card-border);
  border-radius: 8px;
  background: var(--medcalc-card-bg);
  cursor: pointer;
}

.unit-toggle-btn:hover {
  color: var(--medcalc-accent);
  border-color: var(--medcalc-accent);
}

.ui-radio-group {
  display: flex;
  flex-direction: column;
  gap: 4px;
}

.ui-radio-option,
.ui-checkbox-option {
  display: flex;
  align-items: center;
  gap: 8px;
  padding: 6px 8px;
  border-radius: 8px;
}

.ui-radio-option:hover,
.ui-checkbox-option:hover {
  background: rgba(37, 99, 235, 0.06);
}

.ui-result-box {
  display: none;
  margin-top: 20px;
  border: 1px solid var(--medcalc-card-border);
  border-radius: var(--medcalc-radius);
  overflow: hidden;
}

.ui-result-box.show {
  display: block;
}

.ui-result-header {
  padding: 10px 16px;
  font-weight: 600;
  background: var(--medcalc-surface);
}

.ui-result-content {
  padding: 16px;
}

.ui-result-score {
  text-align: center;
  margin-bottom: 12px;
}

.ui-result-label {
  font-size: 0.9rem;
  color: var(--medcalc-muted);
}

.ui-result-value {
  font-size: 2rem;
  font-weight: 700;
  color: var(--medcalc-heading);
}

.ui-result-unit {
  margin-left: 4px;
  font-size: 1rem;
  font-weight: 400;
  color: var(--medcalc-muted);
}

.ui-result-item {
  display: flex;
  justify-content: space-between;
  padding: 6px 0;
  border-bottom: 1px dashed var(--medcalc-card-border);
}

.ui-result-interpretation {
  margin: 8px 0;
  padding: 8px 12px;
  border-radius: 8px;
  font-weight: 600;
}

.ui-alert {
  display: flex;
  gap: 10px;
  margin: 12px 0;
  padding: 12px 14px;
  border-radius: 10px;
}

.ui-alert-success {
  color: var(--medcalc-success);
  background: var(--medcalc-success-bg);
}

.ui-alert-info {
  color: var(--medcalc-info);
  background: var(--medcalc-info-bg);
}

.ui-alert-warning {
  color: var(--medcalc-warning);
  background: var(--medcalc-warning-bg);
}

.ui-alert-danger {
  color: var(--medcalc-danger);
  background: var(--medcalc-danger-bg);
}

.staleness-warning-container:empty,
#fhir-data-summary:empty {
  display: none;
}

.staleness-list {
  margin: 0;
  padding-left: 20px;
}

.staleness-age {
  color: var(--medcalc-muted);
}

.ui-formula-section {
  margin-top: 20px;
  padding: 16px;
  background: var(--medcalc-surface);
  border-radius: var(--medcalc-radius);
}

.ui-formula-title {
  font-weight: 600;
  margin-bottom: 8px;
}

.ui-formula-item {
  margin-bottom: 8px;
}

.ui-formula-math {
  font-family: 'JetBrains Mono', ui-monospace, monospace;
  font-size: 0.9rem;
}

.info-section {
  margin-top: 16px;
  font-size: 0.85rem;
  color: var(--medcalc-muted);
}

@media (max-width: 640px) {
  .calculator-card {
    padding: 16px;
  }

  .ui-input-wrapper {
    flex-wrap: wrap;
  }
}
"#;

#[cfg(target_arch = "wasm32")]
pub fn ensure_styles(document: &Document) -> Result<(), JsValue> {
    if document.query_selector(STYLE_TAG_SELECTOR)?.is_some() {
        return Ok(());
    }

    let head = document
        .head()
        .ok_or_else(|| JsValue::from_str("Document has no <head> element"))?;

    let style_el = document.create_element("style")?;
    style_el.set_attribute("data-medcalc-ui", "v1")?;
    style_el.set_text_content(Some(DEFAULT_STYLES));
    head.append_child(&style_el.clone().dyn_into::<Node>()?)?;

    Ok(())
}
