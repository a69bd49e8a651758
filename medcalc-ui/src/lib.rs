//! Calculator cards: server-side markup, the per-card view state machine and
//! the browser mount.

pub mod builder;
pub mod render;
pub mod styles;
pub mod view;

#[cfg(target_arch = "wasm32")]
mod dom;

pub use render::{generate_html, generate_page};
pub use view::{CalculatorView, PopulationPlan, ViewState};

#[cfg(target_arch = "wasm32")]
pub use dom::{mount_calculator, MountHandle};

#[cfg(not(target_arch = "wasm32"))]
pub fn mount_calculator(
    _: &str,
    _: &str,
    _: wasm_bindgen::JsValue,
) -> Result<(), wasm_bindgen::JsValue> {
    Err(wasm_bindgen::JsValue::from_str(
        "medcalc-ui can only mount calculators on the wasm32 target",
    ))
}
