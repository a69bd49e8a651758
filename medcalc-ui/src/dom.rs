//! Browser mount: renders a card into the page, wires delegated listeners
//! and drives population from a prefetched FHIR bundle.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use medcalc_core::form::FieldState;
use medcalc_core::{CalcConfig, Registry, UnitConverter};
use medcalc_fhir::autofill::Fetched;
use medcalc_fhir::{run_population, BundleSource, Lifetime};
use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{console, Document, Element, Event, HtmlInputElement, HtmlSelectElement, Window};

use crate::render::{self, STALENESS_CONTAINER_ID, SUMMARY_CONTAINER_ID};
use crate::styles;
use crate::view::CalculatorView;

type Listener = Closure<dyn FnMut(Event)>;
type SharedView = Rc<RefCell<CalculatorView>>;

/// Live card returned to JavaScript; `unmount()` tears it down.
#[wasm_bindgen]
pub struct MountHandle {
    view: SharedView,
    lifetime: Lifetime,
    container: Element,
    listeners: Vec<(&'static str, Listener)>,
}

#[wasm_bindgen]
impl MountHandle {
    pub fn unmount(&mut self) {
        // Cancelling first blocks every later write even if the view is busy.
        self.lifetime.cancel();
        match self.view.try_borrow_mut() {
            Ok(mut view) => view.teardown(),
            Err(_) => tracing::warn!("calculator view busy during unmount; population cancelled"),
        }
        for (event, listener) in self.listeners.drain(..) {
            let _ = self
                .container
                .remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref());
        }
        self.container.set_inner_html("");
    }
}

fn find(container: &Element, selector: &str) -> Option<Element> {
    container.query_selector(selector).ok().flatten()
}

fn set_html(container: &Element, selector: &str, html: &str) {
    if let Some(element) = find(container, selector) {
        element.set_inner_html(html);
    }
}

/// Push the view's computed fragments into the card.
fn render_view(container: &Element, view: &CalculatorView) {
    if let Some(result_box) = find(container, &format!("#{}", view.result_id())) {
        let result = view.result_html();
        let classes = result_box.class_list();
        let toggled = match &result {
            Some(_) => classes.add_1("show"),
            None => classes.remove_1("show"),
        };
        if let Err(err) = toggled {
            console::error_1(&err);
        }
        if let Ok(Some(content)) = result_box.query_selector(".ui-result-content") {
            content.set_inner_html(result.as_deref().unwrap_or_default());
        }
    }
    set_html(container, &format!("#{}", view.error_container_id()), &view.error_html());
    set_html(container, &format!("#{STALENESS_CONTAINER_ID}"), &view.staleness_html());
    set_html(container, &format!("#{SUMMARY_CONTAINER_ID}"), &view.summary_html());
}

/// Copy form state back into the controls after programmatic writes.
fn sync_inputs(container: &Element, view: &CalculatorView) {
    let form = view.form();
    for key in form.keys() {
        match form.field(key) {
            Some(FieldState::Number(field)) => {
                if let Some(input) = find(container, &format!("#{key}"))
                    .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
                {
                    input.set_value(field.raw());
                }
                if let (Some(unit), Some(button)) = (
                    field.display_unit(),
                    find(container, &format!(".unit-toggle-btn[data-input=\"{key}\"]")),
                ) {
                    button.set_text_content(Some(unit));
                }
            }
            Some(FieldState::Choice { selected, .. }) => {
                if let Some(select) = find(container, &format!("select#{key}"))
                    .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
                {
                    select.set_value(selected.as_deref().unwrap_or_default());
                    continue;
                }
                let Ok(radios) = container.query_selector_all(&format!("input[name=\"{key}\"]")) else {
                    continue;
                };
                for index in 0..radios.length() {
                    if let Some(radio) = radios
                        .get(index)
                        .and_then(|node| node.dyn_into::<HtmlInputElement>().ok())
                    {
                        radio.set_checked(selected.as_deref() == Some(radio.value().as_str()));
                    }
                }
            }
            Some(FieldState::Flag { checked }) => {
                if let Some(input) = find(container, &format!("#{key}"))
                    .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
                {
                    input.set_checked(*checked);
                }
            }
            None => {}
        }
    }
}

fn on_field_event(view: &SharedView, container: &Element, event: Event) {
    let Some(target) = event.target() else {
        return;
    };
    let Ok(mut view) = view.try_borrow_mut() else {
        return;
    };

    let outcome = if let Some(select) = target.dyn_ref::<HtmlSelectElement>() {
        view.select(&select.id(), &select.value())
    } else if let Some(input) = target.dyn_ref::<HtmlInputElement>() {
        match input.type_().as_str() {
            "radio" if input.checked() => view.select(&input.name(), &input.value()),
            "radio" => Ok(()),
            "checkbox" => view.check(&input.id(), input.checked()),
            _ => view.set_value(&input.id(), &input.value()),
        }
    } else {
        return;
    };

    if let Err(err) = outcome {
        console::warn_1(&JsValue::from_str(&err.to_string()));
    }
    render_view(container, &view);
}

fn on_click(view: &SharedView, container: &Element, event: Event) {
    let Some(button) = event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .and_then(|el| el.closest(".unit-toggle-btn").ok().flatten())
    else {
        return;
    };
    let Some(key) = button.get_attribute("data-input") else {
        return;
    };
    let Ok(mut view) = view.try_borrow_mut() else {
        return;
    };
    if view.cycle_unit(&key).is_some() {
        sync_inputs(container, &view);
        render_view(container, &view);
    }
}

fn listen(
    container: &Element,
    event: &'static str,
    view: &SharedView,
    handler: fn(&SharedView, &Element, Event),
) -> Result<(&'static str, Listener), JsValue> {
    let view = view.clone();
    let target = container.clone();
    let listener = Closure::wrap(Box::new(move |event: Event| {
        handler(&view, &target, event);
    }) as Box<dyn FnMut(Event)>);
    container.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())?;
    Ok((event, listener))
}

/// Apply outcomes that arrived while the view was borrowed elsewhere, then
/// the newest one.
fn apply_pending(view: &mut CalculatorView, container: &Element, pending: &mut Vec<Fetched>) {
    let writes: usize = pending.drain(..).map(|fetched| view.apply(fetched)).sum();
    if writes > 0 {
        sync_inputs(container, view);
    }
    render_view(container, view);
}

fn spawn_population(view: SharedView, container: Element, source: BundleSource) {
    wasm_bindgen_futures::spawn_local(async move {
        let Some(plan) = view.borrow_mut().begin_population() else {
            return;
        };
        let mut pending = Vec::new();
        let summary = run_population(
            &source,
            &plan.requirements,
            &plan.converter,
            &plan.options,
            plan.registration,
            |fetched| {
                pending.push(fetched);
                match view.try_borrow_mut() {
                    Ok(mut view) => apply_pending(&mut view, &container, &mut pending),
                    Err(_) => tracing::warn!(
                        deferred = pending.len(),
                        "calculator view busy; deferring population writes"
                    ),
                }
            },
        )
        .await;

        match view.try_borrow_mut() {
            Ok(mut view) => {
                apply_pending(&mut view, &container, &mut pending);
                view.finish_population(summary);
                render_view(&container, &view);
            }
            Err(_) => tracing::warn!(
                dropped = pending.len(),
                "calculator view busy when population finished"
            ),
        }
    });
}

#[wasm_bindgen]
pub fn mount_calculator(
    selector: &str,
    calculator_id: &str,
    bundle: JsValue,
) -> Result<MountHandle, JsValue> {
    let window: Window = web_sys::window().ok_or_else(|| JsValue::from_str("No window available"))?;
    let document: Document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Cannot access document"))?;
    styles::ensure_styles(&document)?;

    let container: Element = document
        .query_selector(selector)
        .map_err(|err| JsValue::from_str(&format!("Invalid selector: {err:?}")))?
        .ok_or_else(|| JsValue::from_str("No element matches selector"))?;

    let calculator = Registry::standard()
        .get(calculator_id)
        .map_err(|err| JsValue::from_str(&err.user_message()))?;
    container.set_inner_html(&render::generate_html(calculator.as_ref()));

    let view = Rc::new(RefCell::new(CalculatorView::new(
        calculator,
        Arc::new(UnitConverter::standard()),
        CalcConfig::default(),
    )));
    {
        let mut view = view.borrow_mut();
        view.initialize();
        sync_inputs(&container, &view);
        render_view(&container, &view);
    }

    let listeners = vec![
        listen(&container, "input", &view, on_field_event)?,
        listen(&container, "change", &view, on_field_event)?,
        listen(&container, "click", &view, on_click)?,
    ];

    if !bundle.is_undefined() && !bundle.is_null() {
        let bundle: serde_json::Value = from_value(bundle)?;
        match BundleSource::from_value(&bundle) {
            Ok(source) => spawn_population(view.clone(), container.clone(), source),
            Err(err) => console::warn_1(&JsValue::from_str(&err.to_string())),
        }
    }

    let lifetime = view.borrow().lifetime().clone();
    Ok(MountHandle {
        view,
        lifetime,
        container,
        listeners,
    })
}
