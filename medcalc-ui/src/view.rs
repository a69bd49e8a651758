//! Per-card lifecycle: form state, FHIR population, recalculation and
//! teardown.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::AbortRegistration;
use medcalc_core::form::FormState;
use medcalc_core::{
    Assessment, CalcConfig, CalcError, Calculator, DataRequirement, UnitConverter,
};
use medcalc_fhir::autofill::{FetchOptions, Fetched};
use medcalc_fhir::{
    run_population, FhirSource, Lifetime, Observed, PopulationSummary, Prefill,
    StalenessTracker,
};

use crate::{builder, render};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Rendered,
    Initializing,
    Populating,
    Calculating,
    TornDown,
}

/// Work handed out by [`CalculatorView::begin_population`].
pub struct PopulationPlan {
    pub requirements: Vec<DataRequirement>,
    pub converter: Arc<UnitConverter>,
    pub options: FetchOptions,
    pub registration: AbortRegistration,
}

/// One mounted calculator card. Every write goes through the view so that
/// nothing touches the form once it is torn down.
pub struct CalculatorView {
    calculator: Arc<dyn Calculator>,
    converter: Arc<UnitConverter>,
    config: CalcConfig,
    form: FormState,
    tracker: StalenessTracker,
    state: ViewState,
    assessment: Assessment,
    lifetime: Lifetime,
    registration: Option<AbortRegistration>,
    summary: Option<PopulationSummary>,
    clock: Option<DateTime<Utc>>,
}

impl CalculatorView {
    pub fn new(
        calculator: Arc<dyn Calculator>,
        converter: Arc<UnitConverter>,
        config: CalcConfig,
    ) -> Self {
        let (lifetime, registration) = Lifetime::new();
        let mut tracker = StalenessTracker::new(&config);
        tracker.set_container(render::STALENESS_CONTAINER_ID);
        Self {
            calculator,
            converter,
            config,
            form: FormState::default(),
            tracker,
            state: ViewState::Rendered,
            assessment: Assessment::Empty,
            lifetime,
            registration: Some(registration),
            summary: None,
            clock: None,
        }
    }

    /// Freeze "now" for patient ages and staleness.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.tracker.set_now(now);
        self.clock = Some(now);
        self
    }

    /// Build the form from the calculator's sections and compute once.
    pub fn initialize(&mut self) {
        if self.is_torn_down() {
            return;
        }
        self.state = ViewState::Initializing;
        self.form = FormState::from_sections(self.calculator.sections());
        self.recalculate();
    }

    fn is_torn_down(&self) -> bool {
        self.state == ViewState::TornDown
    }

    fn edit<F>(&mut self, key: &str, write: F) -> Result<(), CalcError>
    where
        F: FnOnce(&mut FormState) -> Result<(), CalcError>,
    {
        if self.is_torn_down() {
            return Ok(());
        }
        write(&mut self.form)?;
        self.tracker.clear_field(&format!("#{key}"));
        self.recalculate();
        Ok(())
    }

    /// User edit of any field. A manual value replaces an auto-populated
    /// one, so its staleness warning goes away.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<(), CalcError> {
        self.edit(key, |form| form.set_value(key, raw))
    }

    pub fn select(&mut self, key: &str, value: &str) -> Result<(), CalcError> {
        self.edit(key, |form| form.select(key, value))
    }

    pub fn check(&mut self, key: &str, checked: bool) -> Result<(), CalcError> {
        self.edit(key, |form| form.check(key, checked))
    }

    /// Advance the unit toggle of `key`. Returns the unit now displayed.
    pub fn cycle_unit(&mut self, key: &str) -> Option<String> {
        if self.is_torn_down() {
            return None;
        }
        let unit = self.form.cycle_unit(key, &self.converter)?;
        self.recalculate();
        Some(unit)
    }

    /// Hand out the requirements and the abort registration. `None` once
    /// population has started or the view is gone.
    pub fn begin_population(&mut self) -> Option<PopulationPlan> {
        if self.is_torn_down() {
            return None;
        }
        let registration = self.registration.take()?;
        let mut options = FetchOptions::from_config(&self.config);
        if let Some(now) = self.clock {
            options.today = now.date_naive();
        }
        self.state = ViewState::Populating;
        Some(PopulationPlan {
            requirements: self.calculator.requirements().to_vec(),
            converter: Arc::clone(&self.converter),
            options,
            registration,
        })
    }

    /// Write one fetched requirement into the form. Returns the number of
    /// fields changed; zero once the view is cancelled.
    pub fn apply(&mut self, fetched: Fetched) -> usize {
        if self.is_torn_down() || self.lifetime.is_cancelled() {
            return 0;
        }

        let mut writes = 0;
        for prefill in fetched.prefills {
            let (key, observed, written) = match prefill {
                Prefill::Number {
                    field,
                    value,
                    unit,
                    observed,
                } => {
                    let written =
                        self.form
                            .set_observed(&field, value, unit.as_deref(), &self.converter);
                    (field, observed, written)
                }
                Prefill::Choice {
                    group,
                    value,
                    observed,
                } => {
                    let written = match self.form.select(&group, &value) {
                        Ok(()) => true,
                        Err(err) => {
                            tracing::warn!(calculator = self.calculator.id(), %err, "prefill skipped");
                            false
                        }
                    };
                    (group, observed, written)
                }
                Prefill::Affirm { target, observed } => {
                    let written = self.form.affirm(&target);
                    (target, observed, written)
                }
                Prefill::Raise { group, value } => {
                    let written = self.form.raise(&group, &value).unwrap_or_else(|err| {
                        tracing::warn!(calculator = self.calculator.id(), %err, "prefill skipped");
                        false
                    });
                    (group, None, written)
                }
            };
            if written {
                writes += 1;
                if let Some(observed) = observed {
                    self.track(&key, &observed);
                }
            }
        }

        self.recalculate();
        writes
    }

    fn track(&mut self, key: &str, observed: &Observed) {
        self.tracker.track_observation(
            &format!("#{key}"),
            &observed.observation,
            &observed.code,
            Some(&observed.label),
        );
    }

    pub fn finish_population(&mut self, summary: PopulationSummary) {
        if self.is_torn_down() {
            return;
        }
        tracing::debug!(
            calculator = self.calculator.id(),
            loaded = summary.loaded.len(),
            missing = summary.missing.len(),
            cancelled = summary.cancelled,
            "population finished"
        );
        self.summary = Some(summary);
        self.state = ViewState::Calculating;
        self.recalculate();
    }

    /// Fetch every requirement from `source` and apply each as it arrives.
    pub async fn populate<S>(&mut self, source: &S) -> Option<PopulationSummary>
    where
        S: FhirSource + ?Sized,
    {
        let plan = self.begin_population()?;
        let summary = run_population(
            source,
            &plan.requirements,
            &plan.converter,
            &plan.options,
            plan.registration,
            |fetched| {
                self.apply(fetched);
            },
        )
        .await;
        self.finish_population(summary.clone());
        Some(summary)
    }

    /// Read the form, validate and run the formula.
    pub fn recalculate(&mut self) -> &Assessment {
        if !self.is_torn_down() {
            let input = self.form.collect(&self.converter);
            self.assessment = self.calculator.assess(&input);
            if self.state != ViewState::Populating {
                self.state = ViewState::Calculating;
            }
        }
        &self.assessment
    }

    pub fn calculator(&self) -> &dyn Calculator {
        self.calculator.as_ref()
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    pub fn tracker(&self) -> &StalenessTracker {
        &self.tracker
    }

    pub fn summary(&self) -> Option<&PopulationSummary> {
        self.summary.as_ref()
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    pub fn result_id(&self) -> String {
        render::result_id(self.calculator.id())
    }

    pub fn error_container_id(&self) -> String {
        render::error_container_id(self.calculator.id())
    }

    /// Result box body, `None` while hidden.
    pub fn result_html(&self) -> Option<String> {
        render::result_body(&self.assessment).map(|markup| markup.into_string())
    }

    pub fn error_html(&self) -> String {
        render::error_body(&self.assessment).into_string()
    }

    pub fn staleness_html(&self) -> String {
        builder::staleness_warning(self.tracker.stale_items(), self.tracker.threshold_days())
            .into_string()
    }

    pub fn summary_html(&self) -> String {
        self.summary
            .as_ref()
            .map(|summary| builder::data_summary(summary).into_string())
            .unwrap_or_default()
    }

    /// Cancel population; the view accepts no further writes.
    pub fn teardown(&mut self) {
        self.lifetime.cancel();
        self.registration = None;
        self.state = ViewState::TornDown;
    }
}

impl Drop for CalculatorView {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use futures::executor::block_on;
    use medcalc_core::form::FieldState;
    use medcalc_core::library;
    use medcalc_fhir::{BundleSource, FhirError};
    use serde_json::{json, Value};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().expect("now")
    }

    fn view(calculator: Arc<dyn Calculator>) -> CalculatorView {
        let mut view = CalculatorView::new(
            calculator,
            Arc::new(UnitConverter::standard()),
            CalcConfig::default(),
        )
        .with_clock(now());
        view.initialize();
        view
    }

    fn crcl_view() -> CalculatorView {
        view(Arc::new(library::crcl::calculator()))
    }

    fn bundle() -> BundleSource {
        BundleSource::from_value(&json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {
                    "resourceType": "Patient",
                    "id": "p1",
                    "gender": "female",
                    "birthDate": "1958-04-10"
                }},
                {"resource": {
                    "resourceType": "Observation",
                    "id": "w",
                    "code": {"coding": [{"system": "http://loinc.org", "code": "29463-7"}]},
                    "valueQuantity": {"value": 80, "unit": "kg"},
                    "effectiveDateTime": "2024-05-20T08:00:00Z"
                }},
                {"resource": {
                    "resourceType": "Observation",
                    "id": "cr",
                    "code": {"coding": [{"system": "http://loinc.org", "code": "2160-0"}]},
                    "valueQuantity": {"value": 1.0, "unit": "mg/dL"},
                    "effectiveDateTime": "2023-01-15T08:00:00Z"
                }}
            ]
        }))
        .expect("bundle")
    }

    fn number(view: &CalculatorView, key: &str) -> Option<f64> {
        view.form()
            .collect(&UnitConverter::standard())
            .number(key)
    }

    struct FailingSource;

    #[async_trait(?Send)]
    impl FhirSource for FailingSource {
        async fn search(&self, _query: &str) -> Result<Value, FhirError> {
            Err(FhirError::Status(500))
        }

        async fn read_patient(&self) -> Result<Value, FhirError> {
            Err(FhirError::Request("offline".into()))
        }
    }

    /// Tears the view's lifetime down on the first request it serves.
    struct CancellingSource {
        inner: BundleSource,
        lifetime: Lifetime,
    }

    #[async_trait(?Send)]
    impl FhirSource for CancellingSource {
        async fn search(&self, query: &str) -> Result<Value, FhirError> {
            self.lifetime.cancel();
            self.inner.search(query).await
        }

        async fn read_patient(&self) -> Result<Value, FhirError> {
            self.lifetime.cancel();
            self.inner.read_patient().await
        }
    }

    #[test]
    fn heart_score_defaults_to_zero() {
        let view = view(Arc::new(library::heart::calculator()));
        let result = view.assessment().result().expect("default result");
        assert_eq!(result.value, 0.0);
        assert_eq!(view.state(), ViewState::Calculating);
    }

    #[test]
    fn population_writes_and_tracks_staleness() {
        let mut view = crcl_view();
        let summary = block_on(view.populate(&bundle())).expect("summary");

        assert_eq!(summary.loaded, vec!["Age", "Sex", "Weight", "Creatinine"]);
        assert_eq!(number(&view, "crcl-age"), Some(66.0));
        assert_eq!(number(&view, "crcl-weight"), Some(80.0));
        assert!(view.assessment().result().is_some());

        let stale = view.tracker().stale_items();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].selector, "#crcl-creatinine");
        assert!(view.staleness_html().contains("Stale Data Warning"));
        assert!(view.summary_html().contains("Loaded from EHR:"));

        view.set_value("crcl-creatinine", "1.2").expect("manual edit");
        assert_eq!(view.tracker().stale_count(), 0);
    }

    #[test]
    fn failing_source_leaves_manual_entry_working() {
        let mut view = crcl_view();
        let summary = block_on(view.populate(&FailingSource)).expect("summary");
        assert!(summary.loaded.is_empty());
        assert_eq!(summary.missing.len(), 4);
        assert_eq!(view.assessment(), &Assessment::Empty);

        view.set_value("crcl-age", "60").expect("age");
        view.set_value("crcl-weight", "72").expect("weight");
        view.set_value("crcl-creatinine", "1").expect("creatinine");
        assert!(view.result_html().is_some());
    }

    #[test]
    fn every_calculator_survives_a_failing_source() {
        for calculator in library::all() {
            let id = calculator.id().to_string();
            let mut view = view(calculator);
            let form = view.form().clone();
            let assessment = view.assessment().clone();

            let summary = block_on(view.populate(&FailingSource)).expect("summary");
            assert!(summary.loaded.is_empty(), "{id}");
            assert_eq!(view.form(), &form, "{id}");
            assert_eq!(view.assessment(), &assessment, "{id}");
            assert_eq!(view.tracker().stale_count(), 0, "{id}");
            assert_eq!(view.state(), ViewState::Calculating, "{id}");

            let key = view.calculator().sections()[0].inputs[0].key().to_string();
            let edited = match form.field(&key) {
                Some(FieldState::Number(_)) => view.set_value(&key, "1"),
                Some(FieldState::Choice { options, selected }) => {
                    let other = options
                        .iter()
                        .find(|option| Some(*option) != selected.as_ref())
                        .expect("alternative option");
                    view.select(&key, other)
                }
                Some(FieldState::Flag { checked }) => view.check(&key, !checked),
                None => panic!("{id}: no field {key}"),
            };
            edited.expect("manual edit");
            assert_ne!(view.form().field(&key), form.field(&key), "{id}");
        }
    }

    #[test]
    fn observation_driven_criterion_reports_staleness() {
        let source = BundleSource::from_value(&json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {
                    "resourceType": "Observation",
                    "id": "rr",
                    "code": {"coding": [{"system": "http://loinc.org", "code": "9279-1"}]},
                    "valueQuantity": {"value": 26, "unit": "/min"},
                    "effectiveDateTime": "2022-01-01T08:00:00Z"
                }}
            ]
        }))
        .expect("bundle");
        let mut view = view(Arc::new(library::qsofa::calculator()));
        block_on(view.populate(&source));

        assert_eq!(
            view.form().field("qsofa-rr"),
            Some(&FieldState::Choice {
                options: vec!["0".into(), "1".into()],
                selected: Some("1".into()),
            })
        );
        assert_eq!(view.assessment().result().map(|r| r.value), Some(1.0));
        let stale = view.tracker().stale_items();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].selector, "#qsofa-rr");
        assert_eq!(stale[0].label, "Respiratory Rate");

        view.select("qsofa-rr", "0").expect("manual answer");
        assert_eq!(view.tracker().stale_count(), 0);
    }

    #[test]
    fn partial_invalid_input_shows_error() {
        let mut view = crcl_view();
        view.set_value("crcl-weight", "900").expect("weight");
        assert!(matches!(view.assessment(), Assessment::Invalid { .. }));
        assert!(view.error_html().contains("ui-alert-warning"));
        assert!(view.result_html().is_none());
    }

    #[test]
    fn cancelled_before_population_writes_nothing() {
        let mut view = crcl_view();
        view.lifetime().cancel();
        let summary = block_on(view.populate(&bundle())).expect("summary");
        assert!(summary.cancelled);
        assert_eq!(number(&view, "crcl-age"), None);
        assert_eq!(number(&view, "crcl-weight"), None);
    }

    #[test]
    fn cancellation_mid_flight_blocks_completed_writes() {
        let mut view = crcl_view();
        let source = CancellingSource {
            inner: bundle(),
            lifetime: view.lifetime().clone(),
        };
        block_on(view.populate(&source));
        assert_eq!(number(&view, "crcl-age"), None);
        assert_eq!(number(&view, "crcl-weight"), None);
        assert_eq!(view.tracker().stale_count(), 0);
    }

    #[test]
    fn torn_down_view_ignores_writes() {
        let mut view = crcl_view();
        view.teardown();
        assert!(view.begin_population().is_none());
        view.set_value("crcl-age", "60").expect("ignored");
        assert_eq!(number(&view, "crcl-age"), None);
        assert_eq!(view.state(), ViewState::TornDown);
    }

    #[test]
    fn population_runs_once() {
        let mut view = crcl_view();
        assert!(view.begin_population().is_some());
        assert!(view.begin_population().is_none());
    }

    #[test]
    fn unit_cycle_converts_displayed_value() {
        let mut view = crcl_view();
        view.set_value("crcl-weight", "70").expect("weight");
        assert_eq!(view.cycle_unit("crcl-weight").as_deref(), Some("lbs"));
        let weight = number(&view, "crcl-weight").expect("standard weight");
        assert!((weight - 70.0).abs() < 0.1);
    }
}
