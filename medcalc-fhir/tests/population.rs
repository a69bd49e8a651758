use std::fs;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::executor::block_on;
use medcalc_core::codes::{loinc, rxnorm, snomed};
use medcalc_core::library;
use medcalc_core::{Calculator, UnitConverter};
use medcalc_fhir::autofill::{fetch_requirement, FetchOptions};
use medcalc_fhir::{
    get_medication_requests, get_most_recent_observation, get_observation, get_patient,
    get_patient_conditions, run_population, BundleSource, FhirError, FhirSource, Lifetime,
    Prefill,
};
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn bundle_source() -> BundleSource {
    let bundle = fs::read_to_string(fixture_path("patient_bundle.json")).expect("read bundle");
    BundleSource::from_json(&bundle).expect("parse bundle")
}

fn converter() -> UnitConverter {
    UnitConverter::standard()
}

fn options() -> FetchOptions {
    FetchOptions {
        observation_count: 5,
        today: NaiveDate::from_ymd_opt(2024, 6, 1).expect("date"),
    }
}

struct OfflineSource;

#[async_trait(?Send)]
impl FhirSource for OfflineSource {
    async fn search(&self, _query: &str) -> Result<Value, FhirError> {
        Err(FhirError::Status(503))
    }

    async fn read_patient(&self) -> Result<Value, FhirError> {
        Err(FhirError::Request("connection refused".into()))
    }
}

#[test]
fn most_recent_heart_rate_is_selected() {
    let source = bundle_source();
    let obs = block_on(get_most_recent_observation(&source, loinc::HEART_RATE)).expect("hr");
    assert_eq!(obs.id(), Some("hr-new"));
    assert_eq!(obs.value_quantity().map(|q| q.value), Some(88.0));
}

#[test]
fn single_fetch_returns_first_entry() {
    let source = bundle_source();
    let obs = block_on(get_observation(&source, loinc::WEIGHT)).expect("weight");
    assert_eq!(obs.value_quantity().and_then(|q| q.unit), Some("[lb_av]".to_string()));
    assert!(block_on(get_observation(&source, loinc::GLUCOSE)).is_none());
}

#[test]
fn only_active_conditions_are_returned() {
    let source = bundle_source();
    let conditions = block_on(get_patient_conditions(
        &source,
        &[snomed::MYOCARDIAL_INFARCTION, snomed::DIABETES],
    ));
    assert_eq!(conditions.len(), 1);
    assert!(conditions[0].has_code(snomed::DIABETES));
}

#[test]
fn medication_requests_match_rxnorm() {
    let source = bundle_source();
    let meds = block_on(get_medication_requests(&source, &[rxnorm::WARFARIN, rxnorm::ASPIRIN]));
    assert_eq!(meds.len(), 1);
    assert_eq!(meds[0].display().as_deref(), Some("Warfarin"));
}

#[test]
fn panel_component_reads_systolic() {
    let source = bundle_source();
    let calc = library::map::calculator();
    let fetched = block_on(fetch_requirement(
        &source,
        0,
        &calc.requirements()[0],
        &converter(),
        &options(),
    ));
    assert!(fetched.found);
    match &fetched.prefills[0] {
        Prefill::Number { value, unit, .. } => {
            assert_eq!(*value, 150.0);
            assert_eq!(unit.as_deref(), Some("mmHg"));
        }
        other => panic!("unexpected prefill {other:?}"),
    }
}

#[test]
fn crcl_population_resolves_every_requirement() {
    let source = bundle_source();
    let calc = library::crcl::calculator();
    let (_lifetime, registration) = Lifetime::new();
    let mut prefills = Vec::new();
    let summary = block_on(run_population(
        &source,
        calc.requirements(),
        &converter(),
        &options(),
        registration,
        |fetched| prefills.extend(fetched.prefills),
    ));

    assert_eq!(summary.loaded, vec!["Age", "Sex", "Weight", "Creatinine"]);
    assert!(summary.missing.is_empty());
    assert!(prefills.contains(&Prefill::Choice {
        group: "crcl-gender".into(),
        value: "male".into(),
        observed: None,
    }));
    assert!(prefills.iter().any(|prefill| matches!(
        prefill,
        Prefill::Number { field, value, .. } if field == "crcl-age" && *value == 66.0
    )));
}

#[test]
fn charlson_summary_matches_golden() {
    let source = bundle_source();
    let calc = library::charlson::calculator();
    let (_lifetime, registration) = Lifetime::new();
    let mut raises = Vec::new();
    let summary = block_on(run_population(
        &source,
        calc.requirements(),
        &converter(),
        &options(),
        registration,
        |fetched| {
            raises.extend(
                fetched
                    .prefills
                    .into_iter()
                    .filter(|prefill| matches!(prefill, Prefill::Raise { .. })),
            )
        },
    ));

    assert_eq!(raises.len(), 3);

    let actual = serde_json::to_value(&summary).expect("serialize summary");
    let expected: Value = serde_json::from_str(
        &fs::read_to_string(fixture_path("charlson_population_summary.json")).expect("read golden"),
    )
    .expect("golden json");
    assert_eq!(actual, expected);
}

#[test]
fn offline_source_degrades_to_missing() {
    let calc = library::crcl::calculator();
    assert!(block_on(get_patient(&OfflineSource)).is_none());

    let (_lifetime, registration) = Lifetime::new();
    let mut writes = 0;
    let summary = block_on(run_population(
        &OfflineSource,
        calc.requirements(),
        &converter(),
        &options(),
        registration,
        |fetched| writes += fetched.prefills.len(),
    ));
    assert_eq!(writes, 0);
    assert!(summary.loaded.is_empty());
    assert_eq!(summary.missing.len(), 4);
}

#[test]
fn cancelled_population_delivers_nothing() {
    let source = bundle_source();
    let calc = library::crcl::calculator();
    let (lifetime, registration) = Lifetime::new();
    lifetime.cancel();

    let mut delivered = 0;
    let summary = block_on(run_population(
        &source,
        calc.requirements(),
        &converter(),
        &options(),
        registration,
        |_| delivered += 1,
    ));
    assert_eq!(delivered, 0);
    assert!(summary.cancelled);
}

#[test]
fn cancelling_mid_flight_stops_delivery() {
    let source = bundle_source();
    let calc = library::charlson::calculator();
    let (lifetime, registration) = Lifetime::new();

    let mut delivered = 0;
    let summary = block_on(run_population(
        &source,
        calc.requirements(),
        &converter(),
        &options(),
        registration,
        |_| {
            delivered += 1;
            lifetime.cancel();
        },
    ));
    assert_eq!(delivered, 1);
    assert!(summary.cancelled);
}

fn single_observation(code: &str, value: f64, unit: &str) -> BundleSource {
    BundleSource::from_value(&serde_json::json!({
        "resourceType": "Bundle",
        "entry": [{"resource": {
            "resourceType": "Observation",
            "id": "obs",
            "code": {"coding": [{"system": "http://loinc.org", "code": code}]},
            "valueQuantity": {"value": value, "unit": unit},
            "effectiveDateTime": "2024-05-30T08:00:00Z"
        }}]
    }))
    .expect("bundle")
}

fn flag_prefills(source: &BundleSource, calc: &dyn Calculator, index: usize) -> (bool, Vec<Prefill>) {
    let fetched = block_on(fetch_requirement(
        source,
        index,
        &calc.requirements()[index],
        &converter(),
        &options(),
    ));
    (fetched.found, fetched.prefills)
}

#[test]
fn fahrenheit_temperature_is_converted_before_threshold() {
    let centor = library::centor::calculator();
    let index = centor
        .requirements()
        .iter()
        .position(|requirement| requirement.label() == "Temperature")
        .expect("temperature requirement");

    let (found, prefills) =
        flag_prefills(&single_observation("8310-5", 98.6, "[degF]"), &centor, index);
    assert!(found);
    assert!(prefills.is_empty());

    let (_, prefills) = flag_prefills(&single_observation("8310-5", 102.2, "[degF]"), &centor, index);
    assert!(matches!(
        &prefills[..],
        [Prefill::Affirm { target, observed: Some(observed) }]
            if target == "centor-fever" && observed.code == "8310-5"
    ));
}

#[test]
fn bun_in_mmol_per_litre_is_flagged() {
    let curb = library::curb65::calculator();
    let (found, prefills) = flag_prefills(&single_observation("3094-0", 10.0, "mmol/L"), &curb, 0);
    assert!(found);
    assert!(matches!(
        &prefills[..],
        [Prefill::Affirm { target, .. }] if target == "curb-bun"
    ));

    let (_, prefills) = flag_prefills(&single_observation("3094-0", 5.0, "mmol/L"), &curb, 0);
    assert!(prefills.is_empty());
}

#[test]
fn unconvertible_threshold_unit_is_skipped() {
    let curb = library::curb65::calculator();
    for unit in ["g/L", ""] {
        let (found, prefills) = flag_prefills(&single_observation("3094-0", 40.0, unit), &curb, 0);
        assert!(!found, "{unit}");
        assert!(prefills.is_empty(), "{unit}");
    }
}
