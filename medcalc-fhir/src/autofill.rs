//! Concurrent, cancellable resolution of calculator data requirements into
//! form writes.

use chrono::{NaiveDate, Utc};
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use futures::stream::{FuturesUnordered, StreamExt};
use medcalc_core::calculator::AgeTarget;
use medcalc_core::{CalcConfig, CanonicalUnit, DataRequirement, UnitConverter};
use serde::Serialize;

use crate::access::{
    get_patient, get_patient_conditions, most_recent, search_observations,
};
use crate::resource::{Gender, Observation, Quantity};
use crate::source::FhirSource;

/// Cancellation token owned by one calculator view.
#[derive(Debug, Clone)]
pub struct Lifetime {
    handle: AbortHandle,
}

impl Lifetime {
    pub fn new() -> (Self, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        (Self { handle }, registration)
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }
}

/// Observation a write was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
    pub observation: Observation,
    pub code: String,
    pub label: String,
}

impl Observed {
    fn new(observation: Observation, code: &str, label: &str) -> Self {
        Self {
            observation,
            code: code.to_string(),
            label: label.to_string(),
        }
    }
}

/// A single write into the form. `observed` is set for observation-backed
/// writes and drives staleness.
#[derive(Debug, Clone, PartialEq)]
pub enum Prefill {
    /// Numeric input value in the unit the source reported.
    Number {
        field: String,
        value: f64,
        unit: Option<String>,
        observed: Option<Observed>,
    },
    /// Select an option of a choice group.
    Choice {
        group: String,
        value: String,
        observed: Option<Observed>,
    },
    /// Check a checkbox or answer "yes".
    Affirm {
        target: String,
        observed: Option<Observed>,
    },
    /// Select `value` only when it outranks the current option.
    Raise { group: String, value: String },
}

/// Outcome of one requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub index: usize,
    pub label: &'static str,
    /// Data was found, even if it produced no write.
    pub found: bool,
    pub prefills: Vec<Prefill>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub observation_count: u32,
    pub today: NaiveDate,
}

impl FetchOptions {
    pub fn from_config(config: &CalcConfig) -> Self {
        Self {
            observation_count: config.observation_count,
            today: Utc::now().date_naive(),
        }
    }
}

/// Labels of the requirements that loaded and that found nothing, in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PopulationSummary {
    pub loaded: Vec<String>,
    pub missing: Vec<String>,
    pub cancelled: bool,
}

impl PopulationSummary {
    fn from_outcomes(mut outcomes: Vec<(usize, &'static str, bool)>, cancelled: bool) -> Self {
        outcomes.sort_by_key(|(index, _, _)| *index);
        let mut summary = Self {
            cancelled,
            ..Self::default()
        };
        for (_, label, found) in &outcomes {
            if *found && !summary.loaded.iter().any(|known| known == label) {
                summary.loaded.push(label.to_string());
            }
        }
        for (_, label, found) in &outcomes {
            if !*found
                && !summary.loaded.iter().any(|known| known == label)
                && !summary.missing.iter().any(|known| known == label)
            {
                summary.missing.push(label.to_string());
            }
        }
        summary
    }
}

async fn latest<S>(source: &S, code: &str, options: &FetchOptions) -> Option<Observation>
where
    S: FhirSource + ?Sized,
{
    most_recent(search_observations(source, code, options.observation_count).await)
}

fn observed_number(
    field: &str,
    label: &str,
    code: &str,
    observation: Observation,
    quantity: Quantity,
) -> Prefill {
    Prefill::Number {
        field: field.to_string(),
        value: quantity.value,
        unit: quantity.unit,
        observed: Some(Observed::new(observation, code, label)),
    }
}

/// `quantity` expressed in `canonical`; `None` when its unit is missing or
/// not convertible.
fn in_canonical(
    quantity: &Quantity,
    canonical: Option<CanonicalUnit>,
    converter: &UnitConverter,
    code: &str,
) -> Option<f64> {
    let Some(canonical) = canonical else {
        return Some(quantity.value);
    };
    let converted = quantity.unit.as_deref().and_then(|unit| {
        converter.convert(quantity.value, unit, canonical.unit, canonical.domain)
    });
    if converted.is_none() {
        tracing::warn!(
            code,
            unit = quantity.unit.as_deref().unwrap_or("none"),
            expected = canonical.unit,
            "observation unit not convertible, prefill skipped"
        );
    }
    converted
}

/// Latest observation for `code` with its value in `canonical`.
async fn latest_canonical<S>(
    source: &S,
    code: &str,
    canonical: Option<CanonicalUnit>,
    converter: &UnitConverter,
    options: &FetchOptions,
) -> Option<(Observation, f64)>
where
    S: FhirSource + ?Sized,
{
    let observation = latest(source, code, options).await?;
    let quantity = observation.quantity_for(code)?;
    let value = in_canonical(&quantity, canonical, converter, code)?;
    Some((observation, value))
}

/// Resolve one requirement against `source`. Thresholds are applied to
/// values converted with `converter`.
pub async fn fetch_requirement<S>(
    source: &S,
    index: usize,
    requirement: &DataRequirement,
    converter: &UnitConverter,
    options: &FetchOptions,
) -> Fetched
where
    S: FhirSource + ?Sized,
{
    let mut prefills = Vec::new();
    let found = match requirement {
        DataRequirement::Observation { code, field, label } => {
            match latest(source, code, options).await {
                Some(obs) => match obs.quantity_for(code) {
                    Some(quantity) => {
                        prefills.push(observed_number(field, label, code, obs, quantity));
                        true
                    }
                    None => false,
                },
                None => false,
            }
        }
        DataRequirement::PanelComponent {
            panel,
            component,
            field,
            label,
        } => {
            let from_panel = latest(source, panel, options).await.and_then(|obs| {
                obs.component_quantity(component)
                    .map(|quantity| (obs, quantity))
            });
            let resolved = match from_panel {
                Some(found) => Some(found),
                None => latest(source, component, options).await.and_then(|obs| {
                    obs.quantity_for(component).map(|quantity| (obs, quantity))
                }),
            };
            match resolved {
                Some((obs, quantity)) => {
                    prefills.push(observed_number(field, label, component, obs, quantity));
                    true
                }
                None => false,
            }
        }
        DataRequirement::ObservationFlag {
            code,
            id,
            label,
            canonical,
            when,
        } => match latest_canonical(source, code, *canonical, converter, options).await {
            Some((obs, value)) => {
                if when(value) {
                    prefills.push(Prefill::Affirm {
                        target: id.to_string(),
                        observed: Some(Observed::new(obs, code, label)),
                    });
                }
                true
            }
            None => false,
        },
        DataRequirement::ObservationChoice {
            code,
            group,
            label,
            canonical,
            pick,
        } => match latest_canonical(source, code, *canonical, converter, options).await {
            Some((obs, value)) => {
                prefills.push(Prefill::Choice {
                    group: group.to_string(),
                    value: pick(value).to_string(),
                    observed: Some(Observed::new(obs, code, label)),
                });
                true
            }
            None => false,
        },
        DataRequirement::PatientAge(target) => {
            let age = get_patient(source)
                .await
                .and_then(|patient| patient.age_on(options.today));
            if let Some(age) = age {
                match target {
                    AgeTarget::Field(field) => prefills.push(Prefill::Number {
                        field: field.to_string(),
                        value: f64::from(age),
                        unit: None,
                        observed: None,
                    }),
                    AgeTarget::Choice { group, pick } => prefills.push(Prefill::Choice {
                        group: group.to_string(),
                        value: pick(age).to_string(),
                        observed: None,
                    }),
                    AgeTarget::Flag { id, when } => {
                        if when(age) {
                            prefills.push(Prefill::Affirm {
                                target: id.to_string(),
                                observed: None,
                            });
                        }
                    }
                }
            }
            age.is_some()
        }
        DataRequirement::PatientGender {
            group,
            male,
            female,
        } => {
            let gender = get_patient(source).await.and_then(|patient| patient.gender());
            let value = match gender {
                Some(Gender::Male) => Some(*male),
                Some(Gender::Female) => Some(*female),
                _ => None,
            };
            if let Some(value) = value {
                prefills.push(Prefill::Choice {
                    group: group.to_string(),
                    value: value.to_string(),
                    observed: None,
                });
            }
            value.is_some()
        }
        DataRequirement::Condition {
            codes,
            target,
            value,
            ..
        } => {
            let conditions = get_patient_conditions(source, codes).await;
            if !conditions.is_empty() {
                prefills.push(match value {
                    Some(value) => Prefill::Raise {
                        group: target.to_string(),
                        value: value.to_string(),
                    },
                    None => Prefill::Affirm {
                        target: target.to_string(),
                        observed: None,
                    },
                });
            }
            !conditions.is_empty()
        }
    };

    Fetched {
        index,
        label: requirement.label(),
        found,
        prefills,
    }
}

/// Fetch every requirement concurrently and hand each outcome to `apply` as
/// soon as it completes. Once `registration` is aborted no further outcome
/// is delivered.
pub async fn run_population<S, F>(
    source: &S,
    requirements: &[DataRequirement],
    converter: &UnitConverter,
    options: &FetchOptions,
    registration: AbortRegistration,
    mut apply: F,
) -> PopulationSummary
where
    S: FhirSource + ?Sized,
    F: FnMut(Fetched),
{
    let pending: FuturesUnordered<_> = requirements
        .iter()
        .enumerate()
        .map(|(index, requirement)| {
            fetch_requirement(source, index, requirement, converter, options)
        })
        .collect();
    let mut stream = Abortable::new(pending, registration);

    let mut outcomes = Vec::with_capacity(requirements.len());
    while let Some(fetched) = stream.next().await {
        tracing::debug!(
            requirement = fetched.label,
            found = fetched.found,
            writes = fetched.prefills.len(),
            "requirement resolved"
        );
        outcomes.push((fetched.index, fetched.label, fetched.found));
        apply(fetched);
    }

    let cancelled = stream.is_aborted();
    if cancelled {
        tracing::debug!(completed = outcomes.len(), "population cancelled");
    }
    PopulationSummary::from_outcomes(outcomes, cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_keeps_declaration_order_and_dedupes() {
        let summary = PopulationSummary::from_outcomes(
            vec![(2, "Sex", true), (0, "Age", false), (1, "Sex", false), (3, "Weight", false)],
            false,
        );
        assert_eq!(summary.loaded, vec!["Sex"]);
        assert_eq!(summary.missing, vec!["Age", "Weight"]);
    }

    #[test]
    fn lifetime_cancels() {
        let (lifetime, _registration) = Lifetime::new();
        assert!(!lifetime.is_cancelled());
        lifetime.clone().cancel();
        assert!(lifetime.is_cancelled());
    }
}
