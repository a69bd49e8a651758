//! Fetchers used by auto-population. Every failure is logged and degrades
//! to "no data".

use serde_json::Value;

use crate::resource::{bundle_resources, Condition, MedicationRequest, Observation, Patient};
use crate::source::{FhirSource, SearchQuery};

async fn search_resources<S, T>(
    source: &S,
    query: SearchQuery,
    wrap: fn(Value) -> Result<T, crate::FhirError>,
) -> Vec<T>
where
    S: FhirSource + ?Sized,
{
    let text = query.to_string();
    let bundle = match source.search(&text).await {
        Ok(bundle) => bundle,
        Err(err) => {
            tracing::warn!(query = %text, %err, "FHIR search failed");
            return Vec::new();
        }
    };
    let resources = match bundle_resources(&bundle) {
        Ok(resources) => resources,
        Err(err) => {
            tracing::warn!(query = %text, %err, "malformed search response");
            return Vec::new();
        }
    };
    resources
        .into_iter()
        .filter_map(|resource| match wrap(resource.clone()) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::warn!(query = %text, %err, "skipping search entry");
                None
            }
        })
        .collect()
}

/// Latest of `observations` by effective time; ties keep the given order
/// and undated entries lose to dated ones.
pub fn most_recent(observations: Vec<Observation>) -> Option<Observation> {
    let mut best: Option<Observation> = None;
    for candidate in observations {
        let replace = match &best {
            None => true,
            Some(current) => match (candidate.effective_time(), current.effective_time()) {
                (Some(a), Some(b)) => a > b,
                (Some(_), None) => true,
                _ => false,
            },
        };
        if replace {
            best = Some(candidate);
        }
    }
    best
}

/// Observations for `code` sorted newest first, at most `count`.
pub async fn search_observations<S>(source: &S, code: &str, count: u32) -> Vec<Observation>
where
    S: FhirSource + ?Sized,
{
    let query = SearchQuery::new("Observation")
        .param("code", code)
        .param("_sort", "-date")
        .param("_count", count.max(1));
    search_resources(source, query, Observation::from_value).await
}

/// Most recent observation for `code` (comma-separated codes allowed).
pub async fn get_most_recent_observation<S>(source: &S, code: &str) -> Option<Observation>
where
    S: FhirSource + ?Sized,
{
    most_recent(search_observations(source, code, 1).await)
}

/// First observation the server returns for `code`.
pub async fn get_observation<S>(source: &S, code: &str) -> Option<Observation>
where
    S: FhirSource + ?Sized,
{
    let query = SearchQuery::new("Observation")
        .param("code", code)
        .param("_count", 1);
    search_resources(source, query, Observation::from_value)
        .await
        .into_iter()
        .next()
}

/// Active conditions coded with any of `codes`.
pub async fn get_patient_conditions<S>(source: &S, codes: &[&str]) -> Vec<Condition>
where
    S: FhirSource + ?Sized,
{
    if codes.is_empty() {
        return Vec::new();
    }
    let query = SearchQuery::new("Condition")
        .param("clinical-status", "active")
        .param("code", codes.join(","));
    search_resources(source, query, Condition::from_value).await
}

pub async fn get_patient<S>(source: &S) -> Option<Patient>
where
    S: FhirSource + ?Sized,
{
    match source.read_patient().await {
        Ok(value) => match Patient::from_value(value) {
            Ok(patient) => Some(patient),
            Err(err) => {
                tracing::warn!(%err, "patient read returned another resource");
                None
            }
        },
        Err(err) => {
            tracing::warn!(%err, "patient read failed");
            None
        }
    }
}

/// Active medication requests for any of the RxNorm `codes`.
pub async fn get_medication_requests<S>(source: &S, codes: &[&str]) -> Vec<MedicationRequest>
where
    S: FhirSource + ?Sized,
{
    if codes.is_empty() {
        return Vec::new();
    }
    let query = SearchQuery::new("MedicationRequest")
        .param("status", "active")
        .param("code", codes.join(","));
    search_resources(source, query, MedicationRequest::from_value).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observation(id: &str, when: Option<&str>) -> Observation {
        let mut value = json!({"resourceType": "Observation", "id": id});
        if let Some(when) = when {
            value["effectiveDateTime"] = json!(when);
        }
        Observation::from_value(value).expect("observation")
    }

    #[test]
    fn newest_wins_and_ties_keep_order() {
        let picked = most_recent(vec![
            observation("a", Some("2024-01-01T00:00:00Z")),
            observation("b", Some("2024-02-01T00:00:00Z")),
            observation("c", Some("2024-02-01T00:00:00Z")),
            observation("d", None),
        ])
        .expect("observation");
        assert_eq!(picked.id(), Some("b"));
    }

    #[test]
    fn empty_input_has_no_pick() {
        assert!(most_recent(Vec::new()).is_none());
    }
}
