//! Where FHIR data comes from: the source trait, search query model and an
//! in-memory Bundle implementation.

use std::cmp::Reverse;
use std::fmt;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::codes::split_codes;
use crate::resource::{bundle_resources, coding_codes, resource_timestamp};
use crate::FhirError;

/// Read access to one patient's record. Implementations are shared
/// read-only by every view.
#[async_trait(?Send)]
pub trait FhirSource {
    /// Run a search such as `Observation?code=8867-4&_sort=-date&_count=1`
    /// and return the searchset Bundle.
    async fn search(&self, query: &str) -> Result<Value, FhirError>;

    /// The in-context Patient resource.
    async fn read_patient(&self) -> Result<Value, FhirError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub resource_type: String,
    pub params: Vec<(String, String)>,
}

impl SearchQuery {
    pub fn new(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn parse(query: &str) -> Result<Self, FhirError> {
        let query = query.trim().trim_start_matches('/');
        let (resource_type, rest) = match query.split_once('?') {
            Some((resource_type, rest)) => (resource_type, rest),
            None => (query, ""),
        };
        if resource_type.is_empty() || resource_type.contains('/') {
            return Err(FhirError::Query(query.to_string()));
        }

        let mut parsed = Self::new(resource_type);
        for pair in rest.split('&').filter(|pair| !pair.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| FhirError::Query(query.to_string()))?;
            parsed.params.push((name.to_string(), value.to_string()));
        }
        Ok(parsed)
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource_type)?;
        for (index, (name, value)) in self.params.iter().enumerate() {
            let separator = if index == 0 { '?' } else { '&' };
            write!(f, "{separator}{name}={value}")?;
        }
        Ok(())
    }
}

/// Serves searches from an in-memory FHIR Bundle.
#[derive(Debug, Clone, Default)]
pub struct BundleSource {
    resources: Vec<Value>,
}

impl BundleSource {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_value(bundle: &Value) -> Result<Self, FhirError> {
        let resources = bundle_resources(bundle)?.into_iter().cloned().collect();
        Ok(Self { resources })
    }

    pub fn from_json(bundle_json: &str) -> Result<Self, FhirError> {
        let value: Value =
            serde_json::from_str(bundle_json).map_err(|err| FhirError::Parse(err.to_string()))?;
        Self::from_value(&value)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Answer a parsed query against the bundle.
    pub fn run(&self, query: &SearchQuery) -> Vec<&Value> {
        let mut matches: Vec<&Value> = self
            .resources
            .iter()
            .filter(|resource| {
                resource.get("resourceType").and_then(Value::as_str)
                    == Some(query.resource_type.as_str())
            })
            .filter(|resource| {
                query
                    .params
                    .iter()
                    .all(|(name, value)| param_matches(resource, name, value))
            })
            .collect();

        if let Some(sort) = query.get("_sort") {
            if sort.trim_start_matches('-') == "date" {
                // Stable sort: equal timestamps keep bundle order.
                if sort.starts_with('-') {
                    matches.sort_by_key(|resource| Reverse(resource_timestamp(resource)));
                } else {
                    matches.sort_by_key(|resource| resource_timestamp(resource));
                }
            }
        }

        if let Some(count) = query.get("_count").and_then(|count| count.parse::<usize>().ok()) {
            matches.truncate(count);
        }
        matches
    }
}

fn param_matches(resource: &Value, name: &str, value: &str) -> bool {
    match name {
        "code" => {
            let concept = resource
                .get("code")
                .or_else(|| resource.get("medicationCodeableConcept"));
            let own = concept.map(coding_codes).unwrap_or_default();
            split_codes(value).any(|code| own.contains(&code))
        }
        "clinical-status" => {
            let status = resource
                .get("clinicalStatus")
                .map(coding_codes)
                .and_then(|codes| codes.into_iter().next());
            // Conditions without a recorded status count as active.
            status.map_or(value == "active", |status| {
                split_codes(value).any(|wanted| wanted == status)
            })
        }
        "status" => resource
            .get("status")
            .and_then(Value::as_str)
            .map_or(false, |status| split_codes(value).any(|wanted| wanted == status)),
        _ => true,
    }
}

#[async_trait(?Send)]
impl FhirSource for BundleSource {
    async fn search(&self, query: &str) -> Result<Value, FhirError> {
        let query = SearchQuery::parse(query)?;
        let entries: Vec<Value> = self
            .run(&query)
            .into_iter()
            .map(|resource| json!({ "resource": resource }))
            .collect();
        tracing::debug!(%query, total = entries.len(), "bundle search");
        Ok(json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "total": entries.len(),
            "entry": entries,
        }))
    }

    async fn read_patient(&self) -> Result<Value, FhirError> {
        self.resources
            .iter()
            .find(|resource| resource.get("resourceType").and_then(Value::as_str) == Some("Patient"))
            .cloned()
            .ok_or_else(|| FhirError::NotFound("Patient".to_string()))
    }
}
