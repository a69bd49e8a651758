//! FHIR REST server access over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use medcalc_core::CalcConfig;
use reqwest::Url;
use serde_json::Value;

use crate::source::{FhirSource, SearchQuery};
use crate::FhirError;

/// Patient-scoped client for a FHIR R4 REST endpoint.
pub struct RestSource {
    client: reqwest::Client,
    base_url: Url,
    patient_id: String,
    token: Option<String>,
}

impl RestSource {
    pub fn new(base_url: &str, patient_id: &str, config: &CalcConfig) -> Result<Self, FhirError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| FhirError::Request(format!("failed to build HTTP client: {e}")))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| FhirError::Request(format!("invalid FHIR base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FhirError::Request(format!("invalid FHIR base URL {base_url}")));
        }
        Ok(Self {
            client,
            base_url,
            patient_id: patient_id.to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FhirError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FhirError::Request(format!("invalid FHIR base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Search URL with the patient scope appended. Parameter values are
    /// percent-encoded.
    pub fn search_url(&self, query: &str) -> Result<Url, FhirError> {
        let query = SearchQuery::parse(query)?.param("patient", &self.patient_id);
        let mut url = self.endpoint(&[query.resource_type.as_str()])?;
        url.query_pairs_mut().extend_pairs(&query.params);
        Ok(url)
    }

    pub fn patient_url(&self) -> Result<Url, FhirError> {
        self.endpoint(&["Patient", self.patient_id.as_str()])
    }

    async fn get_json(&self, url: Url) -> Result<Value, FhirError> {
        let mut request = self
            .client
            .get(url.clone())
            .header("Accept", "application/fhir+json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| FhirError::Request(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(FhirError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| FhirError::Parse(e.to_string()))
    }
}

#[async_trait(?Send)]
impl FhirSource for RestSource {
    async fn search(&self, query: &str) -> Result<Value, FhirError> {
        let url = self.search_url(query)?;
        tracing::debug!(%url, "FHIR search");
        self.get_json(url).await
    }

    async fn read_patient(&self) -> Result<Value, FhirError> {
        self.get_json(self.patient_url()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_urls_are_patient_scoped() {
        let source = RestSource::new("https://fhir.example.org/r4/", "p-1", &CalcConfig::default())
            .expect("client");
        let url = source
            .search_url("Observation?code=8867-4&_sort=-date&_count=1")
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://fhir.example.org/r4/Observation?code=8867-4&_sort=-date&_count=1&patient=p-1"
        );
    }

    #[test]
    fn query_values_and_patient_ids_are_encoded() {
        let source = RestSource::new("https://fhir.example.org/r4", "a b&c", &CalcConfig::default())
            .expect("client");
        let url = source
            .search_url("Condition?code=44054006,22298006&clinical-status=active")
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://fhir.example.org/r4/Condition?code=44054006%2C22298006&clinical-status=active&patient=a+b%26c"
        );
        assert_eq!(
            source.patient_url().expect("patient url").as_str(),
            "https://fhir.example.org/r4/Patient/a%20b&c"
        );
    }

    #[test]
    fn relative_base_url_is_rejected() {
        assert!(RestSource::new("fhir/r4", "p-1", &CalcConfig::default()).is_err());
    }
}
