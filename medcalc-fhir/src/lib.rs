//! FHIR data access for calculators: resource accessors, query sources,
//! cancellable auto-population and staleness tracking.

use medcalc_core::CalcError;

pub mod access;
pub mod autofill;
pub mod resource;
#[cfg(not(target_arch = "wasm32"))]
pub mod rest;
pub mod source;
pub mod staleness;

pub use medcalc_core::codes;

pub use access::{
    get_medication_requests, get_most_recent_observation, get_observation, get_patient,
    get_patient_conditions,
};
pub use autofill::{run_population, Lifetime, Observed, PopulationSummary, Prefill};
pub use resource::{Condition, MedicationRequest, Observation, Patient, Quantity};
#[cfg(not(target_arch = "wasm32"))]
pub use rest::RestSource;
pub use source::{BundleSource, FhirSource, SearchQuery};
pub use staleness::{StalenessInfo, StalenessTracker};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FhirError {
    #[error("Failed to parse FHIR JSON: {0}")]
    Parse(String),
    #[error("Expected resourceType {expected}, received {found}")]
    UnexpectedResource { expected: String, found: String },
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Unsupported search query: {0}")]
    Query(String),
    #[error("FHIR request failed: {0}")]
    Request(String),
    #[error("FHIR server responded with status {0}")]
    Status(u16),
}

impl From<FhirError> for CalcError {
    fn from(err: FhirError) -> Self {
        CalcError::FhirData(err.to_string())
    }
}
