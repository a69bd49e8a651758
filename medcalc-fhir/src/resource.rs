//! Read-only views over FHIR resources held as `serde_json::Value`.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::codes::split_codes;
use crate::FhirError;

/// Numeric value with the unit spelling the server used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Option<String>,
}

fn quantity(value: &Value) -> Option<Quantity> {
    let number = value.get("value").and_then(Value::as_f64)?;
    let unit = value
        .get("unit")
        .or_else(|| value.get("code"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|unit| !unit.is_empty())
        .map(str::to_string);
    Some(Quantity {
        value: number,
        unit,
    })
}

/// Collect `coding[].code` of a CodeableConcept.
pub(crate) fn coding_codes(concept: &Value) -> Vec<&str> {
    concept
        .get("coding")
        .and_then(Value::as_array)
        .map(|codings| {
            codings
                .iter()
                .filter_map(|coding| coding.get("code").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

fn matches_any(concept: Option<&Value>, codes: &str) -> bool {
    let Some(concept) = concept else {
        return false;
    };
    let own = coding_codes(concept);
    split_codes(codes).any(|code| own.contains(&code))
}

fn check_type(value: &Value, expected: &str) -> Result<(), FhirError> {
    let found = value
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if found == expected {
        Ok(())
    } else {
        Err(FhirError::UnexpectedResource {
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }
}

pub(crate) fn extract_codeable_text(value: &Value) -> Option<String> {
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.trim().to_string());
        }
    }

    if let Some(codings) = value.get("coding").and_then(Value::as_array) {
        for coding in codings {
            if let Some(display) = coding.get("display").and_then(Value::as_str) {
                if !display.trim().is_empty() {
                    return Some(display.trim().to_string());
                }
            }
            if let Some(code) = coding.get("code").and_then(Value::as_str) {
                if !code.trim().is_empty() {
                    return Some(code.trim().to_string());
                }
            }
        }
    }

    None
}

pub(crate) fn extract_datetime(resource: &Value, fields: &[&str]) -> Option<DateTime<Utc>> {
    for field in fields {
        let Some(value) = resource.get(*field) else {
            continue;
        };

        if let Some(text) = value.as_str() {
            if let Some(dt) = parse_datetime(text) {
                return Some(dt);
            }
        }

        if let Some(obj) = value.as_object() {
            if let Some(end) = obj.get("end").and_then(Value::as_str) {
                if let Some(dt) = parse_datetime(end) {
                    return Some(dt);
                }
            }
            if let Some(start) = obj.get("start").and_then(Value::as_str) {
                if let Some(dt) = parse_datetime(start) {
                    return Some(dt);
                }
            }
        }
    }
    None
}

/// RFC 3339 instant, or a bare FHIR date taken as midnight UTC.
pub(crate) fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            parse_date(value)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Timestamp used to order search results of any supported type.
pub(crate) fn resource_timestamp(resource: &Value) -> Option<DateTime<Utc>> {
    let resource_type = resource.get("resourceType").and_then(Value::as_str)?;
    match resource_type {
        "Observation" => observation_timestamp(resource),
        "Condition" => extract_datetime(
            resource,
            &["recordedDate", "onsetDateTime", "onsetPeriod", "assertedDate"],
        ),
        "MedicationRequest" => extract_datetime(resource, &["authoredOn"]),
        _ => extract_datetime(resource, &["effectiveDateTime", "issued", "date"]),
    }
}

fn observation_timestamp(resource: &Value) -> Option<DateTime<Utc>> {
    extract_datetime(
        resource,
        &[
            "effectiveDateTime",
            "effectiveInstant",
            "effectivePeriod",
            "issued",
        ],
    )
    .or_else(|| {
        resource
            .get("meta")
            .and_then(|meta| meta.get("lastUpdated"))
            .and_then(Value::as_str)
            .and_then(parse_datetime)
    })
}

pub fn capitalize_first(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// FHIR Observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Observation(Value);

impl Observation {
    pub fn from_value(value: Value) -> Result<Self, FhirError> {
        check_type(&value, "Observation")?;
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn codes(&self) -> Vec<&str> {
        self.0.get("code").map(coding_codes).unwrap_or_default()
    }

    /// True when `code` (comma-separated list allowed) names this observation.
    pub fn has_code(&self, code: &str) -> bool {
        matches_any(self.0.get("code"), code)
    }

    pub fn display(&self) -> Option<String> {
        self.0.get("code").and_then(extract_codeable_text)
    }

    pub fn value_quantity(&self) -> Option<Quantity> {
        self.0.get("valueQuantity").and_then(quantity)
    }

    pub fn value_code(&self) -> Option<&str> {
        self.0
            .get("valueCodeableConcept")
            .and_then(|concept| coding_codes(concept).into_iter().next())
    }

    pub fn components(&self) -> &[Value] {
        self.0
            .get("component")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Quantity of the first component coded with `code`.
    pub fn component_quantity(&self, code: &str) -> Option<Quantity> {
        self.components()
            .iter()
            .filter(|component| matches_any(component.get("code"), code))
            .find_map(|component| component.get("valueQuantity").and_then(quantity))
    }

    /// The value answering `code`: the observation's own quantity when it is
    /// coded with `code`, else a matching component, else its quantity.
    pub fn quantity_for(&self, code: &str) -> Option<Quantity> {
        if self.has_code(code) {
            if let Some(value) = self.value_quantity() {
                return Some(value);
            }
        }
        self.component_quantity(code)
            .or_else(|| self.value_quantity())
    }

    /// `effectiveDateTime | effectiveInstant | effectivePeriod | issued |
    /// meta.lastUpdated`, first parseable wins.
    pub fn effective_time(&self) -> Option<DateTime<Utc>> {
        observation_timestamp(&self.0)
    }
}

/// FHIR Condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Condition(Value);

impl Condition {
    pub fn from_value(value: Value) -> Result<Self, FhirError> {
        check_type(&value, "Condition")?;
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn codes(&self) -> Vec<&str> {
        self.0.get("code").map(coding_codes).unwrap_or_default()
    }

    pub fn has_code(&self, code: &str) -> bool {
        matches_any(self.0.get("code"), code)
    }

    pub fn display(&self) -> Option<String> {
        self.0.get("code").and_then(extract_codeable_text)
    }

    pub fn clinical_status(&self) -> Option<&str> {
        self.0
            .get("clinicalStatus")
            .and_then(|status| coding_codes(status).into_iter().next())
    }

    /// Conditions without a clinical status are treated as active.
    pub fn is_active(&self) -> bool {
        matches!(self.clinical_status(), None | Some("active") | Some("recurrence") | Some("relapse"))
    }

    pub fn recorded(&self) -> Option<DateTime<Utc>> {
        resource_timestamp(&self.0)
    }
}

/// FHIR MedicationRequest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MedicationRequest(Value);

impl MedicationRequest {
    pub fn from_value(value: Value) -> Result<Self, FhirError> {
        check_type(&value, "MedicationRequest")?;
        Ok(Self(value))
    }

    pub fn codes(&self) -> Vec<&str> {
        self.0
            .get("medicationCodeableConcept")
            .map(coding_codes)
            .unwrap_or_default()
    }

    pub fn has_code(&self, code: &str) -> bool {
        matches_any(self.0.get("medicationCodeableConcept"), code)
    }

    pub fn display(&self) -> Option<String> {
        self.0
            .get("medicationCodeableConcept")
            .and_then(extract_codeable_text)
    }

    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }

    pub fn authored_on(&self) -> Option<DateTime<Utc>> {
        resource_timestamp(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// FHIR Patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Patient(Value);

impl Patient {
    pub fn from_value(value: Value) -> Result<Self, FhirError> {
        check_type(&value, "Patient")?;
        Ok(Self(value))
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<String> {
        let name = self.0.get("name")?.as_array()?.first()?;
        if let Some(text) = name.get("text").and_then(Value::as_str) {
            return Some(text.trim().to_string());
        }
        let given = name
            .get("given")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
            .and_then(Value::as_str)
            .unwrap_or("");
        let family = name.get("family").and_then(Value::as_str).unwrap_or("");
        let full = format!("{given} {family}").trim().to_string();
        if full.is_empty() {
            None
        } else {
            Some(full)
        }
    }

    pub fn birth_date(&self) -> Option<NaiveDate> {
        self.0
            .get("birthDate")
            .and_then(Value::as_str)
            .and_then(parse_date)
    }

    /// Whole years on `today`; `None` without a birth date or for a birth
    /// date in the future.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth_date = self.birth_date()?;
        let mut age = today.year() - birth_date.year();
        if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }

    pub fn age(&self) -> Option<u32> {
        self.age_on(Utc::now().date_naive())
    }

    pub fn gender(&self) -> Option<Gender> {
        let gender = self.0.get("gender").and_then(Value::as_str)?;
        match gender.trim().to_lowercase().as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            _ => None,
        }
    }
}

/// Resources carried by a Bundle's `entry[].resource`. A searchset without
/// `entry` is empty.
pub fn bundle_resources(bundle: &Value) -> Result<Vec<&Value>, FhirError> {
    check_type(bundle, "Bundle")?;
    Ok(bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("resource"))
                .collect()
        })
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bp_panel() -> Observation {
        Observation::from_value(json!({
            "resourceType": "Observation",
            "code": {"coding": [{"system": "http://loinc.org", "code": "85354-9"}]},
            "effectivePeriod": {"start": "2024-03-01T08:00:00Z", "end": "2024-03-01T08:05:00Z"},
            "component": [
                {"code": {"coding": [{"code": "8480-6"}]}, "valueQuantity": {"value": 132, "unit": "mmHg"}},
                {"code": {"coding": [{"code": "8462-4"}]}, "valueQuantity": {"value": 84, "code": "mm[Hg]"}}
            ]
        }))
        .expect("observation")
    }

    #[test]
    fn panel_components_resolve_by_code() {
        let obs = bp_panel();
        assert!(obs.has_code("55284-4,85354-9"));
        let systolic = obs.quantity_for("8480-6").expect("systolic");
        assert_eq!(systolic.value, 132.0);
        let diastolic = obs.component_quantity("8462-4").expect("diastolic");
        assert_eq!(diastolic.unit.as_deref(), Some("mm[Hg]"));
        assert!(obs.value_quantity().is_none());
    }

    #[test]
    fn effective_period_prefers_end() {
        let time = bp_panel().effective_time().expect("time");
        assert_eq!(time.to_rfc3339(), "2024-03-01T08:05:00+00:00");
    }

    #[test]
    fn falls_back_to_last_updated() {
        let obs = Observation::from_value(json!({
            "resourceType": "Observation",
            "meta": {"lastUpdated": "2023-12-31"}
        }))
        .expect("observation");
        assert_eq!(
            obs.effective_time().map(|t| t.date_naive()),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
    }

    #[test]
    fn rejects_wrong_resource_type() {
        let err = Observation::from_value(json!({"resourceType": "Patient"})).expect_err("type");
        assert!(matches!(err, FhirError::UnexpectedResource { .. }));
    }

    #[test]
    fn patient_age_respects_birthday() {
        let patient = Patient::from_value(json!({
            "resourceType": "Patient",
            "birthDate": "1960-06-15",
            "gender": "female"
        }))
        .expect("patient");
        let before = NaiveDate::from_ymd_opt(2024, 6, 14).expect("date");
        let after = NaiveDate::from_ymd_opt(2024, 6, 15).expect("date");
        assert_eq!(patient.age_on(before), Some(63));
        assert_eq!(patient.age_on(after), Some(64));
        assert_eq!(patient.gender(), Some(Gender::Female));
    }

    #[test]
    fn condition_status_defaults_to_active() {
        let resolved = Condition::from_value(json!({
            "resourceType": "Condition",
            "clinicalStatus": {"coding": [{"code": "resolved"}]}
        }))
        .expect("condition");
        assert!(!resolved.is_active());
        let bare = Condition::from_value(json!({"resourceType": "Condition"})).expect("condition");
        assert!(bare.is_active());
    }
}
