//! Flags auto-populated values whose source observation is old.

use chrono::{DateTime, Duration, Utc};
use medcalc_core::CalcConfig;
use serde::Serialize;

use crate::codes::loinc_name;
use crate::resource::Observation;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StalenessInfo {
    pub selector: String,
    pub code: String,
    pub label: String,
    pub recorded_at: DateTime<Utc>,
    /// e.g. `Mar 1, 2024`
    pub date_text: String,
    pub age_days: i64,
    /// e.g. `1 year 2 months ago`
    pub age_text: String,
    pub is_stale: bool,
}

/// Per-view record of stale auto-populated fields. Only observations older
/// than the threshold are kept; a fresh value for a field clears it.
#[derive(Debug, Clone)]
pub struct StalenessTracker {
    threshold: Duration,
    container: Option<String>,
    items: Vec<StalenessInfo>,
    clock: Option<DateTime<Utc>>,
}

impl StalenessTracker {
    pub fn new(config: &CalcConfig) -> Self {
        Self {
            threshold: Duration::days(i64::from(config.staleness_threshold_days)),
            container: None,
            items: Vec::new(),
            clock: None,
        }
    }

    /// Freeze "now" at `now`.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.set_now(now);
        self
    }

    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.clock = Some(now);
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    pub fn set_container(&mut self, container_id: &str) {
        self.container = Some(container_id.to_string());
    }

    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    pub fn threshold_days(&self) -> i64 {
        self.threshold.num_days()
    }

    /// Age of `observation` against the threshold; `None` when it carries no
    /// timestamp.
    pub fn check(&self, observation: &Observation) -> Option<(DateTime<Utc>, Duration)> {
        let recorded_at = observation.effective_time()?;
        Some((recorded_at, self.now().signed_duration_since(recorded_at)))
    }

    /// Record the observation that populated `selector`. Returns its
    /// staleness whether or not it is stale.
    pub fn track_observation(
        &mut self,
        selector: &str,
        observation: &Observation,
        code: &str,
        label: Option<&str>,
    ) -> Option<StalenessInfo> {
        let (recorded_at, age) = self.check(observation)?;
        let age_days = age.num_days();
        let label = label
            .map(str::to_string)
            .or_else(|| loinc_name(code).map(str::to_string))
            .unwrap_or_else(|| code.to_string());

        let info = StalenessInfo {
            selector: selector.to_string(),
            code: code.to_string(),
            label: capitalize_words(&label),
            recorded_at,
            date_text: recorded_at.format("%b %-d, %Y").to_string(),
            age_days,
            age_text: format_age(age_days),
            is_stale: age > self.threshold,
        };

        self.items.retain(|item| item.selector != selector);
        if info.is_stale {
            tracing::debug!(selector, age_days, "stale observation");
            self.items.push(info.clone());
        }
        Some(info)
    }

    pub fn stale_items(&self) -> &[StalenessInfo] {
        &self.items
    }

    pub fn stale_count(&self) -> usize {
        self.items.len()
    }

    pub fn clear_field(&mut self, selector: &str) {
        self.items.retain(|item| item.selector != selector);
    }

    pub fn clear_all(&mut self) {
        self.items.clear();
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count > 1 {
        format!("{count} {unit}s")
    } else {
        format!("{count} {unit}")
    }
}

/// Human age of a value: days under a month, months under a year, then
/// years with leftover months.
pub fn format_age(days: i64) -> String {
    if days >= 365 {
        let years = days / 365;
        let months = (days % 365) / 30;
        if months > 0 {
            format!("{} {} ago", plural(years, "year"), plural(months, "month"))
        } else {
            format!("{} ago", plural(years, "year"))
        }
    } else if days >= 30 {
        format!("{} ago", plural(days / 30, "month"))
    } else {
        format!("{} ago", plural(days, "day"))
    }
}

fn capitalize_words(label: &str) -> String {
    label
        .split(' ')
        .map(|word| crate::resource::capitalize_first(word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn observation_at(when: &str) -> Observation {
        Observation::from_value(json!({
            "resourceType": "Observation",
            "code": {"coding": [{"code": "2160-0"}]},
            "effectiveDateTime": when
        }))
        .expect("observation")
    }

    fn tracker() -> StalenessTracker {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().expect("now");
        StalenessTracker::new(&CalcConfig::default()).with_now(now)
    }

    #[test]
    fn old_values_are_stale() {
        let mut tracker = tracker();
        let info = tracker
            .track_observation("#crcl-creatinine", &observation_at("2024-01-01T00:00:00Z"), "2160-0", None)
            .expect("dated");
        assert!(info.is_stale);
        assert_eq!(info.label, "Creatinine");
        assert_eq!(info.age_text, "5 months ago");
        assert_eq!(info.date_text, "Jan 1, 2024");
        assert_eq!(tracker.stale_count(), 1);
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut tracker = tracker();
        let info = tracker
            .track_observation("#x", &observation_at("2024-03-03T00:00:00Z"), "2160-0", Some("serum creatinine"))
            .expect("dated");
        assert_eq!(info.age_days, 90);
        assert!(!info.is_stale);
        assert_eq!(info.label, "Serum Creatinine");
        assert_eq!(tracker.stale_count(), 0);
    }

    #[test]
    fn fresh_value_clears_previous_warning() {
        let mut tracker = tracker();
        tracker.track_observation("#x", &observation_at("2020-01-01T00:00:00Z"), "2160-0", None);
        assert_eq!(tracker.stale_count(), 1);
        tracker.track_observation("#x", &observation_at("2024-05-30T00:00:00Z"), "2160-0", None);
        assert_eq!(tracker.stale_count(), 0);
    }

    #[test]
    fn undated_observations_are_ignored() {
        let mut tracker = tracker();
        let obs = Observation::from_value(json!({"resourceType": "Observation"})).expect("obs");
        assert!(tracker.track_observation("#x", &obs, "2160-0", None).is_none());
    }

    #[test]
    fn clearing() {
        let mut tracker = tracker();
        tracker.track_observation("#a", &observation_at("2020-01-01T00:00:00Z"), "2160-0", None);
        tracker.track_observation("#b", &observation_at("2020-01-01T00:00:00Z"), "2160-0", None);
        tracker.clear_field("#a");
        assert_eq!(tracker.stale_items()[0].selector, "#b");
        tracker.clear_all();
        assert_eq!(tracker.stale_count(), 0);
    }

    #[test]
    fn age_formatting() {
        assert_eq!(format_age(1), "1 day ago");
        assert_eq!(format_age(29), "29 days ago");
        assert_eq!(format_age(60), "2 months ago");
        assert_eq!(format_age(365), "1 year ago");
        assert_eq!(format_age(400), "1 year 1 month ago");
        assert_eq!(format_age(800), "2 years 2 months ago");
    }
}
