//! Query filters. Absent fields impose no constraint.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Filter for diagnosis listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisFilter {
    /// Case-insensitive substring of the diagnosis text
    #[serde(rename = "type")]
    pub diagnosis_type: Option<String>,
    pub is_active: Option<bool>,
    /// Inclusive lower bound on `created_at`
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub created_before: Option<DateTime<Utc>>,
}

impl DiagnosisFilter {
    pub fn by_type(diagnosis_type: impl Into<String>) -> Self {
        Self {
            diagnosis_type: Some(diagnosis_type.into()),
            ..Self::default()
        }
    }
}

/// Filter for patient listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PatientFilter {
    /// Matches first name, last name or any linked diagnosis, case-insensitively
    pub search_term: Option<String>,
    pub born_on_or_after: Option<NaiveDate>,
    pub born_on_or_before: Option<NaiveDate>,
    /// Some(true): at least one result; Some(false): none
    pub has_diagnosis: Option<bool>,
}

impl PatientFilter {
    /// Search-term filter. An empty term means no constraint.
    pub fn search(term: impl Into<String>) -> Self {
        let term = term.into();
        Self {
            search_term: (!term.is_empty()).then_some(term),
            ..Self::default()
        }
    }

    /// Restrict to patients whose age on `today` is within `[min_age, max_age]`.
    ///
    /// Ages are translated into date-of-birth bounds so storage can apply them.
    pub fn with_age_range(mut self, min_age: Option<u32>, max_age: Option<u32>, today: NaiveDate) -> Self {
        if let Some(min_age) = min_age {
            // age >= min  <=>  born on or before today minus `min` years.
            // Nobody is older than the calendar reaches back.
            self.born_on_or_before = Some(years_before(today, min_age).unwrap_or(NaiveDate::MIN));
        }
        if let Some(max_age) = max_age {
            // age <= max  <=>  born after today minus `max + 1` years
            self.born_on_or_after = years_before(today, max_age.saturating_add(1))
                .and_then(|d| d.checked_add_days(Days::new(1)));
        }
        self
    }

    pub fn with_has_diagnosis(mut self, has_diagnosis: Option<bool>) -> Self {
        self.has_diagnosis = has_diagnosis;
        self
    }
}

/// Same calendar day `years` earlier. 28 February in a common year maps back to
/// 29 February when the target year has one, mirroring how ages roll over.
fn years_before(date: NaiveDate, years: u32) -> Option<NaiveDate> {
    let shifted = date.checked_sub_months(Months::new(years.saturating_mul(12)))?;
    let common_year = NaiveDate::from_ymd_opt(date.year(), 2, 29).is_none();
    if date.month() == 2 && date.day() == 28 && common_year {
        return Some(shifted.with_day(29).unwrap_or(shifted));
    }
    Some(shifted)
}
