//! Patient models.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{latest_result, utc_now, DiagnosticResult, ValidationError};

/// Maximum length of either name part, counted in characters after trimming.
pub const MAX_NAME_LENGTH: usize = 100;

/// First and last name of a patient. Both parts are trimmed and non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientName {
    first_name: String,
    last_name: String,
}

impl PatientName {
    /// Validate and trim both name parts together.
    pub fn new(first_name: &str, last_name: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            first_name: validate_name("firstName", first_name)?,
            last_name: validate_name("lastName", last_name)?,
        })
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// Derived display name, `"first last"`.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

fn validate_name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "cannot be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::new(
            field,
            format!("cannot exceed {} characters", MAX_NAME_LENGTH),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_date_of_birth(date_of_birth: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
    if date_of_birth > today {
        return Err(ValidationError::new(
            "dateOfBirth",
            "cannot be in the future",
        ));
    }
    Ok(())
}

/// A patient record.
///
/// Diagnostic results are not owned by the struct: they reference the patient by
/// id and are loaded explicitly when a view needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    id: Uuid,
    name: PatientName,
    date_of_birth: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl Patient {
    /// Create a new patient, validating names and date of birth.
    pub fn create(
        first_name: &str,
        last_name: &str,
        date_of_birth: NaiveDate,
    ) -> Result<Self, ValidationError> {
        Self::create_at(first_name, last_name, date_of_birth, utc_now())
    }

    /// Create a new patient as of the given instant.
    pub fn create_at(
        first_name: &str,
        last_name: &str,
        date_of_birth: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let name = PatientName::new(first_name, last_name)?;
        validate_date_of_birth(date_of_birth, now.date_naive())?;

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            date_of_birth,
            created_at: now,
            updated_at: None,
        })
    }

    /// Rebuild a patient from stored fields. No validation is applied.
    pub fn restore(
        id: Uuid,
        name: PatientName,
        date_of_birth: NaiveDate,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            name,
            date_of_birth,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &PatientName {
        &self.name
    }

    pub fn first_name(&self) -> &str {
        self.name.first_name()
    }

    pub fn last_name(&self) -> &str {
        self.name.last_name()
    }

    pub fn full_name(&self) -> String {
        self.name.full_name()
    }

    pub fn date_of_birth(&self) -> NaiveDate {
        self.date_of_birth
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Replace both names. Refreshes `updated_at` even when nothing changed.
    pub fn rename(&mut self, first_name: &str, last_name: &str) -> Result<(), ValidationError> {
        self.name = PatientName::new(first_name, last_name)?;
        self.touch();
        Ok(())
    }

    /// Correct the date of birth. The new date must not be in the future.
    pub fn change_date_of_birth(&mut self, date_of_birth: NaiveDate) -> Result<(), ValidationError> {
        validate_date_of_birth(date_of_birth, Utc::now().date_naive())?;
        self.date_of_birth = date_of_birth;
        self.touch();
        Ok(())
    }

    /// Mark the patient as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Some(utc_now());
    }

    /// Age in whole years on the given date.
    ///
    /// Year difference, minus one when the birthday has not yet occurred in the
    /// `as_of` year. A 29 February birthday falls on 28 February in common years.
    pub fn age_on(&self, as_of: NaiveDate) -> i32 {
        let mut age = as_of.year() - self.date_of_birth.year();
        if as_of < birthday_in(self.date_of_birth, as_of.year()) {
            age -= 1;
        }
        age
    }

    /// Age in whole years as of the current UTC date.
    pub fn age(&self) -> i32 {
        self.age_on(Utc::now().date_naive())
    }

    /// Diagnosis text of this patient's most recent result, if any.
    pub fn last_diagnosis(&self, results: &[DiagnosticResult]) -> Option<String> {
        latest_result(results.iter().filter(|r| r.patient_id() == self.id))
            .map(|r| r.diagnosis().to_string())
    }
}

fn birthday_in(date_of_birth: NaiveDate, year: i32) -> NaiveDate {
    date_of_birth
        .with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date_of_birth.month(), 28))
        .unwrap_or(date_of_birth)
}
