//! Diagnostic result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{utc_now, ValidationError};

/// Maximum diagnosis length in characters, after trimming.
pub const MAX_DIAGNOSIS_LENGTH: usize = 500;

/// Maximum notes length in characters, after trimming.
pub const MAX_NOTES_LENGTH: usize = 2_000;

/// A single recorded diagnosis belonging to exactly one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    id: Uuid,
    patient_id: Uuid,
    diagnosis: String,
    notes: Option<String>,
    timestamp_utc: DateTime<Utc>,
    created_at: DateTime<Utc>,
    is_active: bool,
}

impl DiagnosticResult {
    /// Create a new active result. Only the shape is validated here; the caller
    /// checks that the patient exists.
    pub fn create(
        patient_id: Uuid,
        diagnosis: &str,
        notes: Option<&str>,
    ) -> Result<Self, ValidationError> {
        Self::create_at(patient_id, diagnosis, notes, utc_now())
    }

    /// Create a new active result recorded at the given instant.
    pub fn create_at(
        patient_id: Uuid,
        diagnosis: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if patient_id.is_nil() {
            return Err(ValidationError::new("patientId", "cannot be empty"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            patient_id,
            diagnosis: validate_diagnosis(diagnosis)?,
            notes: validate_notes(notes)?,
            timestamp_utc: now,
            created_at: now,
            is_active: true,
        })
    }

    /// Rebuild a result from stored fields. No validation is applied.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        patient_id: Uuid,
        diagnosis: String,
        notes: Option<String>,
        timestamp_utc: DateTime<Utc>,
        created_at: DateTime<Utc>,
        is_active: bool,
    ) -> Self {
        Self {
            id,
            patient_id,
            diagnosis,
            notes,
            timestamp_utc,
            created_at,
            is_active,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn patient_id(&self) -> Uuid {
        self.patient_id
    }

    pub fn diagnosis(&self) -> &str {
        &self.diagnosis
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        self.timestamp_utc
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Replace the notes. Blank notes clear the field.
    pub fn update_notes(&mut self, notes: Option<&str>) -> Result<(), ValidationError> {
        self.notes = validate_notes(notes)?;
        Ok(())
    }

    /// Soft-delete marker used by list filters.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }
}

fn validate_diagnosis(diagnosis: &str) -> Result<String, ValidationError> {
    let trimmed = diagnosis.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("diagnosis", "cannot be empty"));
    }
    if trimmed.chars().count() > MAX_DIAGNOSIS_LENGTH {
        return Err(ValidationError::new(
            "diagnosis",
            format!("cannot exceed {} characters", MAX_DIAGNOSIS_LENGTH),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_notes(notes: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(trimmed) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if trimmed.chars().count() > MAX_NOTES_LENGTH {
        return Err(ValidationError::new(
            "notes",
            format!("cannot exceed {} characters", MAX_NOTES_LENGTH),
        ));
    }
    Ok(Some(trimmed.to_string()))
}

/// The most recent result by `timestamp_utc`. Equal timestamps resolve to the
/// greatest id so the choice is stable across calls and storage backends.
pub fn latest_result<'a, I>(results: I) -> Option<&'a DiagnosticResult>
where
    I: IntoIterator<Item = &'a DiagnosticResult>,
{
    results.into_iter().max_by(|a, b| {
        a.timestamp_utc
            .cmp(&b.timestamp_utc)
            .then_with(|| a.id.cmp(&b.id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_create_result() {
        let patient_id = Uuid::new_v4();
        let result = DiagnosticResult::create(patient_id, "  Chřipka ", Some(" Mild ")).unwrap();

        assert_eq!(result.patient_id(), patient_id);
        assert_eq!(result.diagnosis(), "Chřipka");
        assert_eq!(result.notes(), Some("Mild"));
        assert!(result.is_active());
        assert_eq!(result.timestamp_utc(), result.created_at());
    }

    #[test]
    fn test_nil_patient_rejected() {
        let err = DiagnosticResult::create(Uuid::nil(), "Chřipka", None).unwrap_err();
        assert_eq!(err.field, "patientId");
    }

    #[test]
    fn test_blank_diagnosis_rejected() {
        let err = DiagnosticResult::create(Uuid::new_v4(), "  ", None).unwrap_err();
        assert_eq!(err.field, "diagnosis");
    }

    #[test]
    fn test_length_limits() {
        let too_long = "x".repeat(MAX_DIAGNOSIS_LENGTH + 1);
        assert!(DiagnosticResult::create(Uuid::new_v4(), &too_long, None).is_err());

        let notes = "n".repeat(MAX_NOTES_LENGTH + 1);
        let err = DiagnosticResult::create(Uuid::new_v4(), "Chřipka", Some(&notes)).unwrap_err();
        assert_eq!(err.field, "notes");
    }

    #[test]
    fn test_update_notes() {
        let mut result = DiagnosticResult::create(Uuid::new_v4(), "Chřipka", None).unwrap();
        result.update_notes(Some("  Improving ")).unwrap();
        assert_eq!(result.notes(), Some("Improving"));

        result.update_notes(Some("   ")).unwrap();
        assert_eq!(result.notes(), None);
    }

    #[test]
    fn test_deactivate() {
        let mut result = DiagnosticResult::create(Uuid::new_v4(), "Chřipka", None).unwrap();
        result.deactivate();
        assert!(!result.is_active());
        result.activate();
        assert!(result.is_active());
    }

    #[test]
    fn test_latest_result_by_timestamp() {
        let patient_id = Uuid::new_v4();
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

        let a = DiagnosticResult::create_at(patient_id, "Angína", None, late).unwrap();
        let b = DiagnosticResult::create_at(patient_id, "Chřipka", None, early).unwrap();

        let results = [b, a];
        assert_eq!(latest_result(&results).unwrap().diagnosis(), "Angína");
        assert!(latest_result(&[] as &[DiagnosticResult]).is_none());
    }

    #[test]
    fn test_latest_result_tie_breaks_on_id() {
        let patient_id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();

        let a = DiagnosticResult::create_at(patient_id, "Angína", None, at).unwrap();
        let b = DiagnosticResult::create_at(patient_id, "Chřipka", None, at).unwrap();
        let expected = if a.id() > b.id() { a.id() } else { b.id() };

        let forward = [a.clone(), b.clone()];
        let backward = [b, a];
        assert_eq!(latest_result(&forward).unwrap().id(), expected);
        assert_eq!(latest_result(&backward).unwrap().id(), expected);
    }
}
