//! Read-side projections returned by query handlers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DiagnosticResult, Patient};

/// Patient as returned by list and detail queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientView {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub age: i32,
    pub last_diagnosis: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PatientView {
    pub fn new(patient: &Patient, last_diagnosis: Option<String>, today: NaiveDate) -> Self {
        Self {
            id: patient.id(),
            first_name: patient.first_name().to_string(),
            last_name: patient.last_name().to_string(),
            full_name: patient.full_name(),
            date_of_birth: patient.date_of_birth(),
            age: patient.age_on(today),
            last_diagnosis,
            created_at: patient.created_at(),
            updated_at: patient.updated_at(),
        }
    }
}

/// Minimal patient projection attached to diagnosis listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub age: i32,
}

impl PatientSummary {
    pub fn new(patient: &Patient, today: NaiveDate) -> Self {
        Self {
            id: patient.id(),
            first_name: patient.first_name().to_string(),
            last_name: patient.last_name().to_string(),
            full_name: patient.full_name(),
            date_of_birth: patient.date_of_birth(),
            age: patient.age_on(today),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResultView {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Present only on cross-patient listings
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub patient: Option<PatientSummary>,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl DiagnosticResultView {
    pub fn new(result: &DiagnosticResult) -> Self {
        Self {
            id: result.id(),
            patient_id: result.patient_id(),
            patient: None,
            diagnosis: result.diagnosis().to_string(),
            notes: result.notes().map(str::to_string),
            timestamp_utc: result.timestamp_utc(),
            created_at: result.created_at(),
            is_active: result.is_active(),
        }
    }

    pub fn with_patient(mut self, patient: Option<PatientSummary>) -> Self {
        self.patient = patient;
        self
    }
}

impl From<&DiagnosticResult> for DiagnosticResultView {
    fn from(result: &DiagnosticResult) -> Self {
        Self::new(result)
    }
}

/// Patient with all of its diagnostic results, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetailView {
    #[serde(flatten)]
    pub patient: PatientView,
    pub diagnostic_results: Vec<DiagnosticResultView>,
}
