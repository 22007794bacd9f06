//! Storage contracts used by the loaders and handlers.
//!
//! [`crate::db::Database`] implements both traits over SQLite. Handlers and
//! loaders are generic over them so a different store can be dropped in.

use uuid::Uuid;

use crate::db::DbResult;
use crate::models::{DiagnosisFilter, DiagnosticResult, PageRequest, Patient, PatientFilter};

/// Patient persistence.
pub trait PatientRepository {
    fn get_patient(&self, id: Uuid) -> DbResult<Option<Patient>>;

    /// All patients ordered by last name, first name, then id.
    fn list_patients(&self) -> DbResult<Vec<Patient>>;

    /// One window of the filtered set, in the same order as [`Self::list_patients`].
    fn filter_patients(&self, filter: &PatientFilter, page: PageRequest) -> DbResult<Vec<Patient>>;

    /// Size of the filtered set ignoring pagination.
    fn count_filtered_patients(&self, filter: &PatientFilter) -> DbResult<u64>;

    fn count_patients(&self) -> DbResult<u64>;

    fn insert_patient(&self, patient: &Patient) -> DbResult<()>;

    /// Returns false when no patient has that id.
    fn update_patient(&self, patient: &Patient) -> DbResult<bool>;

    /// Removes the patient and its results. Returns false when nothing was removed.
    fn delete_patient(&self, id: Uuid) -> DbResult<bool>;

    fn patient_exists(&self, id: Uuid) -> DbResult<bool>;

    /// Batch lookup. Unknown ids are absent from the result.
    fn get_patients_by_ids(&self, ids: &[Uuid]) -> DbResult<Vec<Patient>>;
}

/// Diagnostic result persistence.
pub trait DiagnosticResultRepository {
    fn get_diagnostic_result(&self, id: Uuid) -> DbResult<Option<DiagnosticResult>>;

    /// Every result, newest `created_at` first.
    fn list_diagnostic_results(&self) -> DbResult<Vec<DiagnosticResult>>;

    fn count_diagnostic_results(&self) -> DbResult<u64>;

    fn diagnostic_result_exists(&self, id: Uuid) -> DbResult<bool>;

    /// Batch lookup. Unknown ids are absent from the result.
    fn get_diagnostic_results_by_ids(&self, ids: &[Uuid]) -> DbResult<Vec<DiagnosticResult>>;

    /// Results of one patient, newest first.
    fn list_results_for_patient(&self, patient_id: Uuid) -> DbResult<Vec<DiagnosticResult>>;

    /// The `count` newest results of one patient.
    fn latest_results_for_patient(&self, patient_id: Uuid, count: u64) -> DbResult<Vec<DiagnosticResult>>;

    fn count_results_for_patient(&self, patient_id: Uuid) -> DbResult<u64>;

    /// Batch lookup by owning patient, newest first within each patient.
    fn list_results_for_patients(&self, patient_ids: &[Uuid]) -> DbResult<Vec<DiagnosticResult>>;

    fn insert_diagnostic_result(&self, result: &DiagnosticResult) -> DbResult<()>;

    /// Insert a result and store its already-touched patient atomically.
    /// Returns false, writing nothing, when the patient no longer exists.
    fn record_result_for_patient(&self, result: &DiagnosticResult, patient: &Patient) -> DbResult<bool>;

    /// Returns false when no result has that id.
    fn update_diagnostic_result(&self, result: &DiagnosticResult) -> DbResult<bool>;

    fn delete_diagnostic_result(&self, id: Uuid) -> DbResult<bool>;

    /// One window of the filtered set, newest `created_at` first.
    fn filter_diagnoses(&self, filter: &DiagnosisFilter, page: PageRequest) -> DbResult<Vec<DiagnosticResult>>;

    fn count_filtered_diagnoses(&self, filter: &DiagnosisFilter) -> DbResult<u64>;
}
