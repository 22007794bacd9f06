//! Per-request batch loaders.
//!
//! A handler collects every key it needs for a page, then resolves them with a
//! single repository call instead of one lookup per row. Loaders hold no cache;
//! build a new one for each request.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::db::DbResult;
use crate::models::{DiagnosticResult, Patient};
use crate::repository::{DiagnosticResultRepository, PatientRepository};

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Batch lookup of patients by id.
pub struct PatientLoader<'a, R: PatientRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: PatientRepository + ?Sized> PatientLoader<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Every requested id maps to its patient, or `None` when it doesn't exist.
    pub fn load(&self, ids: &[Uuid]) -> DbResult<HashMap<Uuid, Option<Patient>>> {
        let keys = dedup(ids);
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        tracing::debug!(requested = ids.len(), unique = keys.len(), "batch loading patients");
        let mut found: HashMap<Uuid, Patient> = self
            .repo
            .get_patients_by_ids(&keys)?
            .into_iter()
            .map(|p| (p.id(), p))
            .collect();

        Ok(keys
            .into_iter()
            .map(|id| (id, found.remove(&id)))
            .collect())
    }
}

/// Batch lookup of diagnostic results grouped by owning patient.
pub struct DiagnosticResultsLoader<'a, R: DiagnosticResultRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: DiagnosticResultRepository + ?Sized> DiagnosticResultsLoader<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Every requested patient id maps to its results, newest first. Patients
    /// without results map to an empty list.
    pub fn load(&self, patient_ids: &[Uuid]) -> DbResult<HashMap<Uuid, Vec<DiagnosticResult>>> {
        let keys = dedup(patient_ids);
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        tracing::debug!(patients = keys.len(), "batch loading diagnostic results");
        let mut grouped: HashMap<Uuid, Vec<DiagnosticResult>> =
            keys.iter().map(|id| (*id, Vec::new())).collect();
        for result in self.repo.list_results_for_patients(&keys)? {
            if let Some(results) = grouped.get_mut(&result.patient_id()) {
                results.push(result);
            }
        }
        Ok(grouped)
    }
}
