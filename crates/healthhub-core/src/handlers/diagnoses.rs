//! Diagnostic result commands and queries.

use uuid::Uuid;

use super::{audit, non_negative, patient_not_found, require_id, Handlers};
use super::{AddDiagnosticResult, GetDiagnoses, GetPatientDiagnosticResults, UpdateDiagnosticResult};
use crate::context::RequestContext;
use crate::error::{HealthHubError, HealthHubResult};
use crate::loader::PatientLoader;
use crate::models::{
    DiagnosisFilter, DiagnosticResult, DiagnosticResultView, Page, PageRequest, PatientSummary,
    ValidationError,
};
use crate::repository::{DiagnosticResultRepository, PatientRepository};
use crate::sanitize;

impl<'a, S> Handlers<'a, S>
where
    S: PatientRepository + DiagnosticResultRepository + ?Sized,
{
    /// Record a result for an existing patient and mark the patient updated, in
    /// one atomic write.
    pub fn add_diagnostic_result(
        &self,
        ctx: &RequestContext,
        cmd: AddDiagnosticResult,
    ) -> HealthHubResult<DiagnosticResultView> {
        let patient_id = require_id("patientId", cmd.patient_id)?;

        ctx.check_cancelled()?;
        let mut patient = self
            .store
            .get_patient(patient_id)?
            .ok_or_else(|| patient_not_found(patient_id))?;

        let result = DiagnosticResult::create(patient_id, &cmd.diagnosis, cmd.notes.as_deref())?;

        patient.touch();

        ctx.check_cancelled()?;
        if !self.store.record_result_for_patient(&result, &patient)? {
            // Deleted between the read and the write
            return Err(patient_not_found(patient_id));
        }
        audit(ctx, "create", "DiagnosticResult", result.id());

        Ok(DiagnosticResultView::from(&result))
    }

    /// Update the notes of a result. A blank value clears them.
    pub fn update_diagnostic_result(
        &self,
        ctx: &RequestContext,
        cmd: UpdateDiagnosticResult,
    ) -> HealthHubResult<DiagnosticResultView> {
        let id = require_id("resultId", cmd.result_id)?;

        ctx.check_cancelled()?;
        let mut result = self
            .store
            .get_diagnostic_result(id)?
            .ok_or_else(|| HealthHubError::not_found("DiagnosticResult", id))?;

        if let Some(diagnosis) = cmd.diagnosis.as_deref() {
            if diagnosis.trim() != result.diagnosis() {
                tracing::warn!(result_id = %id, "diagnosis text is immutable, ignoring change");
            }
        }

        if let Some(notes) = cmd.notes.as_deref() {
            result.update_notes(Some(notes))?;

            ctx.check_cancelled()?;
            if !self.store.update_diagnostic_result(&result)? {
                return Err(HealthHubError::not_found("DiagnosticResult", id));
            }
            audit(ctx, "update", "DiagnosticResult", id);
        }

        Ok(DiagnosticResultView::from(&result))
    }

    /// A patient's results, newest first. With a limit only the newest `limit`
    /// are returned; the total still counts them all.
    pub fn get_patient_diagnostic_results(
        &self,
        ctx: &RequestContext,
        query: GetPatientDiagnosticResults,
    ) -> HealthHubResult<Page<DiagnosticResultView>> {
        let patient_id = require_id("patientId", query.patient_id)?;
        sanitize::require_valid_limit(query.limit)?;
        let limit = non_negative(query.limit);

        ctx.check_cancelled()?;
        let results = match limit {
            Some(limit) => self.store.latest_results_for_patient(patient_id, limit)?,
            None => self.store.list_results_for_patient(patient_id)?,
        };

        ctx.check_cancelled()?;
        let total = self.store.count_results_for_patient(patient_id)?;

        let views = results.iter().map(DiagnosticResultView::from).collect();
        Ok(Page::new(views, total, PageRequest::from_skip_take(None, limit)))
    }

    /// Filtered results across patients, newest created first, each with a
    /// summary of its patient.
    pub fn get_diagnoses(&self, ctx: &RequestContext, query: GetDiagnoses) -> HealthHubResult<Page<DiagnosticResultView>> {
        sanitize::require_valid_window(query.skip, query.take)?;
        let filter = sanitize_filter(query.filter)?;
        let request = PageRequest::from_skip_take(non_negative(query.skip), non_negative(query.take));
        tracing::info!(?filter, skip = ?query.skip, take = ?query.take, "get diagnoses");

        ctx.check_cancelled()?;
        let results = self.store.filter_diagnoses(&filter, request)?;

        ctx.check_cancelled()?;
        let total = self.store.count_filtered_diagnoses(&filter)?;

        ctx.check_cancelled()?;
        let patient_ids: Vec<Uuid> = results.iter().map(DiagnosticResult::patient_id).collect();
        let patients = PatientLoader::new(self.store).load(&patient_ids)?;

        let today = Self::today();
        let views = results
            .iter()
            .map(|result| {
                let summary = patients
                    .get(&result.patient_id())
                    .and_then(Option::as_ref)
                    .map(|p| PatientSummary::new(p, today));
                DiagnosticResultView::from(result).with_patient(summary)
            })
            .collect();

        Ok(Page::new(views, total, request))
    }
}

fn sanitize_filter(filter: DiagnosisFilter) -> Result<DiagnosisFilter, ValidationError> {
    if let (Some(after), Some(before)) = (filter.created_after, filter.created_before) {
        if after > before {
            return Err(ValidationError::new(
                "createdAfter",
                "must not be later than createdBefore",
            ));
        }
    }

    let diagnosis_type = sanitize::sanitize_search_term(filter.diagnosis_type.as_deref());
    Ok(DiagnosisFilter {
        diagnosis_type: (!diagnosis_type.is_empty()).then_some(diagnosis_type),
        ..filter
    })
}
