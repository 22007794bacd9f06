//! Patient commands and queries.

use uuid::Uuid;

use super::{audit, non_negative, patient_not_found, require_id, Handlers};
use super::{CreatePatient, GetPatients, SearchPatients, UpdatePatient};
use crate::context::RequestContext;
use crate::error::HealthHubResult;
use crate::loader::DiagnosticResultsLoader;
use crate::models::{
    DiagnosticResultView, Page, PageRequest, Patient, PatientDetailView, PatientFilter,
    PatientView, ValidationError,
};
use crate::repository::{DiagnosticResultRepository, PatientRepository};
use crate::sanitize;

impl<'a, S> Handlers<'a, S>
where
    S: PatientRepository + DiagnosticResultRepository + ?Sized,
{
    // =========================================================================
    // Commands
    // =========================================================================

    pub fn create_patient(&self, ctx: &RequestContext, cmd: CreatePatient) -> HealthHubResult<PatientView> {
        let patient = Patient::create(&cmd.first_name, &cmd.last_name, cmd.date_of_birth)?;

        ctx.check_cancelled()?;
        self.store.insert_patient(&patient)?;
        audit(ctx, "create", "Patient", patient.id());

        Ok(PatientView::new(&patient, None, Self::today()))
    }

    /// Apply the provided fields. Either name re-validates both together.
    pub fn update_patient(&self, ctx: &RequestContext, cmd: UpdatePatient) -> HealthHubResult<PatientView> {
        let id = require_id("patientId", cmd.patient_id)?;

        ctx.check_cancelled()?;
        let mut patient = self.store.get_patient(id)?.ok_or_else(|| patient_not_found(id))?;

        let mut changed = false;
        if cmd.first_name.is_some() || cmd.last_name.is_some() {
            let first_name = cmd
                .first_name
                .unwrap_or_else(|| patient.first_name().to_string());
            let last_name = cmd
                .last_name
                .unwrap_or_else(|| patient.last_name().to_string());
            patient.rename(&first_name, &last_name)?;
            changed = true;
        }
        if let Some(date_of_birth) = cmd.date_of_birth {
            patient.change_date_of_birth(date_of_birth)?;
            changed = true;
        }

        if changed {
            ctx.check_cancelled()?;
            if !self.store.update_patient(&patient)? {
                // Deleted between the read and the write
                return Err(patient_not_found(id));
            }
            audit(ctx, "update", "Patient", id);
        }

        ctx.check_cancelled()?;
        let latest = self.store.latest_results_for_patient(id, 1)?;
        let last_diagnosis = patient.last_diagnosis(&latest);
        Ok(PatientView::new(&patient, last_diagnosis, Self::today()))
    }

    /// False when the patient doesn't exist. Results are removed with the patient.
    pub fn delete_patient(&self, ctx: &RequestContext, patient_id: Uuid) -> HealthHubResult<bool> {
        let id = require_id("patientId", patient_id)?;

        ctx.check_cancelled()?;
        let deleted = self.store.delete_patient(id)?;
        if deleted {
            audit(ctx, "delete", "Patient", id);
        } else {
            tracing::debug!(patient_id = %id, "delete of unknown patient");
        }
        Ok(deleted)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_patients(&self, ctx: &RequestContext, query: GetPatients) -> HealthHubResult<Page<PatientView>> {
        let term = sanitize::sanitize_search_term(query.search_term.as_deref());
        sanitize::require_valid_pagination(query.page, query.page_size)?;

        let request = PageRequest::from_page(non_negative(query.page), non_negative(query.page_size));
        tracing::info!(term = %term, page = ?query.page, page_size = ?query.page_size, "get patients");

        self.patient_page(ctx, &PatientFilter::search(term), request)
    }

    /// `None` when the patient doesn't exist.
    pub fn get_patient_by_id(&self, ctx: &RequestContext, patient_id: Uuid) -> HealthHubResult<Option<PatientDetailView>> {
        let id = require_id("patientId", patient_id)?;

        ctx.check_cancelled()?;
        let Some(patient) = self.store.get_patient(id)? else {
            return Ok(None);
        };

        ctx.check_cancelled()?;
        let results = self.store.list_results_for_patient(id)?;
        let last_diagnosis = patient.last_diagnosis(&results);

        Ok(Some(PatientDetailView {
            patient: PatientView::new(&patient, last_diagnosis, Self::today()),
            diagnostic_results: results.iter().map(DiagnosticResultView::from).collect(),
        }))
    }

    /// Term search with optional age range and diagnosis presence, all applied
    /// by storage.
    pub fn search_patients(&self, ctx: &RequestContext, query: SearchPatients) -> HealthHubResult<Page<PatientView>> {
        let cleaned = sanitize::sanitize_query(Some(&query.search_term))?;
        let term = sanitize::sanitize_search_term(Some(&cleaned));
        if term.is_empty() {
            return Err(ValidationError::new("searchTerm", "contains no searchable text").into());
        }
        sanitize::require_valid_age_range(query.min_age, query.max_age)?;
        sanitize::require_valid_pagination(query.page, query.page_size)?;

        let filter = PatientFilter::search(term)
            .with_age_range(
                query.min_age.map(|a| a as u32),
                query.max_age.map(|a| a as u32),
                Self::today(),
            )
            .with_has_diagnosis(query.has_diagnosis);
        let request = PageRequest::from_page(non_negative(query.page), non_negative(query.page_size));
        tracing::info!(?filter, "search patients");

        self.patient_page(ctx, &filter, request)
    }

    pub fn count_patients(&self, ctx: &RequestContext) -> HealthHubResult<u64> {
        ctx.check_cancelled()?;
        Ok(self.store.count_patients()?)
    }

    /// Window, total and last diagnoses for one filtered page.
    fn patient_page(
        &self,
        ctx: &RequestContext,
        filter: &PatientFilter,
        request: PageRequest,
    ) -> HealthHubResult<Page<PatientView>> {
        ctx.check_cancelled()?;
        let patients = self.store.filter_patients(filter, request)?;

        ctx.check_cancelled()?;
        let total = self.store.count_filtered_patients(filter)?;

        ctx.check_cancelled()?;
        let ids: Vec<Uuid> = patients.iter().map(Patient::id).collect();
        let results = DiagnosticResultsLoader::new(self.store).load(&ids)?;

        let today = Self::today();
        let views = patients
            .iter()
            .map(|patient| {
                let last_diagnosis = results
                    .get(&patient.id())
                    .and_then(|r| patient.last_diagnosis(r));
                PatientView::new(patient, last_diagnosis, today)
            })
            .collect();

        Ok(Page::new(views, total, request))
    }
}
