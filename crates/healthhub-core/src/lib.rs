//! HealthHub Core Library
//!
//! Patient records core: validation, sanitization, filtering, pagination and
//! batched lookups between a transport (GraphQL, REST, desktop shell) and
//! storage.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ HealthHubCore (FFI) ──▶ QueryCache ──(miss)──┐
//!                                                       │
//!                        Sanitizer ◀── Handlers ◀───────┘
//!                                         │
//!                       ┌─────────────────┼──────────────────┐
//!                       ▼                 ▼                  ▼
//!               PatientRepository   Batch loaders   DiagnosticResultRepository
//!                       │                 │                  │
//!                       └─────────────────▼──────────────────┘
//!                                 SQLite (Database)
//! ```
//!
//! Every list comes back in the same [`Page`] envelope. Commands clear the
//! query cache.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage implementing the repository traits
//! - [`models`]: Domain types (Patient, DiagnosticResult, filters, views, Page)
//! - [`sanitize`]: Search-term cleaning and parameter validation
//! - [`repository`]: Storage contracts
//! - [`loader`]: Per-request batch loaders
//! - [`handlers`]: Query and command handlers
//! - [`cache`]: Read-through query cache
//! - [`config`]: Startup configuration

pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod handlers;
pub mod loader;
pub mod models;
pub mod repository;
pub mod sanitize;

// Re-export commonly used types
pub use config::CoreConfig;
pub use context::{CallerIdentity, CancellationToken, RequestContext};
pub use db::Database;
pub use error::{HealthHubError, HealthHubResult};
pub use handlers::Handlers;
pub use models::{
    DiagnosisFilter, DiagnosticResult, DiagnosticResultView, Page, PageInfo, PageRequest,
    Patient, PatientDetailView, PatientSummary, PatientView,
};
pub use repository::{DiagnosticResultRepository, PatientRepository};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use cache::{CacheKey, QueryCache};
use chrono::{DateTime, NaiveDate, Utc};
use handlers::{
    AddDiagnosticResult, CreatePatient, GetDiagnoses, GetPatientDiagnosticResults, GetPatients,
    SearchPatients, UpdateDiagnosticResult, UpdatePatient,
};
use uuid::Uuid;

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path with default settings.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<HealthHubCore>, HealthHubError> {
    let db = Database::open(&path)?;
    Ok(HealthHubCore::build(db, &CoreConfig::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<HealthHubCore>, HealthHubError> {
    let db = Database::open_in_memory()?;
    Ok(HealthHubCore::build(db, &CoreConfig::default()))
}

/// Open the database described by `HEALTHHUB_*` environment variables.
#[uniffi::export]
pub fn open_from_env() -> Result<Arc<HealthHubCore>, HealthHubError> {
    let config = CoreConfig::from_env()?;
    HealthHubCore::open(&config)
}

/// Install a formatting subscriber. Calling it again is a no-op.
#[uniffi::export]
pub fn init_logging(filter: String) -> Result<(), HealthHubError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .map_err(|e| HealthHubError::Validation(format!("log filter: {}", e)))?;

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_err()
    {
        tracing::debug!("logging already initialized");
    }
    Ok(())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe handle for FFI callers.
///
/// Every method takes the caller identity established by the transport. Ids
/// are UUID strings, dates `YYYY-MM-DD` and timestamps RFC 3339.
#[derive(uniffi::Object)]
pub struct HealthHubCore {
    db: Arc<Mutex<Database>>,
    cache: QueryCache,
}

impl HealthHubCore {
    /// Open the configured database, in memory when no path is set.
    pub fn open(config: &CoreConfig) -> Result<Arc<Self>, HealthHubError> {
        let db = match config.database_path() {
            Some(path) => Database::open(path)?,
            None => Database::open_in_memory()?,
        };
        Ok(Self::build(db, config))
    }

    fn build(db: Database, config: &CoreConfig) -> Arc<Self> {
        tracing::info!(
            cache_ttl_secs = config.cache_ttl().as_secs(),
            cache_capacity = config.cache_capacity(),
            "healthhub core ready"
        );
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            cache: QueryCache::new(config.cache_ttl(), config.cache_capacity()),
        })
    }

    /// Run a query through the cache.
    ///
    /// The database lock is held until the loaded value is cached, so a command
    /// cannot slip its invalidation in between.
    fn query<T, F>(&self, key: CacheKey, run: F) -> HealthHubResult<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
        F: FnOnce(&Handlers<'_, Database>) -> HealthHubResult<T>,
    {
        let db = self.db.lock()?;
        self.cache.get_or_load(key, || {
            let handlers = Handlers::new(&*db);
            run(&handlers)
        })
    }

    /// Run a command and clear the cache when it succeeds, before the database
    /// lock is released.
    fn command<T, F>(&self, run: F) -> HealthHubResult<T>
    where
        F: FnOnce(&Handlers<'_, Database>) -> HealthHubResult<T>,
    {
        let db = self.db.lock()?;
        let handlers = Handlers::new(&*db);
        let output = run(&handlers)?;
        self.cache.invalidate_all();
        Ok(output)
    }
}

#[uniffi::export]
impl HealthHubCore {
    // =========================================================================
    // Patient Commands
    // =========================================================================

    /// Create a new patient.
    pub fn create_patient(
        &self,
        caller: String,
        first_name: String,
        last_name: String,
        date_of_birth: String,
    ) -> Result<FfiPatient, HealthHubError> {
        let ctx = context(caller)?;
        let cmd = CreatePatient {
            first_name,
            last_name,
            date_of_birth: parse_date("dateOfBirth", &date_of_birth)?,
        };
        let view = self.command(|h| h.create_patient(&ctx, cmd))?;
        Ok(view.into())
    }

    /// Update provided fields of a patient.
    pub fn update_patient(
        &self,
        caller: String,
        patient_id: String,
        first_name: Option<String>,
        last_name: Option<String>,
        date_of_birth: Option<String>,
    ) -> Result<FfiPatient, HealthHubError> {
        let ctx = context(caller)?;
        let cmd = UpdatePatient {
            patient_id: parse_id("patientId", &patient_id)?,
            first_name,
            last_name,
            date_of_birth: date_of_birth
                .as_deref()
                .map(|d| parse_date("dateOfBirth", d))
                .transpose()?,
        };
        let view = self.command(|h| h.update_patient(&ctx, cmd))?;
        Ok(view.into())
    }

    /// Delete a patient and its results. False when it didn't exist.
    pub fn delete_patient(&self, caller: String, patient_id: String) -> Result<bool, HealthHubError> {
        let ctx = context(caller)?;
        let id = parse_id("patientId", &patient_id)?;
        self.command(|h| h.delete_patient(&ctx, id))
    }

    // =========================================================================
    // Diagnostic Result Commands
    // =========================================================================

    pub fn add_diagnostic_result(
        &self,
        caller: String,
        patient_id: String,
        diagnosis: String,
        notes: Option<String>,
    ) -> Result<FfiDiagnosticResult, HealthHubError> {
        let ctx = context(caller)?;
        let cmd = AddDiagnosticResult {
            patient_id: parse_id("patientId", &patient_id)?,
            diagnosis,
            notes,
        };
        let view = self.command(|h| h.add_diagnostic_result(&ctx, cmd))?;
        Ok(view.into())
    }

    /// Update the notes of a result. Diagnosis text cannot change.
    pub fn update_diagnostic_result(
        &self,
        caller: String,
        result_id: String,
        diagnosis: Option<String>,
        notes: Option<String>,
    ) -> Result<FfiDiagnosticResult, HealthHubError> {
        let ctx = context(caller)?;
        let cmd = UpdateDiagnosticResult {
            result_id: parse_id("resultId", &result_id)?,
            diagnosis,
            notes,
        };
        let view = self.command(|h| h.update_diagnostic_result(&ctx, cmd))?;
        Ok(view.into())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// List patients matching a search term, paged.
    pub fn get_patients(
        &self,
        caller: String,
        search_term: Option<String>,
        page: Option<i32>,
        page_size: Option<i32>,
    ) -> Result<FfiPatientPage, HealthHubError> {
        let ctx = context(caller)?;
        let query = GetPatients {
            search_term,
            page,
            page_size,
        };
        let page = self.query(CacheKey::Patients(query.clone()), |h| h.get_patients(&ctx, query))?;
        Ok(page.into())
    }

    /// Get a patient with its results, newest first.
    pub fn get_patient(&self, caller: String, patient_id: String) -> Result<Option<FfiPatientDetail>, HealthHubError> {
        let ctx = context(caller)?;
        let id = parse_id("patientId", &patient_id)?;
        let detail = self.query(CacheKey::Patient(id), |h| h.get_patient_by_id(&ctx, id))?;
        Ok(detail.map(Into::into))
    }

    pub fn get_patient_diagnostic_results(
        &self,
        caller: String,
        patient_id: String,
        limit: Option<i32>,
    ) -> Result<FfiDiagnosticResultPage, HealthHubError> {
        let ctx = context(caller)?;
        let query = GetPatientDiagnosticResults {
            patient_id: parse_id("patientId", &patient_id)?,
            limit,
        };
        let page = self.query(CacheKey::PatientResults(query.clone()), |h| {
            h.get_patient_diagnostic_results(&ctx, query)
        })?;
        Ok(page.into())
    }

    /// Filtered diagnoses across patients, newest first.
    pub fn get_diagnoses(
        &self,
        caller: String,
        filter: FfiDiagnosisFilter,
        skip: Option<i32>,
        take: Option<i32>,
    ) -> Result<FfiDiagnosticResultPage, HealthHubError> {
        let ctx = context(caller)?;
        let query = GetDiagnoses {
            filter: filter.try_into()?,
            skip,
            take,
        };
        let page = self.query(CacheKey::Diagnoses(query.clone()), |h| h.get_diagnoses(&ctx, query))?;
        Ok(page.into())
    }

    /// Search patients by term with optional age range and diagnosis presence.
    #[allow(clippy::too_many_arguments)]
    pub fn search_patients(
        &self,
        caller: String,
        search_term: String,
        min_age: Option<i32>,
        max_age: Option<i32>,
        has_diagnosis: Option<bool>,
        page: Option<i32>,
        page_size: Option<i32>,
    ) -> Result<FfiPatientPage, HealthHubError> {
        let ctx = context(caller)?;
        let query = SearchPatients {
            search_term,
            min_age,
            max_age,
            has_diagnosis,
            page,
            page_size,
        };
        let page = self.query(CacheKey::Search(query.clone()), |h| h.search_patients(&ctx, query))?;
        Ok(page.into())
    }

    pub fn count_patients(&self, caller: String) -> Result<u64, HealthHubError> {
        let ctx = context(caller)?;
        self.query(CacheKey::PatientCount, |h| h.count_patients(&ctx))
    }
}

// =========================================================================
// Input Parsing
// =========================================================================

fn context(caller: String) -> HealthHubResult<RequestContext> {
    Ok(RequestContext::new(CallerIdentity::new(caller)?))
}

fn parse_id(field: &str, value: &str) -> HealthHubResult<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| HealthHubError::Validation(format!("{}: '{}' is not a valid id", field, value)))
}

fn parse_date(field: &str, value: &str) -> HealthHubResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        HealthHubError::Validation(format!("{}: '{}' is not a YYYY-MM-DD date", field, value))
    })
}

fn parse_timestamp(field: &str, value: &str) -> HealthHubResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            HealthHubError::Validation(format!("{}: '{}' is not an RFC 3339 timestamp", field, value))
        })
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub date_of_birth: String,
    pub age: i32,
    pub last_diagnosis: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<PatientView> for FfiPatient {
    fn from(view: PatientView) -> Self {
        Self {
            id: view.id.to_string(),
            first_name: view.first_name,
            last_name: view.last_name,
            full_name: view.full_name,
            date_of_birth: db::encode_date(view.date_of_birth),
            age: view.age,
            last_diagnosis: view.last_diagnosis,
            created_at: db::encode_timestamp(view.created_at),
            updated_at: view.updated_at.map(db::encode_timestamp),
        }
    }
}

/// FFI-safe patient summary attached to diagnosis listings.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiPatientSummary {
    pub id: String,
    pub full_name: String,
    pub date_of_birth: String,
    pub age: i32,
}

impl From<PatientSummary> for FfiPatientSummary {
    fn from(summary: PatientSummary) -> Self {
        Self {
            id: summary.id.to_string(),
            full_name: summary.full_name,
            date_of_birth: db::encode_date(summary.date_of_birth),
            age: summary.age,
        }
    }
}

/// FFI-safe diagnostic result.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiDiagnosticResult {
    pub id: String,
    pub patient_id: String,
    pub patient: Option<FfiPatientSummary>,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub timestamp_utc: String,
    pub created_at: String,
    pub is_active: bool,
}

impl From<DiagnosticResultView> for FfiDiagnosticResult {
    fn from(view: DiagnosticResultView) -> Self {
        Self {
            id: view.id.to_string(),
            patient_id: view.patient_id.to_string(),
            patient: view.patient.map(Into::into),
            diagnosis: view.diagnosis,
            notes: view.notes,
            timestamp_utc: db::encode_timestamp(view.timestamp_utc),
            created_at: db::encode_timestamp(view.created_at),
            is_active: view.is_active,
        }
    }
}

/// FFI-safe patient with its results.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiPatientDetail {
    pub patient: FfiPatient,
    pub diagnostic_results: Vec<FfiDiagnosticResult>,
}

impl From<PatientDetailView> for FfiPatientDetail {
    fn from(detail: PatientDetailView) -> Self {
        Self {
            patient: detail.patient.into(),
            diagnostic_results: detail.diagnostic_results.into_iter().map(Into::into).collect(),
        }
    }
}

/// FFI-safe page navigation.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiPageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: String,
    pub end_cursor: String,
    pub current_page: u64,
    pub total_pages: u64,
}

impl From<PageInfo> for FfiPageInfo {
    fn from(info: PageInfo) -> Self {
        Self {
            has_next_page: info.has_next_page,
            has_previous_page: info.has_previous_page,
            start_cursor: info.start_cursor,
            end_cursor: info.end_cursor,
            current_page: info.current_page,
            total_pages: info.total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiPatientPage {
    pub nodes: Vec<FfiPatient>,
    pub page_info: FfiPageInfo,
    pub total_count: u64,
}

impl From<Page<PatientView>> for FfiPatientPage {
    fn from(page: Page<PatientView>) -> Self {
        Self {
            nodes: page.nodes.into_iter().map(Into::into).collect(),
            page_info: page.page_info.into(),
            total_count: page.total_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiDiagnosticResultPage {
    pub nodes: Vec<FfiDiagnosticResult>,
    pub page_info: FfiPageInfo,
    pub total_count: u64,
}

impl From<Page<DiagnosticResultView>> for FfiDiagnosticResultPage {
    fn from(page: Page<DiagnosticResultView>) -> Self {
        Self {
            nodes: page.nodes.into_iter().map(Into::into).collect(),
            page_info: page.page_info.into(),
            total_count: page.total_count,
        }
    }
}

/// FFI-safe diagnosis filter. Timestamps are RFC 3339.
#[derive(Debug, Clone, Default, PartialEq, uniffi::Record)]
pub struct FfiDiagnosisFilter {
    pub diagnosis_type: Option<String>,
    pub is_active: Option<bool>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
}

impl TryFrom<FfiDiagnosisFilter> for DiagnosisFilter {
    type Error = HealthHubError;

    fn try_from(filter: FfiDiagnosisFilter) -> Result<Self, Self::Error> {
        Ok(DiagnosisFilter {
            diagnosis_type: filter.diagnosis_type,
            is_active: filter.is_active,
            created_after: filter
                .created_after
                .as_deref()
                .map(|t| parse_timestamp("createdAfter", t))
                .transpose()?,
            created_before: filter
                .created_before
                .as_deref()
                .map(|t| parse_timestamp("createdBefore", t))
                .transpose()?,
        })
    }
}
