//! FFI surface integration tests.

use std::collections::HashMap;

use healthhub_core::config::{ENV_CACHE_TTL_SECS, ENV_DATABASE_PATH};
use healthhub_core::{
    open_database, open_database_in_memory, CoreConfig, FfiDiagnosisFilter, HealthHubCore,
    HealthHubError,
};

const CALLER: &str = "nurse.station-3";

fn caller() -> String {
    CALLER.to_string()
}

fn create(core: &HealthHubCore, first: &str, last: &str, dob: &str) -> String {
    core.create_patient(caller(), first.into(), last.into(), dob.into())
        .unwrap()
        .id
}

#[test]
fn test_create_and_fetch() {
    let core = open_database_in_memory().unwrap();
    let id = create(&core, "Jan", "Novák", "1980-01-01");

    let result = core
        .add_diagnostic_result(caller(), id.clone(), "Chřipka".into(), Some("Mild".into()))
        .unwrap();
    assert_eq!(result.patient_id, id);
    assert!(result.is_active);

    let detail = core.get_patient(caller(), id).unwrap().unwrap();
    assert_eq!(detail.patient.full_name, "Jan Novák");
    assert_eq!(detail.patient.date_of_birth, "1980-01-01");
    assert_eq!(detail.patient.last_diagnosis.as_deref(), Some("Chřipka"));
    assert_eq!(detail.diagnostic_results.len(), 1);
}

#[test]
fn test_commands_invalidate_cached_queries() {
    let core = open_database_in_memory().unwrap();
    create(&core, "Jan", "Novák", "1980-01-01");

    let before = core.get_patients(caller(), None, None, None).unwrap();
    assert_eq!(before.total_count, 1);
    assert_eq!(core.count_patients(caller()).unwrap(), 1);

    create(&core, "Petr", "Svoboda", "1990-05-05");

    let after = core.get_patients(caller(), None, None, None).unwrap();
    assert_eq!(after.total_count, 2);
    assert_eq!(core.count_patients(caller()).unwrap(), 2);
}

#[test]
fn test_cached_detail_reflects_new_result() {
    let core = open_database_in_memory().unwrap();
    let id = create(&core, "Jan", "Novák", "1980-01-01");

    let empty = core.get_patient(caller(), id.clone()).unwrap().unwrap();
    assert!(empty.diagnostic_results.is_empty());

    core.add_diagnostic_result(caller(), id.clone(), "Angína".into(), None)
        .unwrap();

    let detail = core.get_patient(caller(), id).unwrap().unwrap();
    assert_eq!(detail.diagnostic_results.len(), 1);
}

#[test]
fn test_update_and_delete() {
    let core = open_database_in_memory().unwrap();
    let id = create(&core, "Jan", "Novák", "1980-01-01");

    let updated = core
        .update_patient(caller(), id.clone(), None, Some("Dvořák".into()), None)
        .unwrap();
    assert_eq!(updated.full_name, "Jan Dvořák");
    assert!(updated.updated_at.is_some());

    assert!(core.delete_patient(caller(), id.clone()).unwrap());
    assert!(!core.delete_patient(caller(), id.clone()).unwrap());
    assert!(core.get_patient(caller(), id).unwrap().is_none());
}

#[test]
fn test_update_result_notes() {
    let core = open_database_in_memory().unwrap();
    let id = create(&core, "Jan", "Novák", "1980-01-01");
    let result = core
        .add_diagnostic_result(caller(), id, "Chřipka".into(), None)
        .unwrap();

    let updated = core
        .update_diagnostic_result(caller(), result.id, Some("Angína".into()), Some("Recovered".into()))
        .unwrap();
    assert_eq!(updated.diagnosis, "Chřipka");
    assert_eq!(updated.notes.as_deref(), Some("Recovered"));
}

#[test]
fn test_blank_caller_is_unauthorized() {
    let core = open_database_in_memory().unwrap();

    let err = core.get_patients("  ".into(), None, None, None).unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");

    let err = core
        .create_patient(String::new(), "Jan".into(), "Novák".into(), "1980-01-01".into())
        .unwrap_err();
    assert!(matches!(err, HealthHubError::Unauthorized(_)));
}

#[test]
fn test_malformed_inputs_are_validation_errors() {
    let core = open_database_in_memory().unwrap();

    let err = core.get_patient(caller(), "not-a-uuid".into()).unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let err = core
        .create_patient(caller(), "Jan".into(), "Novák".into(), "01/01/1980".into())
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let filter = FfiDiagnosisFilter {
        created_after: Some("yesterday".into()),
        ..FfiDiagnosisFilter::default()
    };
    let err = core.get_diagnoses(caller(), filter, None, None).unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[test]
fn test_unknown_patient() {
    let core = open_database_in_memory().unwrap();
    let missing = uuid::Uuid::new_v4().to_string();

    assert!(core.get_patient(caller(), missing.clone()).unwrap().is_none());

    let err = core
        .add_diagnostic_result(caller(), missing.clone(), "Chřipka".into(), None)
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    let page = core
        .get_patient_diagnostic_results(caller(), missing, None)
        .unwrap();
    assert_eq!(page.total_count, 0);
    assert!(page.nodes.is_empty());
}

#[test]
fn test_diagnoses_with_filter() {
    let core = open_database_in_memory().unwrap();
    let id = create(&core, "Jan", "Novák", "1980-01-01");
    core.add_diagnostic_result(caller(), id.clone(), "Chronic asthma".into(), None)
        .unwrap();
    core.add_diagnostic_result(caller(), id, "Flu".into(), None)
        .unwrap();

    let filter = FfiDiagnosisFilter {
        diagnosis_type: Some("asthma".into()),
        created_after: Some("2000-01-01T00:00:00Z".into()),
        ..FfiDiagnosisFilter::default()
    };
    let page = core.get_diagnoses(caller(), filter, Some(0), Some(10)).unwrap();

    assert_eq!(page.total_count, 1);
    let summary = page.nodes[0].patient.as_ref().unwrap();
    assert_eq!(summary.full_name, "Jan Novák");
}

#[test]
fn test_search_patients() {
    let core = open_database_in_memory().unwrap();
    create(&core, "Jan", "Novák", "1980-01-01");
    create(&core, "Petr", "Svoboda", "1990-05-05");

    let page = core
        .search_patients(caller(), "svob".into(), None, None, None, Some(1), Some(10))
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.nodes[0].last_name, "Svoboda");
    assert_eq!(page.page_info.current_page, 1);
}

#[test]
fn test_open_database_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ffi.db").to_string_lossy().into_owned();

    let id = {
        let core = open_database(path.clone()).unwrap();
        create(&core, "Jan", "Novák", "1980-01-01")
    };

    let core = open_database(path).unwrap();
    let detail = core.get_patient(caller(), id).unwrap().unwrap();
    assert_eq!(detail.patient.last_name, "Novák");
}

#[test]
fn test_open_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configured.db");

    let mut vars = HashMap::new();
    vars.insert(ENV_DATABASE_PATH, path.to_string_lossy().into_owned());
    vars.insert(ENV_CACHE_TTL_SECS, "30".to_string());

    let config = CoreConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
    let core = HealthHubCore::open(&config).unwrap();
    create(&core, "Jan", "Novák", "1980-01-01");

    assert!(path.exists());
    assert_eq!(core.count_patients(caller()).unwrap(), 1);
}

#[test]
fn test_init_logging_twice() {
    healthhub_core::init_logging("info".into()).unwrap();
    healthhub_core::init_logging("debug".into()).unwrap();
}
