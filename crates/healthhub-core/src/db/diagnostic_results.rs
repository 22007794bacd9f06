//! Diagnostic result database operations.

use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use super::patients::write_patient;
use super::{
    decode_timestamp, decode_uuid, encode_timestamp, id_chunks, limit_offset, needle,
    placeholders, Database, DbError, DbResult,
};
use crate::models::{DiagnosisFilter, DiagnosticResult, PageRequest, Patient};
use crate::repository::DiagnosticResultRepository;

const RESULT_COLUMNS: &str =
    "d.id, d.patient_id, d.diagnosis, d.notes, d.timestamp_utc, d.created_at, d.is_active";

/// ?1 type needle, ?2 active flag, ?3 created on or after, ?4 created on or before.
const FILTER_PREDICATE: &str = r#"
    (?1 IS NULL OR instr(unicode_lower(d.diagnosis), ?1) > 0)
    AND (?2 IS NULL OR d.is_active = ?2)
    AND (?3 IS NULL OR d.created_at >= ?3)
    AND (?4 IS NULL OR d.created_at <= ?4)
"#;

impl DiagnosticResultRepository for Database {
    fn get_diagnostic_result(&self, id: Uuid) -> DbResult<Option<DiagnosticResult>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM diagnostic_results d WHERE d.id = ?", RESULT_COLUMNS),
                [id.to_string()],
                result_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn list_diagnostic_results(&self) -> DbResult<Vec<DiagnosticResult>> {
        self.filter_diagnoses(&DiagnosisFilter::default(), PageRequest::unpaged())
    }

    fn count_diagnostic_results(&self) -> DbResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM diagnostic_results", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn diagnostic_result_exists(&self, id: Uuid) -> DbResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM diagnostic_results WHERE id = ?)",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_diagnostic_results_by_ids(&self, ids: &[Uuid]) -> DbResult<Vec<DiagnosticResult>> {
        let mut results = Vec::with_capacity(ids.len());
        for chunk in id_chunks(ids) {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {} FROM diagnostic_results d WHERE d.id IN ({})",
                RESULT_COLUMNS,
                placeholders(chunk.len())
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), result_row)?;
            results.extend(collect_results(rows)?);
        }
        Ok(results)
    }

    fn list_results_for_patient(&self, patient_id: Uuid) -> DbResult<Vec<DiagnosticResult>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM diagnostic_results d
            WHERE d.patient_id = ?
            ORDER BY d.timestamp_utc DESC, d.id DESC
            "#,
            RESULT_COLUMNS
        ))?;

        let rows = stmt.query_map([patient_id.to_string()], result_row)?;
        collect_results(rows)
    }

    fn latest_results_for_patient(&self, patient_id: Uuid, count: u64) -> DbResult<Vec<DiagnosticResult>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM diagnostic_results d
            WHERE d.patient_id = ?1
            ORDER BY d.timestamp_utc DESC, d.id DESC
            LIMIT ?2
            "#,
            RESULT_COLUMNS
        ))?;

        let limit = i64::try_from(count).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![patient_id.to_string(), limit], result_row)?;
        collect_results(rows)
    }

    fn count_results_for_patient(&self, patient_id: Uuid) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM diagnostic_results WHERE patient_id = ?",
            [patient_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_results_for_patients(&self, patient_ids: &[Uuid]) -> DbResult<Vec<DiagnosticResult>> {
        let mut results = Vec::new();
        for chunk in id_chunks(patient_ids) {
            let mut stmt = self.conn.prepare(&format!(
                r#"
                SELECT {} FROM diagnostic_results d
                WHERE d.patient_id IN ({})
                ORDER BY d.patient_id, d.timestamp_utc DESC, d.id DESC
                "#,
                RESULT_COLUMNS,
                placeholders(chunk.len())
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), result_row)?;
            results.extend(collect_results(rows)?);
        }
        Ok(results)
    }

    fn insert_diagnostic_result(&self, result: &DiagnosticResult) -> DbResult<()> {
        insert_result(&self.conn, result)
    }

    fn record_result_for_patient(&self, result: &DiagnosticResult, patient: &Patient) -> DbResult<bool> {
        let tx = self.transaction()?;
        if !write_patient(&tx, patient)? {
            return Ok(false);
        }
        insert_result(&tx, result)?;
        tx.commit()?;
        Ok(true)
    }

    fn update_diagnostic_result(&self, result: &DiagnosticResult) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE diagnostic_results SET
                diagnosis = ?2,
                notes = ?3,
                is_active = ?4
            WHERE id = ?1
            "#,
            params![
                result.id().to_string(),
                result.diagnosis(),
                result.notes(),
                result.is_active(),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    fn delete_diagnostic_result(&self, id: Uuid) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM diagnostic_results WHERE id = ?", [id.to_string()])?;
        Ok(rows_affected > 0)
    }

    fn filter_diagnoses(&self, filter: &DiagnosisFilter, page: PageRequest) -> DbResult<Vec<DiagnosticResult>> {
        let (limit, offset) = limit_offset(page);
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM diagnostic_results d
            WHERE {}
            ORDER BY d.created_at DESC, d.id DESC
            LIMIT ?5 OFFSET ?6
            "#,
            RESULT_COLUMNS, FILTER_PREDICATE
        ))?;

        let rows = stmt.query_map(
            params![
                needle(filter.diagnosis_type.as_deref()),
                filter.is_active,
                filter.created_after.map(encode_timestamp),
                filter.created_before.map(encode_timestamp),
                limit,
                offset,
            ],
            result_row,
        )?;
        collect_results(rows)
    }

    fn count_filtered_diagnoses(&self, filter: &DiagnosisFilter) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM diagnostic_results d WHERE {}", FILTER_PREDICATE),
            params![
                needle(filter.diagnosis_type.as_deref()),
                filter.is_active,
                filter.created_after.map(encode_timestamp),
                filter.created_before.map(encode_timestamp),
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn insert_result(conn: &Connection, result: &DiagnosticResult) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO diagnostic_results (
            id, patient_id, diagnosis, notes, timestamp_utc, created_at, is_active
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            result.id().to_string(),
            result.patient_id().to_string(),
            result.diagnosis(),
            result.notes(),
            encode_timestamp(result.timestamp_utc()),
            encode_timestamp(result.created_at()),
            result.is_active(),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, msg) if err.code == ErrorCode::ConstraintViolation => {
            DbError::Constraint(msg.unwrap_or_else(|| err.to_string()))
        }
        other => other.into(),
    })?;
    Ok(())
}

/// Intermediate row struct for database mapping.
struct ResultRow {
    id: String,
    patient_id: String,
    diagnosis: String,
    notes: Option<String>,
    timestamp_utc: String,
    created_at: String,
    is_active: bool,
}

fn result_row(row: &Row<'_>) -> rusqlite::Result<ResultRow> {
    Ok(ResultRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        diagnosis: row.get(2)?,
        notes: row.get(3)?,
        timestamp_utc: row.get(4)?,
        created_at: row.get(5)?,
        is_active: row.get(6)?,
    })
}

fn collect_results<I>(rows: I) -> DbResult<Vec<DiagnosticResult>>
where
    I: Iterator<Item = rusqlite::Result<ResultRow>>,
{
    let mut results = Vec::new();
    for row in rows {
        results.push(row?.try_into()?);
    }
    Ok(results)
}

impl TryFrom<ResultRow> for DiagnosticResult {
    type Error = DbError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        Ok(DiagnosticResult::restore(
            decode_uuid(&row.id)?,
            decode_uuid(&row.patient_id)?,
            row.diagnosis,
            row.notes,
            decode_timestamp(&row.timestamp_utc)?,
            decode_timestamp(&row.created_at)?,
            row.is_active,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::PatientRepository;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn setup_db() -> (Database, Patient) {
        let db = Database::open_in_memory().unwrap();
        let dob = NaiveDate::from_ymd_opt(1980, 1, 1).unwrap();
        let patient = Patient::create("Jan", "Novák", dob).unwrap();
        db.insert_patient(&patient).unwrap();
        (db, patient)
    }

    fn add_result_at(db: &Database, patient_id: Uuid, diagnosis: &str, day: u32) -> DiagnosticResult {
        let at = Utc.with_ymd_and_hms(2024, 1, day, 8, 0, 0).unwrap();
        let result = DiagnosticResult::create_at(patient_id, diagnosis, None, at).unwrap();
        db.insert_diagnostic_result(&result).unwrap();
        result
    }

    #[test]
    fn test_insert_and_get() {
        let (db, patient) = setup_db();
        let result = DiagnosticResult::create(patient.id(), "Chřipka", Some("Mild")).unwrap();
        db.insert_diagnostic_result(&result).unwrap();

        let retrieved = db.get_diagnostic_result(result.id()).unwrap().unwrap();
        assert_eq!(retrieved, result);
    }

    #[test]
    fn test_insert_for_missing_patient_is_constraint() {
        let (db, _) = setup_db();
        let orphan = DiagnosticResult::create(Uuid::new_v4(), "Chřipka", None).unwrap();

        let err = db.insert_diagnostic_result(&orphan).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn test_list_newest_first_and_latest() {
        let (db, patient) = setup_db();
        add_result_at(&db, patient.id(), "Angína", 1);
        add_result_at(&db, patient.id(), "Chřipka", 3);
        add_result_at(&db, patient.id(), "Rýma", 2);

        let all: Vec<String> = db
            .list_results_for_patient(patient.id())
            .unwrap()
            .iter()
            .map(|r| r.diagnosis().to_string())
            .collect();
        assert_eq!(all, vec!["Chřipka", "Rýma", "Angína"]);

        let latest = db.latest_results_for_patient(patient.id(), 2).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].diagnosis(), "Chřipka");
        assert_eq!(db.count_results_for_patient(patient.id()).unwrap(), 3);
    }

    #[test]
    fn test_update_notes_and_active_flag() {
        let (db, patient) = setup_db();
        let mut result = add_result_at(&db, patient.id(), "Angína", 1);

        result.update_notes(Some("Resolved")).unwrap();
        result.deactivate();
        assert!(db.update_diagnostic_result(&result).unwrap());

        let retrieved = db.get_diagnostic_result(result.id()).unwrap().unwrap();
        assert_eq!(retrieved.notes(), Some("Resolved"));
        assert!(!retrieved.is_active());
    }

    #[test]
    fn test_batch_by_patients() {
        let (db, jan) = setup_db();
        let dob = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let petr = Patient::create("Petr", "Svoboda", dob).unwrap();
        db.insert_patient(&petr).unwrap();

        add_result_at(&db, jan.id(), "Angína", 1);
        add_result_at(&db, petr.id(), "Chřipka", 2);
        add_result_at(&db, petr.id(), "Rýma", 3);

        let results = db.list_results_for_patients(&[jan.id(), petr.id()]).unwrap();
        assert_eq!(results.len(), 3);
        assert!(db.list_results_for_patients(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_filter_diagnoses() {
        let (db, patient) = setup_db();
        let mut inactive = DiagnosticResult::create(patient.id(), "Chronic asthma", None).unwrap();
        inactive.deactivate();
        db.insert_diagnostic_result(&inactive).unwrap();
        let active = DiagnosticResult::create(patient.id(), "chronic bronchitis", None).unwrap();
        db.insert_diagnostic_result(&active).unwrap();
        let flu = DiagnosticResult::create(patient.id(), "Flu", None).unwrap();
        db.insert_diagnostic_result(&flu).unwrap();

        let by_type = DiagnosisFilter::by_type("CHRONIC");
        assert_eq!(db.count_filtered_diagnoses(&by_type).unwrap(), 2);

        let only_active = DiagnosisFilter {
            is_active: Some(true),
            ..by_type.clone()
        };
        let found = db.filter_diagnoses(&only_active, PageRequest::unpaged()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), active.id());

        let future = DiagnosisFilter {
            created_after: Some(Utc::now() + Duration::days(1)),
            ..DiagnosisFilter::default()
        };
        assert_eq!(db.count_filtered_diagnoses(&future).unwrap(), 0);
    }

    #[test]
    fn test_entity_level_lookups() {
        let (db, patient) = setup_db();
        let first = add_result_at(&db, patient.id(), "Angína", 1);
        let second = add_result_at(&db, patient.id(), "Chřipka", 2);

        assert_eq!(db.count_diagnostic_results().unwrap(), 2);
        assert!(db.diagnostic_result_exists(first.id()).unwrap());
        assert!(!db.diagnostic_result_exists(Uuid::new_v4()).unwrap());

        let all = db.list_diagnostic_results().unwrap();
        assert_eq!(all.len(), 2);

        let batch = db
            .get_diagnostic_results_by_ids(&[second.id(), Uuid::new_v4(), second.id()])
            .unwrap();
        assert_eq!(batch, vec![second]);
    }

    #[test]
    fn test_created_bounds_are_inclusive() {
        let (db, patient) = setup_db();
        let before = add_result_at(&db, patient.id(), "Angína", 1);
        let exact = add_result_at(&db, patient.id(), "Chřipka", 2);
        add_result_at(&db, patient.id(), "Rýma", 3);
        let at = exact.created_at();

        let after_at = DiagnosisFilter {
            created_after: Some(at),
            ..DiagnosisFilter::default()
        };
        assert_eq!(db.count_filtered_diagnoses(&after_at).unwrap(), 2);

        let before_at = DiagnosisFilter {
            created_before: Some(at),
            ..DiagnosisFilter::default()
        };
        let found = db.filter_diagnoses(&before_at, PageRequest::unpaged()).unwrap();
        let ids: Vec<Uuid> = found.iter().map(DiagnosticResult::id).collect();
        assert_eq!(ids, vec![exact.id(), before.id()]);

        let exactly_at = DiagnosisFilter {
            created_after: Some(at),
            created_before: Some(at),
            ..DiagnosisFilter::default()
        };
        let found = db.filter_diagnoses(&exactly_at, PageRequest::unpaged()).unwrap();
        assert_eq!(found, vec![exact]);
    }

    #[test]
    fn test_record_result_touches_patient() {
        let (db, mut patient) = setup_db();
        patient.touch();
        let result = DiagnosticResult::create(patient.id(), "Chřipka", None).unwrap();

        assert!(db.record_result_for_patient(&result, &patient).unwrap());
        assert_eq!(db.count_results_for_patient(patient.id()).unwrap(), 1);
        let stored = db.get_patient(patient.id()).unwrap().unwrap();
        assert_eq!(stored.updated_at(), patient.updated_at());
    }

    #[test]
    fn test_record_result_for_missing_patient_writes_nothing() {
        let (db, _) = setup_db();
        let ghost = Patient::create("Petr", "Svoboda", NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()).unwrap();
        let result = DiagnosticResult::create(ghost.id(), "Chřipka", None).unwrap();

        assert!(!db.record_result_for_patient(&result, &ghost).unwrap());
        assert!(db.get_diagnostic_result(result.id()).unwrap().is_none());
    }

    #[test]
    fn test_record_result_rolls_back_when_patient_write_fails() {
        let (db, mut patient) = setup_db();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER freeze_patients BEFORE UPDATE ON patients
                 BEGIN SELECT RAISE(ABORT, 'patients are read-only'); END;",
            )
            .unwrap();
        patient.touch();
        let result = DiagnosticResult::create(patient.id(), "Chřipka", None).unwrap();

        assert!(db.record_result_for_patient(&result, &patient).is_err());
        assert_eq!(db.count_results_for_patient(patient.id()).unwrap(), 0);
    }

    #[test]
    fn test_record_result_rolls_back_patient_when_insert_fails() {
        let (db, mut patient) = setup_db();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER freeze_results BEFORE INSERT ON diagnostic_results
                 BEGIN SELECT RAISE(ABORT, 'results are read-only'); END;",
            )
            .unwrap();
        patient.touch();
        let result = DiagnosticResult::create(patient.id(), "Chřipka", None).unwrap();

        assert!(db.record_result_for_patient(&result, &patient).is_err());
        let stored = db.get_patient(patient.id()).unwrap().unwrap();
        assert!(stored.updated_at().is_none());
    }
}
