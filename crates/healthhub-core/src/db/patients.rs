//! Patient database operations.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    decode_date, decode_timestamp, decode_uuid, encode_date, encode_timestamp, id_chunks,
    limit_offset, needle, placeholders, Database, DbError, DbResult,
};
use crate::models::{PageRequest, Patient, PatientFilter, PatientName};
use crate::repository::PatientRepository;

const PATIENT_COLUMNS: &str =
    "p.id, p.first_name, p.last_name, p.date_of_birth, p.created_at, p.updated_at";

const PATIENT_ORDER: &str =
    "p.last_name COLLATE NOCASE, p.first_name COLLATE NOCASE, p.id";

/// Shared by the windowed query and its count so both see the same set.
/// ?1 needle, ?2 born on or after, ?3 born on or before, ?4 has a result.
const FILTER_PREDICATE: &str = r#"
    (?1 IS NULL
        OR instr(unicode_lower(p.first_name), ?1) > 0
        OR instr(unicode_lower(p.last_name), ?1) > 0
        OR EXISTS (
            SELECT 1 FROM diagnostic_results d
            WHERE d.patient_id = p.id AND instr(unicode_lower(d.diagnosis), ?1) > 0
        ))
    AND (?2 IS NULL OR p.date_of_birth >= ?2)
    AND (?3 IS NULL OR p.date_of_birth <= ?3)
    AND (?4 IS NULL
        OR EXISTS (SELECT 1 FROM diagnostic_results d WHERE d.patient_id = p.id) = ?4)
"#;

impl PatientRepository for Database {
    fn get_patient(&self, id: Uuid) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients p WHERE p.id = ?", PATIENT_COLUMNS),
                [id.to_string()],
                patient_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn list_patients(&self) -> DbResult<Vec<Patient>> {
        self.filter_patients(&PatientFilter::default(), PageRequest::unpaged())
    }

    fn filter_patients(&self, filter: &PatientFilter, page: PageRequest) -> DbResult<Vec<Patient>> {
        let (limit, offset) = limit_offset(page);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients p WHERE {} ORDER BY {} LIMIT ?5 OFFSET ?6",
            PATIENT_COLUMNS, FILTER_PREDICATE, PATIENT_ORDER
        ))?;

        let rows = stmt.query_map(
            params![
                needle(filter.search_term.as_deref()),
                filter.born_on_or_after.map(encode_date),
                filter.born_on_or_before.map(encode_date),
                filter.has_diagnosis,
                limit,
                offset,
            ],
            patient_row,
        )?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    fn count_filtered_patients(&self, filter: &PatientFilter) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM patients p WHERE {}", FILTER_PREDICATE),
            params![
                needle(filter.search_term.as_deref()),
                filter.born_on_or_after.map(encode_date),
                filter.born_on_or_before.map(encode_date),
                filter.has_diagnosis,
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_patients(&self) -> DbResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, first_name, last_name, date_of_birth, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                patient.id().to_string(),
                patient.first_name(),
                patient.last_name(),
                encode_date(patient.date_of_birth()),
                encode_timestamp(patient.created_at()),
                patient.updated_at().map(encode_timestamp),
            ],
        )?;
        Ok(())
    }

    fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        write_patient(&self.conn, patient)
    }

    fn delete_patient(&self, id: Uuid) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE id = ?", [id.to_string()])?;
        Ok(rows_affected > 0)
    }

    fn patient_exists(&self, id: Uuid) -> DbResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM patients WHERE id = ?)",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn get_patients_by_ids(&self, ids: &[Uuid]) -> DbResult<Vec<Patient>> {
        let mut patients = Vec::with_capacity(ids.len());
        for chunk in id_chunks(ids) {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {} FROM patients p WHERE p.id IN ({}) ORDER BY {}",
                PATIENT_COLUMNS,
                placeholders(chunk.len()),
                PATIENT_ORDER
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), patient_row)?;
            for row in rows {
                patients.push(row?.try_into()?);
            }
        }
        Ok(patients)
    }
}

/// Overwrite the mutable columns of an existing patient. False when the row is gone.
pub(super) fn write_patient(conn: &Connection, patient: &Patient) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE patients SET
            first_name = ?2,
            last_name = ?3,
            date_of_birth = ?4,
            updated_at = ?5
        WHERE id = ?1
        "#,
        params![
            patient.id().to_string(),
            patient.first_name(),
            patient.last_name(),
            encode_date(patient.date_of_birth()),
            patient.updated_at().map(encode_timestamp),
        ],
    )?;
    Ok(rows_affected > 0)
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    id: String,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    created_at: String,
    updated_at: Option<String>,
}

fn patient_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        date_of_birth: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let name = PatientName::new(&row.first_name, &row.last_name)
            .map_err(|e| DbError::InvalidData(format!("patient {}: {}", row.id, e)))?;

        Ok(Patient::restore(
            decode_uuid(&row.id)?,
            name,
            decode_date(&row.date_of_birth)?,
            decode_timestamp(&row.created_at)?,
            row.updated_at.as_deref().map(decode_timestamp).transpose()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiagnosticResult;
    use crate::repository::DiagnosticResultRepository;
    use chrono::NaiveDate;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn add_patient(db: &Database, first: &str, last: &str, dob: NaiveDate) -> Patient {
        let patient = Patient::create(first, last, dob).unwrap();
        db.insert_patient(&patient).unwrap();
        patient
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let patient = add_patient(&db, "Jan", "Novák", date(1980, 1, 1));

        let retrieved = db.get_patient(patient.id()).unwrap().unwrap();
        assert_eq!(retrieved, patient);
        assert!(db.patient_exists(patient.id()).unwrap());
        assert!(db.get_patient(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_update_patient() {
        let db = setup_db();
        let mut patient = add_patient(&db, "Jan", "Novák", date(1980, 1, 1));

        patient.rename("Jana", "Nováková").unwrap();
        assert!(db.update_patient(&patient).unwrap());

        let retrieved = db.get_patient(patient.id()).unwrap().unwrap();
        assert_eq!(retrieved.full_name(), "Jana Nováková");
        assert_eq!(retrieved.updated_at(), patient.updated_at());

        let stranger = Patient::create("Petr", "Svoboda", date(1990, 1, 1)).unwrap();
        assert!(!db.update_patient(&stranger).unwrap());
    }

    #[test]
    fn test_delete_cascades_to_results() {
        let db = setup_db();
        let patient = add_patient(&db, "Jan", "Novák", date(1980, 1, 1));
        let result = DiagnosticResult::create(patient.id(), "Chřipka", None).unwrap();
        db.insert_diagnostic_result(&result).unwrap();

        assert!(db.delete_patient(patient.id()).unwrap());
        assert!(!db.delete_patient(patient.id()).unwrap());
        assert!(db.get_diagnostic_result(result.id()).unwrap().is_none());
    }

    #[test]
    fn test_list_ordered_by_name() {
        let db = setup_db();
        add_patient(&db, "Petr", "svoboda", date(1990, 1, 1));
        add_patient(&db, "Jan", "Novák", date(1980, 1, 1));
        add_patient(&db, "Adam", "Novák", date(1985, 1, 1));

        let names: Vec<String> = db
            .list_patients()
            .unwrap()
            .iter()
            .map(Patient::full_name)
            .collect();
        assert_eq!(names, vec!["Adam Novák", "Jan Novák", "Petr svoboda"]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let db = setup_db();
        add_patient(&db, "Jan", "Novák", date(1980, 1, 1));
        add_patient(&db, "Petr", "Svoboda", date(1990, 1, 1));

        let found = db
            .filter_patients(&PatientFilter::search("NOVÁK"), PageRequest::unpaged())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].last_name(), "Novák");
    }

    #[test]
    fn test_search_matches_diagnosis() {
        let db = setup_db();
        let jan = add_patient(&db, "Jan", "Novák", date(1980, 1, 1));
        add_patient(&db, "Petr", "Svoboda", date(1990, 1, 1));
        let result = DiagnosticResult::create(jan.id(), "Hypertenze", None).unwrap();
        db.insert_diagnostic_result(&result).unwrap();

        let filter = PatientFilter::search("hyper");
        let found = db.filter_patients(&filter, PageRequest::unpaged()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), jan.id());
        assert_eq!(db.count_filtered_patients(&filter).unwrap(), 1);
    }

    #[test]
    fn test_filter_by_birth_range_and_diagnosis() {
        let db = setup_db();
        let old = add_patient(&db, "Jan", "Novák", date(1950, 1, 1));
        let young = add_patient(&db, "Petr", "Svoboda", date(2000, 1, 1));
        let result = DiagnosticResult::create(young.id(), "Angína", None).unwrap();
        db.insert_diagnostic_result(&result).unwrap();

        let filter = PatientFilter {
            born_on_or_after: Some(date(1990, 1, 1)),
            ..PatientFilter::default()
        };
        let found = db.filter_patients(&filter, PageRequest::unpaged()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), young.id());

        let without = PatientFilter::default().with_has_diagnosis(Some(false));
        let found = db.filter_patients(&without, PageRequest::unpaged()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), old.id());
    }

    #[test]
    fn test_pagination_and_count() {
        let db = setup_db();
        for i in 0..5 {
            add_patient(&db, "Jan", &format!("Novák{}", i), date(1980, 1, 1));
        }

        let page = PageRequest::from_skip_take(Some(3), Some(2));
        let found = db.filter_patients(&PatientFilter::default(), page).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].last_name(), "Novák3");
        assert_eq!(db.count_filtered_patients(&PatientFilter::default()).unwrap(), 5);
        assert_eq!(db.count_patients().unwrap(), 5);
    }

    #[test]
    fn test_get_by_ids_skips_unknown() {
        let db = setup_db();
        let jan = add_patient(&db, "Jan", "Novák", date(1980, 1, 1));

        let found = db.get_patients_by_ids(&[jan.id(), Uuid::new_v4(), jan.id()]).unwrap();
        assert_eq!(found.len(), 1);
        assert!(db.get_patients_by_ids(&[]).unwrap().is_empty());
    }
}
