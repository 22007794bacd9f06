//! SQLite schema definition.

/// Complete database schema for healthhub.
///
/// Ids are hyphenated lowercase UUID text, dates are `YYYY-MM-DD` and
/// timestamps are RFC 3339 UTC with microseconds.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL CHECK (length(trim(first_name)) > 0),
    last_name TEXT NOT NULL CHECK (length(trim(last_name)) > 0),
    date_of_birth TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_patients_name
    ON patients(last_name COLLATE NOCASE, first_name COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_patients_date_of_birth ON patients(date_of_birth);

-- ============================================================================
-- Diagnostic Results (deleted with their patient)
-- ============================================================================

CREATE TABLE IF NOT EXISTS diagnostic_results (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    diagnosis TEXT NOT NULL CHECK (length(trim(diagnosis)) > 0),
    notes TEXT,
    timestamp_utc TEXT NOT NULL,
    created_at TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_results_patient
    ON diagnostic_results(patient_id, timestamp_utc DESC);
CREATE INDEX IF NOT EXISTS idx_results_created_at ON diagnostic_results(created_at);
"#;
