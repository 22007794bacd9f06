//! Query inputs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::DiagnosisFilter;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPatients {
    pub search_term: Option<String>,
    pub page: Option<i32>,
    pub page_size: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPatientDiagnosticResults {
    pub patient_id: Uuid,
    /// Newest `limit` results; all when absent
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDiagnoses {
    #[serde(default)]
    pub filter: DiagnosisFilter,
    pub skip: Option<i32>,
    pub take: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPatients {
    pub search_term: String,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub has_diagnosis: Option<bool>,
    pub page: Option<i32>,
    pub page_size: Option<i32>,
}
