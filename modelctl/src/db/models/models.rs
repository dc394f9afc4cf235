//! Database models for predictive models.

use crate::types::{ModelId, OrganizationId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle status of an uploaded model. Only `active` models may be
/// executed through the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStatus::Active => write!(f, "active"),
            ModelStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// Database request for creating a new predictive model
#[derive(Debug, Clone)]
pub struct ModelCreateDBRequest {
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: Option<String>,
    pub model_type: Option<String>,
    /// Ordered, distinct parameter names; the positional contract for runs.
    pub required_parameters: Vec<String>,
    pub target: Option<String>,
    pub declared_accuracy: Option<f64>,
    pub last_trained_on: Option<NaiveDate>,
}

/// Database request for updating a predictive model. `None` leaves the field
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct ModelUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub model_type: Option<String>,
    pub target: Option<String>,
    pub status: Option<ModelStatus>,
    pub artifact_path: Option<String>,
    pub declared_accuracy: Option<f64>,
    pub last_trained_on: Option<NaiveDate>,
}

/// Database response for a predictive model
#[derive(Debug, Clone)]
pub struct ModelDBResponse {
    pub id: ModelId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: Option<String>,
    pub model_type: Option<String>,
    pub artifact_path: String,
    pub required_parameters: Vec<String>,
    pub target: Option<String>,
    pub status: ModelStatus,
    pub declared_accuracy: Option<f64>,
    pub last_trained_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelDBResponse {
    pub fn is_active(&self) -> bool {
        self.status == ModelStatus::Active
    }
}
