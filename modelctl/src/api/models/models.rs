//! API models for predictive model management.

use crate::db::models::models::{ModelDBResponse, ModelStatus};
use crate::db::models::snapshots::AnalyticsSnapshotDBResponse;
use crate::types::{ModelId, OrganizationId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A predictive model as returned by the management API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelResponse {
    #[schema(value_type = Uuid)]
    pub id: ModelId,
    #[schema(value_type = Uuid)]
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: Option<String>,
    pub model_type: Option<String>,
    pub required_parameters: Vec<String>,
    pub target: Option<String>,
    pub status: ModelStatus,
    pub declared_accuracy: Option<f64>,
    pub last_trained_on: Option<NaiveDate>,
    /// Whether a model artifact has been staged for this model yet.
    pub artifact_uploaded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ModelDBResponse> for ModelResponse {
    fn from(model: ModelDBResponse) -> Self {
        Self {
            id: model.id,
            organization_id: model.organization_id,
            name: model.name,
            description: model.description,
            model_type: model.model_type,
            required_parameters: model.required_parameters,
            target: model.target,
            status: model.status,
            declared_accuracy: model.declared_accuracy,
            last_trained_on: model.last_trained_on,
            artifact_uploaded: !model.artifact_path.is_empty(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// One entry in the model listing, with its snapshot summary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelListEntry {
    pub model: ModelResponse,
    /// Run-time accuracy from the latest snapshot, when any runs were evaluated.
    pub accuracy: Option<f64>,
    pub total_predictions: i64,
}

/// Listing of an organization's models.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelListResponse {
    pub models: Vec<ModelListEntry>,
    /// Sum of recorded runs across the listed models.
    pub total_predictions: i64,
}

/// Model detail: metadata, current snapshot, and recent run history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelDetailResponse {
    pub model: ModelResponse,
    pub analytics: Option<AnalyticsSnapshotDBResponse>,
    pub recent_runs: Vec<super::runs::RunResponse>,
}

/// Metadata/status edits. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ModelUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub model_type: Option<String>,
    pub target: Option<String>,
    pub status: Option<ModelStatus>,
    pub declared_accuracy: Option<f64>,
    pub last_trained_on: Option<NaiveDate>,
}
