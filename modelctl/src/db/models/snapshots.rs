//! Database models for per-model analytics snapshots.

use crate::types::{ModelId, OrganizationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Database request for overwriting a model's snapshot row
#[derive(Debug, Clone)]
pub struct SnapshotUpsertDBRequest {
    pub model_id: ModelId,
    pub organization_id: Option<OrganizationId>,
    pub total_predictions: i64,
    pub total_failed_predictions: i64,
    pub evaluated_predictions: i64,
    pub mse: Option<f64>,
    pub mae: Option<f64>,
    pub rmse: Option<f64>,
    pub r2: Option<f64>,
    pub mape: Option<f64>,
    pub accuracy: Option<f64>,
}

/// Database response for a model's analytics snapshot.
///
/// Metric fields are `NULL` exactly when `evaluated_predictions` is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AnalyticsSnapshotDBResponse {
    #[schema(value_type = Uuid)]
    pub model_id: ModelId,
    #[schema(value_type = Option<Uuid>)]
    pub organization_id: Option<OrganizationId>,
    pub total_predictions: i64,
    pub total_failed_predictions: i64,
    pub evaluated_predictions: i64,
    pub mse: Option<f64>,
    pub mae: Option<f64>,
    pub rmse: Option<f64>,
    pub r2: Option<f64>,
    pub mape: Option<f64>,
    pub accuracy: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
