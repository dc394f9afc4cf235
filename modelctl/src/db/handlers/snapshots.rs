use crate::db::errors::Result;
use crate::db::models::snapshots::{AnalyticsSnapshotDBResponse, SnapshotUpsertDBRequest};
use crate::types::{ModelId, abbrev_uuid};
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

/// Data access for per-model analytics snapshots.
///
/// A snapshot is fully derived state: there is exactly one row per model and
/// the only write path is the aggregator's upsert, which overwrites every
/// derived column in place.
pub struct Snapshots<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Snapshots<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(model_id = %abbrev_uuid(&request.model_id)), err)]
    pub async fn upsert(&mut self, request: &SnapshotUpsertDBRequest) -> Result<AnalyticsSnapshotDBResponse> {
        let now = Utc::now();
        let snapshot = sqlx::query_as::<_, AnalyticsSnapshotDBResponse>(
            r#"
            INSERT INTO analytics_snapshots
                (model_id, organization_id, total_predictions, total_failed_predictions,
                 evaluated_predictions, mse, mae, rmse, r2, mape, accuracy, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (model_id) DO UPDATE SET
                organization_id = excluded.organization_id,
                total_predictions = excluded.total_predictions,
                total_failed_predictions = excluded.total_failed_predictions,
                evaluated_predictions = excluded.evaluated_predictions,
                mse = excluded.mse,
                mae = excluded.mae,
                rmse = excluded.rmse,
                r2 = excluded.r2,
                mape = excluded.mape,
                accuracy = excluded.accuracy,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(request.model_id)
        .bind(request.organization_id)
        .bind(request.total_predictions)
        .bind(request.total_failed_predictions)
        .bind(request.evaluated_predictions)
        .bind(request.mse)
        .bind(request.mae)
        .bind(request.rmse)
        .bind(request.r2)
        .bind(request.mape)
        .bind(request.accuracy)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(snapshot)
    }

    #[instrument(skip(self), fields(model_id = %abbrev_uuid(&model_id)), err)]
    pub async fn get_by_model(&mut self, model_id: ModelId) -> Result<Option<AnalyticsSnapshotDBResponse>> {
        let snapshot = sqlx::query_as::<_, AnalyticsSnapshotDBResponse>("SELECT * FROM analytics_snapshots WHERE model_id = ?")
            .bind(model_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(snapshot)
    }
}
