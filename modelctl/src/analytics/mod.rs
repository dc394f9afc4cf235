//! Run-time accuracy analytics.
//!
//! The aggregator owns the only write path to a model's analytics snapshot.
//! Each recompute is one transaction: load the full run history, normalize
//! stored values through [`normalize`], partition runs, feed the evaluated
//! pairs to [`regression::RegressionMetrics`], and overwrite the single
//! snapshot row. Running inside a transaction serializes recomputes for the
//! same model; recomputes for different models are independent.

pub mod normalize;
pub mod regression;

use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::db::handlers::{Models, Repository, RunResults, Snapshots};
use crate::db::models::snapshots::{AnalyticsSnapshotDBResponse, SnapshotUpsertDBRequest};
use crate::errors::{Error, Result};
use crate::types::{ModelId, abbrev_uuid};
use normalize::normalize;
use regression::RegressionMetrics;

/// Recompute a model's analytics snapshot from its full run history.
///
/// Runs partition into:
/// - **evaluated**: prediction and actual both present and numeric,
/// - **failed**: prediction unparseable,
/// - the remainder: parseable prediction, no ground truth yet.
///
/// Metrics are computed over the evaluated set only; with zero evaluated runs
/// every metric is stored as NULL rather than invoking the calculator.
/// The upsert overwrites the row in place, so the operation is idempotent.
#[instrument(skip(pool), fields(model_id = %abbrev_uuid(&model_id)), err)]
pub async fn recompute_for_model(pool: &SqlitePool, model_id: ModelId) -> Result<AnalyticsSnapshotDBResponse> {
    let mut tx = pool.begin().await.map_err(crate::db::errors::DbError::from)?;

    let model = Models::new(&mut tx).get_by_id(model_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Predictive model".to_string(),
        id: model_id.to_string(),
    })?;

    let runs = RunResults::new(&mut tx).list_for_model(model_id).await?;
    let total_predictions = runs.len() as i64;

    let mut predictions = Vec::new();
    let mut actuals = Vec::new();
    let mut failed = 0i64;
    for run in &runs {
        let prediction = normalize(&run.result);
        if prediction.is_none() {
            failed += 1;
        }
        let actual = run.actual.as_ref().and_then(normalize);
        if let (Some(prediction), Some(actual)) = (prediction, actual) {
            predictions.push(prediction);
            actuals.push(actual);
        }
    }
    let evaluated_predictions = predictions.len() as i64;

    let metrics = if evaluated_predictions > 0 {
        Some(RegressionMetrics::compute(&predictions, &actuals))
    } else {
        None
    };

    debug!(
        total = total_predictions,
        evaluated = evaluated_predictions,
        failed,
        "recomputed analytics partition"
    );

    let snapshot = Snapshots::new(&mut tx)
        .upsert(&SnapshotUpsertDBRequest {
            model_id,
            organization_id: Some(model.organization_id),
            total_predictions,
            total_failed_predictions: failed,
            evaluated_predictions,
            mse: metrics.map(|m| m.mse),
            mae: metrics.map(|m| m.mae),
            rmse: metrics.map(|m| m.rmse),
            r2: metrics.map(|m| m.r2),
            mape: metrics.map(|m| 100.0 - m.accuracy),
            accuracy: metrics.map(|m| m.accuracy),
        })
        .await?;

    tx.commit().await.map_err(crate::db::errors::DbError::from)?;

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::runs::RunResultCreateDBRequest;
    use crate::test_utils::{create_test_model, create_test_org};
    use serde_json::{Value, json};
    use sqlx::SqlitePool;
    use uuid::Uuid;

    async fn record_run(pool: &SqlitePool, model_id: ModelId, result: Value, actual: Option<Value>) {
        let mut conn = pool.acquire().await.unwrap();
        RunResults::new(&mut conn)
            .create(&RunResultCreateDBRequest {
                model_id,
                inputs: json!({"flow": 1}),
                result,
                actual,
            })
            .await
            .unwrap();
    }

    fn derived_columns(s: &AnalyticsSnapshotDBResponse) -> (i64, i64, i64, [Option<f64>; 6]) {
        (
            s.total_predictions,
            s.total_failed_predictions,
            s.evaluated_predictions,
            [s.mse, s.mae, s.rmse, s.r2, s.mape, s.accuracy],
        )
    }

    #[sqlx::test]
    async fn test_no_runs_yields_null_metrics(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;

        let snapshot = recompute_for_model(&pool, model.id).await.unwrap();
        assert_eq!(snapshot.total_predictions, 0);
        assert_eq!(snapshot.evaluated_predictions, 0);
        assert_eq!(snapshot.total_failed_predictions, 0);
        for metric in [snapshot.mse, snapshot.mae, snapshot.rmse, snapshot.r2, snapshot.mape, snapshot.accuracy] {
            assert_eq!(metric, None);
        }
    }

    #[sqlx::test]
    async fn test_unevaluated_runs_keep_metrics_null(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;
        record_run(&pool, model.id, json!("42.0"), None).await;
        record_run(&pool, model.id, json!("garbage"), None).await;

        let snapshot = recompute_for_model(&pool, model.id).await.unwrap();
        assert_eq!(snapshot.total_predictions, 2);
        assert_eq!(snapshot.total_failed_predictions, 1);
        assert_eq!(snapshot.evaluated_predictions, 0);
        assert_eq!(snapshot.accuracy, None);
    }

    #[sqlx::test]
    async fn test_evaluated_runs_produce_metrics(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;
        // Legacy encodings on purpose: wrapped object, numeric string, plain number
        record_run(&pool, model.id, json!({"value": 1.0}), Some(json!("1.0"))).await;
        record_run(&pool, model.id, json!("2.0"), Some(json!(2.0))).await;
        record_run(&pool, model.id, json!(3.0), Some(json!([3.0]))).await;

        let snapshot = recompute_for_model(&pool, model.id).await.unwrap();
        assert_eq!(snapshot.total_predictions, 3);
        assert_eq!(snapshot.evaluated_predictions, 3);
        assert_eq!(snapshot.total_failed_predictions, 0);
        assert_eq!(snapshot.accuracy, Some(100.0));
        assert_eq!(snapshot.mae, Some(0.0));
        assert_eq!(snapshot.r2, Some(1.0));
        assert_eq!(snapshot.mape, Some(0.0));
    }

    #[sqlx::test]
    async fn test_failed_prediction_with_actual_is_not_evaluated(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;
        record_run(&pool, model.id, json!("Error: bad input"), Some(json!(5.0))).await;
        record_run(&pool, model.id, json!("4.0"), Some(json!(5.0))).await;

        let snapshot = recompute_for_model(&pool, model.id).await.unwrap();
        assert_eq!(snapshot.total_predictions, 2);
        assert_eq!(snapshot.total_failed_predictions, 1);
        assert_eq!(snapshot.evaluated_predictions, 1);
    }

    #[sqlx::test]
    async fn test_recompute_is_idempotent(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;
        record_run(&pool, model.id, json!("4.0"), Some(json!(5.0))).await;
        record_run(&pool, model.id, json!("6.0"), Some(json!(5.5))).await;

        let first = recompute_for_model(&pool, model.id).await.unwrap();
        let second = recompute_for_model(&pool, model.id).await.unwrap();
        assert_eq!(derived_columns(&first), derived_columns(&second));
        // Still a single row per model
        let mut conn = pool.acquire().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analytics_snapshots WHERE model_id = ?")
            .bind(model.id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn test_recompute_missing_model(pool: SqlitePool) {
        let result = recompute_for_model(&pool, Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[sqlx::test]
    async fn test_invariants_hold(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;
        record_run(&pool, model.id, json!("nonsense"), None).await;
        record_run(&pool, model.id, json!("1.0"), Some(json!(1.0))).await;
        record_run(&pool, model.id, json!("2.0"), None).await;

        let snapshot = recompute_for_model(&pool, model.id).await.unwrap();
        assert!(snapshot.evaluated_predictions <= snapshot.total_predictions);
        assert!(snapshot.total_failed_predictions <= snapshot.total_predictions);
        // Metrics are non-null exactly because evaluated > 0
        assert!(snapshot.accuracy.is_some());
    }
}
