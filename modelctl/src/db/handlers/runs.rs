use crate::db::errors::{DbError, Result};
use crate::db::models::runs::{RunResultCreateDBRequest, RunResultDBResponse};
use crate::types::{ModelId, RunResultId, abbrev_uuid};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct RunResultRow {
    pub id: RunResultId,
    pub model_id: ModelId,
    pub inputs: Json<Value>,
    pub result: Json<Value>,
    pub actual: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

impl From<RunResultRow> for RunResultDBResponse {
    fn from(row: RunResultRow) -> Self {
        Self {
            id: row.id,
            model_id: row.model_id,
            inputs: row.inputs.0,
            result: row.result.0,
            actual: row.actual.map(|a| a.0),
            created_at: row.created_at,
        }
    }
}

/// Data access for execution run records.
///
/// Runs are append-only, so this is not a full [`crate::db::handlers::Repository`]:
/// rows are created, read, and at most back-filled with a ground-truth value.
/// Deletion only happens through the model cascade.
pub struct RunResults<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> RunResults<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(model_id = %abbrev_uuid(&request.model_id)), err)]
    pub async fn create(&mut self, request: &RunResultCreateDBRequest) -> Result<RunResultDBResponse> {
        let run = sqlx::query_as::<_, RunResultRow>(
            r#"
            INSERT INTO run_results (id, model_id, inputs, result, actual, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.model_id)
        .bind(Json(&request.inputs))
        .bind(Json(&request.result))
        .bind(request.actual.as_ref().map(Json))
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(run.into())
    }

    #[instrument(skip(self), fields(run_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: RunResultId) -> Result<Option<RunResultDBResponse>> {
        let run = sqlx::query_as::<_, RunResultRow>("SELECT * FROM run_results WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(run.map(Into::into))
    }

    /// All runs for a model, oldest first. The aggregator consumes the full
    /// history on every recompute.
    #[instrument(skip(self), fields(model_id = %abbrev_uuid(&model_id)), err)]
    pub async fn list_for_model(&mut self, model_id: ModelId) -> Result<Vec<RunResultDBResponse>> {
        let runs = sqlx::query_as::<_, RunResultRow>("SELECT * FROM run_results WHERE model_id = ? ORDER BY created_at, id")
            .bind(model_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(runs.into_iter().map(Into::into).collect())
    }

    /// Back-fill the ground-truth value for a run. The only permitted mutation
    /// of a run record; inputs and prediction stay frozen.
    #[instrument(skip(self, actual), fields(run_id = %abbrev_uuid(&id)), err)]
    pub async fn set_actual(&mut self, id: RunResultId, actual: &Value) -> Result<RunResultDBResponse> {
        let run = sqlx::query_as::<_, RunResultRow>("UPDATE run_results SET actual = ? WHERE id = ? RETURNING *")
            .bind(Json(actual))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::NotFound)?;

        Ok(run.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_model, create_test_org};
    use serde_json::json;
    use sqlx::SqlitePool;

    #[sqlx::test]
    async fn test_create_preserves_input_order_and_payloads(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let model = create_test_model(&pool, org.id, &["flow", "temp"]).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = RunResults::new(&mut conn);

        let run = repo
            .create(&RunResultCreateDBRequest {
                model_id: model.id,
                inputs: json!({"flow": 100, "temp": 50}),
                result: json!("42.0"),
                actual: None,
            })
            .await
            .unwrap();

        assert_eq!(run.result, json!("42.0"));
        assert_eq!(run.actual, None);
        // Declared order survives storage (`preserve_order` keeps map order)
        let keys: Vec<&String> = run.inputs.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["flow", "temp"]);
    }

    #[sqlx::test]
    async fn test_set_actual_is_the_only_mutation(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = RunResults::new(&mut conn);

        let run = repo
            .create(&RunResultCreateDBRequest {
                model_id: model.id,
                inputs: json!({"flow": 1}),
                result: json!("3.5"),
                actual: None,
            })
            .await
            .unwrap();

        let updated = repo.set_actual(run.id, &json!(3.7)).await.unwrap();
        assert_eq!(updated.actual, Some(json!(3.7)));
        assert_eq!(updated.result, run.result);
        assert_eq!(updated.inputs, run.inputs);
        assert_eq!(updated.created_at, run.created_at);
    }

    #[sqlx::test]
    async fn test_list_for_model_is_oldest_first(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let model = create_test_model(&pool, org.id, &["flow"]).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = RunResults::new(&mut conn);

        for i in 0..3 {
            repo.create(&RunResultCreateDBRequest {
                model_id: model.id,
                inputs: json!({"flow": i}),
                result: json!(format!("{i}.0")),
                actual: None,
            })
            .await
            .unwrap();
        }

        let runs = repo.list_for_model(model.id).await.unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].inputs, json!({"flow": 0}));
        assert_eq!(runs[2].inputs, json!({"flow": 2}));
    }

    #[sqlx::test]
    async fn test_set_actual_missing_run(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = RunResults::new(&mut conn);

        let result = repo.set_actual(Uuid::new_v4(), &json!(1.0)).await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }
}
