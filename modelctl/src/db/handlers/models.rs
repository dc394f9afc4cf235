use std::collections::HashMap;

use crate::db::errors::{DbError, Result};
use crate::db::handlers::repository::Repository;
use crate::db::models::models::{ModelCreateDBRequest, ModelDBResponse, ModelStatus, ModelUpdateDBRequest};
use crate::types::{ModelId, OrganizationId, abbrev_uuid};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing predictive models
#[derive(Debug, Clone)]
pub struct ModelFilter {
    pub skip: i64,
    pub limit: i64,
    pub organization_id: Option<OrganizationId>,
    pub status: Option<ModelStatus>,
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct ModelRow {
    pub id: ModelId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: Option<String>,
    pub model_type: Option<String>,
    pub artifact_path: String,
    pub required_parameters: Json<Vec<String>>,
    pub target: Option<String>,
    pub status: ModelStatus,
    pub declared_accuracy: Option<f64>,
    pub last_trained_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ModelRow> for ModelDBResponse {
    fn from(row: ModelRow) -> Self {
        Self {
            id: row.id,
            organization_id: row.organization_id,
            name: row.name,
            description: row.description,
            model_type: row.model_type,
            artifact_path: row.artifact_path,
            required_parameters: row.required_parameters.0,
            target: row.target,
            status: row.status,
            declared_accuracy: row.declared_accuracy,
            last_trained_on: row.last_trained_on,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct Models<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Models<'c> {
    type CreateRequest = ModelCreateDBRequest;
    type UpdateRequest = ModelUpdateDBRequest;
    type Response = ModelDBResponse;
    type Id = ModelId;
    type Filter = ModelFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let model = sqlx::query_as::<_, ModelRow>(
            r#"
            INSERT INTO predictive_models
                (id, organization_id, name, description, model_type, artifact_path,
                 required_parameters, target, status, declared_accuracy, last_trained_on,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, '', ?, ?, 'active', ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.organization_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.model_type)
        .bind(Json(&request.required_parameters))
        .bind(&request.target)
        .bind(request.declared_accuracy)
        .bind(request.last_trained_on)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(model.into())
    }

    #[instrument(skip(self), fields(model_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let model = sqlx::query_as::<_, ModelRow>("SELECT * FROM predictive_models WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(model.map(Into::into))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        // SQLite has no array binds; the id sets here are small
        let mut responses = HashMap::new();
        for id in ids {
            if let Some(model) = self.get_by_id(id).await? {
                responses.insert(id, model);
            }
        }
        Ok(responses)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let models = sqlx::query_as::<_, ModelRow>(
            r#"
            SELECT * FROM predictive_models
            WHERE (?1 IS NULL OR organization_id = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(filter.organization_id)
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(model_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM predictive_models WHERE id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(model_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Atomic update with conditional field updates
        let model = sqlx::query_as::<_, ModelRow>(
            r#"
            UPDATE predictive_models
            SET
                name = COALESCE(?2, name),
                description = COALESCE(?3, description),
                model_type = COALESCE(?4, model_type),
                target = COALESCE(?5, target),
                status = COALESCE(?6, status),
                artifact_path = COALESCE(?7, artifact_path),
                declared_accuracy = COALESCE(?8, declared_accuracy),
                last_trained_on = COALESCE(?9, last_trained_on),
                updated_at = ?10
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.model_type)
        .bind(&request.target)
        .bind(request.status)
        .bind(&request.artifact_path)
        .bind(request.declared_accuracy)
        .bind(request.last_trained_on)
        .bind(Utc::now())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(model.into())
    }
}

impl<'c> Models<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_org;
    use sqlx::SqlitePool;

    fn create_request(organization_id: OrganizationId) -> ModelCreateDBRequest {
        ModelCreateDBRequest {
            organization_id,
            name: "North Manhole Flow".to_string(),
            description: Some("Random forest over gauge features".to_string()),
            model_type: Some("random_forest".to_string()),
            required_parameters: vec!["flow".to_string(), "temp".to_string()],
            target: Some("gauge height".to_string()),
            declared_accuracy: Some(92.5),
            last_trained_on: None,
        }
    }

    #[sqlx::test]
    async fn test_create_and_fetch_roundtrip(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Models::new(&mut conn);

        let created = repo.create(&create_request(org.id)).await.unwrap();
        assert_eq!(created.required_parameters, vec!["flow", "temp"]);
        assert_eq!(created.status, ModelStatus::Active);
        assert_eq!(created.artifact_path, "");

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "North Manhole Flow");
        assert_eq!(fetched.required_parameters, created.required_parameters);
    }

    #[sqlx::test]
    async fn test_update_status_and_artifact(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Models::new(&mut conn);
        let created = repo.create(&create_request(org.id)).await.unwrap();

        let updated = repo
            .update(
                created.id,
                &ModelUpdateDBRequest {
                    status: Some(ModelStatus::Inactive),
                    artifact_path: Some("org/models/x/model.joblib".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, ModelStatus::Inactive);
        assert_eq!(updated.artifact_path, "org/models/x/model.joblib");
        // Untouched fields survive
        assert_eq!(updated.name, created.name);
    }

    #[sqlx::test]
    async fn test_list_filters_by_status(pool: SqlitePool) {
        let org = create_test_org(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Models::new(&mut conn);
        let a = repo.create(&create_request(org.id)).await.unwrap();
        let b = repo.create(&create_request(org.id)).await.unwrap();
        repo.update(
            b.id,
            &ModelUpdateDBRequest {
                status: Some(ModelStatus::Inactive),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let active = repo
            .list(&ModelFilter {
                skip: 0,
                limit: 100,
                organization_id: Some(org.id),
                status: Some(ModelStatus::Active),
            })
            .await
            .unwrap();

        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a.id);
    }

    #[sqlx::test]
    async fn test_update_missing_model_is_not_found(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Models::new(&mut conn);

        let result = repo.update(Uuid::new_v4(), &ModelUpdateDBRequest::default()).await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }
}
