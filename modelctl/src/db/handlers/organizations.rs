use crate::db::errors::Result;
use crate::db::models::organizations::{OrganizationCreateDBRequest, OrganizationDBResponse};
use crate::types::{OrganizationId, abbrev_uuid};
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;
use uuid::Uuid;

/// Data access for owning organizations. Deliberately thin: tenancy itself is
/// managed by the surrounding platform, this service only anchors ownership.
pub struct Organizations<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Organizations<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create(&mut self, request: &OrganizationCreateDBRequest) -> Result<OrganizationDBResponse> {
        let organization = sqlx::query_as::<_, OrganizationDBResponse>(
            "INSERT INTO organizations (id, name, created_at) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(organization)
    }

    #[instrument(skip(self), fields(organization_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: OrganizationId) -> Result<Option<OrganizationDBResponse>> {
        let organization = sqlx::query_as::<_, OrganizationDBResponse>("SELECT * FROM organizations WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(organization)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<OrganizationDBResponse>> {
        let organization = sqlx::query_as::<_, OrganizationDBResponse>("SELECT * FROM organizations WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(organization)
    }
}
