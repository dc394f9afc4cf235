use crate::db::errors::Result;
use crate::db::models::audit::AuditEntryCreateDBRequest;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::instrument;

/// Append-only API audit log. Nothing in the engine reads it back; it exists
/// for operators.
pub struct AuditLog<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> AuditLog<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(operation = %request.operation, code = request.response_code), err)]
    pub async fn append(&mut self, request: &AuditEntryCreateDBRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_audit_log
                (source_addr, operation, response_code, user_id, access_token_id, run_result_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.source_addr)
        .bind(&request.operation)
        .bind(request.response_code)
        .bind(request.user_id)
        .bind(request.access_token_id)
        .bind(request.run_result_id)
        .bind(Utc::now())
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }

    /// Row count for an operation name. Only used by tests to assert the
    /// write-only trail exists.
    #[cfg(test)]
    pub async fn count_for_operation(&mut self, operation: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_audit_log WHERE operation = ?")
            .bind(operation)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}
