//! Database models for the append-only API audit log.

use crate::types::{AccessTokenId, RunResultId, UserId};

/// Database request for appending one audit entry
#[derive(Debug, Clone)]
pub struct AuditEntryCreateDBRequest {
    pub source_addr: String,
    pub operation: String,
    pub response_code: i64,
    pub user_id: Option<UserId>,
    pub access_token_id: Option<AccessTokenId>,
    pub run_result_id: Option<RunResultId>,
}
