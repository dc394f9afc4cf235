//! Database models for execution run records.

use crate::types::{ModelId, RunResultId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Database request for recording one execution attempt
#[derive(Debug, Clone)]
pub struct RunResultCreateDBRequest {
    pub model_id: ModelId,
    /// Parameter name -> provided value, in declared parameter order.
    pub inputs: Value,
    /// Raw prediction payload, opaque at storage time.
    pub result: Value,
    /// Ground truth, normally absent at execution time.
    pub actual: Option<Value>,
}

/// Database response for a run record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResultDBResponse {
    pub id: RunResultId,
    pub model_id: ModelId,
    pub inputs: Value,
    pub result: Value,
    pub actual: Option<Value>,
    pub created_at: DateTime<Utc>,
}
