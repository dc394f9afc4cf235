//! API models for run records and operator-triggered runs.

use crate::db::models::runs::RunResultDBResponse;
use crate::types::{ModelId, RunResultId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// A recorded execution run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RunResponse {
    #[schema(value_type = Uuid)]
    pub id: RunResultId,
    #[schema(value_type = Uuid)]
    pub model_id: ModelId,
    #[schema(value_type = Object)]
    pub inputs: Value,
    #[schema(value_type = Value)]
    pub result: Value,
    #[schema(value_type = Option<Value>)]
    pub actual: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl From<RunResultDBResponse> for RunResponse {
    fn from(run: RunResultDBResponse) -> Self {
        Self {
            id: run.id,
            model_id: run.model_id,
            inputs: run.inputs,
            result: run.result,
            actual: run.actual,
            created_at: run.created_at,
        }
    }
}

/// Operator test run: positional values in declared parameter order, plus an
/// optional immediately-known ground truth.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OperatorRunRequest {
    #[schema(value_type = Vec<Value>)]
    pub parameters: Vec<Value>,
    #[schema(value_type = Option<Value>)]
    pub actual: Option<Value>,
}

/// Result of an operator test run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OperatorRunResponse {
    pub run: RunResponse,
    /// Parameter name -> provided value, in declared order.
    #[schema(value_type = Object)]
    pub mapped_parameters: Value,
    /// Trimmed prediction text.
    pub prediction: String,
}

/// Ground-truth back-fill for a recorded run.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RunActualUpdate {
    #[schema(value_type = Value)]
    pub actual: Value,
}
