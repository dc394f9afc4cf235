//! Wire shapes of the public execution API.
//!
//! Field names (with spaces) are part of the published contract and must not
//! change with internal renames.

use crate::db::models::models::ModelStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Response of `GET /api/v1/describe`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DescribeResponse {
    #[serde(rename = "Model Name")]
    pub model_name: String,
    #[serde(rename = "Model Type")]
    pub model_type: Option<String>,
    #[serde(rename = "Status")]
    pub status: ModelStatus,
    #[serde(rename = "Model Description")]
    pub description: Option<String>,
    /// Run-time accuracy from the latest snapshot, when available.
    #[serde(rename = "Accuracy")]
    pub accuracy: Option<f64>,
    #[serde(rename = "Required Headers")]
    pub required_headers: String,
    #[serde(rename = "Required Parameters")]
    pub required_parameters: Vec<String>,
    #[serde(rename = "Target")]
    pub target: Option<String>,
}

/// Response of `POST /api/v1/execute`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecuteResponse {
    /// Echo of the supplied parameters, keyed by declared name, in declared
    /// order.
    #[serde(rename = "Provided Parameters")]
    #[schema(value_type = Object)]
    pub provided_parameters: Value,
    /// Verbatim (trimmed) prediction text.
    #[serde(rename = "Prediction")]
    pub prediction: String,
}
