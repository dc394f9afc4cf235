//! The public access-gated execution API.
//!
//! Both operations pass through the same gate sequence: rate check first,
//! then credential resolution, then the model checks. The rate window is
//! only charged once a request has passed the credential gate, so
//! unauthenticated probing does not consume a caller's quota. Every exit
//! path, including rejections, leaves a row in the API audit log.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde_json::{Map, Value};
use tracing::{error, instrument, warn};

use crate::{
    AppState,
    analytics::recompute_for_model,
    api::models::predict::{DescribeResponse, ExecuteResponse},
    auth::SourceAddr,
    auth::tokens::{ACCESS_TOKEN_HEADER, resolve_access_token},
    db::errors::DbError,
    db::handlers::{AuditLog, Models, Repository, RunResults, Snapshots},
    db::models::audit::AuditEntryCreateDBRequest,
    db::models::models::ModelDBResponse,
    db::models::runs::RunResultCreateDBRequest,
    errors::{Error, Result},
    types::{AccessTokenId, RunResultId, UserId},
};

const DESCRIBE_OPERATION: &str = "describe";
const EXECUTE_OPERATION: &str = "execute";

/// Identities resolved along the way, attached to the audit entry for
/// whatever exit path the request takes.
#[derive(Debug, Default)]
struct AuditTrail {
    user_id: Option<UserId>,
    access_token_id: Option<AccessTokenId>,
    run_result_id: Option<RunResultId>,
}

/// Describe the model an access token is bound to.
#[utoipa::path(
    get,
    path = "/describe",
    tag = "execution",
    summary = "Describe model",
    responses(
        (status = 200, description = "Model metadata and latest run-time accuracy", body = DescribeResponse),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Model not found"),
        (status = 429, description = "Source quota exceeded"),
    ),
    security(("X-Access-Token" = []))
)]
#[instrument(skip_all, fields(source = %source.0))]
pub async fn describe_model(
    State(state): State<AppState>,
    source: SourceAddr,
    headers: HeaderMap,
) -> Result<Json<DescribeResponse>> {
    let mut trail = AuditTrail::default();
    let result = describe_inner(&state, &source, &headers, &mut trail).await;
    record_audit(&state, &source, DESCRIBE_OPERATION, &result, &trail).await;
    result.map(Json)
}

async fn describe_inner(
    state: &AppState,
    source: &SourceAddr,
    headers: &HeaderMap,
    trail: &mut AuditTrail,
) -> Result<DescribeResponse> {
    let token = gate(state, source, headers, trail).await?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let model = Models::new(&mut conn)
        .get_by_id(token.model_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Predictive model".to_string(),
            id: token.model_id.to_string(),
        })?;
    let snapshot = Snapshots::new(&mut conn).get_by_model(model.id).await?;

    Ok(DescribeResponse {
        model_name: model.name,
        model_type: model.model_type,
        status: model.status,
        description: model.description,
        accuracy: snapshot.and_then(|s| s.accuracy),
        required_headers: ACCESS_TOKEN_HEADER.to_string(),
        required_parameters: model.required_parameters,
        target: model.target,
    })
}

/// Execute the model an access token is bound to.
///
/// Body fields are named after the model's declared parameters, with spaces
/// replaced by underscores. Exactly the declared parameters must be supplied.
#[utoipa::path(
    post,
    path = "/execute",
    tag = "execution",
    summary = "Execute model",
    request_body(description = "One field per declared parameter", content_type = "application/json"),
    responses(
        (status = 200, description = "Prediction with an echo of the supplied parameters", body = ExecuteResponse),
        (status = 400, description = "Parameter count or shape mismatch"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 404, description = "Model not active"),
        (status = 429, description = "Source quota exceeded"),
        (status = 500, description = "Execution or processing failure"),
        (status = 504, description = "Execution exceeded the wall-clock bound"),
    ),
    security(("X-Access-Token" = []))
)]
#[instrument(skip_all, fields(source = %source.0))]
pub async fn execute_prediction(
    State(state): State<AppState>,
    source: SourceAddr,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<ExecuteResponse>> {
    let mut trail = AuditTrail::default();
    let result = execute_inner(&state, &source, &headers, &body, &mut trail).await;
    record_audit(&state, &source, EXECUTE_OPERATION, &result, &trail).await;
    result.map(Json)
}

async fn execute_inner(
    state: &AppState,
    source: &SourceAddr,
    headers: &HeaderMap,
    body: &Value,
    trail: &mut AuditTrail,
) -> Result<ExecuteResponse> {
    let token = gate(state, source, headers, trail).await?;

    let model = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        Models::new(&mut conn)
            .get_by_id(token.model_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Predictive model".to_string(),
                id: token.model_id.to_string(),
            })?
    };
    if !model.is_active() {
        return Err(Error::ModelInactive);
    }
    if model.artifact_path.is_empty() {
        return Err(Error::ExecutionFailure {
            detail: format!("model {} has no staged artifact", model.id),
        });
    }

    let provided = extract_parameters(&model.required_parameters, body)?;
    let arguments: Vec<String> = provided.iter().map(|(_, value)| value_to_argument(value)).collect();

    let artifact = state.config.storage.artifact_root.join(&model.artifact_path);
    let prediction = match state.runner.run(&artifact, &arguments).await {
        crate::runner::RunOutcome::Completed { stdout } => stdout,
        crate::runner::RunOutcome::Failed { detail } => return Err(Error::ExecutionFailure { detail }),
        crate::runner::RunOutcome::TimedOut => return Err(Error::ExecutionTimeout),
    };

    let mut mapped = Map::new();
    for (name, value) in provided {
        mapped.insert(name, value);
    }
    let mapped = Value::Object(mapped);

    // The prediction already exists at this point; a failure to persist the
    // run is logged but must not cost the caller their response.
    record_run(state, &model, &mapped, &prediction, trail).await;

    Ok(ExecuteResponse {
        provided_parameters: mapped,
        prediction,
    })
}

/// Shared gate: rate check, credential resolution, quota charge.
async fn gate(
    state: &AppState,
    source: &SourceAddr,
    headers: &HeaderMap,
    trail: &mut AuditTrail,
) -> Result<crate::auth::tokens::ResolvedToken> {
    if state.limiter.too_many_attempts(&source.0) {
        return Err(Error::RateLimited);
    }

    let presented = headers.get(ACCESS_TOKEN_HEADER).and_then(|h| h.to_str().ok());
    let token = resolve_access_token(&state.db, presented)
        .await?
        .ok_or(Error::Unauthorized { message: None })?;
    trail.user_id = Some(token.user_id);
    trail.access_token_id = Some(token.id);

    state.limiter.hit(&source.0);
    Ok(token)
}

/// Collect provided parameter values in declared order, validating that the
/// caller supplied exactly the declared fields. Body field names use
/// underscores where the declared name has spaces; the returned pairs keep
/// the declared spelling.
fn extract_parameters(required: &[String], body: &Value) -> Result<Vec<(String, Value)>> {
    let fields = body.as_object().ok_or_else(|| Error::BadRequest {
        message: "Request body must be a JSON object".to_string(),
    })?;

    if fields.len() != required.len() {
        return Err(Error::BadRequest {
            message: format!("Expected {} parameters, got {}", required.len(), fields.len()),
        });
    }

    let mut provided = Vec::with_capacity(required.len());
    for name in required {
        let field = name.replace(' ', "_");
        let value = fields.get(&field).ok_or_else(|| Error::BadRequest {
            message: format!("Missing required parameter '{field}'"),
        })?;
        provided.push((name.clone(), value.clone()));
    }

    Ok(provided)
}

/// Render a provided value as one positional command-line argument.
fn value_to_argument(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn record_run(state: &AppState, model: &ModelDBResponse, inputs: &Value, prediction: &str, trail: &mut AuditTrail) {
    let created = async {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        RunResults::new(&mut conn)
            .create(&RunResultCreateDBRequest {
                model_id: model.id,
                inputs: inputs.clone(),
                result: Value::String(prediction.to_string()),
                actual: None,
            })
            .await
            .map_err(Error::from)
    }
    .await;

    match created {
        Ok(run) => {
            trail.run_result_id = Some(run.id);
            if let Err(e) = recompute_for_model(&state.db, model.id).await {
                warn!("Failed to recompute analytics after run: {:#}", e);
            }
        }
        Err(e) => {
            error!("Failed to record run result: {:#}", e);
        }
    }
}

/// Append the audit entry for this request. Best-effort: the audit log is
/// pure observability and never fails a request.
async fn record_audit<T>(state: &AppState, source: &SourceAddr, operation: &str, result: &Result<T>, trail: &AuditTrail) {
    let response_code = match result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status_code(),
    };
    let entry = AuditEntryCreateDBRequest {
        source_addr: source.0.clone(),
        operation: operation.to_string(),
        response_code: i64::from(response_code.as_u16()),
        user_id: trail.user_id,
        access_token_id: trail.access_token_id,
        run_result_id: trail.run_result_id,
    };

    match state.db.acquire().await {
        Ok(mut conn) => {
            if let Err(e) = AuditLog::new(&mut conn).append(&entry).await {
                warn!("Failed to append API audit entry: {:#}", e);
            }
        }
        Err(e) => warn!("Failed to acquire connection for API audit entry: {e}"),
    }
}
