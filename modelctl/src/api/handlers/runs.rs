//! Operator-triggered runs and ground-truth back-fill.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{Map, Value};
use tracing::instrument;

use crate::{
    AppState,
    analytics::recompute_for_model,
    api::handlers::models::find_org_model,
    api::models::{
        runs::{OperatorRunRequest, OperatorRunResponse, RunActualUpdate, RunResponse},
        users::CurrentUser,
    },
    auth::require_admin,
    db::errors::DbError,
    db::handlers::RunResults,
    db::models::runs::RunResultCreateDBRequest,
    errors::{Error, Result},
    runner::RunOutcome,
    types::{ModelId, RunResultId},
};

/// Execute a model with operator-supplied values, optionally with an
/// immediately-known ground truth.
///
/// Values are positional, in the model's declared parameter order. The run is
/// recorded and the analytics snapshot recomputed before the response goes
/// out.
#[utoipa::path(
    post,
    path = "/models/{id}/run",
    tag = "runs",
    summary = "Run model",
    params(("id" = uuid::Uuid, Path, description = "Model ID")),
    request_body = OperatorRunRequest,
    responses(
        (status = 200, description = "Recorded run and prediction", body = OperatorRunResponse),
        (status = 400, description = "Parameter count mismatch"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Model not found"),
        (status = 500, description = "Execution failure"),
        (status = 504, description = "Execution exceeded the wall-clock bound"),
    ),
    security(("X-Modelctl-User" = []))
)]
#[instrument(skip_all, fields(user = %current_user.email))]
pub async fn run_model(
    State(state): State<AppState>,
    Path(id): Path<ModelId>,
    current_user: CurrentUser,
    Json(request): Json<OperatorRunRequest>,
) -> Result<Json<OperatorRunResponse>> {
    require_admin(&current_user)?;
    let model = find_org_model(&state, id, &current_user).await?;

    if model.artifact_path.is_empty() {
        return Err(Error::BadRequest {
            message: "Model has no staged artifact".to_string(),
        });
    }
    if request.parameters.len() != model.required_parameters.len() {
        return Err(Error::BadRequest {
            message: format!(
                "Expected {} parameters, got {}",
                model.required_parameters.len(),
                request.parameters.len()
            ),
        });
    }

    let arguments: Vec<String> = request
        .parameters
        .iter()
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    let artifact = state.config.storage.artifact_root.join(&model.artifact_path);
    let prediction = match state.runner.run(&artifact, &arguments).await {
        RunOutcome::Completed { stdout } => stdout,
        RunOutcome::Failed { detail } => return Err(Error::ExecutionFailure { detail }),
        RunOutcome::TimedOut => return Err(Error::ExecutionTimeout),
    };

    // Zip declared names with the positional values, in declared order
    let mut mapped = Map::new();
    for (name, value) in model.required_parameters.iter().zip(&request.parameters) {
        mapped.insert(name.clone(), value.clone());
    }
    let mapped = Value::Object(mapped);

    let run = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        RunResults::new(&mut conn)
            .create(&RunResultCreateDBRequest {
                model_id: model.id,
                inputs: mapped.clone(),
                result: Value::String(prediction.clone()),
                actual: request.actual.clone(),
            })
            .await?
    };

    // Synchronous: a run carrying ground truth must be reflected in the
    // snapshot before the operator sees the response.
    recompute_for_model(&state.db, model.id).await?;

    Ok(Json(OperatorRunResponse {
        run: RunResponse::from(run),
        mapped_parameters: mapped,
        prediction,
    }))
}

/// Back-fill the ground-truth value for a recorded run.
///
/// The only permitted mutation of a run record; triggers a snapshot
/// recompute.
#[utoipa::path(
    patch,
    path = "/runs/{id}/actual",
    tag = "runs",
    summary = "Set run ground truth",
    params(("id" = uuid::Uuid, Path, description = "Run ID")),
    request_body = RunActualUpdate,
    responses(
        (status = 200, description = "Updated run", body = RunResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Run not found"),
    ),
    security(("X-Modelctl-User" = []))
)]
#[instrument(skip_all, fields(user = %current_user.email))]
pub async fn set_run_actual(
    State(state): State<AppState>,
    Path(id): Path<RunResultId>,
    current_user: CurrentUser,
    Json(update): Json<RunActualUpdate>,
) -> Result<Json<RunResponse>> {
    require_admin(&current_user)?;

    let run = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        RunResults::new(&mut conn).get_by_id(id).await?
    }
    .ok_or_else(|| Error::NotFound {
        resource: "Run result".to_string(),
        id: id.to_string(),
    })?;
    // Tenancy check through the owning model
    find_org_model(&state, run.model_id, &current_user).await.map_err(|_| Error::NotFound {
        resource: "Run result".to_string(),
        id: id.to_string(),
    })?;

    let run = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        RunResults::new(&mut conn).set_actual(run.id, &update.actual).await?
    };

    recompute_for_model(&state.db, run.model_id).await?;

    Ok(Json(RunResponse::from(run)))
}
