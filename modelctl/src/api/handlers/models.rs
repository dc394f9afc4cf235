use std::collections::HashSet;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use tracing::instrument;

use crate::{
    AppState,
    api::models::{
        models::{ModelDetailResponse, ModelListEntry, ModelListResponse, ModelResponse, ModelUpdate},
        users::CurrentUser,
    },
    auth::require_admin,
    db::errors::DbError,
    db::handlers::{Models, Repository, RunResults, Snapshots, models::ModelFilter},
    db::models::models::{ModelCreateDBRequest, ModelDBResponse, ModelUpdateDBRequest},
    errors::{Error, Result},
    types::ModelId,
};

/// Number of recent runs included in the model detail view.
const RECENT_RUN_LIMIT: usize = 30;

/// Fetch a model scoped to the caller's organization. Models of other
/// tenants are reported as not found rather than forbidden.
pub(crate) async fn find_org_model(state: &AppState, id: ModelId, user: &CurrentUser) -> Result<ModelDBResponse> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let model = Models::new(&mut conn).get_by_id(id).await?;

    match model {
        Some(model) if model.organization_id == user.organization_id => Ok(model),
        _ => Err(Error::NotFound {
            resource: "Predictive model".to_string(),
            id: id.to_string(),
        }),
    }
}

/// Upload a trained model artifact with its metadata.
///
/// Multipart fields: `model_name`, `model_description`, `model_type`,
/// `required_parameters` (comma separated), `target`, `model_accuracy`,
/// `last_trained_on` (YYYY-MM-DD), and the `model_file` itself.
#[utoipa::path(
    post,
    path = "/models",
    tag = "models",
    summary = "Upload model",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Model uploaded", body = ModelResponse),
        (status = 400, description = "Missing or invalid metadata"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(("X-Modelctl-User" = []))
)]
#[instrument(skip_all, fields(user = %current_user.email))]
pub async fn upload_model(
    State(state): State<AppState>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ModelResponse>)> {
    require_admin(&current_user)?;

    let mut name = None;
    let mut description = None;
    let mut model_type = None;
    let mut required_parameters = None;
    let mut target = None;
    let mut declared_accuracy = None;
    let mut last_trained_on = None;
    let mut artifact: Option<(String, axum::body::Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Malformed multipart body: {e}"),
    })? {
        match field.name() {
            Some("model_name") => name = Some(read_text(field).await?),
            Some("model_description") => description = Some(read_text(field).await?),
            Some("model_type") => model_type = Some(read_text(field).await?),
            Some("required_parameters") => required_parameters = Some(read_text(field).await?),
            Some("target") => target = Some(read_text(field).await?),
            Some("model_accuracy") => {
                let raw = read_text(field).await?;
                if !raw.trim().is_empty() {
                    let accuracy: f64 = raw.trim().parse().map_err(|_| Error::BadRequest {
                        message: "model_accuracy must be a number".to_string(),
                    })?;
                    if !(0.0..=100.0).contains(&accuracy) {
                        return Err(Error::BadRequest {
                            message: "model_accuracy must be between 0 and 100".to_string(),
                        });
                    }
                    declared_accuracy = Some(accuracy);
                }
            }
            Some("last_trained_on") => {
                let raw = read_text(field).await?;
                if !raw.trim().is_empty() {
                    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| Error::BadRequest {
                        message: "last_trained_on must be a YYYY-MM-DD date".to_string(),
                    })?;
                    last_trained_on = Some(date);
                }
            }
            Some("model_file") => {
                let file_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .ok_or_else(|| Error::BadRequest {
                        message: "model_file must have a filename".to_string(),
                    })?;
                let bytes = field.bytes().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read model_file: {e}"),
                })?;
                artifact = Some((file_name, bytes));
            }
            _ => {}
        }
    }

    let name = required_text(name, "model_name")?;
    let required_parameters = parse_parameter_names(&required_text(required_parameters, "required_parameters")?)?;
    let (file_name, bytes) = artifact.ok_or_else(|| Error::BadRequest {
        message: "model_file is required".to_string(),
    })?;
    // Strip any client-supplied directory components
    let file_name = std::path::Path::new(&file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::BadRequest {
            message: "model_file has an unusable filename".to_string(),
        })?
        .to_string();

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut repo = Models::new(&mut conn);
    let model = repo
        .create(&ModelCreateDBRequest {
            organization_id: current_user.organization_id,
            name,
            description,
            model_type,
            required_parameters,
            target,
            declared_accuracy,
            last_trained_on,
        })
        .await?;

    // Stage the artifact under <root>/<org>/models/<model_id>/<filename>
    let relative = std::path::PathBuf::from(current_user.organization_id.to_string())
        .join("models")
        .join(model.id.to_string())
        .join(&file_name);
    let absolute = state.config.storage.artifact_root.join(&relative);
    if let Some(parent) = absolute.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| Error::Internal {
            operation: format!("create artifact directory: {e}"),
        })?;
    }
    tokio::fs::write(&absolute, &bytes).await.map_err(|e| Error::Internal {
        operation: format!("store model artifact: {e}"),
    })?;

    let model = repo
        .update(
            model.id,
            &ModelUpdateDBRequest {
                artifact_path: Some(relative.to_string_lossy().into_owned()),
                ..Default::default()
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ModelResponse::from(model))))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field.text().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to read multipart field: {e}"),
    })
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(Error::BadRequest {
            message: format!("{field} is required"),
        }),
    }
}

/// Split a comma-separated parameter declaration into ordered, distinct names.
fn parse_parameter_names(raw: &str) -> Result<Vec<String>> {
    let names: Vec<String> = raw.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect();

    if names.is_empty() {
        return Err(Error::BadRequest {
            message: "required_parameters must declare at least one parameter".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name) {
            return Err(Error::BadRequest {
                message: format!("required_parameters contains duplicate name '{name}'"),
            });
        }
    }

    Ok(names)
}

/// List the organization's models with their snapshot summaries.
#[utoipa::path(
    get,
    path = "/models",
    tag = "models",
    summary = "List models",
    responses(
        (status = 200, description = "Models with analytics summaries", body = ModelListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Modelctl-User" = []))
)]
#[instrument(skip_all, fields(user = %current_user.email))]
pub async fn list_models(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ModelListResponse>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let models = Models::new(&mut conn)
        .list(&ModelFilter {
            skip: 0,
            limit: 500,
            organization_id: Some(current_user.organization_id),
            status: None,
        })
        .await?;

    let mut entries = Vec::with_capacity(models.len());
    let mut total_predictions = 0;
    for model in models {
        let snapshot = Snapshots::new(&mut conn).get_by_model(model.id).await?;
        let accuracy = snapshot.as_ref().and_then(|s| s.accuracy);
        let model_predictions = snapshot.as_ref().map(|s| s.total_predictions).unwrap_or(0);
        total_predictions += model_predictions;
        entries.push(ModelListEntry {
            model: ModelResponse::from(model),
            accuracy,
            total_predictions: model_predictions,
        });
    }

    Ok(Json(ModelListResponse {
        models: entries,
        total_predictions,
    }))
}

/// Model detail with snapshot and recent run history.
#[utoipa::path(
    get,
    path = "/models/{id}",
    tag = "models",
    summary = "Get model",
    params(("id" = uuid::Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Model detail", body = ModelDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Model not found"),
    ),
    security(("X-Modelctl-User" = []))
)]
#[instrument(skip_all, fields(user = %current_user.email))]
pub async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<ModelId>,
    current_user: CurrentUser,
) -> Result<Json<ModelDetailResponse>> {
    let model = find_org_model(&state, id, &current_user).await?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let analytics = Snapshots::new(&mut conn).get_by_model(model.id).await?;
    let mut runs = RunResults::new(&mut conn).list_for_model(model.id).await?;
    // Newest first, capped
    runs.reverse();
    runs.truncate(RECENT_RUN_LIMIT);

    Ok(Json(ModelDetailResponse {
        model: ModelResponse::from(model),
        analytics,
        recent_runs: runs.into_iter().map(Into::into).collect(),
    }))
}

/// Edit model metadata or flip its lifecycle status.
#[utoipa::path(
    patch,
    path = "/models/{id}",
    tag = "models",
    summary = "Update model",
    params(("id" = uuid::Uuid, Path, description = "Model ID")),
    request_body = ModelUpdate,
    responses(
        (status = 200, description = "Updated model", body = ModelResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Model not found"),
    ),
    security(("X-Modelctl-User" = []))
)]
#[instrument(skip_all, fields(user = %current_user.email))]
pub async fn update_model(
    State(state): State<AppState>,
    Path(id): Path<ModelId>,
    current_user: CurrentUser,
    Json(update): Json<ModelUpdate>,
) -> Result<Json<ModelResponse>> {
    require_admin(&current_user)?;
    find_org_model(&state, id, &current_user).await?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let model = Models::new(&mut conn)
        .update(
            id,
            &ModelUpdateDBRequest {
                name: update.name,
                description: update.description,
                model_type: update.model_type,
                target: update.target,
                status: update.status,
                artifact_path: None,
                declared_accuracy: update.declared_accuracy,
                last_trained_on: update.last_trained_on,
            },
        )
        .await?;

    Ok(Json(ModelResponse::from(model)))
}
