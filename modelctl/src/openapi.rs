//! OpenAPI documentation configuration.
//!
//! Two documents, one per API surface, nested under their serving prefixes:
//! the management API at `/admin/api/v1` and the execution API at `/api/v1`.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers;
use crate::api::models;
use crate::db::models::access_tokens::TokenStatus;
use crate::db::models::models::ModelStatus;
use crate::db::models::snapshots::AnalyticsSnapshotDBResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::models::upload_model,
        handlers::models::list_models,
        handlers::models::get_model,
        handlers::models::update_model,
        handlers::runs::run_model,
        handlers::runs::set_run_actual,
        handlers::access_tokens::grant_access_token,
        handlers::access_tokens::list_access_tokens,
        handlers::access_tokens::activate_access_token,
        handlers::access_tokens::revoke_access_token,
    ),
    components(schemas(
        ModelStatus,
        TokenStatus,
        AnalyticsSnapshotDBResponse,
        models::models::ModelResponse,
        models::models::ModelListEntry,
        models::models::ModelListResponse,
        models::models::ModelDetailResponse,
        models::models::ModelUpdate,
        models::runs::RunResponse,
        models::runs::OperatorRunRequest,
        models::runs::OperatorRunResponse,
        models::runs::RunActualUpdate,
        models::access_tokens::AccessTokenCreate,
        models::access_tokens::AccessTokenResponse,
        models::access_tokens::AccessTokenActivatedResponse,
        models::users::CurrentUser,
    )),
    tags(
        (name = "models", description = "Predictive model upload and management"),
        (name = "runs", description = "Operator test runs and ground-truth back-fill"),
        (name = "access_tokens", description = "Execution credential lifecycle"),
    )
)]
struct AdminApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::predict::describe_model, handlers::predict::execute_prediction),
    components(schemas(models::predict::DescribeResponse, models::predict::ExecuteResponse)),
    tags((name = "execution", description = "Access-gated model execution"))
)]
struct ExecutionApiDoc;

/// Combined API documentation, served by Scalar at `/docs`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "modelctl",
        description = "Execution and run-time accuracy analytics for uploaded predictive models",
    ),
    nest(
        (path = "/admin/api/v1", api = AdminApiDoc),
        (path = "/api/v1", api = ExecutionApiDoc),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "X-Modelctl-User",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "X-Modelctl-User",
                "Operator email forwarded by the SSO-terminating proxy",
            ))),
        );
        components.add_security_scheme(
            "X-Access-Token",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "X-Access-Token",
                "Per-(user, model) execution credential",
            ))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/execute"));
        assert!(paths.iter().any(|p| p.as_str() == "/admin/api/v1/models"));
    }
}
