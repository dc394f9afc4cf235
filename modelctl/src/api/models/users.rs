//! API models for operator identity.

use crate::types::{OrganizationId, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The authenticated operator on management API requests, resolved from the
/// trusted proxy header.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = Uuid)]
    pub id: UserId,
    #[schema(value_type = Uuid)]
    pub organization_id: OrganizationId,
    pub email: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
}

impl From<crate::db::models::users::UserDBResponse> for CurrentUser {
    fn from(user: crate::db::models::users::UserDBResponse) -> Self {
        Self {
            id: user.id,
            organization_id: user.organization_id,
            email: user.email,
            display_name: user.display_name,
            is_admin: user.is_admin,
        }
    }
}
