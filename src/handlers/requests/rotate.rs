use axum::{extract::Path, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::RequestContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ProvisionService;

#[derive(Debug, Deserialize)]
pub struct RotatePasswordBody {
    pub password: String,
}

/// PUT /api/requests/:id/password - rotate the provisioned role's password
pub async fn request_rotate_password(
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<RotatePasswordBody>,
) -> ApiResult<Value> {
    let service = ProvisionService::from_env().await?;
    service
        .rotate_password(id, &context.identity, &body.password)
        .await?;

    Ok(ApiResponse::success(json!({
        "message": "Password changed successfully."
    })))
}
