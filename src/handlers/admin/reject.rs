use axum::{extract::Path, Extension};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::RequestContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ProvisionService;

/// POST /api/admin/requests/:id/reject - decline a pending request.
/// Store-only; nothing was provisioned for it.
pub async fn request_reject(
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let service = ProvisionService::from_env().await?;
    service.reject(id, &context.identity).await?;

    Ok(ApiResponse::success(json!({
        "message": "Request rejected."
    })))
}
