use axum::{extract::Path, Extension};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::RequestContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ProvisionService;

/// DELETE /api/requests/:id - tear down the provisioned database and role,
/// then remove the record. A failed teardown keeps the record so the call
/// can be retried.
pub async fn request_delete(
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let service = ProvisionService::from_env().await?;
    service.delete_provisioned(id, &context.identity).await?;

    Ok(ApiResponse::success(json!({
        "message": "Database deleted successfully."
    })))
}
