use axum::{extract::Path, Extension};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::RequestContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ProvisionService;

/// GET /api/requests/:id/size - on-disk size of the provisioned database
pub async fn request_size(
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let service = ProvisionService::from_env().await?;
    let size = service.database_size(id, &context.identity).await?;

    Ok(ApiResponse::success(json!({ "size": size })))
}
