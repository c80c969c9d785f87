use axum::{extract::Path, Extension};
use uuid::Uuid;

use crate::auth::RequestContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{ProvisionService, ProvisionedDatabase};

/// POST /api/admin/requests/:id/approve - provision the database and role.
/// The response carries the names only; the password is delivered once,
/// through the requester's reveal endpoint.
pub async fn request_approve(
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProvisionedDatabase> {
    let service = ProvisionService::from_env().await?;
    let provisioned = service.approve(id, &context.identity).await?;

    Ok(ApiResponse::success(provisioned))
}
