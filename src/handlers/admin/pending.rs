use axum::Extension;

use crate::auth::RequestContext;
use crate::database::models::request::ProvisioningRequest;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ProvisionService;

/// GET /api/admin/requests/pending - the review queue, oldest first.
/// College admins see their college (plus legacy unscoped records); the
/// super-admin scope sees everything.
pub async fn request_list_pending(
    Extension(context): Extension<RequestContext>,
) -> ApiResult<Vec<ProvisioningRequest>> {
    let service = ProvisionService::from_env().await?;
    let requests = service.list_pending(&context.admin_scope()).await?;

    Ok(ApiResponse::success(requests))
}
