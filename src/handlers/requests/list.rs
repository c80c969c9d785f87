use axum::Extension;

use crate::auth::RequestContext;
use crate::database::models::request::ProvisioningRequest;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ProvisionService;

/// GET /api/requests/my - the caller's own requests, newest first
pub async fn request_list_mine(
    Extension(context): Extension<RequestContext>,
) -> ApiResult<Vec<ProvisioningRequest>> {
    let service = ProvisionService::from_env().await?;
    let requests = service.list_for_requester(&context.identity).await?;

    Ok(ApiResponse::success(requests))
}
