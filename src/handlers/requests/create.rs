use axum::{Extension, Json};
use serde::Deserialize;

use crate::auth::RequestContext;
use crate::database::models::request::ProvisioningRequest;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ProvisionService;

#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub db_name: String,
}

/// POST /api/requests - submit a new database request
pub async fn request_create(
    Extension(context): Extension<RequestContext>,
    Json(body): Json<CreateRequestBody>,
) -> ApiResult<ProvisioningRequest> {
    let service = ProvisionService::from_env().await?;
    let request = service
        .create_request(
            &context.identity,
            context.tenant_scope.clone(),
            body.db_name.trim(),
        )
        .await?;

    Ok(ApiResponse::created(request))
}
