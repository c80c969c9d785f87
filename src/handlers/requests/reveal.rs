use axum::{extract::Path, Extension};
use uuid::Uuid;

use crate::auth::RequestContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{ProvisionService, RevealedCredentials};

/// POST /api/requests/:id/reveal - one-shot credential delivery. The secret
/// is cleared in the same store update that returns it; a second call gets
/// 410 Gone.
pub async fn request_reveal(
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<RevealedCredentials> {
    let service = ProvisionService::from_env().await?;
    let credentials = service.reveal(id, &context.identity).await?;

    Ok(ApiResponse::success(credentials))
}
