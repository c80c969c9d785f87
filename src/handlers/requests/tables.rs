use axum::{extract::Path, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::RequestContext;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::ProvisionService;

#[derive(Debug, Deserialize)]
pub struct ListTablesBody {
    pub password: String,
}

/// POST /api/requests/:id/tables - list user tables by connecting to the
/// provisioned database as its role. The caller supplies the password
/// because the portal no longer has it.
pub async fn request_tables(
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<ListTablesBody>,
) -> ApiResult<Value> {
    let service = ProvisionService::from_env().await?;
    let tables = service
        .list_tables(id, &context.identity, &body.password)
        .await?;

    Ok(ApiResponse::success(json!({ "tables": tables })))
}
