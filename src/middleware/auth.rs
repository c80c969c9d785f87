use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::{Identity, RequestContext, Role};
use crate::error::ApiError;

// Identity fields the upstream gateway forwards after verifying the caller's
// token. This middleware is the only place in the codebase that knows these
// header names; everything past it works with the typed RequestContext.
const USER_ID_HEADER: &str = "x-user-id";
const USER_NAME_HEADER: &str = "x-user-name";
const USER_ROLE_HEADER: &str = "x-user-role";
const COLLEGE_HEADER: &str = "x-user-college-id";

/// Middleware for authenticated routes: builds a RequestContext from the
/// trusted identity headers and injects it into request extensions.
pub async fn require_user(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let context = context_from_headers(request.headers())?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Middleware for admin routes: same as `require_user` but rejects callers
/// whose role carries no admin capability.
pub async fn require_admin(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let context = context_from_headers(request.headers())?;
    if !context.role.is_admin() {
        return Err(ApiError::forbidden("Administrator role required"));
    }
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn context_from_headers(headers: &HeaderMap) -> Result<RequestContext, ApiError> {
    let user_id = required_header(headers, USER_ID_HEADER)?;
    let username = required_header(headers, USER_NAME_HEADER)?;
    let role_value = required_header(headers, USER_ROLE_HEADER)?;

    let role = Role::parse(&role_value)
        .ok_or_else(|| ApiError::unauthorized(format!("Unknown role: {}", role_value)))?;

    let tenant_scope = headers
        .get(COLLEGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from);

    Ok(RequestContext {
        identity: Identity::new(user_id, username),
        role,
        tenant_scope,
    })
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, ApiError> {
    let value = headers
        .get(name)
        .ok_or_else(|| ApiError::unauthorized(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| ApiError::unauthorized(format!("Invalid {} header", name)))?
        .trim();

    if value.is_empty() {
        return Err(ApiError::unauthorized(format!("Empty {} header", name)));
    }
    Ok(value.to_string())
}
