use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

/// POST /api/login - forward credentials to the upstream identity service
/// and relay its tokens plus the user profile. The portal itself never
/// verifies passwords; role and identity arrive later as trusted headers
/// set by the gateway from the issued token.
pub async fn login_post(Json(body): Json<LoginBody>) -> ApiResult<Value> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let identity = &config::config().identity;
    let base_url = identity
        .base_url
        .as_deref()
        .ok_or_else(|| ApiError::service_unavailable("Identity service is not configured"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(identity.request_timeout_secs))
        .build()
        .map_err(|e| ApiError::internal_server_error(format!("HTTP client error: {}", e)))?;

    let token_response = client
        .post(format!("{}/api/users/token/", base_url))
        .json(&json!({
            "username": body.username,
            "password": body.password,
        }))
        .send()
        .await
        .map_err(|e| {
            ApiError::service_unavailable(format!(
                "Could not connect to authentication service: {}",
                e
            ))
        })?;

    if !token_response.status().is_success() {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let tokens: Value = token_response
        .json()
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Malformed token response: {}", e)))?;

    let access_token = tokens
        .get("access")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_gateway("Identity service returned no access token"))?;

    let profile_response = client
        .get(format!("{}/api/users/profile/", base_url))
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Could not retrieve user profile: {}", e)))?;

    if !profile_response.status().is_success() {
        return Err(ApiError::bad_gateway("Could not retrieve user profile"));
    }

    let user: Value = profile_response
        .json()
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Malformed profile response: {}", e)))?;

    Ok(ApiResponse::success(json!({
        "tokens": tokens,
        "user": user,
    })))
}
