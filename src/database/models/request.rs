use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::Identity;

/// Postgres identifier limit; also the column width in the original portal.
pub const MAX_DATABASE_NAME_BYTES: usize = 63;

/// The derived role name keeps this much of the database name before the
/// suffix, so the result always fits the identifier limit.
const USER_PREFIX_CHARS: usize = 50;
const USER_SUFFIX: &str = "_user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for RequestStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        match value.as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "error" => Ok(RequestStatus::Error),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// One provisioning request: the durable record tying a requester to the
/// database and role provisioned for them on the target cluster.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProvisioningRequest {
    pub id: Uuid,
    pub requester_id: String,
    pub requester_name: String,
    pub tenant_scope: Option<String>,
    pub database_name: String,
    pub database_user: String,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub approved_by: Option<String>,
    // Present only between approval and first reveal; never serialized into
    // API payloads.
    #[serde(skip_serializing)]
    pub one_time_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProvisioningRequest {
    /// Fresh pending request for a validated database name.
    pub fn new(identity: &Identity, tenant_scope: Option<String>, database_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            requester_id: identity.user_id.clone(),
            requester_name: identity.username.clone(),
            tenant_scope,
            database_name: database_name.to_string(),
            database_user: derive_database_user(database_name),
            status: RequestStatus::Pending,
            approved_by: None,
            one_time_secret: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Database role name derived from the database name: normalize separator
/// characters, truncate to a safe prefix, append a fixed suffix. Pure and
/// deterministic, so re-computation always agrees with the stored value.
pub fn derive_database_user(database_name: &str) -> String {
    let normalized = database_name.replace('-', "_");
    let prefix: String = normalized.chars().take(USER_PREFIX_CHARS).collect();
    format!("{}{}", prefix, USER_SUFFIX)
}

/// Validate a requested database name against the cluster's identifier
/// rules before anything is persisted or interpolated.
pub fn validate_database_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Database name must not be empty".to_string());
    }
    if name.len() > MAX_DATABASE_NAME_BYTES {
        return Err(format!(
            "Database name must be at most {} bytes",
            MAX_DATABASE_NAME_BYTES
        ));
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return Err("Database name must start with a letter".to_string()),
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(
            "Database name may only contain letters, digits, underscores, and hyphens"
                .to_string(),
        );
    }
    Ok(())
}
