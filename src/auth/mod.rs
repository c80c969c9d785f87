use serde::{Deserialize, Serialize};

/// Who is calling. Opaque fields issued by the upstream identity service;
/// the core never interprets them beyond equality checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

/// Roles the upstream identity service issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Student,
    Faculty,
    CollegeAdmin,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Parse the role signal forwarded by the API gateway. Unknown roles are
    /// rejected rather than defaulted.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "faculty" => Some(Role::Faculty),
            "college_admin" => Some(Role::CollegeAdmin),
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::CollegeAdmin | Role::Admin | Role::SuperAdmin)
    }
}

/// Visibility window for admin review queues. `Entire` is the distinguished
/// superuser scope that bypasses college partitioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminScope {
    Entire,
    College(String),
}

/// Typed caller context the middleware builds from trusted headers and the
/// handlers pass into the provisioning core. The core never sees a header.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub role: Role,
    pub tenant_scope: Option<String>,
}

impl RequestContext {
    /// Review-queue scope for this caller. Super admins see the whole
    /// cluster; everyone else is partitioned to their college (or the
    /// single-tenant window when no college was issued).
    pub fn admin_scope(&self) -> AdminScope {
        match (&self.role, &self.tenant_scope) {
            (Role::SuperAdmin, _) => AdminScope::Entire,
            (_, Some(college)) => AdminScope::College(college.clone()),
            (_, None) => AdminScope::Entire,
        }
    }
}
