use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::AdminScope;
use crate::database::models::request::ProvisioningRequest;

/// Errors from the provisioning request store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Name already in use: {0}")]
    Conflict(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Result of atomically taking a one-time secret.
#[derive(Debug, Clone)]
pub struct ConsumedSecret {
    pub database_name: String,
    pub database_user: String,
    pub secret: String,
}

/// Durable persistence for provisioning requests. Pure storage: no cluster
/// interaction. The conditional mutations (`claim_for_approval`,
/// `consume_secret`, `mark_*`) are the per-row serialization points the
/// state machine relies on, so concurrent operations on the same request
/// resolve to exactly one winner.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a fresh pending request. Fails with `Conflict` when the
    /// database name or derived user is already taken.
    async fn insert(&self, request: &ProvisioningRequest) -> Result<(), StoreError>;

    /// True when either name would collide with an existing request's
    /// database name or user.
    async fn names_in_use(
        &self,
        database_name: &str,
        database_user: &str,
    ) -> Result<bool, StoreError>;

    /// Load a request only if it belongs to the given requester.
    async fn get_owned(
        &self,
        id: Uuid,
        requester_id: &str,
    ) -> Result<Option<ProvisioningRequest>, StoreError>;

    /// All requests by a requester, newest first.
    async fn list_for_requester(
        &self,
        requester_id: &str,
    ) -> Result<Vec<ProvisioningRequest>, StoreError>;

    /// Pending requests for the admin review queue, oldest first.
    /// College scope also sees legacy records with no scope at all.
    async fn list_pending(
        &self,
        scope: &AdminScope,
    ) -> Result<Vec<ProvisioningRequest>, StoreError>;

    /// Atomically claim a pending request for approval by recording the
    /// approver. Exactly one concurrent claim succeeds; `None` means the
    /// request is missing, already processed, or claimed by someone else.
    async fn claim_for_approval(
        &self,
        id: Uuid,
        approver: &str,
    ) -> Result<Option<ProvisioningRequest>, StoreError>;

    /// Transition a claimed request to approved and store the secret
    /// transiently.
    async fn finish_approval(&self, id: Uuid, secret: &str) -> Result<(), StoreError>;

    /// Flag a claimed request whose cluster sequence failed partway. The
    /// record survives as the breadcrumb for manual reconciliation; the
    /// undelivered secret is discarded.
    async fn mark_error(&self, id: Uuid) -> Result<(), StoreError>;

    /// Conditional pending -> rejected. Returns false when the request is
    /// missing or no longer pending.
    async fn mark_rejected(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Atomically take the one-time secret: clears it and returns the
    /// pre-clear value in one conditional update, so two racing reveals
    /// cannot both receive it. `None` means missing, not owned, or already
    /// consumed.
    async fn consume_secret(
        &self,
        id: Uuid,
        requester_id: &str,
    ) -> Result<Option<ConsumedSecret>, StoreError>;

    /// Refresh `updated_at` without touching anything else.
    async fn touch(&self, id: Uuid) -> Result<(), StoreError>;

    /// Remove the record. Only called after cluster teardown succeeded.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

const COLUMNS: &str = "id, requester_id, requester_name, tenant_scope, database_name, \
                       database_user, status, approved_by, one_time_secret, created_at, updated_at";

/// Production store over the portal's Postgres database.
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema bootstrap, run once at startup. The unique indexes
    /// are the backstop behind the store's pre-insert collision check.
    pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS provisioning_requests (
                id UUID PRIMARY KEY,
                requester_id TEXT NOT NULL,
                requester_name TEXT NOT NULL,
                tenant_scope TEXT,
                database_name VARCHAR(63) NOT NULL,
                database_user VARCHAR(63) NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                approved_by TEXT,
                one_time_secret TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS provisioning_requests_database_name_key \
             ON provisioning_requests (database_name)",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS provisioning_requests_database_user_key \
             ON provisioning_requests (database_user)",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS provisioning_requests_status_idx \
             ON provisioning_requests (status, created_at)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    fn map_insert_error(err: sqlx::Error, request: &ProvisioningRequest) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::Conflict(request.database_name.clone());
            }
        }
        StoreError::Sqlx(err)
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn insert(&self, request: &ProvisioningRequest) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO provisioning_requests \
             (id, requester_id, requester_name, tenant_scope, database_name, database_user, \
              status, approved_by, one_time_secret, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(request.id)
        .bind(&request.requester_id)
        .bind(&request.requester_name)
        .bind(&request.tenant_scope)
        .bind(&request.database_name)
        .bind(&request.database_user)
        .bind(request.status.as_str())
        .bind(&request.approved_by)
        .bind(&request.one_time_secret)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, request))?;

        Ok(())
    }

    async fn names_in_use(
        &self,
        database_name: &str,
        database_user: &str,
    ) -> Result<bool, StoreError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM provisioning_requests \
             WHERE database_name = $1 OR database_user = $1 \
                OR database_name = $2 OR database_user = $2",
        )
        .bind(database_name)
        .bind(database_user)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }

    async fn get_owned(
        &self,
        id: Uuid,
        requester_id: &str,
    ) -> Result<Option<ProvisioningRequest>, StoreError> {
        let row = sqlx::query_as::<_, ProvisioningRequest>(&format!(
            "SELECT {} FROM provisioning_requests WHERE id = $1 AND requester_id = $2",
            COLUMNS
        ))
        .bind(id)
        .bind(requester_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_for_requester(
        &self,
        requester_id: &str,
    ) -> Result<Vec<ProvisioningRequest>, StoreError> {
        let rows = sqlx::query_as::<_, ProvisioningRequest>(&format!(
            "SELECT {} FROM provisioning_requests WHERE requester_id = $1 \
             ORDER BY created_at DESC",
            COLUMNS
        ))
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_pending(
        &self,
        scope: &AdminScope,
    ) -> Result<Vec<ProvisioningRequest>, StoreError> {
        let rows = match scope {
            AdminScope::Entire => {
                sqlx::query_as::<_, ProvisioningRequest>(&format!(
                    "SELECT {} FROM provisioning_requests WHERE status = 'pending' \
                     ORDER BY created_at ASC",
                    COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
            AdminScope::College(college) => {
                sqlx::query_as::<_, ProvisioningRequest>(&format!(
                    "SELECT {} FROM provisioning_requests WHERE status = 'pending' \
                     AND (tenant_scope = $1 OR tenant_scope IS NULL) \
                     ORDER BY created_at ASC",
                    COLUMNS
                ))
                .bind(college)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    async fn claim_for_approval(
        &self,
        id: Uuid,
        approver: &str,
    ) -> Result<Option<ProvisioningRequest>, StoreError> {
        let row = sqlx::query_as::<_, ProvisioningRequest>(&format!(
            "UPDATE provisioning_requests \
             SET approved_by = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' AND approved_by IS NULL \
             RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(approver)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn finish_approval(&self, id: Uuid, secret: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE provisioning_requests \
             SET status = 'approved', one_time_secret = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(secret)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_error(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE provisioning_requests \
             SET status = 'error', one_time_secret = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_rejected(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE provisioning_requests \
             SET status = 'rejected', updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' AND approved_by IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn consume_secret(
        &self,
        id: Uuid,
        requester_id: &str,
    ) -> Result<Option<ConsumedSecret>, StoreError> {
        // Single conditional update: the row lock taken by the inner SELECT
        // serializes racing reveals, and RETURNING hands back the pre-clear
        // secret. Zero rows means there was nothing left to take.
        let row: Option<(String, String, String)> = sqlx::query_as(
            "WITH claimed AS ( \
                 SELECT id, one_time_secret FROM provisioning_requests \
                 WHERE id = $1 AND requester_id = $2 AND one_time_secret IS NOT NULL \
                 FOR UPDATE \
             ) \
             UPDATE provisioning_requests r \
             SET one_time_secret = NULL, updated_at = NOW() \
             FROM claimed \
             WHERE r.id = claimed.id \
             RETURNING r.database_name, r.database_user, claimed.one_time_secret",
        )
        .bind(id)
        .bind(requester_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(database_name, database_user, secret)| ConsumedSecret {
            database_name,
            database_user,
            secret,
        }))
    }

    async fn touch(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE provisioning_requests SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM provisioning_requests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
