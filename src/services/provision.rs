use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AdminScope, Identity};
use crate::config;
use crate::database::admin::{ClusterAdmin, ClusterError, PgClusterAdmin};
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::request::{validate_database_name, ProvisioningRequest, RequestStatus};
use crate::database::requests::{PgRequestStore, RequestStore, StoreError};
use crate::services::secret;

/// Rotated passwords chosen by the requester must be at least this long.
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Request not found or already processed")]
    NotFound,

    #[error("Credentials already revealed")]
    AlreadyRevealed,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ProvisionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(name) => {
                ProvisionError::Conflict(format!("Database name already in use: {}", name))
            }
            other => ProvisionError::Store(other),
        }
    }
}

/// Approve result: the provisioned names. The password is deliberately
/// absent; it is delivered exactly once through `reveal`.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedDatabase {
    pub db_name: String,
    pub db_user: String,
}

/// The one-shot credential triple handed to the requester on first reveal.
#[derive(Debug, Clone, Serialize)]
pub struct RevealedCredentials {
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
}

/// The provisioning state machine. Orchestrates the request lifecycle
/// (pending -> approved/rejected/error -> removed) and the privileged
/// cluster sequences behind approve, rotate, and delete, keeping the store
/// record consistent with cluster reality.
///
/// Failure policy, in one place:
/// - approve: a failed cluster step leaves partial cluster state in place
///   (no blind DDL rollback) and flags the record `error` for manual
///   reconciliation;
/// - rotate/delete: cluster failures leave the record untouched so the
///   operation stays retryable.
pub struct ProvisionService {
    store: Arc<dyn RequestStore>,
    cluster: Arc<dyn ClusterAdmin>,
}

impl ProvisionService {
    pub fn with_parts(store: Arc<dyn RequestStore>, cluster: Arc<dyn ClusterAdmin>) -> Self {
        Self { store, cluster }
    }

    /// Production wiring: pooled request store, unpooled cluster admin.
    pub async fn from_env() -> Result<Self, DatabaseError> {
        let pool = DatabaseManager::store_pool().await?;
        let cluster = PgClusterAdmin::from_env()?;
        Ok(Self::with_parts(
            Arc::new(PgRequestStore::new(pool)),
            Arc::new(cluster),
        ))
    }

    /// Record a new pending request. Validates the requested name, derives
    /// the role name, and rejects any collision against existing names or
    /// users before anything touches the cluster.
    pub async fn create_request(
        &self,
        identity: &Identity,
        tenant_scope: Option<String>,
        database_name: &str,
    ) -> Result<ProvisioningRequest, ProvisionError> {
        validate_database_name(database_name).map_err(ProvisionError::InvalidInput)?;

        let request = ProvisioningRequest::new(identity, tenant_scope, database_name);
        if self
            .store
            .names_in_use(&request.database_name, &request.database_user)
            .await?
        {
            return Err(ProvisionError::Conflict(format!(
                "Database name already in use: {}",
                request.database_name
            )));
        }

        // The store's unique indexes remain the backstop for racing creates.
        self.store.insert(&request).await?;

        info!(
            "request {} created: {} -> {} (requester {})",
            request.id, request.database_name, request.database_user, request.requester_id
        );
        Ok(request)
    }

    /// Approve a pending request: claim it, generate a credential, then run
    /// create_role -> create_database -> grant_all_privileges. The claim is
    /// a per-row conditional update, so exactly one of two concurrent
    /// approvals wins; the loser sees `NotFound`.
    pub async fn approve(
        &self,
        request_id: Uuid,
        approver: &Identity,
    ) -> Result<ProvisionedDatabase, ProvisionError> {
        let request = self
            .store
            .claim_for_approval(request_id, &approver.username)
            .await?
            .ok_or(ProvisionError::NotFound)?;

        let password = secret::generate_password(config::config().cluster.password_length);

        if let Err(cluster_err) = self.provision_cluster_objects(&request, &password).await {
            warn!(
                "request {} approve failed, flagged for manual reconciliation: {}",
                request_id, cluster_err
            );
            // Partial cluster state is intentionally preserved for
            // diagnosis; the error record is the durable breadcrumb.
            self.store.mark_error(request_id).await?;
            return Err(cluster_err.into());
        }

        self.store.finish_approval(request_id, &password).await?;

        info!(
            "request {} approved by {}: database {} role {}",
            request_id, approver.username, request.database_name, request.database_user
        );
        Ok(ProvisionedDatabase {
            db_name: request.database_name,
            db_user: request.database_user,
        })
    }

    async fn provision_cluster_objects(
        &self,
        request: &ProvisioningRequest,
        password: &str,
    ) -> Result<(), ClusterError> {
        self.cluster
            .create_role(&request.database_user, password)
            .await?;
        self.cluster.create_database(&request.database_name).await?;
        self.cluster
            .grant_all_privileges(&request.database_name, &request.database_user)
            .await
    }

    /// Reject a pending request. Store-only; nothing was ever provisioned
    /// for a pending request.
    pub async fn reject(&self, request_id: Uuid, approver: &Identity) -> Result<(), ProvisionError> {
        if !self.store.mark_rejected(request_id).await? {
            return Err(ProvisionError::NotFound);
        }
        info!("request {} rejected by {}", request_id, approver.username);
        Ok(())
    }

    /// Reveal the one-time credentials to their owner. The clear-and-return
    /// is a single conditional store update: a crash cannot leave the secret
    /// both delivered and retained, and racing reveals resolve to one winner.
    pub async fn reveal(
        &self,
        request_id: Uuid,
        requester: &Identity,
    ) -> Result<RevealedCredentials, ProvisionError> {
        match self
            .store
            .consume_secret(request_id, &requester.user_id)
            .await?
        {
            Some(consumed) => {
                info!("request {} credentials revealed", request_id);
                Ok(RevealedCredentials {
                    db_name: consumed.database_name,
                    db_user: consumed.database_user,
                    db_password: consumed.secret,
                })
            }
            // Nothing to take: distinguish a consumed secret from a request
            // this caller does not own.
            None => match self.store.get_owned(request_id, &requester.user_id).await? {
                Some(_) => Err(ProvisionError::AlreadyRevealed),
                None => Err(ProvisionError::NotFound),
            },
        }
    }

    /// Change the provisioned role's password on the cluster. A failed
    /// rotation is not a provisioning error: the record is left untouched
    /// and the call is safely retryable.
    pub async fn rotate_password(
        &self,
        request_id: Uuid,
        requester: &Identity,
        new_password: &str,
    ) -> Result<(), ProvisionError> {
        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ProvisionError::InvalidInput(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let request = self.owned_approved(request_id, requester).await?;

        self.cluster
            .alter_password(&request.database_user, new_password)
            .await?;
        self.store.touch(request_id).await?;

        info!("request {} password rotated", request_id);
        Ok(())
    }

    /// Tear down the provisioned objects and, only once the cluster side is
    /// fully gone, delete the record. Sessions are terminated first because
    /// a database with live connections cannot be dropped. Any failure
    /// preserves the record untouched, keeping the teardown visible and
    /// retryable.
    pub async fn delete_provisioned(
        &self,
        request_id: Uuid,
        requester: &Identity,
    ) -> Result<(), ProvisionError> {
        let request = self.owned_approved(request_id, requester).await?;

        self.cluster
            .terminate_connections(&request.database_name)
            .await?;
        self.cluster.drop_database(&request.database_name).await?;
        self.cluster.drop_role(&request.database_user).await?;

        self.store.delete(request_id).await?;

        info!(
            "request {} deleted: database {} role {} dropped",
            request_id, request.database_name, request.database_user
        );
        Ok(())
    }

    /// Size of the provisioned database, as reported by the cluster.
    pub async fn database_size(
        &self,
        request_id: Uuid,
        requester: &Identity,
    ) -> Result<String, ProvisionError> {
        let request = self.owned_approved(request_id, requester).await?;
        Ok(self.cluster.database_size(&request.database_name).await?)
    }

    /// List user tables in the provisioned database by connecting as the
    /// provisioned role with the caller-supplied password. The password is
    /// used for this one connection and never persisted.
    pub async fn list_tables(
        &self,
        request_id: Uuid,
        requester: &Identity,
        password: &str,
    ) -> Result<Vec<String>, ProvisionError> {
        if password.is_empty() {
            return Err(ProvisionError::InvalidInput(
                "Password is required".to_string(),
            ));
        }

        let request = self.owned_approved(request_id, requester).await?;
        Ok(self
            .cluster
            .list_tables(&request.database_name, &request.database_user, password)
            .await?)
    }

    /// A requester's own requests, newest first.
    pub async fn list_for_requester(
        &self,
        requester: &Identity,
    ) -> Result<Vec<ProvisioningRequest>, ProvisionError> {
        Ok(self.store.list_for_requester(&requester.user_id).await?)
    }

    /// The admin review queue, oldest first, partitioned by scope.
    pub async fn list_pending(
        &self,
        scope: &AdminScope,
    ) -> Result<Vec<ProvisioningRequest>, ProvisionError> {
        Ok(self.store.list_pending(scope).await?)
    }

    /// Ownership + status gate shared by the post-approval operations.
    /// Anything not owned by this caller, or not approved, reads as absent.
    async fn owned_approved(
        &self,
        request_id: Uuid,
        requester: &Identity,
    ) -> Result<ProvisioningRequest, ProvisionError> {
        let request = self
            .store
            .get_owned(request_id, &requester.user_id)
            .await?
            .ok_or(ProvisionError::NotFound)?;

        if request.status != RequestStatus::Approved {
            return Err(ProvisionError::NotFound);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::secret::DEFAULT_PASSWORD_LENGTH;
    use crate::testing::{service_with_doubles, TestHarness};

    fn student() -> Identity {
        Identity::new("42", "ada")
    }

    fn other_student() -> Identity {
        Identity::new("77", "grace")
    }

    fn admin() -> Identity {
        Identity::new("1", "dean")
    }

    #[tokio::test]
    async fn create_derives_user_and_persists_pending() {
        let TestHarness { service, store, .. } = service_with_doubles();

        let request = service
            .create_request(&student(), Some("cs".into()), "cs101")
            .await
            .unwrap();

        assert_eq!(request.database_user, "cs101_user");
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.approved_by, None);
        assert_eq!(request.one_time_secret, None);

        let stored = store.get_owned(request.id, "42").await.unwrap().unwrap();
        assert_eq!(stored.database_name, "cs101");
        assert_eq!(stored.tenant_scope.as_deref(), Some("cs"));
    }

    #[tokio::test]
    async fn create_rejects_invalid_names_before_any_store_write() {
        let TestHarness { service, store, .. } = service_with_doubles();

        let too_long = "x".repeat(64);
        for bad in ["", "1cs", "cs 101", "cs;drop", too_long.as_str()] {
            let err = service.create_request(&student(), None, bad).await.unwrap_err();
            assert!(matches!(err, ProvisionError::InvalidInput(_)), "{:?}", bad);
        }
        assert!(store.list_for_requester("42").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_conflicts_on_duplicate_name() {
        let TestHarness { service, .. } = service_with_doubles();

        service.create_request(&student(), None, "cs101").await.unwrap();
        let err = service
            .create_request(&other_student(), None, "cs101")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Conflict(_)));
    }

    #[tokio::test]
    async fn create_conflicts_when_name_collides_with_existing_user() {
        let TestHarness { service, .. } = service_with_doubles();

        // "cs101" owns the derived role "cs101_user"; a later request for
        // that exact name must be refused.
        service.create_request(&student(), None, "cs101").await.unwrap();
        let err = service
            .create_request(&other_student(), None, "cs101_user")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Conflict(_)));
    }

    #[tokio::test]
    async fn approve_provisions_in_order_and_stores_secret() {
        let TestHarness { service, store, cluster } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        let provisioned = service.approve(request.id, &admin()).await.unwrap();

        assert_eq!(provisioned.db_name, "cs101");
        assert_eq!(provisioned.db_user, "cs101_user");

        assert_eq!(
            cluster.calls(),
            vec![
                "create_role:cs101_user".to_string(),
                "create_database:cs101".to_string(),
                "grant_all_privileges:cs101:cs101_user".to_string(),
            ]
        );

        let stored = store.get_owned(request.id, "42").await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
        assert_eq!(stored.approved_by.as_deref(), Some("dean"));
        let secret = stored.one_time_secret.expect("secret stored transiently");
        assert_eq!(secret.len(), DEFAULT_PASSWORD_LENGTH);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn approve_missing_or_processed_request_is_not_found() {
        let TestHarness { service, .. } = service_with_doubles();

        let err = service.approve(Uuid::new_v4(), &admin()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::NotFound));

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();
        let err = service.approve(request.id, &admin()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::NotFound));
    }

    #[tokio::test]
    async fn approve_failure_flags_error_and_never_rolls_back() {
        let TestHarness { service, store, cluster } = service_with_doubles();
        cluster.fail_on("create_database", "permission denied for cluster");

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        let err = service.approve(request.id, &admin()).await.unwrap_err();

        match err {
            ProvisionError::Cluster(ClusterError::Operation { op, message }) => {
                assert_eq!(op, "create_database");
                assert!(message.contains("permission denied"));
            }
            other => panic!("expected cluster error, got {:?}", other),
        }

        // The partially-created role is left for manual diagnosis: no drop
        // calls were issued.
        assert_eq!(
            cluster.calls(),
            vec![
                "create_role:cs101_user".to_string(),
                "create_database:cs101".to_string(),
            ]
        );

        let stored = store.get_owned(request.id, "42").await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Error);
        assert_eq!(stored.one_time_secret, None);
    }

    #[tokio::test]
    async fn concurrent_approvals_resolve_to_one_winner() {
        let TestHarness { service, cluster, .. } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();

        let admin_a = admin();
        let admin_b = Identity::new("2", "provost");
        let (a, b) = tokio::join!(
            service.approve(request.id, &admin_a),
            service.approve(request.id, &admin_b)
        );

        let outcomes = [a.is_ok(), b.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1, "exactly one winner");
        for result in [a, b] {
            if let Err(err) = result {
                assert!(matches!(err, ProvisionError::NotFound));
            }
        }

        // One provision sequence, never two.
        let creates = cluster
            .calls()
            .iter()
            .filter(|c| c.starts_with("create_database:"))
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn reject_is_store_only_and_pending_only() {
        let TestHarness { service, store, cluster } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.reject(request.id, &admin()).await.unwrap();

        let stored = store.get_owned(request.id, "42").await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Rejected);
        assert!(cluster.calls().is_empty());

        let err = service.reject(request.id, &admin()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::NotFound));
    }

    #[tokio::test]
    async fn reveal_is_single_use() {
        let TestHarness { service, store, .. } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();

        let creds = service.reveal(request.id, &student()).await.unwrap();
        assert_eq!(creds.db_name, "cs101");
        assert_eq!(creds.db_user, "cs101_user");
        assert_eq!(creds.db_password.len(), DEFAULT_PASSWORD_LENGTH);

        let stored = store.get_owned(request.id, "42").await.unwrap().unwrap();
        assert_eq!(stored.one_time_secret, None);
        assert_eq!(stored.status, RequestStatus::Approved);

        let err = service.reveal(request.id, &student()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::AlreadyRevealed));
    }

    #[tokio::test]
    async fn reveal_respects_ownership() {
        let TestHarness { service, .. } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();

        let err = service.reveal(request.id, &other_student()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::NotFound));

        // The owner still gets exactly one reveal afterwards.
        service.reveal(request.id, &student()).await.unwrap();
    }

    #[tokio::test]
    async fn racing_reveals_deliver_the_secret_once() {
        let TestHarness { service, .. } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();

        let requester = student();
        let (a, b) = tokio::join!(
            service.reveal(request.id, &requester),
            service.reveal(request.id, &requester)
        );

        let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "the secret must be delivered exactly once");
        for result in [a, b] {
            if let Err(err) = result {
                assert!(matches!(err, ProvisionError::AlreadyRevealed));
            }
        }
    }

    #[tokio::test]
    async fn rotate_rejects_short_passwords_without_touching_the_cluster() {
        let TestHarness { service, cluster, .. } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();
        cluster.clear_calls();

        let err = service
            .rotate_password(request.id, &student(), "short")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidInput(_)));
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn rotate_changes_cluster_password_only() {
        let TestHarness { service, store, cluster } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();
        cluster.clear_calls();

        service
            .rotate_password(request.id, &student(), "newpass123")
            .await
            .unwrap();

        assert_eq!(cluster.calls(), vec!["alter_password:cs101_user".to_string()]);
        let stored = store.get_owned(request.id, "42").await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
        // The rotated password is the requester's own; it is never stored.
        assert_eq!(stored.one_time_secret, None);
    }

    #[tokio::test]
    async fn rotate_failure_leaves_record_untouched() {
        let TestHarness { service, store, cluster } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();
        let before = store.get_owned(request.id, "42").await.unwrap().unwrap();

        cluster.fail_on("alter_password", "role is locked");
        let err = service
            .rotate_password(request.id, &student(), "newpass123")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Cluster(_)));

        let after = store.get_owned(request.id, "42").await.unwrap().unwrap();
        assert_eq!(after.status, before.status);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn delete_tears_down_in_order_then_removes_record() {
        let TestHarness { service, store, cluster } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();
        cluster.clear_calls();

        service.delete_provisioned(request.id, &student()).await.unwrap();

        assert_eq!(
            cluster.calls(),
            vec![
                "terminate_connections:cs101".to_string(),
                "drop_database:cs101".to_string(),
                "drop_role:cs101_user".to_string(),
            ]
        );
        assert!(store.get_owned(request.id, "42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_preserves_record_when_any_teardown_step_fails() {
        let TestHarness { service, store, cluster } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();
        let before = store.get_owned(request.id, "42").await.unwrap().unwrap();

        // terminate + drop database succeed, drop role fails afterwards
        cluster.clear_calls();
        cluster.fail_on("drop_role", "role \"cs101_user\" is currently in use");

        let err = service
            .delete_provisioned(request.id, &student())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Cluster(_)));
        assert_eq!(cluster.calls().len(), 3);

        let after = store.get_owned(request.id, "42").await.unwrap().unwrap();
        assert_eq!(after.status, before.status);
        assert_eq!(after.database_name, before.database_name);
        assert_eq!(after.database_user, before.database_user);
        assert_eq!(after.approved_by, before.approved_by);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn post_approval_operations_require_approved_status() {
        let TestHarness { service, .. } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();

        // Still pending: nothing below may reach the cluster.
        for err in [
            service.rotate_password(request.id, &student(), "newpass123").await.unwrap_err(),
            service.delete_provisioned(request.id, &student()).await.unwrap_err(),
            service.database_size(request.id, &student()).await.unwrap_err(),
            service.list_tables(request.id, &student(), "newpass123").await.unwrap_err(),
        ] {
            assert!(matches!(err, ProvisionError::NotFound));
        }
    }

    #[tokio::test]
    async fn inspection_operations_delegate_to_the_cluster() {
        let TestHarness { service, cluster, .. } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();
        cluster.clear_calls();

        let size = service.database_size(request.id, &student()).await.unwrap();
        assert_eq!(size, "8192 kB");

        let tables = service
            .list_tables(request.id, &student(), "newpass123")
            .await
            .unwrap();
        assert_eq!(tables, vec!["grades".to_string(), "students".to_string()]);

        let err = service
            .list_tables(request.id, &student(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidInput(_)));

        assert_eq!(
            cluster.calls(),
            vec![
                "database_size:cs101".to_string(),
                "list_tables:cs101:cs101_user".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn listings_are_ordered_and_scoped() {
        let TestHarness { service, .. } = service_with_doubles();

        // Spaced out so created_at ordering is unambiguous.
        let first = service
            .create_request(&student(), Some("cs".into()), "alpha")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = service
            .create_request(&student(), Some("cs".into()), "beta")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let foreign = service
            .create_request(&other_student(), Some("physics".into()), "gamma")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let legacy = service
            .create_request(&other_student(), None, "delta")
            .await
            .unwrap();

        // Requester view: newest first, own requests only.
        let mine = service.list_for_requester(&student()).await.unwrap();
        assert_eq!(
            mine.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        // College admin queue: oldest first, own college plus legacy
        // unscoped records.
        let queue = service
            .list_pending(&AdminScope::College("cs".into()))
            .await
            .unwrap();
        assert_eq!(
            queue.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![first.id, second.id, legacy.id]
        );

        // Superuser scope sees every college.
        let all = service.list_pending(&AdminScope::Entire).await.unwrap();
        assert_eq!(
            all.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![first.id, second.id, foreign.id, legacy.id]
        );
    }

    #[tokio::test]
    async fn full_lifecycle_for_one_request() {
        let TestHarness { service, store, .. } = service_with_doubles();
        let requester = student();

        let request = service
            .create_request(&requester, Some("cs".into()), "cs101")
            .await
            .unwrap();
        assert_eq!(request.database_user, "cs101_user");

        let provisioned = service.approve(request.id, &admin()).await.unwrap();
        assert_eq!(provisioned.db_name, "cs101");
        let stored = store.get_owned(request.id, "42").await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
        assert!(stored.one_time_secret.is_some());

        let creds = service.reveal(request.id, &requester).await.unwrap();
        assert_eq!(creds.db_name, "cs101");
        assert_eq!(creds.db_user, "cs101_user");
        assert_eq!(creds.db_password.len(), 16);

        let err = service.reveal(request.id, &requester).await.unwrap_err();
        assert!(matches!(err, ProvisionError::AlreadyRevealed));

        service
            .rotate_password(request.id, &requester, "newpass123")
            .await
            .unwrap();

        service.delete_provisioned(request.id, &requester).await.unwrap();
        assert!(store.get_owned(request.id, "42").await.unwrap().is_none());
        assert!(service.list_for_requester(&requester).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn names_are_reusable_after_deletion_and_not_before() {
        let TestHarness { service, .. } = service_with_doubles();

        let request = service.create_request(&student(), None, "cs101").await.unwrap();
        service.approve(request.id, &admin()).await.unwrap();

        let err = service
            .create_request(&other_student(), None, "cs101")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Conflict(_)));

        service.delete_provisioned(request.id, &student()).await.unwrap();
        service
            .create_request(&other_student(), None, "cs101")
            .await
            .unwrap();
    }
}
