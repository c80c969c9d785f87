//! In-process doubles for the state-machine test suite: a Mutex-backed
//! request store with the same conditional-update semantics as the Postgres
//! one, and a cluster admin that records calls and fails on cue.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::auth::AdminScope;
use crate::database::admin::{ClusterAdmin, ClusterError};
use crate::database::models::request::{ProvisioningRequest, RequestStatus};
use crate::database::requests::{ConsumedSecret, RequestStore, StoreError};
use crate::services::provision::ProvisionService;

/// Everything a state-machine test needs, with the doubles kept reachable
/// for call assertions and failure injection.
pub struct TestHarness {
    pub service: ProvisionService,
    pub store: Arc<MemoryRequestStore>,
    pub cluster: Arc<ScriptedCluster>,
}

pub fn service_with_doubles() -> TestHarness {
    let store = Arc::new(MemoryRequestStore::new());
    let cluster = Arc::new(ScriptedCluster::new());
    let service = ProvisionService::with_parts(store.clone(), cluster.clone());
    TestHarness {
        service,
        store,
        cluster,
    }
}

/// In-memory request store. The single lock makes every trait method as
/// atomic as the per-row conditional updates it stands in for.
#[derive(Default)]
pub struct MemoryRequestStore {
    rows: Mutex<Vec<ProvisioningRequest>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn insert(&self, request: &ProvisioningRequest) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let collides = rows.iter().any(|r| {
            r.database_name == request.database_name || r.database_user == request.database_user
        });
        if collides {
            return Err(StoreError::Conflict(request.database_name.clone()));
        }
        rows.push(request.clone());
        Ok(())
    }

    async fn names_in_use(
        &self,
        database_name: &str,
        database_user: &str,
    ) -> Result<bool, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().any(|r| {
            r.database_name == database_name
                || r.database_user == database_name
                || r.database_name == database_user
                || r.database_user == database_user
        }))
    }

    async fn get_owned(
        &self,
        id: Uuid,
        requester_id: &str,
    ) -> Result<Option<ProvisioningRequest>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.id == id && r.requester_id == requester_id)
            .cloned())
    }

    async fn list_for_requester(
        &self,
        requester_id: &str,
    ) -> Result<Vec<ProvisioningRequest>, StoreError> {
        let rows = self.rows.lock().unwrap();
        let mut mine: Vec<_> = rows
            .iter()
            .filter(|r| r.requester_id == requester_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    async fn list_pending(
        &self,
        scope: &AdminScope,
    ) -> Result<Vec<ProvisioningRequest>, StoreError> {
        let rows = self.rows.lock().unwrap();
        let mut pending: Vec<_> = rows
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .filter(|r| match scope {
                AdminScope::Entire => true,
                AdminScope::College(college) => {
                    r.tenant_scope.as_deref() == Some(college.as_str()) || r.tenant_scope.is_none()
                }
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    async fn claim_for_approval(
        &self,
        id: Uuid,
        approver: &str,
    ) -> Result<Option<ProvisioningRequest>, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.iter_mut().find(|r| {
            r.id == id && r.status == RequestStatus::Pending && r.approved_by.is_none()
        });
        Ok(row.map(|r| {
            r.approved_by = Some(approver.to_string());
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    async fn finish_approval(&self, id: Uuid, secret: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(r) = rows
            .iter_mut()
            .find(|r| r.id == id && r.status == RequestStatus::Pending)
        {
            r.status = RequestStatus::Approved;
            r.one_time_secret = Some(secret.to_string());
            r.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_error(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(r) = rows
            .iter_mut()
            .find(|r| r.id == id && r.status == RequestStatus::Pending)
        {
            r.status = RequestStatus::Error;
            r.one_time_secret = None;
            r.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_rejected(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.iter_mut().find(|r| {
            r.id == id && r.status == RequestStatus::Pending && r.approved_by.is_none()
        });
        Ok(match row {
            Some(r) => {
                r.status = RequestStatus::Rejected;
                r.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn consume_secret(
        &self,
        id: Uuid,
        requester_id: &str,
    ) -> Result<Option<ConsumedSecret>, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.iter_mut().find(|r| {
            r.id == id && r.requester_id == requester_id && r.one_time_secret.is_some()
        });
        Ok(row.map(|r| {
            let secret = r.one_time_secret.take().unwrap();
            r.updated_at = Utc::now();
            ConsumedSecret {
                database_name: r.database_name.clone(),
                database_user: r.database_user.clone(),
                secret,
            }
        }))
    }

    async fn touch(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(r) = rows.iter_mut().find(|r| r.id == id) {
            r.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|r| r.id != id);
        Ok(())
    }
}

/// Cluster admin double: records every call as "op:arg[:arg]" and fails an
/// operation with a scripted driver message when told to.
#[derive(Default)]
pub struct ScriptedCluster {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, String>>,
}

impl ScriptedCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named operation fail with the given driver message.
    pub fn fail_on(&self, op: &'static str, message: &str) {
        self.failures.lock().unwrap().insert(op, message.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, op: &'static str, call: String) -> Result<(), ClusterError> {
        self.calls.lock().unwrap().push(call);
        if let Some(message) = self.failures.lock().unwrap().get(op) {
            return Err(ClusterError::Operation {
                op,
                message: message.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterAdmin for ScriptedCluster {
    async fn create_role(&self, name: &str, _password: &str) -> Result<(), ClusterError> {
        self.record("create_role", format!("create_role:{}", name))
    }

    async fn create_database(&self, name: &str) -> Result<(), ClusterError> {
        self.record("create_database", format!("create_database:{}", name))
    }

    async fn grant_all_privileges(&self, database: &str, role: &str) -> Result<(), ClusterError> {
        self.record(
            "grant_all_privileges",
            format!("grant_all_privileges:{}:{}", database, role),
        )
    }

    async fn terminate_connections(&self, database: &str) -> Result<(), ClusterError> {
        self.record(
            "terminate_connections",
            format!("terminate_connections:{}", database),
        )
    }

    async fn drop_database(&self, name: &str) -> Result<(), ClusterError> {
        self.record("drop_database", format!("drop_database:{}", name))
    }

    async fn drop_role(&self, name: &str) -> Result<(), ClusterError> {
        self.record("drop_role", format!("drop_role:{}", name))
    }

    async fn alter_password(&self, role: &str, _password: &str) -> Result<(), ClusterError> {
        self.record("alter_password", format!("alter_password:{}", role))
    }

    async fn database_size(&self, name: &str) -> Result<String, ClusterError> {
        self.record("database_size", format!("database_size:{}", name))?;
        Ok("8192 kB".to_string())
    }

    async fn list_tables(
        &self,
        database: &str,
        role: &str,
        _password: &str,
    ) -> Result<Vec<String>, ClusterError> {
        self.record("list_tables", format!("list_tables:{}:{}", database, role))?;
        Ok(vec!["grades".to_string(), "students".to_string()])
    }
}
