pub mod admin;
pub mod manager;
pub mod models;
pub mod requests;

pub use admin::{ClusterAdmin, ClusterError, PgClusterAdmin};
pub use manager::{DatabaseError, DatabaseManager};
pub use requests::{ConsumedSecret, PgRequestStore, RequestStore, StoreError};
