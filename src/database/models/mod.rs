pub mod request;

pub use request::{ProvisioningRequest, RequestStatus};
