pub mod provision;
pub mod secret;

pub use provision::{ProvisionError, ProvisionService, ProvisionedDatabase, RevealedCredentials};
