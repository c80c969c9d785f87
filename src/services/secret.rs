use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Default credential length issued on approval.
pub const DEFAULT_PASSWORD_LENGTH: usize = 16;

/// Generate a database password: uniform letters and digits from the OS
/// CSPRNG. Pure and stateless; every call is independent.
pub fn generate_password(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
