use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Secret storage not initialized")]
    StorageUninitialized,
    #[error("Wrong passphrase or tampered store")]
    WrongPassphrase,
    #[error("Passphrase must not be empty")]
    EmptyPassphrase,
    #[error("Secret store corrupted: {0}")]
    Corrupted(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Keyed storage for credentials.
///
/// Every operation on an uninitialized store fails with
/// `SecretError::StorageUninitialized`.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError>;

    fn put(&mut self, key: &str, value: &str) -> Result<(), SecretError>;

    fn is_initialized(&self) -> bool;
}
