//! Secret Storage Adapters

mod encrypted_store;

pub use encrypted_store::{EncryptedFileStore, PBKDF2_ITERATIONS};
