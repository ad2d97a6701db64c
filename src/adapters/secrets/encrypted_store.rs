//! Encrypted file-backed secret store
//!
//! Layout on disk is a JSON envelope:
//! `{ version, iterations, salt, nonce, ciphertext }` (binary fields base64).
//! The key is PBKDF2-HMAC-SHA256 over the passphrase and the envelope salt;
//! the ciphertext is AES-256-GCM over the JSON map of secrets.
//!
//! The salt is generated once, when the file is first created, and reused by
//! every later `initialize`. Each write uses a fresh nonce.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::ports::secret_store::{SecretError, SecretStore};

pub const PBKDF2_ITERATIONS: u32 = 100_000;
const ENVELOPE_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    iterations: u32,
    salt: String,
    nonce: String,
    ciphertext: String,
}

struct Unlocked {
    key: [u8; KEY_LEN],
    salt: [u8; SALT_LEN],
    iterations: u32,
    secrets: BTreeMap<String, String>,
}

pub struct EncryptedFileStore {
    path: PathBuf,
    iterations: u32,
    unlocked: Option<Unlocked>,
}

impl std::fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("path", &self.path)
            .field("initialized", &self.unlocked.is_some())
            .finish()
    }
}

fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut key);
    key
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, SecretError> {
    STANDARD
        .decode(value)
        .map_err(|e| SecretError::Corrupted(format!("{}: {}", name, e)))
}

impl EncryptedFileStore {
    /// Store bound to `path`; unusable until `initialize` succeeds
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            iterations: PBKDF2_ITERATIONS,
            unlocked: None,
        }
    }

    /// Key-derivation cost for newly created files. Existing files keep theirs.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlock an existing store, or create an empty one at `path`
    pub fn initialize(&mut self, passphrase: &str) -> Result<(), SecretError> {
        if passphrase.is_empty() {
            return Err(SecretError::EmptyPassphrase);
        }

        let unlocked = if self.path.exists() {
            Self::open(&self.path, passphrase)?
        } else {
            let mut salt = [0u8; SALT_LEN];
            rand::thread_rng().fill_bytes(&mut salt);
            let unlocked = Unlocked {
                key: derive_key(passphrase, &salt, self.iterations),
                salt,
                iterations: self.iterations,
                secrets: BTreeMap::new(),
            };
            self.persist(&unlocked)?;
            tracing::info!("Created secret store at {}", self.path.display());
            unlocked
        };

        self.unlocked = Some(unlocked);
        Ok(())
    }

    fn open(path: &Path, passphrase: &str) -> Result<Unlocked, SecretError> {
        let raw = fs::read_to_string(path)?;
        let envelope: Envelope =
            serde_json::from_str(&raw).map_err(|e| SecretError::Corrupted(e.to_string()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(SecretError::Corrupted(format!(
                "unsupported version {}",
                envelope.version
            )));
        }

        let salt: [u8; SALT_LEN] = decode_field("salt", &envelope.salt)?
            .try_into()
            .map_err(|_| SecretError::Corrupted("salt length".to_string()))?;
        let nonce = decode_field("nonce", &envelope.nonce)?;
        if nonce.len() != NONCE_LEN {
            return Err(SecretError::Corrupted("nonce length".to_string()));
        }
        let ciphertext = decode_field("ciphertext", &envelope.ciphertext)?;

        let key = derive_key(passphrase, &salt, envelope.iterations);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| SecretError::Corrupted(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|_| SecretError::WrongPassphrase)?;
        let secrets: BTreeMap<String, String> = serde_json::from_slice(&plaintext)
            .map_err(|e| SecretError::Corrupted(e.to_string()))?;

        Ok(Unlocked {
            key,
            salt,
            iterations: envelope.iterations,
            secrets,
        })
    }

    fn persist(&self, unlocked: &Unlocked) -> Result<(), SecretError> {
        let plaintext = serde_json::to_vec(&unlocked.secrets)
            .map_err(|e| SecretError::Corrupted(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let cipher = Aes256Gcm::new_from_slice(&unlocked.key)
            .map_err(|e| SecretError::Corrupted(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|_| SecretError::Corrupted("encryption failed".to_string()))?;

        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            iterations: unlocked.iterations,
            salt: STANDARD.encode(unlocked.salt),
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
        };
        let encoded = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| SecretError::Corrupted(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a truncated store
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = private_file(&tmp)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn unlocked(&self) -> Result<&Unlocked, SecretError> {
        self.unlocked.as_ref().ok_or(SecretError::StorageUninitialized)
    }

    /// Keys currently stored
    pub fn keys(&self) -> Result<Vec<String>, SecretError> {
        Ok(self.unlocked()?.secrets.keys().cloned().collect())
    }
}

#[cfg(unix)]
fn private_file(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn private_file(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl SecretStore for EncryptedFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        Ok(self.unlocked()?.secrets.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), SecretError> {
        let current = self.unlocked()?;
        let mut next = Unlocked {
            key: current.key,
            salt: current.salt,
            iterations: current.iterations,
            secrets: current.secrets.clone(),
        };
        next.secrets.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        self.unlocked = Some(next);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.unlocked.is_some()
    }
}
