// src/raddb.rs

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum RadDbError {
    Io(std::io::Error),
    Serialization(String),
    Decryption(String),
    Encryption(String),
    KeyInvalid,
}

impl From<std::io::Error> for RadDbError {
    fn from(e: std::io::Error) -> Self {
        RadDbError::Io(e)
    }
}

impl From<bincode::Error> for RadDbError {
    fn from(e: bincode::Error) -> Self {
        RadDbError::Serialization(e.to_string())
    }
}

impl std::fmt::Display for RadDbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RadDbError::Io(e) => write!(f, "IO error: {}", e),
            RadDbError::Serialization(e) => write!(f, "Serialization error: {}", e),
            RadDbError::Decryption(e) => write!(f, "Decryption error: {}", e),
            RadDbError::Encryption(e) => write!(f, "Encryption error: {}", e),
            RadDbError::KeyInvalid => write!(f, "Invalid key length"),
        }
    }
}

impl std::error::Error for RadDbError {}

/// Ключ шифрования (32 байта = 256 бит)
pub type MasterKey = [u8; 32];

const NONCE_LEN: usize = 12;

/// Разобрать мастер-ключ из hex (64 символа)
pub fn parse_master_key(hex: &str) -> Result<MasterKey, RadDbError> {
    let mut key = [0u8; 32];
    hex::decode_to_slice(hex.trim(), &mut key).map_err(|_| RadDbError::KeyInvalid)?;
    Ok(key)
}

/// RadDB — зашифрованное embedded-хранилище «ключ → bincode».
///
/// Файл: nonce (12 байт) + AES-256-GCM(bincode(HashMap)). Изменения копятся в
/// памяти до `flush`.
pub struct RadDB {
    path: PathBuf,
    cipher: Aes256Gcm,
    records: HashMap<String, Vec<u8>>,
    dirty: bool,
}

impl RadDB {
    /// Открыть базу по пути с мастер-ключом; отсутствующий файл означает пустую базу
    pub fn open<P: AsRef<Path>>(path: P, key: &MasterKey) -> Result<Self, RadDbError> {
        let mut db = Self {
            path: path.as_ref().to_path_buf(),
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            records: HashMap::new(),
            dirty: false,
        };
        db.load()?;
        Ok(db)
    }

    /// Создать новый мастер-ключ (надо сохранить!)
    pub fn generate_key() -> MasterKey {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }

    fn load(&mut self) -> Result<(), RadDbError> {
        if !self.path.exists() {
            return Ok(());
        }

        let encrypted = fs::read(&self.path)?;
        if encrypted.is_empty() {
            return Ok(());
        }
        if encrypted.len() < NONCE_LEN {
            return Err(RadDbError::Decryption("File too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: &[],
                },
            )
            .map_err(|_| RadDbError::Decryption("AES-GCM decryption failed".to_string()))?;

        self.records = bincode::deserialize(&plaintext)?;
        Ok(())
    }

    /// Записать изменения на диск (новый nonce на каждую запись)
    pub fn flush(&mut self) -> Result<(), RadDbError> {
        if !self.dirty {
            return Ok(());
        }

        let plaintext = bincode::serialize(&self.records)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &plaintext,
                    aad: &[],
                },
            )
            .map_err(|_| RadDbError::Encryption("AES-GCM encryption failed".to_string()))?;

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(&nonce_bytes)?;
        file.write_all(&ciphertext)?;
        file.sync_all()?;

        self.dirty = false;
        Ok(())
    }

    /// Прочитать запись
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RadDbError> {
        self.records
            .get(key)
            .map(|data| bincode::deserialize(data).map_err(RadDbError::from))
            .transpose()
    }

    /// Записать значение
    pub fn put<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), RadDbError> {
        let data = bincode::serialize(value)?;
        self.records.insert(key.into(), data);
        self.dirty = true;
        Ok(())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }
}

impl Drop for RadDB {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
