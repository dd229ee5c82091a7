// src/models/password.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// bcrypt-хеш пароля (соль входит в саму строку хеша)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PasswordHash {
    pub hash: String, // строка вроде "$2b$12$..."
}

impl PasswordHash {
    /// Захешировать пароль с заданной стоимостью bcrypt
    pub fn new_bcrypt(password: &str, cost: u32) -> Result<Self, PasswordError> {
        let hash = bcrypt::hash(password, cost).map_err(|_| PasswordError::HashFailed)?;
        Ok(Self { hash })
    }

    /// Проверить пароль
    pub fn verify(&self, password: &str) -> Result<bool, PasswordError> {
        bcrypt::verify(password, &self.hash).map_err(|_| PasswordError::VerificationFailed)
    }
}

impl fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

#[derive(Debug)]
pub enum PasswordError {
    HashFailed,
    VerificationFailed,
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::HashFailed => write!(f, "Failed to hash password"),
            PasswordError::VerificationFailed => write!(f, "Failed to verify password"),
        }
    }
}

impl std::error::Error for PasswordError {}
