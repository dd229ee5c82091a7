// src/backend/mod.rs

//! Бэкенд каталога: набор операций чтения и записи по строке идентичности.
//!
//! Движок синхронизации не знает, как устроен бэкенд; любые ошибки он
//! передаёт вызывающему без изменений.

pub mod local;
pub mod powershell;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::models::{DirectoryObject, Group, OrgUnit, User};
use crate::raddb::RadDbError;

pub use local::LocalDirectory;
pub use powershell::{CommandOutput, CommandRunner, Credential, PowerShellBackend, ProcessRunner};

/// Ошибки бэкенда каталога
#[derive(Debug)]
pub enum BackendError {
    NotFound(String),
    /// Идентичность указывает не на OU (или OU не найдено)
    NotOrgUnit(String),
    AlreadyExists(String),
    PermissionDenied(String),
    Command {
        status: Option<i32>,
        stderr: String,
    },
    Timeout(u64),
    Io(std::io::Error),
    Parse(String),
    Storage(RadDbError),
    Unsupported(String),
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io(e)
    }
}

impl From<RadDbError> for BackendError {
    fn from(e: RadDbError) -> Self {
        BackendError::Storage(e)
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Parse(e.to_string())
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotFound(e) => write!(f, "Not found: {}", e),
            BackendError::NotOrgUnit(e) => write!(f, "Not an organizational unit: {}", e),
            BackendError::AlreadyExists(e) => write!(f, "Already exists: {}", e),
            BackendError::PermissionDenied(e) => write!(f, "Permission denied: {}", e),
            BackendError::Command { status, stderr } => match status {
                Some(code) => write!(f, "Command failed with exit code {}: {}", code, stderr),
                None => write!(f, "Command terminated: {}", stderr),
            },
            BackendError::Timeout(secs) => write!(f, "Command timed out after {}s", secs),
            BackendError::Io(e) => write!(f, "IO error: {}", e),
            BackendError::Parse(e) => write!(f, "Parse error: {}", e),
            BackendError::Storage(e) => write!(f, "Storage error: {}", e),
            BackendError::Unsupported(e) => write!(f, "Unsupported: {}", e),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Io(e) => Some(e),
            BackendError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

/// Значение атрибута при массовом обновлении
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(String),
    Flag(bool),
    /// Явная очистка атрибута
    Clear,
}

impl AttributeValue {
    /// Непустая строка → `Text`, пустая → `Clear`
    pub fn text(value: &str) -> Self {
        if value.trim().is_empty() {
            AttributeValue::Clear
        } else {
            AttributeValue::Text(value.to_string())
        }
    }

    pub fn optional_text(value: &Option<String>) -> Self {
        value.as_deref().map_or(AttributeValue::Clear, AttributeValue::text)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttributeValue::Flag(value) => Some(*value),
            _ => None,
        }
    }
}

/// Атрибуты по именам параметров Set-ADUser; порядок детерминирован
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Срок действия учётной записи
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    Never,
    At(DateTime<Utc>),
}

impl From<Option<DateTime<Utc>>> for Expiration {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(Expiration::Never, Expiration::At)
    }
}

/// Пользователь, как его вернул каталог, и сырые ссылки memberOf
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserEntry {
    pub user: User,
    pub member_of: Vec<String>,
}

/// Группа и сырые ссылки на родительские группы
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupEntry {
    pub group: Group,
    pub member_of: Vec<String>,
}

/// Операции каталога, которые нужны движку синхронизации
#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    /// Проверить доступность каталога
    async fn test_connection(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn fetch_object(&self, identity: &str) -> Result<DirectoryObject, BackendError>;

    async fn fetch_user(&self, identity: &str) -> Result<UserEntry, BackendError>;

    async fn fetch_group(&self, identity: &str) -> Result<GroupEntry, BackendError>;

    /// Возвращает `BackendError::NotOrgUnit`, если идентичность указывает не на OU
    async fn fetch_org_unit(&self, identity: &str) -> Result<OrgUnit, BackendError>;

    async fn create_user(&self, name: &str) -> Result<(), BackendError>;

    async fn exists_by_attribute(&self, attribute: &str, value: &str) -> Result<bool, BackendError>;

    async fn set_password(&self, identity: &str, password: &str) -> Result<(), BackendError>;

    async fn set_expiration(
        &self,
        identity: &str,
        expiration: Expiration,
    ) -> Result<(), BackendError>;

    async fn add_membership(&self, identity: &str, groups: &[String]) -> Result<(), BackendError>;

    async fn remove_membership(
        &self,
        identity: &str,
        groups: &[String],
    ) -> Result<(), BackendError>;

    async fn update_attributes(
        &self,
        identity: &str,
        attributes: &AttributeMap,
    ) -> Result<(), BackendError>;
}

/// Открытое подключение к каталогу согласно конфигурации
#[derive(Clone)]
pub enum Connection {
    PowerShell(Arc<PowerShellBackend>),
    Local(Arc<LocalDirectory>),
}

impl Connection {
    pub fn open(config: &BackendConfig) -> Result<Self, BackendError> {
        match config {
            BackendConfig::PowerShell(cfg) => {
                let runner = ProcessRunner::new(&cfg.program).with_timeout(cfg.timeout_secs);
                let mut backend = PowerShellBackend::new(Arc::new(runner));
                if let Some(server) = &cfg.server {
                    backend = backend.with_server(server);
                }
                if let Some(credential) = cfg.credential().map_err(BackendError::Unsupported)? {
                    backend = backend.with_credential(credential);
                }
                Ok(Connection::PowerShell(Arc::new(backend)))
            }
            BackendConfig::Local(cfg) => {
                let key = cfg.master_key().map_err(BackendError::Unsupported)?;
                let directory = LocalDirectory::open(&cfg.db_path, &key, &cfg.users_container)?;
                Ok(Connection::Local(Arc::new(directory)))
            }
        }
    }

    pub fn backend(&self) -> Arc<dyn DirectoryBackend> {
        match self {
            Connection::PowerShell(backend) => backend.clone() as Arc<dyn DirectoryBackend>,
            Connection::Local(directory) => directory.clone() as Arc<dyn DirectoryBackend>,
        }
    }

    /// Локальное хранилище, если подключение локальное
    pub fn local(&self) -> Option<&LocalDirectory> {
        match self {
            Connection::Local(directory) => Some(directory.as_ref()),
            Connection::PowerShell(_) => None,
        }
    }
}
