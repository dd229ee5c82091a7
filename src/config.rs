// src/config.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::Credential;
use crate::raddb::{parse_master_key, MasterKey};

const DEFAULT_CONFIG_FILE: &str = "config.yaml";
const APP_DIR: &str = "nextdomen-sync";

/// Ошибки загрузки конфигурации
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    /// Переменная окружения с секретом не задана
    MissingSecret(String),
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Yaml(e) => write!(f, "YAML error: {}", e),
            ConfigError::MissingSecret(var) => write!(f, "Environment variable {} is not set", var),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub web_server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Какой каталог использовать
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    #[serde(rename = "powershell")]
    PowerShell(PowerShellConfig),
    Local(LocalConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local(LocalConfig::default())
    }
}

/// Active Directory через модуль PowerShell
#[derive(Debug, Deserialize, Serialize)]
pub struct PowerShellConfig {
    #[serde(default = "default_program")]
    pub program: String,
    pub server: Option<String>,
    pub username: Option<String>,
    /// Имя переменной окружения с паролем; сам пароль в файле не хранится
    #[serde(default = "default_password_env")]
    pub password_env: String,
    pub timeout_secs: Option<u64>,
}

impl Default for PowerShellConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            server: None,
            username: None,
            password_env: default_password_env(),
            timeout_secs: None,
        }
    }
}

impl PowerShellConfig {
    /// Учётные данные, если задан `username`
    pub fn credential(&self) -> Result<Option<Credential>, String> {
        let Some(username) = &self.username else {
            return Ok(None);
        };
        let password = std::env::var(&self.password_env)
            .map_err(|_| ConfigError::MissingSecret(self.password_env.clone()).to_string())?;
        Ok(Some(Credential {
            username: username.clone(),
            password,
        }))
    }
}

fn default_program() -> String {
    "pwsh".to_string()
}

fn default_password_env() -> String {
    "NEXTDOMEN_AD_PASSWORD".to_string()
}

/// Локальный зашифрованный каталог
#[derive(Debug, Deserialize, Serialize)]
pub struct LocalConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    pub master_key_hex: Option<String>,
    #[serde(default = "default_master_key_env")]
    pub master_key_env: String,
    #[serde(default = "default_users_container")]
    pub users_container: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            master_key_hex: None,
            master_key_env: default_master_key_env(),
            users_container: default_users_container(),
        }
    }
}

impl LocalConfig {
    /// Мастер-ключ из конфигурации или из переменной окружения
    pub fn master_key(&self) -> Result<MasterKey, String> {
        let hex = match &self.master_key_hex {
            Some(hex) => hex.clone(),
            None => std::env::var(&self.master_key_env)
                .map_err(|_| ConfigError::MissingSecret(self.master_key_env.clone()).to_string())?,
        };
        parse_master_key(&hex).map_err(|e| e.to_string())
    }
}

fn default_db_path() -> String {
    "data/directory.db".to_string()
}

fn default_master_key_env() -> String {
    "NEXTDOMEN_MASTER_KEY".to_string()
}

fn default_users_container() -> String {
    "CN=Users,DC=corp,DC=acme,DC=com".to_string()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl LoggingConfig {
    pub fn tracing_level(&self) -> Result<tracing::Level, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {}", self.level)))
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Явный путь, затем `config.yaml` в текущем каталоге, затем
    /// `<config_dir>/nextdomen-sync/config.yaml`; иначе значения по умолчанию
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::candidates().into_iter().find(|path| path.exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(APP_DIR).join(DEFAULT_CONFIG_FILE));
        }
        paths
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
