// src/backend/powershell/mod.rs

//! Бэкенд поверх модуля ActiveDirectory для PowerShell.
//!
//! Каждая операция — один скрипт, переданный интерпретатору через stdin.
//! Чтения завершаются `ConvertTo-Json`, ошибки разбираются по тексту stderr.

mod json;
pub mod quote;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::backend::{
    AttributeMap, BackendError, DirectoryBackend, Expiration, GroupEntry, UserEntry,
};
use crate::models::{DirectoryObject, OrgUnit};

const USER_PROPERTIES: &[&str] = &[
    "ObjectGUID", "ObjectClass", "DistinguishedName", "Name", "SamAccountName", "EmployeeID",
    "EmployeeNumber", "EmailAddress", "UserPrincipalName", "AccountExpirationDate", "Enabled",
    "pwdLastSet", "MemberOf", "CannotChangePassword", "PasswordNeverExpires",
    "PasswordNotRequired", "DisplayName", "GivenName", "Surname", "OtherName", "Initials",
    "Title", "Division", "Department", "Office", "Company", "Organization", "HomePage",
    "Description", "OfficePhone", "MobilePhone", "HomePhone", "Fax", "POBox", "StreetAddress",
    "City", "State", "PostalCode", "Country",
];

const GROUP_PROPERTIES: &[&str] = &[
    "ObjectGUID", "ObjectClass", "DistinguishedName", "Name", "SamAccountName", "DisplayName",
    "Description", "GroupCategory", "MemberOf", "Members",
];

const ORG_UNIT_PROPERTIES: &[&str] = &[
    "ObjectGUID", "ObjectClass", "DistinguishedName", "Name", "City", "Country", "Description",
    "DisplayName", "PostalCode", "ProtectedFromAccidentalDeletion", "State", "StreetAddress",
];

const OBJECT_PROPERTIES: &[&str] = &["ObjectGUID", "ObjectClass", "DistinguishedName", "Name"];

/// Атрибуты, по которым разрешён поиск пользователя
const FILTERABLE_ATTRIBUTES: &[&str] = &[
    "Name", "SamAccountName", "DistinguishedName", "UserPrincipalName", "EmailAddress",
    "EmployeeID", "EmployeeNumber", "DisplayName",
];

/// Учётные данные для подключения к контроллеру домена
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Результат выполнения скрипта
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Исполнитель скриптов PowerShell
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, script: &str) -> Result<CommandOutput, BackendError>;
}

/// Запуск `pwsh`/`powershell.exe` как дочернего процесса
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Ограничение времени на одну команду, в секундах
    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.timeout = secs.map(Duration::from_secs);
        self
    }

    async fn spawn(&self, script: &str) -> Result<CommandOutput, BackendError> {
        let mut child = Command::new(&self.program)
            .args(["-NoLogo", "-NoProfile", "-NonInteractive", "-Command", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(script.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, script: &str) -> Result<CommandOutput, BackendError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.spawn(script))
                .await
                .map_err(|_| BackendError::Timeout(limit.as_secs()))?,
            None => self.spawn(script).await,
        }
    }
}

/// Каталог Active Directory через командлеты PowerShell
pub struct PowerShellBackend {
    runner: Arc<dyn CommandRunner>,
    server: Option<String>,
    credential: Option<Credential>,
}

impl PowerShellBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            server: None,
            credential: None,
        }
    }

    /// Контроллер домена (`-Server`)
    pub fn with_server(mut self, server: &str) -> Self {
        self.server = Some(server.to_string());
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Начало команды: командлет, `-Server`, `-Credential`
    fn cmdlet(&self, name: &str) -> String {
        let mut cmd = name.to_string();
        if let Some(server) = &self.server {
            cmd.push_str(&quote::param("Server", &quote::quote(server)));
        }
        if let Some(credential) = &self.credential {
            cmd.push_str(&quote::param(
                "Credential",
                &quote::credential(&credential.username, &credential.password),
            ));
        }
        cmd
    }

    fn select_json(properties: &[&str]) -> String {
        let list: Vec<String> = properties.iter().map(|p| quote::quote(p)).collect();
        format!(" | Select-Object @({}) | ConvertTo-Json -Compress", list.join(", "))
    }

    /// Выполнить скрипт; в журнал попадает только имя командлета
    async fn execute(&self, cmdlet: &str, script: String) -> Result<String, BackendError> {
        debug!(cmdlet, "Running PowerShell command");

        let script = format!("$ErrorActionPreference = 'Stop'\n{}\n", script);
        let output = self.runner.run(&script).await?;

        if !output.success() {
            let err = classify(output.status, &output.stderr);
            warn!(cmdlet, error = %err, "PowerShell command failed");
            return Err(err);
        }
        Ok(output.stdout)
    }

    async fn get(
        &self,
        cmdlet: &str,
        identity: &str,
        properties: &[&str],
        all: bool,
    ) -> Result<String, BackendError> {
        let mut script = self.cmdlet(cmdlet);
        script.push_str(&quote::param("Identity", &quote::quote(identity)));
        if all {
            script.push_str(" -Properties *");
        }
        script.push_str(&Self::select_json(properties));
        self.execute(cmdlet, script).await
    }

    async fn change_membership(
        &self,
        cmdlet: &str,
        identity: &str,
        groups: &[String],
    ) -> Result<(), BackendError> {
        let mut script = self.cmdlet(cmdlet);
        script.push_str(&quote::param("Identity", &quote::quote(identity)));
        script.push_str(&quote::param("MemberOf", &quote::array(groups)));
        script.push_str(" -Confirm:$false");
        self.execute(cmdlet, script).await.map(|_| ())
    }
}

/// Перевести текст ошибки PowerShell в вариант `BackendError`
pub fn classify(status: Option<i32>, stderr: &str) -> BackendError {
    let message = stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string();

    if stderr.contains("Cannot find an object with identity") {
        BackendError::NotFound(message)
    } else if stderr.contains("already in use") || stderr.contains("already exists") {
        BackendError::AlreadyExists(message)
    } else if stderr.contains("Access is denied") {
        BackendError::PermissionDenied(message)
    } else {
        BackendError::Command {
            status,
            stderr: stderr.trim().to_string(),
        }
    }
}

#[async_trait]
impl DirectoryBackend for PowerShellBackend {
    async fn test_connection(&self) -> Result<(), BackendError> {
        let script = format!(
            "{} | Select-Object -ExpandProperty DNSRoot",
            self.cmdlet("Get-ADDomain")
        );
        self.execute("Get-ADDomain", script).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn fetch_object(&self, identity: &str) -> Result<DirectoryObject, BackendError> {
        let stdout = self.get("Get-ADObject", identity, OBJECT_PROPERTIES, false).await?;
        json::parse_object(&stdout)
    }

    #[instrument(skip(self))]
    async fn fetch_user(&self, identity: &str) -> Result<UserEntry, BackendError> {
        let stdout = self.get("Get-ADUser", identity, USER_PROPERTIES, true).await?;
        json::parse_user(&stdout)
    }

    #[instrument(skip(self))]
    async fn fetch_group(&self, identity: &str) -> Result<GroupEntry, BackendError> {
        let stdout = self.get("Get-ADGroup", identity, GROUP_PROPERTIES, true).await?;
        json::parse_group(&stdout)
    }

    #[instrument(skip(self))]
    async fn fetch_org_unit(&self, identity: &str) -> Result<OrgUnit, BackendError> {
        match self
            .get("Get-ADOrganizationalUnit", identity, ORG_UNIT_PROPERTIES, true)
            .await
        {
            Ok(stdout) => json::parse_org_unit(&stdout),
            Err(BackendError::NotFound(message)) => Err(BackendError::NotOrgUnit(message)),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn create_user(&self, name: &str) -> Result<(), BackendError> {
        let mut script = self.cmdlet("New-ADUser");
        script.push_str(&quote::param("Name", &quote::quote(name)));
        self.execute("New-ADUser", script).await.map(|_| ())
    }

    #[instrument(skip(self, value))]
    async fn exists_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<bool, BackendError> {
        let attribute = FILTERABLE_ATTRIBUTES
            .iter()
            .find(|known| known.eq_ignore_ascii_case(attribute))
            .ok_or_else(|| {
                BackendError::Unsupported(format!("Cannot filter users by {}", attribute))
            })?;

        // Значение передаётся переменной: фильтр AD сам подставит $value
        let script = format!(
            "$value = {}\n@({}{}).Count",
            quote::quote(value),
            self.cmdlet("Get-ADUser"),
            quote::param("Filter", &quote::quote(&format!("{} -eq $value", attribute))),
        );
        let stdout = self.execute("Get-ADUser", script).await?;

        let count: usize = stdout
            .trim()
            .parse()
            .map_err(|_| BackendError::Parse(format!("Unexpected count: {}", stdout.trim())))?;
        Ok(count > 0)
    }

    #[instrument(skip(self, password))]
    async fn set_password(&self, identity: &str, password: &str) -> Result<(), BackendError> {
        let mut script = self.cmdlet("Set-ADAccountPassword");
        script.push_str(&quote::param("Identity", &quote::quote(identity)));
        script.push_str(" -Reset");
        script.push_str(&quote::param("NewPassword", &quote::secure_string(password)));
        self.execute("Set-ADAccountPassword", script).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn set_expiration(
        &self,
        identity: &str,
        expiration: Expiration,
    ) -> Result<(), BackendError> {
        let (cmdlet, script) = match expiration {
            Expiration::Never => {
                let mut script = self.cmdlet("Clear-ADAccountExpiration");
                script.push_str(&quote::param("Identity", &quote::quote(identity)));
                ("Clear-ADAccountExpiration", script)
            }
            Expiration::At(at) => {
                let mut script = self.cmdlet("Set-ADAccountExpiration");
                script.push_str(&quote::param("Identity", &quote::quote(identity)));
                script.push_str(&quote::param("DateTime", &quote::datetime(&at)));
                ("Set-ADAccountExpiration", script)
            }
        };
        self.execute(cmdlet, script).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn add_membership(&self, identity: &str, groups: &[String]) -> Result<(), BackendError> {
        self.change_membership("Add-ADPrincipalGroupMembership", identity, groups)
            .await
    }

    #[instrument(skip(self))]
    async fn remove_membership(
        &self,
        identity: &str,
        groups: &[String],
    ) -> Result<(), BackendError> {
        self.change_membership("Remove-ADPrincipalGroupMembership", identity, groups)
            .await
    }

    #[instrument(skip(self, attributes), fields(count = attributes.len()))]
    async fn update_attributes(
        &self,
        identity: &str,
        attributes: &AttributeMap,
    ) -> Result<(), BackendError> {
        let mut script = self.cmdlet("Set-ADUser");
        script.push_str(&quote::param("Identity", &quote::quote(identity)));
        script.push_str(" -Confirm:$false");

        for (name, value) in attributes {
            if !quote::is_identifier(name) {
                return Err(BackendError::Unsupported(format!("Invalid attribute name: {}", name)));
            }
            script.push_str(&quote::param(name, &quote::attribute(value)));
        }

        self.execute("Set-ADUser", script).await.map(|_| ())
    }
}
