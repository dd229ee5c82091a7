// tests/integration/support.rs

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use nextdomen_sync::backend::{
    AttributeMap, BackendError, DirectoryBackend, Expiration, GroupEntry, UserEntry,
};
use nextdomen_sync::models::{DirectoryObject, Group, OrgUnit, User};
use uuid::Uuid;

/// Вызов бэкенда, записанный заглушкой
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchObject(String),
    FetchUser(String),
    FetchGroup(String),
    FetchOrgUnit(String),
    CreateUser(String),
    Exists(String, String),
    SetPassword(String, String),
    SetExpiration(String, Expiration),
    AddMembership(String, Vec<String>),
    RemoveMembership(String, Vec<String>),
    UpdateAttributes(String, AttributeMap),
}

impl Call {
    pub fn is_membership(&self) -> bool {
        matches!(self, Call::AddMembership(..) | Call::RemoveMembership(..))
    }
}

/// Каталог в памяти, записывающий каждый вызов
#[derive(Default)]
pub struct StubBackend {
    users: Mutex<HashMap<String, UserEntry>>,
    groups: HashMap<String, GroupEntry>,
    org_units: HashMap<String, OrgUnit>,
    objects: HashMap<String, DirectoryObject>,
    existing: HashSet<String>,
    created_user: Option<UserEntry>,
    failures: HashMap<&'static str, fn() -> BackendError>,
    calls: Mutex<Vec<Call>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Пользователь доступен по GUID, DN и имени
    pub fn with_user(self, entry: UserEntry) -> Self {
        insert_user(&mut self.users.lock().unwrap(), entry);
        self
    }

    /// Группа доступна по GUID и DN
    pub fn with_group(mut self, entry: GroupEntry) -> Self {
        let base = entry.group.base.clone();
        if !base.object_guid.is_nil() {
            self.groups.insert(base.object_guid.to_string(), entry.clone());
        }
        self.groups.insert(base.distinguished_name, entry);
        self
    }

    pub fn with_org_unit(mut self, org_unit: OrgUnit) -> Self {
        self.org_units
            .insert(org_unit.base.distinguished_name.clone(), org_unit);
        self
    }

    pub fn with_object(mut self, object: DirectoryObject) -> Self {
        self.objects.insert(object.distinguished_name.clone(), object);
        self
    }

    /// Имя, для которого `exists_by_attribute` вернёт true
    pub fn with_existing(mut self, name: &str) -> Self {
        self.existing.insert(name.to_string());
        self
    }

    /// Пользователь, который появится после `create_user`
    pub fn with_created_user(mut self, entry: UserEntry) -> Self {
        self.created_user = Some(entry);
        self
    }

    /// Операция (по имени метода трейта) завершится ошибкой
    pub fn failing(mut self, operation: &'static str, error: fn() -> BackendError) -> Self {
        self.failures.insert(operation, error);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, operation: &'static str, call: Call) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.get(operation) {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }
}

fn insert_user(users: &mut HashMap<String, UserEntry>, entry: UserEntry) {
    let base = entry.user.base.clone();
    if !base.object_guid.is_nil() {
        users.insert(base.object_guid.to_string(), entry.clone());
    }
    if !base.distinguished_name.is_empty() {
        users.insert(base.distinguished_name.clone(), entry.clone());
    }
    users.insert(base.name, entry);
}

fn not_found(identity: &str) -> BackendError {
    BackendError::NotFound(format!("Cannot find an object with identity: '{}'", identity))
}

#[async_trait]
impl DirectoryBackend for StubBackend {
    async fn fetch_object(&self, identity: &str) -> Result<DirectoryObject, BackendError> {
        self.record("fetch_object", Call::FetchObject(identity.to_string()))?;
        self.objects.get(identity).cloned().ok_or_else(|| not_found(identity))
    }

    async fn fetch_user(&self, identity: &str) -> Result<UserEntry, BackendError> {
        self.record("fetch_user", Call::FetchUser(identity.to_string()))?;
        self.users
            .lock()
            .unwrap()
            .get(identity)
            .cloned()
            .ok_or_else(|| not_found(identity))
    }

    async fn fetch_group(&self, identity: &str) -> Result<GroupEntry, BackendError> {
        self.record("fetch_group", Call::FetchGroup(identity.to_string()))?;
        self.groups.get(identity).cloned().ok_or_else(|| not_found(identity))
    }

    async fn fetch_org_unit(&self, identity: &str) -> Result<OrgUnit, BackendError> {
        self.record("fetch_org_unit", Call::FetchOrgUnit(identity.to_string()))?;
        self.org_units
            .get(identity)
            .cloned()
            .ok_or_else(|| {
                BackendError::NotOrgUnit(format!(
                    "Cannot find an object with identity: '{}'",
                    identity
                ))
            })
    }

    async fn create_user(&self, name: &str) -> Result<(), BackendError> {
        self.record("create_user", Call::CreateUser(name.to_string()))?;
        if let Some(entry) = &self.created_user {
            insert_user(&mut self.users.lock().unwrap(), entry.clone());
        }
        Ok(())
    }

    async fn exists_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<bool, BackendError> {
        self.record(
            "exists_by_attribute",
            Call::Exists(attribute.to_string(), value.to_string()),
        )?;
        Ok(self.existing.contains(value))
    }

    async fn set_password(&self, identity: &str, password: &str) -> Result<(), BackendError> {
        self.record(
            "set_password",
            Call::SetPassword(identity.to_string(), password.to_string()),
        )
    }

    async fn set_expiration(
        &self,
        identity: &str,
        expiration: Expiration,
    ) -> Result<(), BackendError> {
        self.record(
            "set_expiration",
            Call::SetExpiration(identity.to_string(), expiration),
        )
    }

    async fn add_membership(&self, identity: &str, groups: &[String]) -> Result<(), BackendError> {
        self.record(
            "add_membership",
            Call::AddMembership(identity.to_string(), groups.to_vec()),
        )
    }

    async fn remove_membership(
        &self,
        identity: &str,
        groups: &[String],
    ) -> Result<(), BackendError> {
        self.record(
            "remove_membership",
            Call::RemoveMembership(identity.to_string(), groups.to_vec()),
        )
    }

    async fn update_attributes(
        &self,
        identity: &str,
        attributes: &AttributeMap,
    ) -> Result<(), BackendError> {
        self.record(
            "update_attributes",
            Call::UpdateAttributes(identity.to_string(), attributes.clone()),
        )
    }
}

/// Бэкенд, который нельзя вызывать
pub struct PanicBackend;

#[async_trait]
impl DirectoryBackend for PanicBackend {
    async fn fetch_object(&self, _: &str) -> Result<DirectoryObject, BackendError> {
        panic!("fetch_object must not be called")
    }

    async fn fetch_user(&self, _: &str) -> Result<UserEntry, BackendError> {
        panic!("fetch_user must not be called")
    }

    async fn fetch_group(&self, _: &str) -> Result<GroupEntry, BackendError> {
        panic!("fetch_group must not be called")
    }

    async fn fetch_org_unit(&self, _: &str) -> Result<OrgUnit, BackendError> {
        panic!("fetch_org_unit must not be called")
    }

    async fn create_user(&self, _: &str) -> Result<(), BackendError> {
        panic!("create_user must not be called")
    }

    async fn exists_by_attribute(&self, _: &str, _: &str) -> Result<bool, BackendError> {
        panic!("exists_by_attribute must not be called")
    }

    async fn set_password(&self, _: &str, _: &str) -> Result<(), BackendError> {
        panic!("set_password must not be called")
    }

    async fn set_expiration(&self, _: &str, _: Expiration) -> Result<(), BackendError> {
        panic!("set_expiration must not be called")
    }

    async fn add_membership(&self, _: &str, _: &[String]) -> Result<(), BackendError> {
        panic!("add_membership must not be called")
    }

    async fn remove_membership(&self, _: &str, _: &[String]) -> Result<(), BackendError> {
        panic!("remove_membership must not be called")
    }

    async fn update_attributes(&self, _: &str, _: &AttributeMap) -> Result<(), BackendError> {
        panic!("update_attributes must not be called")
    }
}

// === Фикстуры ===

pub const USERS: &str = "CN=Users,DC=corp,DC=acme,DC=com";
pub const IT: &str = "OU=IT,DC=corp,DC=acme,DC=com";

pub fn group_dn(cn: &str) -> String {
    format!("CN={},OU=Groups,DC=corp,DC=acme,DC=com", cn)
}

/// Ссылка на группу по DN
pub fn group(cn: &str) -> Group {
    Group::at(group_dn(cn))
}

/// Группа, как её вернёт каталог
pub fn group_entry(cn: &str, member_of: &[&str]) -> GroupEntry {
    let mut group = group(cn);
    group.base.name = cn.to_string();
    group.base.object_class = Group::OBJECT_CLASS.to_string();
    group.sam_account_name = cn.to_lowercase();
    GroupEntry {
        group,
        member_of: member_of.iter().map(|cn| group_dn(cn)).collect(),
    }
}

/// Пользователь, как его вернёт каталог
pub fn user_entry(name: &str, container: &str, member_of: &[&str]) -> UserEntry {
    let mut user = User::new(name);
    user.base.object_class = User::OBJECT_CLASS.to_string();
    user.base.object_guid = Uuid::new_v4();
    user.base.distinguished_name = format!("CN={},{}", name, container);
    user.sam_account_name = name.to_lowercase().replace(' ', ".");
    user.enabled = true;
    user.title = Some("Engineer".to_string());
    UserEntry {
        user,
        member_of: member_of.iter().map(|cn| group_dn(cn)).collect(),
    }
}

pub fn org_unit(distinguished_name: &str) -> OrgUnit {
    OrgUnit {
        base: DirectoryObject {
            name: nextdomen_sync::models::dn::parse(distinguished_name).0,
            object_class: OrgUnit::OBJECT_CLASS.to_string(),
            object_guid: Uuid::new_v4(),
            distinguished_name: distinguished_name.to_string(),
        },
        ..OrgUnit::default()
    }
}

pub fn container(distinguished_name: &str) -> DirectoryObject {
    DirectoryObject {
        name: nextdomen_sync::models::dn::parse(distinguished_name).0,
        object_class: "container".to_string(),
        object_guid: Uuid::new_v4(),
        distinguished_name: distinguished_name.to_string(),
    }
}

pub fn temp_db_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("nextdomen-sync-{}.db", Uuid::new_v4()))
}
