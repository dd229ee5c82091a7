// src/backend/local.rs

//! Локальный каталог поверх RadDB.
//!
//! Каждая запись: мешок атрибутов с DN и objectGUID. Членство хранится только
//! у участника (`member_of`), список участников группы вычисляется.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::backend::{
    AttributeMap, AttributeValue, BackendError, DirectoryBackend, Expiration, GroupEntry, UserEntry,
};
use crate::models::{dn, DirectoryObject, Group, OrgUnit, PasswordHash, User};
use crate::raddb::{MasterKey, RadDB};

const ALL_ENTRIES_INDEX: &str = "all_entries_index";
const DEFAULT_BCRYPT_COST: u32 = 12;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    User,
    Group,
    OrgUnit,
    Container,
}

impl EntryKind {
    fn object_class(self) -> &'static str {
        match self {
            EntryKind::User => User::OBJECT_CLASS,
            EntryKind::Group => Group::OBJECT_CLASS,
            EntryKind::OrgUnit => OrgUnit::OBJECT_CLASS,
            EntryKind::Container => "container",
        }
    }
}

/// Запись каталога, как она лежит в RadDB
#[derive(Serialize, Deserialize, Debug, Clone)]
struct Entry {
    id: Uuid,
    kind: EntryKind,
    name: String,
    distinguished_name: String,
    attributes: AttributeMap,
    member_of: Vec<Uuid>,
    password: Option<PasswordHash>,
    account_expires: Option<DateTime<Utc>>,
}

impl Entry {
    fn new(kind: EntryKind, name: &str, distinguished_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.to_string(),
            distinguished_name,
            attributes: AttributeMap::new(),
            member_of: Vec::new(),
            password: None,
            account_expires: None,
        }
    }

    fn object(&self) -> DirectoryObject {
        DirectoryObject {
            name: self.name.clone(),
            object_class: self.kind.object_class().to_string(),
            object_guid: self.id,
            distinguished_name: self.distinguished_name.clone(),
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        self.attributes
            .get(key)
            .and_then(AttributeValue::as_text)
            .map(str::to_string)
    }

    fn flag(&self, key: &str) -> bool {
        self.attributes
            .get(key)
            .and_then(AttributeValue::as_flag)
            .unwrap_or(false)
    }

    /// Сравнение атрибута без учёта регистра, как в фильтрах AD
    fn matches(&self, attribute: &str, value: &str) -> bool {
        if attribute.eq_ignore_ascii_case("Name") {
            return self.name.eq_ignore_ascii_case(value);
        }
        if attribute.eq_ignore_ascii_case("DistinguishedName") {
            return self.distinguished_name.eq_ignore_ascii_case(value);
        }
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(attribute))
            .and_then(|(_, stored)| stored.as_text())
            .is_some_and(|stored| stored.eq_ignore_ascii_case(value))
    }
}

fn entry_key(id: Uuid) -> String {
    format!("entry:{}", id)
}

fn dn_key(distinguished_name: &str) -> String {
    format!("dn_index:{}", distinguished_name.to_lowercase())
}

/// Каталог в зашифрованном файле
pub struct LocalDirectory {
    db: RwLock<RadDB>,
    users_container: String,
    bcrypt_cost: u32,
}

impl LocalDirectory {
    /// Открыть каталог; контейнер пользователей и корень домена создаются при необходимости
    pub fn open<P: AsRef<Path>>(
        path: P,
        key: &MasterKey,
        users_container: &str,
    ) -> Result<Self, BackendError> {
        let mut db = RadDB::open(path, key)?;

        let domain_root = dn::components(users_container)
            .into_iter()
            .filter(|rdn| dn::is_domain_root(rdn))
            .collect::<Vec<_>>()
            .join(",");
        if !domain_root.is_empty() {
            ensure_container(&mut db, &domain_root)?;
        }
        if !dn::is_domain_root(users_container) {
            ensure_container(&mut db, users_container)?;
        }
        db.flush()?;

        Ok(Self {
            db: RwLock::new(db),
            users_container: users_container.to_string(),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        })
    }

    /// Стоимость bcrypt для новых паролей
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    // === SEEDING ===

    /// Создать группу в контейнере (по умолчанию контейнер пользователей)
    pub async fn add_group(
        &self,
        name: &str,
        sam_account_name: Option<&str>,
        container: Option<&str>,
    ) -> Result<Group, BackendError> {
        let container = container.unwrap_or(&self.users_container);
        let sam_account_name = sam_account_name.unwrap_or(name);
        let distinguished_name = format!("CN={},{}", dn::escape_value(name), container);

        let mut entry = Entry::new(EntryKind::Group, name, distinguished_name);
        entry.attributes.insert(
            "SamAccountName".to_string(),
            AttributeValue::text(sam_account_name),
        );

        let mut db = self.db.write().await;
        let duplicate = find_by(&db, |e| {
            e.kind == EntryKind::Group && e.matches("SamAccountName", sam_account_name)
        })?;
        if duplicate.is_some() {
            return Err(BackendError::AlreadyExists(format!(
                "Group with sam_account_name {} already exists",
                sam_account_name
            )));
        }
        insert(&mut db, &entry, container)?;
        db.flush()?;
        info!(dn = %entry.distinguished_name, "Group created");

        group_from(&db, &entry)
    }

    /// Создать OU под родителем (OU, контейнером или корнем домена)
    pub async fn add_org_unit(&self, name: &str, parent: &str) -> Result<OrgUnit, BackendError> {
        let distinguished_name = format!("OU={},{}", dn::escape_value(name), parent);
        let entry = Entry::new(EntryKind::OrgUnit, name, distinguished_name);

        let mut db = self.db.write().await;
        insert(&mut db, &entry, parent)?;
        db.flush()?;
        info!(dn = %entry.distinguished_name, "Organizational unit created");

        Ok(org_unit_from(&entry))
    }

    /// Проверить пароль пользователя
    pub async fn verify_password(
        &self,
        identity: &str,
        password: &str,
    ) -> Result<bool, BackendError> {
        let db = self.db.read().await;
        let entry = lookup(&db, identity)?;
        match &entry.password {
            Some(hash) => hash
                .verify(password)
                .map_err(|e| BackendError::Unsupported(e.to_string())),
            None => Ok(false),
        }
    }

    /// Срок действия учётной записи
    pub async fn account_expires(
        &self,
        identity: &str,
    ) -> Result<Option<DateTime<Utc>>, BackendError> {
        let db = self.db.read().await;
        Ok(lookup(&db, identity)?.account_expires)
    }

    async fn modify<F>(
        &self,
        identity: &str,
        kind: EntryKind,
        change: F,
    ) -> Result<(), BackendError>
    where
        F: FnOnce(&mut Entry),
    {
        let mut db = self.db.write().await;
        let mut entry = lookup_kind(&db, identity, kind)?;
        change(&mut entry);
        db.put(entry_key(entry.id), &entry)?;
        db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl DirectoryBackend for LocalDirectory {
    async fn test_connection(&self) -> Result<(), BackendError> {
        let db = self.db.read().await;
        lookup(&db, &self.users_container).map(|_| ())
    }

    #[instrument(skip(self))]
    async fn fetch_object(&self, identity: &str) -> Result<DirectoryObject, BackendError> {
        let db = self.db.read().await;
        Ok(lookup(&db, identity)?.object())
    }

    #[instrument(skip(self))]
    async fn fetch_user(&self, identity: &str) -> Result<UserEntry, BackendError> {
        let db = self.db.read().await;
        let entry = lookup_kind(&db, identity, EntryKind::User)?;

        let mut user = User {
            base: entry.object(),
            account_expiration_date: entry.account_expires,
            ..User::default()
        };
        user.apply_attributes(&entry.attributes);

        Ok(UserEntry {
            user,
            member_of: distinguished_names(&db, &entry.member_of)?,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_group(&self, identity: &str) -> Result<GroupEntry, BackendError> {
        let db = self.db.read().await;
        let entry = lookup_kind(&db, identity, EntryKind::Group)?;
        Ok(GroupEntry {
            group: group_from(&db, &entry)?,
            member_of: distinguished_names(&db, &entry.member_of)?,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_org_unit(&self, identity: &str) -> Result<OrgUnit, BackendError> {
        let db = self.db.read().await;
        match lookup(&db, identity) {
            Ok(entry) if entry.kind == EntryKind::OrgUnit => Ok(org_unit_from(&entry)),
            Ok(_) | Err(BackendError::NotFound(_)) => Err(BackendError::NotOrgUnit(format!(
                "Cannot find an object with identity: '{}'",
                identity
            ))),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn create_user(&self, name: &str) -> Result<(), BackendError> {
        if name.trim().is_empty() {
            return Err(BackendError::Unsupported("Name can not be blank".to_string()));
        }

        let distinguished_name = format!("CN={},{}", dn::escape_value(name), self.users_container);
        let entry = Entry::new(EntryKind::User, name, distinguished_name);

        let mut db = self.db.write().await;
        let duplicate = find_by(&db, |e| {
            e.kind == EntryKind::User && e.name.eq_ignore_ascii_case(name)
        })?;
        if duplicate.is_some() {
            return Err(BackendError::AlreadyExists(format!(
                "The specified account already exists: {}",
                name
            )));
        }
        insert(&mut db, &entry, &self.users_container)?;
        db.flush()?;

        info!(dn = %entry.distinguished_name, "User created");
        Ok(())
    }

    async fn exists_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<bool, BackendError> {
        let db = self.db.read().await;
        let found = find_by(&db, |e| e.kind == EntryKind::User && e.matches(attribute, value))?;
        Ok(found.is_some())
    }

    #[instrument(skip(self, password))]
    async fn set_password(&self, identity: &str, password: &str) -> Result<(), BackendError> {
        let hash = PasswordHash::new_bcrypt(password, self.bcrypt_cost)
            .map_err(|e| BackendError::Unsupported(e.to_string()))?;
        self.modify(identity, EntryKind::User, |entry| entry.password = Some(hash))
            .await
    }

    #[instrument(skip(self))]
    async fn set_expiration(
        &self,
        identity: &str,
        expiration: Expiration,
    ) -> Result<(), BackendError> {
        self.modify(identity, EntryKind::User, |entry| {
            entry.account_expires = match expiration {
                Expiration::Never => None,
                Expiration::At(at) => Some(at),
            };
        })
        .await
    }

    #[instrument(skip(self))]
    async fn add_membership(&self, identity: &str, groups: &[String]) -> Result<(), BackendError> {
        let mut db = self.db.write().await;
        let mut principal = lookup(&db, identity)?;

        for group in groups {
            let group = lookup_kind(&db, group, EntryKind::Group)?;
            if group.id == principal.id {
                return Err(BackendError::Unsupported(format!(
                    "Group {} cannot be a member of itself",
                    group.distinguished_name
                )));
            }
            if !principal.member_of.contains(&group.id) {
                principal.member_of.push(group.id);
                debug!(group = %group.distinguished_name, "Member added");
            }
        }

        db.put(entry_key(principal.id), &principal)?;
        db.flush()?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_membership(
        &self,
        identity: &str,
        groups: &[String],
    ) -> Result<(), BackendError> {
        let mut db = self.db.write().await;
        let mut principal = lookup(&db, identity)?;

        for group in groups {
            let group = lookup_kind(&db, group, EntryKind::Group)?;
            principal.member_of.retain(|id| *id != group.id);
            debug!(group = %group.distinguished_name, "Member removed");
        }

        db.put(entry_key(principal.id), &principal)?;
        db.flush()?;
        Ok(())
    }

    #[instrument(skip(self, attributes), fields(count = attributes.len()))]
    async fn update_attributes(
        &self,
        identity: &str,
        attributes: &AttributeMap,
    ) -> Result<(), BackendError> {
        self.modify(identity, EntryKind::User, |entry| {
            for (key, value) in attributes {
                match value {
                    AttributeValue::Clear => {
                        entry.attributes.remove(key);
                    }
                    value => {
                        entry.attributes.insert(key.clone(), value.clone());
                    }
                }
            }
        })
        .await
    }
}

// === STORAGE HELPERS ===

fn ensure_container(db: &mut RadDB, distinguished_name: &str) -> Result<(), BackendError> {
    if db.contains_key(&dn_key(distinguished_name)) {
        return Ok(());
    }
    let (leaf, _) = dn::parse(distinguished_name);
    let name = if leaf.is_empty() { distinguished_name.to_string() } else { leaf };
    let entry = Entry::new(EntryKind::Container, &name, distinguished_name.to_string());
    store_entry(db, &entry)
}

/// Добавить запись; родительский контейнер должен существовать
fn insert(db: &mut RadDB, entry: &Entry, parent: &str) -> Result<(), BackendError> {
    if !db.contains_key(&dn_key(parent)) {
        return Err(BackendError::NotFound(format!(
            "Cannot find an object with identity: '{}'",
            parent
        )));
    }
    if db.contains_key(&dn_key(&entry.distinguished_name)) {
        return Err(BackendError::AlreadyExists(format!(
            "An object with DN {} already exists",
            entry.distinguished_name
        )));
    }
    store_entry(db, entry)
}

fn store_entry(db: &mut RadDB, entry: &Entry) -> Result<(), BackendError> {
    db.put(entry_key(entry.id), entry)?;
    db.put(dn_key(&entry.distinguished_name), &entry.id)?;

    let mut all: Vec<Uuid> = db.get(ALL_ENTRIES_INDEX)?.unwrap_or_default();
    all.push(entry.id);
    db.put(ALL_ENTRIES_INDEX, &all)?;
    Ok(())
}

fn load(db: &RadDB, id: Uuid) -> Result<Option<Entry>, BackendError> {
    Ok(db.get(&entry_key(id))?)
}

fn all_entries(db: &RadDB) -> Result<Vec<Entry>, BackendError> {
    let ids: Vec<Uuid> = db.get(ALL_ENTRIES_INDEX)?.unwrap_or_default();
    let mut entries = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(entry) = load(db, id)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn find_by<F>(db: &RadDB, predicate: F) -> Result<Option<Entry>, BackendError>
where
    F: Fn(&Entry) -> bool,
{
    Ok(all_entries(db)?.into_iter().find(|entry| predicate(entry)))
}

/// Найти запись по идентичности: objectGUID, DN, затем sAMAccountName или Name
fn lookup(db: &RadDB, identity: &str) -> Result<Entry, BackendError> {
    let identity = identity.trim();

    if let Ok(id) = Uuid::parse_str(identity) {
        if let Some(entry) = load(db, id)? {
            return Ok(entry);
        }
    }
    if let Some(id) = db.get::<Uuid>(&dn_key(identity))? {
        if let Some(entry) = load(db, id)? {
            return Ok(entry);
        }
    }

    let by_sam = find_by(db, |e| e.matches("SamAccountName", identity))?;
    let found = match by_sam {
        Some(entry) => Some(entry),
        None => find_by(db, |e| {
            e.kind == EntryKind::User && e.name.eq_ignore_ascii_case(identity)
        })?,
    };

    found.ok_or_else(|| {
        BackendError::NotFound(format!(
            "Cannot find an object with identity: '{}'",
            identity
        ))
    })
}

fn lookup_kind(db: &RadDB, identity: &str, kind: EntryKind) -> Result<Entry, BackendError> {
    let entry = lookup(db, identity)?;
    if entry.kind != kind {
        return Err(BackendError::NotFound(format!(
            "Cannot find an object with identity: '{}' of class {}",
            identity,
            kind.object_class()
        )));
    }
    Ok(entry)
}

fn distinguished_names(db: &RadDB, ids: &[Uuid]) -> Result<Vec<String>, BackendError> {
    let mut names = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(entry) = load(db, *id)? {
            names.push(entry.distinguished_name);
        }
    }
    Ok(names)
}

fn group_from(db: &RadDB, entry: &Entry) -> Result<Group, BackendError> {
    let members = all_entries(db)?
        .into_iter()
        .filter(|candidate| candidate.member_of.contains(&entry.id))
        .map(|member| member.distinguished_name)
        .collect();

    Ok(Group {
        base: entry.object(),
        sam_account_name: entry.text("SamAccountName").unwrap_or_default(),
        display_name: entry.text("DisplayName"),
        description: entry.text("Description"),
        groups: Vec::new(),
        members,
    })
}

fn org_unit_from(entry: &Entry) -> OrgUnit {
    OrgUnit {
        base: entry.object(),
        city: entry.text("City"),
        country: entry.text("Country"),
        description: entry.text("Description"),
        display_name: entry.text("DisplayName"),
        postal_code: entry.text("PostalCode"),
        state: entry.text("State"),
        street_address: entry.text("StreetAddress"),
        protected_from_accidental_deletion: entry.flag("ProtectedFromAccidentalDeletion"),
    }
}
