// src/identity.rs

//! Выбор ключа, по которому объект адресуется в каталоге.
//!
//! Порядок: objectGUID → DN → (только пользователь) Name → sAMAccountName.

use crate::error::SyncError;
use crate::models::{DirectoryObject, Group, OrgUnit, User};

/// Объект, который можно адресовать в каталоге
pub trait Identifiable {
    /// Общая часть идентичности
    fn base(&self) -> &DirectoryObject;

    /// Вид объекта для сообщений об ошибках
    fn kind(&self) -> &'static str;

    /// Запасные ключи после GUID и DN, в порядке приоритета
    fn fallback_keys(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Разрешённая идентичность
    fn identity(&self) -> Result<String, SyncError> {
        resolve(self)
    }
}

/// Лучший стабильный ключ объекта
pub fn resolve<T: Identifiable + ?Sized>(object: &T) -> Result<String, SyncError> {
    let base = object.base();

    if !base.object_guid.is_nil() {
        return Ok(base.object_guid.hyphenated().to_string());
    }
    if !base.distinguished_name.trim().is_empty() {
        return Ok(base.distinguished_name.clone());
    }

    object
        .fallback_keys()
        .into_iter()
        .find(|key| !key.trim().is_empty())
        .map(str::to_string)
        .ok_or(SyncError::Identity {
            kind: object.kind(),
        })
}

/// Идентичности списка объектов в исходном порядке
pub fn resolve_all<T: Identifiable>(objects: &[T]) -> Result<Vec<String>, SyncError> {
    objects.iter().map(|object| resolve(object)).collect()
}

impl Identifiable for DirectoryObject {
    fn base(&self) -> &DirectoryObject {
        self
    }

    fn kind(&self) -> &'static str {
        "object"
    }
}

impl Identifiable for User {
    fn base(&self) -> &DirectoryObject {
        &self.base
    }

    fn kind(&self) -> &'static str {
        "user"
    }

    fn fallback_keys(&self) -> Vec<&str> {
        vec![self.base.name.as_str(), self.sam_account_name.as_str()]
    }
}

impl Identifiable for Group {
    fn base(&self) -> &DirectoryObject {
        &self.base
    }

    fn kind(&self) -> &'static str {
        "group"
    }
}

impl Identifiable for OrgUnit {
    fn base(&self) -> &DirectoryObject {
        &self.base
    }

    fn kind(&self) -> &'static str {
        "organizational unit"
    }
}
