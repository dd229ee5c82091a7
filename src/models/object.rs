// src/models/object.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Базовая идентичность любого объекта каталога.
///
/// Пользователи, группы и OU не наследуют эти поля, а хранят их в поле `base`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DirectoryObject {
    pub name: String,
    pub object_class: String,

    /// objectGUID; nil, пока объект не существует в каталоге
    pub object_guid: Uuid,

    /// DN: например, CN=jdoe,OU=IT,DC=corp,DC=acme,DC=com
    pub distinguished_name: String,
}

impl DirectoryObject {
    /// Новый, ещё не материализованный объект
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Ссылка на существующий объект по DN
    pub fn at(distinguished_name: impl Into<String>) -> Self {
        Self {
            distinguished_name: distinguished_name.into(),
            ..Self::default()
        }
    }

    /// Объект уже существует в каталоге (есть objectGUID)
    pub fn is_materialized(&self) -> bool {
        !self.object_guid.is_nil()
    }
}
