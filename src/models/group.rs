// src/models/group.rs

use serde::{Deserialize, Serialize};

use crate::models::DirectoryObject;

/// Группа каталога
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Group {
    pub base: DirectoryObject,
    pub sam_account_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,

    /// Родительские группы (memberOf), разрешённые рекурсивно
    pub groups: Vec<Group>,

    /// DN участников группы
    pub members: Vec<String>,
}

impl Group {
    pub const OBJECT_CLASS: &'static str = "group";

    /// Ссылка на группу по DN, например для желаемого членства
    pub fn at(distinguished_name: impl Into<String>) -> Self {
        Self {
            base: DirectoryObject::at(distinguished_name),
            ..Self::default()
        }
    }
}
