// src/models/ou.rs

use serde::{Deserialize, Serialize};

use crate::models::{dn, DirectoryObject};

/// Организационное подразделение (OU).
///
/// Родитель не хранится, а вычисляется из DN.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct OrgUnit {
    pub base: DirectoryObject,
    pub city: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub display_name: Option<String>,
    pub postal_code: Option<String>,
    pub state: Option<String>,
    pub street_address: Option<String>,

    /// Защита от случайного удаления
    pub protected_from_accidental_deletion: bool,
}

impl OrgUnit {
    pub const OBJECT_CLASS: &'static str = "organizationalUnit";

    /// OU на вершине иерархии (сам DN — корень домена)
    pub fn is_root(&self) -> bool {
        dn::is_domain_root(&self.base.distinguished_name)
    }

    /// Родительское подразделение, вычисленное отбрасыванием первого RDN
    pub fn parent(&self) -> OrgUnit {
        let (_, parent_dn) = dn::parse(&self.base.distinguished_name);
        let (leaf, _) = dn::parse(&parent_dn);
        OrgUnit {
            base: DirectoryObject {
                name: leaf,
                distinguished_name: parent_dn,
                ..DirectoryObject::default()
            },
            ..OrgUnit::default()
        }
    }
}
