// src/membership.rs

//! Вычисление изменений членства в группах.
//!
//! Группы сравниваются только по разрешённой идентичности, порядок входных
//! списков сохраняется.

use std::collections::HashSet;

use crate::error::SyncError;
use crate::identity::resolve;
use crate::models::Group;

/// Какие группы покинуть и в какие вступить
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipDelta {
    pub to_leave: Vec<Group>,
    pub to_join: Vec<Group>,
}

impl MembershipDelta {
    pub fn is_empty(&self) -> bool {
        self.to_leave.is_empty() && self.to_join.is_empty()
    }
}

/// Разность между исходным и желаемым членством
pub fn reconcile(original: &[Group], desired: &[Group]) -> Result<MembershipDelta, SyncError> {
    let original = identified(original)?;
    let desired = identified(desired)?;

    let original_ids: HashSet<&str> = original.iter().map(|(id, _)| id.as_str()).collect();
    let desired_ids: HashSet<&str> = desired.iter().map(|(id, _)| id.as_str()).collect();

    Ok(MembershipDelta {
        to_leave: missing_from(&original, &desired_ids),
        to_join: missing_from(&desired, &original_ids),
    })
}

/// Группы без повторов по идентичности, в исходном порядке
pub fn distinct(groups: &[Group]) -> Result<Vec<Group>, SyncError> {
    let groups = identified(groups)?;
    Ok(missing_from(&groups, &HashSet::new()))
}

fn identified(groups: &[Group]) -> Result<Vec<(String, &Group)>, SyncError> {
    groups
        .iter()
        .map(|group| Ok((resolve(group)?, group)))
        .collect()
}

fn missing_from(groups: &[(String, &Group)], other: &HashSet<&str>) -> Vec<Group> {
    let mut seen = HashSet::new();
    groups
        .iter()
        .filter(|(id, _)| !other.contains(id.as_str()))
        .filter(|(id, _)| seen.insert(id.as_str()))
        .map(|(_, group)| (*group).clone())
        .collect()
}
