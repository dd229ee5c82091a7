// src/snapshot.rs

use serde::{Deserialize, Serialize};

use crate::models::Group;

/// Желаемое состояние объекта вместе с базовой линией членства.
///
/// `baseline`: группы, наблюдавшиеся в каталоге при последнем Pull (или после
/// последнего успешного Push). Push сравнивает с ней `desired.groups`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Snapshot<T> {
    pub desired: T,

    #[serde(default)]
    pub(crate) baseline: Vec<Group>,
}

impl<T> Snapshot<T> {
    /// Снимок для нового объекта: базовая линия пуста
    pub fn new(desired: T) -> Self {
        Self {
            desired,
            baseline: Vec::new(),
        }
    }

    pub(crate) fn pulled(desired: T, baseline: Vec<Group>) -> Self {
        Self { desired, baseline }
    }

    /// Членство, наблюдавшееся в каталоге
    pub fn baseline(&self) -> &[Group] {
        &self.baseline
    }
}
