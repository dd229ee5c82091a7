// src/engine.rs

//! Движок синхронизации: Pull читает состояние из каталога, Push приводит
//! каталог к желаемому состоянию.
//!
//! Все обращения к бэкенду выполняются строго по очереди. Первая ошибка
//! прерывает операцию; выполненные шаги не откатываются.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::{debug, info, instrument, warn};

use crate::backend::{BackendError, DirectoryBackend, GroupEntry, UserEntry};
use crate::error::SyncError;
use crate::identity::{resolve_all, Identifiable};
use crate::membership;
use crate::models::{dn, DirectoryObject, Group, OrgUnit, User};
use crate::snapshot::Snapshot;

/// Состояние одного спуска по родительским группам
#[derive(Default)]
struct Descent {
    /// Ссылки на текущем пути (в нижнем регистре)
    path: HashSet<String>,
    /// Уже разрешённые группы по ссылке и по DN (в нижнем регистре)
    resolved: HashMap<String, Group>,
}

impl Descent {
    fn remember(&mut self, reference: String, group: &Group) {
        let by_dn = group.base.distinguished_name.to_lowercase();
        if !by_dn.is_empty() && by_dn != reference {
            self.resolved.insert(by_dn, group.clone());
        }
        self.resolved.insert(reference, group.clone());
    }
}

/// Pull / Push поверх произвольного бэкенда каталога
#[derive(Clone)]
pub struct Reconciler {
    backend: Arc<dyn DirectoryBackend>,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn DirectoryBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn DirectoryBackend> {
        &self.backend
    }

    // === PULL ===

    /// Прочитать базовую идентичность объекта
    #[instrument(skip_all)]
    pub async fn pull_object(
        &self,
        object: &DirectoryObject,
    ) -> Result<DirectoryObject, SyncError> {
        let identity = object.identity()?;
        Ok(self.backend.fetch_object(&identity).await?)
    }

    /// Прочитать пользователя вместе с OU и членством в группах
    pub async fn pull_user(&self, user: &User) -> Result<Snapshot<User>, SyncError> {
        let identity = user.identity()?;
        self.pull_user_by_identity(&identity).await
    }

    #[instrument(skip(self))]
    pub async fn pull_user_by_identity(&self, identity: &str) -> Result<Snapshot<User>, SyncError> {
        let UserEntry { mut user, member_of } = self.backend.fetch_user(identity).await?;

        user.org_unit = self.fetch_owning_unit(&user.base.distinguished_name).await?;

        let mut descent = Descent::default();
        let groups = self.resolve_groups(&member_of, &mut descent).await?;
        user.groups = groups.clone();

        debug!(groups = groups.len(), "User pulled");
        Ok(Snapshot::pulled(user, groups))
    }

    /// Перечитать пользователя; снимок заменяется целиком
    pub async fn refresh_user(&self, snapshot: &mut Snapshot<User>) -> Result<(), SyncError> {
        *snapshot = self.pull_user(&snapshot.desired).await?;
        Ok(())
    }

    /// Прочитать группу и цепочку её родительских групп
    pub async fn pull_group(&self, group: &Group) -> Result<Snapshot<Group>, SyncError> {
        let identity = group.identity()?;
        self.pull_group_by_identity(&identity).await
    }

    #[instrument(skip(self))]
    pub async fn pull_group_by_identity(
        &self,
        identity: &str,
    ) -> Result<Snapshot<Group>, SyncError> {
        let GroupEntry { mut group, member_of } = self.backend.fetch_group(identity).await?;

        let mut descent = Descent::default();
        descent.path.insert(group.base.distinguished_name.to_lowercase());
        let groups = self.resolve_groups(&member_of, &mut descent).await?;
        group.groups = groups.clone();

        Ok(Snapshot::pulled(group, groups))
    }

    /// Прочитать OU; если это не OU, заполняется только идентичность
    pub async fn pull_org_unit(&self, org_unit: &OrgUnit) -> Result<OrgUnit, SyncError> {
        let identity = org_unit.identity()?;
        self.pull_org_unit_by_identity(&identity).await
    }

    #[instrument(skip(self))]
    pub async fn pull_org_unit_by_identity(&self, identity: &str) -> Result<OrgUnit, SyncError> {
        match self.backend.fetch_org_unit(identity).await {
            Ok(org_unit) => Ok(org_unit),
            Err(BackendError::NotOrgUnit(message)) => {
                match self.backend.fetch_object(identity).await {
                    Ok(base) => {
                        debug!(
                            class = %base.object_class,
                            "Container is not an organizational unit"
                        );
                        Ok(OrgUnit {
                            base,
                            ..OrgUnit::default()
                        })
                    }
                    Err(fallback) => {
                        warn!(error = %fallback, "Fallback object lookup failed");
                        Err(BackendError::NotOrgUnit(message).into())
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_owning_unit(&self, distinguished_name: &str) -> Result<OrgUnit, SyncError> {
        let parent = dn::parent(distinguished_name);
        if parent.trim().is_empty() {
            return Ok(OrgUnit::default());
        }
        self.pull_org_unit_by_identity(&parent).await
    }

    /// Разрешить ссылки memberOf в группы, рекурсивно, в глубину.
    ///
    /// Каждая группа читается из каталога не больше одного раза за Pull:
    /// повторная ссылка вне текущего пути получает уже разрешённую цепочку.
    /// Ссылка, уже лежащая на пути спуска, означает цикл и пропускается.
    fn resolve_groups<'a>(
        &'a self,
        references: &'a [String],
        descent: &'a mut Descent,
    ) -> BoxFuture<'a, Result<Vec<Group>, SyncError>> {
        async move {
            let mut groups = Vec::with_capacity(references.len());

            for reference in references {
                let key = reference.to_lowercase();
                if descent.path.contains(&key) {
                    warn!(group = %reference, "Group nesting cycle, skipping");
                    continue;
                }
                if let Some(group) = descent.resolved.get(&key) {
                    debug!(group = %reference, "Group already resolved");
                    groups.push(group.clone());
                    continue;
                }

                let GroupEntry { mut group, member_of } =
                    self.backend.fetch_group(reference).await?;

                descent.path.insert(key.clone());
                let parents = self.resolve_groups(&member_of, &mut *descent).await;
                descent.path.remove(&key);

                group.groups = parents?;
                descent.remember(key, &group);
                groups.push(group);
            }

            Ok(groups)
        }
        .boxed()
    }

    // === PUSH ===

    /// Привести пользователя в каталоге к желаемому состоянию.
    ///
    /// После успеха базовая линия снимка равна желаемому членству, так что
    /// повторный Push не меняет группы.
    #[instrument(skip(self, snapshot), fields(name = %snapshot.desired.base.name))]
    pub async fn push_user(&self, snapshot: &mut Snapshot<User>) -> Result<(), SyncError> {
        if snapshot.desired.base.name.trim().is_empty() {
            return Err(SyncError::Validation {
                field: "name",
                reason: "can not be blank",
            });
        }
        let converged = membership::distinct(&snapshot.desired.groups)?;

        if !snapshot.desired.base.is_materialized() {
            let created = self.materialize(&mut snapshot.desired).await?;
            if created {
                snapshot.baseline.clear();
            }
        }

        let identity = snapshot.desired.identity()?;
        let delta = membership::reconcile(&snapshot.baseline, &snapshot.desired.groups)?;
        if delta.is_empty() {
            debug!(identity = %identity, "Membership already converged");
        }
        let to_leave = resolve_all(&delta.to_leave)?;
        let to_join = resolve_all(&delta.to_join)?;
        let user = &snapshot.desired;

        if !user.account_password.trim().is_empty() {
            self.backend.set_password(&identity, &user.account_password).await?;
        }

        self.backend
            .set_expiration(&identity, user.account_expiration_date.into())
            .await?;

        if !to_leave.is_empty() {
            self.backend.remove_membership(&identity, &to_leave).await?;
        }
        if !to_join.is_empty() {
            self.backend.add_membership(&identity, &to_join).await?;
        }

        self.backend
            .update_attributes(&identity, &user.scalar_attributes())
            .await?;

        info!(
            identity = %identity,
            to_leave = to_leave.len(),
            to_join = to_join.len(),
            "User pushed"
        );
        snapshot.baseline = converged;
        Ok(())
    }

    /// Найти пользователя по имени или создать его; возвращает true, если создан
    async fn materialize(&self, user: &mut User) -> Result<bool, SyncError> {
        let name = user.base.name.clone();

        let exists = self.backend.exists_by_attribute("Name", &name).await?;
        if !exists {
            self.backend.create_user(&name).await?;
            info!(name = %name, "User created");
        }

        let UserEntry { user: fetched, .. } = self.backend.fetch_user(&name).await?;
        user.base = fetched.base;
        Ok(!exists)
    }
}
