// tests/integration/engine_pull.rs

use std::sync::Arc;

use nextdomen_sync::backend::BackendError;
use nextdomen_sync::models::{DirectoryObject, Group, OrgUnit, User};
use nextdomen_sync::{Reconciler, SyncError};
use tokio_test::{assert_err, assert_ok};

use crate::support::*;

fn names(groups: &[Group]) -> Vec<&str> {
    groups.iter().map(|g| g.base.name.as_str()).collect()
}

#[tokio::test]
async fn pull_user_fills_org_unit_groups_and_baseline() {
    let entry = user_entry("John Doe", IT, &["Developers", "Staff"]);
    let stub = Arc::new(
        StubBackend::new()
            .with_user(entry.clone())
            .with_org_unit(org_unit(IT))
            .with_group(group_entry("Developers", &[]))
            .with_group(group_entry("Staff", &[])),
    );
    let engine = Reconciler::new(stub.clone());

    let snapshot = assert_ok!(engine.pull_user(&entry.user).await);

    assert_eq!(snapshot.desired.base, entry.user.base);
    assert_eq!(snapshot.desired.org_unit.base.distinguished_name, IT);
    assert_eq!(names(&snapshot.desired.groups), vec!["Developers", "Staff"]);
    assert_eq!(snapshot.baseline(), snapshot.desired.groups.as_slice());

    let guid = entry.user.base.object_guid.to_string();
    assert_eq!(
        stub.calls(),
        vec![
            Call::FetchUser(guid),
            Call::FetchOrgUnit(IT.to_string()),
            Call::FetchGroup(group_dn("Developers")),
            Call::FetchGroup(group_dn("Staff")),
        ]
    );
}

#[tokio::test]
async fn pull_uses_dn_when_guid_is_nil() {
    let entry = user_entry("jdoe", IT, &[]);
    let stub = Arc::new(
        StubBackend::new()
            .with_user(entry.clone())
            .with_org_unit(org_unit(IT)),
    );
    let engine = Reconciler::new(stub.clone());

    let mut local = User::new("jdoe");
    local.base.distinguished_name = entry.user.base.distinguished_name.clone();

    let snapshot = assert_ok!(engine.pull_user(&local).await);
    assert_eq!(snapshot.desired.base.object_guid, entry.user.base.object_guid);
    assert_eq!(stub.calls()[0], Call::FetchUser(entry.user.base.distinguished_name));
}

#[tokio::test]
async fn pull_replaces_local_state_wholesale() {
    let entry = user_entry("jdoe", IT, &[]);
    let stub = Arc::new(
        StubBackend::new()
            .with_user(entry.clone())
            .with_org_unit(org_unit(IT)),
    );
    let engine = Reconciler::new(stub);

    let mut snapshot = nextdomen_sync::Snapshot::new(entry.user.clone());
    snapshot.desired.title = Some("Local edit".to_string());
    snapshot.desired.groups.push(group("Unsaved"));

    assert_ok!(engine.refresh_user(&mut snapshot).await);
    assert_eq!(snapshot.desired.title.as_deref(), Some("Engineer"));
    assert!(snapshot.desired.groups.is_empty());
    assert!(snapshot.baseline().is_empty());
}

#[tokio::test]
async fn container_parent_falls_back_to_object_lookup() {
    let entry = user_entry("jdoe", USERS, &[]);
    let stub = Arc::new(
        StubBackend::new()
            .with_user(entry.clone())
            .with_object(container(USERS)),
    );
    let engine = Reconciler::new(stub.clone());

    let snapshot = assert_ok!(engine.pull_user(&entry.user).await);

    assert_eq!(snapshot.desired.org_unit.base.name, "Users");
    assert_eq!(snapshot.desired.org_unit.base.object_class, "container");
    assert_eq!(snapshot.desired.org_unit.base.distinguished_name, USERS);
    assert!(stub.calls().contains(&Call::FetchObject(USERS.to_string())));
}

#[tokio::test]
async fn failed_fallback_surfaces_org_unit_error() {
    let entry = user_entry("jdoe", USERS, &[]);
    let stub = Arc::new(StubBackend::new().with_user(entry.clone()));
    let engine = Reconciler::new(stub);

    let err = assert_err!(engine.pull_user(&entry.user).await);
    assert!(matches!(err, SyncError::Backend(BackendError::NotOrgUnit(_))));
}

#[tokio::test]
async fn other_org_unit_errors_do_not_fall_back() {
    let entry = user_entry("jdoe", IT, &[]);
    let stub = Arc::new(
        StubBackend::new()
            .with_user(entry.clone())
            .with_object(container(IT))
            .failing("fetch_org_unit", || {
                BackendError::PermissionDenied("Access is denied".to_string())
            }),
    );
    let engine = Reconciler::new(stub.clone());

    let err = assert_err!(engine.pull_user(&entry.user).await);
    assert!(matches!(err, SyncError::Backend(BackendError::PermissionDenied(_))));
    assert!(!stub.calls().iter().any(|c| matches!(c, Call::FetchObject(_))));
}

#[tokio::test]
async fn nested_groups_are_resolved_depth_first() {
    let entry = user_entry("jdoe", IT, &["Developers"]);
    let stub = Arc::new(
        StubBackend::new()
            .with_user(entry.clone())
            .with_org_unit(org_unit(IT))
            .with_group(group_entry("Developers", &["Engineering"]))
            .with_group(group_entry("Engineering", &["Staff"]))
            .with_group(group_entry("Staff", &[])),
    );
    let engine = Reconciler::new(stub);

    let snapshot = assert_ok!(engine.pull_user(&entry.user).await);

    let developers = &snapshot.desired.groups[0];
    assert_eq!(names(&developers.groups), vec!["Engineering"]);
    assert_eq!(names(&developers.groups[0].groups), vec!["Staff"]);
    // Базовая линия — только прямое членство
    assert_eq!(names(snapshot.baseline()), vec!["Developers"]);
}

#[tokio::test]
async fn group_cycle_terminates_with_partial_chain() {
    let entry = user_entry("jdoe", IT, &["A"]);
    let stub = Arc::new(
        StubBackend::new()
            .with_user(entry.clone())
            .with_org_unit(org_unit(IT))
            .with_group(group_entry("A", &["B"]))
            .with_group(group_entry("B", &["A"])),
    );
    let engine = Reconciler::new(stub.clone());

    let snapshot = assert_ok!(engine.pull_user(&entry.user).await);

    let a = &snapshot.desired.groups[0];
    assert_eq!(names(&a.groups), vec!["B"]);
    assert!(a.groups[0].groups.is_empty());

    let group_fetches = stub
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::FetchGroup(_)))
        .count();
    assert_eq!(group_fetches, 2);
}

#[tokio::test]
async fn shared_parent_is_fetched_once() {
    let entry = user_entry("jdoe", IT, &["A", "B"]);
    let stub = Arc::new(
        StubBackend::new()
            .with_user(entry.clone())
            .with_org_unit(org_unit(IT))
            .with_group(group_entry("A", &["C"]))
            .with_group(group_entry("B", &["C"]))
            .with_group(group_entry("C", &[])),
    );
    let engine = Reconciler::new(stub.clone());

    let snapshot = assert_ok!(engine.pull_user(&entry.user).await);

    assert_eq!(names(&snapshot.desired.groups[0].groups), vec!["C"]);
    assert_eq!(names(&snapshot.desired.groups[1].groups), vec!["C"]);
    let c_fetches = stub
        .calls()
        .into_iter()
        .filter(|c| *c == Call::FetchGroup(group_dn("C")))
        .count();
    assert_eq!(c_fetches, 1);
}

#[tokio::test]
async fn layered_nesting_fetches_each_group_once() {
    const LAYERS: usize = 10;
    let name = |layer: usize, index: usize| format!("L{}G{}", layer, index);

    let mut stub = StubBackend::new().with_org_unit(org_unit(IT));
    for layer in 0..LAYERS {
        let parents: Vec<String> = if layer + 1 < LAYERS {
            vec![name(layer + 1, 0), name(layer + 1, 1)]
        } else {
            Vec::new()
        };
        let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
        for index in 0..2 {
            stub = stub.with_group(group_entry(&name(layer, index), &parents));
        }
    }
    let entry = user_entry("jdoe", IT, &["L0G0", "L0G1"]);
    let stub = Arc::new(stub.with_user(entry.clone()));
    let engine = Reconciler::new(stub.clone());

    let snapshot = assert_ok!(engine.pull_user(&entry.user).await);

    let group_fetches = stub
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::FetchGroup(_)))
        .count();
    assert_eq!(group_fetches, 2 * LAYERS);

    // Цепочка повторно использованной группы полная
    let mut chain = &snapshot.desired.groups[1];
    for layer in 1..LAYERS {
        assert_eq!(chain.groups.len(), 2, "layer {}", layer);
        chain = &chain.groups[1];
    }
    assert!(chain.groups.is_empty());
}

#[tokio::test]
async fn pull_group_skips_membership_in_itself() {
    let stub = Arc::new(
        StubBackend::new()
            .with_group(group_entry("Loop", &["Loop", "Staff"]))
            .with_group(group_entry("Staff", &[])),
    );
    let engine = Reconciler::new(stub);

    let snapshot = assert_ok!(engine.pull_group(&group("Loop")).await);
    assert_eq!(names(&snapshot.desired.groups), vec!["Staff"]);
    assert_eq!(names(snapshot.baseline()), vec!["Staff"]);
}

#[tokio::test]
async fn missing_group_aborts_pull() {
    let entry = user_entry("jdoe", IT, &["Ghost"]);
    let stub = Arc::new(
        StubBackend::new()
            .with_user(entry.clone())
            .with_org_unit(org_unit(IT)),
    );
    let engine = Reconciler::new(stub);

    let err = assert_err!(engine.pull_user(&entry.user).await);
    assert!(matches!(err, SyncError::Backend(BackendError::NotFound(_))));
}

#[tokio::test]
async fn pull_org_unit_and_object() {
    let stub = Arc::new(
        StubBackend::new()
            .with_org_unit(org_unit(IT))
            .with_object(container(USERS)),
    );
    let engine = Reconciler::new(stub);

    let ou = assert_ok!(engine.pull_org_unit(&OrgUnit {
        base: DirectoryObject::at(IT),
        ..OrgUnit::default()
    })
    .await);
    assert_eq!(ou.base.name, "IT");

    let users = assert_ok!(engine.pull_org_unit_by_identity(USERS).await);
    assert_eq!(users.base.object_class, "container");

    let object = assert_ok!(engine.pull_object(&DirectoryObject::at(USERS)).await);
    assert_eq!(object.name, "Users");
}

#[tokio::test]
async fn unaddressable_objects_fail_before_any_call() {
    let engine = Reconciler::new(Arc::new(PanicBackend));

    let err = assert_err!(engine.pull_user(&User::default()).await);
    assert!(matches!(err, SyncError::Identity { kind: "user" }));

    let mut group = Group::default();
    group.base.name = "Developers".to_string();
    let err = assert_err!(engine.pull_group(&group).await);
    assert!(matches!(err, SyncError::Identity { kind: "group" }));

    let err = assert_err!(engine.pull_object(&DirectoryObject::default()).await);
    assert!(matches!(err, SyncError::Identity { kind: "object" }));
}
