// tests/integration/local_store.rs

use std::sync::Arc;

use nextdomen_sync::backend::{DirectoryBackend, LocalDirectory};
use nextdomen_sync::models::{Group, User};
use nextdomen_sync::raddb::RadDB;
use nextdomen_sync::{Reconciler, Snapshot};
use tokio_test::assert_ok;

use crate::support::{temp_db_path, USERS};

struct Fixture {
    directory: Arc<LocalDirectory>,
    engine: Reconciler,
    path: std::path::PathBuf,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_file(&self.path).ok();
    }
}

async fn fixture() -> Fixture {
    let path = temp_db_path();
    let directory = Arc::new(
        LocalDirectory::open(&path, &RadDB::generate_key(), USERS)
            .unwrap()
            .with_bcrypt_cost(4),
    );
    directory.add_group("Developers", None, None).await.unwrap();
    directory.add_group("Staff", None, None).await.unwrap();
    let engine = Reconciler::new(directory.clone());
    Fixture {
        directory,
        engine,
        path,
    }
}

fn group_in_users(cn: &str) -> Group {
    Group::at(format!("CN={},{}", cn, USERS))
}

#[tokio::test]
async fn push_creates_user_and_pull_reads_it_back() {
    let fx = fixture().await;

    let mut user = User::new("John Doe");
    user.sam_account_name = "jdoe".to_string();
    user.title = Some("Engineer".to_string());
    user.enabled = true;
    user.account_password = "S3cret!".to_string();
    user.groups = vec![group_in_users("Developers")];
    let mut snapshot = Snapshot::new(user);

    assert_ok!(fx.engine.push_user(&mut snapshot).await);
    assert!(snapshot.desired.base.is_materialized());

    let pulled = assert_ok!(fx.engine.pull_user(&snapshot.desired).await);
    assert_eq!(pulled.desired.sam_account_name, "jdoe");
    assert_eq!(pulled.desired.title.as_deref(), Some("Engineer"));
    assert!(pulled.desired.enabled);
    assert_eq!(pulled.desired.org_unit.base.distinguished_name, USERS);
    assert_eq!(pulled.desired.org_unit.base.object_class, "container");
    assert_eq!(pulled.desired.groups.len(), 1);
    assert_eq!(pulled.desired.groups[0].sam_account_name, "Developers");

    assert!(fx.directory.verify_password("jdoe", "S3cret!").await.unwrap());
}

#[tokio::test]
async fn membership_converges_across_pushes() {
    let fx = fixture().await;

    let mut user = User::new("jdoe");
    user.groups = vec![group_in_users("Developers")];
    let mut snapshot = Snapshot::new(user);
    assert_ok!(fx.engine.push_user(&mut snapshot).await);

    let mut snapshot = assert_ok!(fx.engine.pull_user(&snapshot.desired).await);
    snapshot.desired.groups = vec![group_in_users("Staff")];
    snapshot.desired.title = None;
    assert_ok!(fx.engine.push_user(&mut snapshot).await);

    let entry = fx.directory.fetch_user("jdoe").await.unwrap();
    assert_eq!(entry.member_of, vec![format!("CN=Staff,{}", USERS)]);

    let developers = fx.directory.fetch_group("Developers").await.unwrap();
    assert!(developers.group.members.is_empty());
}

#[tokio::test]
async fn nested_groups_with_cycle_are_pulled() {
    let fx = fixture().await;
    fx.directory
        .add_membership("Developers", &[format!("CN=Staff,{}", USERS)])
        .await
        .unwrap();
    fx.directory
        .add_membership("Staff", &[format!("CN=Developers,{}", USERS)])
        .await
        .unwrap();

    let snapshot = assert_ok!(fx.engine.pull_group_by_identity("Developers").await);
    assert_eq!(snapshot.desired.groups.len(), 1);
    assert_eq!(snapshot.desired.groups[0].base.name, "Staff");
    assert!(snapshot.desired.groups[0].groups.is_empty());
}

#[tokio::test]
async fn expiration_is_set_and_cleared() {
    use chrono::{TimeZone, Utc};

    let fx = fixture().await;
    let at = Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap();

    let mut user = User::new("jdoe");
    user.account_expiration_date = Some(at);
    let mut snapshot = Snapshot::new(user);
    assert_ok!(fx.engine.push_user(&mut snapshot).await);
    assert_eq!(fx.directory.account_expires("jdoe").await.unwrap(), Some(at));

    snapshot.desired.account_expiration_date = None;
    assert_ok!(fx.engine.push_user(&mut snapshot).await);
    assert_eq!(fx.directory.account_expires("jdoe").await.unwrap(), None);
}

#[tokio::test]
async fn seeded_org_unit_is_pulled_as_org_unit() {
    let fx = fixture().await;
    let ou = fx
        .directory
        .add_org_unit("IT", "DC=corp,DC=acme,DC=com")
        .await
        .unwrap();

    let pulled = assert_ok!(
        fx.engine
            .pull_org_unit_by_identity(&ou.base.distinguished_name)
            .await
    );
    assert_eq!(pulled.base.object_class, "organizationalUnit");
    assert_eq!(pulled.base.name, "IT");
    assert!(pulled.parent().is_root());
}

#[tokio::test]
async fn state_survives_reopen() {
    let path = temp_db_path();
    let key = RadDB::generate_key();
    {
        let directory = LocalDirectory::open(&path, &key, USERS).unwrap();
        directory.create_user("jdoe").await.unwrap();
    }

    let directory = LocalDirectory::open(&path, &key, USERS).unwrap();
    assert!(directory.exists_by_attribute("Name", "jdoe").await.unwrap());
    std::fs::remove_file(&path).ok();
}
