//! Delta-backed stores: identities and users tables, service end to end, maintenance
#![cfg(feature = "delta")]

use std::sync::Arc;

use tempfile::TempDir;

use horizon_rbac::{
    bootstrap_admin, Caller, CreateUserRequest, DeltaIdentityStore, DeltaProfileStore,
    DeltaStore, ErrorKind, IdentityStore, NewIdentity, PortalConfig, PortalError, Profile,
    ProfileStore, RepairScheduler, Role, RoleService, SetRoleRequest, UidRequest,
};

fn test_config(dir: &TempDir) -> PortalConfig {
    PortalConfig::new(dir.path().to_str().unwrap())
        .with_jwt_secret("test-secret-jwt-key-min-32-chars!!")
        .with_vacuum_retention_hours(0)
}

async fn stores(dir: &TempDir) -> (Arc<DeltaStore>, Arc<DeltaIdentityStore>, Arc<DeltaProfileStore>) {
    let store = Arc::new(DeltaStore::new(test_config(dir)).await.unwrap());
    let identities = Arc::new(DeltaIdentityStore::new(Arc::clone(&store)));
    let profiles = Arc::new(DeltaProfileStore::new(Arc::clone(&store)));
    (store, identities, profiles)
}

fn new_identity(email: &str) -> NewIdentity {
    NewIdentity {
        email: email.into(),
        password: "password1".into(),
        display_name: email.split('@').next().unwrap_or_default().into(),
    }
}

#[tokio::test]
async fn test_tables_created() {
    let dir = TempDir::new().unwrap();
    let (store, _, _) = stores(&dir).await;

    assert!(dir.path().join("identities").join("_delta_log").exists());
    assert!(dir.path().join("users").join("_delta_log").exists());
    assert!(store.scan("users").await.unwrap().iter().all(|b| b.num_rows() == 0));

    // Reopening is idempotent
    DeltaStore::new(test_config(&dir)).await.unwrap();
}

#[tokio::test]
async fn test_identity_lifecycle() {
    let dir = TempDir::new().unwrap();
    let (_, identities, _) = stores(&dir).await;

    let ada = identities.create_identity(new_identity("Ada@School.test")).await.unwrap();
    assert_eq!(ada.email, "ada@school.test");
    assert_eq!(ada.role_claim, None);

    let dup = identities.create_identity(new_identity("ada@school.test")).await;
    assert!(matches!(dup, Err(PortalError::EmailAlreadyExists(_))));

    identities.set_role_claim(&ada.uid, Role::Teacher).await.unwrap();
    let verified = identities.verify_password("ada@school.test", "password1").await.unwrap();
    assert_eq!(verified.role_claim, Some(Role::Teacher));
    assert!(matches!(
        identities.verify_password("ada@school.test", "wrong-one").await,
        Err(PortalError::InvalidCredentials)
    ));

    identities.create_identity(new_identity("bob@school.test")).await.unwrap();
    assert_eq!(identities.list_identities(1000).await.unwrap().len(), 2);
    assert_eq!(identities.list_identities(1).await.unwrap().len(), 1);

    identities.delete_identity(&ada.uid).await.unwrap();
    assert!(identities.get_identity(&ada.uid).await.unwrap().is_none());
    assert!(matches!(
        identities.delete_identity(&ada.uid).await,
        Err(PortalError::UserNotFound(_))
    ));
}

#[tokio::test]
async fn test_profile_store_semantics() {
    let dir = TempDir::new().unwrap();
    let (_, _, profiles) = stores(&dir).await;

    let profile = Profile {
        uid: "u1".into(),
        email: "o'brien@school.test".into(),
        display_name: "O'Brien".into(),
        role: Role::Student,
    };
    profiles.put_profile(&profile).await.unwrap();
    profiles.put_profile(&profile).await.unwrap();
    assert_eq!(profiles.list_profiles().await.unwrap().len(), 1);

    profiles.update_role("u1", Role::Admin).await.unwrap();
    let got = profiles.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(got.role, Role::Admin);
    assert_eq!(got.display_name, "O'Brien");

    assert!(matches!(
        profiles.update_role("u2", Role::Admin).await,
        Err(PortalError::UserNotFound(_))
    ));

    profiles.delete_profile("u1").await.unwrap();
    profiles.delete_profile("u1").await.unwrap();
    assert!(profiles.get_profile("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_service_over_delta() {
    let dir = TempDir::new().unwrap();
    let (store, identities, profiles) = stores(&dir).await;

    let admin = bootstrap_admin(
        identities.as_ref(),
        profiles.as_ref(),
        "admin@school.test",
        "admin-pass",
        "Admin",
    )
    .await
    .unwrap()
    .unwrap();
    let caller = Caller::new(admin.uid.clone(), Some(Role::Admin));
    let service = RoleService::new(identities.clone(), profiles.clone());

    service
        .create_user(
            Some(&caller),
            CreateUserRequest::new("ada@school.test", "secret1", "Ada", "teacher"),
        )
        .await
        .unwrap();
    let err = service
        .create_user(
            Some(&caller),
            CreateUserRequest::new("ada@school.test", "secret1", "Ada", "teacher"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let users = service.list_users_with_role(Some(&caller)).await.unwrap();
    assert_eq!(users.len(), 2);
    let ada = users.iter().find(|u| u.email == "ada@school.test").unwrap().clone();
    assert_eq!(ada.role, Role::Teacher);

    service
        .set_role(Some(&caller), SetRoleRequest::new(&ada.uid, "student"))
        .await
        .unwrap();
    assert_eq!(
        identities.get_identity(&ada.uid).await.unwrap().unwrap().role_claim,
        Some(Role::Student)
    );
    assert_eq!(
        profiles.get_profile(&ada.uid).await.unwrap().unwrap().role,
        Role::Student
    );

    service
        .delete_user(Some(&caller), UidRequest::new(&ada.uid))
        .await
        .unwrap();

    // Compaction and zero-retention vacuum make the deletion physical
    let scheduler = RepairScheduler::new(service.clone()).with_delta_store(Arc::clone(&store));
    let report = scheduler.run_once().await.unwrap();
    assert_eq!(report.sweep.checked, 1);
    assert_eq!(report.sweep.repaired, 0);
    assert_eq!(report.tables_compacted, 2);

    let remaining = store
        .query("identities", &format!("uid = '{}'", ada.uid))
        .await
        .unwrap();
    assert!(remaining.iter().all(|b| b.num_rows() == 0));
    assert!(store.version("users").await.unwrap() > 0);
}

async fn service_with_admin(dir: &TempDir) -> (Arc<DeltaIdentityStore>, Arc<DeltaProfileStore>, RoleService, Caller) {
    let (_, identities, profiles) = stores(dir).await;
    let admin = bootstrap_admin(
        identities.as_ref(),
        profiles.as_ref(),
        "admin@school.test",
        "admin-pass",
        "Admin",
    )
    .await
    .unwrap()
    .unwrap();
    let service = RoleService::new(identities.clone(), profiles.clone());
    (identities, profiles, service, Caller::new(admin.uid, Some(Role::Admin)))
}

#[tokio::test]
async fn test_concurrent_creates_with_same_email() {
    let dir = TempDir::new().unwrap();
    let (identities, _, service, caller) = service_with_admin(&dir).await;

    let (a, b) = tokio::join!(
        service.create_user(
            Some(&caller),
            CreateUserRequest::new("dup@school.test", "secret1", "A", "teacher"),
        ),
        service.create_user(
            Some(&caller),
            CreateUserRequest::new("dup@school.test", "secret1", "B", "student"),
        ),
    );
    assert_eq!(a.is_ok() as usize + b.is_ok() as usize, 1);
    let err = a.err().or(b.err()).unwrap();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let users = service.list_users_with_role(Some(&caller)).await.unwrap();
    assert_eq!(users.iter().filter(|u| u.email == "dup@school.test").count(), 1);

    // Same race straight against the store
    let (a, b) = tokio::join!(
        identities.create_identity(new_identity("twin@school.test")),
        identities.create_identity(new_identity("twin@school.test")),
    );
    assert_eq!(a.is_ok() as usize + b.is_ok() as usize, 1);
    assert_eq!(identities.list_identities(1000).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_concurrent_role_changes_agree() {
    let dir = TempDir::new().unwrap();
    let (identities, profiles, service, caller) = service_with_admin(&dir).await;
    service
        .create_user(
            Some(&caller),
            CreateUserRequest::new("sam@school.test", "secret1", "Sam", "student"),
        )
        .await
        .unwrap();
    let sam = identities.verify_password("sam@school.test", "secret1").await.unwrap();

    let (a, b) = tokio::join!(
        service.set_role(Some(&caller), SetRoleRequest::new(&sam.uid, "teacher")),
        service.set_role(Some(&caller), SetRoleRequest::new(&sam.uid, "admin")),
    );
    a.unwrap();
    b.unwrap();

    let claim = identities.get_identity(&sam.uid).await.unwrap().unwrap().role_claim;
    let profile_role = profiles.get_profile(&sam.uid).await.unwrap().unwrap().role;
    assert_eq!(claim, Some(profile_role));

    // Interleaved writes to both tables straight against the stores
    let (a, b) = tokio::join!(
        identities.set_role_claim(&sam.uid, Role::Student),
        profiles.update_role(&sam.uid, Role::Student),
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(
        identities.get_identity(&sam.uid).await.unwrap().unwrap().role_claim,
        Some(Role::Student)
    );
}

#[tokio::test]
async fn test_field_changes_commit_once_and_keep_credentials() {
    let dir = TempDir::new().unwrap();
    let (store, identities, profiles) = stores(&dir).await;

    let ada = identities.create_identity(new_identity("ada@school.test")).await.unwrap();
    let before = store.version("identities").await.unwrap();
    identities.set_role_claim(&ada.uid, Role::Teacher).await.unwrap();
    assert_eq!(store.version("identities").await.unwrap(), before + 1);

    let verified = identities.verify_password("ada@school.test", "password1").await.unwrap();
    assert_eq!(verified.uid, ada.uid);
    assert_eq!(verified.role_claim, Some(Role::Teacher));
    assert_eq!(identities.list_identities(1000).await.unwrap().len(), 1);

    let profile = Profile {
        uid: ada.uid.clone(),
        email: ada.email.clone(),
        display_name: "Ada".into(),
        role: Role::Teacher,
    };
    profiles.put_profile(&profile).await.unwrap();
    let before = store.version("users").await.unwrap();
    profiles
        .put_profile(&Profile {
            display_name: "Ada L.".into(),
            role: Role::Admin,
            ..profile
        })
        .await
        .unwrap();
    profiles.update_role(&ada.uid, Role::Student).await.unwrap();
    assert_eq!(store.version("users").await.unwrap(), before + 2);

    let got = profiles.get_profile(&ada.uid).await.unwrap().unwrap();
    assert_eq!(got.display_name, "Ada L.");
    assert_eq!(got.role, Role::Student);
    assert_eq!(profiles.list_profiles().await.unwrap().len(), 1);
}
