use bootstrap::{
    BootstrapError, Bootstrapper, Credentials, MarkerPlan, MemoryOp, RoleGrant, StoreError,
    UserOutcome, UserSpec,
};

use crate::support::{bootstrapper, cluster, dev_user, root, TARGET_DB};

#[tokio::test]
async fn bad_admin_password_is_auth_error_without_mutation() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);

    let err = boot
        .bootstrap(
            &Credentials::new("dev_root", "wrong"),
            TARGET_DB,
            &dev_user(),
            &MarkerPlan::seed("description", "0.2.1"),
        )
        .await
        .unwrap_err();

    match err {
        BootstrapError::Auth { scope, .. } => assert_eq!(scope, "admin"),
        other => panic!("expected Auth, got {other:?}"),
    }
    assert_eq!(cluster.mutations(), 0);
    assert_eq!(cluster.user_count(TARGET_DB, "dev"), 0);
    assert!(!cluster.has_collection(TARGET_DB, "description"));
}

#[tokio::test]
async fn auth_error_message_never_contains_password() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);

    let err = boot
        .bootstrap(
            &Credentials::new("dev_root", "s3cr3t-guess"),
            TARGET_DB,
            &dev_user(),
            &MarkerPlan::Skip,
        )
        .await
        .unwrap_err();
    let rendered = format!("{err} {err:?}");
    assert!(!rendered.contains("s3cr3t-guess"));
    assert!(!rendered.contains("d3v"));
}

#[tokio::test]
async fn empty_role_list_is_grant_error_and_no_user() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);
    let user = UserSpec::new("dev", "d3v", TARGET_DB, vec![]);

    let err = boot
        .bootstrap(&root(), TARGET_DB, &user, &MarkerPlan::Skip)
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Grant { .. }), "{err:?}");
    assert_eq!(cluster.user_count(TARGET_DB, "dev"), 0);
    assert_eq!(cluster.open_sessions(), 0);
}

#[tokio::test]
async fn unknown_role_surfaces_datastore_message() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);
    let user = UserSpec::new(
        "dev",
        "d3v",
        TARGET_DB,
        vec![RoleGrant::new("superuser", TARGET_DB)],
    );

    let err = boot
        .bootstrap(&root(), TARGET_DB, &user, &MarkerPlan::Skip)
        .await
        .unwrap_err();

    match err {
        BootstrapError::Grant {
            username,
            database,
            message,
        } => {
            assert_eq!(username, "dev");
            assert_eq!(database, TARGET_DB);
            assert!(message.contains("No role named superuser@orcidlink"), "{message}");
        }
        other => panic!("expected Grant, got {other:?}"),
    }
    assert_eq!(cluster.user_count(TARGET_DB, "dev"), 0);
}

#[tokio::test]
async fn admin_without_user_privileges_is_grant_error() {
    let cluster = cluster();

    // A dbOwner of another database authenticates fine but cannot manage
    // users on the target.
    let ops = UserSpec::new(
        "ops",
        "0ps",
        "ops_db",
        vec![RoleGrant::new("dbOwner", "ops_db")],
    );
    bootstrapper(&cluster)
        .bootstrap(&root(), "ops_db", &ops, &MarkerPlan::Skip)
        .await
        .expect("seed ops user");

    let limited = Bootstrapper::new(cluster.clone()).with_admin_scope("ops_db");
    let err = limited
        .bootstrap(&ops.credentials(), TARGET_DB, &dev_user(), &MarkerPlan::Skip)
        .await
        .unwrap_err();

    match err {
        BootstrapError::Grant { message, .. } => {
            assert!(message.contains("not authorized"), "{message}")
        }
        other => panic!("expected Grant, got {other:?}"),
    }
    assert_eq!(cluster.user_count(TARGET_DB, "dev"), 0);
}

#[tokio::test]
async fn create_failure_still_closes_session() {
    let cluster = cluster();
    cluster.fail_on(
        MemoryOp::CreateUser,
        StoreError::Other("connection reset by peer".to_string()),
    );

    let err = bootstrapper(&cluster)
        .bootstrap(&root(), TARGET_DB, &dev_user(), &MarkerPlan::Skip)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("connection reset by peer"));
    assert_eq!(cluster.open_sessions(), 0);
}

#[tokio::test]
async fn close_failure_does_not_fail_bootstrap() {
    let cluster = cluster();
    cluster.fail_on(
        MemoryOp::Close,
        StoreError::Unavailable("socket closed".to_string()),
    );

    let report = bootstrapper(&cluster)
        .bootstrap(&root(), TARGET_DB, &dev_user(), &MarkerPlan::Skip)
        .await
        .expect("bootstrap");
    assert_eq!(report.user, UserOutcome::Created);
    assert_eq!(cluster.open_sessions(), 0);
}

#[tokio::test]
async fn user_lookup_failure_is_grant_error() {
    let cluster = cluster();
    cluster.fail_on(
        MemoryOp::UserExists,
        StoreError::Unavailable("server selection timeout".to_string()),
    );

    let err = bootstrapper(&cluster)
        .bootstrap(&root(), TARGET_DB, &dev_user(), &MarkerPlan::Skip)
        .await
        .unwrap_err();
    assert!(matches!(err, BootstrapError::Grant { .. }), "{err:?}");
    assert!(err.to_string().contains("server selection timeout"));
}

#[tokio::test]
async fn wrong_application_password_fails_verification() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);
    boot.bootstrap(&root(), TARGET_DB, &dev_user(), &MarkerPlan::Skip)
        .await
        .expect("bootstrap");

    let err = boot
        .verify_login(TARGET_DB, &Credentials::new("dev", "not-d3v"))
        .await
        .unwrap_err();
    assert!(matches!(err, BootstrapError::Verify { .. }), "{err:?}");
}
