use bootstrap::{
    AdminSession, BootstrapError, Connector, MarkerOutcome, MarkerPlan, MemoryOp, StoreError,
    UserOutcome, VersionMarker,
};

use crate::support::{bootstrapper, cluster, dev_user, root, TARGET_DB};

#[tokio::test]
async fn seed_marker_writes_exactly_one_unmigrated_document() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);
    let plan = MarkerPlan::seed("description", "0.2.1");

    let first = boot
        .bootstrap(&root(), TARGET_DB, &dev_user(), &plan)
        .await
        .expect("first bootstrap");
    assert_eq!(first.marker, MarkerOutcome::Seeded);

    let second = boot
        .bootstrap(&root(), TARGET_DB, &dev_user(), &plan)
        .await
        .expect("second bootstrap");
    assert_eq!(second.marker, MarkerOutcome::AlreadyPresent);

    let docs = cluster.documents(TARGET_DB, "description");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].version, "0.2.1");
    assert!(!docs[0].migrated);
    assert!(docs[0].at > 0);
}

#[tokio::test]
async fn skip_leaves_schema_untouched() {
    let cluster = cluster();
    bootstrapper(&cluster)
        .bootstrap(&root(), TARGET_DB, &dev_user(), &MarkerPlan::Skip)
        .await
        .expect("bootstrap");

    assert!(!cluster.has_collection(TARGET_DB, "description"));
}

#[tokio::test]
async fn existing_marker_from_a_previous_tool_is_respected() {
    let cluster = cluster();
    cluster.insert_raw(
        TARGET_DB,
        "description",
        "65a1f0c2e4b0a1b2c3d4e5f6",
        VersionMarker {
            version: "0.2.0".to_string(),
            at: 1_700_000_000_000,
            migrated: true,
        },
    );

    let report = bootstrapper(&cluster)
        .bootstrap(
            &root(),
            TARGET_DB,
            &dev_user(),
            &MarkerPlan::seed("description", "0.2.1"),
        )
        .await
        .expect("bootstrap");

    assert_eq!(report.marker, MarkerOutcome::AlreadyPresent);
    let docs = cluster.documents(TARGET_DB, "description");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].version, "0.2.0");
}

#[tokio::test]
async fn pre_created_empty_collection_is_not_an_error() {
    let cluster = cluster();
    let session = cluster.open("admin", &root()).await.expect("open");
    session
        .ensure_collection(TARGET_DB, "description")
        .await
        .expect("create collection");
    session.close().await.expect("close");

    let report = bootstrapper(&cluster)
        .bootstrap(
            &root(),
            TARGET_DB,
            &dev_user(),
            &MarkerPlan::seed("description", "0.2.1"),
        )
        .await
        .expect("bootstrap");
    assert_eq!(report.marker, MarkerOutcome::Seeded);
}

#[tokio::test]
async fn insert_failure_is_marker_error_and_rerun_recovers() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);
    let plan = MarkerPlan::seed("description", "0.2.1");
    cluster.fail_on(
        MemoryOp::InsertMarker,
        StoreError::Other("write concern timeout".to_string()),
    );

    let err = boot
        .bootstrap(&root(), TARGET_DB, &dev_user(), &plan)
        .await
        .unwrap_err();
    match &err {
        BootstrapError::Marker {
            database,
            collection,
            message,
        } => {
            assert_eq!(database, TARGET_DB);
            assert_eq!(collection, "description");
            assert!(message.contains("write concern timeout"));
        }
        other => panic!("expected Marker, got {other:?}"),
    }
    assert_eq!(cluster.open_sessions(), 0);

    cluster.clear_failures();
    let report = boot
        .bootstrap(&root(), TARGET_DB, &dev_user(), &plan)
        .await
        .expect("re-run");
    assert_eq!(report.user, UserOutcome::AlreadyPresent);
    assert_eq!(report.marker, MarkerOutcome::Seeded);
    assert_eq!(cluster.documents(TARGET_DB, "description").len(), 1);
}

#[tokio::test]
async fn empty_marker_version_is_rejected() {
    let cluster = cluster();
    let err = bootstrapper(&cluster)
        .bootstrap(
            &root(),
            TARGET_DB,
            &dev_user(),
            &MarkerPlan::seed("description", ""),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Marker { .. }), "{err:?}");
    assert!(!cluster.has_collection(TARGET_DB, "description"));
}
