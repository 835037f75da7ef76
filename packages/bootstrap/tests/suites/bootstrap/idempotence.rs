use bootstrap::{MarkerOutcome, MarkerPlan, RoleGrant, UserOutcome};
use proptest::prelude::*;

use crate::support::{bootstrapper, cluster, dev_user, root, TARGET_DB};

#[tokio::test]
async fn dev_user_is_created_once_on_orcidlink() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);
    let user = dev_user();

    let first = boot
        .bootstrap(&root(), TARGET_DB, &user, &MarkerPlan::Skip)
        .await
        .expect("first bootstrap");
    assert_eq!(first.user, UserOutcome::Created);
    assert_eq!(first.marker, MarkerOutcome::Skipped);

    let second = boot
        .bootstrap(&root(), TARGET_DB, &user, &MarkerPlan::Skip)
        .await
        .expect("second bootstrap");
    assert_eq!(second.user, UserOutcome::AlreadyPresent);

    assert_eq!(cluster.user_count(TARGET_DB, "dev"), 1);
    assert_eq!(
        cluster.user_roles(TARGET_DB, "dev"),
        Some(vec![RoleGrant::new("dbOwner", TARGET_DB)])
    );
    assert_eq!(cluster.open_sessions(), 0);
}

#[tokio::test]
async fn created_user_can_log_in_to_target_database() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);
    let user = dev_user();

    boot.bootstrap(&root(), TARGET_DB, &user, &MarkerPlan::Skip)
        .await
        .expect("bootstrap");

    boot.verify_login(TARGET_DB, &user.credentials())
        .await
        .expect("dev should authenticate against orcidlink");
}

#[tokio::test]
async fn second_run_performs_no_writes() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);
    let plan = MarkerPlan::seed("description", "0.2.1");

    boot.bootstrap(&root(), TARGET_DB, &dev_user(), &plan)
        .await
        .expect("first bootstrap");
    let writes_after_first = cluster.mutations();

    boot.bootstrap(&root(), TARGET_DB, &dev_user(), &plan)
        .await
        .expect("second bootstrap");
    assert_eq!(cluster.mutations(), writes_after_first);
}

#[tokio::test]
async fn changed_password_on_rerun_keeps_existing_user() {
    let cluster = cluster();
    let boot = bootstrapper(&cluster);

    boot.bootstrap(&root(), TARGET_DB, &dev_user(), &MarkerPlan::Skip)
        .await
        .expect("bootstrap");

    let mut changed = dev_user();
    changed.password = "rotated".to_string();
    let report = boot
        .bootstrap(&root(), TARGET_DB, &changed, &MarkerPlan::Skip)
        .await
        .expect("re-run");
    assert_eq!(report.user, UserOutcome::AlreadyPresent);

    // Create-or-skip: the stored user is not mutated.
    boot.verify_login(TARGET_DB, &dev_user().credentials())
        .await
        .expect("original password still valid");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn repeated_runs_converge_to_one_user(runs in 1usize..6, seed_marker in any::<bool>()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let cluster = cluster();
        let plan = if seed_marker {
            MarkerPlan::seed("description", "0.2.1")
        } else {
            MarkerPlan::Skip
        };

        let outcomes = rt.block_on(async {
            let boot = bootstrapper(&cluster);
            let mut outcomes = Vec::new();
            for _ in 0..runs {
                outcomes.push(
                    boot.bootstrap(&root(), TARGET_DB, &dev_user(), &plan)
                        .await
                        .unwrap(),
                );
            }
            outcomes
        });

        prop_assert_eq!(cluster.user_count(TARGET_DB, "dev"), 1);
        prop_assert_eq!(outcomes[0].user, UserOutcome::Created);
        prop_assert!(outcomes[1..].iter().all(|r| r.user == UserOutcome::AlreadyPresent));

        let expected_docs = usize::from(seed_marker);
        prop_assert_eq!(cluster.documents(TARGET_DB, "description").len(), expected_docs);
        prop_assert_eq!(cluster.open_sessions(), 0);
    }
}
