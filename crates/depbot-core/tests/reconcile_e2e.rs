//! End-to-end reconciliation passes against the in-memory platform and
//! working tree.

use std::collections::HashSet;
use std::sync::Arc;

use depbot_core::body::encode_marker;
use depbot_core::fakes::{MemoryPlatform, MemoryWorkspace, PlatformCall};
use depbot_core::{
    branch_name, find_match, CandidateUpdate, CloseReason, Decision, DefaultRenderer, Ecosystem,
    ExistingChangeRequest, FileGenerator, GroupRule, Platform, ReconcileError, ReconcileState,
    ReconciliationConfig, Reconciler, RequestState, SkipReason, TextPatcher,
};

const PACKAGE_JSON: &str = r#"{
  "dependencies": {
    "react": "^18.0.0",
    "lodash": "4.17.20"
  }
}
"#;

const COMPOSER_JSON: &str = r#"{
  "require": {
    "symfony/console": "^6.4.0"
  }
}
"#;

const WORKFLOW: &str = "jobs:\n  build:\n    steps:\n      - uses: actions/checkout@v3\n";

struct Harness {
    platform: Arc<MemoryPlatform>,
    workspace: Arc<MemoryWorkspace>,
    reconciler: Reconciler,
}

fn harness() -> Harness {
    let platform = Arc::new(MemoryPlatform::default());
    let workspace = Arc::new(MemoryWorkspace::new());
    workspace.write("package.json", PACKAGE_JSON);
    workspace.write("composer.json", COMPOSER_JSON);
    workspace.write("Dockerfile", "FROM node:18\n");
    workspace.write(".github/workflows/ci.yml", WORKFLOW);

    let reconciler = Reconciler::new(
        platform.clone(),
        workspace.clone(),
        Arc::new(DefaultRenderer::default()),
    );
    Harness {
        platform,
        workspace,
        reconciler,
    }
}

fn npm_updates(react_target: &str) -> Vec<CandidateUpdate> {
    vec![
        CandidateUpdate::new("react", "^18.0.0", react_target, Ecosystem::Npm, "package.json"),
        CandidateUpdate::new("lodash", "4.17.20", "4.17.21", Ecosystem::Npm, "package.json"),
    ]
}

fn scan(react_target: &str) -> Vec<CandidateUpdate> {
    let mut updates = npm_updates(react_target);
    updates.push(CandidateUpdate::new(
        "symfony/console",
        "^6.4.0",
        "^6.4.3",
        Ecosystem::Composer,
        "composer.json",
    ));
    updates.push(CandidateUpdate::new(
        "node",
        "18",
        "20",
        Ecosystem::Docker,
        "Dockerfile",
    ));
    updates.push(CandidateUpdate::new(
        "actions/checkout",
        "v3",
        "v4",
        Ecosystem::GithubActions,
        ".github/workflows/ci.yml",
    ));
    updates
}

fn bot_request(number: u64, title: &str, head: &str, body: String) -> ExistingChangeRequest {
    ExistingChangeRequest {
        number,
        title: title.to_string(),
        body,
        head_branch: head.to_string(),
        base_branch: "main".to_string(),
        author: "depbot[bot]".to_string(),
        labels: vec!["dependencies".to_string()],
        state: RequestState::Open,
    }
}

fn commit_payloads(platform: &MemoryPlatform) -> Vec<(String, usize)> {
    platform
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            PlatformCall::CommitChanges { branch, files, .. } => Some((branch, files.len())),
            _ => None,
        })
        .collect()
}

// ---- first pass ----

#[tokio::test]
async fn first_pass_opens_one_request_per_group() {
    let h = harness();
    let config = ReconciliationConfig::default();

    let report = h.reconciler.reconcile(&scan("^18.3.0"), &config).await.unwrap();

    assert_eq!(report.created(), 4);
    assert!(report.is_success());
    let branches: Vec<&str> = report.groups.iter().map(|g| g.branch.as_str()).collect();
    assert_eq!(
        branches,
        vec![
            "depbot/update-npm-non-major",
            "depbot/update-composer-non-major",
            "depbot/update-github-actions-major",
            "depbot/update-docker-major",
        ]
    );

    let open = h.platform.open_requests();
    assert_eq!(open.len(), 4);
    let titles: Vec<&str> = open.iter().map(|r| r.title.as_str()).collect();
    assert!(titles.contains(&"chore(deps): update 2 npm dependencies (minor)"));
    assert!(titles.contains(&"chore(deps): update dependency symfony/console to v6.4.3"));
    assert!(titles.contains(&"chore(deps): update github actions (major)"));
    assert!(titles.contains(&"chore(deps): update docker images (major)"));

    let npm_files = h.platform.branch_files("depbot/update-npm-non-major").unwrap();
    assert_eq!(npm_files.len(), 1);
    assert!(npm_files[0].content.contains(r#""react": "^18.3.0""#));
    assert!(npm_files[0].content.contains(r#""lodash": "4.17.21""#));

    let docker_files = h.platform.branch_files("depbot/update-docker-major").unwrap();
    assert_eq!(docker_files[0].content, "FROM node:20\n");
}

#[tokio::test]
async fn created_requests_carry_config_labels_reviewers_and_assignees() {
    let h = harness();
    let config = ReconciliationConfig {
        labels: vec!["bot".to_string()],
        reviewers: vec!["octocat".to_string()],
        assignees: vec!["hubot".to_string()],
        ..ReconciliationConfig::default()
    };

    h.reconciler
        .reconcile(&npm_updates("^18.3.0"), &config)
        .await
        .unwrap();

    let created = h
        .platform
        .calls()
        .into_iter()
        .find_map(|c| match c {
            PlatformCall::CreateRequest(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert_eq!(created.labels, vec!["dependencies", "npm", "bot"]);
    assert_eq!(created.reviewers, vec!["octocat"]);
    assert_eq!(created.assignees, vec!["hubot"]);
    assert_eq!(created.base, "main");
}

// ---- idempotency ----

#[tokio::test]
async fn second_identical_pass_performs_no_writes() {
    let h = harness();
    let config = ReconciliationConfig::default();
    let updates = scan("^18.3.0");

    h.reconciler.reconcile(&updates, &config).await.unwrap();
    h.platform.clear_calls();

    let report = h.reconciler.reconcile(&updates, &config).await.unwrap();

    assert!(h.platform.write_calls().is_empty(), "{:?}", h.platform.write_calls());
    assert_eq!(report.skipped(), 4);
    for group in &report.groups {
        assert_eq!(group.state, Some(ReconcileState::MatchedSame));
        assert_eq!(
            group.result,
            Ok(Decision::Skip {
                reason: SkipReason::Unchanged
            })
        );
    }
}

// ---- partial failure isolation ----

#[tokio::test]
async fn failing_group_does_not_abort_the_others() {
    let h = harness();
    let config = ReconciliationConfig::default();
    h.platform.fail_create_for("symfony/console");

    let report = h.reconciler.reconcile(&scan("^18.3.0"), &config).await.unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.created(), 3);
    let composer = &report.groups[1];
    assert_eq!(composer.group, "composer non-major");
    assert!(composer.result.as_ref().unwrap_err().contains("500"));
    // groups after the failing one still ran
    assert!(report.groups[2].result.is_ok());
    assert!(report.groups[3].result.is_ok());
}

#[tokio::test]
async fn orphaned_branch_from_failed_pass_is_cleaned_up() {
    let h = harness();
    let config = ReconciliationConfig::default();
    let updates = scan("^18.3.0");

    h.platform.fail_create_for("symfony/console");
    h.reconciler.reconcile(&updates, &config).await.unwrap();
    assert!(h.platform.has_branch("depbot/update-composer-non-major"));

    h.platform.clear_failures();
    h.platform.clear_calls();
    let report = h.reconciler.reconcile(&updates, &config).await.unwrap();

    let composer = &report.groups[1];
    assert_eq!(composer.state, Some(ReconcileState::BranchOrphaned));
    assert!(matches!(composer.result, Ok(Decision::CreateNew { .. })));

    let calls = h.platform.write_calls();
    let delete_at = calls
        .iter()
        .position(|c| {
            *c == PlatformCall::DeleteBranch {
                name: "depbot/update-composer-non-major".to_string(),
            }
        })
        .unwrap();
    let create_at = calls
        .iter()
        .position(|c| {
            *c == PlatformCall::CreateBranch {
                name: "depbot/update-composer-non-major".to_string(),
                base: "main".to_string(),
            }
        })
        .unwrap();
    assert!(delete_at < create_at);
    assert_eq!(h.platform.open_requests().len(), 4);
}

#[tokio::test]
async fn listing_failure_aborts_the_pass() {
    let h = harness();
    h.platform.fail_listing();

    let err = h
        .reconciler
        .reconcile(&scan("^18.3.0"), &ReconciliationConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::ListRequests(_)));
    assert!(h.platform.write_calls().is_empty());
}

// ---- update in place ----

#[tokio::test]
async fn new_target_updates_existing_request_in_place() {
    let h = harness();
    let config = ReconciliationConfig::default();
    h.reconciler.reconcile(&scan("^18.3.0"), &config).await.unwrap();
    h.platform.clear_calls();

    let report = h.reconciler.reconcile(&scan("^18.3.1"), &config).await.unwrap();

    let npm = &report.groups[0];
    assert_eq!(npm.state, Some(ReconcileState::MatchedDifferent));
    match &npm.result {
        Ok(Decision::UpdateInPlace {
            number,
            content_changed,
            ..
        }) => {
            assert_eq!(*number, 1);
            assert!(*content_changed);
        }
        other => panic!("expected update in place, got {other:?}"),
    }
    assert!(h.platform.request(1).unwrap().body.contains("^18.3.1"));
    assert_eq!(report.updated(), 1);
    assert_eq!(report.skipped(), 3);
    // no second request for the group
    assert_eq!(h.platform.open_requests().len(), 4);
}

#[tokio::test]
async fn identical_branch_content_is_recommitted_not_emptied() {
    let h = harness();
    let config = ReconciliationConfig::default();
    let updates = npm_updates("^18.3.0");

    let expected = TextPatcher::new()
        .generate_file_updates(&updates, h.workspace.as_ref())
        .await
        .unwrap();
    h.workspace.set_rev_file(
        "origin/depbot/update-npm-non-major",
        "package.json",
        &expected[0].content,
    );
    h.platform.insert_request(bot_request(
        7,
        "chore(deps): update 2 npm dependencies (minor)",
        "depbot/update-npm-non-major",
        "Bumps things.\n\nupdate `react` from `^18.0.0` to `^18.2.0`\n".to_string(),
    ));

    let report = h.reconciler.reconcile(&updates, &config).await.unwrap();

    assert!(matches!(
        report.groups[0].result,
        Ok(Decision::UpdateInPlace {
            number: 7,
            content_changed: false,
            ..
        })
    ));
    let commits: Vec<_> = h
        .platform
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            PlatformCall::CommitChanges { branch, files, .. } => Some((branch, files)),
            _ => None,
        })
        .collect();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].0, "depbot/update-npm-non-major");
    assert_eq!(commits[0].1, expected);
}

// ---- auto-close ----

#[tokio::test]
async fn satisfied_request_is_closed_with_comment_and_branch_removed() {
    let h = harness();
    let config = ReconciliationConfig::default();
    let stale = CandidateUpdate::new("left-pad", "1.0.0", "1.1.0", Ecosystem::Npm, "package.json");
    h.platform.insert_request(bot_request(
        50,
        "chore(deps): update dependency left-pad to v1.1.0",
        "depbot/update-npm-non-major",
        encode_marker(&[stale]),
    ));

    let report = h
        .reconciler
        .reconcile(&npm_updates("^18.3.0"), &config)
        .await
        .unwrap();

    assert_eq!(report.groups[0].state, Some(ReconcileState::MatchedStale));
    assert_eq!(
        report.groups[0].result,
        Ok(Decision::Close {
            number: 50,
            reason: CloseReason::AlreadySatisfied
        })
    );
    assert_eq!(h.platform.request(50).unwrap().state, RequestState::Closed);
    assert!(!h.platform.has_branch("depbot/update-npm-non-major"));
    assert!(h.platform.calls().iter().any(|c| matches!(
        c,
        PlatformCall::AddComment { number: 50, text } if text.contains("already at or beyond")
    )));

    // the group gets a fresh request on the next pass
    let report = h
        .reconciler
        .reconcile(&npm_updates("^18.3.0"), &config)
        .await
        .unwrap();
    assert!(matches!(report.groups[0].result, Ok(Decision::CreateNew { .. })));
}

#[tokio::test]
async fn close_succeeds_when_branch_already_gone() {
    let h = harness();
    let stale = CandidateUpdate::new("left-pad", "1.0.0", "1.1.0", Ecosystem::Npm, "package.json");
    h.platform.insert_request(bot_request(
        50,
        "t",
        "depbot/update-npm-non-major",
        encode_marker(&[stale]),
    ));
    h.platform
        .delete_branch("depbot/update-npm-non-major")
        .await
        .unwrap();

    let report = h
        .reconciler
        .reconcile(&npm_updates("^18.3.0"), &ReconciliationConfig::default())
        .await
        .unwrap();

    assert!(matches!(report.groups[0].result, Ok(Decision::Close { .. })));
    assert!(report.is_success());
}

#[tokio::test]
async fn removed_manifest_closes_request() {
    let h = harness();
    let gone = CandidateUpdate::new("node", "18", "20", Ecosystem::Docker, "services/api/Dockerfile");
    h.platform.insert_request(bot_request(
        9,
        "chore(deps): update docker images (major)",
        "depbot/update-docker-major",
        encode_marker(&[gone]),
    ));

    let report = h
        .reconciler
        .reconcile(&scan("^18.3.0"), &ReconciliationConfig::default())
        .await
        .unwrap();

    let docker = report
        .groups
        .iter()
        .find(|g| g.group == "docker major")
        .unwrap();
    assert!(matches!(
        docker.result,
        Ok(Decision::Close {
            number: 9,
            reason: CloseReason::ManifestRemoved { .. }
        })
    ));
}

#[tokio::test]
async fn unmatched_stale_requests_are_swept_only_when_enabled() {
    let h = harness();
    let stale = CandidateUpdate::new("left-pad", "1.0.0", "1.1.0", Ecosystem::Npm, "package.json");
    h.platform.insert_request(bot_request(
        60,
        "chore(deps): update dependency left-pad to v1.1.0",
        "depbot/update-legacy-stuff",
        encode_marker(&[stale]),
    ));

    let report = h
        .reconciler
        .reconcile(&scan("^18.3.0"), &ReconciliationConfig::default())
        .await
        .unwrap();
    assert!(report.swept.is_empty());
    assert_eq!(h.platform.request(60).unwrap().state, RequestState::Open);

    let sweeping = ReconciliationConfig {
        close_unmatched: true,
        ..ReconciliationConfig::default()
    };
    let report = h.reconciler.reconcile(&scan("^18.3.0"), &sweeping).await.unwrap();
    assert_eq!(report.swept.len(), 1);
    assert_eq!(report.swept[0].number, 60);
    assert_eq!(h.platform.request(60).unwrap().state, RequestState::Closed);
    assert_eq!(report.closed(), 1);
}

// ---- invariants ----

fn assert_unique_heads(platform: &MemoryPlatform) {
    let open = platform.open_requests();
    let heads: HashSet<&str> = open.iter().map(|r| r.head_branch.as_str()).collect();
    assert_eq!(heads.len(), open.len(), "two open requests share a head: {open:?}");
}

fn assert_unique_plan_branches(
    reconciler: &Reconciler,
    updates: &[CandidateUpdate],
    config: &ReconciliationConfig,
) {
    let groups = reconciler.plan(updates, config).unwrap();
    let branches: HashSet<String> = groups
        .iter()
        .map(|g| branch_name(&g.name, &config.bot.branch_prefix))
        .collect();
    assert_eq!(branches.len(), groups.len(), "groups share a branch: {groups:?}");
}

#[tokio::test]
async fn at_most_one_open_request_per_group() {
    let h = harness();
    let config = ReconciliationConfig::default();

    for target in ["^18.3.0", "^18.3.1", "^18.3.1"] {
        let updates = scan(target);
        h.reconciler.reconcile(&updates, &config).await.unwrap();

        assert_unique_heads(&h.platform);
        assert_unique_plan_branches(&h.reconciler, &updates, &config);
        let groups = h.reconciler.plan(&updates, &config).unwrap();
        let open = h.platform.open_requests();
        for group in &groups {
            let matching = open
                .iter()
                .filter(|r| find_match(group, std::slice::from_ref(*r), &config).is_match())
                .count();
            assert!(matching <= 1, "group {} matched {matching} requests", group.name);
        }
    }
}

#[tokio::test]
async fn rule_named_like_a_default_group_gets_its_own_branch() {
    let h = harness();
    let config = ReconciliationConfig {
        groups: vec![GroupRule {
            name: "npm-non-major".to_string(),
            patterns: vec!["react".to_string()],
            update_types: None,
        }],
        ..ReconciliationConfig::default()
    };

    for target in ["^18.3.0", "^18.3.1"] {
        let updates = scan(target);
        let report = h.reconciler.reconcile(&updates, &config).await.unwrap();
        assert!(report.is_success(), "{report:?}");

        assert_unique_heads(&h.platform);
        assert_unique_plan_branches(&h.reconciler, &updates, &config);
    }

    assert_eq!(h.platform.open_requests().len(), 5);
    assert!(h.platform.has_branch("depbot/update-npm-non-major"));
    assert!(h.platform.has_branch("depbot/update-npm-non-major-default"));
    assert!(!h
        .platform
        .calls()
        .iter()
        .any(|c| matches!(c, PlatformCall::DeleteBranch { .. })));
}

#[tokio::test]
async fn rules_sharing_a_branch_slug_are_rejected_before_any_write() {
    let h = harness();
    let rule = |name: &str, pattern: &str| GroupRule {
        name: name.to_string(),
        patterns: vec![pattern.to_string()],
        update_types: None,
    };
    let config = ReconciliationConfig {
        groups: vec![rule("React Ecosystem", "react"), rule("react-ecosystem", "lodash")],
        ..ReconciliationConfig::default()
    };

    let err = h.reconciler.reconcile(&scan("^18.3.0"), &config).await.unwrap_err();

    assert!(matches!(err, ReconcileError::InvalidConfig(_)));
    assert!(h.platform.write_calls().is_empty());
}

#[tokio::test]
async fn grouped_request_of_another_ecosystem_is_not_taken_over() {
    let h = harness();
    h.workspace.write(
        "composer.json",
        "{\n  \"require\": {\n    \"symfony/console\": \"^6.4.0\",\n    \"monolog/monolog\": \"^3.5.0\"\n  }\n}\n",
    );
    let npm = vec![
        CandidateUpdate::new("react", "^18.0.0", "^18.3.0", Ecosystem::Npm, "package.json"),
        CandidateUpdate::new("vue", "3.3.0", "3.4.0", Ecosystem::Npm, "package.json"),
    ];
    h.platform.insert_request(bot_request(
        1,
        "chore(deps): update 2 npm dependencies (minor)",
        "depbot/update-npm-non-major",
        encode_marker(&npm),
    ));

    // the npm scan failed; only composer candidates arrive
    let composer = vec![
        CandidateUpdate::new("symfony/console", "^6.4.0", "^6.4.3", Ecosystem::Composer, "composer.json"),
        CandidateUpdate::new("monolog/monolog", "^3.5.0", "^3.6.0", Ecosystem::Composer, "composer.json"),
    ];
    let report = h
        .reconciler
        .reconcile(&composer, &ReconciliationConfig::default())
        .await
        .unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].state, Some(ReconcileState::NoMatch));
    assert!(matches!(report.groups[0].result, Ok(Decision::CreateNew { .. })));
    assert_eq!(report.closed(), 0);
    assert_eq!(h.platform.request(1).unwrap().state, RequestState::Open);
    assert_eq!(h.platform.open_requests().len(), 2);
}

#[tokio::test]
async fn branch_recreation_never_commits_an_empty_payload() {
    let h = harness();
    let config = ReconciliationConfig::default();

    h.reconciler.reconcile(&scan("^18.3.0"), &config).await.unwrap();
    h.reconciler.reconcile(&scan("^18.3.1"), &config).await.unwrap();

    let commits = commit_payloads(&h.platform);
    assert!(!commits.is_empty());
    assert!(commits.iter().all(|(_, count)| *count > 0), "{commits:?}");
}

#[tokio::test]
async fn empty_generation_skips_without_writes() {
    let h = harness();
    let ghost = vec![CandidateUpdate::new(
        "ghost",
        "1.0.0",
        "1.0.1",
        Ecosystem::Npm,
        "package.json",
    )];

    let report = h
        .reconciler
        .reconcile(&ghost, &ReconciliationConfig::default())
        .await
        .unwrap();

    assert_eq!(
        report.groups[0].result,
        Ok(Decision::Skip {
            reason: SkipReason::GenerationEmpty
        })
    );
    assert!(h.platform.write_calls().is_empty());
}

#[tokio::test]
async fn working_tree_is_reset_before_every_group() {
    let h = harness();
    h.workspace.fail_resets(true);

    let report = h
        .reconciler
        .reconcile(&scan("^18.3.0"), &ReconciliationConfig::default())
        .await
        .unwrap();

    // failed resets are best-effort
    assert_eq!(report.created(), 4);
    assert_eq!(h.workspace.resets().len(), 4);
    assert!(h.workspace.resets().iter().all(|b| b == "main"));
}

#[tokio::test]
async fn foreign_requests_are_left_alone() {
    let h = harness();
    let mut foreign = bot_request(
        3,
        "chore(deps): update dependency symfony/console to v6.4.3",
        "dependabot/composer/symfony/console-6.4.3",
        String::new(),
    );
    foreign.author = "dependabot[bot]".to_string();
    h.platform.insert_request(foreign);

    let report = h
        .reconciler
        .reconcile(&scan("^18.3.0"), &ReconciliationConfig::default())
        .await
        .unwrap();

    assert_eq!(report.created(), 4);
    assert_eq!(h.platform.request(3).unwrap().state, RequestState::Open);
    assert!(!h
        .platform
        .write_calls()
        .iter()
        .any(|c| matches!(c, PlatformCall::UpdateRequest { number: 3, .. })));
}

#[tokio::test]
async fn dropped_candidates_never_reach_a_group() {
    let h = harness();
    let config = ReconciliationConfig {
        exclude_major: true,
        ..ReconciliationConfig::default()
    };

    let report = h.reconciler.reconcile(&scan("^18.3.0"), &config).await.unwrap();

    assert_eq!(report.dropped.len(), 2);
    assert_eq!(report.groups.len(), 2);
    assert_eq!(h.platform.open_requests().len(), 2);
}
