//! End-to-end scenarios wired through the built-in rules.
//!
//! Each test drives the full stack — config document, default registry,
//! mock fetcher, engine — the way the webhook host does, and checks the
//! decision a reviewer would see.

use mergeguard_core::{
    Decision, Engine, FileChange, MergeRequest, MockFetcher, RuleConfig,
};

const RULES: &str = "\
enabled: true
require_full_coverage: false
manual_review_on_uncovered: false
files:
  - name: product
    path: '**/'
    filename: product.{yaml,yml}
    parser_type: yaml
    enabled: true
    default_action: manual_review
    sections:
      - name: warehouses
        yaml_path: warehouses
        required: false
        auto_approve: false
        rule_configs:
          - name: size_change_rule
            enabled: true
";

const PRODUCT_PATH: &str = "dataproducts/agg/foo/prod/product.yaml";

fn product(size: &str) -> String {
    format!("warehouses:\n  - type: user\n    size: {size}\n")
}

fn size_line_diff(old_size: &str, new_size: &str) -> String {
    format!(
        "@@ -1,3 +1,3 @@\n warehouses:\n   - type: user\n-    size: {old_size}\n+    size: {new_size}\n"
    )
}

fn change(path: &str, diff: String) -> FileChange {
    FileChange {
        old_path: path.to_string(),
        new_path: path.to_string(),
        diff,
        ..Default::default()
    }
}

fn rules() -> RuleConfig {
    RuleConfig::from_yaml_str(RULES).unwrap()
}

/// A size decrease inside the covered warehouses section auto-approves.
#[tokio::test]
async fn pure_decrease_is_approved() {
    let config = rules();
    let registry = mergeguard_rules::defaults();
    let mut mock = MockFetcher::new();
    mock.add_changes(1, 1, vec![change(PRODUCT_PATH, size_line_diff("LARGE", "MEDIUM"))]);
    mock.add_file("head", PRODUCT_PATH, product("MEDIUM"));
    mock.add_file("base", PRODUCT_PATH, product("LARGE"));
    mock.set_revisions(1, 1, "head", "base");
    let engine = Engine::new(&config, &registry, &mock).unwrap();

    let evaluation = engine.evaluate(&MergeRequest::new(1, 1), None).await;
    assert_eq!(evaluation.decision, Decision::Approve);
    assert_eq!(evaluation.approved_files, 1);
    assert_eq!(evaluation.uncovered_files, 0);
}

/// A size increase in the same section goes to manual review, and the
/// reason names both the rule and the file.
#[tokio::test]
async fn pure_increase_needs_review() {
    let config = rules();
    let registry = mergeguard_rules::defaults();
    let mut mock = MockFetcher::new();
    mock.add_changes(1, 2, vec![change(PRODUCT_PATH, size_line_diff("SMALL", "LARGE"))]);
    mock.add_file("head", PRODUCT_PATH, product("LARGE"));
    mock.add_file("base", PRODUCT_PATH, product("SMALL"));
    mock.set_revisions(1, 2, "head", "base");
    let engine = Engine::new(&config, &registry, &mock).unwrap();

    let evaluation = engine.evaluate(&MergeRequest::new(1, 2), None).await;
    assert_eq!(evaluation.decision, Decision::ManualReview);
    assert!(evaluation.reason.contains("size_change_rule"));
    assert!(evaluation.reason.contains(PRODUCT_PATH));
}

/// An edit outside every configured section is uncovered and, with a
/// manual-review default action, forces review citing the exact lines.
#[tokio::test]
async fn uncovered_edit_needs_review() {
    let content = "\
warehouses:
  - type: user
    size: MEDIUM
metadata:
  description: orders
  labels:
    - finance
    - retail
contact:
  slack: orders-help
";
    let diff = "@@ -10,1 +10,1 @@\n-  slack: old-channel\n+  slack: orders-help\n";

    let config = rules();
    let registry = mergeguard_rules::defaults();
    let mut mock = MockFetcher::new();
    mock.add_changes(1, 3, vec![change(PRODUCT_PATH, diff.to_string())]);
    mock.add_file("head", PRODUCT_PATH, content);
    mock.add_file("base", PRODUCT_PATH, content.replace("orders-help", "old-channel"));
    mock.set_revisions(1, 3, "head", "base");
    let engine = Engine::new(&config, &registry, &mock).unwrap();

    let evaluation = engine.evaluate(&MergeRequest::new(1, 3), None).await;
    assert_eq!(evaluation.decision, Decision::ManualReview);
    assert!(evaluation.reason.contains("[10,10]"));
}

/// A file no configuration matches is listed as unmatched and forces
/// review.
#[tokio::test]
async fn unmatched_file_needs_review() {
    let config = rules();
    let registry = mergeguard_rules::defaults();
    let mut mock = MockFetcher::new();
    mock.add_changes(
        1,
        4,
        vec![change("random/unknown.txt", "@@ -1,1 +1,1 @@\n-a\n+b\n".to_string())],
    );
    mock.set_revisions(1, 4, "head", "base");
    let engine = Engine::new(&config, &registry, &mock).unwrap();

    let evaluation = engine.evaluate(&MergeRequest::new(1, 4), None).await;
    assert_eq!(evaluation.decision, Decision::ManualReview);
    assert!(evaluation.files[0].reason.contains("unmatched"));
}

/// Zero file changes can never be auto-approved.
#[tokio::test]
async fn empty_mr_needs_review() {
    let config = rules();
    let registry = mergeguard_rules::defaults();
    let mut mock = MockFetcher::new();
    mock.add_changes(1, 5, Vec::new());
    mock.set_revisions(1, 5, "head", "base");
    let engine = Engine::new(&config, &registry, &mock).unwrap();

    let evaluation = engine.evaluate(&MergeRequest::new(1, 5), None).await;
    assert_eq!(evaluation.decision, Decision::ManualReview);
    assert_eq!(evaluation.reason, "empty MR");
}

/// One approving file and one flagged file: the MR is flagged and both
/// per-file outcomes survive in the summary.
#[tokio::test]
async fn mixed_mr_needs_review() {
    let path_a = "dataproducts/a/product.yaml";
    let path_b = "dataproducts/b/product.yaml";

    let config = rules();
    let registry = mergeguard_rules::defaults();
    let mut mock = MockFetcher::new();
    mock.add_changes(
        1,
        6,
        vec![
            change(path_a, size_line_diff("LARGE", "MEDIUM")),
            change(path_b, size_line_diff("SMALL", "LARGE")),
        ],
    );
    mock.add_file("head", path_a, product("MEDIUM"));
    mock.add_file("base", path_a, product("LARGE"));
    mock.add_file("head", path_b, product("LARGE"));
    mock.add_file("base", path_b, product("SMALL"));
    mock.set_revisions(1, 6, "head", "base");
    let engine = Engine::new(&config, &registry, &mock).unwrap();

    let evaluation = engine.evaluate(&MergeRequest::new(1, 6), None).await;
    assert_eq!(evaluation.decision, Decision::ManualReview);
    assert_eq!(evaluation.approved_files, 1);
    assert_eq!(evaluation.reviewed_files, 1);
    assert_eq!(evaluation.files[0].path, path_a);
    assert_eq!(evaluation.files[0].decision, Decision::Approve);
    assert_eq!(evaluation.files[1].path, path_b);
    assert_eq!(evaluation.files[1].decision, Decision::ManualReview);
    assert!(evaluation.files[1].reason.contains("size_change_rule"));
}
