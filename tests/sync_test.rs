//! Synchronization into WordPress installs during development

mod common;

use common::{create_project, write_json};
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wpbuild_core::{ConfigResolver, Synchronizer};

fn project_with_targets(root: &std::path::Path) {
    create_project(root);
    write_json(
        &root.join("wpbuild.local.json"),
        &json!({
            "wordpress": {
                "devTarget": "./wp/wp-content/plugins/github-downloads",
                "targets": ["./mirror/github-downloads"]
            },
            "sync": { "composer": false }
        }),
    );
    fs::create_dir_all(root.join("wordpress-plugin/assets/lib")).unwrap();
    fs::write(root.join("wordpress-plugin/assets/lib/github-downloads.js"), "bundle").unwrap();
}

#[tokio::test]
async fn test_dev_targets_receive_plugin() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    project_with_targets(root);
    let config = ConfigResolver::resolve(root, "local").unwrap();

    let report = Synchronizer::sync(&config, true).await.unwrap();

    assert!(report.copied > 0);
    for target in ["wp/wp-content/plugins/github-downloads", "mirror/github-downloads"] {
        let target = root.join(target);
        assert!(target.join("github-downloads.php").is_file());
        assert!(target.join("includes/admin.php").is_file());
        assert!(target.join("assets/lib/github-downloads.js").is_file());
        assert!(!target.join("includes/debug.log").exists());
    }
}

#[tokio::test]
async fn test_second_sync_copies_nothing() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    project_with_targets(root);
    let config = ConfigResolver::resolve(root, "local").unwrap();

    Synchronizer::sync(&config, true).await.unwrap();
    let report = Synchronizer::sync(&config, true).await.unwrap();

    assert_eq!(report.copied, 0);
    assert!(report.unchanged > 0);
}

#[tokio::test]
async fn test_changed_file_is_propagated() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    project_with_targets(root);
    let config = ConfigResolver::resolve(root, "local").unwrap();
    Synchronizer::sync(&config, true).await.unwrap();

    fs::write(root.join("wordpress-plugin/includes/admin.php"), "<?php // v2").unwrap();
    let report = Synchronizer::sync(&config, true).await.unwrap();

    assert_eq!(report.copied, 2);
    assert_eq!(
        fs::read_to_string(root.join("mirror/github-downloads/includes/admin.php")).unwrap(),
        "<?php // v2"
    );
}
