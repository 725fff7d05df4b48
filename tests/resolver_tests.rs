//! Integration tests for server jar resolution against a real directory.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::fs;
use std::path::Path;

use drools_lsp_client::server::{ArtifactResolver, DEFAULT_JAVA_COMMAND, LaunchSpec, is_shaded_artifact};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::TempDir;

fn layout(files: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for file in files {
        let path = dir.path().join(file);
        fs::create_dir_all(path.parent().expect("parent")).unwrap();
        fs::write(path, b"PK").unwrap();
    }
    dir
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
fn test_unrelated_files_never_selected() {
    let dir = layout(&["server/a.txt", "server/other.txt", "server/drools-lsp.jar"]);
    assert_eq!(ArtifactResolver::new().resolve(None, dir.path()), None);
}

#[test]
fn test_greatest_shaded_name_wins() {
    let dir = layout(&[
        "server/drools-lsp-1.0-shaded.jar",
        "server/drools-lsp-2.0-shaded.jar",
        "server/drools-lsp-shaded.jar",
        "drools-lsp-shaded.jar",
    ]);

    let resolved = ArtifactResolver::new().resolve(None, dir.path());
    assert_eq!(
        resolved,
        Some(dir.path().join("server").join("drools-lsp-shaded.jar"))
    );
}

#[test]
fn test_root_fallback_without_server_dir() {
    let dir = layout(&["drools-lsp-shaded.jar"]);
    assert_eq!(
        ArtifactResolver::new().resolve(None, dir.path()),
        Some(dir.path().join("drools-lsp-shaded.jar"))
    );
}

#[test]
fn test_configured_path_wins_over_discovery() {
    let dir = layout(&["server/drools-lsp-2.0-shaded.jar", "custom/my-server.jar"]);
    let configured = dir.path().join("custom").join("my-server.jar");

    assert_eq!(
        ArtifactResolver::new().resolve(Some(&configured), dir.path()),
        Some(configured)
    );
}

#[test]
fn test_candidates_list_canonical_locations_last() {
    let dir = layout(&["server/drools-lsp-0.9-shaded.jar"]);
    let candidates = ArtifactResolver::new().candidates(dir.path());

    assert_eq!(
        candidates,
        vec![
            dir.path().join("server").join("drools-lsp-0.9-shaded.jar"),
            dir.path().join("server").join("drools-lsp-shaded.jar"),
            dir.path().join("drools-lsp-shaded.jar"),
        ]
    );
}

#[test]
fn test_launch_spec_from_resolved_jar() {
    let dir = layout(&["server/drools-lsp-2.0-shaded.jar"]);
    let jar = ArtifactResolver::new().resolve(None, dir.path()).unwrap();

    let spec = LaunchSpec::java(Some(Path::new("")), &jar);
    assert_eq!(spec.command, DEFAULT_JAVA_COMMAND);
    assert_eq!(spec.args, vec!["-jar".to_string(), jar.to_string_lossy().into_owned()]);
}

// ============================================================================
// Properties
// ============================================================================

fn file_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "drools-lsp-[0-9]\\.[0-9]-shaded\\.jar",
        "drools-lsp-[0-9]\\.jar",
        "[a-z]{1,8}\\.(jar|txt)",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_resolution_picks_greatest_shaded_jar(names in prop::collection::btree_set(file_name(), 0..6)) {
        let files: Vec<String> = names.iter().map(|n| format!("server/{n}")).collect();
        let refs: Vec<&str> = files.iter().map(String::as_str).collect();
        let dir = layout(&refs);
        let resolver = ArtifactResolver::new();

        let expected = names
            .iter()
            .filter(|n| is_shaded_artifact(n))
            .next_back()
            .map(|n| dir.path().join("server").join(n));

        let first = resolver.resolve(None, dir.path());
        prop_assert_eq!(&first, &expected);
        prop_assert_eq!(resolver.resolve(None, dir.path()), first);
    }
}
