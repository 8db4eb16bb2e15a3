// tests/integration/fs_abstraction.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetdag::config::parse_and_validate;
use assetdag::dag::graph_from_config;
use assetdag::engine::CancelSignal;
use assetdag::exec::TransformRegistry;
use assetdag::fs::mock::MockFileSystem;
use assetdag::fs::FileSystem;
use assetdag::scheduler_for;
use assetdag::types::BuildMode;
use assetdag::watch::hash::compute_file_hash;
use assetdag::watch::patterns::{build_profiles_from_config, collect_matching_files};

const SITE: &str = r#"
[config]
output_root = "dist"

[default]
exclude = ["**/*.tmp"]

[task.copy-fonts]
inputs = ["resources/fonts/**/*"]
output = { dir = "fonts" }

[task.bundle-css]
inputs = ["css/*.css"]
output = { file = "css/site.css" }
"#;

fn site_fs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("./resources/fonts/roboto/regular.woff2", b"font-a".to_vec());
    fs.add_file("./resources/fonts/mono.woff2", b"font-b".to_vec());
    fs.add_file("./resources/fonts/cache.tmp", b"junk".to_vec());
    fs.add_file("./css/a.css", b"a{}".to_vec());
    fs.add_file("./css/b.css", b"b{}".to_vec());
    fs
}

#[test]
fn test_mock_fs_hashing() {
    let fs = MockFileSystem::new();
    fs.add_file("test.txt", b"hello world".to_vec());

    let hash = compute_file_hash(&fs, &PathBuf::from("test.txt")).unwrap();
    // blake3 hash of "hello world"
    assert_eq!(
        hash,
        "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
    );
}

#[test]
fn test_mock_fs_patterns_skip_output_root() {
    let fs = site_fs();
    fs.add_file("./dist/css/site.css", b"old".to_vec());

    let cfg = parse_and_validate(SITE).unwrap();
    let profiles = build_profiles_from_config(&cfg, BuildMode::Dev).unwrap();
    let css = profiles.iter().find(|p| p.task() == "bundle-css").unwrap();

    let files =
        collect_matching_files(&fs, Path::new("."), &[PathBuf::from("dist")], css).unwrap();

    assert_eq!(
        files,
        vec![PathBuf::from("./css/a.css"), PathBuf::from("./css/b.css")]
    );
}

#[tokio::test]
async fn test_build_through_mock_fs() {
    let fs = site_fs();
    fs.add_file("./dist/stale.txt", b"gone soon".to_vec());

    let cfg = parse_and_validate(SITE).unwrap();
    let graph =
        graph_from_config(&cfg, BuildMode::Dev, &TransformRegistry::with_builtins()).unwrap();
    let scheduler = scheduler_for(&cfg, Path::new("."), Arc::new(fs.clone()));

    let session = scheduler
        .clean_and_run_all(&graph, &CancelSignal::never())
        .await
        .unwrap();
    assert!(session.is_success());

    let outputs: Vec<PathBuf> = fs
        .file_paths()
        .into_iter()
        .filter(|p| p.starts_with("./dist"))
        .collect();
    assert_eq!(
        outputs,
        vec![
            PathBuf::from("./dist/css/site.css"),
            PathBuf::from("./dist/fonts/mono.woff2"),
            PathBuf::from("./dist/fonts/roboto/regular.woff2"),
        ]
    );
    assert_eq!(
        fs.read(Path::new("./dist/css/site.css")).unwrap(),
        b"a{}\nb{}"
    );
}
