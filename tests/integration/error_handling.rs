// tests/integration/error_handling.rs

use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;

use assetdag::config::load_and_validate;
use assetdag::dag::{graph_from_config, OutputTarget, Task, TaskGraph};
use assetdag::errors::BuildError;
use assetdag::exec::builtin::CopyTransform;
use assetdag::exec::TransformRegistry;
use assetdag::types::BuildMode;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_dag_cycle_returns_structured_error() {
    let file = config_file(
        r#"
[task.A]
inputs = ["a.js"]
output = { file = "a.js" }
after = ["B"]

[task.B]
inputs = ["b.js"]
output = { file = "b.js" }
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(BuildError::Cycle(id)) => {
            assert!(id == "A" || id == "B", "unexpected cycle member {id}");
        }
        Err(e) => panic!("Expected Cycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_dependency_names_both_tasks() {
    let file = config_file(
        r#"
[task.A]
inputs = ["a.js"]
output = { file = "a.js" }
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(BuildError::MissingDependency { task, dependency }) => {
            assert_eq!(task, "A");
            assert_eq!(dependency, "NonExistent");
        }
        Err(e) => panic!("Expected MissingDependency, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_transform_is_reported_before_running() {
    let file = config_file(
        r#"
[task.bundle]
inputs = ["js/*.js"]
output = { file = "app.js" }
transform = "webpack"
"#,
    );
    let cfg = load_and_validate(file.path()).unwrap();

    let err = graph_from_config(&cfg, BuildMode::Dev, &TransformRegistry::with_builtins())
        .unwrap_err();
    assert!(
        matches!(&err, BuildError::UnknownTransform { task, name } if task == "bundle" && name == "webpack"),
        "got {err:?}"
    );
    assert!(!err.is_graph_error());
}

#[test]
fn test_duplicate_task_is_rejected() {
    let mut graph = TaskGraph::new();
    let copy = Arc::new(CopyTransform);
    graph
        .add_task(Task::new("css", copy.clone(), OutputTarget::File("a.css".into())))
        .unwrap();

    let err = graph
        .add_task(Task::new("css", copy, OutputTarget::File("b.css".into())))
        .unwrap_err();

    assert!(matches!(&err, BuildError::DuplicateTask(id) if id == "css"));
    assert!(err.is_graph_error());
    assert_eq!(graph.len(), 1);
}

#[test]
fn test_invalid_toml_is_a_toml_error() {
    let file = config_file("[task.A\ninputs = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(BuildError::Toml(_))
    ));
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_and_validate(dir.path().join("Assetdag.toml")),
        Err(BuildError::Io(_))
    ));
}

#[test]
fn test_output_root_outside_project_is_rejected() {
    for root in ["..", "."] {
        let file = config_file(&format!(
            r#"
[config]
output_root = "{root}"

[task.A]
inputs = ["a.js"]
output = {{ file = "a.js" }}
"#
        ));

        match load_and_validate(file.path()) {
            Err(BuildError::Config(msg)) => assert!(msg.contains("output_root"), "{msg}"),
            Err(e) => panic!("Expected Config error for {root:?}, got: {:?}", e),
            Ok(_) => panic!("Expected error for {root:?}, got Ok"),
        }
    }
}
