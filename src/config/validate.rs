// src/config/validate.rs

use std::path::{Component, Path};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, OutputConfig, RawConfigFile};
use crate::errors::{BuildError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.default, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_tasks(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(BuildError::Config(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.debounce_ms == 0 {
        return Err(BuildError::Config(
            "[config].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.output_root.trim().is_empty() {
        return Err(BuildError::Config(
            "[config].output_root must not be empty".to_string(),
        ));
    }
    // `build` wipes the output root, so it must name a directory strictly
    // below the project root.
    let root = Path::new(&cfg.config.output_root);
    if !is_contained_relative(root) || !has_normal_component(root) {
        return Err(BuildError::Config(format!(
            "[config].output_root '{}' must be a relative directory below the project root",
            cfg.config.output_root
        )));
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.inputs.is_empty() {
            return Err(BuildError::Config(format!(
                "task '{name}' must declare at least one input glob"
            )));
        }

        let target = match &task.output {
            OutputConfig::File(p) | OutputConfig::Dir(p) => p,
        };
        if !is_contained_relative(Path::new(target)) {
            return Err(BuildError::Config(format!(
                "task '{name}' output '{target}' must be a relative path inside the output root"
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            let Some(dep_task) = cfg.task.get(dep) else {
                return Err(BuildError::MissingDependency {
                    task: name.clone(),
                    dependency: dep.clone(),
                });
            };
            if dep == name {
                return Err(BuildError::Cycle(name.clone()));
            }
            if dep_task.release_only && !task.release_only {
                return Err(BuildError::Config(format!(
                    "task '{name}' cannot depend on release_only task '{dep}'"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task. For
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(BuildError::Cycle(cycle.node_id().to_string())),
    }
}

fn has_normal_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::Normal(_)))
}

/// A non-empty relative path without `..` components.
fn is_contained_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use crate::config::parse_and_validate;
    use crate::errors::BuildError;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = parse_and_validate(
            r#"
[task.copy-html]
inputs = ["index.html"]
output = { dir = "." }
"#,
        )
        .unwrap();

        assert_eq!(cfg.config_section().output_root, "dist");
        assert_eq!(cfg.config_section().debounce_ms, 100);
        let task = &cfg.tasks()["copy-html"];
        assert_eq!(task.transform, "copy");
        assert!(!task.release_only);
    }

    #[test]
    fn empty_config_is_rejected() {
        let err = parse_and_validate("[config]\noutput_root = \"out\"\n").unwrap_err();
        assert!(matches!(err, BuildError::Config(msg) if msg.contains("at least one")));
    }

    #[test]
    fn output_outside_root_is_rejected() {
        let err = parse_and_validate(
            r#"
[task.a]
inputs = ["a.js"]
output = { file = "../a.js" }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Config(msg) if msg.contains("output root")));
    }

    #[test]
    fn output_root_must_stay_below_the_project() {
        for root in ["..", ".", "./", "/", "/var/www", "dist/../..", "site/../../x"] {
            let src = format!(
                "[config]\noutput_root = \"{root}\"\n\n[task.a]\ninputs = [\"a.js\"]\noutput = {{ file = \"a.js\" }}\n"
            );
            let err = parse_and_validate(&src).unwrap_err();
            assert!(
                matches!(&err, BuildError::Config(msg) if msg.contains("output_root")),
                "{root}: {err:?}"
            );
        }

        let src = "[config]\noutput_root = \"./distro/content\"\n\n[task.a]\ninputs = [\"a.js\"]\noutput = { file = \"a.js\" }\n";
        let cfg = parse_and_validate(src).unwrap();
        assert_eq!(
            cfg.config_section().output_root_path(),
            std::path::PathBuf::from("distro/content")
        );
    }

    #[test]
    fn regular_task_cannot_depend_on_release_task() {
        let err = parse_and_validate(
            r#"
[task.compress]
inputs = ["dist/a.js"]
output = { file = "a.js" }
release_only = true

[task.publish]
after = ["compress"]
inputs = ["dist/a.js"]
output = { file = "b.js" }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Config(msg) if msg.contains("release_only")));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = parse_and_validate(
            r#"
[task.a]
after = ["a"]
inputs = ["a.js"]
output = { file = "a.js" }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Cycle(id) if id == "a"));
    }
}
