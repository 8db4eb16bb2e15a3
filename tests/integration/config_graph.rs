// tests/integration/config_graph.rs
//
// From configuration to graph and watch profiles.

use assetdag::config::ConfigFile;
use assetdag::dag::{graph_from_config, OutputTarget};
use assetdag::errors::BuildError;
use assetdag::exec::TransformRegistry;
use assetdag::types::BuildMode;
use assetdag::watch::build_profiles_from_config;
use assetdag_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

fn site() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_output_root("distro/content")
        .with_global_exclude("**/*.tmp")
        .with_default_use_hash(true)
        .with_task(
            "compile-css",
            TaskConfigBuilder::new("css/main.scss", "css/main.css")
                .transform("scss")
                .watch("css/**/*.scss")
                .use_hash(false)
                .build(),
        )
        .with_task(
            "copy-fonts",
            TaskConfigBuilder::new("resources/fonts/**/*", "unused")
                .into_dir("resources/fonts")
                .exclude("**/*.md")
                .build(),
        )
        .with_task(
            "compress-css",
            TaskConfigBuilder::new("distro/content/css/main.css", "css/main.min.css")
                .after("compile-css")
                .transform("scss")
                .option("style", "compressed")
                .release_only(true)
                .build(),
        )
        .build()
}

#[test]
fn dev_graph_leaves_out_release_tasks() {
    let cfg = site();
    let registry = TransformRegistry::with_builtins();

    let dev = graph_from_config(&cfg, BuildMode::Dev, &registry).unwrap();
    assert_eq!(dev.ids().collect::<Vec<_>>(), vec!["compile-css", "copy-fonts"]);

    let release = graph_from_config(&cfg, BuildMode::Release, &registry).unwrap();
    assert_eq!(
        release.topological_order().unwrap(),
        vec![
            vec!["compile-css".to_string(), "copy-fonts".to_string()],
            vec!["compress-css".to_string()],
        ]
    );

    let compress = release.get("compress-css").unwrap();
    assert_eq!(compress.transform.name(), "scss");
    assert_eq!(compress.options.get_str("style"), Some("compressed"));
}

#[test]
fn task_excludes_replace_global_ones() {
    let cfg = site();
    let graph =
        graph_from_config(&cfg, BuildMode::Dev, &TransformRegistry::with_builtins()).unwrap();

    assert_eq!(graph.get("compile-css").unwrap().exclude, vec!["**/*.tmp"]);

    let fonts = graph.get("copy-fonts").unwrap();
    assert_eq!(fonts.exclude, vec!["**/*.md"]);
    assert_eq!(fonts.output, OutputTarget::Dir("resources/fonts".into()));
}

#[test]
fn watch_profiles_follow_watch_lists_and_hash_defaults() {
    let cfg = site();
    let profiles = build_profiles_from_config(&cfg, BuildMode::Dev).unwrap();
    assert_eq!(profiles.len(), 2);

    let css = profiles.iter().find(|p| p.task() == "compile-css").unwrap();
    assert!(css.matches("css/partials/_nav.scss"));
    assert!(!css.use_hash());

    let fonts = profiles.iter().find(|p| p.task() == "copy-fonts").unwrap();
    assert!(fonts.matches("resources/fonts/roboto/regular.woff2"));
    assert!(!fonts.matches("resources/fonts/LICENSE.md"));
    assert!(fonts.use_hash());
}

#[test]
fn builder_raw_config_still_goes_through_validation() {
    let raw = ConfigFileBuilder::new()
        .with_task(
            "publish",
            TaskConfigBuilder::new("dist/app.js", "app.js")
                .after("compress")
                .build(),
        )
        .with_task(
            "compress",
            TaskConfigBuilder::new("dist/app.js", "app.min.js")
                .release_only(true)
                .build(),
        )
        .raw();

    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(matches!(err, BuildError::Config(msg) if msg.contains("release_only")));
}

#[test]
fn extra_inputs_keep_their_order() {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "bundle-js",
            TaskConfigBuilder::new("js/vendor/*.js", "js/app.js")
                .input("js/app.js")
                .build(),
        )
        .build();

    let graph =
        graph_from_config(&cfg, BuildMode::Dev, &TransformRegistry::with_builtins()).unwrap();
    assert_eq!(
        graph.get("bundle-js").unwrap().inputs,
        vec!["js/vendor/*.js", "js/app.js"]
    );
}
