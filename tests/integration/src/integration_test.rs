//! End-to-end integration test for a release cycle
//!
//! This test exercises the complete flow: config loading -> bundle build ->
//! stage diff -> deploy -> rebuild and redeploy.

use pretty_assertions::assert_eq;
use stage_bundle::{ArtifactsConfig, build_bundle, clean_deploy_root};
use stage_diff::logging::{self, LogOptions};
use stage_diff::{ContentDiffEngine, DeployRequest, StageLocation, deploy};
use stage_fs::{ContentHashMatcher, StagePath};
use stage_test_utils::{HashMode, InMemoryStage, TestProject};
use std::collections::BTreeSet;

const CONFIG: &str = r#"
artifacts = [
    "README.md",
    { src = "app", dest = "streamlit" },
    { src = "src/**/*.py", dest = "python/" },
]

[hashing]
default_chunk_size = 8
"#;

/// Set up a project with a valid stage.toml
fn setup_project() -> TestProject {
    let project = TestProject::new();
    project.write_files(&[
        ("stage.toml", CONFIG),
        ("README.md", "# release notes"),
        ("app/streamlit_app.py", "import streamlit as st"),
        ("app/environment.yml", "dependencies: []"),
        ("src/module/util.py", "def util(): return 1"),
        ("src/main.py", "from module import util"),
    ]);
    project
}

fn stage_paths(items: &[&str]) -> BTreeSet<StagePath> {
    items.iter().map(|p| StagePath::from(*p)).collect()
}

#[test]
fn test_release_cycle() {
    // another test may have installed the subscriber first
    let _ = logging::init_with(LogOptions::default().verbose());
    let project = setup_project();
    let config = ArtifactsConfig::load(&project.path("stage.toml")).unwrap();

    let mut resolver = project.resolver();
    resolver.add_rules(&config.artifacts).unwrap();
    assert_eq!(build_bundle(&resolver).unwrap(), 5);
    assert_eq!(
        project.deployed_files(),
        vec![
            "README.md",
            "python/main.py",
            "python/util.py",
            "streamlit/environment.yml",
            "streamlit/streamlit_app.py",
        ]
    );

    // the stage reports multi-part hashes; the configured part size recovers them
    let stage = InMemoryStage::named("app_stage")
        .with_role("PUBLIC")
        .with_hash_mode(HashMode::MultiPart { chunk_size: 8 });
    let mut engine =
        ContentDiffEngine::new(stage).with_matcher(ContentHashMatcher::new(config.hashing));
    let location = StageLocation::parse("@db.schema.app_stage/v1").unwrap();
    let request = DeployRequest::new("DEPLOYER", location.clone()).with_prune(true);

    let first = deploy(&mut engine, &resolver, &request).unwrap();
    assert_eq!(first.only_local.len(), 5);
    assert_eq!(engine.stage().role(), "PUBLIC");

    let settled = engine.compute(resolver.deploy_root(), &location).unwrap();
    assert!(!settled.has_changes());
    assert_eq!(settled.identical.len(), 5);

    // second release: one file changes, one disappears
    project.write_file("app/streamlit_app.py", "import streamlit as st\nst.title('v2')");
    std::fs::remove_file(project.path("src/module/util.py")).unwrap();

    let mut resolver = project.resolver();
    resolver.add_rules(&config.artifacts).unwrap();
    clean_deploy_root(&resolver).unwrap();
    build_bundle(&resolver).unwrap();

    let second = deploy(&mut engine, &resolver, &request).unwrap();
    assert_eq!(second.different, stage_paths(&["streamlit/streamlit_app.py"]));
    assert_eq!(second.only_on_stage, stage_paths(&["python/util.py"]));
    assert!(second.only_local.is_empty());

    assert_eq!(
        engine.stage().files(),
        vec![
            "v1/README.md",
            "v1/python/main.py",
            "v1/streamlit/environment.yml",
            "v1/streamlit/streamlit_app.py",
        ]
    );
    assert!(
        !engine
            .compute(resolver.deploy_root(), &location)
            .unwrap()
            .has_changes()
    );
}

#[test]
fn test_partial_redeploy_touches_only_requested_artifacts() {
    let project = setup_project();
    let config = ArtifactsConfig::load(&project.path("stage.toml")).unwrap();
    let mut resolver = project.resolver();
    resolver.add_rules(&config.artifacts).unwrap();
    build_bundle(&resolver).unwrap();

    let mut engine = ContentDiffEngine::new(InMemoryStage::user());
    let location = StageLocation::parse("@~/release").unwrap();
    let request = DeployRequest::new("DEPLOYER", location).with_paths(["app"]);

    let applied = deploy(&mut engine, &resolver, &request).unwrap();

    assert_eq!(
        applied.only_local,
        stage_paths(&["streamlit/environment.yml", "streamlit/streamlit_app.py"])
    );
    assert_eq!(
        engine.stage().files(),
        vec![
            "release/streamlit/environment.yml",
            "release/streamlit/streamlit_app.py"
        ]
    );
}
