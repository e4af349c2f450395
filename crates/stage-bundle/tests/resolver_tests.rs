//! Tests for artifact rule resolution and path lookups

use pretty_assertions::assert_eq;
use rstest::rstest;
use stage_bundle::{Error, MappingOptions, PathMappingResolver, PathRule};
use stage_test_utils::TestProject;
use std::path::{Path, PathBuf};

fn pb(path: &str) -> PathBuf {
    PathBuf::from(path)
}

fn mappings(resolver: &PathMappingResolver, options: MappingOptions) -> Vec<(PathBuf, PathBuf)> {
    resolver
        .all_mappings(options)
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn sample_project() -> TestProject {
    let project = TestProject::new();
    project.write_files(&[
        ("app/setup.sql", "create schema app;"),
        ("app/sub/x.py", "x = 1"),
        ("a/main.py", "main()"),
        ("a/b/file1.py", "one"),
        ("a/b/notes.txt", "notes"),
        ("README.md", "# readme"),
    ]);
    project
}

mod mapping_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_directory_rule_preserves_structure() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("app", Some("deployed")).unwrap();

        assert_eq!(
            mappings(&resolver, MappingOptions::expanded()),
            vec![
                (pb("app"), pb("deployed")),
                (pb("app/setup.sql"), pb("deployed/setup.sql")),
                (pb("app/sub"), pb("deployed/sub")),
                (pb("app/sub/x.py"), pb("deployed/sub/x.py")),
            ]
        );
        assert_eq!(
            mappings(&resolver, MappingOptions::default()),
            vec![(pb("app"), pb("deployed"))]
        );
    }

    #[test]
    fn test_recursive_glob_flattens_into_directory() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("a/**/*.py", Some("deployed/")).unwrap();

        assert_eq!(
            mappings(&resolver, MappingOptions::expanded()),
            vec![
                (pb("a/b/file1.py"), pb("deployed/file1.py")),
                (pb("a/main.py"), pb("deployed/main.py")),
            ]
        );
    }

    #[test]
    fn test_single_star_does_not_cross_directories() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("a/*.py", Some("py/")).unwrap();

        assert_eq!(resolver.all_sources(false), vec![pb("a/main.py")]);
    }

    #[test]
    fn test_mirrored_rule_keeps_project_layout() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add(&PathRule::mirrored("a/*.py")).unwrap();
        resolver.add(&PathRule::mirrored("README.md")).unwrap();

        assert_eq!(
            mappings(&resolver, MappingOptions::default()),
            vec![
                (pb("a/main.py"), pb("a/main.py")),
                (pb("README.md"), pb("README.md")),
            ]
        );
    }

    #[test]
    fn test_trailing_slash_places_file_inside_directory() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("README.md", Some("docs/")).unwrap();

        assert_eq!(
            resolver.to_deploy_paths(Path::new("README.md")),
            vec![pb("docs/README.md")]
        );
    }

    #[test]
    fn test_absolute_mappings_join_roots() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("README.md", Some("docs/")).unwrap();

        assert_eq!(
            mappings(&resolver, MappingOptions::default().absolute()),
            vec![(
                project.path("README.md"),
                project.deploy_root().join("docs").join("README.md")
            )]
        );
        assert_eq!(resolver.all_sources(true), vec![project.path("README.md")]);
    }

    #[test]
    fn test_predicate_filters_yielded_pairs_only() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("app", Some("deployed")).unwrap();

        let python: Vec<_> = resolver
            .all_mappings_where(MappingOptions::expanded(), |source, _| {
                source.extension().is_some_and(|ext| ext == "py")
            })
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(python, vec![(pb("app/sub/x.py"), pb("deployed/sub/x.py"))]);
    }

    #[rstest]
    #[case("app/../a/*.py")]
    #[case("./a/*.py")]
    #[case("a/./*.py")]
    fn test_glob_with_dotted_prefix_is_normalized(#[case] pattern: &str) {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule(pattern, Some("py/")).unwrap();

        assert_eq!(resolver.all_sources(false), vec![pb("a/main.py")]);
        assert_eq!(
            resolver.to_deploy_paths(Path::new("a/main.py")),
            vec![pb("py/main.py")]
        );
    }

    #[test]
    fn test_recursive_glob_skips_deploy_root() {
        let project = sample_project();
        project.write_file("output/deploy/stale.py", "stale");
        let mut resolver = project.resolver();
        resolver.add_rule("**/*.py", Some("all/")).unwrap();

        let sources = resolver.all_sources(false);
        assert!(!sources.iter().any(|s| s.starts_with("output")));
        assert_eq!(
            sources,
            vec![pb("a/b/file1.py"), pb("a/main.py"), pb("app/sub/x.py")]
        );
    }
}

mod lookup_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_through_directory_rule() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("app", Some("deployed")).unwrap();

        let deployed = resolver.to_deploy_paths(Path::new("app/sub/x.py"));
        assert_eq!(deployed, vec![pb("deployed/sub/x.py")]);
        assert_eq!(
            resolver.to_project_path(&deployed[0]),
            Some(pb("app/sub/x.py"))
        );
    }

    #[test]
    fn test_absolute_lookups_stay_absolute() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("app", Some("deployed")).unwrap();

        let deployed = resolver.to_deploy_paths(&project.path("app/setup.sql"));
        let expected = project.deploy_root().join("deployed").join("setup.sql");
        assert_eq!(deployed, vec![expected.clone()]);
        assert_eq!(
            resolver.to_project_path(&expected),
            Some(project.path("app/setup.sql"))
        );
    }

    #[test]
    fn test_fan_out_to_several_destinations() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("README.md", Some("x/README.md")).unwrap();
        resolver.add_rule("README.md", Some("y/")).unwrap();

        let deployed = resolver.to_deploy_paths(Path::new("README.md"));
        assert_eq!(deployed, vec![pb("x/README.md"), pb("y/README.md")]);
        for path in &deployed {
            assert_eq!(resolver.to_project_path(path), Some(pb("README.md")));
        }
        assert_eq!(resolver.all_sources(false), vec![pb("README.md")]);
    }

    #[test]
    fn test_directory_fan_in_resolves_by_existence() {
        let project = sample_project();
        project.write_file("lib/helpers.py", "def help(): ...");
        let mut resolver = project.resolver();
        resolver.add_rule("app", Some("deployed")).unwrap();
        resolver.add_rule("lib", Some("deployed")).unwrap();

        assert_eq!(
            resolver.to_project_path(Path::new("deployed/helpers.py")),
            Some(pb("lib/helpers.py"))
        );
        assert_eq!(
            resolver.to_project_path(Path::new("deployed/setup.sql")),
            Some(pb("app/setup.sql"))
        );
    }

    #[test]
    fn test_unknown_paths_yield_nothing() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("app", Some("deployed")).unwrap();

        assert!(resolver.to_deploy_paths(Path::new("README.md")).is_empty());
        assert!(resolver.to_deploy_paths(Path::new("/elsewhere/x")).is_empty());
        assert_eq!(resolver.to_project_path(Path::new("other/x.py")), None);
        assert_eq!(resolver.to_project_path(Path::new("deployed/nope.py")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_external_symlink_in_deploy_root_has_no_source() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("app", Some("deployed")).unwrap();
        stage_bundle::build_bundle(&resolver).unwrap();

        let link = project.deploy_root().join("deployed").join("linked.txt");
        std::os::unix::fs::symlink(project.path("README.md"), &link).unwrap();

        assert_eq!(resolver.to_project_path(&link), None);
    }
}

mod validation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case("missing.txt", None)]
    #[case("nothing/*.zz", Some("out/"))]
    #[case("a/*.rs", None)]
    fn test_unmatched_source_is_rejected(#[case] source: &str, #[case] dest: Option<&str>) {
        let project = sample_project();
        let mut resolver = project.resolver();

        assert!(matches!(
            resolver.add_rule(source, dest),
            Err(Error::SourceNotFound { .. })
        ));
        assert!(resolver.is_empty());
    }

    #[rstest]
    #[case("../outside.txt", None)]
    #[case("/etc/hosts", None)]
    #[case("README.md", Some("../escape.md"))]
    #[case("README.md", Some("/abs/readme.md"))]
    #[case("README.md", Some("."))]
    fn test_escaping_paths_are_rejected(#[case] source: &str, #[case] dest: Option<&str>) {
        let project = sample_project();
        let mut resolver = project.resolver();

        assert!(matches!(
            resolver.add_rule(source, dest),
            Err(Error::NotInDeployRoot { .. })
        ));
    }

    #[test]
    fn test_many_matches_onto_one_file_is_rejected() {
        let project = sample_project();
        project.write_file("a/other.py", "other()");
        let mut resolver = project.resolver();

        assert!(matches!(
            resolver.add_rule("a/*.py", Some("single.py")),
            Err(Error::TooManyFiles { .. })
        ));
    }

    #[rstest]
    #[case(("README.md", "out.md"), ("a/main.py", "out.md"))]
    #[case(("app", "deployed"), ("README.md", "deployed/README.md"))]
    #[case(("README.md", "deployed/README.md"), ("app", "deployed"))]
    fn test_colliding_destinations_are_rejected(
        #[case] first: (&str, &str),
        #[case] second: (&str, &str),
    ) {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule(first.0, Some(first.1)).unwrap();

        assert!(matches!(
            resolver.add_rule(second.0, Some(second.1)),
            Err(Error::TooManyFiles { .. })
        ));
    }

    #[rstest]
    #[case("app", "README.md")]
    #[case("README.md", "app")]
    fn test_conflicting_destination_types_are_rejected(
        #[case] first: &str,
        #[case] second: &str,
    ) {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule(first, Some("target")).unwrap();

        assert!(matches!(
            resolver.add_rule(second, Some("target")),
            Err(Error::Artifact { .. })
        ));
    }

    #[rstest]
    #[case::directory_then_file("app", "lib")]
    #[case::file_then_directory("lib", "app")]
    fn test_fan_in_with_conflicting_child_types_is_rejected(
        #[case] first: &str,
        #[case] second: &str,
    ) {
        let project = sample_project();
        // app/sub is a directory, lib/sub a file
        project.write_file("lib/sub", "not a directory");
        let mut resolver = project.resolver();
        resolver.add_rule(first, Some("deployed")).unwrap();

        assert!(matches!(
            resolver.add_rule(second, Some("deployed")),
            Err(Error::Artifact { .. })
        ));
        assert_eq!(resolver.all_sources(false), vec![pb(first)]);
    }

    #[test]
    fn test_fan_in_with_matching_child_types_builds() {
        let project = sample_project();
        project.write_file("lib/sub/y.py", "y = 2");
        let mut resolver = project.resolver();
        resolver.add_rule("app", Some("deployed")).unwrap();
        resolver.add_rule("lib", Some("deployed")).unwrap();

        stage_bundle::build_bundle(&resolver).unwrap();

        assert_eq!(
            project.deployed_files(),
            vec!["deployed/setup.sql", "deployed/sub/x.py", "deployed/sub/y.py"]
        );
        assert_eq!(
            resolver.to_project_path(Path::new("deployed/sub/y.py")),
            Some(pb("lib/sub/y.py"))
        );
    }

    #[test]
    fn test_repeated_rule_is_accepted() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("README.md", Some("docs/")).unwrap();
        resolver.add_rule("README.md", Some("docs/")).unwrap();

        assert_eq!(mappings(&resolver, MappingOptions::default()).len(), 1);
    }

    #[test]
    fn test_failed_rule_leaves_resolver_unchanged() {
        let project = sample_project();
        let mut resolver = project.resolver();
        resolver.add_rule("README.md", Some("flat/main.py")).unwrap();

        // a/b/file1.py would land first, then a/main.py collides
        let result = resolver.add_rule("a/**/*.py", Some("flat/"));

        assert!(matches!(result, Err(Error::TooManyFiles { .. })));
        assert!(
            resolver
                .to_deploy_paths(Path::new("a/b/file1.py"))
                .is_empty()
        );
        assert_eq!(resolver.all_sources(false), vec![pb("README.md")]);
    }

    #[test]
    fn test_sources_containing_deploy_root_are_rejected() {
        let project = sample_project();
        let mut resolver = project.resolver();

        assert!(matches!(
            resolver.add_rule("output", Some("out")),
            Err(Error::Artifact { .. })
        ));
        assert!(matches!(
            resolver.add_rule(".", Some("everything")),
            Err(Error::Artifact { .. })
        ));
    }

    #[test]
    fn test_invalid_glob_is_rejected() {
        let project = sample_project();
        let mut resolver = project.resolver();

        assert!(matches!(
            resolver.add_rule("a/[b.py", None),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_relative_root_is_rejected() {
        assert!(matches!(
            PathMappingResolver::new("relative/project", "/tmp"),
            Err(Error::InvalidRoot { .. })
        ));
    }
}
