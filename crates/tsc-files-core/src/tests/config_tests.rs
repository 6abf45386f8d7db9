use serde_json::json;
use std::path::PathBuf;

use crate::config::{ConfigLocator, find_config_upward, load_tsconfig, parse_tsconfig, resolve_config_path};
use crate::error::{CheckError, ExitCode};
use crate::test_support::{Project, touch_later};

#[test]
fn accepts_comments_and_trailing_commas() {
    let source = r#"{
  // line comment
  "compilerOptions": {
    /* block */ "strict": true,
    "paths": { "@/*": ["./src/*",], },
  },
  "include": ["src", "https://not-a-comment",],
}"#;
    let config = parse_tsconfig(source).unwrap();
    let options = config.compiler_options.unwrap();
    assert_eq!(options.other.get("strict"), Some(&json!(true)));
    assert_eq!(options.paths.unwrap()["@/*"], vec!["./src/*".to_string()]);
    assert_eq!(
        config.include.unwrap(),
        vec!["src".to_string(), "https://not-a-comment".to_string()]
    );
}

#[test]
fn malformed_config_is_a_parse_error_naming_the_path() {
    let project = Project::new();
    let path = project.write("tsconfig.json", "{ \"compilerOptions\": ");
    let err = load_tsconfig(&path).unwrap_err();
    match &err {
        CheckError::ConfigParse { path: reported, .. } => assert_eq!(reported, &path),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code(), ExitCode::ConfigError);
}

#[test]
fn extends_chain_overrides_field_by_field() {
    let project = Project::new();
    project.write(
        "configs/z.json",
        r#"{ "compilerOptions": { "strict": false, "target": "es5" }, "include": ["lib"] }"#,
    );
    project.write(
        "configs/y.json",
        r#"{ "extends": "./z.json", "compilerOptions": { "strict": true }, "include": ["src"], "exclude": ["src/legacy"] }"#,
    );
    let leaf = project.write(
        "tsconfig.json",
        r#"{ "extends": "./configs/y", "compilerOptions": { "noImplicitAny": true } }"#,
    );

    let config = load_tsconfig(&leaf).unwrap();
    let other = &config.compiler_options.other;
    assert_eq!(other.get("strict"), Some(&json!(true)));
    assert_eq!(other.get("target"), Some(&json!("es5")));
    assert_eq!(other.get("noImplicitAny"), Some(&json!(true)));

    // include comes wholesale from y and stays anchored at y's directory
    let configs_dir = project.path("configs");
    assert_eq!(
        config.include_patterns(),
        vec![format!("{}/src", configs_dir.display())]
    );
    assert_eq!(
        config.exclude_patterns(),
        vec![format!("{}/src/legacy", configs_dir.display())]
    );
    assert_eq!(config.chain.len(), 3);
    assert_eq!(config.chain[0], leaf);
}

#[test]
fn leaf_include_replaces_base_include() {
    let project = Project::new();
    project.write("base.json", r#"{ "include": ["a", "b"] }"#);
    let leaf = project.write("tsconfig.json", r#"{ "extends": "./base.json", "include": ["c"] }"#);
    let config = load_tsconfig(&leaf).unwrap();
    assert_eq!(
        config.include_patterns(),
        vec![format!("{}/c", project.root().display())]
    );
}

#[test]
fn circular_extends_is_detected() {
    let project = Project::new();
    let a = project.write("a.json", r#"{ "extends": "./b.json" }"#);
    project.write("b.json", r#"{ "extends": "./a.json" }"#);

    let err = load_tsconfig(&a).unwrap_err();
    match &err {
        CheckError::CircularExtends { chain } => {
            assert_eq!(chain.len(), 3);
            assert_eq!(chain.first(), chain.last());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("a.json"));
    assert!(err.is_config_error());
}

#[test]
fn array_extends_applies_left_to_right() {
    let project = Project::new();
    project.write("one.json", r#"{ "compilerOptions": { "target": "es2017", "strict": false } }"#);
    project.write("two.json", r#"{ "compilerOptions": { "target": "es2022" } }"#);
    let leaf = project.write("tsconfig.json", r#"{ "extends": ["./one.json", "./two.json"] }"#);
    let config = load_tsconfig(&leaf).unwrap();
    assert_eq!(config.compiler_options.other.get("target"), Some(&json!("es2022")));
    assert_eq!(config.compiler_options.other.get("strict"), Some(&json!(false)));
}

#[test]
fn package_extends_resolves_through_node_modules() {
    let project = Project::new();
    project.write(
        "node_modules/@tsconfig/strictest/tsconfig.json",
        r#"{ "compilerOptions": { "strict": true, "exactOptionalPropertyTypes": true } }"#,
    );
    project.write(
        "node_modules/shared-config/package.json",
        r#"{ "name": "shared-config", "tsconfig": "configs/base.json" }"#,
    );
    project.write(
        "node_modules/shared-config/configs/base.json",
        r#"{ "compilerOptions": { "target": "es2020" } }"#,
    );
    let leaf = project.write(
        "packages/app/tsconfig.json",
        r#"{ "extends": ["@tsconfig/strictest/tsconfig.json", "shared-config"] }"#,
    );

    let config = load_tsconfig(&leaf).unwrap();
    let other = &config.compiler_options.other;
    assert_eq!(other.get("strict"), Some(&json!(true)));
    assert_eq!(other.get("exactOptionalPropertyTypes"), Some(&json!(true)));
    assert_eq!(other.get("target"), Some(&json!("es2020")));
}

#[test]
fn missing_extends_target_is_config_not_found() {
    let project = Project::new();
    let leaf = project.write("tsconfig.json", r#"{ "extends": "./nope.json" }"#);
    let err = load_tsconfig(&leaf).unwrap_err();
    assert!(matches!(err, CheckError::ConfigNotFound { .. }));
}

#[test]
fn base_relative_options_are_anchored_at_their_declaring_config() {
    let project = Project::new();
    project.write(
        "shared/tsconfig.base.json",
        r#"{ "compilerOptions": { "baseUrl": ".", "typeRoots": ["./types"], "outDir": "../dist", "paths": { "@/*": ["src/*"] } } }"#,
    );
    let leaf = project.write(
        "app/tsconfig.json",
        r#"{ "extends": "../shared/tsconfig.base.json" }"#,
    );

    let config = load_tsconfig(&leaf).unwrap();
    let shared = project.path("shared");
    assert_eq!(
        config.compiler_options.base_url.as_deref(),
        Some(shared.to_str().unwrap())
    );
    assert_eq!(
        config.compiler_options.type_roots,
        Some(vec![format!("{}/types", shared.display())])
    );
    assert_eq!(
        config.compiler_options.other.get("outDir"),
        Some(&json!(format!("{}/dist", project.root().display())))
    );
    assert_eq!(config.paths_base_dir, Some(shared.clone()));
    assert_eq!(config.paths_anchor(), shared);
}

#[test]
fn references_are_resolved_and_not_inherited() {
    let project = Project::new();
    project.write(
        "base.json",
        r#"{ "references": [{ "path": "./ignored" }] }"#,
    );
    let leaf = project.write(
        "tsconfig.json",
        r#"{ "extends": "./base.json", "references": [{ "path": "./packages/lib" }, { "path": "./tools/tsconfig.build.json" }] }"#,
    );
    let config = load_tsconfig(&leaf).unwrap();
    assert_eq!(
        config.references,
        vec![
            project.path("packages/lib/tsconfig.json"),
            project.path("tools/tsconfig.build.json"),
        ]
    );
}

#[test]
fn finds_nearest_config_walking_upward() {
    let project = Project::new();
    let root_config = project.write("tsconfig.json", "{}");
    let nested_config = project.write("packages/a/tsconfig.json", "{}");
    project.write("packages/a/src/deep/file.ts", "");
    project.write("packages/b/src/file.ts", "");

    assert_eq!(
        find_config_upward(&project.path("packages/a/src/deep")),
        Some(nested_config)
    );
    assert_eq!(
        find_config_upward(&project.path("packages/b/src")),
        Some(root_config)
    );
}

#[test]
fn explicit_project_path_must_exist() {
    let project = Project::new();
    let err = resolve_config_path(project.root(), Some(&PathBuf::from("missing/tsconfig.json")))
        .unwrap_err();
    match &err {
        CheckError::ConfigNotFound {
            path,
            searched_upward,
        } => {
            assert!(!searched_upward);
            assert_eq!(path, &project.path("missing/tsconfig.json"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.exit_code().code(), 2);
    assert!(err.to_string().contains("--project"));
}

#[test]
fn explicit_project_directory_means_its_tsconfig() {
    let project = Project::new();
    let config = project.write("packages/a/tsconfig.json", "{}");
    let resolved = resolve_config_path(project.root(), Some(&PathBuf::from("packages/a"))).unwrap();
    assert_eq!(resolved, config);
}

#[test]
fn locator_caches_until_a_chain_member_changes() {
    let project = Project::new();
    let base = project.write("base.json", r#"{ "compilerOptions": { "strict": false } }"#);
    project.write("tsconfig.json", r#"{ "extends": "./base.json" }"#);
    project.write("src/a.ts", "");

    let locator = ConfigLocator::new();
    let first = locator.locate(&project.path("src"), None).unwrap();
    let second = locator.locate(&project.path("src"), None).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(locator.cached_len(), 1);

    std::fs::write(&base, r#"{ "compilerOptions": { "strict": true } }"#).unwrap();
    touch_later(&base);
    let third = locator.locate(&project.path("src"), None).unwrap();
    assert!(!std::sync::Arc::ptr_eq(&first, &third));
    assert_eq!(third.compiler_options.other.get("strict"), Some(&json!(true)));
}
