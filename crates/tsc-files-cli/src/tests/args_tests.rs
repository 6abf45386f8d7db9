use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::args::CliArgs;

#[test]
fn parses_defaults() {
    let args = CliArgs::try_parse_from(["tsc-files", "src/a.ts"]).expect("default args should parse");

    assert_eq!(args.files, vec!["src/a.ts".to_string()]);
    assert!(args.project.is_none());
    assert!(!args.emit);
    assert!(!args.use_tsc);
    assert!(!args.use_tsgo);
    assert_eq!(args.timeout, 30);

    let options = args.to_options();
    assert!(options.no_emit);
    assert!(options.fallback);
    assert!(!options.throw_on_error);
    assert_eq!(options.skip_lib_check, None);
    assert_eq!(options.include, None);
    assert_eq!(options.timeout, Duration::from_secs(30));
}

#[test]
fn parses_common_flags() {
    let args = CliArgs::try_parse_from([
        "tsc-files",
        "-p",
        "configs/tsconfig.json",
        "--cwd",
        "packages/app",
        "--skipLibCheck",
        "--cache-dir",
        "/tmp/tsc-files",
        "--use-tsgo",
        "--no-fallback",
        "--include",
        "src/globals.d.ts,src/env.d.ts",
        "--timeout",
        "90",
        "-v",
        "src/a.ts",
        "src/**/*.tsx",
    ])
    .expect("flagged args should parse");

    assert_eq!(
        args.project.as_deref(),
        Some(Path::new("configs/tsconfig.json"))
    );
    assert_eq!(args.files.len(), 2);

    let options = args.to_options();
    assert_eq!(options.cwd, Some(PathBuf::from("packages/app")));
    assert_eq!(options.skip_lib_check, Some(true));
    assert_eq!(options.cache_dir, Some(PathBuf::from("/tmp/tsc-files")));
    assert!(options.use_primary_compiler);
    assert!(!options.use_standard_compiler);
    assert!(!options.fallback);
    assert!(options.verbose);
    assert_eq!(
        options.include,
        Some(vec![
            "src/globals.d.ts".to_string(),
            "src/env.d.ts".to_string()
        ])
    );
    assert_eq!(options.timeout, Duration::from_secs(90));
}

#[test]
fn emit_flag_disables_forced_no_emit() {
    let args = CliArgs::try_parse_from(["tsc-files", "--emit", "a.ts"]).unwrap();
    assert!(!args.to_options().no_emit);
}

#[test]
fn compiler_flags_conflict() {
    let err = CliArgs::try_parse_from(["tsc-files", "--use-tsc", "--use-tsgo", "a.ts"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
}

#[test]
fn files_are_required() {
    let err = CliArgs::try_parse_from(["tsc-files"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}
