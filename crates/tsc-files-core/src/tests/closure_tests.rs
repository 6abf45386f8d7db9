use std::path::{Path, PathBuf};

use crate::closure::{
    DependencyClosureEngine, DependencyClosureResult, DiscoveryHeuristics, DiscoveryLimits,
    DiscoveryRequest, NativeProgramHost, ProgramHost,
};
use crate::config::{ResolvedConfig, load_tsconfig};
use crate::temp_config::FileSelection;
use crate::test_support::{Project, touch_later};

#[derive(Debug)]
struct FailingHost;

impl ProgramHost for FailingHost {
    fn program_files(
        &self,
        _config: &ResolvedConfig,
        _root_files: &[PathBuf],
        _limits: &DiscoveryLimits,
    ) -> anyhow::Result<Vec<PathBuf>> {
        anyhow::bail!("program construction failed")
    }
}

#[derive(Debug)]
struct RootsOnlyHost;

impl ProgramHost for RootsOnlyHost {
    fn program_files(
        &self,
        _config: &ResolvedConfig,
        root_files: &[PathBuf],
        _limits: &DiscoveryLimits,
    ) -> anyhow::Result<Vec<PathBuf>> {
        Ok(root_files.to_vec())
    }
}

struct Discovery<'a> {
    project: &'a Project,
    config: ResolvedConfig,
    heuristics: DiscoveryHeuristics,
    limits: DiscoveryLimits,
}

impl<'a> Discovery<'a> {
    fn new(project: &'a Project) -> Self {
        let config = load_tsconfig(&project.path("tsconfig.json")).unwrap();
        Self {
            project,
            config,
            heuristics: DiscoveryHeuristics::default(),
            limits: DiscoveryLimits::default(),
        }
    }

    fn run(
        &self,
        engine: &DependencyClosureEngine,
        host: &dyn ProgramHost,
        roots: &[PathBuf],
        include: Option<&[PathBuf]>,
    ) -> DependencyClosureResult {
        engine.discover(
            host,
            &DiscoveryRequest {
                config: &self.config,
                root_files: roots,
                project_dir: self.project.root(),
                verbose: true,
                explicit_include: include,
                limits: self.limits,
                heuristics: &self.heuristics,
            },
        )
    }

    fn files(&self, roots: &[&str]) -> Vec<String> {
        let roots: Vec<PathBuf> = roots.iter().map(|root| self.project.path(root)).collect();
        let result = self.run(&DependencyClosureEngine::new(), &NativeProgramHost, &roots, None);
        assert!(result.discovered);
        relative(self.project.root(), &result.files)
    }
}

fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|file| {
            file.strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

#[test]
fn follows_transitive_imports() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("src/a.ts", "import { b } from './b';\nexport const a = b;\n");
    project.write("src/b.ts", "import { c } from './c.js';\nexport const b = c;\n");
    project.write("src/c.ts", "export const c = 1;\n");
    project.write("src/unrelated.ts", "export const u = 1;\n");

    let discovery = Discovery::new(&project);
    assert_eq!(
        discovery.files(&["src/a.ts"]),
        vec!["src/a.ts", "src/b.ts", "src/c.ts"]
    );
}

#[test]
fn import_cycles_terminate() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("src/a.ts", "import './b';\n");
    project.write("src/b.ts", "export * from './c';\n");
    project.write("src/c.ts", "import { a } from './a';\n");

    let discovery = Discovery::new(&project);
    assert_eq!(
        discovery.files(&["src/a.ts"]),
        vec!["src/a.ts", "src/b.ts", "src/c.ts"]
    );
}

#[test]
fn resolves_path_aliases_and_skips_packages() {
    let project = Project::new();
    project.write(
        "tsconfig.json",
        r#"{ "compilerOptions": { "moduleResolution": "bundler", "paths": { "@/*": ["./src/*"] } } }"#,
    );
    project.write(
        "src/a.ts",
        "import React from 'react';\nimport { util } from '@/lib/util';\nimport { vendored } from '../node_modules/vendored/index';\n",
    );
    project.write("src/lib/util.ts", "export const util = 1;\n");
    project.write("node_modules/react/index.d.ts", "export default {};\n");
    project.write("node_modules/vendored/index.ts", "export const vendored = 1;\n");

    let discovery = Discovery::new(&project);
    assert_eq!(
        discovery.files(&["src/a.ts"]),
        vec!["src/a.ts", "src/lib/util.ts"]
    );
}

#[test]
fn require_and_dynamic_imports_are_followed() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write(
        "src/a.ts",
        "const legacy = require('./legacy');\nconst lazy = () => import('./lazy');\n",
    );
    project.write("src/legacy.ts", "export = 1;\n");
    project.write("src/lazy/index.ts", "export const lazy = 1;\n");

    let discovery = Discovery::new(&project);
    assert_eq!(
        discovery.files(&["src/a.ts"]),
        vec!["src/a.ts", "src/lazy/index.ts", "src/legacy.ts"]
    );
}

#[test]
fn ambient_declarations_are_included_unless_excluded() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "exclude": ["node_modules", "vendor"] }"#);
    project.write("src/a.ts", "export const a = 1;\n");
    project.write("src/globals.d.ts", "declare const BUILD_ID: string;\n");
    project.write("types/env.d.ts", "declare const ENV: string;\n");
    project.write("vendor/legacy.d.ts", "declare const OLD: string;\n");
    project.write("node_modules/@types/node/index.d.ts", "");

    let discovery = Discovery::new(&project);
    assert_eq!(
        discovery.files(&["src/a.ts"]),
        vec!["src/a.ts", "src/globals.d.ts", "types/env.d.ts"]
    );
}

#[test]
fn discovery_is_idempotent_and_cached() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("src/a.ts", "import './b';\n");
    project.write("src/b.ts", "");
    project.write("src/global.d.ts", "");

    let discovery = Discovery::new(&project);
    let engine = DependencyClosureEngine::new();
    let roots = vec![project.path("src/a.ts")];
    let first = discovery.run(&engine, &NativeProgramHost, &roots, None);
    let second = discovery.run(&engine, &NativeProgramHost, &roots, None);

    assert_eq!(first, second);
    assert_eq!(first.ambient_count, 1);
    assert_eq!(engine.cache().len(), 1);

    // root order does not change the key
    let reversed = vec![project.path("src/a.ts"), project.path("src/a.ts")];
    let third = discovery.run(&engine, &NativeProgramHost, &reversed, None);
    assert_eq!(third.cache_key, first.cache_key);
}

#[test]
fn modified_files_invalidate_the_cache() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("src/a.ts", "import './b';\n");
    let b = project.write("src/b.ts", "");
    project.write("src/c.ts", "");

    let discovery = Discovery::new(&project);
    let engine = DependencyClosureEngine::new();
    let roots = vec![project.path("src/a.ts")];
    let before = discovery.run(&engine, &NativeProgramHost, &roots, None);
    assert_eq!(relative(project.root(), &before.files), vec!["src/a.ts", "src/b.ts"]);

    std::fs::write(&b, "import './c';\n").unwrap();
    touch_later(&b);
    let after = discovery.run(&engine, &NativeProgramHost, &roots, None);
    assert_eq!(
        relative(project.root(), &after.files),
        vec!["src/a.ts", "src/b.ts", "src/c.ts"]
    );
    assert_eq!(after.cache_key, before.cache_key);
}

#[test]
fn tsconfig_edits_invalidate_the_cache() {
    let project = Project::new();
    let tsconfig = project.write(
        "tsconfig.json",
        r#"{ "compilerOptions": { "moduleResolution": "bundler", "paths": { "@/*": ["./a/*"] } } }"#,
    );
    project.write("src/main.ts", "import { x } from '@/x';\n");
    project.write("a/x.ts", "export const x = 1;\n");
    project.write("b/x.ts", "export const x = 2;\n");

    let mut discovery = Discovery::new(&project);
    let engine = DependencyClosureEngine::new();
    let roots = vec![project.path("src/main.ts")];
    let before = discovery.run(&engine, &NativeProgramHost, &roots, None);
    assert_eq!(relative(project.root(), &before.files), vec!["a/x.ts", "src/main.ts"]);

    std::fs::write(
        &tsconfig,
        r#"{ "compilerOptions": { "moduleResolution": "bundler", "paths": { "@/*": ["./b/*"] } } }"#,
    )
    .unwrap();
    touch_later(&tsconfig);
    discovery.config = load_tsconfig(&tsconfig).unwrap();
    let after = discovery.run(&engine, &NativeProgramHost, &roots, None);
    assert_eq!(relative(project.root(), &after.files), vec!["b/x.ts", "src/main.ts"]);
    assert_eq!(after.cache_key, before.cache_key);
}

#[test]
fn limits_and_heuristics_are_part_of_the_cache_key() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("a.ts", "import './b';\n");
    project.write("b.ts", "import './c';\n");
    project.write("c.ts", "");

    let mut discovery = Discovery::new(&project);
    let engine = DependencyClosureEngine::new();
    let roots = vec![project.path("a.ts")];
    let full = discovery.run(&engine, &NativeProgramHost, &roots, None);
    assert_eq!(relative(project.root(), &full.files), vec!["a.ts", "b.ts", "c.ts"]);

    discovery.limits = DiscoveryLimits {
        max_depth: 1,
        max_files: 100,
    };
    let shallow = discovery.run(&engine, &NativeProgramHost, &roots, None);
    assert_ne!(shallow.cache_key, full.cache_key);
    assert_eq!(relative(project.root(), &shallow.files), vec!["a.ts", "b.ts"]);

    discovery.limits = DiscoveryLimits::default();
    discovery.heuristics.generated_suffixes.push(".out".to_string());
    let reconfigured = discovery.run(&engine, &NativeProgramHost, &roots, None);
    assert_ne!(reconfigured.cache_key, full.cache_key);
    assert_eq!(engine.cache().len(), 3);
}

#[test]
fn new_ambient_files_invalidate_the_cache() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("src/a.ts", "");

    let discovery = Discovery::new(&project);
    let engine = DependencyClosureEngine::new();
    let roots = vec![project.path("src/a.ts")];
    let before = discovery.run(&engine, &NativeProgramHost, &roots, None);
    assert_eq!(before.ambient_count, 0);

    project.write("src/added.d.ts", "declare const ADDED: 1;\n");
    let after = discovery.run(&engine, &NativeProgramHost, &roots, None);
    assert_eq!(after.ambient_count, 1);
    assert!(after.files.contains(&project.path("src/added.d.ts")));
}

#[test]
fn depth_limit_stops_traversal() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("a.ts", "import './b';\n");
    project.write("b.ts", "import './c';\n");
    project.write("c.ts", "import './d';\n");
    project.write("d.ts", "");

    let mut discovery = Discovery::new(&project);
    discovery.limits = DiscoveryLimits {
        max_depth: 2,
        max_files: 100,
    };
    assert_eq!(discovery.files(&["a.ts"]), vec!["a.ts", "b.ts", "c.ts"]);
}

#[test]
fn file_count_limit_stops_traversal() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("a.ts", "import './b';\n");
    project.write("b.ts", "import './c';\n");
    project.write("c.ts", "");

    let mut discovery = Discovery::new(&project);
    discovery.limits = DiscoveryLimits {
        max_depth: 50,
        max_files: 2,
    };
    assert_eq!(discovery.files(&["a.ts"]), vec!["a.ts", "b.ts"]);
}

#[test]
fn test_roots_pull_in_setup_files() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write(
        "vitest.config.ts",
        "export default { test: { setupFiles: ['./test/register.ts'] } };\n",
    );
    project.write("test/register.ts", "export {};\n");
    project.write("src/setupTests.ts", "export {};\n");
    project.write("src/a.test.ts", "import { a } from './a';\n");
    project.write("src/a.ts", "export const a = 1;\n");

    let discovery = Discovery::new(&project);
    let engine = DependencyClosureEngine::new();
    let result = discovery.run(
        &engine,
        &NativeProgramHost,
        &[project.path("src/a.test.ts")],
        None,
    );
    assert_eq!(
        relative(project.root(), &result.setup_files),
        vec!["src/setupTests.ts", "test/register.ts"]
    );
    assert!(result.files.contains(&project.path("test/register.ts")));
    assert!(result.files.contains(&project.path("src/a.ts")));

    let plain = discovery.run(&engine, &NativeProgramHost, &[project.path("src/a.ts")], None);
    assert!(plain.setup_files.is_empty());
}

#[test]
fn custom_heuristics_replace_the_defaults() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("checks/a.check.ts", "");
    project.write("checks/bootstrap.ts", "");

    let mut discovery = Discovery::new(&project);
    discovery.heuristics = DiscoveryHeuristics {
        test_file_globs: vec!["**/*.check.ts".to_string()],
        setup_file_globs: vec!["checks/bootstrap.ts".to_string()],
        runner_config_files: Vec::new(),
        generated_suffixes: Vec::new(),
    };
    let result = discovery.run(
        &DependencyClosureEngine::new(),
        &NativeProgramHost,
        &[project.path("checks/a.check.ts")],
        None,
    );
    assert_eq!(result.setup_files, vec![project.path("checks/bootstrap.ts")]);
}

#[test]
fn explicit_include_disables_heuristics() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write("src/setupTests.ts", "");
    project.write("src/a.test.ts", "const cjs = require('./cjs');\n");
    project.write("src/cjs.ts", "");
    project.write("src/extra.ts", "");

    let discovery = Discovery::new(&project);
    let include = vec![project.path("src/extra.ts")];
    let result = discovery.run(
        &DependencyClosureEngine::new(),
        &NativeProgramHost,
        &[project.path("src/a.test.ts")],
        Some(&include),
    );
    assert!(result.discovered);
    assert!(result.setup_files.is_empty());
    assert_eq!(
        relative(project.root(), &result.files),
        vec!["src/a.test.ts", "src/extra.ts"]
    );
}

#[test]
fn generated_files_behind_type_only_imports_are_included() {
    let project = Project::new();
    project.write("tsconfig.json", "{}");
    project.write(
        "src/router.ts",
        "import type { FileRoutes } from './routeTree.gen';\nexport type R = FileRoutes;\n",
    );
    project.write("src/routeTree.gen.ts", "export interface FileRoutes {}\n");
    project.write("src/other.gen.ts", "export interface Other {}\n");

    let discovery = Discovery::new(&project);
    let result = discovery.run(
        &DependencyClosureEngine::new(),
        &RootsOnlyHost,
        &[project.path("src/router.ts")],
        Some(&[]),
    );
    assert_eq!(
        relative(project.root(), &result.files),
        vec!["src/routeTree.gen.ts", "src/router.ts"]
    );
}

#[test]
fn discovery_failure_falls_back_to_include_patterns() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "include": ["src"] }"#);
    project.write("src/a.ts", "");

    let discovery = Discovery::new(&project);
    let roots = vec![project.path("src/a.ts")];
    let result = discovery.run(&DependencyClosureEngine::new(), &FailingHost, &roots, None);

    assert!(!result.discovered);
    assert_eq!(result.files, roots);
    let expected_include = vec![format!("{}/src", project.root().display())];
    assert_eq!(result.include_patterns, expected_include);
    assert_eq!(
        result.selection(&roots),
        FileSelection::Patterns {
            include: expected_include,
            files: roots.clone(),
        }
    );
}
