//! Config locator: finds a tsconfig for a directory and flattens its
//! `extends` chain into a single [`ResolvedConfig`].

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, trace};

use crate::error::CheckError;
use crate::fs::normalize_path;

pub const CONFIG_FILE_NAME: &str = "tsconfig.json";

/// compilerOptions holding paths relative to the document that declares them.
const PATH_VALUED_OPTIONS: &[&str] = &[
    "rootDir",
    "outDir",
    "outFile",
    "declarationDir",
    "tsBuildInfoFile",
];

/// Custom deserializer for boolean options that accepts both bool and string values.
/// This handles cases where tsconfig.json contains `"noEmit": "true"` instead of `"noEmit": true`.
fn deserialize_bool_or_string<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::String(s)) => {
            let normalized = s.trim().to_lowercase();
            match normalized.as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(Error::custom(format!(
                    "invalid boolean value: '{}'. Expected true, false, 'true', or 'false'",
                    s
                ))),
            }
        }
    }
}

/// A single tsconfig document as written on disk.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TsConfig {
    #[serde(default)]
    pub extends: Option<Extends>,
    #[serde(default)]
    pub compiler_options: Option<CompilerOptions>,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    #[serde(default)]
    pub files: Option<Vec<String>>,
    #[serde(default)]
    pub references: Option<Vec<ProjectReference>>,
}

/// `extends` accepts a single specifier or, since TypeScript 5.0, a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Extends {
    Single(String),
    Many(Vec<String>),
}

impl Extends {
    fn specifiers(&self) -> Vec<&str> {
        match self {
            Extends::Single(value) => vec![value.as_str()],
            Extends::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProjectReference {
    pub path: String,
}

/// compilerOptions with a typed field for every option this engine inspects.
/// Everything else lands in `other` and is passed through untouched.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<IndexMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_bool_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub allow_js: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_bool_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub check_js: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_bool_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub skip_lib_check: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_bool_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub no_emit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_roots: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleResolutionKind {
    Classic,
    Node,
    Node16,
    NodeNext,
    Bundler,
}

impl ModuleResolutionKind {
    pub fn parse(value: &str) -> Option<Self> {
        let kind = match normalize_option(value).as_str() {
            "classic" => ModuleResolutionKind::Classic,
            "node" | "node10" => ModuleResolutionKind::Node,
            "node16" => ModuleResolutionKind::Node16,
            "nodenext" => ModuleResolutionKind::NodeNext,
            "bundler" => ModuleResolutionKind::Bundler,
            _ => return None,
        };
        Some(kind)
    }
}

/// `include`/`exclude`/`files` entries together with the directory of the
/// document that declared them; TypeScript resolves them against that
/// directory, not against the leaf config.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileSpecs {
    pub base_dir: PathBuf,
    pub patterns: Vec<String>,
}

impl FileSpecs {
    /// Patterns anchored at `base_dir`, with forward slashes.
    pub fn absolute_patterns(&self) -> Vec<String> {
        self.patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.trim().replace('\\', "/");
                if Path::new(&pattern).is_absolute() {
                    pattern
                } else {
                    path_to_slash(&normalize_path(&self.base_dir.join(&pattern)))
                }
            })
            .collect()
    }
}

/// A tsconfig with its `extends` chain fully applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Absolute path of the leaf document.
    pub config_path: PathBuf,
    /// Flattened options. `baseUrl`, `typeRoots` and path-valued options are
    /// absolute.
    pub compiler_options: CompilerOptions,
    pub include: Option<FileSpecs>,
    pub exclude: Option<FileSpecs>,
    pub files: Option<FileSpecs>,
    /// Absolute paths of referenced project configs.
    pub references: Vec<PathBuf>,
    /// Directory of the document that declared `paths`.
    pub paths_base_dir: Option<PathBuf>,
    /// Every document read while resolving, leaf first.
    pub chain: Vec<PathBuf>,
}

impl ResolvedConfig {
    pub fn config_dir(&self) -> &Path {
        self.config_path.parent().unwrap_or_else(|| Path::new("/"))
    }

    pub fn module_resolution(&self) -> ModuleResolutionKind {
        if let Some(kind) = self
            .compiler_options
            .module_resolution
            .as_deref()
            .and_then(ModuleResolutionKind::parse)
        {
            return kind;
        }

        match self
            .compiler_options
            .module
            .as_deref()
            .map(normalize_option)
            .as_deref()
        {
            Some("node16") => ModuleResolutionKind::Node16,
            Some("nodenext") => ModuleResolutionKind::NodeNext,
            Some("preserve") => ModuleResolutionKind::Bundler,
            _ => ModuleResolutionKind::Node,
        }
    }

    pub fn is_bundler_resolution(&self) -> bool {
        self.module_resolution() == ModuleResolutionKind::Bundler
    }

    pub fn allow_js(&self) -> bool {
        self.compiler_options.allow_js.unwrap_or(false)
            || self.compiler_options.check_js.unwrap_or(false)
    }

    /// Directory relative `paths` targets are resolved against: `baseUrl`
    /// when set, otherwise the document that declared `paths`.
    pub fn paths_anchor(&self) -> PathBuf {
        if let Some(base_url) = self.compiler_options.base_url.as_deref() {
            return PathBuf::from(base_url);
        }
        self.paths_base_dir
            .clone()
            .unwrap_or_else(|| self.config_dir().to_path_buf())
    }

    /// Absolute exclude patterns, falling back to TypeScript's defaults.
    pub fn exclude_patterns(&self) -> Vec<String> {
        match &self.exclude {
            Some(specs) => specs.absolute_patterns(),
            None => {
                let mut defaults = vec![
                    path_to_slash(&self.config_dir().join("node_modules")),
                    path_to_slash(&self.config_dir().join("bower_components")),
                    path_to_slash(&self.config_dir().join("jspm_packages")),
                ];
                if let Some(Value::String(out_dir)) = self.compiler_options.other.get("outDir") {
                    defaults.push(out_dir.replace('\\', "/"));
                }
                defaults
            }
        }
    }

    /// Absolute include patterns, falling back to `**/*` under the config dir.
    pub fn include_patterns(&self) -> Vec<String> {
        match &self.include {
            Some(specs) => specs.absolute_patterns(),
            None if self.files.is_some() => Vec::new(),
            None => vec![path_to_slash(&self.config_dir().join("**/*"))],
        }
    }
}

/// Walk from `start_dir` up to the filesystem root looking for a tsconfig.json.
pub fn find_config_upward(start_dir: &Path) -> Option<PathBuf> {
    start_dir.ancestors().find_map(|dir| {
        let candidate = dir.join(CONFIG_FILE_NAME);
        candidate
            .is_file()
            .then(|| canonicalize_or_owned(&candidate))
    })
}

/// Resolve the tsconfig governing `start_dir`, honouring an explicit path.
pub fn resolve_config_path(start_dir: &Path, explicit: Option<&Path>) -> Result<PathBuf, CheckError> {
    let Some(project) = explicit else {
        return find_config_upward(start_dir).ok_or_else(|| CheckError::ConfigNotFound {
            path: start_dir.to_path_buf(),
            searched_upward: true,
        });
    };

    let mut candidate = if project.is_absolute() {
        project.to_path_buf()
    } else {
        start_dir.join(project)
    };

    if candidate.is_dir() {
        candidate = candidate.join(CONFIG_FILE_NAME);
    }

    if !candidate.is_file() {
        return Err(CheckError::ConfigNotFound {
            path: normalize_path(&candidate),
            searched_upward: false,
        });
    }

    Ok(canonicalize_or_owned(&candidate))
}

pub fn parse_tsconfig(source: &str) -> Result<TsConfig, serde_json::Error> {
    let stripped = strip_jsonc(source);
    let normalized = remove_trailing_commas(&stripped);
    let normalized = normalized.trim_start_matches('\u{feff}');
    if normalized.trim().is_empty() {
        return Ok(TsConfig::default());
    }
    serde_json::from_str(normalized)
}

/// Load `path` and flatten its extends chain.
pub fn load_tsconfig(path: &Path) -> Result<ResolvedConfig, CheckError> {
    let config_path = canonicalize_or_owned(path);
    let mut stack = Vec::new();
    let mut chain = Vec::new();
    let layer = load_layer(&config_path, &mut stack, &mut chain)?;

    let references = layer
        .references
        .iter()
        .map(|reference| resolve_reference_path(&config_path, &reference.path))
        .collect();

    Ok(ResolvedConfig {
        config_path,
        compiler_options: layer.compiler_options,
        include: layer.include,
        exclude: layer.exclude,
        files: layer.files,
        references,
        paths_base_dir: layer.paths_base_dir,
        chain,
    })
}

/// A partially flattened document: this document merged over its bases.
#[derive(Debug, Default)]
struct Layer {
    compiler_options: CompilerOptions,
    include: Option<FileSpecs>,
    exclude: Option<FileSpecs>,
    files: Option<FileSpecs>,
    paths_base_dir: Option<PathBuf>,
    references: Vec<ProjectReference>,
}

fn load_layer(
    path: &Path,
    stack: &mut Vec<PathBuf>,
    chain: &mut Vec<PathBuf>,
) -> Result<Layer, CheckError> {
    let canonical = canonicalize_or_owned(path);
    if let Some(position) = stack.iter().position(|entry| entry == &canonical) {
        let mut cycle = stack[position..].to_vec();
        cycle.push(canonical);
        return Err(CheckError::CircularExtends { chain: cycle });
    }

    let source = std::fs::read_to_string(&canonical).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            CheckError::ConfigNotFound {
                path: canonical.clone(),
                searched_upward: false,
            }
        } else {
            CheckError::io(format!("failed to read tsconfig {}", canonical.display()), err)
        }
    })?;
    let config = parse_tsconfig(&source).map_err(|err| CheckError::ConfigParse {
        path: canonical.clone(),
        message: err.to_string(),
    })?;
    trace!(path = %canonical.display(), "read tsconfig");

    stack.push(canonical.clone());
    chain.push(canonical.clone());

    let dir = canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    let mut base = Layer::default();
    if let Some(extends) = config.extends.as_ref() {
        for specifier in extends.specifiers() {
            let base_path = resolve_extends_path(&canonical, specifier)?;
            debug!(
                from = %canonical.display(),
                to = %base_path.display(),
                "following tsconfig extends"
            );
            let parent = load_layer(&base_path, stack, chain)?;
            base = merge_layers(base, parent);
        }
    }

    stack.pop();

    let own = own_layer(config, &dir);
    let mut merged = merge_layers(base, own.0);
    // references are never inherited through extends
    merged.references = own.1;
    Ok(merged)
}

/// Anchor a document's relative options at its own directory.
fn own_layer(config: TsConfig, dir: &Path) -> (Layer, Vec<ProjectReference>) {
    let mut options = config.compiler_options.unwrap_or_default();
    let paths_base_dir = options.paths.as_ref().map(|_| dir.to_path_buf());

    if let Some(base_url) = options.base_url.take() {
        let trimmed = base_url.trim();
        if !trimmed.is_empty() {
            options.base_url = Some(anchor(dir, trimmed));
        }
    }

    if let Some(type_roots) = options.type_roots.take() {
        options.type_roots = Some(
            type_roots
                .iter()
                .map(|root| root.trim())
                .filter(|root| !root.is_empty())
                .map(|root| anchor(dir, root))
                .collect(),
        );
    }

    for key in PATH_VALUED_OPTIONS {
        if let Some(Value::String(value)) = options.other.get_mut(*key)
            && !value.trim().is_empty()
        {
            *value = anchor(dir, value.trim());
        }
    }
    if let Some(Value::Array(root_dirs)) = options.other.get_mut("rootDirs") {
        for entry in root_dirs.iter_mut() {
            if let Value::String(value) = entry {
                *value = anchor(dir, value.trim());
            }
        }
    }

    let specs = |patterns: Option<Vec<String>>| {
        patterns.map(|patterns| FileSpecs {
            base_dir: dir.to_path_buf(),
            patterns,
        })
    };

    let layer = Layer {
        compiler_options: options,
        include: specs(config.include),
        exclude: specs(config.exclude),
        files: specs(config.files),
        paths_base_dir,
        references: Vec::new(),
    };
    (layer, config.references.unwrap_or_default())
}

/// Merge `child` over `base`: scalar options override field by field, list
/// fields (`include`, `exclude`, `files`) are replaced wholesale.
fn merge_layers(base: Layer, child: Layer) -> Layer {
    let paths_base_dir = if child.compiler_options.paths.is_some() {
        child.paths_base_dir
    } else {
        base.paths_base_dir
    };

    Layer {
        compiler_options: merge_compiler_options(base.compiler_options, child.compiler_options),
        include: child.include.or(base.include),
        exclude: child.exclude.or(base.exclude),
        files: child.files.or(base.files),
        paths_base_dir,
        references: child.references,
    }
}

fn merge_compiler_options(base: CompilerOptions, child: CompilerOptions) -> CompilerOptions {
    let mut other = base.other;
    for (key, value) in child.other {
        other.insert(key, value);
    }

    CompilerOptions {
        paths: child.paths.or(base.paths),
        base_url: child.base_url.or(base.base_url),
        module_resolution: child.module_resolution.or(base.module_resolution),
        module: child.module.or(base.module),
        allow_js: child.allow_js.or(base.allow_js),
        check_js: child.check_js.or(base.check_js),
        skip_lib_check: child.skip_lib_check.or(base.skip_lib_check),
        no_emit: child.no_emit.or(base.no_emit),
        type_roots: child.type_roots.or(base.type_roots),
        types: child.types.or(base.types),
        other,
    }
}

fn resolve_extends_path(current_path: &Path, extends: &str) -> Result<PathBuf, CheckError> {
    let base_dir = current_path.parent().unwrap_or_else(|| Path::new("/"));
    let extends = extends.trim();

    let is_path = extends.starts_with("./")
        || extends.starts_with("../")
        || extends.starts_with(".\\")
        || extends.starts_with("..\\")
        || Path::new(extends).is_absolute();

    if is_path {
        let candidate = normalize_path(&base_dir.join(extends));
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !extends.ends_with(".json") {
            let with_json = PathBuf::from(format!("{}.json", candidate.display()));
            if with_json.is_file() {
                return Ok(with_json);
            }
        }
        return Err(CheckError::ConfigNotFound {
            path: candidate,
            searched_upward: false,
        });
    }

    resolve_package_extends(base_dir, extends).ok_or_else(|| CheckError::ConfigNotFound {
        path: base_dir.join("node_modules").join(extends),
        searched_upward: false,
    })
}

#[derive(Deserialize)]
struct PackageJsonTsconfig {
    #[serde(default)]
    tsconfig: Option<String>,
}

/// Resolve a package-provided base config (`"extends": "@tsconfig/node20"`)
/// by walking up through `node_modules` directories.
fn resolve_package_extends(base_dir: &Path, specifier: &str) -> Option<PathBuf> {
    for dir in base_dir.ancestors() {
        let node_modules = dir.join("node_modules");
        if !node_modules.is_dir() {
            continue;
        }
        let target = node_modules.join(specifier);

        let mut candidates = Vec::new();
        if specifier.ends_with(".json") {
            candidates.push(target.clone());
        } else {
            candidates.push(PathBuf::from(format!("{}.json", target.display())));
            if let Some(field) = read_package_tsconfig_field(&target.join("package.json")) {
                candidates.push(target.join(field));
            }
            candidates.push(target.join(CONFIG_FILE_NAME));
        }

        if let Some(found) = candidates.into_iter().find(|candidate| candidate.is_file()) {
            return Some(canonicalize_or_owned(&found));
        }
    }
    None
}

fn read_package_tsconfig_field(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let package: PackageJsonTsconfig = serde_json::from_str(&text).ok()?;
    package.tsconfig
}

fn resolve_reference_path(config_path: &Path, reference: &str) -> PathBuf {
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("/"));
    let candidate = normalize_path(&base_dir.join(reference));
    if candidate.extension().is_some_and(|ext| ext == "json") {
        candidate
    } else {
        candidate.join(CONFIG_FILE_NAME)
    }
}

#[derive(Debug, Clone)]
struct CachedConfig {
    stamps: Vec<(PathBuf, Option<SystemTime>)>,
    config: Arc<ResolvedConfig>,
}

/// Config locator with a resolved-config cache keyed by absolute config path.
///
/// An entry is reused only while every document in its extends chain keeps
/// the modification time it had when the entry was written.
#[derive(Debug, Default)]
pub struct ConfigLocator {
    cache: DashMap<PathBuf, CachedConfig>,
}

impl ConfigLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate and resolve the config for `start_dir`, honouring an explicit path.
    pub fn locate(
        &self,
        start_dir: &Path,
        explicit: Option<&Path>,
    ) -> Result<Arc<ResolvedConfig>, CheckError> {
        let path = resolve_config_path(start_dir, explicit)?;
        self.load(&path)
    }

    /// Resolve an already located config path, using the cache when fresh.
    pub fn load(&self, path: &Path) -> Result<Arc<ResolvedConfig>, CheckError> {
        let key = canonicalize_or_owned(path);
        if let Some(entry) = self.cache.get(&key) {
            if entry
                .stamps
                .iter()
                .all(|(file, stamp)| modified_time(file) == *stamp)
            {
                trace!(path = %key.display(), "config cache hit");
                return Ok(Arc::clone(&entry.config));
            }
            debug!(path = %key.display(), "config cache entry is stale");
        }

        let config = Arc::new(load_tsconfig(&key)?);
        let stamps = config
            .chain
            .iter()
            .map(|file| (file.clone(), modified_time(file)))
            .collect();
        self.cache.insert(
            key,
            CachedConfig {
                stamps,
                config: Arc::clone(&config),
            },
        );
        Ok(config)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

pub(crate) fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

pub(crate) fn canonicalize_or_owned(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| normalize_path(path))
}

pub(crate) fn path_to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn anchor(dir: &Path, value: &str) -> String {
    let value = value.replace('\\', "/");
    if Path::new(&value).is_absolute() {
        value
    } else {
        path_to_slash(&normalize_path(&dir.join(value)))
    }
}

fn normalize_option(value: &str) -> String {
    let mut normalized = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '-' || ch == '_' || ch.is_whitespace() {
            continue;
        }
        normalized.push(ch.to_ascii_lowercase());
    }
    normalized
}

fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(ch) = chars.next() {
        if in_line_comment {
            if ch == '\n' {
                in_line_comment = false;
                out.push(ch);
            }
            continue;
        }

        if in_block_comment {
            if ch == '*' {
                if let Some('/') = chars.peek().copied() {
                    chars.next();
                    in_block_comment = false;
                }
            } else if ch == '\n' {
                out.push(ch);
            }
            continue;
        }

        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
            out.push(ch);
            continue;
        }

        if ch == '/'
            && let Some(&next) = chars.peek()
        {
            if next == '/' {
                chars.next();
                in_line_comment = true;
                continue;
            }
            if next == '*' {
                chars.next();
                in_block_comment = true;
                continue;
            }
        }

        out.push(ch);
    }

    out
}

fn remove_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
            out.push(ch);
            continue;
        }

        if ch == ',' {
            let mut lookahead = chars.clone();
            while lookahead.peek().is_some_and(|next| next.is_whitespace()) {
                lookahead.next();
            }
            if matches!(lookahead.peek(), Some('}') | Some(']')) {
                continue;
            }
        }

        out.push(ch);
    }

    out
}
