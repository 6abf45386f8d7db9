//! Decides whether the primary compiler (`tsgo`) can honour a configuration.

use serde::Serialize;

use crate::config::ResolvedConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    pub compatible: bool,
    pub incompatible_features: Vec<String>,
    pub recommendation: String,
}

/// Check a resolved config against the primary compiler's known limitations.
///
/// `tsgo` cannot combine `baseUrl`-relative path mapping with non-bundler
/// module resolution. Under `"bundler"` resolution `paths` and `baseUrl` are
/// always accepted.
pub fn analyze(config: &ResolvedConfig) -> CompatibilityResult {
    let options = &config.compiler_options;
    let mut incompatible_features = Vec::new();

    if !config.is_bundler_resolution() {
        let has_paths = options.paths.is_some();
        let has_base_url = options
            .base_url
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty());
        if has_paths || has_base_url {
            incompatible_features.push("baseUrl".to_string());
        }
    }

    if incompatible_features.is_empty() {
        CompatibilityResult {
            compatible: true,
            incompatible_features,
            recommendation: "configuration is compatible with tsgo".to_string(),
        }
    } else {
        let recommendation = format!(
            "tsgo does not support {} with moduleResolution \"{}\"; switch to \"moduleResolution\": \"bundler\" or pass --use-tsc",
            incompatible_features.join(", "),
            options.module_resolution.as_deref().unwrap_or("node10"),
        );
        CompatibilityResult {
            compatible: false,
            incompatible_features,
            recommendation,
        }
    }
}
