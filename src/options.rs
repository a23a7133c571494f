//! Plugin configuration.
//!
//! Two layers: `IncludeCssOptions` is the typed Rust surface (it can carry
//! closures and stage objects), `IncludeCssConfig` is the serde/JSON surface
//! used by native bindings and config files. The JSON keys keep the names
//! bundler configs already use (`modulesRoot`, `postcssPlugins`,
//! `postcssModulesOptions`).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{PluginError, Result};
use crate::scoping::ClassMap;
use crate::stages::{builtin_stage, CssStage};

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPING OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Receives the absolute file path and the class map of every compiled module.
pub type GetJson = Arc<dyn Fn(&str, &ClassMap) + Send + Sync>;

/// Custom scoped-name generator.
pub type ScopedNameFn = Arc<dyn Fn(&ScopedNameInput) -> String + Send + Sync>;

/// Everything a scoped-name generator may look at.
#[derive(Debug, Clone, Copy)]
pub struct ScopedNameInput<'a> {
    pub local: &'a str,
    pub file: &'a str,
    pub css: &'a str,
}

/// How local identifiers are renamed.
#[derive(Clone, Default)]
pub enum ScopedName {
    /// `_<local>_<hash>_<line>`, compatible with `postcss-modules`.
    #[default]
    Default,
    /// Template with `[name]`, `[local]`, `[hash]` and `[hash:N]` placeholders.
    Pattern(String),
    Custom(ScopedNameFn),
}

impl fmt::Debug for ScopedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopedName::Default => write!(f, "Default"),
            ScopedName::Pattern(p) => f.debug_tuple("Pattern").field(p).finish(),
            ScopedName::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

/// Whether bare selectors are local or global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeBehaviour {
    #[default]
    Local,
    Global,
}

/// Rewrites exported class-map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocalsConvention {
    /// Keep the original key and add a camelCase alias.
    CamelCase,
    CamelCaseOnly,
    /// Keep the original key and add an alias with only dashes camelized.
    Dashes,
    DashesOnly,
}

#[derive(Clone, Default)]
pub struct ModulesOptions {
    pub get_json: Option<GetJson>,
    pub generate_scoped_name: ScopedName,
    pub hash_prefix: String,
    pub scope_behaviour: ScopeBehaviour,
    pub locals_convention: Option<LocalsConvention>,
    /// Files matching any of these are scoped as if `scope_behaviour` were `Global`.
    pub global_module_paths: Vec<Regex>,
}

impl ModulesOptions {
    pub fn behaviour_for(&self, file: &str) -> ScopeBehaviour {
        if self.global_module_paths.iter().any(|re| re.is_match(file)) {
            ScopeBehaviour::Global
        } else {
            self.scope_behaviour
        }
    }
}

impl fmt::Debug for ModulesOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModulesOptions")
            .field("get_json", &self.get_json.as_ref().map(|_| "<fn>"))
            .field("generate_scoped_name", &self.generate_scoped_name)
            .field("hash_prefix", &self.hash_prefix)
            .field("scope_behaviour", &self.scope_behaviour)
            .field("locals_convention", &self.locals_convention)
            .field("global_module_paths", &self.global_module_paths)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLUGIN OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Default)]
pub struct IncludeCssOptions {
    /// Base directory of emitted asset paths. Relative values are resolved
    /// against the working directory when the plugin is built.
    pub modules_root: PathBuf,
    /// Stages run in order before scoping.
    pub stages: Vec<Arc<dyn CssStage>>,
    pub modules_options: ModulesOptions,
}

impl IncludeCssOptions {
    pub fn new(modules_root: impl Into<PathBuf>) -> Self {
        IncludeCssOptions {
            modules_root: modules_root.into(),
            ..Default::default()
        }
    }

    pub fn with_stage(mut self, stage: impl CssStage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn with_modules_options(mut self, modules_options: ModulesOptions) -> Self {
        self.modules_options = modules_options;
        self
    }
}

impl fmt::Debug for IncludeCssOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("IncludeCssOptions")
            .field("modules_root", &self.modules_root)
            .field("stages", &stages)
            .field("modules_options", &self.modules_options)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeCssConfig {
    pub modules_root: String,
    /// Built-in stage names, e.g. `"strip-comments"`.
    #[serde(default)]
    pub postcss_plugins: Vec<String>,
    #[serde(default)]
    pub postcss_modules_options: ModulesConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModulesConfig {
    pub generate_scoped_name: Option<String>,
    pub hash_prefix: String,
    pub scope_behaviour: ScopeBehaviour,
    pub locals_convention: Option<LocalsConvention>,
    pub global_module_paths: Vec<String>,
}

impl IncludeCssConfig {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_options(self) -> Result<IncludeCssOptions> {
        let stages = self
            .postcss_plugins
            .iter()
            .map(|name| {
                builtin_stage(name)
                    .ok_or_else(|| PluginError::Options(format!("unknown stage `{}`", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        let modules = self.postcss_modules_options;
        let global_module_paths = modules
            .global_module_paths
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    PluginError::Options(format!("invalid globalModulePaths entry `{}`: {}", pattern, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(IncludeCssOptions {
            modules_root: PathBuf::from(self.modules_root),
            stages,
            modules_options: ModulesOptions {
                get_json: None,
                generate_scoped_name: modules
                    .generate_scoped_name
                    .map(ScopedName::Pattern)
                    .unwrap_or_default(),
                hash_prefix: modules.hash_prefix,
                scope_behaviour: modules.scope_behaviour,
                locals_convention: modules.locals_convention,
                global_module_paths,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_minimal() {
        let config = IncludeCssConfig::from_json(json!({ "modulesRoot": "src" })).unwrap();
        assert_eq!(config.modules_root, "src");
        assert!(config.postcss_plugins.is_empty());

        let options = config.into_options().unwrap();
        assert_eq!(options.modules_root, PathBuf::from("src"));
        assert!(options.stages.is_empty());
        assert!(matches!(
            options.modules_options.generate_scoped_name,
            ScopedName::Default
        ));
    }

    #[test]
    fn test_config_requires_modules_root() {
        assert!(IncludeCssConfig::from_json_str("{}").is_err());
    }

    #[test]
    fn test_config_full() {
        let config = IncludeCssConfig::from_json(json!({
            "modulesRoot": "/pkg/src",
            "postcssPlugins": ["strip-comments", "collapse-whitespace"],
            "postcssModulesOptions": {
                "generateScopedName": "[name]__[local]",
                "hashPrefix": "v1",
                "scopeBehaviour": "global",
                "localsConvention": "camelCaseOnly",
                "globalModulePaths": ["vendor/"]
            }
        }))
        .unwrap();
        let options = config.into_options().unwrap();
        let names: Vec<&str> = options.stages.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["strip-comments", "collapse-whitespace"]);

        let modules = &options.modules_options;
        assert_eq!(modules.hash_prefix, "v1");
        assert_eq!(modules.scope_behaviour, ScopeBehaviour::Global);
        assert_eq!(modules.locals_convention, Some(LocalsConvention::CamelCaseOnly));
        assert!(
            matches!(&modules.generate_scoped_name, ScopedName::Pattern(p) if p == "[name]__[local]")
        );
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let config = IncludeCssConfig::from_json(json!({
            "modulesRoot": "src",
            "postcssPlugins": ["autoprefixer"]
        }))
        .unwrap();
        let err = config.into_options().unwrap_err();
        assert!(err.to_string().contains("autoprefixer"));
    }

    #[test]
    fn test_invalid_global_path_is_rejected() {
        let config = IncludeCssConfig::from_json(json!({
            "modulesRoot": "src",
            "postcssModulesOptions": { "globalModulePaths": ["(unclosed"] }
        }))
        .unwrap();
        assert!(matches!(config.into_options(), Err(PluginError::Options(_))));
    }

    #[test]
    fn test_global_module_paths_switch_behaviour() {
        let options = ModulesOptions {
            global_module_paths: vec![Regex::new(r"/vendor/").unwrap()],
            ..Default::default()
        };
        assert_eq!(
            options.behaviour_for("/src/vendor/reset.module.css"),
            ScopeBehaviour::Global
        );
        assert_eq!(
            options.behaviour_for("/src/button.module.css"),
            ScopeBehaviour::Local
        );
    }
}
