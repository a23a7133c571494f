//! The include-css plugin.
//!
//! Two hooks, both `&self` and free of shared mutable state, so a host may
//! call them concurrently for different modules:
//!
//! 1. `resolve_id`: plain `.css` imports coming from a module are assets this
//!    plugin already emitted; they resolve next to the importer and are
//!    marked external.
//! 2. `transform`: a `.css` file is compiled (stages, then scoping), hashed,
//!    emitted through the `BuildContext`, and replaced by a module that
//!    imports the emitted asset and default-exports the class map.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{PluginError, Result};
use crate::hash::source_hash;
use crate::naming::{asset_file_name, is_css, is_css_module, normalize, relative_path, resolve};
use crate::options::{IncludeCssOptions, ModulesOptions};
use crate::rewrite::render_module;
use crate::scoping::{scope_module, ClassMap, CompiledStyle, ScopeContext};
use crate::stages::{run_stages, CssStage};

pub const PLUGIN_NAME: &str = "include-css";

// ═══════════════════════════════════════════════════════════════════════════════
// HOST CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

/// An asset the plugin asks the host to write alongside the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmittedAsset {
    /// Relative output path, `/`-separated.
    pub file_name: String,
    pub source: String,
}

/// Build-host facilities available to a transform call.
pub trait BuildContext {
    fn emit_file(&self, asset: EmittedAsset);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedId {
    pub id: String,
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// Replacement module source.
    pub code: String,
    /// File name of the asset emitted for this module.
    pub file_name: String,
    pub classes: ClassMap,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════════════

pub struct IncludeCss {
    cwd: PathBuf,
    root_directory: PathBuf,
    stages: Vec<Arc<dyn CssStage>>,
    modules_options: ModulesOptions,
}

impl IncludeCss {
    /// Build the plugin, resolving a relative `modules_root` against the
    /// current working directory.
    pub fn new(options: IncludeCssOptions) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| PluginError::io(".", e))?;
        Ok(Self::with_cwd(options, &cwd))
    }

    pub fn with_cwd(options: IncludeCssOptions, cwd: &Path) -> Self {
        let cwd = normalize(cwd);
        let root_directory = resolve(&cwd, &options.modules_root);
        debug!(root = %root_directory.display(), stages = options.stages.len(), "include-css configured");
        IncludeCss {
            cwd,
            root_directory,
            stages: options.stages,
            modules_options: options.modules_options,
        }
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Resolution hook. `None` defers to the host's own resolution.
    ///
    /// The id is always absolute: relative importers are taken relative to
    /// the working directory the plugin was built with.
    pub fn resolve_id(&self, source: &str, importer: Option<&str>) -> Option<ResolvedId> {
        let importer = importer?;
        if !is_css(source) || is_css_module(source) {
            return None;
        }

        let parent = Path::new(importer).parent().unwrap_or_else(|| Path::new(""));
        let base = resolve(&self.cwd, parent);
        let id = resolve(&base, Path::new(source)).to_string_lossy().to_string();
        debug!(source, importer, id = %id, "marking emitted stylesheet external");
        Some(ResolvedId { id, external: true })
    }

    /// Run the stages and the scoping stage over one stylesheet.
    pub fn compile(&self, code: &str, id: &str) -> Result<CompiledStyle> {
        let processed = run_stages(&self.stages, code, id)?;
        let relative = relative_path(&self.root_directory, Path::new(id));
        let ctx = ScopeContext {
            file: id,
            original: code,
            relative_path: &relative,
            options: &self.modules_options,
        };
        Ok(scope_module(&processed, &ctx)?)
    }

    /// Transform hook. `Ok(None)` leaves non-CSS modules to the host.
    pub fn transform(
        &self,
        ctx: &dyn BuildContext,
        code: &str,
        id: &str,
    ) -> Result<Option<TransformOutput>> {
        if !is_css(id) {
            return Ok(None);
        }

        let compiled = self.compile(code, id)?;
        if let Some(get_json) = &self.modules_options.get_json {
            (**get_json)(id, &compiled.classes);
        }

        let hash = source_hash(&compiled.css);
        let file_name = asset_file_name(&self.root_directory, Path::new(id), &hash);
        let rewritten = render_module(&file_name, &compiled.classes)?;

        debug!(id, file_name = %file_name, classes = compiled.classes.len(), "emitting css asset");
        ctx.emit_file(EmittedAsset {
            file_name: file_name.clone(),
            source: compiled.css,
        });

        Ok(Some(TransformOutput {
            code: rewritten,
            file_name,
            classes: compiled.classes,
        }))
    }
}

impl std::fmt::Debug for IncludeCss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("IncludeCss")
            .field("cwd", &self.cwd)
            .field("root_directory", &self.root_directory)
            .field("stages", &stages)
            .field("modules_options", &self.modules_options)
            .finish()
    }
}
