//! In-memory build host.
//!
//! `BuildSession` plays the bundler's part of the contract: it stores
//! emitted assets, runs `transform` on loaded modules and sends every import
//! of a rewritten module back through `resolve_id`, the way a bundler walks
//! its module graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::plugin::{BuildContext, EmittedAsset, IncludeCss, ResolvedId};
use crate::rewrite::inspect_module;
use crate::scoping::ClassMap;

/// An import of a loaded module and what the plugin made of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleImport {
    pub specifier: String,
    /// `None` when the plugin left resolution to the host.
    pub resolved: Option<ResolvedId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedModule {
    pub id: String,
    pub code: String,
    pub transformed: bool,
    pub imports: Vec<ModuleImport>,
    #[serde(default)]
    pub classes: ClassMap,
}

#[derive(Debug, Default)]
pub struct BuildSession {
    assets: Mutex<BTreeMap<String, String>>,
    warnings: Mutex<Vec<String>>,
}

impl BuildSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform `code` and resolve the imports of the result.
    pub fn load(&self, plugin: &IncludeCss, id: &str, code: &str) -> Result<LoadedModule> {
        let Some(output) = plugin.transform(self, code, id)? else {
            return Ok(LoadedModule {
                id: id.to_string(),
                code: code.to_string(),
                transformed: false,
                imports: Vec::new(),
                classes: ClassMap::new(),
            });
        };

        let shape = inspect_module(&output.code, id)?;
        let imports = shape
            .imports
            .into_iter()
            .map(|specifier| {
                let resolved = plugin.resolve_id(&specifier, Some(id));
                ModuleImport {
                    specifier,
                    resolved,
                }
            })
            .collect();

        Ok(LoadedModule {
            id: id.to_string(),
            code: output.code,
            transformed: true,
            imports,
            classes: output.classes,
        })
    }

    /// Emitted assets ordered by file name.
    pub fn assets(&self) -> Vec<EmittedAsset> {
        let assets = self.assets.lock().unwrap_or_else(|e| e.into_inner());
        assets
            .iter()
            .map(|(file_name, source)| EmittedAsset {
                file_name: file_name.clone(),
                source: source.clone(),
            })
            .collect()
    }

    pub fn asset(&self, file_name: &str) -> Option<String> {
        let assets = self.assets.lock().unwrap_or_else(|e| e.into_inner());
        assets.get(file_name).cloned()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl BuildContext for BuildSession {
    /// Same name and content is a no-op; same name with new content replaces
    /// the earlier asset and records a warning.
    fn emit_file(&self, asset: EmittedAsset) {
        let mut assets = self.assets.lock().unwrap_or_else(|e| e.into_inner());
        match assets.get(&asset.file_name) {
            Some(existing) if *existing == asset.source => {}
            Some(_) => {
                let message = format!(
                    "The emitted file \"{}\" overwrites a previously emitted file of the same name.",
                    asset.file_name
                );
                warn!("{}", message);
                self.warnings
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(message);
                assets.insert(asset.file_name, asset.source);
            }
            None => {
                assets.insert(asset.file_name, asset.source);
            }
        }
    }
}
