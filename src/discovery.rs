//! Directory builds.
//!
//! Finds every `*.module.css` under the modules root, runs them through a
//! `BuildSession` in parallel and lays the result out the way a
//! `preserveModules` bundle does: emitted stylesheets at their asset names,
//! rewritten modules at `<relative path>.js`.

use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{PluginError, Result};
use crate::host::{BuildSession, LoadedModule};
use crate::naming::{is_css_module, relative_path};
use crate::plugin::{EmittedAsset, IncludeCss};

#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub root: PathBuf,
    /// Sorted by module id.
    pub modules: Vec<LoadedModule>,
    /// Sorted by file name.
    pub assets: Vec<EmittedAsset>,
    pub warnings: Vec<String>,
}

/// Recursively find CSS modules under `dir`, sorted by path.
///
/// Entries the walk cannot read are logged and skipped.
pub fn find_css_modules(dir: &Path) -> Vec<PathBuf> {
    walk_css_modules(dir).0
}

/// Like `find_css_modules`, also returning one message per skipped entry.
fn walk_css_modules(dir: &Path) -> (Vec<PathBuf>, Vec<String>) {
    let mut files = Vec::new();
    let mut skipped = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| dir.display().to_string());
                let message = format!(
                    "Skipped \"{}\" while discovering CSS modules: {}",
                    path, err
                );
                warn!("{}", message);
                skipped.push(message);
                continue;
            }
        };
        if entry.file_type().is_file() && is_css_module(&entry.path().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    (files, skipped)
}

/// Transform every CSS module under the plugin's root directory.
pub fn build_css_modules(plugin: &IncludeCss) -> Result<BuildOutput> {
    let root = plugin.root_directory().to_path_buf();
    let (files, skipped) = walk_css_modules(&root);
    info!(root = %root.display(), count = files.len(), "building css modules");

    let session = BuildSession::new();
    let mut modules = files
        .par_iter()
        .map(|path| {
            let code = fs::read_to_string(path).map_err(|e| PluginError::io(path, e))?;
            session.load(plugin, &path.to_string_lossy(), &code)
        })
        .collect::<Result<Vec<_>>>()?;
    modules.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(BuildOutput {
        root,
        modules,
        assets: session.assets(),
        warnings: skipped.into_iter().chain(session.warnings()).collect(),
    })
}

impl BuildOutput {
    /// Write assets and rewritten modules under `out_dir`.
    pub fn write_to(&self, out_dir: &Path) -> Result<()> {
        for asset in &self.assets {
            write_file(&out_dir.join(&asset.file_name), &asset.source)?;
        }
        for module in &self.modules {
            let relative = relative_path(&self.root, Path::new(&module.id));
            write_file(&out_dir.join(format!("{}.js", relative)), &module.code)?;
        }
        info!(
            out_dir = %out_dir.display(),
            assets = self.assets.len(),
            modules = self.modules.len(),
            "wrote css module build"
        );
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PluginError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| PluginError::io(path, e))
}
