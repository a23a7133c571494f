//! # include-css
//!
//! CSS Modules for library bundles. The plugin sits in a bundler's module
//! pass and turns every `*.module.css` import into two outputs:
//!
//! 1. **A hashed stylesheet asset**: the CSS after the configured stages and
//!    the module-scoping stage, emitted as `<dir>/<name>-<hash>.css`
//!    relative to the modules root. The hash is the first 8 hex characters
//!    of the SHA-256 of the compiled CSS, so identical output always lands
//!    at the identical name.
//! 2. **A replacement module**: `import './<name>-<hash>.css';` followed by
//!    `export default { local: "token", ... }`.
//!
//! The `import` of the emitted stylesheet comes back through the
//! resolution hook, which marks plain `.css` imports external so the bundler
//! keeps them as opaque, already-final files.
//!
//! ## Invariants
//!
//! - `transform` is deterministic for fixed options, source text and path.
//! - The asset name depends on the module path and compiled bytes only.
//! - Exactly one asset is emitted per successful transform; none on failure.
//! - Hooks share no mutable state; emission goes through the caller's
//!   `BuildContext`.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod css;
pub mod discovery;
pub mod error;
pub mod hash;
pub mod host;
pub mod naming;
pub mod options;
pub mod plugin;
pub mod rewrite;
pub mod scoping;
pub mod stages;

#[cfg(feature = "napi")]
mod bindings;

#[cfg(test)]
mod discovery_tests;

pub use discovery::{build_css_modules, find_css_modules, BuildOutput};
pub use error::{CssSyntaxError, PluginError, Result};
pub use host::{BuildSession, LoadedModule, ModuleImport};
pub use options::{
    IncludeCssConfig, IncludeCssOptions, LocalsConvention, ModulesOptions, ScopeBehaviour,
    ScopedName, ScopedNameInput,
};
pub use plugin::{BuildContext, EmittedAsset, IncludeCss, ResolvedId, TransformOutput};
pub use scoping::{ClassMap, CompiledStyle};
pub use stages::{CollapseWhitespace, CssStage, StripComments};

#[cfg(feature = "napi")]
pub use bindings::{include_css_resolve_native, include_css_transform_native};

/// Build the plugin from options; relative roots resolve against the
/// working directory.
pub fn include_css(options: IncludeCssOptions) -> Result<IncludeCss> {
    IncludeCss::new(options)
}

#[cfg(feature = "napi")]
#[napi]
pub fn include_css_bridge() -> String {
    "include-css native bridge connected".to_string()
}
