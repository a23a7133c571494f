//! Node bindings.
//!
//! Each call builds the plugin from a JSON `IncludeCssConfig`, so a JS
//! bundler plugin can forward its `resolveId` / `transform` hooks here and
//! emit the returned asset itself.

use napi_derive::napi;

use crate::host::BuildSession;
use crate::options::IncludeCssConfig;
use crate::plugin::IncludeCss;

#[napi(object)]
pub struct NativeResolvedId {
    pub id: String,
    pub external: bool,
}

#[napi(object)]
pub struct NativeTransformOutput {
    pub code: String,
    pub file_name: String,
    pub source: String,
    /// Class map as a JSON object string (key order preserved).
    pub classes_json: String,
}

fn build_plugin(options_json: serde_json::Value) -> napi::Result<IncludeCss> {
    let options = IncludeCssConfig::from_json(options_json)
        .and_then(|config| config.into_options())
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    IncludeCss::new(options).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[napi]
pub fn include_css_resolve_native(
    options_json: serde_json::Value,
    source: String,
    importer: Option<String>,
) -> napi::Result<Option<NativeResolvedId>> {
    let plugin = build_plugin(options_json)?;
    Ok(plugin
        .resolve_id(&source, importer.as_deref())
        .map(|resolved| NativeResolvedId {
            id: resolved.id,
            external: resolved.external,
        }))
}

#[napi]
pub fn include_css_transform_native(
    options_json: serde_json::Value,
    code: String,
    id: String,
) -> napi::Result<Option<NativeTransformOutput>> {
    let plugin = build_plugin(options_json)?;
    let session = BuildSession::new();
    let output = plugin
        .transform(&session, &code, &id)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;

    let Some(output) = output else {
        return Ok(None);
    };
    let source = session.asset(&output.file_name).unwrap_or_default();
    let classes_json = serde_json::to_string(&output.classes)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;

    Ok(Some(NativeTransformOutput {
        code: output.code,
        file_name: output.file_name,
        source,
        classes_json,
    }))
}
