//! Rewritten module generation.
//!
//! A compiled CSS module is replaced by a two-statement ES module: a
//! side-effect import of the emitted stylesheet (same directory, by base
//! name) and a default export of the class map.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ExportDefaultDeclarationKind, Expression, ObjectExpression, ObjectPropertyKind, PropertyKey,
    Statement,
};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::error::{PluginError, Result};
use crate::naming::asset_base_name;
use crate::scoping::ClassMap;

/// Source of the module that replaces a CSS module.
pub fn render_module(asset_file_name: &str, classes: &ClassMap) -> Result<String> {
    let specifier = serde_json::to_string(&format!("./{}", asset_base_name(asset_file_name)))?;
    let classes = serde_json::to_string(classes)?;
    Ok(format!("import {};\nexport default {};\n", specifier, classes))
}

/// What a host needs to know about a module: its import specifiers and,
/// when the default export is an object of strings, that object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleShape {
    pub imports: Vec<String>,
    pub default_export: Option<ClassMap>,
}

pub fn inspect_module(code: &str, file: &str) -> Result<ModuleShape> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, code, source_type).parse();
    if !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(PluginError::Parse {
            file: file.to_string(),
            message,
        });
    }

    let mut shape = ModuleShape::default();
    for stmt in ret.program.body.iter() {
        match stmt {
            Statement::ImportDeclaration(import_decl) => {
                shape.imports.push(import_decl.source.value.to_string());
            }
            Statement::ExportDefaultDeclaration(export_decl) => {
                if let ExportDefaultDeclarationKind::ObjectExpression(obj) = &export_decl.declaration
                {
                    shape.default_export = Some(object_to_class_map(obj));
                }
            }
            _ => {}
        }
    }
    Ok(shape)
}

fn object_to_class_map(obj: &ObjectExpression) -> ClassMap {
    let mut classes = ClassMap::new();
    for prop in &obj.properties {
        let ObjectPropertyKind::ObjectProperty(p) = prop else {
            continue;
        };
        let key = match &p.key {
            PropertyKey::StaticIdentifier(id) => id.name.to_string(),
            PropertyKey::StringLiteral(s) => s.value.to_string(),
            _ => continue,
        };
        if let Expression::StringLiteral(s) = &p.value {
            classes.insert(key, s.value.to_string());
        }
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(pairs: &[(&str, &str)]) -> ClassMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_module_layout() {
        let map = classes(&[("root", "button_root_x1y2")]);
        let code = render_module("components/button-abcdef12.css", &map).unwrap();
        assert_eq!(
            code,
            "import \"./button-abcdef12.css\";\nexport default {\"root\":\"button_root_x1y2\"};\n"
        );
    }

    #[test]
    fn test_render_module_empty_map() {
        let code = render_module("a-00000000.css", &ClassMap::new()).unwrap();
        assert!(code.ends_with("export default {};\n"));
    }

    #[test]
    fn test_rendered_module_evaluates_to_class_map() {
        let map = classes(&[("root", "button_root_x1y2"), ("is-active", "_is-active_1")]);
        let code = render_module("button-abcdef12.css", &map).unwrap();
        let shape = inspect_module(&code, "/src/button.module.css").unwrap();
        assert_eq!(shape.imports, vec!["./button-abcdef12.css".to_string()]);
        assert_eq!(shape.default_export, Some(map));
    }

    #[test]
    fn test_escaped_names_survive() {
        let map = classes(&[("quote\"d", "a\\b")]);
        let code = render_module("x-1.css", &map).unwrap();
        let shape = inspect_module(&code, "/x.module.css").unwrap();
        assert_eq!(shape.default_export, Some(map));
    }

    #[test]
    fn test_inspect_rejects_invalid_module() {
        let err = inspect_module("export default {", "/x.js").unwrap_err();
        assert!(matches!(err, PluginError::Parse { .. }));
    }
}
