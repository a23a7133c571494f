//! Directory builds over real files.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use crate::discovery::{build_css_modules, find_css_modules};
    use crate::error::PluginError;
    use crate::hash::source_hash;
    use crate::options::{IncludeCssOptions, ModulesOptions, ScopedName, ScopedNameInput};
    use crate::plugin::IncludeCss;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn plugin_for(root: &Path) -> IncludeCss {
        let modules = ModulesOptions {
            generate_scoped_name: ScopedName::Custom(Arc::new(|input: &ScopedNameInput| {
                format!("{}__s", input.local)
            })),
            ..Default::default()
        };
        IncludeCss::with_cwd(
            IncludeCssOptions::new(root).with_modules_options(modules),
            Path::new("/"),
        )
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.module.css", ".a { color: red; }");
        write(dir.path(), "ui/b.module.css", ".b { composes: x from global; }");
        write(dir.path(), "ui/plain.css", ".p {}");
        write(dir.path(), "index.js", "import s from './a.module.css';");
        dir
    }

    #[test]
    fn test_find_css_modules_sorted() {
        let dir = fixture();
        let found = find_css_modules(dir.path());
        assert_eq!(
            found,
            vec![
                dir.path().join("a.module.css"),
                dir.path().join("ui/b.module.css"),
            ]
        );
    }

    #[test]
    fn test_find_in_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_css_modules(&dir.path().join("missing")).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entries_become_warnings() {
        let dir = fixture();
        std::os::unix::fs::symlink(
            dir.path().join("nowhere.module.css"),
            dir.path().join("ghost.module.css"),
        )
        .unwrap();

        let found = find_css_modules(dir.path());
        assert_eq!(found.len(), 2);

        let output = build_css_modules(&plugin_for(dir.path())).unwrap();
        assert_eq!(output.modules.len(), 2);
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("ghost.module.css"));
    }

    #[test]
    fn test_build_emits_assets_and_external_imports() {
        let dir = fixture();
        let plugin = plugin_for(dir.path());
        let output = build_css_modules(&plugin).unwrap();

        let a_hash = source_hash(".a__s { color: red; }");
        let b_hash = source_hash(".b__s { }");
        let names: Vec<&str> = output.assets.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![format!("a-{}.css", a_hash), format!("ui/b-{}.css", b_hash)]
        );
        assert!(output.warnings.is_empty());

        assert_eq!(output.modules.len(), 2);
        let b = &output.modules[1];
        assert!(b.id.ends_with("b.module.css"));
        assert_eq!(b.classes["b"], "b__s x");

        let resolved = b.imports[0].resolved.as_ref().unwrap();
        assert!(resolved.external);
        let expected = dir.path().join(format!("ui/b-{}.css", b_hash));
        assert_eq!(Path::new(&resolved.id), expected.as_path());
    }

    #[test]
    fn test_write_to_lays_out_bundle() {
        let dir = fixture();
        let out = tempfile::tempdir().unwrap();
        let plugin = plugin_for(dir.path());
        let output = build_css_modules(&plugin).unwrap();
        output.write_to(out.path()).unwrap();

        let a_hash = source_hash(".a__s { color: red; }");
        let css = fs::read_to_string(out.path().join(format!("a-{}.css", a_hash))).unwrap();
        assert_eq!(css, ".a__s { color: red; }");

        let module = fs::read_to_string(out.path().join("ui/b.module.css.js")).unwrap();
        assert!(module.starts_with("import \"./b-"));
        assert!(module.contains("export default {\"b\":\"b__s x\"};"));
    }

    #[test]
    fn test_build_reports_syntax_errors() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.module.css", ".a { color: red;");
        let err = build_css_modules(&plugin_for(dir.path())).unwrap_err();
        match err {
            PluginError::Css(e) => assert!(e.file.ends_with("broken.module.css")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_write_to_reports_io_errors() {
        let dir = fixture();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let output = build_css_modules(&plugin_for(dir.path())).unwrap();
        let err = output.write_to(&blocker).unwrap_err();
        assert!(matches!(err, PluginError::Io { .. }));
    }
}
