//! Asset naming for emitted stylesheets.
//!
//! An emitted asset keeps the directory layout of its source module relative
//! to the modules root and swaps the `.module.css` suffix for a content hash:
//!
//! - `components/button.module.css` + `abcdef12` → `components/button-abcdef12.css`
//! - `theme.css` + `abcdef12` → `theme.css-abcdef12.css`
//!
//! Names always use `/` separators, whatever the host platform.

use std::path::{Component, Path, PathBuf};

pub const MODULE_SUFFIX: &str = ".module.css";
pub const CSS_EXTENSION: &str = ".css";

/// Lexically normalize a path: drop `.` and fold `..` into its parent.
/// Never touches the file system.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join `path` onto `base` unless it is already absolute, then normalize.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Relative path from `root` to `path` as `/`-separated segments.
///
/// Paths outside `root` climb with `..`; nothing is rejected.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let root = normalize(root);
    let path = normalize(path);

    let root_parts: Vec<Component> = root.components().collect();
    let path_parts: Vec<Component> = path.components().collect();

    let common = root_parts
        .iter()
        .zip(path_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::new();
    for _ in common..root_parts.len() {
        segments.push("..".to_string());
    }
    for part in &path_parts[common..] {
        segments.push(part.as_os_str().to_string_lossy().to_string());
    }
    segments.join("/")
}

/// Strip `suffix` from a base name the way `path.basename(p, ext)` does:
/// only when it matches and is not the whole name.
fn strip_suffix<'a>(base: &'a str, suffix: &str) -> &'a str {
    match base.strip_suffix(suffix) {
        Some(stem) if !stem.is_empty() => stem,
        _ => base,
    }
}

/// Split a `/`-separated relative path into (dirname, basename).
fn split_relative(relative: &str) -> (&str, &str) {
    match relative.rfind('/') {
        Some(i) => (&relative[..i], &relative[i + 1..]),
        None => ("", relative),
    }
}

/// Base name of a stylesheet with `.module.css` or `.css` removed.
/// Used for the `[name]` placeholder of scoped names.
pub fn stylesheet_stem(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = strip_suffix(&base, MODULE_SUFFIX);
    if stem.len() != base.len() {
        return stem.to_string();
    }
    strip_suffix(&base, CSS_EXTENSION).to_string()
}

/// File name of the emitted asset for `id`, relative to `root`.
pub fn asset_file_name(root: &Path, id: &Path, hash: &str) -> String {
    let relative = relative_path(root, id);
    let (dir, base) = split_relative(&relative);
    let name = format!("{}-{}{}", strip_suffix(base, MODULE_SUFFIX), hash, CSS_EXTENSION);
    if dir.is_empty() {
        name
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Last segment of an asset file name.
pub fn asset_base_name(file_name: &str) -> &str {
    split_relative(file_name).1
}

pub fn is_css(id: &str) -> bool {
    id.ends_with(CSS_EXTENSION)
}

pub fn is_css_module(id: &str) -> bool {
    id.ends_with(MODULE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_file_name_nested() {
        let name = asset_file_name(
            Path::new("/root/src"),
            Path::new("/root/src/components/button.module.css"),
            "abcdef12",
        );
        assert_eq!(name, "components/button-abcdef12.css");
    }

    #[test]
    fn test_asset_file_name_at_root() {
        let name = asset_file_name(
            Path::new("/root/src"),
            Path::new("/root/src/button.module.css"),
            "abcdef12",
        );
        assert_eq!(name, "button-abcdef12.css");
    }

    #[test]
    fn test_asset_file_name_outside_root_climbs() {
        let name = asset_file_name(
            Path::new("/root/src"),
            Path::new("/root/lib/x.module.css"),
            "00000000",
        );
        assert_eq!(name, "../lib/x-00000000.css");
    }

    #[test]
    fn test_asset_file_name_plain_css_keeps_extension() {
        let name = asset_file_name(Path::new("/r"), Path::new("/r/theme.css"), "12345678");
        assert_eq!(name, "theme.css-12345678.css");
    }

    #[test]
    fn test_bare_module_suffix_is_not_stripped() {
        let name = asset_file_name(Path::new("/r"), Path::new("/r/.module.css"), "12345678");
        assert_eq!(name, ".module.css-12345678.css");
    }

    #[test]
    fn test_normalize_folds_parents() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d.css")),
            PathBuf::from("/a/c/d.css")
        );
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize(Path::new("../a")), PathBuf::from("../a"));
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        assert_eq!(
            resolve(Path::new("/root/src"), Path::new("./foo.css")),
            PathBuf::from("/root/src/foo.css")
        );
        assert_eq!(
            resolve(Path::new("/root/src"), Path::new("/abs/foo.css")),
            PathBuf::from("/abs/foo.css")
        );
    }

    #[test]
    fn test_relative_path_same_dir() {
        assert_eq!(relative_path(Path::new("/a"), Path::new("/a")), "");
        assert_eq!(relative_path(Path::new("/a/"), Path::new("/a/b/c")), "b/c");
    }

    #[test]
    fn test_stylesheet_stem() {
        assert_eq!(stylesheet_stem(Path::new("/a/button.module.css")), "button");
        assert_eq!(stylesheet_stem(Path::new("/a/theme.css")), "theme");
        assert_eq!(stylesheet_stem(Path::new("/a/readme")), "readme");
    }

    #[test]
    fn test_css_predicates() {
        assert!(is_css("/a/b.css"));
        assert!(is_css_module("/a/b.module.css"));
        assert!(!is_css_module("/a/b.css"));
        assert!(!is_css("/a/b.js"));
    }
}
