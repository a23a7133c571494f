//! Error types for the include-css plugin.
//!
//! Every failure crosses the plugin boundary unchanged: the host decides
//! whether a broken stylesheet aborts the build.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// CSS ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_UNCLOSED_COMMENT: &str = "CSS-ERR-UNCLOSED-COMMENT";
pub const ERR_UNCLOSED_STRING: &str = "CSS-ERR-UNCLOSED-STRING";
pub const ERR_UNCLOSED_BLOCK: &str = "CSS-ERR-UNCLOSED-BLOCK";
pub const ERR_UNCLOSED_PAREN: &str = "CSS-ERR-UNCLOSED-PAREN";
pub const ERR_UNCLOSED_BRACKET: &str = "CSS-ERR-UNCLOSED-BRACKET";
pub const ERR_UNEXPECTED_BRACE: &str = "CSS-ERR-UNEXPECTED-BRACE";
pub const ERR_EMPTY_SCOPE: &str = "CSS-ERR-EMPTY-SCOPE";
pub const ERR_COMPOSES_SELECTOR: &str = "CSS-ERR-COMPOSES-SELECTOR";
pub const ERR_COMPOSES_EXTERNAL: &str = "CSS-ERR-COMPOSES-EXTERNAL";
pub const ERR_COMPOSES_UNKNOWN: &str = "CSS-ERR-COMPOSES-UNKNOWN";
pub const ERR_INVALID_VALUE: &str = "CSS-ERR-INVALID-VALUE";
pub const ERR_INVALID_EXPORT: &str = "CSS-ERR-INVALID-EXPORT";
pub const ERR_ICSS_IMPORT: &str = "CSS-ERR-ICSS-IMPORT";

// ═══════════════════════════════════════════════════════════════════════════════
// CSS SYNTAX ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// A malformed stylesheet, located by 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
#[error("{file}:{line}:{column}: {message} [{code}]")]
pub struct CssSyntaxError {
    pub code: String,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl CssSyntaxError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        CssSyntaxError {
            code: code.to_string(),
            message: message.to_string(),
            file: file.to_string(),
            line,
            column,
        }
    }

    /// Build an error at a byte offset of `source`.
    pub fn at(code: &str, message: &str, file: &str, source: &str, offset: usize) -> Self {
        let (line, column) = line_column(source, offset);
        Self::new(code, message, file, line, column)
    }
}

/// 1-based line and column (in chars) of a byte offset.
pub fn line_column(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() as u32 + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() as u32 + 1;
    (line, column)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLUGIN ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Css(#[from] CssSyntaxError),

    #[error("stage `{stage}` failed on {file}: {message}")]
    Stage {
        stage: String,
        file: String,
        message: String,
    },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid options: {0}")]
    Options(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot parse module {file}: {message}")]
    Parse { file: String, message: String },
}

impl PluginError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PluginError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column_first_line() {
        assert_eq!(line_column(".a {}", 0), (1, 1));
        assert_eq!(line_column(".a {}", 3), (1, 4));
    }

    #[test]
    fn test_line_column_after_newlines() {
        let src = ".a {}\n.b {\n  color: red;";
        let offset = src.find("color").unwrap();
        assert_eq!(line_column(src, offset), (3, 3));
    }

    #[test]
    fn test_error_display_includes_location_and_code() {
        let err = CssSyntaxError::new(ERR_UNCLOSED_BLOCK, "Unclosed block", "/a.css", 2, 5);
        assert_eq!(
            err.to_string(),
            "/a.css:2:5: Unclosed block [CSS-ERR-UNCLOSED-BLOCK]"
        );
        let plugin: PluginError = err.into();
        assert!(plugin.to_string().contains("Unclosed block"));
    }
}
