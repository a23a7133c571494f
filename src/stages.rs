//! Processing stages that run before module scoping.
//!
//! A stage receives the CSS produced by the previous one and returns its own
//! output. Errors stop the pipeline and reach the host untouched.

use std::sync::Arc;

use crate::css::{next_char_end, skip_comment, skip_string, starts_comment};
use crate::error::Result;

pub trait CssStage: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, css: String, file: &str) -> Result<String>;
}

/// Look up a built-in stage by its configuration name.
pub fn builtin_stage(name: &str) -> Option<Arc<dyn CssStage>> {
    match name {
        "strip-comments" => Some(Arc::new(StripComments)),
        "collapse-whitespace" => Some(Arc::new(CollapseWhitespace)),
        _ => None,
    }
}

/// Run `stages` in order over `css`.
pub fn run_stages(stages: &[Arc<dyn CssStage>], css: &str, file: &str) -> Result<String> {
    let mut current = css.to_string();
    for stage in stages {
        tracing::trace!(stage = stage.name(), file, "running css stage");
        current = stage.process(current, file)?;
    }
    Ok(current)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILT-IN STAGES
// ═══════════════════════════════════════════════════════════════════════════════

/// Removes `/* ... */` comments. `/*! ... */` license comments survive.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripComments;

impl CssStage for StripComments {
    fn name(&self) -> &str {
        "strip-comments"
    }

    fn process(&self, css: String, file: &str) -> Result<String> {
        let bytes = css.as_bytes();
        let mut out = String::with_capacity(css.len());
        let mut i = 0;
        let mut copied = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'"' | b'\'' => {
                    i = skip_string(&css, i).map_err(|e| e.into_syntax(file, &css))?;
                }
                b'/' if starts_comment(bytes, i) => {
                    let end = skip_comment(&css, i).map_err(|e| e.into_syntax(file, &css))?;
                    if bytes.get(i + 2) != Some(&b'!') {
                        out.push_str(&css[copied..i]);
                        copied = end;
                    }
                    i = end;
                }
                b'\\' => i = next_char_end(&css, i + 1),
                _ => i += 1,
            }
        }
        out.push_str(&css[copied..]);
        Ok(out)
    }
}

/// Collapses whitespace runs to one space and drops it next to `{ } ; ,`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollapseWhitespace;

const TIGHT: &[u8] = b"{};,";

impl CssStage for CollapseWhitespace {
    fn name(&self) -> &str {
        "collapse-whitespace"
    }

    fn process(&self, css: String, file: &str) -> Result<String> {
        let bytes = css.as_bytes();
        let mut out = String::with_capacity(css.len());
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b.is_ascii_whitespace() {
                let mut j = i;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let before = out.as_bytes().last().copied();
                let after = bytes.get(j).copied();
                let keep = match (before, after) {
                    (Some(prev), Some(next)) => !TIGHT.contains(&prev) && !TIGHT.contains(&next),
                    _ => false,
                };
                if keep {
                    out.push(' ');
                }
                i = j;
                continue;
            }
            let end = match b {
                b'"' | b'\'' => skip_string(&css, i).map_err(|e| e.into_syntax(file, &css))?,
                b'/' if starts_comment(bytes, i) => {
                    skip_comment(&css, i).map_err(|e| e.into_syntax(file, &css))?
                }
                b'\\' => next_char_end(&css, i + 1),
                _ => {
                    // Copy the whole UTF-8 sequence.
                    let width = css[i..].chars().next().map(char::len_utf8).unwrap_or(1);
                    i + width
                }
            };
            out.push_str(&css[i..end]);
            i = end;
        }
        Ok(out)
    }
}
