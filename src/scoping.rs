//! Module-scoping stage.
//!
//! Renames local class, id and keyframe identifiers to unique tokens and
//! records the original → token mapping. Selector semantics follow
//! `postcss-modules`:
//!
//! - `.a` / `#a` are local unless the file is scoped globally
//! - `:global(...)` / `:local(...)` switch mode for their argument and vanish
//! - bare `:global` / `:local` switch mode until the next `,`
//! - `@keyframes` names and the animation names that refer to them are local
//! - `composes` merges other tokens into a class's exported value
//! - top-level `@value name: v;` definitions are exported and substituted
//!   into declaration values and `@media` params
//! - top-level `:export { key: value }` entries are merged into the map

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashSet;

use crate::css::{
    is_ident_char, matching_paren, next_char_end, read_ident, scan_until, skip_comment,
    skip_string, split_top_level, starts_comment, ScanError, ScanResult,
};
use crate::error::{
    CssSyntaxError, ERR_COMPOSES_EXTERNAL, ERR_COMPOSES_SELECTOR, ERR_COMPOSES_UNKNOWN,
    ERR_EMPTY_SCOPE, ERR_ICSS_IMPORT, ERR_INVALID_EXPORT, ERR_INVALID_VALUE, ERR_UNCLOSED_BLOCK,
    ERR_UNCLOSED_BRACKET, ERR_UNEXPECTED_BRACE,
};
use crate::hash::{sha256_hex, string_hash, to_base36};
use crate::naming::stylesheet_stem;
use crate::options::{LocalsConvention, ModulesOptions, ScopeBehaviour, ScopedName, ScopedNameInput};

/// Original local name → generated token(s), in order of first appearance.
pub type ClassMap = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStyle {
    pub css: String,
    pub classes: ClassMap,
}

/// Per-file inputs of the scoping stage.
#[derive(Debug, Clone, Copy)]
pub struct ScopeContext<'a> {
    /// Absolute path of the stylesheet.
    pub file: &'a str,
    /// Source text as read, before any stage ran. Scoped names are derived
    /// from it so stages never change the generated tokens.
    pub original: &'a str,
    /// Path relative to the modules root, `/`-separated.
    pub relative_path: &'a str,
    pub options: &'a ModulesOptions,
}

lazy_static! {
    static ref PATTERN_PLACEHOLDER: Regex = Regex::new(r"\[(name|local|hash)(?::(\d+))?\]").unwrap();
    static ref SINGLE_CLASS: Regex = Regex::new(r"^\.(-?[_a-zA-Z][_a-zA-Z0-9-]*)$").unwrap();
    static ref SINGLE_LOCAL_CLASS: Regex =
        Regex::new(r"^:local\(\s*\.(-?[_a-zA-Z][_a-zA-Z0-9-]*)\s*\)$").unwrap();
    static ref PLAIN_IDENT: Regex = Regex::new(r"^-?[_a-zA-Z][_a-zA-Z0-9-]*$").unwrap();
    static ref ANIMATION_PROP: Regex = Regex::new(r"^(?:-[a-z]+-)?animation(-name)?$").unwrap();
    static ref COMPOSES_FROM: Regex = Regex::new(r"^(?s)(.*?)\s+from\s+(.+)$").unwrap();
    static ref DASHES: Regex = Regex::new(r"-+(\w)").unwrap();
    static ref VALUE_IMPORT: Regex =
        Regex::new(r#"^(?s)(.+?)\s+from\s+("[^"]*"|'[^']*'|[\w-]+)$"#).unwrap();
    static ref VALUE_DEFINITION: Regex = Regex::new(r"^(?s)([\w-]+)\s*:?(.*)$").unwrap();

    static ref GROUP_AT_RULES: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("media");
        s.insert("supports");
        s.insert("layer");
        s.insert("container");
        s.insert("document");
        s.insert("-moz-document");
        s.insert("scope");
        s.insert("starting-style");
        s
    };

    /// Identifiers that can appear in `animation` values without naming keyframes.
    static ref ANIMATION_KEYWORDS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        // CSS-wide
        s.insert("inherit");
        s.insert("initial");
        s.insert("unset");
        s.insert("revert");
        s.insert("revert-layer");
        s.insert("none");
        // Direction
        s.insert("normal");
        s.insert("reverse");
        s.insert("alternate");
        s.insert("alternate-reverse");
        // Fill mode
        s.insert("forwards");
        s.insert("backwards");
        s.insert("both");
        // Iteration
        s.insert("infinite");
        // Play state
        s.insert("running");
        s.insert("paused");
        // Timing functions
        s.insert("linear");
        s.insert("ease");
        s.insert("ease-in");
        s.insert("ease-out");
        s.insert("ease-in-out");
        s.insert("step-start");
        s.insert("step-end");
        s
    };
}

/// Scope `css` and collect its class map.
pub fn scope_module(css: &str, ctx: &ScopeContext) -> Result<CompiledStyle, CssSyntaxError> {
    let mut scoper = Scoper::new(css, ctx);
    scoper
        .collect_values()
        .and_then(|_| scoper.parse_rules(0, None))
        .map_err(|e| e.into_syntax(ctx.file, css))?;

    let Scoper {
        out,
        exports,
        values,
        icss_exports,
        ..
    } = scoper;

    // Values first, then classes, then explicit `:export` entries.
    let mut merged: IndexMap<String, Vec<String>> =
        values.into_iter().map(|(k, v)| (k, vec![v])).collect();
    merged.extend(exports);
    merged.extend(icss_exports.into_iter().map(|(k, v)| (k, vec![v])));

    let classes = apply_convention(merged, ctx.options.locals_convention);
    Ok(CompiledStyle { css: out, classes })
}

/// Which kind of block an at-rule opens into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Rules,
    Declarations,
}

struct Scoper<'a> {
    src: &'a str,
    ctx: &'a ScopeContext<'a>,
    behaviour: ScopeBehaviour,
    exports: IndexMap<String, Vec<String>>,
    values: IndexMap<String, String>,
    icss_exports: IndexMap<String, String>,
    out: String,
    file_hash: Option<String>,
}

fn shifted(offset: usize) -> impl Fn(ScanError) -> ScanError {
    move |e| ScanError {
        offset: e.offset + offset,
        ..e
    }
}

impl<'a> Scoper<'a> {
    fn new(src: &'a str, ctx: &'a ScopeContext<'a>) -> Self {
        Scoper {
            src,
            ctx,
            behaviour: ctx.options.behaviour_for(ctx.file),
            exports: IndexMap::new(),
            values: IndexMap::new(),
            icss_exports: IndexMap::new(),
            out: String::with_capacity(src.len()),
            file_hash: None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NAMES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Token for a local name, generated on first use.
    fn local(&mut self, name: &str) -> String {
        if let Some(tokens) = self.exports.get(name) {
            return tokens[0].clone();
        }
        let scoped = self.generate(name);
        self.exports.insert(name.to_string(), vec![scoped.clone()]);
        scoped
    }

    fn generate(&mut self, local: &str) -> String {
        let ctx = self.ctx;
        match &ctx.options.generate_scoped_name {
            ScopedName::Default => {
                let src = ctx.original;
                let hash = self
                    .file_hash
                    .get_or_insert_with(|| {
                        let mut h = to_base36(string_hash(src));
                        h.truncate(5);
                        h
                    })
                    .clone();
                let line = match src.find(&format!(".{}", local)) {
                    Some(i) => src[..i].bytes().filter(|b| *b == b'\n' || *b == b'\r').count() + 1,
                    None => 1,
                };
                format!("_{}_{}_{}", local, hash, line)
            }
            ScopedName::Pattern(pattern) => {
                let name = stylesheet_stem(std::path::Path::new(ctx.file));
                let digest = sha256_hex(&format!(
                    "{}{}+{}",
                    ctx.options.hash_prefix, ctx.relative_path, local
                ));
                let rendered = PATTERN_PLACEHOLDER.replace_all(pattern, |caps: &Captures| {
                    match &caps[1] {
                        "name" => name.clone(),
                        "local" => local.to_string(),
                        _ => {
                            let len = caps
                                .get(2)
                                .and_then(|m| m.as_str().parse::<usize>().ok())
                                .unwrap_or(5)
                                .min(digest.len());
                            digest[..len].to_string()
                        }
                    }
                });
                sanitize_ident(&rendered)
            }
            ScopedName::Custom(generate) => (**generate)(&ScopedNameInput {
                local,
                file: ctx.file,
                css: ctx.original,
            }),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RULE STRUCTURE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Copy whitespace and comments verbatim.
    fn copy_trivia(&mut self, mut i: usize) -> ScanResult<usize> {
        let src = self.src;
        let bytes = src.as_bytes();
        let start = i;
        while i < bytes.len() {
            if bytes[i].is_ascii_whitespace() {
                i += 1;
            } else if starts_comment(bytes, i) {
                i = skip_comment(src, i)?;
            } else {
                break;
            }
        }
        self.out.push_str(&src[start..i]);
        Ok(i)
    }

    /// Parse a list of rules. `open` is the offset of the enclosing `{`, if any.
    fn parse_rules(&mut self, mut i: usize, open: Option<usize>) -> ScanResult<usize> {
        let src = self.src;
        let bytes = src.as_bytes();
        loop {
            i = self.copy_trivia(i)?;
            if i >= bytes.len() {
                return match open {
                    Some(at) => Err(ScanError::new(ERR_UNCLOSED_BLOCK, "Unclosed block", at)),
                    None => Ok(i),
                };
            }
            match bytes[i] {
                b'}' => {
                    if open.is_none() {
                        return Err(ScanError::new(ERR_UNEXPECTED_BRACE, "Unexpected }", i));
                    }
                    self.out.push('}');
                    return Ok(i + 1);
                }
                b';' => {
                    self.out.push(';');
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let end = scan_until(src, i, b"{;}")?;
            if open.is_none() && at_rule_name(src, i).as_deref() == Some("value") {
                // Recorded by `collect_values`.
                let next = if end < bytes.len() && bytes[end] == b';' { end + 1 } else { end };
                i = skip_whitespace(bytes, next);
                continue;
            }
            if end >= bytes.len() || bytes[end] != b'{' {
                // Statement at-rules (`@import`, `@charset`) and stray text.
                self.out.push_str(&src[i..end]);
                if end < bytes.len() && bytes[end] == b';' {
                    self.out.push(';');
                    i = end + 1;
                } else {
                    i = end;
                }
                continue;
            }

            if open.is_none() {
                let prelude = src[i..end].trim();
                if prelude == ":export" {
                    let close = self.export_block(end)?;
                    i = skip_whitespace(bytes, close + 1);
                    continue;
                }
                if prelude.starts_with(":import") {
                    return Err(ScanError::new(
                        ERR_ICSS_IMPORT,
                        "importing from another file is not supported",
                        i,
                    ));
                }
            }

            i = if bytes[i] == b'@' {
                self.at_rule(i, end, Container::Rules)?
            } else {
                self.style_rule(i, end)?
            };
        }
    }

    /// Parse a declaration block whose `{` is at `open`.
    fn parse_block(
        &mut self,
        mut i: usize,
        open: usize,
        composable: &Option<Vec<String>>,
    ) -> ScanResult<usize> {
        let src = self.src;
        let bytes = src.as_bytes();
        loop {
            i = self.copy_trivia(i)?;
            if i >= bytes.len() {
                return Err(ScanError::new(ERR_UNCLOSED_BLOCK, "Unclosed block", open));
            }
            match bytes[i] {
                b'}' => {
                    self.out.push('}');
                    return Ok(i + 1);
                }
                b';' => {
                    self.out.push(';');
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let end = scan_until(src, i, b"{;}")?;
            if end < bytes.len() && bytes[end] == b'{' {
                // Nested rule
                i = if bytes[i] == b'@' {
                    self.at_rule(i, end, Container::Declarations)?
                } else {
                    self.style_rule(i, end)?
                };
                continue;
            }

            let emitted = self.declaration(&src[i..end], i, composable)?;
            if end < bytes.len() && bytes[end] == b';' {
                if emitted {
                    self.out.push(';');
                }
                i = end + 1;
            } else {
                i = end;
            }
        }
    }

    fn style_rule(&mut self, start: usize, open: usize) -> ScanResult<usize> {
        let src = self.src;
        let (selector, composable) = self.scope_selector(&src[start..open], start)?;
        self.out.push_str(&selector);
        self.out.push('{');
        self.parse_block(open + 1, open, &composable)
    }

    fn at_rule(&mut self, start: usize, open: usize, container: Container) -> ScanResult<usize> {
        let src = self.src;
        let name_end = read_ident(src, start + 1);
        let name = src[start + 1..name_end].to_ascii_lowercase();

        if name.ends_with("keyframes") {
            let params = self.keyframes_params(&src[name_end..open], name_end)?;
            self.out.push_str(&src[start..name_end]);
            self.out.push_str(&params);
            let close = self.block_end(open)?;
            self.out.push_str(&src[open..=close]);
            return Ok(close + 1);
        }

        if name == "media" {
            let params = self.substitute(&src[name_end..open], name_end)?;
            self.out.push_str(&src[start..name_end]);
            self.out.push_str(&params);
            self.out.push('{');
        } else {
            self.out.push_str(&src[start..=open]);
        }
        if GROUP_AT_RULES.contains(name.as_str()) {
            return match container {
                Container::Rules => self.parse_rules(open + 1, Some(open)),
                Container::Declarations => self.parse_block(open + 1, open, &None),
            };
        }

        // @font-face, @page, @property, ...
        let close = self.block_end(open)?;
        self.out.push_str(&src[open + 1..=close]);
        Ok(close + 1)
    }

    /// Offset of the `}` closing the block opened at `open`.
    fn block_end(&self, open: usize) -> ScanResult<usize> {
        let src = self.src;
        let bytes = src.as_bytes();
        let mut depth = 1;
        let mut i = open + 1;
        loop {
            let end = scan_until(src, i, b"{}")?;
            if end >= bytes.len() {
                return Err(ScanError::new(ERR_UNCLOSED_BLOCK, "Unclosed block", open));
            }
            if bytes[end] == b'{' {
                depth += 1;
            } else {
                depth -= 1;
                if depth == 0 {
                    return Ok(end);
                }
            }
            i = end + 1;
        }
    }

    fn keyframes_params(&mut self, params: &str, offset: usize) -> ScanResult<String> {
        let body = params.trim();
        if body.is_empty() {
            return Ok(params.to_string());
        }
        let lead = params.len() - params.trim_start().len();
        let tail = params.trim_end().len();

        let scoped = match unwrap_scope(body) {
            Some((mode, inner)) => {
                if inner.is_empty() {
                    return Err(ScanError::new(
                        ERR_EMPTY_SCOPE,
                        "Empty :global() or :local()",
                        offset + lead,
                    ));
                }
                match mode {
                    ScopeBehaviour::Global => inner.to_string(),
                    ScopeBehaviour::Local => self.local(inner),
                }
            }
            None if self.behaviour == ScopeBehaviour::Local && PLAIN_IDENT.is_match(body) => {
                self.local(body)
            }
            None => body.to_string(),
        };
        Ok(format!("{}{}{}", &params[..lead], scoped, &params[tail..]))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ICSS VALUES & EXPORTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Record every top-level `@value`, so uses before the definition resolve too.
    fn collect_values(&mut self) -> ScanResult<()> {
        let src = self.src;
        let bytes = src.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i].is_ascii_whitespace() || bytes[i] == b';' {
                i += 1;
                continue;
            }
            if starts_comment(bytes, i) {
                i = skip_comment(src, i)?;
                continue;
            }
            let end = scan_until(src, i, b"{;}")?;
            if end < bytes.len() && bytes[end] == b'{' {
                i = self.block_end(end)? + 1;
                continue;
            }
            if at_rule_name(src, i).as_deref() == Some("value") {
                self.define_value(i, end)?;
            }
            i = end + 1;
        }
        Ok(())
    }

    fn define_value(&mut self, start: usize, end: usize) -> ScanResult<()> {
        let src = self.src;
        let name_end = read_ident(src, start + 1);
        let params = src[name_end..end].trim();
        if VALUE_IMPORT.is_match(params) {
            return Err(ScanError::new(
                ERR_ICSS_IMPORT,
                "importing @value from another file is not supported",
                start,
            ));
        }
        let invalid = || ScanError::new(ERR_INVALID_VALUE, "Invalid @value definition", start);
        let caps = VALUE_DEFINITION.captures(params).ok_or_else(invalid)?;
        let raw = caps[2].trim();
        if raw.is_empty() {
            return Err(invalid());
        }
        let value = self.substitute(raw, name_end)?;
        self.values.insert(caps[1].to_string(), value);
        Ok(())
    }

    /// Read a `:export` block opened at `open`; nothing is emitted.
    fn export_block(&mut self, open: usize) -> ScanResult<usize> {
        let src = self.src;
        let close = self.block_end(open)?;
        let body = &src[open + 1..close];
        for (start, decl) in split_top_level(body, b';').map_err(shifted(open + 1))? {
            if decl.trim().is_empty() {
                continue;
            }
            let offset = open + 1 + start;
            let colon = scan_until(decl, 0, b":").map_err(shifted(offset))?;
            if colon >= decl.len() {
                return Err(ScanError::new(
                    ERR_INVALID_EXPORT,
                    "Expected `name: value` in :export",
                    offset,
                ));
            }
            let key = decl[..colon].trim().to_string();
            let value = self.substitute(decl[colon + 1..].trim(), offset + colon + 1)?;
            self.icss_exports.insert(key, value);
        }
        Ok(close)
    }

    /// Replace whole words that name a `@value`. Strings and comments are
    /// left alone.
    fn substitute(&self, text: &str, offset: usize) -> ScanResult<String> {
        if self.values.is_empty() {
            return Ok(text.to_string());
        }
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < bytes.len() {
            let end = match bytes[i] {
                b'"' | b'\'' => skip_string(text, i).map_err(shifted(offset))?,
                b'/' if starts_comment(bytes, i) => {
                    skip_comment(text, i).map_err(shifted(offset))?
                }
                b if is_ident_char(b) => {
                    let end = read_ident(text, i);
                    if let Some(value) = self.values.get(&text[i..end]) {
                        out.push_str(value);
                        i = end;
                        continue;
                    }
                    end
                }
                _ => next_char_end(text, i),
            };
            out.push_str(&text[i..end]);
            i = end;
        }
        Ok(out)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DECLARATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Emit one declaration. Returns false when it was consumed (`composes`).
    fn declaration(
        &mut self,
        decl: &str,
        offset: usize,
        composable: &Option<Vec<String>>,
    ) -> ScanResult<bool> {
        let colon = scan_until(decl, 0, b":").map_err(shifted(offset))?;
        if colon >= decl.len() {
            self.out.push_str(decl);
            return Ok(true);
        }
        let prop = decl[..colon].trim().to_ascii_lowercase();
        let value = &decl[colon + 1..];

        if prop == "composes" || prop == "compose-with" {
            self.compose(value, offset + colon + 1, composable)?;
            let kept = self.out.trim_end().len();
            self.out.truncate(kept);
            return Ok(false);
        }

        let value = self.substitute(value, offset + colon + 1)?;
        if self.behaviour == ScopeBehaviour::Local {
            if let Some(caps) = ANIMATION_PROP.captures(&prop) {
                let shorthand = caps.get(1).is_none();
                let scoped = self
                    .scope_animation(&value, shorthand)
                    .map_err(shifted(offset + colon + 1))?;
                self.out.push_str(&decl[..=colon]);
                self.out.push_str(&scoped);
                return Ok(true);
            }
        }

        self.out.push_str(&decl[..=colon]);
        self.out.push_str(&value);
        Ok(true)
    }

    fn scope_animation(&mut self, value: &str, shorthand: bool) -> ScanResult<String> {
        let mut animations = Vec::new();
        for (start, part) in split_top_level(value, b',')? {
            let bytes = part.as_bytes();
            let mut out = String::with_capacity(part.len());
            let mut named = false;
            let mut i = 0;
            while i < bytes.len() {
                if bytes[i].is_ascii_whitespace() {
                    out.push(bytes[i] as char);
                    i += 1;
                    continue;
                }
                let end = scan_until(part, i, b" \t\n\r\x0c").map_err(shifted(start))?;
                let token = &part[i..end];
                let is_name = PLAIN_IDENT.is_match(token)
                    && !ANIMATION_KEYWORDS.contains(token.to_ascii_lowercase().as_str());
                if is_name && !(shorthand && named) {
                    out.push_str(&self.local(token));
                    named = true;
                } else {
                    out.push_str(token);
                }
                i = end;
            }
            animations.push(out);
        }
        Ok(animations.join(","))
    }

    fn compose(
        &mut self,
        value: &str,
        offset: usize,
        composable: &Option<Vec<String>>,
    ) -> ScanResult<()> {
        let targets = match composable {
            Some(classes) if !classes.is_empty() => classes.clone(),
            _ => {
                return Err(ScanError::new(
                    ERR_COMPOSES_SELECTOR,
                    "composes is only allowed when the selector is a single local class",
                    offset,
                ))
            }
        };

        let value = value.trim();
        let (names, from) = match COMPOSES_FROM.captures(value) {
            Some(caps) => (
                caps.get(1).map(|m| m.as_str()).unwrap_or(""),
                caps.get(2).map(|m| m.as_str().trim()),
            ),
            None => (value, None),
        };

        let mut tokens = Vec::new();
        for name in names.split_whitespace() {
            match from {
                None => match self.exports.get(name) {
                    Some(existing) => tokens.push(existing[0].clone()),
                    None => {
                        return Err(ScanError::new(
                            ERR_COMPOSES_UNKNOWN,
                            "composes references a class that is not defined before this rule",
                            offset,
                        ))
                    }
                },
                Some("global") => tokens.push(name.to_string()),
                Some(_) => {
                    return Err(ScanError::new(
                        ERR_COMPOSES_EXTERNAL,
                        "composing from another file is not supported",
                        offset,
                    ))
                }
            }
        }

        for class in targets {
            let entry = self.exports.entry(class).or_default();
            for token in &tokens {
                if !entry.contains(token) {
                    entry.push(token.clone());
                }
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SELECTORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Scope a rule prelude. The second value lists the class names a
    /// `composes` inside this rule applies to, when the selector allows it.
    fn scope_selector(
        &mut self,
        prelude: &str,
        offset: usize,
    ) -> ScanResult<(String, Option<Vec<String>>)> {
        let mut items = Vec::new();
        let mut composable = Some(Vec::new());
        for (start, item) in split_top_level(prelude, b',').map_err(shifted(offset))? {
            let single = single_local_class(item, self.behaviour);
            let scoped = self.scope_compound(item, offset + start, self.behaviour)?;
            match single {
                Some(name) => {
                    if let Some(list) = composable.as_mut() {
                        list.push(name);
                    }
                }
                None => composable = None,
            }
            items.push(scoped);
        }
        Ok((items.join(","), composable))
    }

    fn scope_list(&mut self, text: &str, offset: usize, mode: ScopeBehaviour) -> ScanResult<String> {
        let mut items = Vec::new();
        for (start, item) in split_top_level(text, b',').map_err(shifted(offset))? {
            items.push(self.scope_compound(item, offset + start, mode)?);
        }
        Ok(items.join(","))
    }

    /// Scope one comma-free selector.
    fn scope_compound(
        &mut self,
        text: &str,
        offset: usize,
        mut mode: ScopeBehaviour,
    ) -> ScanResult<String> {
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            match b {
                b'"' | b'\'' => {
                    let end = skip_string(text, i).map_err(shifted(offset))?;
                    out.push_str(&text[i..end]);
                    i = end;
                }
                b'/' if starts_comment(bytes, i) => {
                    let end = skip_comment(text, i).map_err(shifted(offset))?;
                    out.push_str(&text[i..end]);
                    i = end;
                }
                b'[' => {
                    let end = scan_until(text, i + 1, b"]").map_err(shifted(offset))?;
                    if end >= bytes.len() {
                        return Err(ScanError::new(
                            ERR_UNCLOSED_BRACKET,
                            "Unclosed bracket",
                            offset + i,
                        ));
                    }
                    out.push_str(&text[i..=end]);
                    i = end + 1;
                }
                b'.' | b'#' if starts_name(bytes, i + 1) => {
                    let end = read_ident(text, i + 1);
                    let name = &text[i + 1..end];
                    out.push(b as char);
                    match mode {
                        ScopeBehaviour::Local => out.push_str(&self.local(name)),
                        ScopeBehaviour::Global => out.push_str(name),
                    }
                    i = end;
                }
                b':' => {
                    let double = bytes.get(i + 1) == Some(&b':');
                    let name_start = if double { i + 2 } else { i + 1 };
                    let name_end = read_ident(text, name_start);
                    let pseudo = text[name_start..name_end].to_ascii_lowercase();
                    let has_args = bytes.get(name_end) == Some(&b'(');
                    let switch = match pseudo.as_str() {
                        "global" if !double => Some(ScopeBehaviour::Global),
                        "local" if !double => Some(ScopeBehaviour::Local),
                        _ => None,
                    };

                    match (switch, has_args) {
                        (Some(target), true) => {
                            let close = matching_paren(text, name_end).map_err(shifted(offset))?;
                            let inner = &text[name_end + 1..close];
                            if inner.trim().is_empty() {
                                return Err(ScanError::new(
                                    ERR_EMPTY_SCOPE,
                                    "Empty :global() or :local()",
                                    offset + i,
                                ));
                            }
                            out.push_str(&self.scope_list(inner, offset + name_end + 1, target)?);
                            i = close + 1;
                        }
                        (Some(target), false) => {
                            mode = target;
                            let mut k = name_end;
                            while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                                k += 1;
                            }
                            let needs_space = k < bytes.len()
                                && !out.is_empty()
                                && !out.ends_with(|c: char| c.is_whitespace())
                                && !matches!(bytes[k], b'>' | b'+' | b'~');
                            if needs_space {
                                out.push(' ');
                            }
                            i = k;
                        }
                        (None, true) => {
                            let close = matching_paren(text, name_end).map_err(shifted(offset))?;
                            out.push_str(&text[i..=name_end]);
                            out.push_str(&self.scope_list(
                                &text[name_end + 1..close],
                                offset + name_end + 1,
                                mode,
                            )?);
                            out.push(')');
                            i = close + 1;
                        }
                        (None, false) => {
                            out.push_str(&text[i..name_end]);
                            i = name_end;
                        }
                    }
                }
                b'\\' => {
                    let end = next_char_end(text, i + 1);
                    out.push_str(&text[i..end]);
                    i = end;
                }
                _ => {
                    let end = next_char_end(text, i);
                    out.push_str(&text[i..end]);
                    i = end;
                }
            }
        }
        Ok(out)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lowercased name of the at-rule starting at `pos`, if one does.
fn at_rule_name(src: &str, pos: usize) -> Option<String> {
    if src.as_bytes().get(pos) != Some(&b'@') {
        return None;
    }
    let end = read_ident(src, pos + 1);
    Some(src[pos + 1..end].to_ascii_lowercase())
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// True when a class or id name can start at `pos` (`.5` and `#fff` cannot).
fn starts_name(bytes: &[u8], pos: usize) -> bool {
    match bytes.get(pos) {
        Some(b'-') => bytes
            .get(pos + 1)
            .map(|b| b.is_ascii_alphabetic() || *b == b'_' || *b == b'-' || *b >= 0x80)
            .unwrap_or(false),
        Some(b) => b.is_ascii_alphabetic() || *b == b'_' || *b >= 0x80 || *b == b'\\',
        None => false,
    }
}

/// `:global(x)` / `:local(x)` → (mode, trimmed x).
fn unwrap_scope(body: &str) -> Option<(ScopeBehaviour, &str)> {
    let (mode, rest) = if let Some(rest) = body.strip_prefix(":global(") {
        (ScopeBehaviour::Global, rest)
    } else if let Some(rest) = body.strip_prefix(":local(") {
        (ScopeBehaviour::Local, rest)
    } else {
        return None;
    };
    rest.strip_suffix(')').map(|inner| (mode, inner.trim()))
}

fn single_local_class(item: &str, behaviour: ScopeBehaviour) -> Option<String> {
    let item = item.trim();
    if behaviour == ScopeBehaviour::Local {
        if let Some(caps) = SINGLE_CLASS.captures(item) {
            return Some(caps[1].to_string());
        }
    }
    SINGLE_LOCAL_CLASS
        .captures(item)
        .map(|caps| caps[1].to_string())
}

/// Replace characters that cannot appear in a class name.
fn sanitize_ident(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii() {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

pub fn camel_case(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    if words.is_empty() {
        return name.to_string();
    }

    let mut out = String::with_capacity(name.len());
    for (index, word) in words.iter().enumerate() {
        let lower = word.to_lowercase();
        if index == 0 {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

pub fn dashes_camel_case(name: &str) -> String {
    DASHES
        .replace_all(name, |caps: &Captures| caps[1].to_uppercase())
        .into_owned()
}

fn apply_convention(
    exports: IndexMap<String, Vec<String>>,
    convention: Option<LocalsConvention>,
) -> ClassMap {
    let mut classes = ClassMap::new();
    for (local, tokens) in exports {
        let value = tokens.join(" ");
        let keys: Vec<String> = match convention {
            None => vec![local],
            Some(LocalsConvention::CamelCase) => {
                let camel = camel_case(&local);
                vec![local, camel]
            }
            Some(LocalsConvention::CamelCaseOnly) => vec![camel_case(&local)],
            Some(LocalsConvention::Dashes) => {
                let dashed = dashes_camel_case(&local);
                vec![local, dashed]
            }
            Some(LocalsConvention::DashesOnly) => vec![dashes_camel_case(&local)],
        };
        for key in keys {
            classes.insert(key, value.clone());
        }
    }
    classes
}
