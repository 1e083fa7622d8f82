use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::syntax::{Block, ImportAlias, ImportFromStmt, ImportStmt, Node, RawStmt, SourceFile};
use crate::util::normalize_line_endings;

/// A source file whose text could not be parsed into a statement tree.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub path: PathBuf,
    /// 1-based physical line number of the offending logical line.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

fn parse_err(path: &Path, line: usize, message: impl Into<String>) -> ParseError {
    ParseError {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

static KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:import|from)\b").expect("invalid import keyword pattern"));
static IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^import\s+(.+)$").expect("invalid import pattern"));
static FROM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^from\s+([.\w]+)\s+import\s+(.+)$").expect("invalid from pattern"));
static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*$").expect("invalid identifier pattern"));
static DOTTED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*$").expect("invalid dotted name pattern")
});

/// Read and parse a source file.
///
/// Line endings are normalized to LF before parsing; there is no caching, a
/// later aggregation run reloads and reparses every file.
pub fn load(path: &Path) -> Result<SourceFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file: {:?}", path))?;
    let source = normalize_line_endings(raw);
    let tree = parse_source(&source, path)?;
    debug!("Parsed {:?}: {} top-level nodes", path, tree.body.len());
    Ok(SourceFile {
        path: path.to_path_buf(),
        tree,
    })
}

/// Parse normalized source text into the statement tree.
pub fn parse_source(source: &str, path: &Path) -> Result<Block, ParseError> {
    let lines = split_physical_lines(source);
    let logical = collect_logical_lines(&lines, path)?;
    build_tree(logical, path)
}

fn split_physical_lines(source: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = source.split('\n').collect();
    // A trailing newline produces one empty trailing element, drop it so the
    // render step (which terminates every line) reproduces the input.
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrKind {
    /// A short string delimited by one quote character; line-local unless the
    /// line ends with a backslash.
    Short(char),
    /// A triple-quoted string, which may span physical lines.
    Triple(char),
}

#[derive(Debug, Default)]
struct ScanState {
    depth: i32,
    string: Option<StrKind>,
    /// Set when the line ends in an explicit backslash continuation.
    backslash: bool,
}

impl ScanState {
    fn continues(&self) -> bool {
        self.string.is_some() || self.depth > 0 || self.backslash
    }
}

/// Advance the tokenizer state over one physical line.
///
/// When `flat` is given, the retained characters (everything except comments
/// and trailing continuation backslashes) are appended to it, producing the
/// single-line text used for import recognition.
fn scan_line(line: &str, st: &mut ScanState, mut flat: Option<&mut String>) -> Result<(), String> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    st.backslash = false;

    let keep = |out: &mut Option<&mut String>, c: char| {
        if let Some(buf) = out.as_mut() {
            buf.push(c);
        }
    };

    while i < chars.len() {
        let c = chars[i];
        if let Some(kind) = st.string {
            match kind {
                StrKind::Triple(q) => {
                    if c == '\\' {
                        keep(&mut flat, c);
                        if let Some(&next) = chars.get(i + 1) {
                            keep(&mut flat, next);
                        }
                        i += 2;
                        continue;
                    }
                    if c == q && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q) {
                        st.string = None;
                        keep(&mut flat, q);
                        keep(&mut flat, q);
                        keep(&mut flat, q);
                        i += 3;
                        continue;
                    }
                    keep(&mut flat, c);
                    i += 1;
                }
                StrKind::Short(q) => {
                    if c == '\\' {
                        keep(&mut flat, c);
                        if let Some(&next) = chars.get(i + 1) {
                            keep(&mut flat, next);
                        } else {
                            // Backslash at end of line: the string continues
                            // on the next physical line.
                            st.backslash = true;
                        }
                        i += 2;
                        continue;
                    }
                    if c == q {
                        st.string = None;
                    }
                    keep(&mut flat, c);
                    i += 1;
                }
            }
            continue;
        }
        match c {
            '#' => break,
            '\'' | '"' => {
                if chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c) {
                    st.string = Some(StrKind::Triple(c));
                    keep(&mut flat, c);
                    keep(&mut flat, c);
                    keep(&mut flat, c);
                    i += 3;
                } else {
                    st.string = Some(StrKind::Short(c));
                    keep(&mut flat, c);
                    i += 1;
                }
            }
            '(' | '[' | '{' => {
                st.depth += 1;
                keep(&mut flat, c);
                i += 1;
            }
            ')' | ']' | '}' => {
                st.depth -= 1;
                if st.depth < 0 {
                    return Err("unmatched closing bracket".to_owned());
                }
                keep(&mut flat, c);
                i += 1;
            }
            '\\' => {
                if i + 1 == chars.len() {
                    st.backslash = true;
                    i += 1;
                } else {
                    keep(&mut flat, c);
                    keep(&mut flat, chars[i + 1]);
                    i += 2;
                }
            }
            _ => {
                keep(&mut flat, c);
                i += 1;
            }
        }
    }

    if let Some(StrKind::Short(_)) = st.string {
        if !st.backslash {
            return Err("unterminated string literal".to_owned());
        }
    }
    Ok(())
}

#[derive(Debug)]
struct LogicalLine {
    /// Leading whitespace of the head physical line.
    indent: String,
    /// Verbatim physical lines, head line included.
    lines: Vec<String>,
    /// 1-based number of the head physical line.
    number: usize,
    blank_or_comment: bool,
}

fn collect_logical_lines(phys: &[&str], path: &Path) -> Result<Vec<LogicalLine>, ParseError> {
    let mut logical = Vec::new();
    let mut idx = 0;
    while idx < phys.len() {
        let raw = phys[idx];
        let stripped = raw.trim_start();
        if stripped.is_empty() || stripped.starts_with('#') {
            logical.push(LogicalLine {
                indent: String::new(),
                lines: vec![raw.to_owned()],
                number: idx + 1,
                blank_or_comment: true,
            });
            idx += 1;
            continue;
        }

        let indent = raw[..raw.len() - stripped.len()].to_owned();
        let start = idx;
        let mut st = ScanState::default();
        let mut lines = vec![raw.to_owned()];
        scan_line(raw, &mut st, None).map_err(|m| parse_err(path, idx + 1, m))?;
        while st.continues() {
            idx += 1;
            if idx >= phys.len() {
                let message = if st.string.is_some() {
                    "unterminated string literal at end of file"
                } else if st.depth > 0 {
                    "unclosed bracket at end of file"
                } else {
                    "line continuation at end of file"
                };
                return Err(parse_err(path, start + 1, message));
            }
            lines.push(phys[idx].to_owned());
            scan_line(phys[idx], &mut st, None).map_err(|m| parse_err(path, idx + 1, m))?;
        }
        logical.push(LogicalLine {
            indent,
            lines,
            number: start + 1,
            blank_or_comment: false,
        });
        idx += 1;
    }
    Ok(logical)
}

/// Collapse a logical line into one comment-free text line for import
/// recognition and parsing.
fn flatten_logical(lines: &[String]) -> String {
    let mut st = ScanState::default();
    let mut parts = Vec::with_capacity(lines.len());
    for line in lines {
        let mut flat = String::new();
        // State errors were already reported when the logical line was
        // assembled; a second pass over the same text cannot fail.
        let _ = scan_line(line, &mut st, Some(&mut flat));
        parts.push(flat.trim().to_owned());
    }
    parts.join(" ").trim().to_owned()
}

struct OpenBlock {
    /// Indentation accumulated from the root down to this block.
    acc_indent: String,
    block: Block,
}

fn build_tree(logical: Vec<LogicalLine>, path: &Path) -> Result<Block, ParseError> {
    let mut stack = vec![OpenBlock {
        acc_indent: String::new(),
        block: Block::new(String::new()),
    }];

    for ll in logical {
        if ll.blank_or_comment {
            let line = ll.lines.into_iter().next().unwrap_or_default();
            let top = stack.last_mut().expect("block stack is never empty");
            top.block.body.push(Node::Statement(RawStmt::verbatim(line)));
            continue;
        }

        let cur = stack
            .last()
            .expect("block stack is never empty")
            .acc_indent
            .clone();
        if ll.indent == cur {
            // Same level, fall through.
        } else if ll.indent.len() > cur.len() && ll.indent.starts_with(&cur) {
            let relative = ll.indent[cur.len()..].to_owned();
            stack.push(OpenBlock {
                acc_indent: ll.indent.clone(),
                block: Block::new(relative),
            });
        } else {
            loop {
                if stack.len() == 1 {
                    return Err(parse_err(
                        path,
                        ll.number,
                        "unindent does not match any outer indentation level",
                    ));
                }
                let done = stack.pop().expect("stack length checked above");
                let parent = stack.last_mut().expect("stack length checked above");
                parent.block.body.push(Node::Block(done.block));
                let acc = &stack.last().expect("block stack is never empty").acc_indent;
                if *acc == ll.indent {
                    break;
                }
                if acc.len() < ll.indent.len() {
                    return Err(parse_err(path, ll.number, "inconsistent indentation"));
                }
            }
        }

        let node = statement_node(&ll, path)?;
        stack
            .last_mut()
            .expect("block stack is never empty")
            .block
            .body
            .push(node);
    }

    while stack.len() > 1 {
        let done = stack.pop().expect("stack length checked above");
        let parent = stack.last_mut().expect("stack length checked above");
        parent.block.body.push(Node::Block(done.block));
    }
    Ok(stack.pop().expect("root block remains").block)
}

fn statement_node(ll: &LogicalLine, path: &Path) -> Result<Node, ParseError> {
    let flat = flatten_logical(&ll.lines);
    if KEYWORD_RE.is_match(&flat) {
        return parse_import(&flat, ll, path);
    }
    // One-line compound suites (`if debug: import pdb`) and semicolon
    // chains (`x = 1; import os`) bury an import where inlining cannot
    // splice a module body. Passing them through would leave imports in
    // the output, so they are rejected outright.
    if let Some(embedded) = embedded_import(&flat) {
        return Err(parse_err(
            path,
            ll.number,
            format!(
                "import statement inside a one-line suite or statement chain: `{}`; \
                 put the import on its own line",
                embedded
            ),
        ));
    }
    let mut lines = ll.lines.clone();
    lines[0] = lines[0][ll.indent.len()..].to_owned();
    Ok(Node::Statement(RawStmt::opaque(lines)))
}

/// Scan a flattened logical line for an `import`/`from` statement that
/// follows a suite colon or a statement semicolon at bracket depth zero,
/// outside string literals. Returns the offending segment.
fn embedded_import(flat: &str) -> Option<String> {
    let chars: Vec<char> = flat.chars().collect();
    let mut string: Option<StrKind> = None;
    let mut depth = 0i32;
    let mut segments: Vec<String> = vec![String::new()];
    let push_char = |segments: &mut Vec<String>, c: char| {
        segments
            .last_mut()
            .expect("segment list is never empty")
            .push(c);
    };
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(kind) = string {
            match kind {
                StrKind::Triple(q) => {
                    if c == '\\' {
                        i += 2;
                        continue;
                    }
                    if c == q && chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q) {
                        string = None;
                        i += 3;
                        continue;
                    }
                    i += 1;
                }
                StrKind::Short(q) => {
                    if c == '\\' {
                        i += 2;
                        continue;
                    }
                    if c == q {
                        string = None;
                    }
                    i += 1;
                }
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                if chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c) {
                    string = Some(StrKind::Triple(c));
                    i += 3;
                } else {
                    string = Some(StrKind::Short(c));
                    i += 1;
                }
            }
            '(' | '[' | '{' => {
                depth += 1;
                push_char(&mut segments, c);
                i += 1;
            }
            ')' | ']' | '}' => {
                depth -= 1;
                push_char(&mut segments, c);
                i += 1;
            }
            ':' if depth == 0 && chars.get(i + 1) == Some(&'=') => {
                // Walrus operator, not a suite colon.
                push_char(&mut segments, ':');
                push_char(&mut segments, '=');
                i += 2;
            }
            ':' | ';' if depth == 0 => {
                segments.push(String::new());
                i += 1;
            }
            _ => {
                push_char(&mut segments, c);
                i += 1;
            }
        }
    }
    segments
        .into_iter()
        .skip(1)
        .map(|s| s.trim().to_owned())
        .find(|s| KEYWORD_RE.is_match(s))
}

fn parse_import(flat: &str, ll: &LogicalLine, path: &Path) -> Result<Node, ParseError> {
    if let Some(caps) = FROM_RE.captures(flat) {
        let target = &caps[1];
        let level = target.chars().take_while(|c| *c == '.').count();
        let module = &target[level..];
        if !module.is_empty() && !DOTTED_NAME_RE.is_match(module) {
            return Err(parse_err(
                path,
                ll.number,
                format!("malformed module name in import: `{}`", target),
            ));
        }
        if module.is_empty() && level == 0 {
            return Err(parse_err(path, ll.number, "missing module name in import"));
        }
        let names =
            parse_alias_list(&caps[2], true).map_err(|m| parse_err(path, ll.number, m))?;
        return Ok(Node::ImportFrom(ImportFromStmt {
            module: module.to_owned(),
            level: u32::try_from(level).unwrap_or(u32::MAX),
            names,
        }));
    }
    if let Some(caps) = IMPORT_RE.captures(flat) {
        let names =
            parse_alias_list(&caps[1], false).map_err(|m| parse_err(path, ll.number, m))?;
        return Ok(Node::Import(ImportStmt { names }));
    }
    Err(parse_err(
        path,
        ll.number,
        format!("malformed import statement: `{}`", flat),
    ))
}

/// Parse the name list of an import statement. `from_form` names are single
/// identifiers (or a sole `*`); plain-import names may be dotted.
fn parse_alias_list(text: &str, from_form: bool) -> Result<Vec<ImportAlias>, String> {
    let mut text = text.trim();
    if let Some(inner) = text.strip_prefix('(') {
        text = inner
            .strip_suffix(')')
            .ok_or_else(|| "unbalanced parentheses in import list".to_owned())?
            .trim();
    }

    let mut tokens: Vec<&str> = text.split(',').map(str::trim).collect();
    if tokens.last() == Some(&"") {
        tokens.pop();
    }
    if tokens.is_empty() {
        return Err("empty import list".to_owned());
    }

    let mut names = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.is_empty() {
            return Err("empty name in import list".to_owned());
        }
        let parts: Vec<&str> = token.split_whitespace().collect();
        let (name, asname) = match parts.as_slice() {
            [name] => (*name, None),
            [name, "as", alias] => (*name, Some((*alias).to_owned())),
            _ => return Err(format!("malformed import entry: `{}`", token)),
        };
        let valid = if from_form {
            name == "*" || IDENT_RE.is_match(name)
        } else {
            DOTTED_NAME_RE.is_match(name)
        };
        if !valid {
            return Err(format!("malformed name in import: `{}`", name));
        }
        if let Some(alias) = &asname {
            if name == "*" {
                return Err("cannot alias a `*` import".to_owned());
            }
            if !IDENT_RE.is_match(alias) {
                return Err(format!("malformed import alias: `{}`", alias));
            }
        }
        names.push(ImportAlias::new(name, asname));
    }
    Ok(names)
}
