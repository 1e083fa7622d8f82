use std::path::PathBuf;

/// An opaque statement, passed through aggregation unchanged.
///
/// The first physical line is stored without the enclosing block's
/// indentation so an inlined statement can be re-indented to wherever it is
/// spliced. Continuation lines (bracket, backslash and string continuations)
/// are kept verbatim; indentation is only significant on the head line, and
/// the bytes inside string literals must never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStmt {
    /// Physical source lines of the statement, head line dedented.
    pub lines: Vec<String>,
    /// Blank and comment-only lines keep their original leading whitespace
    /// and are never re-indented.
    pub verbatim: bool,
}

impl RawStmt {
    pub fn opaque(lines: Vec<String>) -> Self {
        Self {
            lines,
            verbatim: false,
        }
    }

    pub fn verbatim(line: String) -> Self {
        Self {
            lines: vec![line],
            verbatim: true,
        }
    }
}

/// One `name as asname` entry of an import statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportAlias {
    /// Dotted module name for `import a.b`, plain identifier (or `*`) for
    /// `from m import name`.
    pub name: String,
    pub asname: Option<String>,
}

impl ImportAlias {
    pub fn new(name: impl Into<String>, asname: Option<String>) -> Self {
        Self {
            name: name.into(),
            asname,
        }
    }

    fn to_source(&self) -> String {
        match &self.asname {
            Some(asname) => format!("{} as {}", self.name, asname),
            None => self.name.clone(),
        }
    }
}

/// A plain `import a.b as c, d` statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportStmt {
    pub names: Vec<ImportAlias>,
}

impl ImportStmt {
    pub fn to_source(&self) -> String {
        format!("import {}", render_aliases(&self.names))
    }
}

/// A `from X import a as b, c` statement.
///
/// `level` counts the leading dots of a relative import (`from ..m import x`
/// has level 2); `module` may be empty for the `from . import x` form.
/// Structural equality (and hashing) over module, level and alias list is the
/// deduplication key for hoisted external imports, so two sources written
/// with different whitespace collapse to one statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportFromStmt {
    pub module: String,
    pub level: u32,
    pub names: Vec<ImportAlias>,
}

impl ImportFromStmt {
    /// The module as written, leading dots included.
    pub fn module_display(&self) -> String {
        format!("{}{}", ".".repeat(self.level as usize), self.module)
    }

    pub fn to_source(&self) -> String {
        format!(
            "from {} import {}",
            self.module_display(),
            render_aliases(&self.names)
        )
    }
}

fn render_aliases(names: &[ImportAlias]) -> String {
    names
        .iter()
        .map(ImportAlias::to_source)
        .collect::<Vec<_>>()
        .join(", ")
}

/// An external import collected for hoisting to the top of the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HoistedImport {
    Import(ImportStmt),
    From(ImportFromStmt),
}

/// An ordered sequence of nodes plus the block's indentation relative to its
/// parent. The root block of a file has an empty indent; nested suites keep
/// the exact indentation string observed in the source so an untouched tree
/// renders back byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub indent: String,
    pub body: Vec<Node>,
}

impl Block {
    pub fn new(indent: String) -> Self {
        Self {
            indent,
            body: Vec::new(),
        }
    }
}

/// Closed set of node kinds the aggregator distinguishes. Every transform
/// matches exhaustively, so a new kind is a compile-time exercise rather
/// than a silent pass-through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Statement(RawStmt),
    Import(ImportStmt),
    ImportFrom(ImportFromStmt),
    Block(Block),
}

/// A parsed source file. Immutable after load; identified by its path.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub tree: Block,
}
