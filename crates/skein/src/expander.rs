use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use indexmap::IndexSet;
use log::{debug, trace};

use crate::parser;
use crate::resolver::{ImportKind, ModuleResolver};
use crate::syntax::{Block, HoistedImport, ImportFromStmt, ImportStmt, Node, SourceFile};

/// Mutable state scoped to one aggregation run, threaded by reference
/// through every recursive call.
#[derive(Debug, Default)]
pub struct AggregationContext {
    /// Modules already fully inlined; a second import site for one of these
    /// is dropped without re-emitting the body.
    pub visited: IndexSet<PathBuf>,
    /// Expansion stack. A local import resolving to a path on this stack is
    /// a true cycle, not diamond reuse.
    pub in_progress: Vec<PathBuf>,
    /// External imports collected for hoisting, structurally deduplicated,
    /// insertion order preserved.
    pub hoisted: IndexSet<HoistedImport>,
}

impl AggregationContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A plain `import X` (or `from . import X`) whose target is a local module.
///
/// Inlining splices a module's statements into the importing scope; there is
/// no module object to bind the name to, so this form is a configuration
/// error rather than something to silently rewrite.
#[derive(Debug, Clone)]
pub struct UnsupportedImportForm {
    /// File containing the offending statement.
    pub path: PathBuf,
    /// The statement, in canonical spelling.
    pub statement: String,
    /// The local file the import resolved to.
    pub target: PathBuf,
}

impl fmt::Display for UnsupportedImportForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: `{}` imports local module {} as a namespace, which cannot be inlined; \
             use `from <module> import <names>` instead",
            self.path.display(),
            self.statement,
            self.target.display()
        )
    }
}

impl std::error::Error for UnsupportedImportForm {}

/// The recursive inlining engine. Walks a tree depth-first in statement
/// order; local `from` imports are replaced in place by the expanded body of
/// the target module, external imports are moved to the hoist collection.
pub struct Expander<'a> {
    resolver: &'a ModuleResolver,
}

impl<'a> Expander<'a> {
    pub fn new(resolver: &'a ModuleResolver) -> Self {
        Self { resolver }
    }

    /// Expand a loaded file. The file's canonical path is marked visited
    /// before its body is walked, so cycles terminate.
    pub fn expand(&self, file: &SourceFile, ctx: &mut AggregationContext) -> Result<Block> {
        let canonical = file
            .path
            .canonicalize()
            .unwrap_or_else(|_| file.path.clone());
        ctx.visited.insert(canonical.clone());
        ctx.in_progress.push(canonical);
        let expanded = self.expand_block(&file.tree, &file.path, ctx)?;
        ctx.in_progress.pop();
        Ok(expanded)
    }

    fn expand_block(
        &self,
        block: &Block,
        file_path: &Path,
        ctx: &mut AggregationContext,
    ) -> Result<Block> {
        let mut out = Block::new(block.indent.clone());
        for node in &block.body {
            match node {
                Node::Statement(stmt) => out.body.push(Node::Statement(stmt.clone())),
                Node::Block(inner) => {
                    let expanded = self.expand_block(inner, file_path, ctx)?;
                    out.body.push(Node::Block(expanded));
                }
                Node::Import(stmt) => self.expand_import(stmt, file_path, ctx)?,
                Node::ImportFrom(stmt) => self.expand_import_from(stmt, file_path, ctx, &mut out)?,
            }
        }
        Ok(out)
    }

    /// Plain imports are either hoisted (external) or rejected (local).
    fn expand_import(
        &self,
        stmt: &ImportStmt,
        file_path: &Path,
        ctx: &mut AggregationContext,
    ) -> Result<()> {
        for alias in &stmt.names {
            if let ImportKind::Local(target) = self.resolver.classify_name(&alias.name) {
                return Err(UnsupportedImportForm {
                    path: file_path.to_path_buf(),
                    statement: stmt.to_source(),
                    target,
                }
                .into());
            }
        }
        trace!("Hoisting `{}` from {:?}", stmt.to_source(), file_path);
        ctx.hoisted.insert(HoistedImport::Import(stmt.clone()));
        Ok(())
    }

    fn expand_import_from(
        &self,
        stmt: &ImportFromStmt,
        file_path: &Path,
        ctx: &mut AggregationContext,
        out: &mut Block,
    ) -> Result<()> {
        // An imported name that is itself a local module file binds a module
        // object, the same restriction as a plain import. This covers
        // `from . import name` as well as `from pkg import helper` where
        // `pkg/helper.py` exists under a search path.
        for alias in &stmt.names {
            if let Some(target) = self.resolver.resolve_member(stmt, file_path, &alias.name) {
                return Err(UnsupportedImportForm {
                    path: file_path.to_path_buf(),
                    statement: stmt.to_source(),
                    target,
                }
                .into());
            }
        }
        if stmt.level > 0 && stmt.module.is_empty() {
            // `from . import name` with no local hit refers to an installed
            // package, leave it for the hoist block.
            ctx.hoisted.insert(HoistedImport::From(stmt.clone()));
            return Ok(());
        }

        match self.resolver.classify_from(stmt, file_path) {
            ImportKind::External => {
                trace!("Hoisting `{}` from {:?}", stmt.to_source(), file_path);
                ctx.hoisted.insert(HoistedImport::From(stmt.clone()));
                Ok(())
            }
            ImportKind::Local(target) => {
                if ctx.in_progress.contains(&target) {
                    let mut chain: Vec<String> = ctx
                        .in_progress
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect();
                    chain.push(target.display().to_string());
                    return Err(anyhow!(
                        "cyclic local import `{}` in {}: {}",
                        stmt.to_source(),
                        file_path.display(),
                        chain.join(" → ")
                    ));
                }
                if ctx.visited.contains(&target) {
                    debug!(
                        "Module {:?} already inlined, dropping `{}`",
                        target,
                        stmt.to_source()
                    );
                    return Ok(());
                }
                debug!(
                    "Inlining {:?} in place of `{}` (imported by {:?})",
                    target,
                    stmt.to_source(),
                    file_path
                );
                let module = parser::load(&target)?;
                let expanded = self.expand(&module, ctx)?;
                out.body.extend(expanded.body);
                Ok(())
            }
        }
    }
}
