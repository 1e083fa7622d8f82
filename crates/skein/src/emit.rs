use crate::expander::AggregationContext;
use crate::syntax::{Block, HoistedImport, Node, RawStmt};

/// The external imports collected during expansion, as a block ready to be
/// prepended to the expanded body: structurally deduplicated, first-seen
/// order preserved.
pub fn hoist_block(ctx: &AggregationContext) -> Block {
    let mut block = Block::new(String::new());
    for import in &ctx.hoisted {
        match import {
            HoistedImport::Import(stmt) => block.body.push(Node::Import(stmt.clone())),
            HoistedImport::From(stmt) => block.body.push(Node::ImportFrom(stmt.clone())),
        }
    }
    block
}

/// Serialize a tree back to source text.
///
/// Statement head lines receive the accumulated block indentation;
/// continuation lines and blank/comment lines pass through verbatim. Import
/// nodes render in canonical spelling.
pub fn render(block: &Block) -> String {
    let mut out = String::new();
    render_into(block, "", &mut out);
    out
}

fn render_into(block: &Block, parent_indent: &str, out: &mut String) {
    let indent = format!("{}{}", parent_indent, block.indent);
    for node in &block.body {
        match node {
            Node::Statement(stmt) => render_statement(stmt, &indent, out),
            Node::Import(stmt) => {
                out.push_str(&indent);
                out.push_str(&stmt.to_source());
                out.push('\n');
            }
            Node::ImportFrom(stmt) => {
                out.push_str(&indent);
                out.push_str(&stmt.to_source());
                out.push('\n');
            }
            Node::Block(inner) => render_into(inner, &indent, out),
        }
    }
}

fn render_statement(stmt: &RawStmt, indent: &str, out: &mut String) {
    if stmt.verbatim {
        for line in &stmt.lines {
            out.push_str(line);
            out.push('\n');
        }
        return;
    }
    let mut lines = stmt.lines.iter();
    if let Some(head) = lines.next() {
        out.push_str(indent);
        out.push_str(head);
        out.push('\n');
    }
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
}
