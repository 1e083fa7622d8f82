use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::emit;
use crate::expander::{AggregationContext, Expander};
use crate::parser;
use crate::resolver::ModuleResolver;

pub struct AggregateOrchestrator {
    config: Config,
}

impl AggregateOrchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Search paths for this run. The entry file's own directory always
    /// resolves first; configured shared roots follow in order.
    fn search_paths(&self, entry_path: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(entry_dir) = entry_path.parent() {
            let entry_dir = entry_dir
                .canonicalize()
                .unwrap_or_else(|_| entry_dir.to_path_buf());
            debug!("Entry directory resolves first: {:?}", entry_dir);
            paths.push(entry_dir);
        }
        for src in &self.config.src {
            let src = src.canonicalize().unwrap_or_else(|_| src.clone());
            if !paths.contains(&src) {
                paths.push(src);
            }
        }
        paths
    }

    /// Aggregate to a string for stdout output.
    pub fn aggregate_to_string(&self, entry_path: &Path) -> Result<String> {
        info!("Starting aggregation for stdout output");
        self.aggregate_core(entry_path)
    }

    /// Main aggregation function. The output file is only written after the
    /// whole tree has been expanded and rendered, so a failure anywhere
    /// leaves no partial file behind.
    pub fn aggregate(&self, entry_path: &Path, output_path: &Path) -> Result<()> {
        info!("Starting aggregation");
        debug!("Output: {:?}", output_path);

        let aggregated = self.aggregate_core(entry_path)?;

        fs::write(output_path, aggregated)
            .with_context(|| format!("Failed to write output file: {:?}", output_path))?;
        info!("Aggregate written to: {:?}", output_path);
        Ok(())
    }

    fn aggregate_core(&self, entry_path: &Path) -> Result<String> {
        debug!("Entry: {:?}", entry_path);

        let resolver = ModuleResolver::new(self.search_paths(entry_path));
        let entry = parser::load(entry_path)?;

        let mut ctx = AggregationContext::new();
        let expander = Expander::new(&resolver);
        let body = expander.expand(&entry, &mut ctx)?;

        info!(
            "Inlined {} module(s), hoisted {} external import(s)",
            ctx.visited.len() - 1,
            ctx.hoisted.len()
        );

        let mut tree = emit::hoist_block(&ctx);
        tree.body.extend(body.body);
        Ok(emit::render(&tree))
    }
}
