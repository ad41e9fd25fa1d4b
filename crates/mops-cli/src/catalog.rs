//! # Catalog Subcommand
//!
//! Offline validation of a module catalog YAML, using the same loader the
//! service runs at startup. Load errors exit non-zero; dependency cycles
//! are reported but accepted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use mops_entitlements::ModuleCatalog;

use crate::EXIT_OK;

/// Arguments for the `mops catalog` subcommand.
#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

/// Catalog subcommands.
#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Validate a catalog file: unique keys, non-empty names, resolvable
    /// dependencies. Cycles are listed as warnings.
    Check {
        /// Path to the catalog YAML.
        file: PathBuf,
    },
}

/// Execute the catalog subcommand.
pub fn run_catalog(args: &CatalogArgs) -> Result<u8> {
    match &args.command {
        CatalogCommand::Check { file } => {
            let catalog = ModuleCatalog::from_path(file)
                .with_context(|| format!("invalid catalog {}", file.display()))?;
            print!("{}", render_check(&catalog));
            Ok(EXIT_OK)
        }
    }
}

fn render_check(catalog: &ModuleCatalog) -> String {
    let core = catalog.modules().iter().filter(|m| m.is_core).count();
    let mut out = format!("OK: {} modules ({core} core)\n", catalog.len());
    for cycle in catalog.cycles() {
        let mut path: Vec<&str> = cycle.iter().map(|k| k.as_str()).collect();
        if let Some(first) = path.first().copied() {
            path.push(first);
        }
        out.push_str(&format!("warning: dependency cycle {}\n", path.join(" -> ")));
    }
    out
}
