//! # mops CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mops_cli::catalog::{run_catalog, CatalogArgs};
use mops_cli::modules::{run_modules, ModulesArgs};

/// Module entitlement operator CLI.
///
/// Lists and toggles a tenant's feature modules through the dependency gate,
/// and validates module catalog files.
#[derive(Parser, Debug)]
#[command(name = "mops", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// A tenant's module entitlements (list, enable, disable, check).
    Modules(ModulesArgs),

    /// Module catalog files.
    Catalog(CatalogArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match &cli.command {
        Commands::Modules(args) => run_modules(args),
        Commands::Catalog(args) => run_catalog(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mops_cli::catalog::CatalogCommand;
    use mops_cli::modules::ModulesCommand;

    const TENANT: &str = "8d3c2b4e-6a51-4f0e-9b7a-1c2d3e4f5a6b";

    #[test]
    fn cli_parse_modules_list() {
        let cli = Cli::try_parse_from(["mops", "modules", "list", "--tenant", TENANT]).unwrap();
        let Commands::Modules(args) = cli.command else {
            panic!("expected modules command");
        };
        assert!(!args.json);
        assert!(args.api_url.is_none());
        assert!(matches!(
            args.command,
            ModulesCommand::List { tenant } if tenant.to_string() == TENANT
        ));
    }

    #[test]
    fn cli_parse_enable_with_notes() {
        let cli = Cli::try_parse_from([
            "mops", "modules", "enable", "--tenant", TENANT, "--module", "purchasing", "--notes",
            "annual contract", "--json",
        ])
        .unwrap();
        let Commands::Modules(args) = cli.command else {
            panic!("expected modules command");
        };
        assert!(args.json);
        let ModulesCommand::Enable(toggle) = args.command else {
            panic!("expected enable");
        };
        assert_eq!(toggle.module.as_str(), "purchasing");
        assert_eq!(toggle.notes.as_deref(), Some("annual contract"));
    }

    #[test]
    fn cli_parse_disable_with_api_url() {
        let cli = Cli::try_parse_from([
            "mops",
            "-vv",
            "modules",
            "--api-url",
            "http://mops.internal:8080",
            "disable",
            "--tenant",
            TENANT,
            "--module",
            "inventory",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Modules(args) = cli.command else {
            panic!("expected modules command");
        };
        assert_eq!(
            args.api_url.map(|u| u.host_str().map(String::from)),
            Some(Some("mops.internal".to_string()))
        );
        assert!(matches!(args.command, ModulesCommand::Disable(_)));
    }

    #[test]
    fn cli_rejects_invalid_tenant_and_module() {
        assert!(Cli::try_parse_from(["mops", "modules", "list", "--tenant", "acme"]).is_err());
        assert!(Cli::try_parse_from([
            "mops", "modules", "enable", "--tenant", TENANT, "--module", "Option Sets",
        ])
        .is_err());
    }

    #[test]
    fn cli_parse_catalog_check() {
        let cli = Cli::try_parse_from(["mops", "catalog", "check", "catalog.yaml"]).unwrap();
        let Commands::Catalog(args) = cli.command else {
            panic!("expected catalog command");
        };
        let CatalogCommand::Check { file } = args.command;
        assert_eq!(file, std::path::PathBuf::from("catalog.yaml"));
    }
}
