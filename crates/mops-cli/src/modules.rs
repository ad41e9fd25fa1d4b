//! # Modules Subcommand
//!
//! A tenant's module entitlements, through the entitlement service.
//!
//! ## Subcommands
//!
//! - `list`: the tenant's modules in catalog order.
//! - `enable` / `disable`: toggle one module. The dependency gate runs
//!   locally first; a refusal exits with code 2 without contacting the
//!   service for the write.
//! - `check`: for every module, whether flipping it would pass the gate,
//!   plus dependency cycles and unknown dependency keys.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use mops_client::{ClientConfig, EntitlementClient, EntitlementSession};
use mops_core::{ChangeSource, ModuleEntitlement, ModuleKey, Notes, TenantId};
use mops_entitlements::{DependencyGraph, ToggleAction, ToggleGate};
use serde::Serialize;
use url::Url;

use crate::{EXIT_GATE_REJECTED, EXIT_OK};

/// Arguments for the `mops modules` subcommand.
#[derive(Args, Debug)]
pub struct ModulesArgs {
    /// Service base URL. Overrides `MOPS_API_URL`.
    #[arg(long, global = true)]
    pub api_url: Option<Url>,

    /// Print JSON instead of a table.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: ModulesCommand,
}

/// Modules subcommands.
#[derive(Subcommand, Debug)]
pub enum ModulesCommand {
    /// List a tenant's module entitlements.
    List {
        /// Tenant ID (UUID).
        #[arg(long)]
        tenant: TenantId,
    },

    /// Enable a module once all its dependencies are enabled.
    Enable(ToggleArgs),

    /// Disable a module once no enabled module depends on it.
    Disable(ToggleArgs),

    /// Report gate outcomes, cycles and unknown dependencies for a tenant.
    Check {
        /// Tenant ID (UUID).
        #[arg(long)]
        tenant: TenantId,
    },
}

/// Target of an enable or disable.
#[derive(Args, Debug)]
pub struct ToggleArgs {
    /// Tenant ID (UUID).
    #[arg(long)]
    pub tenant: TenantId,

    /// Module key.
    #[arg(long)]
    pub module: ModuleKey,

    /// Replace the module's operator notes.
    #[arg(long)]
    pub notes: Option<String>,
}

/// Execute the modules subcommand.
pub fn run_modules(args: &ModulesArgs) -> Result<u8> {
    let mut config = ClientConfig::from_env().context("reading client configuration")?;
    if let Some(url) = &args.api_url {
        config.base_url = url.clone();
    }
    tracing::debug!(?config, "client configuration");
    let client = EntitlementClient::new(config).context("building HTTP client")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    runtime.block_on(async {
        match &args.command {
            ModulesCommand::List { tenant } => {
                let modules = client
                    .list_entitlements(*tenant)
                    .await
                    .with_context(|| format!("listing modules for tenant {tenant}"))?;
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&modules)?);
                } else {
                    print!("{}", render_list(&modules));
                }
                Ok(EXIT_OK)
            }
            ModulesCommand::Enable(toggle) => run_toggle(client, toggle, true, args.json).await,
            ModulesCommand::Disable(toggle) => run_toggle(client, toggle, false, args.json).await,
            ModulesCommand::Check { tenant } => {
                let modules = client
                    .list_entitlements(*tenant)
                    .await
                    .with_context(|| format!("listing modules for tenant {tenant}"))?;
                let report = CheckReport::build(&modules);
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print!("{}", report.render());
                }
                Ok(EXIT_OK)
            }
        }
    })
}

async fn run_toggle(
    client: EntitlementClient,
    args: &ToggleArgs,
    enabled: bool,
    json: bool,
) -> Result<u8> {
    let notes = args
        .notes
        .as_deref()
        .map(Notes::new)
        .transpose()
        .context("invalid --notes")?;

    let mut session = EntitlementSession::open(client, args.tenant)
        .await
        .with_context(|| format!("loading modules for tenant {}", args.tenant))?;

    match session
        .request_toggle(args.module.as_str(), enabled, ChangeSource::Cli, notes)
        .await
    {
        Ok(updated) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&updated)?);
            } else {
                println!(
                    "{} {}",
                    if updated.enabled { "enabled" } else { "disabled" },
                    updated.module_key
                );
            }
            if session.is_stale() {
                eprintln!("warning: could not refresh the module list after the change");
            }
            Ok(EXIT_OK)
        }
        Err(err) if err.is_gate_rejection() => {
            eprintln!("refused: {err}");
            for blocker in err.blockers().unwrap_or_default() {
                eprintln!("  - {blocker}");
            }
            Ok(EXIT_GATE_REJECTED)
        }
        Err(err) => Err(err).with_context(|| {
            format!(
                "{} {}",
                ToggleAction::for_target(enabled),
                args.module.as_str()
            )
        }),
    }
}

fn render_list(modules: &[ModuleEntitlement]) -> String {
    let mut out = format!(
        "{:<20} {:<8} {:<10} {:<10} {}\n",
        "MODULE", "ENABLED", "BILLING", "STATUS", "DEPENDS ON"
    );
    for m in modules {
        let deps: Vec<&str> = m.dependency_keys.iter().map(|k| k.as_str()).collect();
        out.push_str(&format!(
            "{:<20} {:<8} {:<10} {:<10} {}\n",
            m.module_key.as_str(),
            if m.enabled { "yes" } else { "no" },
            m.billing_model.as_str(),
            m.status.as_str(),
            if deps.is_empty() { "-".to_string() } else { deps.join(", ") },
        ));
    }
    out
}

/// Gate outcome of flipping one module.
#[derive(Debug, Serialize)]
pub struct ModuleCheck {
    pub module_key: String,
    pub enabled: bool,
    /// The action that would flip the module.
    pub action: ToggleAction,
    pub allowed: bool,
    /// Missing dependency keys or dependent module names.
    pub blockers: Vec<String>,
}

/// Result of `mops modules check`.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub modules: Vec<ModuleCheck>,
    pub cycles: Vec<Vec<String>>,
    /// `[module_key, dependency_key]` pairs.
    pub unknown_dependencies: Vec<[String; 2]>,
}

impl CheckReport {
    /// Evaluate every module of one snapshot.
    pub fn build(modules: &[ModuleEntitlement]) -> Self {
        let graph = DependencyGraph::build(modules);
        let gate = ToggleGate::new(&graph);

        let checks = modules
            .iter()
            .map(|m| {
                let action = ToggleAction::for_target(!m.enabled);
                let outcome = gate.check(m, action);
                ModuleCheck {
                    module_key: m.module_key.to_string(),
                    enabled: m.enabled,
                    action,
                    allowed: outcome.is_ok(),
                    blockers: outcome.err().map(|r| r.blockers()).unwrap_or_default(),
                }
            })
            .collect();

        Self {
            modules: checks,
            cycles: graph
                .cycles()
                .into_iter()
                .map(|c| c.into_iter().map(String::from).collect())
                .collect(),
            unknown_dependencies: graph
                .unknown_dependencies()
                .into_iter()
                .map(|(m, d)| [m.to_string(), d.to_string()])
                .collect(),
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for check in &self.modules {
            let verdict = if check.allowed {
                "ok".to_string()
            } else {
                format!("blocked by {}", check.blockers.join(", "))
            };
            out.push_str(&format!(
                "{:<20} {:<8} {:<8} {verdict}\n",
                check.module_key,
                if check.enabled { "on" } else { "off" },
                check.action.as_str(),
            ));
        }
        for cycle in &self.cycles {
            out.push_str(&format!("warning: dependency cycle {}\n", cycle.join(" -> ")));
        }
        for [module, dep] in &self.unknown_dependencies {
            out.push_str(&format!("warning: {module} depends on unknown module {dep}\n"));
        }
        out
    }
}
