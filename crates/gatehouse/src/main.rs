// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gatehouse - multi-tenant messaging session gateway.
//!
//! This is the binary entry point.

mod loopback;
mod serve;
mod shutdown;
mod stack;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gatehouse_config::GatehouseConfig;
use gatehouse_core::GatehouseError;

/// Gatehouse - multi-tenant messaging session gateway.
#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the session gateway.
    Serve,
    /// Show persisted session status.
    Status {
        /// Only this tenant.
        tenant: Option<String>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Run one reconciliation cycle against the database.
    ///
    /// Only for use while no server is running on the same database.
    Reconcile {
        #[arg(long)]
        json: bool,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => gatehouse_config::load_and_validate_path(path),
        None => gatehouse_config::load_and_validate(),
    };
    let config = match config {
        Ok(config) => config,
        Err(errors) => {
            gatehouse_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.daemon.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { tenant, json }) => {
            status::run_status(&config, tenant.as_deref(), json).await
        }
        Some(Commands::Reconcile { json }) => status::run_reconcile(&config, json).await,
        Some(Commands::Config { action }) => run_config(&config, action),
        None => {
            println!("gatehouse: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run_config(config: &GatehouseConfig, action: ConfigAction) -> Result<(), GatehouseError> {
    match action {
        ConfigAction::Show => {
            print!("{}", render_config(config)?);
        }
        ConfigAction::Validate => {
            println!("configuration is valid");
        }
    }
    Ok(())
}

/// Effective configuration as TOML with secrets masked.
fn render_config(config: &GatehouseConfig) -> Result<String, GatehouseError> {
    let mut shown = config.clone();
    if shown.gateway.bearer_token.is_some() {
        shown.gateway.bearer_token = Some("[redacted]".to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| GatehouseError::Config(format!("failed to render configuration: {e}")))
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gatehouse={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = gatehouse_config::load_and_validate_str("").expect("defaults should validate");
        assert_eq!(config.transport.backend, "loopback");
    }

    #[test]
    fn parses_status_with_tenant_and_json() {
        let cli = Cli::try_parse_from(["gatehouse", "status", "acme", "--json"]).unwrap();
        match cli.command {
            Some(Commands::Status { tenant, json }) => {
                assert_eq!(tenant.as_deref(), Some("acme"));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli =
            Cli::try_parse_from(["gatehouse", "reconcile", "--config", "/tmp/g.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/g.toml")));
    }

    #[test]
    fn rendered_config_masks_token() {
        let mut config = GatehouseConfig::default();
        config.gateway.bearer_token = Some("s3cret".to_string());
        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[redacted]"));
        assert!(rendered.contains("[session]"));
    }
}
