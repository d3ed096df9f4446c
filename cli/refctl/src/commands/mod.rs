//! CLI commands.

mod classify;
mod generate;
mod inspect;
mod prefixes;
mod reconcile;
mod registry;

use anyhow::Result;
use clap::{Parser, Subcommand};
use we_registry::{DbConfig, Registry};

use crate::config::Config;
use crate::error::CliError;
use crate::output::OutputFormat;

/// refctl - Issue and audit World Embalage document references.
#[derive(Debug, Parser)]
#[command(name = "refctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Registry database URL (overrides the config file).
    #[arg(long, global = true, env = "REFCTL_DATABASE_URL")]
    database_url: Option<String>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List document types and their prefixes.
    Prefixes,

    /// Generate (and by default record) a new reference.
    Generate(generate::GenerateArgs),

    /// Check whether a string is a standardized reference.
    Check(inspect::CheckArgs),

    /// Show the fields of a reference, or why it does not parse.
    Inspect(inspect::InspectArgs),

    /// Classify stored references, one per line (migration audit).
    Classify(classify::ClassifyArgs),

    /// List recently issued references of one document type.
    List(registry::ListArgs),

    /// Show one issued reference.
    Show(registry::ShowArgs),

    /// Retire a reference whose document was deleted.
    Retire(registry::RetireArgs),

    /// Record pending unverified references and list unverified ones.
    Reconcile(reconcile::ReconcileArgs),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Log filter used when RUST_LOG is not set.
    pub fn log_level(&self) -> String {
        if self.verbose {
            return "debug".to_string();
        }
        std::env::var("REFCTL_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string())
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let ctx = CommandContext {
            format: self.format,
            database_url: self.database_url,
        };

        match self.command {
            Commands::Prefixes => prefixes::run(ctx),
            Commands::Generate(args) => generate::run(ctx, args).await,
            Commands::Check(args) => inspect::check(ctx, args),
            Commands::Inspect(args) => inspect::inspect(ctx, args),
            Commands::Classify(args) => classify::run(ctx, args).await,
            Commands::List(args) => registry::list(ctx, args).await,
            Commands::Show(args) => registry::show(ctx, args).await,
            Commands::Retire(args) => registry::retire(ctx, args).await,
            Commands::Reconcile(args) => reconcile::run(ctx, args).await,
            Commands::Version => {
                println!("refctl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
///
/// The config file is only read by commands that need the registry.
pub struct CommandContext {
    pub format: OutputFormat,
    database_url: Option<String>,
}

impl CommandContext {
    /// Load the config file, applying the `--database-url` override.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::load()?;
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
        Ok(config)
    }

    /// Load the config and open the registry.
    pub async fn registry(&self) -> Result<Registry> {
        open_registry(&self.config()?).await
    }
}

/// Open the registry, creating its directory and schema if needed.
pub async fn open_registry(config: &Config) -> Result<Registry> {
    if let Some(dir) = config.database_dir() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&dir)
                .map_err(|e| CliError::RegistryUnavailable(format!("{}: {e}", dir.display())))?;
        }
    }

    let registry = Registry::open(&DbConfig::new(&config.database_url))
        .await
        .map_err(|e| CliError::RegistryUnavailable(e.to_string()))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbose_raises_log_level() {
        let cli = Cli::parse_from(["refctl", "-v", "prefixes"]);
        assert_eq!(cli.log_level(), "debug");
    }

    #[test]
    fn test_format_is_validated() {
        let cli = Cli::parse_from(["refctl", "--format", "json", "check", "DV001"]);
        assert_eq!(cli.format, OutputFormat::Json);

        let err =
            Cli::try_parse_from(["refctl", "--format", "yaml", "check", "DV001"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[tokio::test]
    async fn test_pure_commands_run_without_registry() {
        Cli::parse_from(["refctl", "--format", "json", "inspect", "BC16/2025"])
            .run()
            .await
            .unwrap();
        Cli::parse_from(["refctl", "prefixes"]).run().await.unwrap();
    }
}
