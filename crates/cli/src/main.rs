use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use orcatrack_kernel::settings::Settings;

/// One-time provisioning for the orcatrack MongoDB deployment
#[derive(Debug, Parser)]
#[command(name = "orcatrack-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create accounts, the users collection, and its indexes
    Init {
        /// Run against an in-memory deployment instead of MongoDB
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the provisioning plan as JSON (credentials redacted)
    Plan,
    /// Check that a deployment holds everything the plan creates
    Verify,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load orcatrack settings")?;
    orcatrack_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Init { dry_run: true } => {
            let summary = orcatrack_init::dry_run(&settings).await?;
            tracing::info!(
                accounts = summary.accounts,
                collections = summary.collections,
                indexes = summary.indexes,
                "dry run finished; nothing was persisted"
            );
        }
        Command::Init { dry_run: false } => {
            orcatrack_init::initialize(&settings).await?;
        }
        Command::Plan => {
            let plan = orcatrack_init::build_plan(&settings)?;
            println!("{}", plan.to_json()?);
        }
        Command::Verify => {
            let report = orcatrack_init::verify_deployment(&settings).await?;
            if !report.is_complete() {
                bail!(
                    "deployment is missing {} planned entities: {}",
                    report.missing.len(),
                    report.missing.join(", ")
                );
            }
            tracing::info!(
                accounts = report.present.accounts,
                collections = report.present.collections,
                indexes = report.present.indexes,
                "deployment matches the provisioning plan"
            );
        }
    }

    Ok(())
}
