//! orcatrack provisioning library
//!
//! Declares the accounts, collection, and indexes the orcatrack deployment
//! needs and runs them once against a fresh MongoDB instance.

pub mod modules;
pub mod utils;

use anyhow::Context;
use orcatrack_db::{Cluster, Initializer, MemoryCluster, VerifyReport};
use orcatrack_kernel::settings::{Environment, Settings};
use orcatrack_kernel::{ModuleRegistry, PlanCtx, ProvisionPlan, Summary, Target};

/// Build the ordered provisioning plan from the registered modules.
pub fn build_plan(settings: &Settings) -> anyhow::Result<ProvisionPlan> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);
    registry
        .build_plan(&PlanCtx::new(settings))
        .with_context(|| "failed to build provisioning plan")
}

fn warn_on_placeholders(settings: &Settings) {
    let placeholders = utils::placeholder_credentials(settings);
    if placeholders.is_empty() {
        return;
    }
    if settings.environment == Environment::Local {
        tracing::debug!(?placeholders, "using placeholder credentials");
    } else {
        tracing::warn!(
            env = ?settings.environment,
            ?placeholders,
            "placeholder credentials in use; substitute them before deployment"
        );
    }
}

/// Provision the configured MongoDB deployment.
pub async fn initialize(settings: &Settings) -> anyhow::Result<Summary> {
    warn_on_placeholders(settings);
    let plan = build_plan(settings)?;

    let cluster = orcatrack_db::connect(&settings.database)
        .await
        .with_context(|| "failed to connect to MongoDB")?;

    let summary = Initializer::new(plan)
        .run_on(&cluster)
        .await
        .with_context(|| "MongoDB initialization failed")?;

    tracing::info!(
        accounts = summary.accounts,
        collections = summary.collections,
        indexes = summary.indexes,
        "MongoDB initialization completed successfully"
    );
    Ok(summary)
}

/// Run the plan against an in-memory deployment; nothing is persisted.
pub async fn dry_run(settings: &Settings) -> anyhow::Result<Summary> {
    warn_on_placeholders(settings);
    let plan = build_plan(settings)?;

    Initializer::new(plan)
        .run_on(&MemoryCluster::new())
        .await
        .with_context(|| "dry run failed")
}

/// Check the configured deployment against the plan.
pub async fn verify_deployment(settings: &Settings) -> anyhow::Result<VerifyReport> {
    let plan = build_plan(settings)?;

    let cluster = orcatrack_db::connect(&settings.database)
        .await
        .with_context(|| "failed to connect to MongoDB")?;

    let admin = cluster.database(plan.database_for(Target::Admin));
    let app = cluster.database(plan.database_for(Target::Application));
    orcatrack_db::verify(&plan, &admin, &app)
        .await
        .with_context(|| "failed to inspect deployment")
}
