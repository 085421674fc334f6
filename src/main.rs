use anyhow::Context;
use orcatrack_kernel::settings::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load orcatrack settings")?;
    orcatrack_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        app_database = %settings.database.app_database,
        "orcatrack-init starting"
    );

    orcatrack_init::initialize(&settings).await?;
    Ok(())
}
