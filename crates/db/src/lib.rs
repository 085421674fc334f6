//! MongoDB client factory and one-time provisioning.

pub mod document;
pub mod initializer;
pub mod memory;
pub mod mongo;
pub mod store;
pub mod verify;

pub use initializer::Initializer;
pub use memory::{MemoryCluster, MemoryDatabase, MemorySession};
pub use mongo::{MongoCluster, MongoDatabase};
pub use store::{Cluster, Database};
pub use verify::{verify, VerifyReport};

use orcatrack_kernel::settings::DatabaseSettings;
use orcatrack_kernel::ProvisionResult;

/// Connect to the configured deployment and make sure it answers.
pub async fn connect(settings: &DatabaseSettings) -> ProvisionResult<MongoCluster> {
    tracing::info!(target: "orcatrack-db", app_name = %settings.app_name, "connecting to MongoDB");

    let cluster = MongoCluster::connect(&settings.uri, &settings.app_name).await?;
    cluster.ping().await?;

    tracing::info!(target: "orcatrack-db", "MongoDB connection established");
    Ok(cluster)
}
