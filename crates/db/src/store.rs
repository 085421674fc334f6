//! Backend-neutral view of one scoped database.

use async_trait::async_trait;
use orcatrack_kernel::schema::{Account, CollectionSchema, IndexSpec};
use orcatrack_kernel::ProvisionResult;

/// Provisioning operations against a single database. Each handle is bound
/// to exactly one database name for its whole life.
#[async_trait]
pub trait Database: Send + Sync {
    /// Name of the database this handle is scoped to
    fn name(&self) -> &str;

    /// Create a login principal whose scope is this database
    async fn create_account(&self, account: &Account) -> ProvisionResult<()>;

    /// Create a collection with the schema attached as its validator
    async fn create_collection(&self, schema: &CollectionSchema) -> ProvisionResult<()>;

    /// Build an index on `collection`
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> ProvisionResult<()>;

    async fn account_names(&self) -> ProvisionResult<Vec<String>>;

    async fn collection_names(&self) -> ProvisionResult<Vec<String>>;

    async fn index_names(&self, collection: &str) -> ProvisionResult<Vec<String>>;
}

/// Hands out database handles bound to one name each.
pub trait Cluster {
    type Database: Database;

    fn database(&self, name: &str) -> Self::Database;
}
