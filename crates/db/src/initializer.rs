use orcatrack_kernel::{ProvisionPlan, ProvisionResult, Step, Summary, Target};

use crate::store::{Cluster, Database};

/// Runs a provisioning plan step by step, stopping at the first failure.
///
/// Nothing is rolled back: entities created before the failing step stay in
/// place. Running the same plan against an already provisioned deployment
/// fails on the first entity that exists.
pub struct Initializer {
    plan: ProvisionPlan,
}

impl Initializer {
    pub fn new(plan: ProvisionPlan) -> Self {
        Self { plan }
    }

    /// Resolve both scoped handles from `cluster` by the plan's database names.
    pub async fn run_on<C: Cluster>(&self, cluster: &C) -> ProvisionResult<Summary> {
        let admin = cluster.database(self.plan.database_for(Target::Admin));
        let app = cluster.database(self.plan.database_for(Target::Application));
        self.run(&admin, &app).await
    }

    /// Execute every step against the handle its target names.
    pub async fn run<D: Database>(&self, admin: &D, app: &D) -> ProvisionResult<Summary> {
        let total = self.plan.steps.len();
        let mut summary = Summary::default();

        for (position, step) in self.plan.steps.iter().enumerate() {
            let database = step.target().pick(admin, app);
            let label = step.label();

            tracing::info!(
                step = %label,
                database = database.name(),
                position = position + 1,
                total,
                "running provisioning step"
            );

            if let Err(err) = apply(database, step).await {
                tracing::error!(
                    step = %label,
                    database = database.name(),
                    error = %err,
                    "provisioning step failed; aborting remaining steps"
                );
                return Err(err);
            }

            summary.record(step);
        }

        tracing::debug!(
            accounts = summary.accounts,
            collections = summary.collections,
            indexes = summary.indexes,
            "all provisioning steps applied"
        );

        Ok(summary)
    }
}

async fn apply<D: Database>(database: &D, step: &Step) -> ProvisionResult<()> {
    match step {
        Step::CreateAccount { account, .. } => database.create_account(account).await,
        Step::CreateCollection { schema } => database.create_collection(schema).await,
        Step::CreateIndex { collection, index } => database.create_index(collection, index).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCluster;
    use orcatrack_kernel::schema::{Account, BsonType, CollectionSchema, Credential, IndexSpec, Role};
    use orcatrack_kernel::ProvisionError;

    fn small_plan() -> ProvisionPlan {
        let mut plan = ProvisionPlan::new("admin", "app");
        plan.push(Step::CreateAccount {
            target: Target::Admin,
            account: Account::new("ops", Credential::new("pw")).grant(Role::ClusterMonitor, "admin"),
        });
        plan.push(Step::CreateAccount {
            target: Target::Application,
            account: Account::new("svc", Credential::new("pw")).grant(Role::ReadWrite, "app"),
        });
        plan.push(Step::CreateCollection {
            schema: CollectionSchema::new("things").required("name", BsonType::String),
        });
        plan.push(Step::CreateIndex {
            collection: "things".to_string(),
            index: IndexSpec::ascending("name").unique(),
        });
        plan
    }

    #[tokio::test]
    async fn steps_land_in_their_target_database() {
        let cluster = MemoryCluster::new();
        let summary = Initializer::new(small_plan()).run_on(&cluster).await.unwrap();

        assert_eq!(
            summary,
            Summary {
                accounts: 2,
                collections: 1,
                indexes: 1
            }
        );

        let admin = cluster.database("admin");
        let app = cluster.database("app");
        assert_eq!(admin.account_names().await.unwrap(), vec!["ops".to_string()]);
        assert_eq!(app.account_names().await.unwrap(), vec!["svc".to_string()]);
        assert!(admin.collection_names().await.unwrap().is_empty());
        assert_eq!(app.collection_names().await.unwrap(), vec!["things".to_string()]);
    }

    #[tokio::test]
    async fn first_failure_stops_the_run() {
        let cluster = MemoryCluster::new();
        // pre-existing collection makes step three fail
        cluster
            .database("app")
            .create_collection(&CollectionSchema::new("things"))
            .await
            .unwrap();

        let err = Initializer::new(small_plan())
            .run_on(&cluster)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::CollectionExists { .. }));

        let app = cluster.database("app");
        // steps before the failure are kept, the index step never ran
        assert_eq!(app.account_names().await.unwrap(), vec!["svc".to_string()]);
        assert_eq!(
            app.index_names("things").await.unwrap(),
            vec!["_id_".to_string()]
        );
    }

    #[tokio::test]
    async fn explicit_handles_override_plan_names() {
        let cluster = MemoryCluster::new();
        let admin = cluster.database("admin");
        let app = cluster.database("app");

        Initializer::new(small_plan()).run(&admin, &app).await.unwrap();

        assert_eq!(app.index_names("things").await.unwrap().len(), 2);
    }
}
