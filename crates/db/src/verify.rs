//! Post-run check that the persisted state matches a plan.

use std::collections::BTreeMap;

use orcatrack_kernel::{ProvisionPlan, ProvisionResult, Step, Summary};

use crate::store::Database;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Planned entities found in the deployment
    pub present: Summary,
    /// Human-readable names of planned entities that are absent
    pub missing: Vec<String>,
}

impl VerifyReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Compare what `plan` creates with what `admin` and `app` actually hold.
pub async fn verify<D: Database>(
    plan: &ProvisionPlan,
    admin: &D,
    app: &D,
) -> ProvisionResult<VerifyReport> {
    let admin_accounts = admin.account_names().await?;
    let app_accounts = app.account_names().await?;
    let collections = app.collection_names().await?;
    let mut indexes: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    let mut report = VerifyReport::default();

    for step in &plan.steps {
        let found = match step {
            Step::CreateAccount { target, account } => {
                target.pick(&admin_accounts, &app_accounts).contains(&account.name)
            }
            Step::CreateCollection { schema } => collections.contains(&schema.collection),
            Step::CreateIndex { collection, index } => {
                if !collections.contains(collection) {
                    false
                } else {
                    if !indexes.contains_key(collection.as_str()) {
                        let names = app.index_names(collection).await?;
                        indexes.insert(collection.as_str(), names);
                    }
                    indexes
                        .get(collection.as_str())
                        .is_some_and(|names| names.contains(&index.name()))
                }
            }
        };

        if found {
            report.present.record(step);
        } else {
            tracing::warn!(step = %step.label(), "planned entity is missing");
            report.missing.push(step.label());
        }
    }

    Ok(report)
}
