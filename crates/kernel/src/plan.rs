use serde::Serialize;

use crate::module::{Step, Target};

/// Ordered, fully resolved list of provisioning steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionPlan {
    pub admin_database: String,
    pub app_database: String,
    pub steps: Vec<Step>,
}

impl ProvisionPlan {
    pub fn new(admin_database: impl Into<String>, app_database: impl Into<String>) -> Self {
        Self {
            admin_database: admin_database.into(),
            app_database: app_database.into(),
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Name of the database `target` resolves to.
    pub fn database_for(&self, target: Target) -> &str {
        target.pick(&self.admin_database, &self.app_database)
    }

    /// What a successful run against an empty store is expected to create.
    pub fn expected(&self) -> Summary {
        let mut summary = Summary::default();
        for step in &self.steps {
            summary.record(step);
        }
        summary
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Counts of created entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub accounts: usize,
    pub collections: usize,
    pub indexes: usize,
}

impl Summary {
    pub fn record(&mut self, step: &Step) {
        match step {
            Step::CreateAccount { .. } => self.accounts += 1,
            Step::CreateCollection { .. } => self.collections += 1,
            Step::CreateIndex { .. } => self.indexes += 1,
        }
    }
}
