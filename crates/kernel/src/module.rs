use serde::Serialize;

use crate::schema::{Account, CollectionSchema, IndexSpec};
use crate::settings::Settings;

/// Context provided to modules while building the plan
pub struct PlanCtx<'a> {
    pub settings: &'a Settings,
}

impl<'a> PlanCtx<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    pub fn admin_database(&self) -> &str {
        &self.settings.database.admin_database
    }

    pub fn app_database(&self) -> &str {
        &self.settings.database.app_database
    }
}

/// Which of the two scoped handles a step runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Admin,
    Application,
}

impl Target {
    /// Choose between the admin-side and application-side value.
    pub fn pick<'a, T: ?Sized>(self, admin: &'a T, app: &'a T) -> &'a T {
        match self {
            Target::Admin => admin,
            Target::Application => app,
        }
    }
}

/// One declarative provisioning operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    CreateAccount { target: Target, account: Account },
    CreateCollection { schema: CollectionSchema },
    CreateIndex { collection: String, index: IndexSpec },
}

impl Step {
    pub fn target(&self) -> Target {
        match self {
            Step::CreateAccount { target, .. } => *target,
            // collections and indexes always live in the application database
            Step::CreateCollection { .. } | Step::CreateIndex { .. } => Target::Application,
        }
    }

    /// Short label for logs, e.g. `create_account:backup_user`.
    pub fn label(&self) -> String {
        match self {
            Step::CreateAccount { account, .. } => format!("create_account:{}", account.name),
            Step::CreateCollection { schema } => {
                format!("create_collection:{}", schema.collection)
            }
            Step::CreateIndex { collection, index } => {
                format!("create_index:{}.{}", collection, index.name())
            }
        }
    }
}

/// A named contributor of provisioning steps
pub trait Module: Sync + Send {
    /// Unique name for this module
    fn name(&self) -> &'static str;

    /// Steps contributed by this module, executed in the order returned
    fn steps(&self, ctx: &PlanCtx<'_>) -> Vec<Step>;
}
