use std::sync::Arc;

use anyhow::bail;

use crate::module::{Module, PlanCtx};
use crate::plan::ProvisionPlan;

/// Module registry; registration order is execution order
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register a module after every module registered so far
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    /// Concatenate every module's steps into one ordered plan
    pub fn build_plan(&self, ctx: &PlanCtx<'_>) -> anyhow::Result<ProvisionPlan> {
        let mut plan = ProvisionPlan::new(ctx.admin_database(), ctx.app_database());

        for (position, module) in self.modules.iter().enumerate() {
            if self.modules[..position]
                .iter()
                .any(|earlier| earlier.name() == module.name())
            {
                bail!("module '{}' registered more than once", module.name());
            }

            let steps = module.steps(ctx);
            tracing::debug!(
                module = module.name(),
                steps = steps.len(),
                "collected module steps"
            );
            for step in steps {
                plan.push(step);
            }
        }

        Ok(plan)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
