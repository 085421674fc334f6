pub mod error;
pub mod module;
pub mod plan;
pub mod registry;
pub mod schema;
pub mod settings;

pub use error::{ProvisionError, ProvisionResult};
pub use module::{Module, PlanCtx, Step, Target};
pub use plan::{ProvisionPlan, Summary};
pub use registry::ModuleRegistry;
