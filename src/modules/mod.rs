pub mod accounts;
pub mod users;

use std::sync::Arc;

use orcatrack_kernel::ModuleRegistry;

/// Register all provisioning modules; registration order is execution order
pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register(Arc::new(accounts::AccountsModule::new()));
    registry.register(Arc::new(users::UsersModule::new()));
}
