use orcatrack_kernel::schema::{Account, Role};
use orcatrack_kernel::{Module, PlanCtx, Step, Target};

pub const BACKUP_USER: &str = "backup_user";
pub const MONITORING_USER: &str = "monitoring_user";
pub const APP_USER: &str = "orcatrack_app";

const LOCAL_DATABASE: &str = "local";

/// Administrative and application login principals
pub struct AccountsModule;

impl AccountsModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for AccountsModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for AccountsModule {
    fn name(&self) -> &'static str {
        "accounts"
    }

    fn steps(&self, ctx: &PlanCtx<'_>) -> Vec<Step> {
        let credentials = &ctx.settings.credentials;
        let admin = ctx.admin_database();
        let app = ctx.app_database();

        vec![
            Step::CreateAccount {
                target: Target::Admin,
                account: Account::new(BACKUP_USER, credentials.backup_password.clone())
                    .grant(Role::Backup, admin)
                    .grant(Role::Restore, admin),
            },
            Step::CreateAccount {
                target: Target::Admin,
                account: Account::new(MONITORING_USER, credentials.monitoring_password.clone())
                    .grant(Role::ClusterMonitor, admin)
                    .grant(Role::Read, LOCAL_DATABASE),
            },
            Step::CreateAccount {
                target: Target::Application,
                account: Account::new(APP_USER, credentials.app_password.clone())
                    .grant(Role::ReadWrite, app)
                    .grant(Role::DbAdmin, app),
            },
        ]
    }
}
