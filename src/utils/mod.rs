//! Project-specific utilities live here.

use orcatrack_kernel::settings::Settings;

/// Names of credential settings still holding a `CHANGE_THIS_*` placeholder.
pub fn placeholder_credentials(settings: &Settings) -> Vec<&'static str> {
    let credentials = &settings.credentials;
    [
        ("backup_password", &credentials.backup_password),
        ("monitoring_password", &credentials.monitoring_password),
        ("app_password", &credentials.app_password),
    ]
    .into_iter()
    .filter(|(_, credential)| credential.is_placeholder())
    .map(|(name, _)| name)
    .collect()
}
