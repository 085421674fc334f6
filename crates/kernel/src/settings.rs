use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::schema::Credential;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "ORCATRACK_ENV";
const CONFIG_DIR_ENV: &str = "ORCATRACK_CONFIG_DIR";
const ENV_PREFIX: &str = "ORCATRACK";

/// Deployment environment the provisioning run targets.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub credentials: CredentialSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// and `ORCATRACK_*` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .with_context(|| "unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit directory and environment name.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment = Environment::parse(environment)?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_admin_database")]
    pub admin_database: String,
    #[serde(default = "DatabaseSettings::default_app_database")]
    pub app_database: String,
    #[serde(default = "DatabaseSettings::default_app_name")]
    pub app_name: String,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_admin_database() -> String {
        "admin".to_string()
    }

    fn default_app_database() -> String {
        "orcatrack".to_string()
    }

    fn default_app_name() -> String {
        "orcatrack-init".to_string()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            admin_database: Self::default_admin_database(),
            app_database: Self::default_app_database(),
            app_name: Self::default_app_name(),
        }
    }
}

/// Passwords for the provisioned accounts. Defaults are placeholders meant
/// to be substituted before deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSettings {
    #[serde(default = "CredentialSettings::default_backup_password")]
    pub backup_password: Credential,
    #[serde(default = "CredentialSettings::default_monitoring_password")]
    pub monitoring_password: Credential,
    #[serde(default = "CredentialSettings::default_app_password")]
    pub app_password: Credential,
}

impl CredentialSettings {
    fn default_backup_password() -> Credential {
        Credential::new("CHANGE_THIS_BACKUP_PASSWORD")
    }

    fn default_monitoring_password() -> Credential {
        Credential::new("CHANGE_THIS_MONITORING_PASSWORD")
    }

    fn default_app_password() -> Credential {
        Credential::new("CHANGE_THIS_APP_PASSWORD")
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            backup_password: Self::default_backup_password(),
            monitoring_password: Self::default_monitoring_password(),
            app_password: Self::default_app_password(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_level")]
    pub level: String,
}

impl TelemetrySettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
