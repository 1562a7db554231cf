use serde::Deserialize;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "SCHEMA_CHARTS";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub security: SecuritySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub path: PathBuf,
}

#[derive(Deserialize, Clone)]
pub struct SecuritySettings {
    /// Base64 of the 32 byte key used to encrypt stored passwords.
    pub secret_key: String,
}

impl std::fmt::Debug for SecuritySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecuritySettings")
            .field("secret_key", &"***")
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

/// `config/app` (optional) overlaid with `SCHEMA_CHARTS__SECTION__KEY`
/// environment variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    load_from("config/app")
}

pub fn load_from(file: &str) -> anyhow::Result<AppConfig> {
    build(file, environment())
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn build(file: &str, env: config::Environment) -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("store.path", "data/schema-charts.sqlite")?
        .set_default("logging.level", "info")?
        .set_default("logging.json", false)?
        .add_source(config::File::with_name(file).required(false))
        .add_source(env)
        .build()?;

    Ok(settings.try_deserialize()?)
}
