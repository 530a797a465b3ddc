use envconfig::Envconfig;
use std::sync::OnceLock;

#[derive(Envconfig, Clone)]
pub struct AppConfig {
    #[envconfig(default = "local")]
    pub env: String,
    pub db_host: String,
    #[envconfig(default = "")]
    pub db_pass_encrypt: String,
}

impl AppConfig {
    pub fn is_prod(&self) -> bool {
        self.env.to_lowercase() == "prod"
    }
}

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Reads the environment on first use
pub fn app_config() -> anyhow::Result<&'static AppConfig> {
    if let Some(config) = APP_CONFIG.get() {
        return Ok(config);
    }
    let config = AppConfig::init_from_env()?;
    Ok(APP_CONFIG.get_or_init(|| config))
}
