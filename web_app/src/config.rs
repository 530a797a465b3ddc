//! Application configuration management with security considerations.
//!
//! This module handles all configuration values required for the application.
//! Sensitive fields are clearly marked and should never be logged.
//!
//! # Security Notes
//! - Webhook app secrets and verify tokens are issued by each platform
//! - Production environments should use secure secret management systems
//! - `MOCK_MODE` relaxes signature enforcement and is ignored in `prod`

use envconfig::Envconfig;
use std::{sync::OnceLock, time::Duration};

use crate::models::integration::Platform;

/// Application configuration with security-aware field management.
///
/// This struct contains all environment variables used to configure the application.
#[derive(Envconfig, Clone)]
pub struct AppConfig {
    /// Environment name to deploy the app (NON-SENSITIVE)
    /// Values: "local", "dev", "staging", "prod"
    #[envconfig(default = "local")]
    pub env: String,

    /// Database host value (NON-SENSITIVE)
    /// Example: "sqlite:data/app.db"
    pub db_host: String,

    /// 🔒 SENSITIVE: Database password to encrypt SQLite data (used in prod)
    #[envconfig(default = "")]
    pub db_pass_encrypt: String,

    /// Host address for web server binding (NON-SENSITIVE)
    #[envconfig(default = "0.0.0.0")]
    pub web_server_host: String,

    /// Port for web server binding (NON-SENSITIVE)
    #[envconfig(default = "8080")]
    pub web_server_port: u16,

    /// Path to SSL private key file (SENSITIVE PATH)
    #[envconfig(default = "server.key")]
    pub private_key_path: String,

    /// Path to SSL certificate file (NON-SENSITIVE)
    #[envconfig(default = "server.crt")]
    pub certificate_path: String,

    /// 🔒 SENSITIVE: Logfire write token. Telemetry stays local when absent.
    pub logfire_token: Option<String>,

    /// Relaxes webhook signature enforcement for local testing (NON-SENSITIVE)
    #[envconfig(default = "false")]
    pub mock_mode: bool,

    /// 🔒 SENSITIVE: token typed in the Meta dashboard for the Facebook handshake
    pub facebook_verify_token: Option<String>,

    /// 🔒 SENSITIVE: Facebook app secret used for `x-hub-signature-256`
    pub facebook_app_secret: Option<String>,

    /// 🔒 SENSITIVE: token typed in the Meta dashboard for the Instagram handshake
    pub instagram_verify_token: Option<String>,

    /// 🔒 SENSITIVE: Instagram app secret used for `x-hub-signature-256`
    pub instagram_app_secret: Option<String>,

    /// 🔒 SENSITIVE: token typed in the Meta dashboard for the WhatsApp handshake
    pub whatsapp_verify_token: Option<String>,

    /// 🔒 SENSITIVE: WhatsApp app secret used for `x-hub-signature-256`
    pub whatsapp_app_secret: Option<String>,

    /// 🔒 SENSITIVE: Twilio auth token used for `x-twilio-signature`
    pub twilio_auth_token: Option<String>,

    /// 🔒 SENSITIVE: shared secret for signed website forms
    pub web_form_secret: Option<String>,

    /// Graph API version used for every Meta call (NON-SENSITIVE)
    #[envconfig(default = "v22.0")]
    pub graph_api_version: String,

    /// 🔒 SENSITIVE: AI completion key. AI replies fall back to greetings when absent.
    pub openai_api_key: Option<String>,

    /// OpenAI compatible endpoint (NON-SENSITIVE)
    #[envconfig(default = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    #[envconfig(default = "gpt-4o-mini")]
    pub openai_model: String,

    /// Upper bound for a single AI completion
    #[envconfig(default = "15")]
    pub ai_timeout_secs: u64,

    /// Default timeout of the outbound http client
    #[envconfig(default = "20")]
    pub http_timeout_secs: u64,

    /// Pending audit entries kept in memory before new ones are dropped
    #[envconfig(default = "1024")]
    pub audit_buffer_size: usize,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_prod(&self) -> bool {
        self.env.to_lowercase() == "prod"
    }

    /// Base url of the Graph API, shared by Facebook, Instagram and WhatsApp
    pub fn graph_api_base_url(&self) -> String {
        format!(
            "https://graph.facebook.com/{version}",
            version = self.graph_api_version
        )
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Subset of the configuration the webhook handlers need
    pub fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            facebook: PlatformSecrets {
                verify_token: self.facebook_verify_token.clone(),
                app_secret: self.facebook_app_secret.clone(),
            },
            instagram: PlatformSecrets {
                verify_token: self.instagram_verify_token.clone(),
                app_secret: self.instagram_app_secret.clone(),
            },
            whatsapp: PlatformSecrets {
                verify_token: self.whatsapp_verify_token.clone(),
                app_secret: self.whatsapp_app_secret.clone(),
            },
            web: PlatformSecrets {
                verify_token: None,
                app_secret: self.web_form_secret.clone(),
            },
            twilio_auth_token: self.twilio_auth_token.clone(),
            mock_mode: self.mock_mode,
            production: self.is_prod(),
        }
    }
}

/// Handshake token and signing secret of one platform
#[derive(Clone, Debug, Default)]
pub struct PlatformSecrets {
    pub verify_token: Option<String>,
    pub app_secret: Option<String>,
}

/// Webhook settings detached from the process environment.
#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    pub facebook: PlatformSecrets,
    pub instagram: PlatformSecrets,
    pub whatsapp: PlatformSecrets,
    pub web: PlatformSecrets,
    pub twilio_auth_token: Option<String>,
    pub mock_mode: bool,
    pub production: bool,
}

impl WebhookConfig {
    pub fn secrets(&self, platform: Platform) -> &PlatformSecrets {
        match platform {
            Platform::Facebook => &self.facebook,
            Platform::Instagram => &self.instagram,
            Platform::Whatsapp => &self.whatsapp,
            Platform::Web => &self.web,
        }
    }

    /// Signatures are enforced everywhere except explicit mock mode outside prod
    pub fn signature_enforced(&self) -> bool {
        !self.mock_mode || self.production
    }
}

/// Global application configuration instance
pub static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Loads the configuration from environment variables into [`APP_CONFIG`]
pub fn init_config() -> anyhow::Result<()> {
    let app_config = AppConfig::init_from_env()?;
    APP_CONFIG
        .set(app_config)
        .map_err(|_| anyhow::anyhow!("app config was already initialized"))
}
