use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Source of a webhook delivery and owner of an integration token
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type,
)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[display("facebook")]
    Facebook,
    #[display("instagram")]
    Instagram,
    #[display("whatsapp")]
    Whatsapp,
    /// Signed website forms
    #[display("web")]
    Web,
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "facebook" => Ok(Self::Facebook),
            "instagram" => Ok(Self::Instagram),
            "whatsapp" => Ok(Self::Whatsapp),
            "web" => Ok(Self::Web),
            other => anyhow::bail!("unknown platform: {other}"),
        }
    }
}

/// Access token stored when a tenant connects a page or account
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IntegrationToken {
    pub id: i64,
    pub tenant_id: i64,
    pub platform: Platform,
    /// Page id, Instagram account id, WhatsApp phone number id or web form id
    pub page_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
