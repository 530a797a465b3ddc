use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Display, sqlx::Type,
)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    #[default]
    #[display("info")]
    Info,
    #[display("warn")]
    Warn,
    #[display("error")]
    Error,
}

/// Append-only record of a pipeline decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub tenant_id: Option<i64>,
    pub level: AuditLevel,
    pub message: String,
    /// Always a json object
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        level: AuditLevel,
        tenant_id: Option<i64>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        let metadata = match metadata {
            serde_json::Value::Object(_) => metadata,
            serde_json::Value::Null => serde_json::json!({}),
            other => serde_json::json!({ "value": other }),
        };

        Self {
            id: 0,
            tenant_id,
            level,
            message: message.into(),
            metadata,
            created_at: Utc::now(),
        }
    }

    pub fn info(
        tenant_id: Option<i64>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self::new(AuditLevel::Info, tenant_id, message, metadata)
    }

    pub fn warn(
        tenant_id: Option<i64>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self::new(AuditLevel::Warn, tenant_id, message, metadata)
    }

    pub fn error(
        tenant_id: Option<i64>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self::new(AuditLevel::Error, tenant_id, message, metadata)
    }
}
