use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Auto-reply configuration of a tenant, edited from the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AutomationSettings {
    pub tenant_id: i64,
    pub auto_reply_enabled: bool,
    pub ai_enabled: bool,
    pub system_prompt: Option<String>,
    pub greeting_message: Option<String>,
    pub comment_to_dm_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Returned as stored, blank values count as unset
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl AutomationSettings {
    /// System prompt, only when AI replies are switched on and the prompt is not blank
    pub fn ai_prompt(&self) -> Option<&str> {
        if !self.ai_enabled {
            return None;
        }
        non_blank(&self.system_prompt)
    }

    pub fn greeting(&self) -> Option<&str> {
        non_blank(&self.greeting_message)
    }
}
