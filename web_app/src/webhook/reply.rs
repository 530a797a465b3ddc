//! Reply text selection: AI completion first, then the tenant greeting,
//! then [`DEFAULT_REPLY`](crate::consts::DEFAULT_REPLY). Never fails.

use derive_more::Display;
use std::time::Duration;

use crate::{
    consts::DEFAULT_REPLY,
    models::{audit::AuditLogEntry, automation::AutomationSettings},
    services::{ImplAiCompletion, ImplAuditSink},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ReplySource {
    #[display("ai")]
    Ai,
    #[display("greeting")]
    Greeting,
    #[display("default")]
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    pub source: ReplySource,
}

pub struct ReplyGenerator<'a> {
    pub ai: &'a ImplAiCompletion,
    pub audit: &'a ImplAuditSink,
    pub timeout: Duration,
}

fn fallback(settings: &AutomationSettings) -> GeneratedReply {
    match settings.greeting() {
        Some(greeting) => GeneratedReply {
            text: greeting.to_string(),
            source: ReplySource::Greeting,
        },
        None => GeneratedReply {
            text: DEFAULT_REPLY.to_string(),
            source: ReplySource::Default,
        },
    }
}

impl ReplyGenerator<'_> {
    async fn ask_ai(
        &self,
        system_prompt: &str,
        user_text: &str,
        business_name: &str,
    ) -> anyhow::Result<String> {
        let text = tokio::time::timeout(
            self.timeout,
            self.ai
                .generate_reply(system_prompt, user_text, business_name),
        )
        .await
        .map_err(|_| anyhow::anyhow!("ai completion timed out after {:?}", self.timeout))??;

        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("ai completion returned an empty reply");
        }
        Ok(text.to_string())
    }

    /// `metadata` is copied into the audit entry written when the AI call fails
    pub async fn generate(
        &self,
        settings: &AutomationSettings,
        business_name: &str,
        user_text: Option<&str>,
        metadata: &serde_json::Value,
    ) -> GeneratedReply {
        let user_text = user_text.map(str::trim).filter(|t| !t.is_empty());
        let (Some(system_prompt), Some(user_text)) = (settings.ai_prompt(), user_text) else {
            return fallback(settings);
        };

        match self.ask_ai(system_prompt, user_text, business_name).await {
            Ok(text) => GeneratedReply {
                text,
                source: ReplySource::Ai,
            },
            Err(e) => {
                let mut metadata = metadata.clone();
                if let Some(object) = metadata.as_object_mut() {
                    object.insert("error".into(), e.to_string().into());
                }
                self.audit.record(AuditLogEntry::warn(
                    Some(settings.tenant_id),
                    "AI reply generation failed",
                    metadata,
                ));
                fallback(settings)
            }
        }
    }
}
