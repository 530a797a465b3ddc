pub mod ai;
pub mod audit;
pub mod graph;
pub mod graph_schemas;

use crate::models;
use async_trait::async_trait;

/// Generates reply text from a tenant prompt and the customer's words
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiCompletion {
    async fn generate_reply(
        &self,
        system_prompt: &str,
        user_text: &str,
        business_name: &str,
    ) -> anyhow::Result<String>;
}

/// Who receives a direct message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Platform scoped user id (Messenger/Instagram) or phone number (WhatsApp)
    User(String),
    /// Private reply to the author of a comment
    Comment(String),
}

/// Result of a platform send call, failures carry the provider error text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { id: Option<String> },
    Failed { error: String },
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformSender {
    async fn reply_to_comment(
        &self,
        platform: models::integration::Platform,
        comment_id: &str,
        text: &str,
        access_token: &str,
    ) -> SendOutcome;

    async fn send_direct_message(
        &self,
        platform: models::integration::Platform,
        page_id: &str,
        recipient: &Recipient,
        text: &str,
        access_token: &str,
    ) -> SendOutcome;
}

/// Non-blocking audit append. Implementations must never fail the caller.
pub trait AuditSink {
    fn record(&self, entry: models::audit::AuditLogEntry);
}

pub type ImplAiCompletion = Box<dyn AiCompletion>;
pub type ImplPlatformSender = Box<dyn PlatformSender>;
pub type ImplAuditSink = Box<dyn AuditSink>;
