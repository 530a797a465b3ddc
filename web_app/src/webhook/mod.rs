//! Inbound webhooks of the social platforms and website forms
//!
//! ## Modules
//!
//! - [`routes`] - handshake and delivery endpoints
//! - [`security`] - signature policy per platform
//! - [`events`] - payload parsing into canonical events
//! - [`handler`] - tenant resolution, settings gate and reply dispatch
//! - [`reply`] - AI / greeting / default reply selection

pub mod errors;
pub mod events;
pub mod handler;
pub mod reply;
pub mod routes;
pub mod security;

use std::time::Duration;

use crate::{config::WebhookConfig, repo, services};

/// Per worker state shared by the webhook endpoints
pub struct AppState {
    pub repo: repo::ImplAppRepo,
    pub ai: services::ImplAiCompletion,
    pub sender: services::ImplPlatformSender,
    pub audit: services::ImplAuditSink,
    pub webhooks: WebhookConfig,
    pub ai_timeout: Duration,
}

impl AppState {
    pub fn dispatcher(&self) -> handler::Dispatcher<'_> {
        handler::Dispatcher {
            repo: &self.repo,
            ai: &self.ai,
            sender: &self.sender,
            audit: &self.audit,
            ai_timeout: self.ai_timeout,
        }
    }
}
