//! # Delivery Dispatcher
//!
//! Walks the entries of a parsed delivery and, for every event, resolves the
//! tenant owning the page, applies the automation settings and sends the
//! reply. Each entry is isolated: a failing lookup is audited and the
//! remaining entries still run.

use anyhow::Context;
use serde_json::{Value, json};
use std::time::Duration;

use super::{
    events::{CommentEvent, Delivery, InboundEvent, MessageEvent, WebhookEntry},
    reply::ReplyGenerator,
};
use crate::{
    metric,
    models::{
        audit::AuditLogEntry, automation::AutomationSettings, integration::IntegrationToken,
        integration::Platform, tenant::Tenant,
    },
    repo,
    services::{ImplAiCompletion, ImplAuditSink, ImplPlatformSender, Recipient, SendOutcome},
};

/// Counts reported back to the platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    /// Entries that completed without error, no-ops included
    pub processed: usize,
    pub total: usize,
}

/// Everything needed to answer on behalf of one tenant
struct TenantContext {
    token: IntegrationToken,
    tenant: Tenant,
    settings: AutomationSettings,
}

#[derive(Debug, Clone, Copy, derive_more::Display)]
enum SendKind {
    #[display("comment_reply")]
    CommentReply,
    #[display("comment_to_dm")]
    CommentToDm,
    #[display("direct_message")]
    DirectMessage,
}

impl SendKind {
    fn sent_message(self) -> &'static str {
        match self {
            SendKind::CommentReply => "Comment replied successfully",
            SendKind::CommentToDm => "Comment-to-DM sent",
            SendKind::DirectMessage => "Direct message sent",
        }
    }

    fn failed_message(self) -> &'static str {
        match self {
            SendKind::CommentReply => "Comment reply failed",
            SendKind::CommentToDm => "Comment-to-DM failed",
            SendKind::DirectMessage => "Direct message failed",
        }
    }
}

pub struct Dispatcher<'a> {
    pub repo: &'a repo::ImplAppRepo,
    pub ai: &'a ImplAiCompletion,
    pub sender: &'a ImplPlatformSender,
    pub audit: &'a ImplAuditSink,
    pub ai_timeout: Duration,
}

fn event_metadata(delivery_id: &str, event: &InboundEvent, platform: Platform) -> Value {
    json!({
        "delivery_id": delivery_id,
        "platform": platform,
        "page_id": event.page_id(),
        "event_id": event.external_id(),
        "kind": event.kind(),
    })
}

fn with_fields(mut metadata: Value, fields: Value) -> Value {
    if let (Some(target), Value::Object(extra)) = (metadata.as_object_mut(), fields) {
        target.extend(extra);
    }
    metadata
}

impl Dispatcher<'_> {
    fn reply_generator(&self) -> ReplyGenerator<'_> {
        ReplyGenerator {
            ai: self.ai,
            audit: self.audit,
            timeout: self.ai_timeout,
        }
    }

    /// Processes every entry sequentially, never fails as a whole
    pub async fn process_delivery(
        &self,
        delivery: &Delivery,
        delivery_id: &str,
    ) -> DeliverySummary {
        self.audit.record(AuditLogEntry::info(
            None,
            "Webhook received",
            json!({
                "delivery_id": delivery_id,
                "platform": delivery.platform,
                "object": delivery.object,
                "entries": delivery.entries.len(),
            }),
        ));

        let mut summary = DeliverySummary {
            processed: 0,
            total: delivery.entries.len(),
        };

        for entry in &delivery.entries {
            match self.process_entry(delivery.platform, entry, delivery_id).await {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    logfire::error!(
                        "Entry processing failed: {error}",
                        error = format!("{e:#}"),
                        delivery_id = delivery_id.to_string()
                    );
                    self.audit.record(AuditLogEntry::error(
                        None,
                        "Entry processing failed",
                        json!({
                            "delivery_id": delivery_id,
                            "platform": delivery.platform,
                            "page_id": entry.page_id,
                            "error": format!("{e:#}"),
                        }),
                    ));
                }
            }
        }

        summary
    }

    async fn process_entry(
        &self,
        platform: Platform,
        entry: &WebhookEntry,
        delivery_id: &str,
    ) -> anyhow::Result<()> {
        for event in &entry.events {
            self.process_event(platform, event, delivery_id).await?;
        }
        Ok(())
    }

    async fn process_event(
        &self,
        platform: Platform,
        event: &InboundEvent,
        delivery_id: &str,
    ) -> anyhow::Result<()> {
        let page_id = match event {
            InboundEvent::Unknown(unknown) => {
                tracing::debug!(kind = %unknown.kind, "ignoring unsupported event");
                return Ok(());
            }
            InboundEvent::Comment(comment)
                if comment.author_id.as_deref() == Some(comment.page_id.as_str()) =>
            {
                tracing::debug!(
                    comment_id = %comment.comment_id,
                    "ignoring comment made by the page"
                );
                return Ok(());
            }
            InboundEvent::Comment(comment) => comment.page_id.as_str(),
            InboundEvent::Message(message) => message.page_id.as_str(),
        };

        let metadata = event_metadata(delivery_id, event, platform);
        let Some(ctx) = self.resolve_tenant(platform, page_id, &metadata).await? else {
            return Ok(());
        };

        if !ctx.settings.auto_reply_enabled {
            self.audit.record(AuditLogEntry::info(
                Some(ctx.tenant.id),
                "Auto-reply disabled",
                metadata,
            ));
            return Ok(());
        }

        match event {
            InboundEvent::Comment(comment) => self.handle_comment(&ctx, comment, metadata).await,
            InboundEvent::Message(message) => self.handle_message(&ctx, message, metadata).await,
            InboundEvent::Unknown(_) => {}
        }
        Ok(())
    }

    /// Token, tenant and settings of a page. `None` when any of them rules out a reply.
    async fn resolve_tenant(
        &self,
        platform: Platform,
        page_id: &str,
        metadata: &Value,
    ) -> anyhow::Result<Option<TenantContext>> {
        let Some(token) = self
            .repo
            .get_integration_token_by_page_id(platform, page_id)
            .await
            .context("failed to load integration token")?
        else {
            self.audit.record(AuditLogEntry::info(
                None,
                "No integration for page",
                metadata.clone(),
            ));
            return Ok(None);
        };

        let tenant = self
            .repo
            .get_tenant_by_id(token.tenant_id)
            .await
            .context("failed to load tenant")?;
        let Some(tenant) = tenant.filter(Tenant::can_receive_replies) else {
            self.audit.record(AuditLogEntry::info(
                Some(token.tenant_id),
                "Tenant subscription inactive",
                metadata.clone(),
            ));
            return Ok(None);
        };

        let Some(settings) = self
            .repo
            .get_automation_settings(tenant.id)
            .await
            .context("failed to load automation settings")?
        else {
            self.audit.record(AuditLogEntry::info(
                Some(tenant.id),
                "Auto-reply disabled",
                metadata.clone(),
            ));
            return Ok(None);
        };

        Ok(Some(TenantContext {
            token,
            tenant,
            settings,
        }))
    }

    fn record_send(
        &self,
        tenant_id: i64,
        outcome: &SendOutcome,
        kind: SendKind,
        metadata: Value,
    ) {
        match outcome {
            SendOutcome::Sent { id } => {
                metric::incr_reply_statds(&format!("{kind}_sent"));
                self.audit.record(AuditLogEntry::info(
                    Some(tenant_id),
                    kind.sent_message(),
                    with_fields(metadata, json!({ "sent_id": id })),
                ));
            }
            SendOutcome::Failed { error } => {
                metric::incr_reply_statds(&format!("{kind}_failed"));
                self.audit.record(AuditLogEntry::error(
                    Some(tenant_id),
                    kind.failed_message(),
                    with_fields(metadata, json!({ "error": error })),
                ));
            }
        }
    }

    async fn handle_comment(&self, ctx: &TenantContext, comment: &CommentEvent, metadata: Value) {
        let generator = self.reply_generator();
        let business_name = ctx.tenant.business_name.as_str();

        let reply = generator
            .generate(&ctx.settings, business_name, comment.text.as_deref(), &metadata)
            .await;
        let outcome = self
            .sender
            .reply_to_comment(
                comment.platform,
                &comment.comment_id,
                &reply.text,
                &ctx.token.access_token,
            )
            .await;
        self.record_send(
            ctx.tenant.id,
            &outcome,
            SendKind::CommentReply,
            with_fields(metadata.clone(), json!({ "reply_source": reply.source.to_string() })),
        );

        if !ctx.settings.comment_to_dm_enabled {
            return;
        }

        let dm = generator
            .generate(&ctx.settings, business_name, comment.text.as_deref(), &metadata)
            .await;
        let outcome = self
            .sender
            .send_direct_message(
                comment.platform,
                &comment.page_id,
                &Recipient::Comment(comment.comment_id.clone()),
                &dm.text,
                &ctx.token.access_token,
            )
            .await;
        self.record_send(
            ctx.tenant.id,
            &outcome,
            SendKind::CommentToDm,
            with_fields(metadata, json!({ "reply_source": dm.source.to_string() })),
        );
    }

    async fn handle_message(&self, ctx: &TenantContext, message: &MessageEvent, metadata: Value) {
        if message.platform == Platform::Web {
            self.audit.record(AuditLogEntry::info(
                Some(ctx.tenant.id),
                "Web form submission received",
                with_fields(
                    metadata,
                    json!({
                        "sender": message.sender_id,
                        "sender_name": message.sender_name,
                        "text": message.text,
                    }),
                ),
            ));
            return;
        }

        let reply = self
            .reply_generator()
            .generate(
                &ctx.settings,
                &ctx.tenant.business_name,
                message.text.as_deref(),
                &metadata,
            )
            .await;
        let outcome = self
            .sender
            .send_direct_message(
                message.platform,
                &message.page_id,
                &Recipient::User(message.sender_id.clone()),
                &reply.text,
                &ctx.token.access_token,
            )
            .await;
        self.record_send(
            ctx.tenant.id,
            &outcome,
            SendKind::DirectMessage,
            with_fields(metadata, json!({ "reply_source": reply.source.to_string() })),
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        models::tenant::SubscriptionStatus,
        repo::MockAppRepo,
        services::{MockAiCompletion, MockPlatformSender, audit::MemoryAuditSink},
        webhook::events::parse_delivery,
    };
    use chrono::Utc;

    pub fn create_test_token(
        tenant_id: i64,
        platform: Platform,
        page_id: &str,
    ) -> IntegrationToken {
        IntegrationToken {
            id: 1,
            tenant_id,
            platform,
            page_id: page_id.to_string(),
            access_token: "page-token".to_string(),
            display_name: Some("Bean Co Page".to_string()),
            created_at: Utc::now(),
        }
    }

    pub fn create_test_tenant(id: i64, status: SubscriptionStatus) -> Tenant {
        Tenant {
            id,
            email: "owner@beanco.test".to_string(),
            business_name: "Bean Co".to_string(),
            subscription_status: status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn create_test_settings(tenant_id: i64) -> AutomationSettings {
        AutomationSettings {
            tenant_id,
            auto_reply_enabled: true,
            ai_enabled: false,
            system_prompt: None,
            greeting_message: Some("Thanks!".to_string()),
            comment_to_dm_enabled: false,
            updated_at: Utc::now(),
        }
    }

    pub fn facebook_comment(page_id: &str, comment_id: &str, author_id: &str) -> Value {
        json!({
            "id": page_id,
            "time": 1718000000,
            "changes": [{
                "field": "feed",
                "value": {
                    "item": "comment",
                    "verb": "add",
                    "comment_id": comment_id,
                    "post_id": format!("{page_id}_post"),
                    "from": {"id": author_id, "name": "Ana"},
                    "message": "Do you deliver?",
                    "created_time": 1718000000
                }
            }]
        })
    }

    /// Repo serving one connected page for tenant 1
    fn repo_for_page(
        platform: Platform,
        page_id: &'static str,
        settings: AutomationSettings,
    ) -> MockAppRepo {
        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_get_integration_token_by_page_id()
            .returning(move |p, id| {
                Ok((p == platform && id == page_id).then(|| create_test_token(1, p, id)))
            });
        mock_repo
            .expect_get_tenant_by_id()
            .returning(|id| Ok(Some(create_test_tenant(id, SubscriptionStatus::Active))));
        mock_repo
            .expect_get_automation_settings()
            .returning(move |_| Ok(Some(settings.clone())));
        mock_repo
    }

    struct Collaborators {
        repo: repo::ImplAppRepo,
        ai: ImplAiCompletion,
        sender: ImplPlatformSender,
        audit: ImplAuditSink,
    }

    impl Collaborators {
        fn new(
            repo: MockAppRepo,
            ai: MockAiCompletion,
            sender: MockPlatformSender,
            sink: &MemoryAuditSink,
        ) -> Self {
            Self {
                repo: Box::new(repo),
                ai: Box::new(ai),
                sender: Box::new(sender),
                audit: Box::new(sink.clone()),
            }
        }

        fn dispatcher(&self) -> Dispatcher<'_> {
            Dispatcher {
                repo: &self.repo,
                ai: &self.ai,
                sender: &self.sender,
                audit: &self.audit,
                ai_timeout: Duration::from_secs(1),
            }
        }
    }

    #[ntex::test]
    async fn test_comment_reply_with_greeting() {
        let mut mock_sender = MockPlatformSender::new();
        mock_sender
            .expect_reply_to_comment()
            .withf(|platform, comment_id, text, token| {
                *platform == Platform::Facebook
                    && comment_id == "c-1"
                    && text == "Thanks!"
                    && token == "page-token"
            })
            .times(1)
            .returning(|_, _, _, _| SendOutcome::Sent {
                id: Some("reply-1".into()),
            });
        mock_sender.expect_send_direct_message().never();

        let sink = MemoryAuditSink::default();
        let collaborators = Collaborators::new(
            repo_for_page(Platform::Facebook, "page-1", create_test_settings(1)),
            MockAiCompletion::new(),
            mock_sender,
            &sink,
        );

        let payload = json!({"object": "page", "entry": [facebook_comment("page-1", "c-1", "user-7")]});
        let delivery = parse_delivery(Platform::Facebook, &payload);
        let summary = collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        assert_eq!(summary, DeliverySummary { processed: 1, total: 1 });
        assert_eq!(sink.count("Comment replied successfully"), 1);

        let replied = sink
            .entries()
            .into_iter()
            .find(|e| e.message == "Comment replied successfully")
            .unwrap();
        assert_eq!(replied.tenant_id, Some(1));
        assert_eq!(replied.metadata["event_id"], "c-1");
        assert_eq!(replied.metadata["delivery_id"], "delivery-1");
        assert_eq!(replied.metadata["reply_source"], "greeting");
        assert_eq!(replied.metadata["sent_id"], "reply-1");
    }

    #[ntex::test]
    async fn test_ai_failure_sends_greeting_verbatim() {
        let mut settings = create_test_settings(1);
        settings.ai_enabled = true;
        settings.system_prompt = Some("Friendly barista".into());
        settings.greeting_message = Some("  Thanks, we'll DM you! ".into());

        let mut mock_ai = MockAiCompletion::new();
        mock_ai
            .expect_generate_reply()
            .times(1)
            .returning(|_, _, _| anyhow::bail!("provider unavailable"));

        let mut mock_sender = MockPlatformSender::new();
        mock_sender
            .expect_reply_to_comment()
            .withf(|_, _, text, _| text == "  Thanks, we'll DM you! ")
            .times(1)
            .returning(|_, _, _, _| SendOutcome::Sent { id: None });

        let sink = MemoryAuditSink::default();
        let collaborators = Collaborators::new(
            repo_for_page(Platform::Facebook, "page-1", settings),
            mock_ai,
            mock_sender,
            &sink,
        );

        let payload = json!({"object": "page", "entry": [facebook_comment("page-1", "c-1", "user-7")]});
        let delivery = parse_delivery(Platform::Facebook, &payload);
        collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        assert_eq!(sink.count("AI reply generation failed"), 1);
        assert_eq!(sink.count("Comment replied successfully"), 1);
    }

    #[ntex::test]
    async fn test_failing_entry_does_not_stop_siblings() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_get_integration_token_by_page_id()
            .returning(|platform, page_id| {
                if page_id == "page-broken" {
                    anyhow::bail!("database is locked")
                }
                Ok(Some(create_test_token(1, platform, page_id)))
            });
        mock_repo
            .expect_get_tenant_by_id()
            .returning(|id| Ok(Some(create_test_tenant(id, SubscriptionStatus::Active))));
        mock_repo
            .expect_get_automation_settings()
            .returning(|id| Ok(Some(create_test_settings(id))));

        let mut mock_sender = MockPlatformSender::new();
        mock_sender
            .expect_reply_to_comment()
            .withf(|_, comment_id, _, _| comment_id == "c-1" || comment_id == "c-3")
            .times(2)
            .returning(|_, _, _, _| SendOutcome::Sent { id: None });

        let sink = MemoryAuditSink::default();
        let collaborators =
            Collaborators::new(mock_repo, MockAiCompletion::new(), mock_sender, &sink);

        let payload = json!({
            "object": "page",
            "entry": [
                facebook_comment("page-1", "c-1", "user-7"),
                facebook_comment("page-broken", "c-2", "user-8"),
                facebook_comment("page-3", "c-3", "user-9"),
            ]
        });
        let delivery = parse_delivery(Platform::Facebook, &payload);
        let summary = collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        assert_eq!(summary, DeliverySummary { processed: 2, total: 3 });
        assert_eq!(sink.count("Comment replied successfully"), 2);

        let failed = sink
            .entries()
            .into_iter()
            .find(|e| e.message == "Entry processing failed")
            .unwrap();
        assert_eq!(failed.metadata["page_id"], "page-broken");
        assert!(
            failed.metadata["error"]
                .as_str()
                .unwrap()
                .contains("database is locked")
        );
    }

    #[ntex::test]
    async fn test_inactive_subscription_stops_before_settings() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_get_integration_token_by_page_id()
            .returning(|platform, page_id| Ok(Some(create_test_token(2, platform, page_id))));
        mock_repo
            .expect_get_tenant_by_id()
            .returning(|id| Ok(Some(create_test_tenant(id, SubscriptionStatus::PastDue))));
        mock_repo.expect_get_automation_settings().never();

        let mut mock_sender = MockPlatformSender::new();
        mock_sender.expect_reply_to_comment().never();

        let sink = MemoryAuditSink::default();
        let collaborators =
            Collaborators::new(mock_repo, MockAiCompletion::new(), mock_sender, &sink);

        let payload = json!({"object": "page", "entry": [facebook_comment("page-1", "c-1", "user-7")]});
        let delivery = parse_delivery(Platform::Facebook, &payload);
        let summary = collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        assert_eq!(summary, DeliverySummary { processed: 1, total: 1 });
        let inactive = sink
            .entries()
            .into_iter()
            .find(|e| e.message == "Tenant subscription inactive")
            .unwrap();
        assert_eq!(inactive.tenant_id, Some(2));
    }

    #[ntex::test]
    async fn test_unknown_page_is_a_no_op() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo
            .expect_get_integration_token_by_page_id()
            .times(1)
            .returning(|_, _| Ok(None));
        mock_repo.expect_get_tenant_by_id().never();

        let mut mock_sender = MockPlatformSender::new();
        mock_sender.expect_reply_to_comment().never();

        let sink = MemoryAuditSink::default();
        let collaborators =
            Collaborators::new(mock_repo, MockAiCompletion::new(), mock_sender, &sink);

        let payload = json!({"object": "page", "entry": [facebook_comment("page-9", "c-1", "user-7")]});
        let delivery = parse_delivery(Platform::Facebook, &payload);
        let summary = collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        assert_eq!(summary, DeliverySummary { processed: 1, total: 1 });
        assert_eq!(sink.count("No integration for page"), 1);
    }

    #[ntex::test]
    async fn test_auto_reply_disabled_sends_nothing() {
        let mut settings = create_test_settings(1);
        settings.auto_reply_enabled = false;

        let mut mock_sender = MockPlatformSender::new();
        mock_sender.expect_reply_to_comment().never();
        mock_sender.expect_send_direct_message().never();

        let sink = MemoryAuditSink::default();
        let collaborators = Collaborators::new(
            repo_for_page(Platform::Facebook, "page-1", settings),
            MockAiCompletion::new(),
            mock_sender,
            &sink,
        );

        let payload = json!({"object": "page", "entry": [facebook_comment("page-1", "c-1", "user-7")]});
        let delivery = parse_delivery(Platform::Facebook, &payload);
        let summary = collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        assert_eq!(summary.processed, 1);
        assert_eq!(sink.count("Auto-reply disabled"), 1);
    }

    #[ntex::test]
    async fn test_comment_to_dm_sends_private_reply() {
        let mut settings = create_test_settings(1);
        settings.comment_to_dm_enabled = true;

        let mut mock_sender = MockPlatformSender::new();
        mock_sender
            .expect_reply_to_comment()
            .times(1)
            .returning(|_, _, _, _| SendOutcome::Sent { id: None });
        mock_sender
            .expect_send_direct_message()
            .withf(|platform, page_id, recipient, text, _| {
                *platform == Platform::Instagram
                    && page_id == "ig-1"
                    && *recipient == Recipient::Comment("ig-c-1".into())
                    && text == "Thanks!"
            })
            .times(1)
            .returning(|_, _, _, _, _| SendOutcome::Failed {
                error: "(#10) outside of allowed window".into(),
            });

        let sink = MemoryAuditSink::default();
        let collaborators = Collaborators::new(
            repo_for_page(Platform::Instagram, "ig-1", settings),
            MockAiCompletion::new(),
            mock_sender,
            &sink,
        );

        let payload = json!({
            "object": "instagram",
            "entry": [{
                "id": "ig-1",
                "changes": [{
                    "field": "comments",
                    "value": {"id": "ig-c-1", "text": "Price?", "from": {"id": "ig-user", "username": "luis"}}
                }]
            }]
        });
        let delivery = parse_delivery(Platform::Instagram, &payload);
        collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        assert_eq!(sink.count("Comment replied successfully"), 1);
        let failed = sink
            .entries()
            .into_iter()
            .find(|e| e.message == "Comment-to-DM failed")
            .unwrap();
        assert_eq!(failed.metadata["error"], "(#10) outside of allowed window");
    }

    #[ntex::test]
    async fn test_comment_by_page_itself_is_ignored() {
        let mut mock_repo = MockAppRepo::new();
        mock_repo.expect_get_integration_token_by_page_id().never();
        let mut mock_sender = MockPlatformSender::new();
        mock_sender.expect_reply_to_comment().never();

        let sink = MemoryAuditSink::default();
        let collaborators =
            Collaborators::new(mock_repo, MockAiCompletion::new(), mock_sender, &sink);

        let payload = json!({"object": "page", "entry": [facebook_comment("page-1", "c-1", "page-1")]});
        let delivery = parse_delivery(Platform::Facebook, &payload);
        let summary = collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        assert_eq!(summary.processed, 1);
        assert_eq!(sink.messages(), vec!["Webhook received".to_string()]);
    }

    #[ntex::test]
    async fn test_photo_comment_without_author_gets_greeting() {
        let mut settings = create_test_settings(1);
        settings.ai_enabled = true;
        settings.system_prompt = Some("You sell coffee".into());

        let mut mock_ai = MockAiCompletion::new();
        mock_ai.expect_generate_reply().never();

        let mut mock_sender = MockPlatformSender::new();
        mock_sender
            .expect_reply_to_comment()
            .withf(|_, comment_id, text, _| comment_id == "c-photo" && text == "Thanks!")
            .times(1)
            .returning(|_, _, _, _| SendOutcome::Sent { id: None });

        let sink = MemoryAuditSink::default();
        let collaborators = Collaborators::new(
            repo_for_page(Platform::Facebook, "page-1", settings),
            mock_ai,
            mock_sender,
            &sink,
        );

        let payload = json!({
            "object": "page",
            "entry": [{
                "id": "page-1",
                "changes": [{
                    "field": "feed",
                    "value": {
                        "item": "comment",
                        "verb": "add",
                        "comment_id": "c-photo",
                        "photo": "https://cdn.example.com/p.jpg"
                    }
                }]
            }]
        });
        let delivery = parse_delivery(Platform::Facebook, &payload);
        let summary = collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        assert_eq!(summary.processed, 1);
        assert_eq!(sink.count("Comment replied successfully"), 1);
    }

    #[ntex::test]
    async fn test_whatsapp_message_gets_direct_reply() {
        let mut mock_sender = MockPlatformSender::new();
        mock_sender
            .expect_send_direct_message()
            .withf(|platform, page_id, recipient, text, _| {
                *platform == Platform::Whatsapp
                    && page_id == "phone-1"
                    && *recipient == Recipient::User("5215512345678".into())
                    && text == "Thanks!"
            })
            .times(1)
            .returning(|_, _, _, _, _| SendOutcome::Sent {
                id: Some("wamid.out".into()),
            });

        let sink = MemoryAuditSink::default();
        let collaborators = Collaborators::new(
            repo_for_page(Platform::Whatsapp, "phone-1", create_test_settings(1)),
            MockAiCompletion::new(),
            mock_sender,
            &sink,
        );

        let payload = json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "waba-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "metadata": {"phone_number_id": "phone-1"},
                        "messages": [{"from": "5215512345678", "id": "wamid.1", "type": "text", "text": {"body": "hola"}}],
                        "statuses": [{"id": "wamid.0", "status": "delivered"}]
                    }
                }]
            }]
        });
        let delivery = parse_delivery(Platform::Whatsapp, &payload);
        let summary = collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        assert_eq!(summary, DeliverySummary { processed: 1, total: 1 });
        assert_eq!(sink.count("Direct message sent"), 1);
    }

    #[ntex::test]
    async fn test_web_form_is_recorded_not_replied() {
        let mut mock_sender = MockPlatformSender::new();
        mock_sender.expect_send_direct_message().never();

        let sink = MemoryAuditSink::default();
        let collaborators = Collaborators::new(
            repo_for_page(Platform::Web, "contact-form", create_test_settings(1)),
            MockAiCompletion::new(),
            mock_sender,
            &sink,
        );

        let payload = json!({
            "form_id": "contact-form",
            "fields": {"name": "Ana", "email": "ana@example.com", "message": "Call me"}
        });
        let delivery = parse_delivery(Platform::Web, &payload);
        collaborators
            .dispatcher()
            .process_delivery(&delivery, "delivery-1")
            .await;

        let recorded = sink
            .entries()
            .into_iter()
            .find(|e| e.message == "Web form submission received")
            .unwrap();
        assert_eq!(recorded.tenant_id, Some(1));
        assert_eq!(recorded.metadata["sender"], "ana@example.com");
        assert_eq!(recorded.metadata["text"], "Call me");
    }
}
