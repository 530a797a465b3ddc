use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("social_reply_statds")
        .with_description("Webhook deliveries and replies")
        .with_unit("attempt")
        .build()
});

fn incr_statds(metric: &'static str, value: String) {
    STATDS.add(1, &[KeyValue::new(metric, value)]);
}

/// `outcome` is one of `received`, `rejected`, `malformed`
pub fn incr_webhook_statds(platform: &str, outcome: &str) {
    incr_statds("webhook", format!("{platform}:{outcome}"))
}

/// `kind` is `comment_reply`, `comment_to_dm` or `direct_message`,
/// suffixed with `_sent` or `_failed`
pub fn incr_reply_statds(kind: &str) {
    incr_statds("reply", kind.into())
}
