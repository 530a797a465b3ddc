/// Sent when neither the AI nor the tenant greeting can provide a reply
pub const DEFAULT_REPLY: &str =
    "Thanks for reaching out! We received your message and will get back to you soon.";

/// Only mode accepted by the subscription handshake
pub const HUB_MODE_SUBSCRIBE: &str = "subscribe";
