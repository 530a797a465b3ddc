//! # Inbound Event Parser
//!
//! Turns an untrusted webhook body into canonical events. Every field is
//! read defensively: a malformed entry becomes [`InboundEvent::Unknown`]
//! instead of failing the delivery.
//!
//! Supported shapes:
//! - Facebook `feed` changes and Instagram `comments` changes (comments)
//! - Messenger / Instagram `messaging` items (direct messages)
//! - WhatsApp Cloud API `messages` changes
//! - Signed website forms

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::integration::Platform;

#[derive(Debug, Clone, PartialEq)]
pub struct CommentEvent {
    pub platform: Platform,
    /// Page or Instagram account receiving the comment
    pub page_id: String,
    pub comment_id: String,
    /// Post or media commented on
    pub post_id: Option<String>,
    /// Left out by Meta when the app lacks the permission to see the author
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    /// Absent for photo and sticker comments
    pub text: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub platform: Platform,
    /// Page, Instagram account, WhatsApp phone number id or form id
    pub page_id: String,
    pub message_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    /// Absent for attachments, stickers, locations...
    pub text: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownEvent {
    pub platform: Platform,
    pub page_id: Option<String>,
    /// What was skipped, e.g. `feed:like`, `messaging:read`, `whatsapp:status`
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Comment(CommentEvent),
    Message(MessageEvent),
    Unknown(UnknownEvent),
}

impl InboundEvent {
    pub fn page_id(&self) -> Option<&str> {
        match self {
            InboundEvent::Comment(c) => Some(&c.page_id),
            InboundEvent::Message(m) => Some(&m.page_id),
            InboundEvent::Unknown(u) => u.page_id.as_deref(),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            InboundEvent::Comment(_) => "comment",
            InboundEvent::Message(_) => "message",
            InboundEvent::Unknown(u) => &u.kind,
        }
    }

    /// Platform id of the comment or message, used to correlate duplicate deliveries
    pub fn external_id(&self) -> Option<&str> {
        match self {
            InboundEvent::Comment(c) => Some(&c.comment_id),
            InboundEvent::Message(m) => Some(&m.message_id),
            InboundEvent::Unknown(_) => None,
        }
    }
}

/// One `entry` item of a delivery, processed in isolation from its siblings
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEntry {
    pub page_id: Option<String>,
    pub events: Vec<InboundEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub platform: Platform,
    /// `object` field of Meta payloads ("page", "instagram", "whatsapp_business_account")
    pub object: Option<String>,
    pub entries: Vec<WebhookEntry>,
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Accepts unix seconds, unix milliseconds (as number or string) and RFC 3339
fn timestamp_field(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = value.get(key)?;
    let number = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => match s.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                return DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc));
            }
        },
        _ => None,
    }?;

    // Messenger timestamps are in milliseconds
    if number > 100_000_000_000 {
        DateTime::from_timestamp_millis(number)
    } else {
        DateTime::from_timestamp(number, 0)
    }
}

fn unknown(platform: Platform, page_id: Option<&str>, kind: impl Into<String>) -> InboundEvent {
    InboundEvent::Unknown(UnknownEvent {
        platform,
        page_id: page_id.map(str::to_string),
        kind: kind.into(),
    })
}

/// Platform announced by the `object` field of a Meta payload
pub fn platform_from_object(object: &str) -> Option<Platform> {
    match object {
        "page" => Some(Platform::Facebook),
        "instagram" => Some(Platform::Instagram),
        "whatsapp_business_account" => Some(Platform::Whatsapp),
        _ => None,
    }
}

fn parse_facebook_feed_change(page_id: Option<&str>, change_value: &Value) -> InboundEvent {
    let item = str_field(change_value, "item").unwrap_or_default();
    let verb = str_field(change_value, "verb").unwrap_or_default();
    if item != "comment" || verb != "add" {
        return unknown(Platform::Facebook, page_id, format!("feed:{item}:{verb}"));
    }

    let from = change_value.get("from").unwrap_or(&Value::Null);
    let comment_id = str_field(change_value, "comment_id");

    match (page_id, comment_id) {
        (Some(page_id), Some(comment_id)) => {
            InboundEvent::Comment(CommentEvent {
                platform: Platform::Facebook,
                page_id: page_id.to_string(),
                comment_id,
                post_id: str_field(change_value, "post_id"),
                author_id: str_field(from, "id"),
                author_name: str_field(from, "name"),
                text: non_blank(str_field(change_value, "message")),
                created_time: timestamp_field(change_value, "created_time"),
            })
        }
        _ => unknown(Platform::Facebook, page_id, "feed:comment:incomplete"),
    }
}

fn parse_instagram_comment_change(
    page_id: Option<&str>,
    change_value: &Value,
    entry_time: Option<DateTime<Utc>>,
) -> InboundEvent {
    let from = change_value.get("from").unwrap_or(&Value::Null);
    let comment_id = str_field(change_value, "id");

    match (page_id, comment_id) {
        (Some(page_id), Some(comment_id)) => {
            InboundEvent::Comment(CommentEvent {
                platform: Platform::Instagram,
                page_id: page_id.to_string(),
                comment_id,
                post_id: change_value
                    .get("media")
                    .and_then(|media| str_field(media, "id")),
                author_id: str_field(from, "id"),
                author_name: str_field(from, "username"),
                text: non_blank(str_field(change_value, "text")),
                created_time: entry_time,
            })
        }
        _ => unknown(Platform::Instagram, page_id, "comments:incomplete"),
    }
}

fn parse_messaging_item(platform: Platform, page_id: Option<&str>, item: &Value) -> InboundEvent {
    let Some(message) = item.get("message") else {
        let kind = ["reaction", "read", "delivery", "postback", "referral"]
            .into_iter()
            .find(|key| item.get(*key).is_some())
            .unwrap_or("other");
        return unknown(platform, page_id, format!("messaging:{kind}"));
    };

    if message
        .get("is_echo")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return unknown(platform, page_id, "messaging:echo");
    }

    let sender_id = item.get("sender").and_then(|s| str_field(s, "id"));
    let message_id = str_field(message, "mid");
    // the page id is the recipient of the message, fall back to the entry id
    let page_id = item
        .get("recipient")
        .and_then(|r| str_field(r, "id"))
        .or_else(|| page_id.map(str::to_string));

    match (page_id, sender_id, message_id) {
        (Some(page_id), Some(sender_id), Some(message_id)) => {
            InboundEvent::Message(MessageEvent {
                platform,
                page_id,
                message_id,
                sender_id,
                sender_name: None,
                text: non_blank(str_field(message, "text")),
                created_time: timestamp_field(item, "timestamp"),
            })
        }
        (page_id, _, _) => unknown(platform, page_id.as_deref(), "messaging:incomplete"),
    }
}

fn parse_whatsapp_change(change_value: &Value) -> Vec<InboundEvent> {
    let phone_number_id = change_value
        .get("metadata")
        .and_then(|m| str_field(m, "phone_number_id"));
    let contacts = array(change_value, "contacts");

    let mut events = Vec::new();
    for message in array(change_value, "messages") {
        let from = str_field(message, "from");
        let message_id = str_field(message, "id");
        let msg_type = str_field(message, "type").unwrap_or_default();

        let (Some(page_id), Some(sender_id), Some(message_id)) =
            (phone_number_id.clone(), from, message_id)
        else {
            events.push(unknown(
                Platform::Whatsapp,
                phone_number_id.as_deref(),
                "whatsapp:incomplete",
            ));
            continue;
        };

        let text = match msg_type.as_str() {
            "text" => message.get("text").and_then(|t| str_field(t, "body")),
            "button" => message.get("button").and_then(|b| str_field(b, "text")),
            _ => None,
        };
        let sender_name = contacts
            .iter()
            .find(|c| str_field(c, "wa_id").as_deref() == Some(sender_id.as_str()))
            .and_then(|c| c.get("profile"))
            .and_then(|p| str_field(p, "name"));

        events.push(InboundEvent::Message(MessageEvent {
            platform: Platform::Whatsapp,
            page_id,
            message_id,
            sender_id,
            sender_name,
            text: non_blank(text),
            created_time: timestamp_field(message, "timestamp"),
        }));
    }

    for _ in array(change_value, "statuses") {
        events.push(unknown(
            Platform::Whatsapp,
            phone_number_id.as_deref(),
            "whatsapp:status",
        ));
    }

    events
}

fn parse_meta_entry(platform: Platform, entry: &Value) -> WebhookEntry {
    let page_id = str_field(entry, "id");
    let entry_time = timestamp_field(entry, "time");
    let mut events = Vec::new();

    for change in array(entry, "changes") {
        let field = str_field(change, "field").unwrap_or_default();
        let change_value = change.get("value").unwrap_or(&Value::Null);

        match (platform, field.as_str()) {
            (Platform::Facebook, "feed") => {
                events.push(parse_facebook_feed_change(page_id.as_deref(), change_value))
            }
            (Platform::Instagram, "comments") => events.push(parse_instagram_comment_change(
                page_id.as_deref(),
                change_value,
                entry_time,
            )),
            (Platform::Whatsapp, "messages") => events.extend(parse_whatsapp_change(change_value)),
            _ => events.push(unknown(platform, page_id.as_deref(), format!("change:{field}"))),
        }
    }

    for item in array(entry, "messaging") {
        events.push(parse_messaging_item(platform, page_id.as_deref(), item));
    }

    WebhookEntry { page_id, events }
}

fn parse_web_form(payload: &Value) -> Vec<WebhookEntry> {
    let Some(form_id) = str_field(payload, "form_id") else {
        return Vec::new();
    };
    let fields = payload.get("fields").unwrap_or(&Value::Null);
    let sender_id = str_field(fields, "email")
        .or_else(|| str_field(fields, "phone"))
        .unwrap_or_else(|| "anonymous".to_string());
    let message_id = str_field(payload, "submission_id")
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    vec![WebhookEntry {
        page_id: Some(form_id.clone()),
        events: vec![InboundEvent::Message(MessageEvent {
            platform: Platform::Web,
            page_id: form_id,
            message_id,
            sender_id,
            sender_name: str_field(fields, "name"),
            text: non_blank(str_field(fields, "message")),
            created_time: timestamp_field(payload, "submitted_at"),
        })],
    }]
}

/// Parses a whole delivery. Payloads without an `entry` array yield no entries.
pub fn parse_delivery(platform: Platform, payload: &Value) -> Delivery {
    let object = str_field(payload, "object");
    let entries = match platform {
        Platform::Web => parse_web_form(payload),
        _ => array(payload, "entry")
            .iter()
            .map(|entry| parse_meta_entry(platform, entry))
            .collect(),
    };

    Delivery {
        platform,
        object,
        entries,
    }
}

/// First comment found in a Meta payload, platform taken from its `object` field
pub fn detect_comment_event(payload: &Value) -> Option<CommentEvent> {
    let platform = str_field(payload, "object")
        .as_deref()
        .and_then(platform_from_object)?;

    parse_delivery(platform, payload)
        .entries
        .into_iter()
        .flat_map(|entry| entry.events)
        .find_map(|event| match event {
            InboundEvent::Comment(comment) => Some(comment),
            _ => None,
        })
}
