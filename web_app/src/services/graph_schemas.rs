//! # Graph API Outgoing Schemas
//!
//! Request and response bodies for the Meta Graph API calls used to answer
//! comments and messages on Facebook, Instagram and WhatsApp.

use serde::{Deserialize, Serialize};

/// Public answer to a Facebook or Instagram comment
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentReplyRequest {
    pub message: String,
}

/// Send API body for Messenger and Instagram direct messages
#[derive(Debug, Serialize, Deserialize)]
pub struct MessengerSendRequest {
    pub recipient: MessengerRecipient,
    pub message: MessengerText,
    /// "RESPONSE" for answers inside the 24h messaging window
    pub messaging_type: String,
}

impl MessengerSendRequest {
    pub fn response(recipient: MessengerRecipient, text: String) -> Self {
        Self {
            recipient,
            message: MessengerText { text },
            messaging_type: "RESPONSE".to_string(),
        }
    }
}

/// Either a user id or, for private replies, the comment being answered
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MessengerRecipient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessengerText {
    pub text: String,
}

/// Text message to send to WhatsApp
#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingTextMessage {
    /// Messaging product, always "whatsapp"
    pub messaging_product: String,
    /// Recipient's WhatsApp ID (phone number)
    pub to: String,
    /// Message type
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Text content
    pub text: OutgoingTextContent,
}

impl OutgoingTextMessage {
    /// Creates a new text message
    pub fn new(to: String, body: String) -> Self {
        Self {
            messaging_product: "whatsapp".to_string(),
            to,
            msg_type: "text".to_string(),
            text: OutgoingTextContent { body },
        }
    }
}

/// Text content for outgoing messages
#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingTextContent {
    /// Message body text
    pub body: String,
}

/// Union of the success bodies returned by the calls above.
///
/// Comment replies answer `{"id"}`, the Send API `{"recipient_id","message_id"}`
/// and WhatsApp `{"messages":[{"id"}]}`.
#[derive(Debug, Default, Deserialize)]
pub struct GraphSendResponse {
    pub id: Option<String>,
    pub message_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<GraphMessageId>,
}

impl GraphSendResponse {
    pub fn sent_id(self) -> Option<String> {
        self.id
            .or(self.message_id)
            .or_else(|| self.messages.into_iter().next().map(|m| m.id))
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphMessageId {
    pub id: String,
}

/// Error envelope returned by the Graph API
#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphError,
}

#[derive(Debug, Deserialize)]
pub struct GraphError {
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}
