//! # Graph API Client
//!
//! Sends replies through the Meta Graph API with the tenant's access token.
//! Facebook and Instagram tokens travel as the `access_token` query
//! parameter, WhatsApp Cloud API tokens as a bearer header.

use async_trait::async_trait;
use serde::Serialize;

use super::{
    Recipient, SendOutcome,
    graph_schemas::{
        CommentReplyRequest, GraphErrorResponse, GraphSendResponse, MessengerRecipient,
        MessengerSendRequest, OutgoingTextMessage,
    },
};
use crate::models::integration::Platform;

#[derive(Clone)]
pub struct GraphApiSender {
    /// HTTP client for making API requests
    pub client: reqwest::Client,
    /// e.g. `https://graph.facebook.com/v22.0`
    pub base_url: String,
}

enum Auth<'a> {
    QueryToken(&'a str),
    Bearer(&'a str),
}

/// Converts a Graph API error body into a readable message
fn error_from_body(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<GraphErrorResponse>(body) {
        Ok(err) => match err.error.code {
            Some(code) => format!("{} (code {})", err.error.message, code),
            None => err.error.message,
        },
        Err(_) => format!("Graph API returned error status {}: {}", status, body),
    }
}

impl GraphApiSender {
    async fn post<T: Serialize>(&self, path: &str, body: &T, auth: Auth<'_>) -> SendOutcome {
        let url = format!("{}/{}", self.base_url, path);
        let request = self.client.post(&url).json(body);
        let request = match auth {
            Auth::QueryToken(token) => request.query(&[("access_token", token)]),
            Auth::Bearer(token) => request.bearer_auth(token),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return SendOutcome::Failed {
                    error: format!("Failed to send request to Graph API: {e}"),
                };
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        if !status.is_success() {
            return SendOutcome::Failed {
                error: error_from_body(status, &body),
            };
        }

        let id = serde_json::from_str::<GraphSendResponse>(&body)
            .ok()
            .and_then(GraphSendResponse::sent_id);

        SendOutcome::Sent { id }
    }
}

#[async_trait]
impl crate::services::PlatformSender for GraphApiSender {
    async fn reply_to_comment(
        &self,
        platform: Platform,
        comment_id: &str,
        text: &str,
        access_token: &str,
    ) -> SendOutcome {
        let edge = match platform {
            Platform::Facebook => "comments",
            Platform::Instagram => "replies",
            Platform::Whatsapp | Platform::Web => {
                return SendOutcome::Failed {
                    error: format!("{platform} has no comments to reply to"),
                };
            }
        };

        let body = CommentReplyRequest {
            message: text.to_string(),
        };
        self.post(
            &format!("{comment_id}/{edge}"),
            &body,
            Auth::QueryToken(access_token),
        )
        .await
    }

    async fn send_direct_message(
        &self,
        platform: Platform,
        page_id: &str,
        recipient: &Recipient,
        text: &str,
        access_token: &str,
    ) -> SendOutcome {
        match (platform, recipient) {
            (Platform::Facebook | Platform::Instagram, recipient) => {
                let recipient = match recipient {
                    Recipient::User(id) => MessengerRecipient {
                        id: Some(id.clone()),
                        comment_id: None,
                    },
                    Recipient::Comment(comment_id) => MessengerRecipient {
                        id: None,
                        comment_id: Some(comment_id.clone()),
                    },
                };
                let body = MessengerSendRequest::response(recipient, text.to_string());
                self.post(
                    &format!("{page_id}/messages"),
                    &body,
                    Auth::QueryToken(access_token),
                )
                .await
            }
            (Platform::Whatsapp, Recipient::User(phone)) => {
                let body = OutgoingTextMessage::new(phone.clone(), text.to_string());
                self.post(
                    &format!("{page_id}/messages"),
                    &body,
                    Auth::Bearer(access_token),
                )
                .await
            }
            (Platform::Whatsapp, Recipient::Comment(_)) => SendOutcome::Failed {
                error: "whatsapp has no comments to reply privately to".to_string(),
            },
            (Platform::Web, _) => SendOutcome::Failed {
                error: "web forms have no reply channel".to_string(),
            },
        }
    }
}
