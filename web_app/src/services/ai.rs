use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// OpenAI compatible chat completion client
#[derive(Clone)]
pub struct OpenAiCompletion {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Used when no AI key is configured, every call fails so replies fall back to greetings
#[derive(Clone, Default)]
pub struct DisabledAiCompletion;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

const MAX_REPLY_TOKENS: u32 = 300;

/// System message sent to the model: the tenant prompt plus the business it speaks for
fn build_system_message(system_prompt: &str, business_name: &str) -> String {
    if business_name.trim().is_empty() {
        return system_prompt.to_string();
    }

    format!(
        "{system_prompt}\n\nYou are replying on behalf of {business_name}. \
         Keep the answer short and suitable for a social media reply."
    )
}

fn first_choice_text(response: ChatResponse) -> anyhow::Result<String> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        bail!("ai completion returned an empty reply");
    }
    Ok(text)
}

#[async_trait]
impl crate::services::AiCompletion for OpenAiCompletion {
    async fn generate_reply(
        &self,
        system_prompt: &str,
        user_text: &str,
        business_name: &str,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: build_system_message(system_prompt, business_name),
                },
                ChatMessage {
                    role: "user",
                    content: user_text.to_string(),
                },
            ],
            max_tokens: MAX_REPLY_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to AI completion API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());

            bail!("AI completion API returned error status {}: {}", status, body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse AI completion response")?;

        first_choice_text(chat_response)
    }
}

#[async_trait]
impl crate::services::AiCompletion for DisabledAiCompletion {
    async fn generate_reply(&self, _: &str, _: &str, _: &str) -> anyhow::Result<String> {
        bail!("AI completion is not configured")
    }
}
