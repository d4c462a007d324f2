//! Metadata generator backed by a chat-completions endpoint.
//!
//! The model is asked for `Title:`, `Description:` and `Tags:` lines; the reply
//! is parsed by [`parse_labelled_response`] and validated by the core, which
//! substitutes defaults for anything missing.

use async_trait::async_trait;
use clip_publisher_core::contract::{GeneratedMetadata, GenerationError, MetadataGenerator};
use clip_publisher_core::metadata::{base_name, parse_labelled_response};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::load_config::MetadataSection;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

pub struct OpenAiGenerator {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    link_url: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(http: Client, section: &MetadataSection, api_key: String) -> Self {
        let endpoint = format!("{}/v1/chat/completions", section.base_url.trim_end_matches('/'));
        info!(model = %section.model, endpoint = %endpoint, "Initialized OpenAiGenerator");
        Self {
            http,
            endpoint,
            api_key,
            model: section.model.clone(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
            link_url: section.link_url.clone(),
        }
    }
}

/// Prompt for a clip whose file is named `clip_name`.
pub fn build_prompt(clip_name: &str, link_url: Option<&str>) -> String {
    let mut prompt = format!(
        "Imagine you are a popular creator known for an energetic and authentic style. \
         You just recorded a short vertical video called '{clip_name}'. \
         Please write the following in a natural, conversational tone:\n\n\
         1. A short, catchy title that grabs attention (no extra quotes).\n\
         2. A friendly description of 2-4 lines that says what happens in the clip and why it is special"
    );
    match link_url {
        Some(link) => prompt.push_str(&format!(", and includes the link {link}.\n")),
        None => prompt.push_str(".\n"),
    }
    prompt.push_str(
        "3. Five relevant tags, separated by commas.\n\n\
         Answer with exactly three lines starting with 'Title:', 'Description:' and 'Tags:'."
    );
    prompt
}

#[async_trait]
impl MetadataGenerator for OpenAiGenerator {
    async fn generate(&self, item_id: &str) -> Result<GeneratedMetadata, GenerationError> {
        let prompt = build_prompt(&base_name(item_id), self.link_url.as_deref());
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, item_id = %item_id, "[GENERATE] Chat request failed");
                GenerationError::Request(e.to_string())
            })?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!(
                status = %status,
                item_id = %item_id,
                "[GENERATE] Chat endpoint returned error. Response body: {text}"
            );
            return Err(GenerationError::Request(format!("{status}: {text}")));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let content = first_content(parsed)
            .ok_or_else(|| {
                GenerationError::Malformed("response has no message content".to_string())
            })?;
        debug!(item_id = %item_id, content = %content, "[GENERATE] Raw reply");

        let generated = parse_labelled_response(&content);
        if generated == GeneratedMetadata::default() {
            return Err(GenerationError::Malformed(
                "reply contains no Title/Description/Tags lines".to_string(),
            ));
        }
        Ok(generated)
    }
}

fn first_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()?
        .message?
        .content
        .filter(|c| !c.trim().is_empty())
}
