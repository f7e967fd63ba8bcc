use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{config::CopywriterConfig, database::models::company};

const MAX_BLURB_CHARS: usize = 280;

#[derive(Debug, Error)]
pub enum CopywriterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("response contained no usable text")]
    EmptyResponse,
}

/// Writes the short promotional text shown next to a spotlighted company.
#[derive(Debug, Clone)]
pub enum Copywriter {
    Template,
    OpenAi(OpenAiCopywriter),
}

#[derive(Debug, Clone)]
pub struct OpenAiCopywriter {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Copywriter {
    pub fn from_config(config: &CopywriterConfig) -> Result<Self, CopywriterError> {
        match config {
            CopywriterConfig::Template => Ok(Self::Template),
            CopywriterConfig::OpenAi {
                api_key,
                model,
                base_url,
                timeout_seconds,
            } => {
                let http_client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(*timeout_seconds))
                    .build()?;

                Ok(Self::OpenAi(OpenAiCopywriter {
                    http_client,
                    api_key: api_key.clone(),
                    model: model.clone(),
                    base_url: base_url.trim_end_matches('/').to_string(),
                }))
            }
        }
    }

    pub async fn blurb(&self, company: &company::Model) -> Result<String, CopywriterError> {
        match self {
            Self::Template => Ok(template_blurb(company)),
            Self::OpenAi(client) => client.blurb(company).await,
        }
    }
}

/// Deterministic blurb used when no AI service is configured or it fails.
pub fn template_blurb(company: &company::Model) -> String {
    let mut blurb = company.name.clone();

    if company.is_verified {
        blurb.push_str(", a verified");
    } else {
        blurb.push_str(", a trusted");
    }

    match &company.industry {
        Some(industry) => blurb.push_str(&format!(" {industry} business")),
        None => blurb.push_str(" business"),
    }

    if let Some(country) = &company.country {
        blurb.push_str(&format!(" from {country}"));
    }

    blurb.push_str(&format!(", rated {:.1}/5 by marketplace buyers.", company.rating));
    blurb
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
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

impl OpenAiCopywriter {
    fn prompt(company: &company::Model) -> String {
        format!(
            "Write one upbeat sentence (max 40 words) introducing the company below to buyers \
             on a B2B marketplace connecting Africa and Asia. Do not invent facts.\n\
             Name: {}\nIndustry: {}\nCountry: {}\nVerified: {}\nRating: {:.1}/5",
            company.name,
            company.industry.as_deref().unwrap_or("unknown"),
            company.country.as_deref().unwrap_or("unknown"),
            if company.is_verified { "yes" } else { "no" },
            company.rating,
        )
    }

    async fn blurb(&self, company: &company::Model) -> Result<String, CopywriterError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You write concise marketplace copy.".to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::prompt(company),
                },
            ],
            max_tokens: 120,
            temperature: 0.7,
        };

        trace!(url = %url, model = %self.model, company = %company.name, "Requesting blurb");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CopywriterError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        debug!(company = %company.name, "Received blurb");
        extract_blurb(body)
    }
}

fn extract_blurb(response: ChatResponse) -> Result<String, CopywriterError> {
    let text = response
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .map(|content| content.trim().trim_matches('"').trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(CopywriterError::EmptyResponse)?;

    Ok(truncate(&text, MAX_BLURB_CHARS))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut truncated: String = text.chars().take(max_chars - 1).collect();
    truncated.push('…');
    truncated
}
