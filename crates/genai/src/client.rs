use std::time::Duration;

use async_trait::async_trait;
use coverbot_core::config::GenaiConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("text-generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("text-generation service returned status {0}")]
    Status(u16),
    #[error("text-generation response was malformed: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// `generateContent` client. One request per call; retries are the caller's
/// concern and the phrasing adapter deliberately makes none.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn new(config: &GenaiConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request =
            GenerateRequest { contents: vec![Content { parts: vec![Part { text: prompt }] }] };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| LlmError::MalformedResponse("no candidate text".to_owned()))?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(LlmError::MalformedResponse("empty candidate text".to_owned()));
        }
        Ok(trimmed.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use coverbot_core::config::GenaiConfig;

    use super::GeminiClient;

    fn config() -> GenaiConfig {
        GenaiConfig {
            api_key: String::from("test-key").into(),
            model: "gemini-1.5-flash".to_owned(),
            base_url: "https://generativelanguage.googleapis.com/".to_owned(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn endpoint_joins_base_url_and_model_without_double_slashes() {
        let client = GeminiClient::new(&config()).expect("client");
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn response_parsing_takes_the_first_candidate_part() {
        let body: super::GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":" hello "},{"text":"ignored"}]}}]}"#,
        )
        .expect("valid body");

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .expect("candidate text");
        assert_eq!(text, " hello ");
    }

    #[test]
    fn response_without_candidates_deserializes_to_empty() {
        let body: super::GenerateResponse = serde_json::from_str("{}").expect("valid body");
        assert!(body.candidates.is_empty());
    }
}
