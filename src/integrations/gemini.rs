//! Google Gemini API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LanguageModel;
use crate::{Error, Result};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("corporate_rag/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::LlmError(format!("HTTP client error: {}", e)))
}

/// Google Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    /// Create a client with API key and model.
    pub fn new<S: Into<String>>(api_key: S, model: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("GOOGLE_API_KEY is empty".to_string()));
        }

        Ok(Self {
            http: http_client(HTTP_TIMEOUT)?,
            api_key,
            base_url: GEMINI_API_URL.to_string(),
            model: model.to_string(),
            temperature: 0.2,
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Replace the HTTP timeout applied to each request.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = http_client(timeout)?;
        Ok(self)
    }

    /// Point the client at another endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Send a single user message and return the first text part.
    pub async fn generate(&self, message: &str) -> Result<String> {
        let payload = GeminiRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: message.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: 4096,
            }),
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        debug!(model = %self.model, "Sending Gemini request");
        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::LlmError(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::LlmError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::LlmError(format!("Gemini error {}: {}", status, text)));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| Error::LlmError(format!("Invalid Gemini response: {} - {}", e, text)))?;

        gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::LlmError("Empty response from Gemini".to_string()))
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// === Request ===

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

// === Response ===

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test_key", "gemini-2.5-flash")
            .unwrap()
            .with_base_url(&server.base_url())
    }

    #[test]
    fn new_rejects_empty_key() {
        let err = GeminiClient::new("   ", "gemini-2.5-flash").unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn builder_methods_override_defaults() {
        let client = GeminiClient::new("test_key", "gemini-2.5-flash")
            .unwrap()
            .with_model("gemini-2.5-pro")
            .with_temperature(0.5)
            .with_base_url("http://proxy/");
        assert_eq!(client.model, "gemini-2.5-pro");
        assert_eq!(client.temperature, 0.5);
        assert_eq!(client.base_url, "http://proxy");
    }

    #[tokio::test]
    async fn complete_returns_first_text_part() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.5-flash:generateContent")
                .query_param("key", "test_key")
                .matches(|req| {
                    let body: serde_json::Value =
                        serde_json::from_slice(req.body().as_ref()).unwrap();
                    body["generationConfig"]["temperature"]
                        .as_f64()
                        .is_some_and(|t| (t - 0.2).abs() < 1e-6)
                        && body["contents"][0]["parts"][0]["text"] == "Who is the CEO?"
                });
            then.status(200).json_body(json!({
                "candidates": [
                    { "content": { "role": "model", "parts": [{ "text": "Tim Cook" }] } }
                ]
            }));
        });

        let answer = client(&server).complete("Who is the CEO?").await.unwrap();

        assert_eq!(answer, "Tim Cook");
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn http_failure_is_an_llm_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/models/gemini-2.5-flash:generateContent");
            then.status(500).body("quota exceeded");
        });

        let err = client(&server).complete("hi").await.unwrap_err();

        assert!(matches!(err, Error::LlmError(_)));
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn slow_server_hits_the_http_timeout() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/models/gemini-2.5-flash:generateContent");
            then.status(200)
                .delay(Duration::from_secs(5))
                .json_body(json!({ "candidates": [] }));
        });

        let err = client(&server)
            .with_timeout(Duration::from_millis(100))
            .unwrap()
            .complete("hi")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::LlmError(_)));
        assert!(err.to_string().contains("Gemini request failed"));
    }

    #[tokio::test]
    async fn empty_candidates_are_rejected() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/models/gemini-2.5-flash:generateContent");
            then.status(200).json_body(json!({ "candidates": [] }));
        });

        let err = client(&server).complete("hi").await.unwrap_err();
        assert!(err.to_string().contains("Empty response"));
    }
}
