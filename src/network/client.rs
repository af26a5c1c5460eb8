use crate::engine::inference::TextCompleter;
use crate::network::errors::InferenceError;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

// * Connection setup ceiling; the per-request ceiling is applied by SelectorInference
const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

// * Text-completion client for a local Ollama server.
pub struct OllamaClient {
    inner: Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    // * @param endpoint - Base URL of the server (e.g., "http://localhost:11434")
    // * @param model - Model name passed to /api/generate
    pub fn new(endpoint: &str, model: &str) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            inner: client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    // * Checks the server is reachable and returns its version string.
    pub async fn probe(&self) -> Result<String, InferenceError> {
        let resp = self
            .inner
            .get(format!("{}/api/version", self.endpoint))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(InferenceError::Status(resp.status().as_u16()));
        }

        let body: VersionResponse = resp.json().await?;
        Ok(body.version)
    }

    // * Sends one non-streaming generation request and returns the raw model text.
    pub async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
        let payload = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
            "options": { "temperature": 0 },
        });

        let resp = self
            .inner
            .post(format!("{}/api/generate", self.endpoint))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(InferenceError::Status(status.as_u16()));
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| InferenceError::Parse(e.to_string()))?;

        Ok(body.response)
    }
}

impl TextCompleter for OllamaClient {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, InferenceError>> {
        Box::pin(self.generate(prompt))
    }
}
