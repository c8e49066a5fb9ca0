//! Ollama `/api/generate` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::prompt::render_prompt;
use super::{CodeGenerator, GenerationRequest};
use crate::config::GeneratorConfig;
use crate::error::{PatchloopError, Result};

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One NDJSON line of a streamed generate response.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Generator backed by a local Ollama server.
pub struct OllamaGenerator {
    config: GeneratorConfig,
    http_client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("patchloop/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PatchloopError::Generator(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

#[async_trait]
impl CodeGenerator for OllamaGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let prompt = render_prompt(request);
        let body = GenerateBody {
            model: &self.config.model,
            prompt: &prompt,
            stream: true,
        };

        info!(
            endpoint = %self.config.endpoint,
            model = %self.config.model,
            prompt_bytes = prompt.len(),
            "requesting generation"
        );
        let response = self
            .http_client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| PatchloopError::Generator(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PatchloopError::Generator(format!("reading response failed: {e}")))?;
        if !status.is_success() {
            return Err(PatchloopError::Generator(format!(
                "server returned {status}: {}",
                text.trim()
            )));
        }

        let code = collect_stream(&text)?;
        debug!(bytes = code.len(), "generation complete");
        Ok(code)
    }
}

/// Concatenate the `response` fields of an NDJSON stream.
pub(crate) fn collect_stream(body: &str) -> Result<String> {
    let mut out = String::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let chunk: StreamChunk = serde_json::from_str(line)
            .map_err(|e| PatchloopError::Generator(format!("malformed stream line: {e}")))?;
        if let Some(error) = chunk.error {
            return Err(PatchloopError::Generator(error));
        }
        out.push_str(&chunk.response);
        if chunk.done {
            break;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_stream_concatenates() {
        let body = concat!(
            "{\"model\":\"m\",\"response\":\"print(\",\"done\":false}\n",
            "\n",
            "{\"model\":\"m\",\"response\":\"1)\",\"done\":false}\n",
            "{\"model\":\"m\",\"response\":\"\",\"done\":true,\"total_duration\":5}\n",
        );
        assert_eq!(collect_stream(body).unwrap(), "print(1)");
    }

    #[test]
    fn test_collect_stream_surfaces_server_error() {
        let err = collect_stream("{\"error\":\"model 'x' not found\"}\n").unwrap_err();
        assert!(err.to_string().contains("model 'x' not found"));
    }

    #[test]
    fn test_collect_stream_rejects_garbage() {
        assert!(collect_stream("not json\n").is_err());
    }

    #[test]
    fn test_new_client_builds() {
        let gen = OllamaGenerator::new(GeneratorConfig::default()).unwrap();
        assert_eq!(gen.config().model, "deepseek-coder");
    }
}
