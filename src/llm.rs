use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to language model timed out")]
    Timeout,
    #[error("failed to reach language model backend")]
    Connection(#[source] reqwest::Error),
    #[error("language model backend returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// Boundary to the text-generation backend. The only implementation talks
/// to an Ollama-style endpoint; tests substitute a scripted mock.
pub trait LanguageModel {
    fn ask(
        &self,
        prompt: &str,
        system_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError>;
}

pub struct OllamaClient {
    client: reqwest::blocking::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    raw: bool,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|error| anyhow::anyhow!("failed to build http client: {error}"))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Wraps the prompt in the chat-turn delimiters the backend's template
    /// expects. Callers pass plain text only.
    fn render_prompt(&self, prompt: &str, system_prompt: &str) -> String {
        let format = &self.config.prompt_format;
        if format.is_plain() {
            return prompt.to_string();
        }

        let mut rendered = String::new();
        if !system_prompt.is_empty() {
            rendered.push_str(&format.system_prefix);
            rendered.push_str(system_prompt);
            rendered.push_str(&format.system_suffix);
        }
        rendered.push_str(&format.user_prefix);
        rendered.push_str(prompt);
        rendered.push_str(&format.user_suffix);
        rendered.push_str(&format.assistant_prefix);
        rendered
    }
}

impl LanguageModel for OllamaClient {
    fn ask(
        &self,
        prompt: &str,
        system_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let raw = !self.config.prompt_format.is_plain();
        let rendered = self.render_prompt(prompt, system_prompt);

        let body = GenerateRequest {
            model: &self.config.model,
            prompt: &rendered,
            raw,
            stream: false,
            options: GenerateOptions {
                temperature,
                num_predict: max_tokens,
            },
        };

        debug!(model = %self.config.model, prompt_chars = rendered.len(), "sending generation request");

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.base_url))
            .json(&body)
            .send()
            .map_err(|error| {
                if error.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Connection(error)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: GenerateResponse = response.json().map_err(|error| {
            if error.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Connection(error)
            }
        })?;

        Ok(parsed.response.trim().to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptFormat;

    fn client_with_format(format: PromptFormat) -> OllamaClient {
        let config = LlmConfig {
            prompt_format: format,
            ..LlmConfig::default()
        };
        OllamaClient::new(&config).unwrap()
    }

    #[test]
    fn render_prompt_wraps_system_and_user_turns() {
        let client = client_with_format(PromptFormat::default());
        let rendered = client.render_prompt("list the items", "you are terse");

        assert!(rendered.starts_with("<|im_start|>system\nyou are terse<|im_end|>\n"));
        assert!(rendered.contains("<|im_start|>user\nlist the items<|im_end|>\n"));
        assert!(rendered.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn render_prompt_skips_empty_system_turn() {
        let client = client_with_format(PromptFormat::default());
        let rendered = client.render_prompt("hello", "");
        assert!(rendered.starts_with("<|im_start|>user\n"));
    }

    #[test]
    fn render_prompt_passes_through_when_plain() {
        let plain = PromptFormat {
            system_prefix: String::new(),
            system_suffix: String::new(),
            user_prefix: String::new(),
            user_suffix: String::new(),
            assistant_prefix: String::new(),
        };
        let client = client_with_format(plain);
        assert_eq!(client.render_prompt("hello", "sys"), "hello");
    }
}
