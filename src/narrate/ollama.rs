//! Narration over an Ollama-compatible HTTP API.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;

use super::{clean_narration, compose_prompt, Narrator};

#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Base URL, e.g. `http://localhost:11434`.
    pub url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            timeout: Duration::from_secs(10),
            temperature: 0.3,
            top_p: 0.9,
            max_tokens: 100,
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct OllamaNarrator {
    config: OllamaConfig,
    agent: ureq::Agent,
}

impl OllamaNarrator {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let url = config.url.trim_end_matches('/').to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!("narrator url must be http(s): {}", config.url));
        }
        if config.model.trim().is_empty() {
            return Err(anyhow!("narrator model must not be empty"));
        }
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            config: OllamaConfig { url, ..config },
            agent,
        })
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "top_p": self.config.top_p,
                "num_predict": self.config.max_tokens,
            },
        });
        let endpoint = format!("{}/api/generate", self.config.url);
        let response = self
            .agent
            .post(&endpoint)
            .send_json(payload)
            .with_context(|| format!("post narration request to {}", endpoint))?;
        let body: GenerateResponse = response
            .into_json()
            .context("parse narration response")?;
        Ok(body.response)
    }
}

impl Narrator for OllamaNarrator {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn narrate(&mut self, caption: &str, movements: &[String]) -> Option<String> {
        let prompt = compose_prompt(caption, movements);
        match self.generate(&prompt) {
            Ok(raw) => {
                let cleaned = clean_narration(&raw);
                if cleaned.is_empty() {
                    log::warn!("narrator returned an empty response");
                    None
                } else {
                    Some(cleaned)
                }
            }
            Err(e) => {
                log::error!("narration failed: {:#}", e);
                None
            }
        }
    }

    fn check_connection(&self) -> bool {
        self.agent
            .get(&format!("{}/api/tags", self.config.url))
            .timeout(Duration::from_secs(2))
            .call()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_urls() {
        let config = OllamaConfig {
            url: "localhost:11434".to_string(),
            ..OllamaConfig::default()
        };
        assert!(OllamaNarrator::new(config).is_err());
    }

    #[test]
    fn unreachable_service_yields_none() -> Result<()> {
        let mut narrator = OllamaNarrator::new(OllamaConfig {
            url: "http://127.0.0.1:9/".to_string(),
            timeout: Duration::from_millis(200),
            ..OllamaConfig::default()
        })?;
        assert!(!narrator.check_connection());
        assert!(narrator.narrate("a street", &[]).is_none());
        Ok(())
    }
}
