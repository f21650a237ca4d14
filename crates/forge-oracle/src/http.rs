use async_trait::async_trait;
use forge_config::OracleConfig;
use forge_core::{ForgeError, Result};
use tracing::{debug, info};

use crate::provider::Oracle;

/// OpenAI-compatible chat-completions backend (works with OpenAI, Azure,
/// Together, vLLM, etc.)
pub struct HttpOracle {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl HttpOracle {
    /// Build from config. The API key is read from the environment variable
    /// named in the config — it never lives in the config file itself.
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ForgeError::Config(format!(
                "oracle API key not set (expected in ${})",
                config.api_key_env
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ForgeError::OracleUnavailable(e.to_string()))?;
        info!(base_url = %config.base_url, model = %config.model, "oracle backend configured");
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": user}));

        let body = serde_json::json!({
            "model": &self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::OracleUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ForgeError::OracleUnavailable(format!(
                "HTTP {status}: {text}"
            )));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ForgeError::OracleUnavailable(e.to_string()))?;

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        debug!(chars = content.len(), "oracle reply received");
        Ok(content)
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    fn name(&self) -> &str {
        "openai"
    }

    async fn interpret(&self, context: &str, input: &str) -> Result<String> {
        self.complete(Some(context), input).await
    }

    async fn draft(&self, prompt: &str) -> Result<String> {
        self.complete(None, prompt).await
    }

    async fn health_check(&self) -> Result<()> {
        let resp = self
            .client
            .get(format!("{}/models", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ForgeError::OracleUnavailable(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ForgeError::OracleUnavailable(format!(
                "health check returned HTTP {}",
                resp.status()
            )))
        }
    }
}
