use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::difficulty::DifficultyProfile;
use crate::oracle::{advice_prompt, move_prompt, Oracle, OracleError};

const MOVE_TOP_P: f32 = 0.9;
const ADVICE_TEMPERATURE: f32 = 0.9;

/// Google Gemini `generateContent` client.
pub struct GeminiOracle {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiOracle {
    pub fn new(config: &Config, api_key: String) -> Result<Self, OracleError> {
        let client = Client::builder()
            .user_agent("GrandmasterKids/1.0")
            .timeout(config.oracle_timeout)
            .build()
            .map_err(|e| OracleError::Http(format!("Client build error: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model: config.gemini_model.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn generate(&self, prompt: &str, generation_config: Value) -> Result<String, OracleError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), model = %self.model, "Gemini request failed");
            return Err(OracleError::Status(resp.status().as_u16()));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("JSON parse error: {e}")))?;

        let text = candidate_text(&data)?;
        debug!(len = text.len(), "Gemini reply");
        Ok(text)
    }
}

/// Concatenated text parts of the first candidate.
fn candidate_text(data: &Value) -> Result<String, OracleError> {
    let parts = data["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| OracleError::Malformed("no candidate parts".into()))?;
    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .concat()
        .trim()
        .to_string())
}

#[async_trait]
impl Oracle for GeminiOracle {
    async fn request_move(
        &self,
        fen: &str,
        profile: &DifficultyProfile,
    ) -> Result<String, OracleError> {
        self.generate(
            &move_prompt(fen, profile),
            json!({ "temperature": profile.temperature, "topP": MOVE_TOP_P }),
        )
        .await
    }

    async fn request_advice(&self, fen: &str, last_move: &str) -> Result<String, OracleError> {
        self.generate(
            &advice_prompt(fen, last_move),
            json!({ "temperature": ADVICE_TEMPERATURE }),
        )
        .await
    }
}
