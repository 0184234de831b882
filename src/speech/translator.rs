//! Text translation through the public Google Translate endpoint.
//!
//! Falls back gracefully: callers speak the original text on any error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::AppError;

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: &str) -> Result<String, AppError>;
}

pub struct GoogleTranslator {
    host: String,
    client: Client,
}

impl GoogleTranslator {
    pub fn new(config: &TranslateConfig, timeout_secs: u64) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Translation(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            host: config.host.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String, AppError> {
        let url = format!("{}/translate_a/single", self.host);
        debug!("Translating {} chars to '{target}'", text.chars().count());

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| AppError::Translation(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Translation(format!(
                "translate endpoint returned status {}",
                resp.status()
            )));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| AppError::Translation(format!("failed to parse response: {e}")))?;

        parse_translation(&data)
            .ok_or_else(|| AppError::Translation("empty translation".into()))
    }
}

/// Join the translated segments found at `[0][i][0]`.
fn parse_translation(data: &Value) -> Option<String> {
    let translated: String = data
        .get(0)?
        .as_array()?
        .iter()
        .filter_map(|segment| segment.get(0)?.as_str())
        .collect();

    if translated.trim().is_empty() {
        None
    } else {
        Some(translated)
    }
}
