//! Translation invoker — wraps the external text-to-text call.
//!
//! The service is a black box with its own failure mode. No retries happen
//! here; the call is stateless per invocation, so a caller that wants
//! retries can issue the same call again safely.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::TranslatorConfig;
use crate::error::TranslateError;

/// Result of one translation call.
#[derive(Debug, Clone)]
pub struct Translation {
    pub text: String,
    /// Language the service detected the input to be, if it reports one.
    pub detected_source: Option<String>,
}

/// External translation service, injected into the orchestrator.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `from` (or "auto") into `to`.
    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<Translation, TranslateError>;

    /// Best-effort standalone language detection. Services without a
    /// detection endpoint return `Ok(None)`; callers treat that as
    /// undetermined, never as an error.
    async fn detect(&self, _text: &str) -> Result<Option<String>, TranslateError> {
        Ok(None)
    }
}

// ── HTTP implementation ─────────────────────────────────────────────

/// DeepL-style JSON translation API client.
pub struct HttpTranslator {
    base_url: String,
    api_key: secrecy::SecretString,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<TranslatedItem>,
}

#[derive(Debug, Deserialize)]
struct TranslatedItem {
    text: String,
    #[serde(default)]
    detected_source_language: Option<String>,
}

impl HttpTranslator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v2/translate", self.base_url)
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<Translation, TranslateError> {
        let mut body = serde_json::json!({
            "text": [text],
            "target_lang": to.to_uppercase(),
        });
        // "auto" is expressed by omitting source_lang entirely.
        if from != "auto" {
            body["source_lang"] = serde_json::Value::String(from.to_uppercase());
        }

        let resp = self
            .client
            .post(self.endpoint())
            .header(
                "Authorization",
                format!("DeepL-Auth-Key {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslateError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TranslateError::ServiceError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranslateResponse =
            resp.json().await.map_err(|e| TranslateError::InvalidResponse {
                reason: e.to_string(),
            })?;

        let item = parsed
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| TranslateError::InvalidResponse {
                reason: "empty translations array".into(),
            })?;

        Ok(Translation {
            text: item.text,
            detected_source: item
                .detected_source_language
                .map(|lang| lang.to_lowercase()),
        })
    }
}
