//! Client for the hosted generative-text service.
//!
//! Two calls are made against it: a search-grounded network status summary
//! and a structured extraction of balance/expiry from a provider page. Both
//! contain their failures; callers always get a usable value back.

use crate::balance::extract_reading_from_html;
use crate::models::{BalanceReading, GroundingSource, IntelligenceResult, UNKNOWN_EXPIRY};
use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const PORTAL_HTML_LIMIT: usize = 5000;

pub const FALLBACK_SUMMARY: &str = "تعذر الحصول على معلومات مباشرة حالياً.";
pub const EMPTY_SUMMARY: &str = "لا توجد معلومات جديدة حالياً.";

const INTELLIGENCE_PROMPT: &str = "ما هي أحدث أخبار وحالة خدمة يمن نت (Yemen Net) اليوم؟ هل هناك صيانة أو تحديثات في الأسعار أو سرعات الإنترنت؟ لخص النتائج في بضعة أسطر.";
const USER_AGENT: &str = "yemen-net-dashboard/0.1";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("API key not configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Network(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl GeminiConfig {
    /// Reads the credential from `GEMINI_API_KEY`, then `API_KEY`.
    ///
    /// A missing key is not an error here; every call then falls back.
    pub fn from_env() -> Self {
        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Self {
            api_key,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

/// Source of the network status summary shown on the dashboard.
#[async_trait]
pub trait IntelligenceFeed: Send + Sync {
    /// Infallible by contract: failures come back as the fallback summary.
    async fn fetch_intelligence(&self) -> IntelligenceResult;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingSource>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let text = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<String>();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn grounding_sources(&self) -> Vec<GroundingSource> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.grounding_metadata.as_ref())
            .map(|metadata| metadata.grounding_chunks.clone())
            .unwrap_or_default()
    }
}

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;
        info!(
            model = %config.model,
            has_key = config.api_key.is_some(),
            "generative client initialized"
        );
        Ok(Self { client, config })
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GeminiError::MissingApiKey)?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        );
        debug!(%url, "sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|error| GeminiError::Network(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|error| GeminiError::Decode(error.to_string()))
    }

    pub async fn try_fetch_intelligence(&self) -> Result<IntelligenceResult, GeminiError> {
        let request = GenerateContentRequest {
            contents: vec![user_content(INTELLIGENCE_PROMPT)],
            tools: Some(vec![json!({ "google_search": {} })]),
            generation_config: None,
        };
        let response = self.generate_content(&request).await?;
        Ok(intelligence_from_response(&response))
    }

    pub async fn try_parse_portal_html(&self, html: &str) -> Result<BalanceReading, GeminiError> {
        let snippet: String = html.chars().take(PORTAL_HTML_LIMIT).collect();
        let prompt = format!(
            "Extract the ADSL balance (Remaining GB) and Expiry Date from this Yemen Net HTML snippet. \n      HTML: {snippet}"
        );
        let request = GenerateContentRequest {
            contents: vec![user_content(&prompt)],
            tools: None,
            generation_config: Some(json!({
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "balance": { "type": "NUMBER", "description": "Remaining balance in GB" },
                        "expiry": { "type": "STRING", "description": "Expiry date string" }
                    },
                    "required": ["balance", "expiry"]
                }
            })),
        };
        let response = self.generate_content(&request).await?;
        let text = response.text().unwrap_or_else(|| "{}".to_string());
        reading_from_json_text(&text)
    }

    /// Reads balance and expiry from a provider page.
    ///
    /// The local extractor runs first; the service is only asked when it
    /// cannot find both values.
    pub async fn parse_portal_html(&self, html: &str) -> BalanceReading {
        if let Some(reading) = extract_reading_from_html(html) {
            debug!("portal page parsed locally");
            return reading;
        }
        match self.try_parse_portal_html(html).await {
            Ok(reading) => reading,
            Err(error) => {
                warn!(error = %error, "portal page parse failed");
                BalanceReading::parse_failed()
            }
        }
    }
}

#[async_trait]
impl IntelligenceFeed for GeminiClient {
    async fn fetch_intelligence(&self) -> IntelligenceResult {
        match self.try_fetch_intelligence().await {
            Ok(result) => result,
            Err(error) => {
                warn!(error = %error, "network intelligence unavailable");
                fallback_intelligence()
            }
        }
    }
}

pub fn fallback_intelligence() -> IntelligenceResult {
    IntelligenceResult {
        summary: FALLBACK_SUMMARY.to_string(),
        sources: Vec::new(),
    }
}

fn user_content(text: &str) -> Content {
    Content {
        parts: vec![Part {
            text: Some(text.to_string()),
        }],
    }
}

fn intelligence_from_response(response: &GenerateContentResponse) -> IntelligenceResult {
    IntelligenceResult {
        summary: response
            .text()
            .unwrap_or_else(|| EMPTY_SUMMARY.to_string()),
        sources: response.grounding_sources(),
    }
}

fn reading_from_json_text(text: &str) -> Result<BalanceReading, GeminiError> {
    let value: Value =
        serde_json::from_str(text).map_err(|error| GeminiError::Decode(error.to_string()))?;
    let balance = value
        .get("balance")
        .and_then(Value::as_f64)
        .filter(|balance| *balance != 0.0 && !balance.is_nan())
        .unwrap_or(0.0);
    let expiry = value
        .get("expiry")
        .and_then(Value::as_str)
        .filter(|expiry| !expiry.is_empty())
        .unwrap_or(UNKNOWN_EXPIRY);
    Ok(BalanceReading::new(balance, expiry))
}
