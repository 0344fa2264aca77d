//! Blocking Gemini streaming client.
//!
//! Talks to `streamGenerateContent?alt=sse` and feeds cumulative text to
//! the caller line by line. Runs on a blocking thread; the async edge
//! bridges it with `spawn_blocking`.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::orchestrator::{CancelToken, ModelRequest, ModelStream};
use super::RagError;

pub const GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const GEMINI_TEMPERATURE: f32 = 0.3;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Hard deadline for one whole streaming call, so a hung upstream can never
/// park a turn forever.
const STREAM_DEADLINE_SECS: u64 = 300;

pub struct GeminiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, GEMINI_BASE_URL.to_string())
    }

    /// Client against a non-default endpoint. Lets tests point at a local
    /// stub server.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(STREAM_DEADLINE_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Build a client from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, RagError> {
        let api_key = crate::config::gemini_api_key().ok_or(RagError::MissingApiKey)?;
        Ok(Self::new(api_key))
    }
}

impl ModelStream for GeminiClient {
    fn stream_reply(
        &self,
        request: &ModelRequest,
        cancel: &CancelToken,
        on_update: &mut dyn FnMut(&str),
    ) -> Result<String, RagError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, GEMINI_MODEL
        );
        let body = request_body(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    RagError::GeminiConnection(self.base_url.clone())
                } else if e.is_timeout() {
                    RagError::StreamingError(format!(
                        "Request timed out after {STREAM_DEADLINE_SECS}s"
                    ))
                } else {
                    RagError::GeminiConnection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RagError::GeminiApi {
                status: status.as_u16(),
                body,
            });
        }

        let mut full_text = String::new();
        let reader = BufReader::new(response);

        // SSE framing: one JSON chunk per "data: " line, stream ends when
        // the server closes the connection
        for line in reader.lines() {
            if cancel.is_cancelled() {
                tracing::info!("Gemini stream cancelled by client");
                return Err(RagError::Cancelled);
            }
            let line = line.map_err(|e| RagError::StreamingError(e.to_string()))?;
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };

            let chunk: GeminiStreamChunk = match serde_json::from_str(data) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparsable stream line");
                    continue;
                }
            };

            let delta = chunk_text(&chunk);
            if !delta.is_empty() {
                full_text.push_str(&delta);
                on_update(&full_text);
            }
        }

        Ok(full_text)
    }
}

/// Request body for `models/{model}:streamGenerateContent`
#[derive(Serialize)]
struct GeminiRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

fn request_body(request: &ModelRequest) -> GeminiRequest<'_> {
    let mut contents: Vec<GeminiContent<'_>> = request
        .history
        .iter()
        .map(|m| GeminiContent {
            role: Some(m.role.as_str()),
            parts: vec![GeminiPart { text: &m.text }],
        })
        .collect();
    contents.push(GeminiContent {
        role: Some("user"),
        parts: vec![GeminiPart {
            text: &request.prompt,
        }],
    });

    GeminiRequest {
        system_instruction: GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: &request.system_instruction,
            }],
        },
        contents,
        generation_config: GenerationConfig {
            temperature: GEMINI_TEMPERATURE,
        },
    }
}

/// One SSE chunk from the stream. Everything is defaulted: chunks carrying
/// only safety metadata or an empty candidate list must not break the read.
#[derive(Deserialize)]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiCandidateContent,
}

#[derive(Deserialize, Default)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

fn chunk_text(chunk: &GeminiStreamChunk) -> String {
    chunk
        .candidates
        .first()
        .map(|c| {
            c.content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}
