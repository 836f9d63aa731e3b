//! # LLM Helpers
//!
//! Shared request/response plumbing for the generative text backend.
//!
//! A call takes a system prompt, a user prompt and an agent profile:
//! the request body starts from the default shape in the settings, the
//! profile's fields are overlaid, missing conversational roles get empty
//! placeholder messages, and finally the system/user messages receive the
//! supplied prompts. The answer is the first choice's message content, which
//! is expected to hold JSON, possibly wrapped in a markdown code fence.

use crate::error::{ServiceError, ServiceResult};
use crate::models::{render_headers, BodyProfile, Credentials, Settings};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use std::time::Duration;

/// Sends chat-style prompts to a text generation backend.
///
/// Implementors own transport and vendor details; the pipeline stages only
/// see prompt text in and answer text out.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a system instruction and a user prompt, return the answer text.
    async fn complete(&self, system: &str, user: &str) -> ServiceResult<String>;
}

/// Chat completion client for an OpenAI-compatible HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    agent: String,
    http: reqwest::Client,
    url: String,
    headers: HeaderMap,
    default_body: Map<String, Value>,
    profile: BodyProfile,
}

impl HttpChatClient {
    /// Build a client for one agent profile.
    ///
    /// Fails with a configuration error when the profile is unknown or a
    /// header template does not form a valid HTTP header.
    pub fn from_settings(
        settings: &Settings,
        agent: &str,
        credentials: &Credentials,
    ) -> ServiceResult<Self> {
        let profile = settings.profile(agent)?.clone();
        let api_key = credentials.resolve(&settings.ai_api.key_name);

        let mut headers = HeaderMap::new();
        for (name, value) in render_headers(&settings.ai_api.default_headers, &api_key) {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ServiceError::Configuration(format!("invalid header name '{}': {}", name, e))
            })?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| {
                ServiceError::Configuration(format!("invalid value for header '{}': {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.ai_api.timeout_secs))
            .build()?;

        Ok(Self {
            agent: agent.to_string(),
            http,
            url: settings.completion_url(),
            headers,
            default_body: settings.ai_api.body.default.clone(),
            profile,
        })
    }

    /// Request body for one call
    pub fn build_body(&self, system: &str, user: &str) -> Value {
        build_request_body(&self.default_body, &self.profile, system, user)
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn complete(&self, system: &str, user: &str) -> ServiceResult<String> {
        let body = self.build_body(system, user);

        let response = self
            .http
            .post(&self.url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                agent = %self.agent,
                status = status.as_u16(),
                body = %text,
                "Completion request failed"
            );
            return Err(ServiceError::UpstreamRequest {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: Value =
            serde_json::from_str(&text).map_err(|e| ServiceError::MalformedResponse {
                reason: format!("completion envelope is not JSON: {}", e),
                raw: text.clone(),
            })?;

        extract_message_content(&envelope)
            .map(str::to_string)
            .ok_or_else(|| ServiceError::MalformedResponse {
                reason: "completion has no choices[0].message.content".to_string(),
                raw: text,
            })
    }
}

/// Build a provider-agnostic chat request body.
///
/// The profile's `raw` fields replace same-named top-level fields of the
/// default body. Every role in the profile, plus `system` and `user`, ends up
/// with a message; roles added here start with empty content.
pub fn build_request_body(
    default: &Map<String, Value>,
    profile: &BodyProfile,
    system: &str,
    user: &str,
) -> Value {
    let mut body = default.clone();
    for (key, value) in &profile.raw {
        body.insert(key.clone(), value.clone());
    }

    let messages = body
        .entry("messages")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !messages.is_array() {
        *messages = Value::Array(Vec::new());
    }

    if let Value::Array(messages) = messages {
        let required = profile
            .roles
            .iter()
            .map(String::as_str)
            .chain(["system", "user"]);
        for role in required {
            let present = messages
                .iter()
                .any(|m| m.get("role").and_then(Value::as_str) == Some(role));
            if !present {
                messages.push(json!({ "role": role, "content": "" }));
            }
        }

        for message in messages.iter_mut() {
            let content = match message.get("role").and_then(Value::as_str) {
                Some("system") => system,
                Some("user") => user,
                _ => continue,
            };
            if let Some(obj) = message.as_object_mut() {
                obj.insert("content".to_string(), Value::String(content.to_string()));
            }
        }
    }

    Value::Object(body)
}

/// Pull `choices[0].message.content` out of a completion envelope
pub fn extract_message_content(envelope: &Value) -> Option<&str> {
    envelope
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

fn fence_open() -> &'static Regex {
    static OPEN: OnceLock<Regex> = OnceLock::new();
    OPEN.get_or_init(|| Regex::new(r"^```[A-Za-z]*").expect("static pattern compiles"))
}

fn fence_close() -> &'static Regex {
    static CLOSE: OnceLock<Regex> = OnceLock::new();
    CLOSE.get_or_init(|| Regex::new(r"```$").expect("static pattern compiles"))
}

/// Remove a surrounding markdown code fence and all line breaks
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let opened = fence_open().replace(trimmed, "");
    let closed = fence_close().replace(opened.trim_end(), "");
    closed
        .replace(|c| c == '\n' || c == '\r', "")
        .trim()
        .to_string()
}

/// Parse model output as JSON after fence stripping.
/// On failure the untouched text is kept in the error.
pub fn parse_json_payload(text: &str) -> ServiceResult<Value> {
    let stripped = strip_code_fences(text);
    serde_json::from_str(&stripped).map_err(|e| ServiceError::MalformedResponse {
        reason: e.to_string(),
        raw: text.to_string(),
    })
}

/// Send one prompt pair and decode the JSON answer.
/// The answer text comes back alongside the value so failures further
/// down can keep exactly what the backend said.
pub async fn request_json(
    client: &dyn ChatClient,
    system: &str,
    user: &str,
) -> ServiceResult<(String, Value)> {
    let text = client.complete(system, user).await?;
    let value = parse_json_payload(&text)?;
    Ok((text, value))
}

/// Elements of a JSON list answer; a lone object counts as a one-item list.
///
/// Every item must be an object carrying at least one of `keys`, otherwise
/// the whole answer is malformed. This keeps wrappers such as
/// `{"recipes": [...]}` or `{"error": ...}` from decoding into blank records.
pub fn into_items(value: Value, raw: &str, keys: &[&str]) -> ServiceResult<Vec<Value>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        other => {
            return Err(ServiceError::MalformedResponse {
                reason: format!("expected a JSON list, got {}", json_kind(&other)),
                raw: raw.to_string(),
            })
        }
    };

    if let Some((index, item)) = items
        .iter()
        .enumerate()
        .find(|(_, item)| !has_any_key(item, keys))
    {
        return Err(ServiceError::MalformedResponse {
            reason: format!(
                "item {} is {} without any of the expected keys ({})",
                index,
                json_kind(item),
                keys.join(", ")
            ),
            raw: raw.to_string(),
        });
    }

    Ok(items)
}

fn has_any_key(item: &Value, keys: &[&str]) -> bool {
    item.as_object()
        .map(|fields| keys.iter().any(|key| fields.contains_key(*key)))
        .unwrap_or(false)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Lenient field decoders for model output, which is loose about types
pub(crate) mod lenient {
    use super::*;

    pub fn f64_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        })
    }

    pub fn u32_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let number = match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => leading_number(&s),
            _ => 0.0,
        };
        Ok(number.max(0.0).round().min(u32::MAX as f64) as u32)
    }

    pub fn string_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Null => String::new(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => other.to_string(),
        })
    }

    /// "45 minutes" -> 45
    fn leading_number(text: &str) -> f64 {
        let digits: String = text
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        digits.parse().unwrap_or(0.0)
    }
}
