//! # Recipe Search
//!
//! Client for a TheMealDB-style search endpoint:
//! `GET {base}/{key}/search.php?s={term}`.
//!
//! A 429 rotates to the next key and retries, at most once per remaining key.
//! When every key is rate limited the caller gets [`SearchOutcome::RateLimited`]
//! instead of an error.

use super::key_rotation::KeyRotation;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Credentials, RecipeSearchSettings};
use crate::state::ResultStore;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Result of a search that reached the service
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Decoded response body
    Found(Value),
    /// Every key in the pool was rate limited
    RateLimited { status: u16 },
}

/// Strip prompt phrasing from a search term
pub fn clear_of_junk(term: &str) -> String {
    term.replace('\n', "")
        .replace('`', "")
        .replace("how to cook ", "")
        .replace("how to ", "")
        .replace("recipe", "")
}

pub struct RecipeSearchClient {
    http: reqwest::Client,
    base_url: String,
    keys: KeyRotation,
}

impl RecipeSearchClient {
    pub fn new(base_url: &str, keys: KeyRotation, timeout: Duration) -> ServiceResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            keys,
        })
    }

    /// Build from settings. Key names that are not set in the environment are
    /// skipped; the rotation cursor lives in `store`.
    pub async fn from_settings(
        settings: &RecipeSearchSettings,
        credentials: &Credentials,
        store: &ResultStore,
    ) -> ServiceResult<Self> {
        let keys: Vec<String> = settings
            .key_names
            .iter()
            .filter_map(|name| match credentials.get(name) {
                Some(value) if !value.is_empty() => Some(value.to_string()),
                _ => {
                    tracing::warn!(key = %name, "Recipe-search key not set; skipping");
                    None
                }
            })
            .collect();
        if keys.is_empty() {
            tracing::info!("No recipe-search keys configured; using the public test key");
        }

        let rotation = KeyRotation::persisted(keys, store.key_cursor_path()).await;
        Self::new(
            &settings.base_url,
            rotation,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn keys(&self) -> &KeyRotation {
        &self.keys
    }

    pub fn search_url(&self, key: &str, term: &str) -> String {
        format!(
            "{}/{}/search.php?s={}",
            self.base_url,
            key,
            urlencoding::encode(term)
        )
    }

    /// Search for recipes matching `term` (cleaned first)
    pub async fn search(&self, term: &str) -> ServiceResult<SearchOutcome> {
        let term = clear_of_junk(term);
        let attempts = self.keys.len();
        tracing::debug!(term = %term, attempts, "Searching recipes");

        for attempt in 0..attempts {
            let url = self.search_url(self.keys.current_key(), &term);
            let response = self.http.get(&url).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!(attempt, key_index = self.keys.index(), "Recipe search rate limited; rotating key");
                self.keys.advance().await;
                continue;
            }

            let body = response.text().await?;
            if !status.is_success() {
                tracing::warn!(status = status.as_u16(), body = %body, "Recipe search failed");
                return Err(ServiceError::UpstreamRequest {
                    status: status.as_u16(),
                    body,
                });
            }

            let value = serde_json::from_str(&body).map_err(|e| ServiceError::MalformedResponse {
                reason: format!("search response is not JSON: {}", e),
                raw: body.clone(),
            })?;
            return Ok(SearchOutcome::Found(value));
        }

        Ok(SearchOutcome::RateLimited {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP/1.1 server that answers each connection with the next
    /// scripted `(status line, body)` and records the full request text.
    pub(crate) async fn scripted_server(
        replies: Vec<(&'static str, &'static str)>,
    ) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            for (status, body) in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                seen.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{}", addr), requests)
    }

    /// Read headers, then as much body as `content-length` announces
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        let mut expected = None;

        loop {
            if expected.is_none() {
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    expected = Some(end + 4 + body_len);
                }
            }
            if matches!(expected, Some(total) if request.len() >= total) {
                break;
            }

            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        String::from_utf8_lossy(&request).into_owned()
    }

    /// Path of a recorded request line
    pub(crate) fn request_path(request: &str) -> &str {
        request.split_whitespace().nth(1).unwrap_or_default()
    }

    fn client(base: &str, keys: &[&str]) -> RecipeSearchClient {
        let keys = keys.iter().map(|k| k.to_string()).collect();
        RecipeSearchClient::new(base, KeyRotation::new(keys), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_clear_of_junk() {
        assert_eq!(clear_of_junk("how to cook jollof rice"), "jollof rice");
        assert_eq!(clear_of_junk("`paella recipe`\n"), "paella ");
        assert_eq!(clear_of_junk("how to make biryani"), "make biryani");
    }

    #[test]
    fn test_search_url_encodes_term() {
        let client = client("https://meals.example/api/json/v1/", &[]);
        assert_eq!(
            client.search_url("1", "jollof rice"),
            "https://meals.example/api/json/v1/1/search.php?s=jollof%20rice"
        );
    }

    #[tokio::test]
    async fn test_search_returns_body() {
        let (base, requests) = scripted_server(vec![("200 OK", r#"{"meals":[{"strMeal":"Paella"}]}"#)]).await;
        let client = client(&base, &[]);

        let outcome = client.search("paella recipe").await.unwrap();

        assert_eq!(outcome, SearchOutcome::Found(json!({"meals": [{"strMeal": "Paella"}]})));
        assert_eq!(request_path(&requests.lock().unwrap()[0]), "/1/search.php?s=paella%20");
    }

    #[tokio::test]
    async fn test_rate_limit_rotates_then_succeeds() {
        let (base, requests) = scripted_server(vec![
            ("429 Too Many Requests", ""),
            ("200 OK", r#"{"meals":null}"#),
        ])
        .await;
        let client = client(&base, &["k1", "k2", "k3"]);

        let outcome = client.search("rice").await.unwrap();

        assert_eq!(outcome, SearchOutcome::Found(json!({"meals": null})));
        let requests = requests.lock().unwrap();
        assert!(request_path(&requests[0]).starts_with("/k1/"));
        assert!(request_path(&requests[1]).starts_with("/k2/"));
        assert_eq!(client.keys().current_key(), "k2");
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_pool() {
        let (base, requests) = scripted_server(vec![
            ("429 Too Many Requests", ""),
            ("429 Too Many Requests", ""),
        ])
        .await;
        let client = client(&base, &["k1", "k2"]);

        let outcome = client.search("rice").await.unwrap();

        assert_eq!(outcome, SearchOutcome::RateLimited { status: 429 });
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_is_upstream_failure() {
        let (base, _) = scripted_server(vec![("503 Service Unavailable", "down")]).await;
        let client = client(&base, &["k1", "k2"]);

        let err = client.search("rice").await.unwrap_err();

        assert_eq!(err.status(), Some(503));
    }
}
