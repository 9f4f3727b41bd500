//! HTTP client for the text API.
//!
//! Covers the four endpoints the tools use:
//! - `GET  /v2/texts/{bdrc}`: registry lookup by BDRC id
//! - `POST /v2/texts`: create a text
//! - `POST /v2/texts/{text_id}/instances`: create an instance of a text
//! - `POST /v2/instances/{instance_id}/translation`: create a translation
//!
//! Every call is a single attempt bounded by the configured timeout.

mod ids;
mod summary;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use textloader_shared::{ApiSettings, Result, TextLoaderError};

pub use ids::extract_id;
pub use summary::summarize_payload;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("textloader/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Answer of the registry lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum BdrcLookup {
    /// The API already holds a text with this BDRC id.
    Found { status: u16, body: Option<Value> },
    /// No text with this BDRC id.
    NotFound { status: u16 },
}

impl BdrcLookup {
    pub fn exists(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Found { status, .. } | Self::NotFound { status } => *status,
        }
    }
}

/// Successful response of a create call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `None` for an empty or non-JSON body.
    pub body: Option<Value>,
    /// Raw body text.
    pub raw: String,
}

impl ApiResponse {
    /// The identifier of the created record, if the body carries one.
    pub fn id(&self) -> Option<String> {
        self.body.as_ref().and_then(extract_id)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin async client over the text API. Requests are sent one at a time by
/// the callers; the client itself holds no per-run state.
#[derive(Debug, Clone)]
pub struct TextApiClient {
    client: Client,
    settings: ApiSettings,
}

impl TextApiClient {
    /// Build a client with the configured timeout and auth header.
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some((name, value)) = settings.auth_header_pair() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TextLoaderError::config(format!("invalid auth header name '{name}': {e}"))
            })?;
            let mut value = HeaderValue::from_str(&value)
                .map_err(|e| TextLoaderError::config(format!("invalid auth header value: {e}")))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| TextLoaderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// Look up a text by BDRC id. 200 → found, 404 → not found, anything
    /// else is an error.
    #[instrument(skip(self))]
    pub async fn get_text_by_bdrc(&self, bdrc: &str) -> Result<BdrcLookup> {
        let url = self.settings.endpoint(&["v2", "texts", bdrc])?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TextLoaderError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let raw = read_body(response, &url).await?;
                debug!(%url, "bdrc id found");
                Ok(BdrcLookup::Found {
                    status: status.as_u16(),
                    body: serde_json::from_str(&raw).ok(),
                })
            }
            StatusCode::NOT_FOUND => Ok(BdrcLookup::NotFound {
                status: status.as_u16(),
            }),
            _ => {
                let raw = read_body(response, &url).await.unwrap_or_default();
                Err(api_error(status, "GET", &url, &raw, None))
            }
        }
    }

    /// `POST /v2/texts`.
    pub async fn create_text(&self, payload: &Value) -> Result<ApiResponse> {
        let url = self.settings.endpoint(&["v2", "texts"])?;
        self.post_json(url, payload).await
    }

    /// `POST /v2/texts/{text_id}/instances`.
    pub async fn create_instance(&self, text_id: &str, payload: &Value) -> Result<ApiResponse> {
        let url = self.settings.endpoint(&["v2", "texts", text_id, "instances"])?;
        self.post_json(url, payload).await
    }

    /// `POST /v2/instances/{instance_id}/translation`.
    pub async fn create_translation(
        &self,
        instance_id: &str,
        payload: &Value,
    ) -> Result<ApiResponse> {
        let url = self
            .settings
            .endpoint(&["v2", "instances", instance_id, "translation"])?;
        self.post_json(url, payload).await
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn post_json(&self, url: Url, payload: &Value) -> Result<ApiResponse> {
        let response = self
            .client
            .post(url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| TextLoaderError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        let raw = read_body(response, &url).await?;
        if !status.is_success() {
            return Err(api_error(status, "POST", &url, &raw, Some(payload)));
        }

        debug!(status = status.as_u16(), bytes = raw.len(), "POST succeeded");
        let body = if raw.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&raw).ok()
        };
        Ok(ApiResponse {
            status: status.as_u16(),
            body,
            raw,
        })
    }
}

async fn read_body(response: reqwest::Response, url: &Url) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| TextLoaderError::Network(format!("{url}: failed to read body: {e}")))
}

fn api_error(
    status: StatusCode,
    method: &str,
    url: &Url,
    raw: &str,
    payload: Option<&Value>,
) -> TextLoaderError {
    let trimmed = raw.trim();
    let mut body = if trimmed.is_empty() {
        "<empty>".to_string()
    } else {
        trimmed.to_string()
    };
    if let Some(payload) = payload {
        body.push_str("\nPayload summary: ");
        body.push_str(&summarize_payload(payload).to_string());
    }
    TextLoaderError::Api {
        status: status.as_u16(),
        method: method.to_string(),
        url: url.to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TextApiClient {
        TextApiClient::new(ApiSettings::with_base_url(&server.uri()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_found_and_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/texts/W1KG1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "T-1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/texts/W404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let found = client.get_text_by_bdrc("W1KG1").await.unwrap();
        assert!(found.exists());
        assert_eq!(
            found,
            BdrcLookup::Found {
                status: 200,
                body: Some(json!({"id": "T-1"}))
            }
        );

        let missing = client.get_text_by_bdrc("W404").await.unwrap();
        assert_eq!(missing, BdrcLookup::NotFound { status: 404 });
    }

    #[tokio::test]
    async fn test_lookup_server_error_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/texts/W500"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_text_by_bdrc("W500").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("down"));
    }

    #[tokio::test]
    async fn test_create_text_then_instance() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/texts"))
            .and(body_json(json!({"bdrc": "W1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"text_id": "T-7"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/texts/T-7/instances"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "I-7"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let text = client.create_text(&json!({"bdrc": "W1"})).await.unwrap();
        assert_eq!(text.id().as_deref(), Some("T-7"));

        let instance = client
            .create_instance("T-7", &json!({"content": "x"}))
            .await
            .unwrap();
        assert_eq!(instance.status, 201);
        assert_eq!(instance.id().as_deref(), Some("I-7"));
    }

    #[tokio::test]
    async fn test_rejected_post_carries_payload_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/instances/I-1/translation"))
            .respond_with(ResponseTemplate::new(422).set_body_string("{\"detail\":\"bad\"}"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_translation("I-1", &json!({"content": "long text", "language": "en"}))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(422));
        let msg = err.to_string();
        assert!(msg.contains("{\"detail\":\"bad\"}"));
        assert!(msg.contains("<content length=9>"));
        assert!(msg.contains("/v2/instances/I-1/translation"));
    }

    #[tokio::test]
    async fn test_empty_body_has_no_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/texts"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let response = client_for(&server).create_text(&json!({})).await.unwrap();
        assert!(response.body.is_none());
        assert!(response.id().is_none());
    }

    #[tokio::test]
    async fn test_auth_header_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/texts"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "T"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = ApiSettings::with_base_url(&server.uri()).unwrap();
        settings.token = Some("s3cret".into());
        settings.auth_scheme = "Bearer".into();
        let client = TextApiClient::new(settings).unwrap();

        let response = client.create_text(&json!({})).await.unwrap();
        assert_eq!(response.id().as_deref(), Some("T"));
    }
}
