//! Cloudflare v4 API client
//!
//! One thin HTTP client shared by every resource reconciler. Responses use
//! the standard envelope (`success`, `result`, `errors`); failures are
//! mapped into structured [`ApiError`] values carrying the HTTP status and
//! every numeric error code from the envelope. Resource modules define their
//! endpoint methods in `impl <Resource>Api for Client` blocks.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_token: String,
    pub api_base: String,
}

impl ClientConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Create a ClientConfig from environment variables.
    ///
    /// `CLOUDFLARE_API_TOKEN` is required; `CLOUDFLARE_API_BASE` overrides
    /// the endpoint, which is mainly useful against a local test server.
    pub fn from_env() -> Result<Self> {
        let api_token = std::env::var("CLOUDFLARE_API_TOKEN")
            .map_err(|_| Error::MissingEnvVar("CLOUDFLARE_API_TOKEN"))?;
        let api_base =
            std::env::var("CLOUDFLARE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        Ok(Self {
            api_token,
            api_base,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

/// Cloudflare API client
pub struct Client {
    http: reqwest::Client,
    api_token: String,
    api_base: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_token: config.api_token,
            api_base: config.api_base,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let req = self.http.get(self.url(path));
        self.send(path, req).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = self.http.post(self.url(path)).json(body);
        self.send(path, req).await
    }

    pub(crate) async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = self.http.put(self.url(path)).json(body);
        self.send(path, req).await
    }

    pub(crate) async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let req = self.http.patch(self.url(path)).json(body);
        self.send(path, req).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let req = self.http.delete(self.url(path));
        self.send_optional::<serde_json::Value>(path, req).await?;
        Ok(())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<T> {
        self.send_optional(path, req)
            .await?
            .ok_or_else(|| Error::EmptyResult {
                path: path.to_string(),
            })
    }

    /// Send a request and unwrap the response envelope. Returns `None` when
    /// the envelope reports success with a null result (deletes do this).
    async fn send_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<Option<T>> {
        tracing::debug!(%path, "sending Cloudflare API request");

        let response = req.bearer_auth(&self.api_token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(err) if status.is_success() => return Err(err.into()),
            // Error responses are not guaranteed to carry the envelope
            // (gateway errors, HTML bodies). Surface the status as-is.
            Err(_) => {
                return Err(ApiError {
                    status: status.as_u16(),
                    codes: Vec::new(),
                    message: truncate(&body, 256),
                }
                .into());
            }
        };

        if !status.is_success() || !envelope.success {
            let message = envelope
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(ApiError {
                status: status.as_u16(),
                codes: envelope.errors.iter().map(|e| e.code).collect(),
                message,
            }
            .into());
        }

        Ok(envelope.result)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

// ============ Envelope types ============

// `default` on `result` would otherwise infer a `T: Default` bound.
#[derive(Debug, serde::Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
struct ApiResponse<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, serde::Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i32,
    message: String,
}
