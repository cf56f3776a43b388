//! HTTP execution for catalog operations.

use super::OpenApiError;
use crate::tools::ToolError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use url::Url;

/// A bound HTTP call: path already includes the query string.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    pub body: String,
}

/// Performs bound calls. Implemented by [`RestClient`] and wrappers like
/// the confirmation gate.
#[async_trait]
pub trait RestExecutor: Send + Sync {
    async fn execute(&self, request: RestRequest) -> Result<RestResponse, ToolError>;
}

/// Static credentials attached to every request.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    #[default]
    None,
    Bearer(String),
    Basic {
        username: String,
        password: String,
    },
}

impl Credentials {
    /// Pick credentials from CLI-style options. A bearer token wins over
    /// basic auth; basic auth needs both parts.
    pub fn from_options(
        bearer: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        match (bearer, username, password) {
            (Some(token), _, _) if !token.is_empty() => Self::Bearer(token),
            (_, Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Self::Basic { username, password }
            }
            _ => Self::None,
        }
    }
}

/// Executes requests against an absolute base URL.
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: Url,
    credentials: Credentials,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(base_url: &str) -> Result<Self, OpenApiError> {
        let url = Url::parse(base_url)
            .map_err(|e| OpenApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(OpenApiError::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self {
            base_url: url,
            credentials: Credentials::None,
            http: reqwest::Client::new(),
        })
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join by string so base paths like `/api/v1` are kept.
    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl RestExecutor for RestClient {
    async fn execute(&self, request: RestRequest) -> Result<RestResponse, ToolError> {
        let url = self.url_for(&request.path);
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self.http.request(request.method.clone(), &url);
        if let Some(body) = request.body {
            let content_type = request
                .content_type
                .unwrap_or_else(|| "application/json".into());
            builder = builder.header(CONTENT_TYPE, content_type).body(body);
        }
        builder = match &self.credentials {
            Credentials::None => builder,
            Credentials::Bearer(token) => builder.bearer_auth(token),
            Credentials::Basic { username, password } => builder.basic_auth(username, Some(password)),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ToolError::Http(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ToolError::Http(e.to_string()))?;

        // The model always gets something to read.
        if bytes.is_empty() {
            return Ok(RestResponse {
                body: status.to_string(),
            });
        }

        Ok(RestResponse {
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}
