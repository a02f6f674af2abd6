//! Authenticated session against one site
//!
//! A session is created per workflow execution and must not outlive it; the
//! bearer token it holds has a validity window controlled by the service.

use std::sync::Arc;

use pulseops_http::{header, HttpClientTrait, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{from_transport, ApiError, Result};

/// Known-good API version used when the config omits one
pub const DEFAULT_API_VERSION: &str = "3.24";

/// Credential pair for one of the two supported authentication modes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "auth_method", rename_all = "snake_case")]
pub enum Credentials {
    /// Username and password
    Password { username: String, password: String },
    /// Personal access token name and secret
    PersonalAccessToken { name: String, secret: String },
}

/// Connection settings for one site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Server base URL, e.g. `https://10az.online.tableau.com`
    pub server_url: String,
    /// Site content URL; empty string selects the default site
    #[serde(default)]
    pub site_content_url: String,
    /// REST API version
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Credentials; never persisted by this system
    pub credentials: Credentials,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl SiteConfig {
    /// Create a config with the default API version
    pub fn new(
        server_url: impl Into<String>,
        site_content_url: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        SiteConfig {
            server_url: server_url.into(),
            site_content_url: site_content_url.into(),
            api_version: default_api_version(),
            credentials,
        }
    }
}

/// An authenticated connection to one site
pub struct Session {
    client: Arc<dyn HttpClientTrait>,
    server_url: String,
    api_version: String,
    token: String,
    site_id: String,
    user_id: String,
}

impl Session {
    /// Sign in and produce a session.
    ///
    /// Both authentication modes resolve to the same session contract;
    /// callers never see the difference past this point.
    pub async fn sign_in(config: &SiteConfig, client: Arc<dyn HttpClientTrait>) -> Result<Session> {
        let server_url = config.server_url.trim_end_matches('/').to_string();
        let url = format!("{}/api/{}/auth/signin", server_url, config.api_version);

        let credentials = match &config.credentials {
            Credentials::Password { username, password } => json!({
                "name": username,
                "password": password,
                "site": {"contentUrl": config.site_content_url},
            }),
            Credentials::PersonalAccessToken { name, secret } => json!({
                "personalAccessTokenName": name,
                "personalAccessTokenSecret": secret,
                "site": {"contentUrl": config.site_content_url},
            }),
        };

        let response = client
            .send(
                Method::POST,
                &url,
                json_headers(None),
                Some(json!({ "credentials": credentials })),
            )
            .await
            .map_err(|e| ApiError::auth(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiError::auth(format!("unreadable sign-in response: {e}")))?;

        let creds = &body["credentials"];
        let token = string_field(creds, "token")
            .ok_or_else(|| ApiError::auth("sign-in response missing token"))?;
        let site_id = string_field(&creds["site"], "id")
            .ok_or_else(|| ApiError::auth("sign-in response missing site id"))?;
        let user_id = string_field(&creds["user"], "id").unwrap_or_default();

        debug!("signed in to site {site_id}");

        Ok(Session {
            client,
            server_url,
            api_version: config.api_version.clone(),
            token,
            site_id,
            user_id,
        })
    }

    /// Id of the site this session is scoped to
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Id of the authenticated user
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// URL for a site-scoped REST resource, e.g. `users`
    pub fn rest_url(&self, path: &str) -> String {
        format!(
            "{}/api/{}/sites/{}/{}",
            self.server_url, self.api_version, self.site_id, path
        )
    }

    /// URL for a Pulse resource, e.g. `definitions`
    pub fn pulse_url(&self, path: &str) -> String {
        format!("{}/api/-/pulse/{}", self.server_url, path)
    }

    /// GET a resource with query parameters, deserializing the JSON body
    pub async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let url = with_query(url, query)?;
        let response = self
            .client
            .send(Method::GET, &url, self.headers(), None)
            .await
            .map_err(from_transport)?;
        Ok(response.json().await.map_err(pulseops_http::HttpError::from)?)
    }

    /// POST a JSON body, deserializing the response
    pub async fn post<T: DeserializeOwned>(&self, url: &str, body: Value) -> Result<T> {
        let response = self
            .client
            .send(Method::POST, url, self.headers(), Some(body))
            .await
            .map_err(from_transport)?;
        Ok(response.json().await.map_err(pulseops_http::HttpError::from)?)
    }

    /// PATCH a JSON body, discarding the response body
    pub async fn patch(&self, url: &str, body: Value) -> Result<()> {
        self.client
            .send(Method::PATCH, url, self.headers(), Some(body))
            .await
            .map_err(from_transport)?;
        Ok(())
    }

    /// DELETE a resource
    pub async fn delete(&self, url: &str) -> Result<()> {
        self.client
            .send(Method::DELETE, url, self.headers(), None)
            .await
            .map_err(from_transport)?;
        Ok(())
    }

    /// Best-effort sign-out; failures are logged, never surfaced.
    pub async fn sign_out(self) {
        let url = format!("{}/api/{}/auth/signout", self.server_url, self.api_version);
        if let Err(e) = self
            .client
            .send(Method::POST, &url, self.headers(), None)
            .await
        {
            warn!("sign-out failed: {e}");
        }
    }

    fn headers(&self) -> header::HeaderMap {
        json_headers(Some(&self.token))
    }

    /// Assemble a session from parts, bypassing sign-in.
    ///
    /// Intended for tests and for callers that manage tokens externally.
    pub fn from_parts(
        client: Arc<dyn HttpClientTrait>,
        server_url: impl Into<String>,
        api_version: impl Into<String>,
        token: impl Into<String>,
        site_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Session {
        Session {
            client,
            server_url: server_url.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            token: token.into(),
            site_id: site_id.into(),
            user_id: user_id.into(),
        }
    }
}

fn json_headers(token: Option<&str>) -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    if let Some(token) = token {
        if let Ok(value) = header::HeaderValue::from_str(token) {
            headers.insert("X-Tableau-Auth", value);
        }
    }
    headers
}

fn with_query(url: &str, query: &[(&str, String)]) -> Result<String> {
    let mut parsed = url::Url::parse(url)
        .map_err(|e| ApiError::invalid_input(format!("invalid URL {url}: {e}")))?;
    if !query.is_empty() {
        let mut pairs = parsed.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(parsed.to_string())
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}
