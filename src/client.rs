//! HTTP client for the rport REST API.
//!
//! [`RportClient`] wraps `reqwest::Client` and provides typed methods for the
//! endpoints rportcli uses. It is also the [`ClientProvider`] behind the
//! endpoint resolver and the URL builder for the execution channel.
//!
//! ## Authentication
//!
//! Every request carries the credentials from the injected
//! [`CredentialProvider`]. WebSocket endpoints cannot use an `Authorization`
//! header, so they get a short-lived session token in `?access_token=`.
//!
//! ## Error handling
//!
//! Non-2xx responses are parsed for rport's `{"errors": [...]}` body. If that
//! fails, the raw response body becomes the error message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::auth::{CredentialProvider, Credentials};
use crate::error::{Error, Result};
use crate::models::{Client, DataResponse, LoginToken, Me, Tunnel};
use crate::search::ClientProvider;
use crate::tunnel::TunnelRequest;

pub const CLIENTS_URL: &str = "/api/v1/clients";
pub const ME_URL: &str = "/api/v1/me";
pub const LOGIN_URL: &str = "/api/v1/login";
pub const WS_COMMANDS_URL: &str = "/api/v1/ws/commands";
pub const WS_SCRIPTS_URL: &str = "/api/v1/ws/scripts";

/// Lifetime requested for WebSocket session tokens.
const WS_TOKEN_LIFETIME_SECS: u64 = 600;

/// HTTP client for one rport server.
pub struct RportClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<dyn CredentialProvider>,
}

impl RportClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: &str, auth: Arc<dyn CredentialProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("rportcli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        // Strip trailing slash for consistent URL construction
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{method} {url}");
        let request = self.http.request(method, url);
        match self.auth.provide() {
            Some(credentials) => credentials.apply(request),
            None => request,
        }
    }

    /// `GET /api/v1/clients`: all clients with their tunnels.
    pub async fn clients(&self) -> Result<Vec<Client>> {
        let resp = self
            .request(reqwest::Method::GET, CLIENTS_URL)
            .send()
            .await?;
        let body: DataResponse<Vec<Client>> = Self::handle_response(resp).await?;
        Ok(body.data)
    }

    /// `PUT /api/v1/clients/:id/tunnels`: create a tunnel.
    pub async fn create_tunnel(&self, client_id: &str, request: &TunnelRequest) -> Result<Tunnel> {
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("{CLIENTS_URL}/{client_id}/tunnels"),
            )
            .query(&request.query_pairs())
            .send()
            .await?;
        let body: DataResponse<Tunnel> = Self::handle_response(resp).await?;
        Ok(body.data)
    }

    /// `DELETE /api/v1/clients/:id/tunnels/:tid`: terminate a tunnel.
    pub async fn delete_tunnel(&self, client_id: &str, tunnel_id: &str) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::DELETE,
                &format!("{CLIENTS_URL}/{client_id}/tunnels/{tunnel_id}"),
            )
            .send()
            .await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// `GET /api/v1/me`: the authenticated user.
    pub async fn me(&self) -> Result<Me> {
        let resp = self.request(reqwest::Method::GET, ME_URL).send().await?;
        let body: DataResponse<Me> = Self::handle_response(resp).await?;
        Ok(body.data)
    }

    /// `GET /api/v1/login`: exchange the configured credentials for a
    /// session token valid for `lifetime_secs`.
    pub async fn login_token(&self, lifetime_secs: u64) -> Result<String> {
        let resp = self
            .request(reqwest::Method::GET, LOGIN_URL)
            .query(&[("token-lifetime", lifetime_secs.to_string())])
            .send()
            .await?;
        let body: DataResponse<LoginToken> = Self::handle_response(resp).await?;
        Ok(body.data.token)
    }

    /// WebSocket URL for `path`, authenticated with `?access_token=`.
    pub async fn ws_url(&self, path: &str) -> Result<String> {
        let token = match self.auth.provide() {
            Some(Credentials::Bearer(token)) => token,
            _ => self.login_token(WS_TOKEN_LIFETIME_SECS).await?,
        };
        let ws_base = to_ws_base(&self.base_url)?;
        Ok(format!("{ws_base}{path}?access_token={token}"))
    }

    /// Fail on non-2xx, returning the body text otherwise.
    async fn check_status(resp: reqwest::Response) -> Result<String> {
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(Error::Service {
                status: status.as_u16(),
                message: error_message(&body),
            })
        }
    }

    /// Parse an HTTP response. Returns the decoded JSON body on success, or
    /// an [`Error::Service`] with the server's message on failure.
    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let body = Self::check_status(resp).await?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Protocol(format!("invalid JSON from server: {e}")))
    }
}

#[async_trait]
impl ClientProvider for RportClient {
    async fn clients(&self) -> Result<Vec<Client>> {
        RportClient::clients(self).await
    }
}

/// Error body returned by rport: `{"errors":[{"code","title","detail"}]}`.
#[derive(Deserialize)]
struct ErrorResponse {
    errors: Vec<ErrorPayload>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

fn error_message(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) else {
        return body.to_string();
    };
    let messages: Vec<String> = parsed
        .errors
        .into_iter()
        .map(|e| match (e.title.is_empty(), e.detail.is_empty()) {
            (false, false) => format!("{}: {}", e.title, e.detail),
            (false, true) => e.title,
            (true, _) => e.detail,
        })
        .filter(|m| !m.is_empty())
        .collect();
    if messages.is_empty() {
        body.to_string()
    } else {
        messages.join(", ")
    }
}

/// Host part of a server URL, e.g. `localhost.com` for
/// `https://localhost.com:34`.
pub fn url_host(server_url: &str) -> Result<String> {
    let url = reqwest::Url::parse(server_url)
        .map_err(|e| Error::Config(format!("invalid server url '{server_url}': {e}")))?;
    url.host_str()
        .map(String::from)
        .ok_or_else(|| Error::Config(format!("server url '{server_url}' has no host")))
}

fn to_ws_base(base_url: &str) -> Result<String> {
    if let Some(rest) = base_url.strip_prefix("https://") {
        Ok(format!("wss://{rest}"))
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        Ok(format!("ws://{rest}"))
    } else {
        Err(Error::Config(format!("invalid URL scheme: {base_url}")))
    }
}
