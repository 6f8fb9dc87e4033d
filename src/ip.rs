//! Public IP discovery, used as the default tunnel ACL.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};

pub const IP_API_URL: &str = "https://api.ipify.org";

#[async_trait]
pub trait IpProvider: Send + Sync {
    /// The operator's public IP address as seen from the internet.
    async fn ip(&self) -> Result<String>;
}

/// Asks a plain-text "what is my IP" service.
pub struct ApiIpProvider {
    http: reqwest::Client,
    url: String,
}

impl ApiIpProvider {
    pub fn new() -> Result<Self> {
        Self::with_url(IP_API_URL)
    }

    pub fn with_url(url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl IpProvider for ApiIpProvider {
    async fn ip(&self) -> Result<String> {
        let resp = self.http.get(&self.url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Service {
                status: status.as_u16(),
                message: body,
            });
        }
        let ip = body.trim().to_string();
        if ip.is_empty() {
            return Err(Error::Protocol(format!("empty response from {}", self.url)));
        }
        debug!("public IP is {ip}");
        Ok(ip)
    }
}
