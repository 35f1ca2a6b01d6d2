//! Outbound HTTP transport.
//!
//! The gateway client only ever issues GET requests and reads the body back
//! as text. That is abstracted behind [`Transport`] so the client can be
//! driven without a network.

use crate::errors::{GatewayError, Result};
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Trait for issuing GET requests to the gateway.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url` and returns the response body.
    ///
    /// Credentials embedded in `url` must be sent as HTTP basic auth.
    async fn get(&self, url: &Url) -> Result<String>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::from_transport)?;
        Ok(Self { client })
    }

    /// Uses a preconfigured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<String> {
        let (target, credentials) = split_credentials(url)?;

        let mut request = match credentials {
            Some((username, password)) => self.client.get(target).basic_auth(username, password),
            None => self.client.get(target),
        };
        request = request.header(reqwest::header::ACCEPT, "text/xml, */*");

        tracing::debug!(host = ?url.host_str(), path = url.path(), "Gateway request");

        let response = request
            .send()
            .await
            .map_err(GatewayError::from_transport)?
            .error_for_status()
            .map_err(GatewayError::from_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(GatewayError::from_transport)?;

        tracing::debug!(status = %status, bytes = body.len(), "Gateway response");

        Ok(body)
    }
}

/// Moves userinfo out of `url` so it can be sent as basic auth instead of in
/// the request line.
fn split_credentials(url: &Url) -> Result<(Url, Option<(String, Option<String>)>)> {
    let username = decode_userinfo(url.username());
    if username.is_empty() {
        return Ok((url.clone(), None));
    }
    let password = url.password().map(decode_userinfo);

    let mut target = url.clone();
    target
        .set_username("")
        .and_then(|_| target.set_password(None))
        .map_err(|_| {
            GatewayError::ConfigError(format!("URL cannot drop credentials: {}", url.path()))
        })?;

    Ok((target, Some((username, password))))
}

fn decode_userinfo(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
