//! HTTP client for the softener device API
//!
//! Fetches the device snapshot over REST using basic authentication. The
//! transport timeout is owned here; retries are left to the coordinator's
//! schedule.

use crate::client::DeviceClient;
use crate::config::SoftenerConfig;
use crate::error::{Result, SoftenerError};
use crate::models::RawSnapshot;
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, ClientBuilder};
use tracing::debug;
use url::Url;

/// HTTP client for one softener
pub struct HttpDeviceClient {
    /// HTTP client instance
    client: Client,

    /// Snapshot endpoint for the configured device
    snapshot_url: Url,
}

impl HttpDeviceClient {
    /// Create a new HTTP client
    pub fn new(config: &SoftenerConfig) -> Result<Self> {
        let auth_header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(format!(
                "{username}:{password}",
                username = config.username,
                password = config.password
            ))
        );
        let mut default_headers = reqwest::header::HeaderMap::new();
        let mut header_value = reqwest::header::HeaderValue::from_str(&auth_header)
            .map_err(|e| SoftenerError::config(format!("Invalid authorization header: {e}")))?;
        header_value.set_sensitive(true);
        default_headers.insert(reqwest::header::AUTHORIZATION, header_value);

        let client = ClientBuilder::new()
            .timeout(config.api.timeout)
            .user_agent(format!("iqua-softener/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers)
            .build()
            .map_err(|e| SoftenerError::connection(format!("Failed to build HTTP client: {e}")))?;

        let snapshot_url = Self::build_url(&config.api.base_url, &config.device_serial_number)?;

        Ok(Self {
            client,
            snapshot_url,
        })
    }

    /// Endpoint for a device's snapshot
    fn build_url(base_url: &Url, serial: &str) -> Result<Url> {
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        let mut url = base
            .join("devices/")
            .map_err(|e| SoftenerError::config(format!("Invalid API URL {base_url}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SoftenerError::config(format!("API URL cannot be a base: {base_url}")))?
            .pop_if_empty()
            .push(serial);
        Ok(url)
    }

    /// Snapshot endpoint in use
    pub fn snapshot_url(&self) -> &Url {
        &self.snapshot_url
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn fetch(&self) -> Result<RawSnapshot> {
        debug!("Fetching softener snapshot from {}", self.snapshot_url);

        let response = self
            .client
            .get(self.snapshot_url.clone())
            .send()
            .await
            .map_err(|e| {
                let error_msg = format!("HTTP request failed: {e}");
                if e.is_timeout() {
                    SoftenerError::timeout(error_msg)
                } else if e.is_connect() {
                    SoftenerError::connection(error_msg)
                } else {
                    SoftenerError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            let error_msg = format!("HTTP error {status}: {response_text}");

            return Err(match status.as_u16() {
                401 => SoftenerError::authentication(error_msg),
                403 => SoftenerError::authentication("Access denied"),
                404 => SoftenerError::connection("Device not found"),
                500..=599 => SoftenerError::connection(format!("Server error: {error_msg}")),
                _ => SoftenerError::connection(error_msg),
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                SoftenerError::timeout(format!("Reading response body timed out: {e}"))
            } else {
                SoftenerError::Http(e)
            }
        })?;

        let snapshot: RawSnapshot = serde_json::from_slice(&body)
            .map_err(|e| SoftenerError::parsing(format!("Malformed snapshot: {e}")))?;
        snapshot.validate()?;

        debug!(state = %snapshot.state, "Received softener snapshot");
        Ok(snapshot)
    }
}
