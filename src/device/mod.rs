use std::{future::Future, time::Duration};

use common::{
    Color, DeviceInfo, FirmwareInfo, PatternStep, SetPatternRequest, UpdateRequest,
};
use log::{debug, warn};
use reqwest::{header::CACHE_CONTROL, Client, Response};
use serde_json::Value;

mod error;

pub use error::DeviceError;

// Per-endpoint time limits. Nothing the device is asked to do may hang.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(3);
pub const SET_COLOR_TIMEOUT: Duration = Duration::from_secs(2);
/// Patterns can be large and the device has to parse and store every step
pub const SET_PATTERN_TIMEOUT: Duration = Duration::from_secs(5);
pub const INFO_TIMEOUT: Duration = Duration::from_secs(3);
pub const FIRMWARE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
/// The device may be busy for a while before it answers an update request
pub const UPDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the remote can ask of a device (and of the firmware server).
///
/// Implementations hold no per-device state; every call names the address it
/// talks to. Calls are spawned off the controller, so handles must be cheap to
/// clone and their futures `Send`.
pub trait DeviceApi: Clone + Send + Sync + 'static {
    /// Liveness check. Any HTTP answer counts as alive; the body is not read.
    fn check_connection(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn set_color(
        &self,
        address: &str,
        color: Color,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn set_pattern(
        &self,
        address: &str,
        steps: &[PatternStep],
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn get_device_info(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<DeviceInfo, DeviceError>> + Send;

    fn check_latest_firmware(
        &self,
    ) -> impl Future<Output = Result<FirmwareInfo, DeviceError>> + Send;

    /// Ask the device to fetch and flash `firmware_url`. The device reboots
    /// while doing so, so an error here does not mean the update failed.
    fn trigger_update(
        &self,
        address: &str,
        firmware_url: &str,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

/// [`DeviceApi`] over plain HTTP
#[derive(Clone, Debug)]
pub struct HttpDevice {
    client: Client,
    firmware_url: String,
}

impl HttpDevice {
    pub fn new(firmware_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            firmware_url: firmware_url.into(),
        }
    }

    /// Fire a command whose response we don't care about. Only transport
    /// failures count.
    async fn send_command(
        &self,
        request: reqwest::RequestBuilder,
        url: String,
    ) -> Result<(), DeviceError> {
        debug!("Sending {}", url);

        match request.send().await {
            Ok(response) => {
                debug!("{} answered {}", url, response.status());
                Ok(())
            }
            Err(source) => {
                warn!("Request to {} failed: {}", url, source);
                Err(DeviceError::Request { url, source })
            }
        }
    }
}

impl DeviceApi for HttpDevice {
    async fn check_connection(&self, address: &str) -> Result<(), DeviceError> {
        let url = device_url(address, "/status");
        debug!("Checking {}", url);

        self.client
            .get(&url)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .map(|_| ())
            .map_err(|source| {
                warn!("Connection check for {} failed: {}", address, source);
                DeviceError::Connection {
                    address: address.to_string(),
                    source,
                }
            })
    }

    async fn set_color(&self, address: &str, color: Color) -> Result<(), DeviceError> {
        let url = device_url(address, "/setcolor");
        let request = self
            .client
            .get(&url)
            .query(&[("r", color.r), ("g", color.g), ("b", color.b)])
            .timeout(SET_COLOR_TIMEOUT);

        self.send_command(request, url).await
    }

    async fn set_pattern(&self, address: &str, steps: &[PatternStep]) -> Result<(), DeviceError> {
        let url = device_url(address, "/setpattern");
        let request = self
            .client
            .post(&url)
            .json(&SetPatternRequest {
                steps: steps.to_vec(),
            })
            .timeout(SET_PATTERN_TIMEOUT);

        self.send_command(request, url).await
    }

    async fn get_device_info(&self, address: &str) -> Result<DeviceInfo, DeviceError> {
        let url = device_url(address, "/info");
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(INFO_TIMEOUT)
            .send()
            .await
            .map_err(|source| DeviceError::Request {
                url: url.clone(),
                source,
            })?;

        let body = read_json(&url, response).await?;

        Ok(DeviceInfo {
            version: string_field(&url, &body, "version")?,
        })
    }

    async fn check_latest_firmware(&self) -> Result<FirmwareInfo, DeviceError> {
        let url = self.firmware_url.clone();
        debug!("Checking latest firmware at {}", url);

        // The metadata file is served from a CDN that likes to cache it
        let response = self
            .client
            .get(&url)
            .query(&[("t", chrono::Utc::now().timestamp_millis())])
            .header(CACHE_CONTROL, "no-cache")
            .timeout(FIRMWARE_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|source| DeviceError::Request {
                url: url.clone(),
                source,
            })?;

        let body = read_json(&url, response).await?;

        Ok(FirmwareInfo {
            version: string_field(&url, &body, "version")?,
            url: string_field(&url, &body, "url")?,
            changelog: string_field(&url, &body, "changelog")?,
        })
    }

    async fn trigger_update(&self, address: &str, firmware_url: &str) -> Result<(), DeviceError> {
        let url = device_url(address, "/update");
        let request = self
            .client
            .post(&url)
            .json(&UpdateRequest {
                url: firmware_url.to_string(),
            })
            .timeout(UPDATE_TIMEOUT);

        self.send_command(request, url).await
    }
}

/// Build the URL of an endpoint on the device. Bare hosts get `http://`.
pub fn device_url(address: &str, path: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        format!("{}{}", address, path)
    } else {
        format!("http://{}{}", address, path)
    }
}

async fn read_json(url: &str, response: Response) -> Result<Value, DeviceError> {
    let status = response.status();
    if !status.is_success() {
        warn!("{} answered with HTTP {}", url, status);
        return Err(DeviceError::Http {
            url: url.to_string(),
            status,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| DeviceError::Request {
            url: url.to_string(),
            source,
        })?;

    serde_json::from_slice(&body).map_err(|e| DeviceError::Validation {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn string_field(url: &str, body: &Value, field: &str) -> Result<String, DeviceError> {
    match body.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(DeviceError::Validation {
            url: url.to_string(),
            reason: format!("`{}` should be a string, got {}", field, other),
        }),
        None => Err(DeviceError::Validation {
            url: url.to_string(),
            reason: format!("missing `{}`", field),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_url() {
        assert_eq!(device_url("192.168.1.50", "/status"), "http://192.168.1.50/status");
        assert_eq!(
            device_url(" 10.0.0.2:8080/ ", "/info"),
            "http://10.0.0.2:8080/info"
        );
        assert_eq!(
            device_url("https://lamp.local", "/update"),
            "https://lamp.local/update"
        );
    }

    #[test]
    fn test_string_field() {
        let body = serde_json::json!({ "version": "1.2.0", "build": 7 });

        assert_eq!(string_field("u", &body, "version").unwrap(), "1.2.0");
        assert!(matches!(
            string_field("u", &body, "build"),
            Err(DeviceError::Validation { .. })
        ));
        assert!(matches!(
            string_field("u", &body, "url"),
            Err(DeviceError::Validation { .. })
        ));
    }
}
