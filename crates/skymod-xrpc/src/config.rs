use std::time::Duration;

use crate::XrpcError;

pub const DEFAULT_PDS_URL: &str = "https://bsky.social";
pub const DEFAULT_PLC_URL: &str = "https://plc.directory";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Personal data server hosting the XRPC endpoints.
    pub pds_url: String,
    pub plc_url: String,
    /// Whole-request timeout. Repository exports can be large.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            pds_url: DEFAULT_PDS_URL.into(),
            plc_url: DEFAULT_PLC_URL.into(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("skymod/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `SKYMOD_PDS_URL`, `SKYMOD_PLC_URL` and
    /// `SKYMOD_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, XrpcError> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("SKYMOD_PDS_URL") {
            config.pds_url = url;
        }
        if let Ok(url) = std::env::var("SKYMOD_PLC_URL") {
            config.plc_url = url;
        }
        if let Ok(raw) = std::env::var("SKYMOD_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| XrpcError::InvalidSetting {
                name: "SKYMOD_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// The shared HTTP client for every service call.
pub fn http_client(config: &ServiceConfig) -> Result<reqwest::Client, XrpcError> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.timeout)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(XrpcError::Client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_public_services() {
        let config = ServiceConfig::default();
        assert_eq!(config.pds_url, "https://bsky.social");
        assert_eq!(config.plc_url, "https://plc.directory");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("skymod/"));
        assert!(http_client(&config).is_ok());
    }
}
