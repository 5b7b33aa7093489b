//! Connection settings for the inference service.

use std::time::Duration;

/// How a prediction of exactly `0` is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZeroPolicy {
    /// Treat zero as "no prediction". Matches the deployed web client, which
    /// cannot tell a 0% risk apart from a missing value.
    #[default]
    RejectZero,
    /// Return zero as a valid 0% risk.
    AcceptZero,
}

/// Settings for [`crate::PredictionClient`]. The service location is always
/// injected by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionConfig {
    base_url: String,
    timeout: Option<Duration>,
    zero_policy: ZeroPolicy,
}

impl PredictionConfig {
    /// Builds settings for the service at `base_url` (scheme, host and port).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            zero_policy: ZeroPolicy::default(),
        }
    }

    /// Deadline for a whole request; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_zero_policy(mut self, zero_policy: ZeroPolicy) -> Self {
        self.zero_policy = zero_policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn zero_policy(&self) -> ZeroPolicy {
        self.zero_policy
    }

    /// Full URL of `POST /predict`.
    pub fn endpoint(&self) -> String {
        format!("{}/predict", self.base_url.trim().trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_predict_path() {
        assert_eq!(
            PredictionConfig::new("http://localhost:3001").endpoint(),
            "http://localhost:3001/predict"
        );
        assert_eq!(
            PredictionConfig::new("http://10.0.0.5:8000/").endpoint(),
            "http://10.0.0.5:8000/predict"
        );
    }

    #[test]
    fn defaults_keep_current_behavior() {
        let config = PredictionConfig::new("http://localhost:3001");
        assert_eq!(config.timeout(), None);
        assert_eq!(config.zero_policy(), ZeroPolicy::RejectZero);
    }
}
