//! HTTP client for the heart-failure inference service.

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::{PredictionConfig, ZeroPolicy};
use crate::encoder::{encode, PatientInput};
use crate::error::{ExtractionFailure, PredictError, RiskError};
use crate::records::PatientRecord;

/// Body returned by `POST /predict`: one row of class probabilities per
/// submitted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Vec<Vec<f64>>,
}

impl PredictionResponse {
    /// Picks `predictions[0][0]`, the probability of the positive class.
    pub fn first(&self, zero_policy: ZeroPolicy) -> Result<f64, PredictError> {
        let row = self
            .predictions
            .first()
            .ok_or_else(|| PredictError::Schema("predictions has no rows".to_string()))?;
        let value = *row
            .first()
            .ok_or(PredictError::Extraction(ExtractionFailure::EmptyRow))?;
        if value == 0.0 && zero_policy == ZeroPolicy::RejectZero {
            return Err(PredictError::Extraction(ExtractionFailure::ZeroProbability));
        }
        if !(0.0..=1.0).contains(&value) {
            warn!("prediction {value} lies outside [0, 1]");
        }
        Ok(value)
    }
}

/// Parses a raw response body and extracts the probability.
pub fn extract_prediction(body: &[u8], zero_policy: ZeroPolicy) -> Result<f64, PredictError> {
    let response: PredictionResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        // Skipping values does not convert numbers, so out-of-range literals
        // such as 1e400 still count as well-formed JSON here.
        Err(err) => match serde_json::from_slice::<IgnoredAny>(body) {
            Ok(_) => return Err(PredictError::Schema(err.to_string())),
            Err(syntax) => return Err(PredictError::InvalidBody(syntax)),
        },
    };
    response.first(zero_policy)
}

/// Sends patient records to the inference service. Holds no per-request
/// state, so one client can serve any number of concurrent predictions.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: Client,
    endpoint: String,
    zero_policy: ZeroPolicy,
}

impl PredictionClient {
    pub fn new(config: &PredictionConfig) -> Result<Self, PredictError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: config.endpoint(),
            zero_policy: config.zero_policy(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submits one record and returns the positive-class probability as sent by
    /// the service, without rescaling.
    pub async fn predict(&self, record: &PatientRecord) -> Result<f64, PredictError> {
        debug!("requesting prediction from {}", self.endpoint);
        let response = self.http.post(&self.endpoint).json(record).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PredictError::Status(status));
        }
        let body = response.bytes().await?;
        let prediction = extract_prediction(&body, self.zero_policy)?;
        debug!("service predicted {prediction}");
        Ok(prediction)
    }

    /// Like [`predict`](Self::predict), but gives up as soon as `cancel` fires.
    pub async fn predict_with_cancel(
        &self,
        record: &PatientRecord,
        cancel: &CancellationToken,
    ) -> Result<f64, PredictError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PredictError::Cancelled),
            result = self.predict(record) => result,
        }
    }

    /// Validates raw field values, then predicts.
    pub async fn predict_input(&self, input: &PatientInput) -> Result<f64, RiskError> {
        let record = encode(input)?;
        Ok(self.predict(&record).await?)
    }
}
