//! HTTP client for the sentiment prediction service.

use crate::event::Sentiment;
use crate::traits::{RelayError, RelayResult, SentimentClassifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    text: &'a str,
}

/// Response from the prediction service.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionResult {
    pub prediction: String,
    #[serde(default)]
    pub probability: f64,
}

/// Classifier backed by a `POST {"text": ..}` prediction endpoint.
pub struct HttpSentimentClassifier {
    client: reqwest::Client,
    predict_url: String,
    timeout: Duration,
}

impl HttpSentimentClassifier {
    pub fn new(predict_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            predict_url: predict_url.into(),
            timeout,
        }
    }

    /// Fetch the raw prediction.
    pub async fn predict(&self, text: &str) -> RelayResult<PredictionResult> {
        let response = self
            .client
            .post(&self.predict_url)
            .json(&PredictionRequest { text })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayError::Collaborator(format!("sentiment request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Collaborator(format!(
                "sentiment service returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RelayError::Collaborator(format!("invalid sentiment response: {e}")))
    }
}

#[async_trait]
impl SentimentClassifier for HttpSentimentClassifier {
    async fn classify(&self, text: &str) -> RelayResult<Sentiment> {
        let result = self.predict(text).await?;
        Sentiment::from_label(&result.prediction).ok_or_else(|| {
            RelayError::Collaborator(format!(
                "unknown sentiment label: {}",
                result.prediction
            ))
        })
    }
}
