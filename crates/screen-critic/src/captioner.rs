//! Image captioning through a hosted prediction API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capture::ImagePayload;
use crate::http::{build_client, ensure_success, transport_error, DEFAULT_TIMEOUT};
use crate::types::{Caption, CritiqueError, CritiqueResult, Service};

/// Default hosted API endpoint.
pub const DEFAULT_REPLICATE_URL: &str = "https://api.replicate.com";

/// img2prompt: produces a descriptive, prompt-style caption for an image.
pub const DEFAULT_CAPTION_MODEL: &str =
    "methexis-inc/img2prompt:50adaf2d3ad20a6f911a8a9e3ccf777b263b8596fbd2c8fc26e8888f8a0edbb5";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Turns an image into a text caption.
#[async_trait]
pub trait ImageCaptioner: Send + Sync {
    async fn caption(&self, image: &ImagePayload) -> CritiqueResult<Caption>;
}

/// A model reference: either pinned to a version or addressed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ModelRef {
    Version(String),
    Named { owner: String, name: String },
}

impl ModelRef {
    fn parse(model: &str) -> CritiqueResult<Self> {
        let model = model.trim();
        if let Some((_, version)) = model.split_once(':') {
            if !version.is_empty() {
                return Ok(ModelRef::Version(version.to_string()));
            }
        } else if let Some((owner, name)) = model.split_once('/') {
            if !owner.is_empty() && !name.is_empty() {
                return Ok(ModelRef::Named {
                    owner: owner.to_string(),
                    name: name.to_string(),
                });
            }
        }
        Err(CritiqueError::remote(
            Service::Captioner,
            format!("invalid caption model reference '{model}', expected owner/name[:version]"),
        ))
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: PredictionInput,
}

#[derive(Debug, Serialize)]
struct PredictionInput {
    image: String,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

/// Captioner backed by the Replicate predictions API.
pub struct ReplicateCaptioner {
    client: Client,
    base_url: String,
    token: String,
    model: ModelRef,
    timeout: Duration,
    poll_interval: Duration,
}

impl ReplicateCaptioner {
    /// Create a captioner for `model` (`owner/name:version` or `owner/name`).
    pub fn new(token: impl Into<String>, model: &str) -> CritiqueResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CritiqueError::auth(
                Service::Captioner,
                "missing API token",
            ));
        }
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT),
            base_url: DEFAULT_REPLICATE_URL.to_string(),
            token,
            model: ModelRef::parse(model)?,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound each HTTP call and the overall wait for a prediction.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn create_url(&self) -> String {
        match &self.model {
            ModelRef::Version(_) => format!("{}/v1/predictions", self.base_url),
            ModelRef::Named { owner, name } => {
                format!("{}/v1/models/{owner}/{name}/predictions", self.base_url)
            }
        }
    }

    async fn create(&self, image: &ImagePayload) -> CritiqueResult<Prediction> {
        let version = match &self.model {
            ModelRef::Version(v) => Some(v.as_str()),
            ModelRef::Named { .. } => None,
        };
        let body = PredictionRequest {
            version,
            input: PredictionInput {
                image: image.to_data_uri(),
            },
        };

        let url = self.create_url();
        tracing::debug!("Creating prediction at {url} ({} image bytes)", image.bytes.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(Service::Captioner, e))?;
        let response = ensure_success(Service::Captioner, response).await?;
        response
            .json()
            .await
            .map_err(|e| transport_error(Service::Captioner, e))
    }

    async fn fetch(&self, url: &str) -> CritiqueResult<Prediction> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport_error(Service::Captioner, e))?;
        let response = ensure_success(Service::Captioner, response).await?;
        response
            .json()
            .await
            .map_err(|e| transport_error(Service::Captioner, e))
    }
}

#[async_trait]
impl ImageCaptioner for ReplicateCaptioner {
    async fn caption(&self, image: &ImagePayload) -> CritiqueResult<Caption> {
        let started = Instant::now();
        let mut prediction = self.create(image).await?;

        loop {
            match prediction.status.as_str() {
                "succeeded" => {
                    let text = output_text(prediction.output)?;
                    return Caption::new(text);
                }
                "failed" | "canceled" => {
                    let reason = prediction
                        .error
                        .as_ref()
                        .map(value_text)
                        .unwrap_or_else(|| "no error detail".to_string());
                    return Err(CritiqueError::remote(
                        Service::Captioner,
                        format!("prediction {} {}: {reason}", prediction.id, prediction.status),
                    ));
                }
                _ => {}
            }

            if started.elapsed() >= self.timeout {
                return Err(CritiqueError::remote(
                    Service::Captioner,
                    format!(
                        "prediction {} still {} after {}s",
                        prediction.id,
                        prediction.status,
                        self.timeout.as_secs()
                    ),
                ));
            }

            let url = prediction
                .urls
                .as_ref()
                .and_then(|u| u.get.clone())
                .ok_or_else(|| {
                    CritiqueError::remote(
                        Service::Captioner,
                        format!("prediction {} is {} with no status URL", prediction.id, prediction.status),
                    )
                })?;

            tracing::debug!("Prediction {} is {}, polling", prediction.id, prediction.status);
            tokio::time::sleep(self.poll_interval).await;
            prediction = self.fetch(&url).await?;
        }
    }
}

/// Flatten prediction output: a string, or a list of string fragments.
fn output_text(output: Option<Value>) -> CritiqueResult<String> {
    match output {
        Some(Value::String(s)) => Ok(s),
        Some(Value::Array(items)) => {
            let mut text = String::new();
            for item in items {
                match item {
                    Value::String(s) => text.push_str(&s),
                    other => {
                        return Err(CritiqueError::remote(
                            Service::Captioner,
                            format!("unexpected output fragment: {other}"),
                        ))
                    }
                }
            }
            Ok(text)
        }
        Some(other) => Err(CritiqueError::remote(
            Service::Captioner,
            format!("unexpected output: {other}"),
        )),
        None => Err(CritiqueError::remote(
            Service::Captioner,
            "prediction succeeded without output",
        )),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
