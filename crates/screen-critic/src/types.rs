//! Core data types for captions, reviews, and pipeline runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::prompt::Tone;

/// Which remote collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Captioner,
    Generator,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Captioner => f.write_str("image captioner"),
            Service::Generator => f.write_str("text generator"),
        }
    }
}

/// Text description of an image, as returned by the captioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Caption(String);

impl Caption {
    /// Wrap captioner output. Blank output is treated as a service failure.
    pub fn new(text: impl Into<String>) -> CritiqueResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(CritiqueError::remote(
                Service::Captioner,
                "captioner returned an empty caption",
            ));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generated review, written verbatim to the output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewText(String);

impl ReviewText {
    /// Wrap generator output. Blank output is treated as a service failure.
    pub fn new(text: impl Into<String>) -> CritiqueResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(CritiqueError::remote(
                Service::Generator,
                "generator returned an empty completion",
            ));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ReviewText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Summary of a successful pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub image_path: String,
    pub output_path: String,
    pub tone: Tone,
    pub caption: Caption,
    pub review: ReviewText,
    pub elapsed_ms: u64,
}

/// Errors that can occur while producing a review.
#[derive(thiserror::Error, Debug)]
pub enum CritiqueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Remote service error ({service}): {message}")]
    RemoteService { service: Service, message: String },

    #[error("Authentication failed ({service}): {message}")]
    Auth { service: Service, message: String },
}

impl CritiqueError {
    pub fn remote(service: Service, message: impl Into<String>) -> Self {
        CritiqueError::RemoteService {
            service,
            message: message.into(),
        }
    }

    pub fn auth(service: Service, message: impl Into<String>) -> Self {
        CritiqueError::Auth {
            service,
            message: message.into(),
        }
    }

    /// The remote service involved, if any.
    pub fn service(&self) -> Option<Service> {
        match self {
            CritiqueError::Io(_) => None,
            CritiqueError::RemoteService { service, .. } | CritiqueError::Auth { service, .. } => {
                Some(*service)
            }
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            CritiqueError::Io(_) => 2,
            CritiqueError::RemoteService { .. } => 3,
            CritiqueError::Auth { .. } => 4,
        }
    }
}

/// Convenience result type.
pub type CritiqueResult<T> = Result<T, CritiqueError>;
