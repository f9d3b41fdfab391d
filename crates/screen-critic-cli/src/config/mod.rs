//! Configuration loading and resolution.
//!
//! Each setting resolves as: explicit flag, then environment (including a
//! `.env` file, which never overrides variables already set), then default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde_json::{json, Value};

use screen_critic::{
    Tone, DEFAULT_CAPTION_MODEL, DEFAULT_CHAT_MODEL, DEFAULT_OPENAI_URL, DEFAULT_REPLICATE_URL,
};

pub const ENV_REPLICATE_TOKEN: &str = "REPLICATE_API_TOKEN";
pub const ENV_OPENAI_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ASSETS_DIR: &str = "SCREEN_CRITIC_ASSETS_DIR";
pub const ENV_IMAGE: &str = "SCREEN_CRITIC_IMAGE";
pub const ENV_OUTPUT: &str = "SCREEN_CRITIC_OUTPUT";
pub const ENV_MODEL: &str = "SCREEN_CRITIC_MODEL";
pub const ENV_CAPTION_MODEL: &str = "SCREEN_CRITIC_CAPTION_MODEL";
pub const ENV_TONE: &str = "SCREEN_CRITIC_TONE";
pub const ENV_TIMEOUT_SECS: &str = "SCREEN_CRITIC_TIMEOUT_SECS";
pub const ENV_MAX_IMAGE_DIM: &str = "SCREEN_CRITIC_MAX_IMAGE_DIM";
pub const ENV_OPENAI_URL: &str = "OPENAI_BASE_URL";
pub const ENV_REPLICATE_URL: &str = "REPLICATE_BASE_URL";

/// Screenshot name the engine writes into its assets directory.
pub const DEFAULT_IMAGE_NAME: &str = "CameraScreenshot.png";
/// Review location the engine reads, relative to its assets directory.
pub const DEFAULT_OUTPUT_NAME: &str = "Python/ReplyText.txt";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub assets_dir: Option<PathBuf>,
    pub image: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub tone: Option<Tone>,
    pub model: Option<String>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub image_path: PathBuf,
    pub output_path: PathBuf,
    pub tone: Tone,
    pub chat_model: String,
    pub caption_model: String,
    pub replicate_token: Option<String>,
    pub openai_key: Option<String>,
    pub replicate_url: String,
    pub openai_url: String,
    pub timeout: Duration,
    pub max_image_dim: Option<u32>,
}

impl Settings {
    /// Resolve from overrides and the process environment.
    pub fn resolve(overrides: &Overrides) -> anyhow::Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` in place of the process environment.
    pub fn resolve_with<F>(overrides: &Overrides, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let assets_dir = overrides
            .assets_dir
            .clone()
            .or_else(|| env(ENV_ASSETS_DIR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let image_path = overrides
            .image
            .clone()
            .or_else(|| env(ENV_IMAGE).map(PathBuf::from))
            .unwrap_or_else(|| assets_dir.join(DEFAULT_IMAGE_NAME));

        let output_path = overrides
            .output
            .clone()
            .or_else(|| env(ENV_OUTPUT).map(PathBuf::from))
            .unwrap_or_else(|| assets_dir.join(DEFAULT_OUTPUT_NAME));

        let tone = match overrides.tone {
            Some(tone) => tone,
            None => match env(ENV_TONE) {
                Some(raw) => raw
                    .parse::<Tone>()
                    .map_err(|e| anyhow!("{ENV_TONE}: {e}"))?,
                None => Tone::default(),
            },
        };

        let timeout_secs = match env(ENV_TIMEOUT_SECS) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(anyhow!("{ENV_TIMEOUT_SECS} must be greater than zero"));
        }

        let max_image_dim = env(ENV_MAX_IMAGE_DIM)
            .map(|raw| {
                raw.trim()
                    .parse::<u32>()
                    .with_context(|| format!("{ENV_MAX_IMAGE_DIM} must be a pixel count"))
            })
            .transpose()?
            .filter(|dim| *dim > 0);

        Ok(Self {
            image_path,
            output_path,
            tone,
            chat_model: overrides
                .model
                .clone()
                .or_else(|| env(ENV_MODEL))
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            caption_model: env(ENV_CAPTION_MODEL)
                .unwrap_or_else(|| DEFAULT_CAPTION_MODEL.to_string()),
            replicate_token: env(ENV_REPLICATE_TOKEN),
            openai_key: env(ENV_OPENAI_KEY),
            replicate_url: env(ENV_REPLICATE_URL)
                .unwrap_or_else(|| DEFAULT_REPLICATE_URL.to_string()),
            openai_url: env(ENV_OPENAI_URL).unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            max_image_dim,
        })
    }

    /// Configuration as JSON with credentials masked.
    pub fn redacted_json(&self) -> Value {
        let mut credentials = serde_json::Map::new();
        credentials.insert(
            ENV_REPLICATE_TOKEN.to_string(),
            redact(self.replicate_token.as_deref()),
        );
        credentials.insert(ENV_OPENAI_KEY.to_string(), redact(self.openai_key.as_deref()));

        json!({
            "image_path": self.image_path.display().to_string(),
            "output_path": self.output_path.display().to_string(),
            "tone": self.tone,
            "chat_model": self.chat_model,
            "caption_model": self.caption_model,
            "replicate_url": self.replicate_url,
            "openai_url": self.openai_url,
            "timeout_secs": self.timeout.as_secs(),
            "max_image_dim": self.max_image_dim,
            "credentials": credentials,
        })
    }
}

/// Load a `.env` file from the working directory or its parents, if any.
///
/// Must run before the tracing subscriber is built so `RUST_LOG` from the
/// file is honoured.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    found_or_none(dotenvy::dotenv())
}

/// Load a specific `.env` file. A missing file is not an error.
pub fn load_dotenv_from(path: &Path) -> Result<Option<PathBuf>, dotenvy::Error> {
    found_or_none(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

fn found_or_none(
    result: Result<PathBuf, dotenvy::Error>,
) -> Result<Option<PathBuf>, dotenvy::Error> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn redact(secret: Option<&str>) -> Value {
    match secret {
        None => Value::Null,
        Some(s) if s.len() <= 8 => json!("****"),
        Some(s) => json!(format!("{}****", s.chars().take(4).collect::<String>())),
    }
}
