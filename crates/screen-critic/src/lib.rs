//! ScreenCritic — caption a screenshot, then have a language model review it as a painting.

pub mod capture;
pub mod captioner;
pub mod generator;
pub mod http;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod types;

pub use capture::{detect_mime, is_supported_format, ImagePayload};
pub use captioner::{ImageCaptioner, ReplicateCaptioner, DEFAULT_CAPTION_MODEL, DEFAULT_REPLICATE_URL};
pub use generator::{
    ChatMessage, OpenAiChatGenerator, TextGenerator, DEFAULT_CHAT_MODEL, DEFAULT_OPENAI_URL,
};
pub use output::OutputFile;
pub use pipeline::CritiquePipeline;
pub use prompt::{critique_prompt, Tone};
pub use types::*;
