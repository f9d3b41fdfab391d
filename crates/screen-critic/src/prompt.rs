//! Critic prompt construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Caption;

const CRITIC_PREFIX: &str = "Suppose you are an art critic and have a painting,";

/// Attitude the critic takes toward the painting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Negative,
    Neutral,
    Positive,
}

impl Tone {
    pub const ALL: [Tone; 3] = [Tone::Negative, Tone::Neutral, Tone::Positive];

    fn phrase(self) -> &'static str {
        match self {
            Tone::Negative => "a critical tone",
            Tone::Neutral => "an objective tone",
            Tone::Positive => "an appreciative tone",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Negative => "negative",
            Tone::Neutral => "neutral",
            Tone::Positive => "positive",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "negative" | "critical" => Ok(Tone::Negative),
            "neutral" => Ok(Tone::Neutral),
            "positive" => Ok(Tone::Positive),
            other => Err(format!(
                "unknown tone '{other}', expected negative, neutral or positive"
            )),
        }
    }
}

/// Build the instruction sent to the text generator.
///
/// The caption is embedded verbatim between the fixed prefix and the tone
/// instruction; it is never interpreted as a format string.
pub fn critique_prompt(caption: &Caption, tone: Tone) -> String {
    let caption = caption.as_str();
    let instruction = tone.phrase();
    let mut prompt =
        String::with_capacity(CRITIC_PREFIX.len() + caption.len() + instruction.len() + 64);
    prompt.push_str(CRITIC_PREFIX);
    prompt.push_str(caption);
    prompt.push_str(" Please comment in ");
    prompt.push_str(instruction);
    prompt.push_str(" and do not wrap the paragraph");
    prompt
}
