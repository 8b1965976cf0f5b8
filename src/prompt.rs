//! Prompt construction for cover generation.
//!
//! Every request gets one randomly chosen style, one modifier and a short
//! seed, so the same description produces visibly different covers.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::constants::{MODIFIERS, OBJECT_KEY_PREFIX, STYLES};

const SEED_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SEED_LENGTH: usize = 8;
const KEY_RANDOM_LENGTH: usize = 13;

fn random_lowercase(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .filter_map(|_| SEED_CHARS.choose(&mut rng))
        .map(|byte| char::from(*byte))
        .collect()
}

/// Returns an 8 character lowercase alphanumeric seed.
pub fn random_seed() -> String {
    random_lowercase(SEED_LENGTH)
}

/// A fully rendered prompt along with the pieces that went into it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptParts {
    /// What the user typed, trimmed
    pub description: String,
    /// Chosen style word
    pub style: String,
    /// Chosen modifier word
    pub modifier: String,
    /// Random seed text
    pub seed: String,
    /// The prompt sent to the model
    pub prompt: String,
}

impl PromptParts {
    /// Renders a prompt from explicit parts.
    pub fn new(description: &str, style: &str, modifier: &str, seed: &str) -> Self {
        let description = description.trim().to_string();
        let prompt = format!(
            "生成一个{modifier}的{description}的微信红包封面，使用{style}，随机种子:{seed}"
        );
        Self {
            description,
            style: style.to_string(),
            modifier: modifier.to_string(),
            seed: seed.to_string(),
            prompt,
        }
    }

    /// Picks a random style, modifier and seed for `description`.
    pub fn random(description: &str) -> Self {
        let mut rng = rand::rng();
        let style = STYLES.choose(&mut rng).copied().unwrap_or(STYLES[0]);
        let modifier = MODIFIERS.choose(&mut rng).copied().unwrap_or(MODIFIERS[0]);
        Self::new(description, style, modifier, &random_seed())
    }

    /// JSON text stored in the `llm_params` column.
    pub fn llm_params(&self) -> String {
        json!({
            "prompt": self.prompt,
            "style": self.style,
            "modifier": self.modifier,
            "seed": self.seed,
        })
        .to_string()
    }
}

/// Storage key for a generated cover.
///
/// Non-ASCII-alphanumeric characters are dropped from the style, so Chinese
/// style words leave an empty segment.
pub fn object_key(timestamp_ms: i64, random: &str, style: &str) -> String {
    let style: String = style.chars().filter(char::is_ascii_alphanumeric).collect();
    format!("{OBJECT_KEY_PREFIX}/{timestamp_ms}-{random}-{style}.png")
}

/// A fresh storage key for right now.
pub fn new_object_key(style: &str) -> String {
    object_key(
        chrono::Utc::now().timestamp_millis(),
        &random_lowercase(KEY_RANDOM_LENGTH),
        style,
    )
}
