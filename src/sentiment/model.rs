// src/sentiment/model.rs
//! The model seam. The pipeline treats sentiment inference as a black box
//! `sentence -> probability of positive sentiment in [0,1]`; the bundled
//! lexicon model keeps the crate self-contained, and a transformer-backed
//! implementation can slot in behind the same trait.

use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

pub trait SentimentModel: Send + Sync {
    /// Probability of positive sentiment for one sentence, in [0,1].
    fn score_sentence(&self, sentence: &str) -> Result<f64>;
}

/// Lexicon scorer with short-range negation. Signed word scores are
/// averaged over the token count and squashed into [0,1] around a neutral
/// 0.5.
#[derive(Debug, Clone, Default)]
pub struct LexiconModel;

impl LexiconModel {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }
}

impl SentimentModel for LexiconModel {
    fn score_sentence(&self, sentence: &str) -> Result<f64> {
        let tokens: Vec<String> = tokenize(sentence).collect();
        if tokens.is_empty() {
            return Ok(0.5);
        }

        let mut signed: i64 = 0;
        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            // A negator within the last 1..=3 tokens flips the sign.
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            signed += if negated { -base } else { base } as i64;
        }

        let norm = signed as f64 / tokens.len() as f64;
        Ok((0.5 + norm * 0.25).clamp(0.0, 1.0))
    }
}

/// Alphanumeric tokens, lower-case.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn is_negator(tok: &str) -> bool {
    // Contraction stems ("isn't" tokenizes to "isn", "t").
    matches!(
        tok,
        "not" | "no" | "never" | "isn" | "wasn" | "aren" | "doesn" | "didn" | "don" | "cannot"
            | "without"
    )
}
