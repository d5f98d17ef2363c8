// ABOUTME: Sentiment reactor: scores text with a small valence lexicon
// ABOUTME: Lexicon scoring with negation, intensifiers and exclamation emphasis, normalized to [-1, 1]

use anyhow::Result;
use async_trait::async_trait;

use crate::commands::strip_command;
use crate::event::{Event, EventType, Response};
use crate::traits::Reactor;

const COMMAND: &str = "sentiment";

/// Compound scores at or beyond these bounds are positive / negative.
const POSITIVE_THRESHOLD: f64 = 0.05;
const NEGATIVE_THRESHOLD: f64 = -0.05;

/// Normalization constant: compound = sum / sqrt(sum^2 + ALPHA).
const ALPHA: f64 = 15.0;
const NEGATION_SCALAR: f64 = -0.74;
const BOOST: f64 = 0.293;
const EXCLAMATION_BOOST: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
/// How many preceding words can negate or intensify a lexicon word.
const LOOKBACK: usize = 3;

const LEXICON: &[(&str, f64)] = &[
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("beautiful", 2.9),
    ("best", 3.2),
    ("better", 1.9),
    ("brilliant", 2.8),
    ("calm", 1.3),
    ("cool", 1.3),
    ("delight", 2.9),
    ("delightful", 2.9),
    ("enjoy", 2.2),
    ("excellent", 2.7),
    ("excited", 1.4),
    ("fantastic", 2.6),
    ("fine", 0.8),
    ("fun", 2.3),
    ("glad", 2.0),
    ("good", 1.9),
    ("great", 3.1),
    ("happy", 2.7),
    ("helpful", 1.8),
    ("hope", 1.9),
    ("kind", 2.4),
    ("like", 1.5),
    ("love", 3.2),
    ("lovely", 2.8),
    ("nice", 1.8),
    ("perfect", 2.7),
    ("pleasant", 2.3),
    ("proud", 2.1),
    ("thanks", 1.9),
    ("thank", 1.5),
    ("win", 2.8),
    ("wonderful", 2.7),
    ("yay", 2.4),
    ("angry", -2.3),
    ("annoying", -1.7),
    ("awful", -2.0),
    ("bad", -2.5),
    ("boring", -1.3),
    ("broken", -1.4),
    ("cry", -2.1),
    ("disappointed", -1.9),
    ("disgusting", -2.4),
    ("dislike", -1.6),
    ("fail", -2.5),
    ("failure", -2.3),
    ("hate", -2.7),
    ("horrible", -2.5),
    ("hurt", -2.4),
    ("lonely", -1.5),
    ("lose", -1.6),
    ("mad", -2.2),
    ("miserable", -2.8),
    ("pain", -2.3),
    ("poor", -2.1),
    ("sad", -2.1),
    ("scared", -1.9),
    ("sick", -2.3),
    ("sorry", -0.3),
    ("stupid", -2.4),
    ("terrible", -2.1),
    ("ugly", -2.3),
    ("upset", -1.6),
    ("worse", -2.1),
    ("worst", -3.1),
    ("wrong", -2.1),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "nothing", "nobody", "neither", "nor", "none", "isn't", "isnt",
    "aren't", "arent", "wasn't", "wasnt", "don't", "dont", "doesn't", "doesnt", "didn't",
    "didnt", "can't", "cant", "won't", "wont", "without",
];

const INCREMENTS: &[&str] = &[
    "very", "really", "extremely", "so", "incredibly", "absolutely", "totally", "super", "most",
];

const DECREMENTS: &[&str] = &["slightly", "somewhat", "barely", "kinda", "little", "hardly"];

/// Polarity summary for one piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    /// Normalized score in [-1, 1].
    pub compound: f64,
}

impl SentimentScore {
    pub fn label(&self) -> &'static str {
        if self.compound >= POSITIVE_THRESHOLD {
            "positive"
        } else if self.compound <= NEGATIVE_THRESHOLD {
            "negative"
        } else {
            "neutral"
        }
    }
}

fn valence(word: &str) -> Option<f64> {
    LEXICON.iter().find(|(w, _)| *w == word).map(|(_, v)| *v)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

pub fn polarity(text: &str) -> SentimentScore {
    let tokens = tokenize(text);
    let mut sum = 0.0;

    for (i, token) in tokens.iter().enumerate() {
        let Some(mut score) = valence(token) else {
            continue;
        };

        let start = i.saturating_sub(LOOKBACK);
        let preceding = &tokens[start..i];

        // Intensifier directly before the word
        if let Some(prev) = preceding.last() {
            let prev = prev.as_str();
            if INCREMENTS.contains(&prev) {
                score += BOOST * score.signum();
            } else if DECREMENTS.contains(&prev) {
                score -= BOOST * score.signum();
            }
        }

        if preceding.iter().any(|w| NEGATIONS.contains(&w.as_str())) {
            score *= NEGATION_SCALAR;
        }

        sum += score;
    }

    if sum != 0.0 {
        let exclamations = text.matches('!').count().min(MAX_EXCLAMATIONS) as f64;
        sum += exclamations * EXCLAMATION_BOOST * sum.signum();
    }

    let compound = if sum == 0.0 {
        0.0
    } else {
        (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0)
    };

    SentimentScore { compound }
}

pub struct SentimentReactor {
    wake_word: String,
}

impl SentimentReactor {
    pub fn new(wake_word: impl Into<String>) -> Self {
        Self {
            wake_word: wake_word.into(),
        }
    }
}

#[async_trait]
impl Reactor for SentimentReactor {
    fn name(&self) -> &str {
        COMMAND
    }

    fn can_handle(&self, event: &Event) -> bool {
        event.event_type() == EventType::Message
            && strip_command(event.content(), &self.wake_word, COMMAND).is_some()
    }

    async fn handle(&self, event: &Event) -> Result<Option<Response>> {
        let text = strip_command(event.content(), &self.wake_word, COMMAND).unwrap_or_default();
        let score = polarity(text);
        let reply = format!(
            "The sentiment of '{}' is {} (score: {:.2})",
            text,
            score.label(),
            score.compound
        );
        Ok(Some(Response::reply_to(event, reply)))
    }
}
