//! Rule-based intent recognition over the pattern library.

use crate::models::Intent;
use crate::services::nlu::patterns::PatternLibrary;

/// Score an utterance against every intent's pattern set.
///
/// Each matching pattern contributes a position-weighted score: 1.0 when the
/// match starts within the first 30% of the utterance, 0.7 otherwise. The
/// per-intent score is normalized by pattern count, multiplied by the number
/// of distinct patterns matched, and capped at 1.0. Scores below 0.3 are
/// treated as no recognition. Ties keep the first-declared intent.
pub fn recognize_intent(utterance: &str) -> (Intent, f32) {
    let text = utterance.trim().to_lowercase();
    if text.is_empty() {
        return (Intent::Unknown, 0.0);
    }

    let early_cutoff = text.len() as f32 * 0.3;
    let mut best: Option<(Intent, f32)> = None;

    for (intent, patterns) in PatternLibrary::global().intents() {
        let mut score = 0.0_f32;
        let mut matched = 0_usize;

        for pattern in patterns {
            if let Some(m) = pattern.find(&text) {
                matched += 1;
                score += if (m.start() as f32) < early_cutoff { 1.0 } else { 0.7 };
            }
        }

        if matched > 0 {
            let normalized = (score / patterns.len() as f32 * matched as f32).min(1.0);
            if best.map_or(true, |(_, b)| normalized > b) {
                best = Some((*intent, normalized));
            }
        }
    }

    match best {
        Some((intent, confidence)) if confidence >= 0.3 => {
            tracing::debug!(intent = intent.as_str(), confidence, "recognized intent");
            (intent, confidence)
        }
        _ => {
            tracing::debug!(utterance = %text, "no intent recognized");
            (Intent::Unknown, 0.0)
        }
    }
}
