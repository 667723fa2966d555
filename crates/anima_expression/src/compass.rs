//! Reaction compass: maps perceived hostility onto a social stance through
//! two derived axes — Dominance (will to push back) and Heat (emotional
//! temperature). Stateless; recomputed every turn, never cached.

use anima_psyche::{EmotionState, TraitVector};
use serde::{Deserialize, Serialize};

/// The discrete social stances. Derived, never persisted as authoritative
/// state — always recomputed from current Dominance/Heat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialStance {
    Explosive,
    ColdDismissal,
    Vulnerable,
    Withdrawal,
    Neutral,
}

impl SocialStance {
    /// Behavior hint serialized into the prompt's tone block.
    pub fn directive(&self) -> &'static str {
        match self {
            SocialStance::Explosive => "Push back hard. Short, heated, unapologetic.",
            SocialStance::ColdDismissal => "Disengage with clipped, flat replies. No warmth.",
            SocialStance::Vulnerable => "Hurt shows through. Honest about it, not dramatic.",
            SocialStance::Withdrawal => "Pull back. Minimal, quiet responses.",
            SocialStance::Neutral => "Respond naturally.",
        }
    }
}

/// One turn's compass reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompassReading {
    pub dominance: f32,
    pub heat: f32,
    pub stance: SocialStance,
}

/// Offensiveness (raw 0–10) below which no stance evaluation happens.
const STANCE_THRESHOLD: u8 = 3;

/// Compute the compass from effective traits, current emotion, intimacy and
/// the perceived offensiveness. Identical inputs always produce identical
/// output.
pub fn read(
    traits: &TraitVector,
    emotion: &EmotionState,
    intimacy: f32,
    offensiveness: u8,
) -> CompassReading {
    let i = intimacy.clamp(0.0, 1.0);

    let dominance = (1.0 - traits.agreeableness) * 0.4
        + traits.extraversion * 0.2
        + (1.0 - i) * 0.3
        + emotion.resentment * 0.5;
    let heat = traits.neuroticism * 0.6 + emotion.arousal * 0.4;

    // Below the threshold the hostility machinery stays out of the loop.
    let stance = if offensiveness < STANCE_THRESHOLD {
        SocialStance::Neutral
    } else {
        match (dominance > 0.5, heat > 0.5) {
            (true, true) => SocialStance::Explosive,
            (true, false) => SocialStance::ColdDismissal,
            (false, true) => SocialStance::Vulnerable,
            (false, false) => SocialStance::Withdrawal,
        }
    };

    CompassReading {
        dominance,
        heat,
        stance,
    }
}

// ============================================================================
// Tests
// ============================================================================
