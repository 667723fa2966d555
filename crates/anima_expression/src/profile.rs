//! Expression profile compiler: personality + relationship + grudge → a
//! bounded set of numeric generation constraints. Deterministic, no
//! randomness, computed fresh every turn and never mutated in place.
//!
//! Override precedence: safety > hostility > normal. The crisis override is
//! handled upstream (it bypasses this module entirely); hostility and
//! meltdown collapse the profile to its most restrictive form here.

use crate::valve::ToneLevel;
use anima_psyche::TraitVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpressionProfile {
    /// 1 ..= 5.
    pub max_sentences: u8,
    /// 0.0 ..= 1.0.
    pub metaphor_density: f32,
    /// 0.0 ..= 1.0. How much inner state bleeds into word choice.
    pub emotional_leakage: f32,
    pub initiative_allowed: bool,
    pub emoji_allowed: bool,
    pub playful_allowed: bool,
    pub roleplay_allowed: bool,
}

impl ExpressionProfile {
    /// The floor every escalated state collapses to: one flat sentence,
    /// nothing expressive.
    pub fn restrictive() -> Self {
        Self {
            max_sentences: 1,
            metaphor_density: 0.0,
            emotional_leakage: 0.0,
            initiative_allowed: false,
            emoji_allowed: false,
            playful_allowed: false,
            roleplay_allowed: false,
        }
    }
}

/// Intimacy below this reads as "distant": imagery stays guarded.
const DISTANT_THRESHOLD: f32 = 0.3;

/// Compile the profile for one turn from the fatigue-adjusted traits, the
/// relationship state, the current grudge, the tone valve level, and whether
/// the emotion engine is in meltdown.
pub fn compile(
    effective: &TraitVector,
    intimacy: f32,
    resentment: f32,
    tone: ToneLevel,
    meltdown: bool,
) -> ExpressionProfile {
    if meltdown || tone == ToneLevel::Hostile {
        tracing::debug!(?tone, meltdown, "expression collapsed to restrictive profile");
        return ExpressionProfile::restrictive();
    }

    let i = intimacy.clamp(0.0, 1.0);
    let r = resentment.clamp(0.0, 1.0);
    let constraints = tone.constraints();

    let trait_sentences = (effective.extraversion * 3.0 + 1.0).round().clamp(1.0, 5.0) as u8;
    let max_sentences = trait_sentences.min(constraints.max_sentences).max(1);

    let distant = i < DISTANT_THRESHOLD;
    let metaphor_density = if constraints.metaphor_banned {
        0.0
    } else {
        effective.openness * if distant { 0.3 } else { 0.8 }
    };

    let emotional_leakage = (effective.neuroticism * 0.6 + r * 0.4).clamp(0.0, 1.0);

    ExpressionProfile {
        max_sentences,
        metaphor_density: metaphor_density.clamp(0.0, 1.0),
        emotional_leakage,
        initiative_allowed: effective.extraversion > 0.4 && i > 0.2,
        emoji_allowed: !constraints.emoji_banned && i > 0.3,
        playful_allowed: tone == ToneLevel::Normal && effective.openness > 0.4 && r < 0.4,
        roleplay_allowed: tone == ToneLevel::Normal && i > 0.5 && r < 0.3,
    }
}

// ============================================================================
// Tests
// ============================================================================
