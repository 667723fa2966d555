//! Tone valve: a three-level escalation gate on expressive behavior.
//!
//! Independent of the social stance — the stance says *how* the agent pushes
//! back, the valve says *how much* expression is allowed at all. Each level
//! maps to a fixed, enumerated constraint set; never free text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneLevel {
    Normal,
    Cold,
    Hostile,
}

/// Hard constraints attached to a tone level. Enumerated data consumed by
/// the profile compiler and the prompt assembler — the decision already
/// happened here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneConstraints {
    pub max_sentences: u8,
    pub apology_banned: bool,
    pub metaphor_banned: bool,
    pub emoji_banned: bool,
}

impl ToneLevel {
    /// Escalation rule. `offensiveness` is the raw 0–10 perception score;
    /// `resentment` and `laziness` are on `[0, 1]`.
    pub fn from_signals(offensiveness: u8, resentment: f32, laziness: f32) -> Self {
        if offensiveness > 6 || resentment > 0.8 {
            ToneLevel::Hostile
        } else if laziness > 0.6 || resentment > 0.4 {
            ToneLevel::Cold
        } else {
            ToneLevel::Normal
        }
    }

    /// The fixed constraint set for this level.
    pub fn constraints(&self) -> ToneConstraints {
        match self {
            ToneLevel::Normal => ToneConstraints {
                max_sentences: 5,
                apology_banned: false,
                metaphor_banned: false,
                emoji_banned: false,
            },
            ToneLevel::Cold => ToneConstraints {
                max_sentences: 3,
                apology_banned: false,
                metaphor_banned: true,
                emoji_banned: true,
            },
            ToneLevel::Hostile => ToneConstraints {
                max_sentences: 1,
                apology_banned: true,
                metaphor_banned: true,
                emoji_banned: true,
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
