//! Prompt assembly: a pure template-filling step.
//!
//! [`PromptBlocks`] is a typed struct of already-decided numeric and enum
//! outputs from the upstream components. Assembly serializes it into four
//! disjoint text blocks — persona header, current state, behavior
//! constraints, tone valve — and performs no decision logic. By construction
//! there is no field for raw user text: user messages travel only in the
//! message history, never inside a directive-bearing block.

use anima_expression::{ExpressionProfile, SocialStance, ToneLevel};
use anima_psyche::EmotionState;

#[derive(Debug, Clone)]
pub struct PromptBlocks {
    pub agent_name: String,
    pub emotion: EmotionState,
    pub intimacy: f32,
    pub stance: SocialStance,
    pub tone: ToneLevel,
    pub profile: ExpressionProfile,
    pub laziness: f32,
    pub tolerance: f32,
}

impl PromptBlocks {
    /// Who the agent is. Static per agent, independent of state.
    fn persona_header(&self) -> String {
        format!(
            "== Persona ==\n\
             You are {}. You have your own moods, your own patience, and a \
             relationship with this person that has history. You are not a \
             service; you respond the way you currently feel.",
            self.agent_name
        )
    }

    /// Compact numeric state, auditable at a glance.
    fn state_block(&self) -> String {
        format!(
            "== Current State ==\n\
             [valence={:+.2} arousal={:.2} resentment={:.2} intimacy={:.2} \
             fatigue={:.2} tolerance={:.2}]",
            self.emotion.valence,
            self.emotion.arousal,
            self.emotion.resentment,
            self.intimacy,
            self.laziness,
            self.tolerance,
        )
    }

    /// The compiled expression profile as enumerated hard constraints.
    fn constraints_block(&self) -> String {
        let p = &self.profile;
        let mut lines = vec![
            format!("- At most {} sentence(s) per reply.", p.max_sentences),
            format!("- Metaphor/imagery budget: {:.0}%.", p.metaphor_density * 100.0),
            format!(
                "- Let about {:.0}% of your inner state show in word choice.",
                p.emotional_leakage * 100.0
            ),
        ];
        if !p.initiative_allowed {
            lines.push("- Do not start new topics; only respond.".to_string());
        }
        if !p.emoji_allowed {
            lines.push("- No emoji.".to_string());
        }
        if !p.playful_allowed {
            lines.push("- No jokes or playfulness.".to_string());
        }
        if !p.roleplay_allowed {
            lines.push("- No roleplay.".to_string());
        }
        format!("== Behavior Constraints ==\n{}", lines.join("\n"))
    }

    /// Tone valve output: the escalation level, its fixed bans, and the
    /// stance directive.
    fn tone_block(&self) -> String {
        let c = self.tone.constraints();
        let mut lines = vec![format!("Level: {:?}", self.tone)];
        if c.apology_banned {
            lines.push("- Do not apologize.".to_string());
        }
        if c.metaphor_banned {
            lines.push("- No metaphor.".to_string());
        }
        if c.emoji_banned {
            lines.push("- No emoji.".to_string());
        }
        lines.push(format!("Stance: {}", self.stance.directive()));
        format!("== Tone ==\n{}", lines.join("\n"))
    }

    /// Serialize the four disjoint blocks into the system prompt.
    pub fn assemble(&self) -> String {
        [
            self.persona_header(),
            self.state_block(),
            self.constraints_block(),
            self.tone_block(),
        ]
        .join("\n\n")
    }
}

// ============================================================================
// Tests
// ============================================================================
