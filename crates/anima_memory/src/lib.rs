//! Persistence for agent state.
//!
//! The core only requires the [`AgentStore`] contract: load the persistent
//! aggregate, save it after a committed turn, and atomically destroy it (plus
//! dependent history) on factory reset. [`sqlite::SqliteStore`] is the
//! shipped implementation.

pub mod sqlite;

pub use sqlite::SqliteStore;

use anima_psyche::{EmotionState, IntimacyState, PersonalityState};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The persistent aggregate for one agent identity: everything the state
/// engines own, nothing more. Mutated exactly once per completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub emotion: EmotionState,
    pub personality: PersonalityState,
    pub intimacy: IntimacyState,
}

impl AgentRecord {
    /// Validate every invariant before a commit is allowed. Returns the
    /// first violated field so the rejection can be logged precisely.
    pub fn check_invariants(&self) -> Result<(), anima_core::CoreError> {
        use anima_core::CoreError::InvariantViolation;
        let checks: [(&'static str, f32, f32, f32); 8] = [
            ("valence", self.emotion.valence, -1.0, 1.0),
            ("arousal", self.emotion.arousal, 0.0, 1.0),
            ("resentment", self.emotion.resentment, 0.0, 1.0),
            ("intimacy", self.intimacy.intimacy, 0.0, 1.0),
            ("growth_coefficient", self.intimacy.growth_coefficient, 0.0, 1.0),
            ("plasticity", self.personality.plasticity, 0.0, 1.0),
            ("openness", self.personality.traits.openness, 0.0, 1.0),
            ("neuroticism", self.personality.traits.neuroticism, 0.0, 1.0),
        ];
        for (field, value, lo, hi) in checks {
            if !value.is_finite() || value < lo || value > hi {
                return Err(InvariantViolation { field, value });
            }
        }
        Ok(())
    }
}

/// One completed conversational turn, kept as dependent history. Cleared by
/// factory reset together with the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnLog {
    pub id: Uuid,
    pub author: String,
    pub message: String,
    pub reply: String,
    pub timestamp: i64,
}

#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Load the persisted aggregate, or `None` for an unknown agent.
    async fn load(&self, agent_id: &str) -> Result<Option<AgentRecord>>;

    /// Persist the aggregate after a committed turn.
    async fn save(&self, agent_id: &str, record: &AgentRecord) -> Result<()>;

    /// Append a completed turn to the agent's history.
    async fn append_turn(&self, agent_id: &str, turn: &TurnLog) -> Result<()>;

    /// Recent history, newest last.
    async fn recent_turns(&self, agent_id: &str, limit: u32) -> Result<Vec<TurnLog>>;

    /// Atomically clear the aggregate and all dependent history.
    async fn factory_reset(&self, agent_id: &str) -> Result<()>;
}
