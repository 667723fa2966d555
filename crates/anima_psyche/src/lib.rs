//! The cognitive state engines.
//!
//! Four coupled numeric models, each a pure function of (state, input,
//! elapsed time) → state:
//!
//! - [`emotion`] — Valence-Arousal-Resentment dynamics with soft boundaries,
//!   meltdown gating, and the apology valve
//! - [`intimacy`] — bounded closeness with diminishing returns and cooldowns
//! - [`personality`] — five-trait evolution with a lockable genesis snapshot
//! - [`biorhythm`] — circadian fatigue as a pure function of time-of-day
//!
//! Nothing here performs I/O, reads a clock, or holds a lock. Orchestration
//! and commit exclusivity live in `anima_reasoning`.

pub mod biorhythm;
pub mod emotion;
pub mod intimacy;
pub mod personality;

pub use biorhythm::BioRhythm;
pub use emotion::{EmotionEngine, EmotionState, EmotionStimulus};
pub use intimacy::{IntimacyEngine, IntimacyState};
pub use personality::{
    Feedback, GenesisTraits, PersonalityEngine, PersonalityState, TraitKind, TraitVector,
};
