//! Perception contract: the structured record the cognitive core consumes.
//!
//! The producer is opaque — rule-based or model-based — and the core never
//! inspects raw message text past this boundary. A keyword-based
//! `LexicalPerception` ships as the default producer and as the test double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// What the speaker seems to want from this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedKind {
    Chitchat,
    Comfort,
    Vent,
    Info,
    Humor,
}

impl NeedKind {
    /// Needs that cost extra patience when fatigued.
    pub fn is_demanding(&self) -> bool {
        matches!(self, NeedKind::Comfort | NeedKind::Vent)
    }
}

/// Discrete relational events detected in the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialEvent {
    Apology,
    Insult,
    Praise,
    SelfDisclosure,
    CrisisSignal,
    TopicRepeat,
}

/// The structured perception of one inbound message.
///
/// `offensiveness` is the only 0–10 quantity in the system; every internal
/// formula works on `[0, 1]` and converts through [`PerceptionRecord::severity`]
/// exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionRecord {
    /// 0 (benign) ..= 10 (maximally hostile).
    pub offensiveness: u8,
    pub underlying_need: NeedKind,
    pub surface_valence: f32,
    pub surface_arousal: f32,
    pub social_events: Vec<SocialEvent>,
    /// Producer confidence in this record, 0.0 ..= 1.0.
    pub confidence: f32,
}

impl PerceptionRecord {
    /// Conservative fallback used when the producer fails or returns
    /// malformed fields. Never blocks the turn.
    pub fn conservative() -> Self {
        Self {
            offensiveness: 0,
            underlying_need: NeedKind::Chitchat,
            surface_valence: 0.0,
            surface_arousal: 0.0,
            social_events: Vec::new(),
            confidence: 0.0,
        }
    }

    /// Normalized hostility severity on the `[0, 1]` scale.
    pub fn severity(&self) -> f32 {
        f32::from(self.offensiveness.min(10)) / 10.0
    }

    pub fn has_event(&self, event: SocialEvent) -> bool {
        self.social_events.contains(&event)
    }

    pub fn is_crisis(&self) -> bool {
        self.has_event(SocialEvent::CrisisSignal)
    }

    /// Clamp every field into its documented range. Producers are opaque;
    /// their output is not trusted.
    pub fn normalize(mut self) -> Self {
        self.offensiveness = self.offensiveness.min(10);
        self.surface_valence = crate::sanitize_f32(self.surface_valence, 0.0).clamp(-1.0, 1.0);
        self.surface_arousal = crate::sanitize_f32(self.surface_arousal, 0.0).clamp(0.0, 1.0);
        self.confidence = crate::sanitize_f32(self.confidence, 0.0).clamp(0.0, 1.0);
        self.social_events.dedup();
        self
    }
}

/// Opaque producer of perception records.
#[async_trait]
pub trait PerceptionProvider: Send + Sync {
    async fn classify(&self, text: &str) -> Result<PerceptionRecord, CoreError>;
}

// ============================================================================
// Default rule-based producer
// ============================================================================

const POSITIVE: &[&str] = &[
    "thanks", "thank you", "love", "great", "awesome", "happy", "glad", "nice", "haha", ":)",
];

const NEGATIVE: &[&str] = &[
    "hate", "awful", "terrible", "annoying", "angry", "sad", "stupid", "worst", ":(",
];

const INSULTS: &[&str] = &["idiot", "useless", "shut up", "stupid", "pathetic", "worthless"];

const APOLOGIES: &[&str] = &["sorry", "i apologize", "my bad", "forgive me", "didn't mean"];

const PRAISE: &[&str] = &["well done", "proud of you", "you're amazing", "brilliant", "impressive"];

const CRISIS: &[&str] = &[
    "kill myself",
    "end it all",
    "want to die",
    "hurt myself",
    "no reason to live",
];

const COMFORT_CUES: &[&str] = &["i feel", "i'm struggling", "comfort", "lonely", "miss you"];

const VENT_CUES: &[&str] = &["so frustrated", "fed up", "can't stand", "sick of", "ugh"];

/// Keyword-based default classifier. In production this is replaced by a
/// model-backed producer behind the same trait.
#[derive(Debug, Clone, Default)]
pub struct LexicalPerception;

impl LexicalPerception {
    pub fn classify_text(&self, text: &str) -> PerceptionRecord {
        let lower = text.to_lowercase();

        let pos = POSITIVE.iter().filter(|w| lower.contains(*w)).count() as f32;
        let neg = NEGATIVE.iter().filter(|w| lower.contains(*w)).count() as f32;
        let insult_hits = INSULTS.iter().filter(|w| lower.contains(*w)).count() as u8;

        let surface_valence = (pos - neg) / (pos + neg + 1.0);
        let exclaims = lower.matches('!').count() as f32;
        let surface_arousal = ((pos + neg + exclaims) / 5.0).clamp(0.0, 1.0);

        let mut social_events = Vec::new();
        if APOLOGIES.iter().any(|w| lower.contains(*w)) {
            social_events.push(SocialEvent::Apology);
        }
        if insult_hits > 0 {
            social_events.push(SocialEvent::Insult);
        }
        if PRAISE.iter().any(|w| lower.contains(*w)) {
            social_events.push(SocialEvent::Praise);
        }
        if CRISIS.iter().any(|w| lower.contains(*w)) {
            social_events.push(SocialEvent::CrisisSignal);
        }

        // Insults carry a floor of 4; each extra hit and exclamation escalates
        let offensiveness = if insult_hits > 0 {
            (3 + insult_hits * 2 + exclaims.min(2.0) as u8).min(10)
        } else if neg >= 2.0 {
            3
        } else {
            0
        };

        let underlying_need = if COMFORT_CUES.iter().any(|w| lower.contains(*w)) {
            NeedKind::Comfort
        } else if VENT_CUES.iter().any(|w| lower.contains(*w)) {
            NeedKind::Vent
        } else if lower.contains('?') {
            NeedKind::Info
        } else {
            NeedKind::Chitchat
        };

        PerceptionRecord {
            offensiveness,
            underlying_need,
            surface_valence,
            surface_arousal,
            social_events,
            confidence: 0.6,
        }
        .normalize()
    }
}

#[async_trait]
impl PerceptionProvider for LexicalPerception {
    async fn classify(&self, text: &str) -> Result<PerceptionRecord, CoreError> {
        Ok(self.classify_text(text))
    }
}

// ============================================================================
// Tests
// ============================================================================
