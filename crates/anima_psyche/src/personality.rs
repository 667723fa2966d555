//! Personality: five-trait vector with a one-time lockable genesis snapshot,
//! feedback-driven evolution, plasticity that hardens with experience, and a
//! read-only fatigue-suppressed view for downstream consumers.

use anima_core::config::{AgentSeed, PersonalityConfig};
use anima_core::{deserialize_safe_f32, sanitize_f32, CoreError};
use serde::{Deserialize, Serialize};

/// The five-factor trait vector. Every component lives in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitVector {
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub openness: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub conscientiousness: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub extraversion: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub agreeableness: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub neuroticism: f32,
}

impl TraitVector {
    pub fn normalize(&mut self) {
        self.openness = sanitize_f32(self.openness, 0.5).clamp(0.0, 1.0);
        self.conscientiousness = sanitize_f32(self.conscientiousness, 0.5).clamp(0.0, 1.0);
        self.extraversion = sanitize_f32(self.extraversion, 0.5).clamp(0.0, 1.0);
        self.agreeableness = sanitize_f32(self.agreeableness, 0.5).clamp(0.0, 1.0);
        self.neuroticism = sanitize_f32(self.neuroticism, 0.5).clamp(0.0, 1.0);
    }

    fn get(&self, kind: TraitKind) -> f32 {
        match kind {
            TraitKind::Openness => self.openness,
            TraitKind::Conscientiousness => self.conscientiousness,
            TraitKind::Extraversion => self.extraversion,
            TraitKind::Agreeableness => self.agreeableness,
            TraitKind::Neuroticism => self.neuroticism,
        }
    }

    fn set(&mut self, kind: TraitKind, value: f32) {
        let v = sanitize_f32(value, 0.5).clamp(0.0, 1.0);
        match kind {
            TraitKind::Openness => self.openness = v,
            TraitKind::Conscientiousness => self.conscientiousness = v,
            TraitKind::Extraversion => self.extraversion = v,
            TraitKind::Agreeableness => self.agreeableness = v,
            TraitKind::Neuroticism => self.neuroticism = v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    Openness,
    Conscientiousness,
    Extraversion,
    Agreeableness,
    Neuroticism,
}

impl TraitKind {
    pub const ALL: [TraitKind; 5] = [
        TraitKind::Openness,
        TraitKind::Conscientiousness,
        TraitKind::Extraversion,
        TraitKind::Agreeableness,
        TraitKind::Neuroticism,
    ];
}

/// Immutable snapshot of the traits at first configuration. Once captured it
/// is only ever read, as the comparison/decay baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenesisTraits {
    pub traits: TraitVector,
    pub locked_at: i64,
}

/// The evolving personality aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityState {
    pub traits: TraitVector,
    /// Willingness to change, 0.0 ..= 1.0. Effective plasticity additionally
    /// decays with `total_interactions`.
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub plasticity: f32,
    pub total_interactions: u64,
    pub genesis: Option<GenesisTraits>,
}

impl PersonalityState {
    /// Seed a fresh personality from configuration. Genesis is not yet
    /// locked: direct edits remain possible until `lock_genesis`.
    pub fn from_seed(seed: &AgentSeed) -> Self {
        let mut traits = TraitVector {
            openness: seed.openness,
            conscientiousness: seed.conscientiousness,
            extraversion: seed.extraversion,
            agreeableness: seed.agreeableness,
            neuroticism: seed.neuroticism,
        };
        traits.normalize();
        Self {
            traits,
            plasticity: seed.plasticity.clamp(0.0, 1.0),
            total_interactions: 0,
            genesis: None,
        }
    }

    pub fn genesis_locked(&self) -> bool {
        self.genesis.is_some()
    }

    /// Capture the genesis snapshot. One-time: a second call is refused.
    pub fn lock_genesis(&mut self, now: i64) -> Result<(), CoreError> {
        if self.genesis.is_some() {
            return Err(CoreError::GenesisLocked);
        }
        self.genesis = Some(GenesisTraits {
            traits: self.traits,
            locked_at: now,
        });
        tracing::info!("genesis traits locked");
        Ok(())
    }

    /// Direct user assignment of a single trait. Refused once genesis is
    /// locked — from then on only `evolve` may adjust traits.
    pub fn set_trait(&mut self, kind: TraitKind, value: f32) -> Result<(), CoreError> {
        if self.genesis_locked() {
            return Err(CoreError::GenesisLocked);
        }
        self.traits.set(kind, value);
        Ok(())
    }

    pub fn normalize(&mut self) {
        self.traits.normalize();
        self.plasticity = sanitize_f32(self.plasticity, 0.5).clamp(0.0, 1.0);
    }
}

/// Feedback polarity for one evolution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Positive,
    Negative,
}

/// Per-trait weights under fatigue. Neuroticism carries zero weight: fatigue
/// surfaces it rather than masking it.
const FATIGUE_WEIGHTS: [(TraitKind, f32); 5] = [
    (TraitKind::Openness, 0.9),
    (TraitKind::Conscientiousness, 0.8),
    (TraitKind::Extraversion, 0.5),
    (TraitKind::Agreeableness, 0.3),
    (TraitKind::Neuroticism, 0.0),
];

#[derive(Debug, Clone)]
pub struct PersonalityEngine {
    config: PersonalityConfig,
}

impl PersonalityEngine {
    pub fn new(config: PersonalityConfig) -> Self {
        Self { config }
    }

    /// Effective plasticity after experience hardening:
    /// `plasticity · (1 − η)^(n / 100)`.
    pub fn effective_plasticity(&self, state: &PersonalityState) -> f32 {
        let n = state.total_interactions as f32;
        state.plasticity * (1.0 - self.config.plasticity_eta).powf(n / 100.0)
    }

    /// One evolution step driven by interaction feedback.
    ///
    /// `ΔTrait_i = D · M · A_i · I · P(t) · plasticity_eff`, where `A_i` is
    /// the per-trait activation, `I` the current intimacy, and `P(t)` a
    /// saturating consolidation window over the hours since the last shift.
    /// Negative feedback is weighted heavier than positive.
    pub fn evolve(
        &self,
        current: &PersonalityState,
        direction: Feedback,
        magnitude: f32,
        activation: &TraitVector,
        intimacy: f32,
        hours_since_last_shift: f32,
    ) -> PersonalityState {
        let m = sanitize_f32(magnitude, 0.0).clamp(0.0, 1.0);
        let i = sanitize_f32(intimacy, 0.0).clamp(0.0, 1.0);
        let t = sanitize_f32(hours_since_last_shift, 0.0).max(0.0);

        let d = match direction {
            Feedback::Positive => 1.0,
            Feedback::Negative => -self.config.negative_weight,
        };
        let consolidation = t / (t + self.config.consolidation_hours);
        let plasticity_eff = self.effective_plasticity(current);
        let scale = d * m * i * consolidation * plasticity_eff;

        let mut next = current.clone();
        for kind in TraitKind::ALL {
            let a = sanitize_f32(activation.get(kind), 0.0).clamp(0.0, 1.0);
            let v = next.traits.get(kind) + scale * a;
            next.traits.set(kind, v);
        }
        next.total_interactions = current.total_interactions.saturating_add(1);
        next.normalize();
        next
    }

    /// Read-only fatigue-suppressed view for downstream consumers. Never
    /// persisted: `trait_eff = trait · (1 − fatigue · w_trait)`.
    pub fn effective(&self, traits: &TraitVector, fatigue: f32) -> TraitVector {
        let f = sanitize_f32(fatigue, 0.0).clamp(0.0, 1.0);
        let mut out = *traits;
        for (kind, weight) in FATIGUE_WEIGHTS {
            let v = traits.get(kind) * (1.0 - f * weight);
            out.set(kind, v);
        }
        out.normalize();
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> AgentSeed {
        AgentSeed::default()
    }

    fn engine() -> PersonalityEngine {
        PersonalityEngine::new(PersonalityConfig::default())
    }

    fn uniform_activation() -> TraitVector {
        TraitVector {
            openness: 1.0,
            conscientiousness: 1.0,
            extraversion: 1.0,
            agreeableness: 1.0,
            neuroticism: 1.0,
        }
    }

    #[test]
    fn test_from_seed() {
        let p = PersonalityState::from_seed(&seed());
        assert_eq!(p.traits.openness, 0.6);
        assert_eq!(p.total_interactions, 0);
        assert!(!p.genesis_locked());
    }

    #[test]
    fn test_set_trait_before_lock() {
        let mut p = PersonalityState::from_seed(&seed());
        p.set_trait(TraitKind::Openness, 0.9).unwrap();
        assert_eq!(p.traits.openness, 0.9);
    }

    #[test]
    fn test_genesis_lock_is_one_time() {
        let mut p = PersonalityState::from_seed(&seed());
        p.lock_genesis(100).unwrap();
        assert!(p.genesis_locked());
        assert!(matches!(p.lock_genesis(200), Err(CoreError::GenesisLocked)));
        // The snapshot keeps the original timestamp
        assert_eq!(p.genesis.unwrap().locked_at, 100);
    }

    #[test]
    fn test_direct_edit_refused_after_lock() {
        let mut p = PersonalityState::from_seed(&seed());
        p.lock_genesis(100).unwrap();
        let before = p.traits;
        let err = p.set_trait(TraitKind::Openness, 0.99);
        assert!(matches!(err, Err(CoreError::GenesisLocked)));
        assert_eq!(p.traits, before, "refused edit must leave traits unchanged");
    }

    #[test]
    fn test_evolve_succeeds_after_lock() {
        let e = engine();
        let mut p = PersonalityState::from_seed(&seed());
        p.lock_genesis(100).unwrap();
        let next = e.evolve(&p, Feedback::Positive, 0.8, &uniform_activation(), 0.7, 24.0);
        assert!(next.traits.openness > p.traits.openness);
        assert_eq!(next.total_interactions, 1);
        // Genesis snapshot unchanged
        assert_eq!(next.genesis, p.genesis);
    }

    #[test]
    fn test_negative_feedback_weighted_heavier() {
        let e = engine();
        let p = PersonalityState::from_seed(&seed());
        let up = e.evolve(&p, Feedback::Positive, 0.5, &uniform_activation(), 0.5, 24.0);
        let down = e.evolve(&p, Feedback::Negative, 0.5, &uniform_activation(), 0.5, 24.0);
        let gain = up.traits.openness - p.traits.openness;
        let loss = p.traits.openness - down.traits.openness;
        assert!(
            loss > gain,
            "negative feedback ({:.5}) must outweigh positive ({:.5})",
            loss,
            gain
        );
        assert!((loss / gain - 1.2).abs() < 0.01);
    }

    #[test]
    fn test_plasticity_hardens_with_experience() {
        let e = engine();
        let young = PersonalityState::from_seed(&seed());
        let mut old = young.clone();
        old.total_interactions = 1000;

        assert!(e.effective_plasticity(&old) < e.effective_plasticity(&young));

        let d_young =
            e.evolve(&young, Feedback::Positive, 0.8, &uniform_activation(), 0.8, 24.0).traits.openness
                - young.traits.openness;
        let d_old =
            e.evolve(&old, Feedback::Positive, 0.8, &uniform_activation(), 0.8, 24.0).traits.openness
                - old.traits.openness;
        assert!(d_old < d_young);
    }

    #[test]
    fn test_consolidation_damps_rapid_shifts() {
        let e = engine();
        let p = PersonalityState::from_seed(&seed());
        let rapid =
            e.evolve(&p, Feedback::Positive, 0.8, &uniform_activation(), 0.8, 0.1).traits.openness;
        let settled =
            e.evolve(&p, Feedback::Positive, 0.8, &uniform_activation(), 0.8, 48.0).traits.openness;
        assert!(rapid - p.traits.openness < settled - p.traits.openness);
    }

    #[test]
    fn test_activation_gates_traits() {
        let e = engine();
        let p = PersonalityState::from_seed(&seed());
        let only_extraversion = TraitVector {
            openness: 0.0,
            conscientiousness: 0.0,
            extraversion: 1.0,
            agreeableness: 0.0,
            neuroticism: 0.0,
        };
        let next = e.evolve(&p, Feedback::Positive, 0.8, &only_extraversion, 0.8, 24.0);
        assert!(next.traits.extraversion > p.traits.extraversion);
        assert_eq!(next.traits.openness, p.traits.openness);
        assert_eq!(next.traits.neuroticism, p.traits.neuroticism);
    }

    #[test]
    fn test_traits_clamped_after_evolution() {
        let e = engine();
        let mut p = PersonalityState::from_seed(&seed());
        for _ in 0..500 {
            p = e.evolve(&p, Feedback::Positive, 1.0, &uniform_activation(), 1.0, 100.0);
        }
        for kind in TraitKind::ALL {
            let v = p.traits.get(kind);
            assert!((0.0..=1.0).contains(&v), "{:?} out of range: {}", kind, v);
        }
    }

    #[test]
    fn test_zero_intimacy_freezes_evolution() {
        let e = engine();
        let p = PersonalityState::from_seed(&seed());
        let next = e.evolve(&p, Feedback::Positive, 1.0, &uniform_activation(), 0.0, 24.0);
        assert_eq!(next.traits, p.traits);
        // The turn still counts as an interaction
        assert_eq!(next.total_interactions, 1);
    }

    #[test]
    fn test_effective_view_suppression() {
        let e = engine();
        let traits = PersonalityState::from_seed(&seed()).traits;
        let rested = e.effective(&traits, 0.0);
        assert_eq!(rested, traits);

        let exhausted = e.effective(&traits, 0.9);
        assert!(exhausted.openness < traits.openness);
        assert!(exhausted.conscientiousness < traits.conscientiousness);
        assert!(exhausted.extraversion < traits.extraversion);
        // Neuroticism is not masked by fatigue
        assert_eq!(exhausted.neuroticism, traits.neuroticism);
        // Openness is suppressed harder than extraversion
        let openness_drop = 1.0 - exhausted.openness / traits.openness;
        let extraversion_drop = 1.0 - exhausted.extraversion / traits.extraversion;
        assert!(openness_drop > extraversion_drop);
    }
}
