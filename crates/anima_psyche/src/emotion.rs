//! Emotion dynamics: the Valence-Arousal-Resentment model.
//!
//! Valence and arousal follow Russell's circumplex; resentment is the third
//! axis — an accumulated grudge that suppresses positive stimuli and, past a
//! threshold, locks the agent into meltdown until it discharges.
//!
//! All updates are pure: `update` takes the current state plus a stimulus and
//! returns the next state. Decay is applied first for the elapsed interval,
//! then the stimulus, then clamping. Nothing here touches the wall clock.

use anima_core::config::EmotionConfig;
use anima_core::{deserialize_safe_f32, sanitize_f32};
use serde::{Deserialize, Serialize};

/// Three-axis emotional state. Owned by exactly one agent instance; mutated
/// only by [`EmotionEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionState {
    /// Pleasantness, -1.0 ..= 1.0.
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub valence: f32,

    /// Energy, 0.0 ..= 1.0.
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub arousal: f32,

    /// Accumulated grudge, 0.0 ..= 1.0.
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub resentment: f32,

    /// Unix timestamp of the last committed update.
    pub last_updated: i64,
}

impl EmotionState {
    pub fn new(valence: f32, arousal: f32, resentment: f32, last_updated: i64) -> Self {
        let mut s = Self {
            valence,
            arousal,
            resentment,
            last_updated,
        };
        s.normalize();
        s
    }

    /// Meltdown is derived, never stored: deep grudge plus deep negative
    /// valence. While true, positive stimuli are rejected.
    pub fn meltdown(&self) -> bool {
        self.resentment > 0.8 && self.valence < -0.7
    }

    /// Sanitize NaN/Inf and clamp every axis to its documented range.
    pub fn normalize(&mut self) {
        self.valence = sanitize_f32(self.valence, 0.0).clamp(-1.0, 1.0);
        self.arousal = sanitize_f32(self.arousal, 0.3).clamp(0.0, 1.0);
        self.resentment = sanitize_f32(self.resentment, 0.0).clamp(0.0, 1.0);
    }
}

/// One turn's emotional stimulus, already distilled from perception.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmotionStimulus {
    pub delta_valence: f32,
    pub delta_arousal: f32,
    pub delta_resentment: f32,
    /// Hours since the previous update. Negative values are malformed input
    /// and are treated as zero.
    pub elapsed_hours: f32,
}

/// Logistic squash used by the resentment suppression curve.
#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Pure V-A-R update engine. Construction injects the tuning constants and
/// the agent's valence baseline; the engine itself holds no mutable state.
#[derive(Debug, Clone)]
pub struct EmotionEngine {
    config: EmotionConfig,
    baseline_valence: f32,
}

impl EmotionEngine {
    pub fn new(config: EmotionConfig, baseline_valence: f32) -> Self {
        Self {
            config,
            baseline_valence: baseline_valence.clamp(-1.0, 1.0),
        }
    }

    /// Advance the state: decay toward baseline for the elapsed interval,
    /// then apply the stimulus through the resentment and meltdown gates.
    pub fn update(&self, current: &EmotionState, stimulus: &EmotionStimulus, now: i64) -> EmotionState {
        let dt_hours = sanitize_f32(stimulus.elapsed_hours, 0.0).max(0.0);

        // 1. Decay toward baseline. Valence drifts to the configured baseline,
        //    arousal to its 0.5 midpoint, resentment cools toward zero.
        let mut v = current.valence
            + (self.baseline_valence - current.valence) * self.config.alpha_valence * dt_hours;
        let mut a = current.arousal + (0.5 - current.arousal) * self.config.alpha_arousal * dt_hours;
        let mut r = current.resentment - current.resentment * self.config.alpha_resentment * dt_hours;
        v = v.clamp(-1.0, 1.0);
        a = a.clamp(0.0, 1.0);
        r = r.clamp(0.0, 1.0);

        // 2. Resentment suppression: a grudge attenuates positive stimuli.
        let mut dv = sanitize_f32(stimulus.delta_valence, 0.0);
        if dv > 0.0 {
            dv *= 1.0 - sigmoid(10.0 * (r - 0.5));
        }

        // 3. Meltdown gate, evaluated on the decayed state: positive valence
        //    movement is rejected outright.
        let decayed = EmotionState {
            valence: v,
            arousal: a,
            resentment: r,
            last_updated: current.last_updated,
        };
        if decayed.meltdown() && dv > 0.0 {
            dv = 0.0;
        }

        // 4. Soft-boundary application: movement shrinks near the extremes.
        let alpha = self.config.soft_boundary_alpha;
        v += dv * (1.0 - v.abs()).powf(alpha);

        let da = sanitize_f32(stimulus.delta_arousal, 0.0);
        if da > 0.0 {
            a += da * (1.0 - a).powf(alpha);
        } else {
            a += da * a.powf(alpha);
        }

        r += sanitize_f32(stimulus.delta_resentment, 0.0);

        let mut next = EmotionState {
            valence: v,
            arousal: a,
            resentment: r,
            last_updated: now,
        };
        next.normalize();
        next
    }

    /// The apology valve — the only non-gradual resentment discharge path.
    /// Discharges the configured fraction instantly.
    pub fn apply_apology(&self, current: &EmotionState, now: i64) -> EmotionState {
        let discharge = self.config.apology_discharge.clamp(0.0, 1.0);
        let mut next = EmotionState {
            resentment: current.resentment * (1.0 - discharge),
            last_updated: now,
            ..*current
        };
        next.normalize();
        tracing::debug!(
            resentment_before = current.resentment,
            resentment_after = next.resentment,
            "apology valve discharged resentment"
        );
        next
    }
}

// ============================================================================
// Tests
// ============================================================================
