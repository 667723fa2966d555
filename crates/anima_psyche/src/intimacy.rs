//! Intimacy: a bounded relationship-closeness scalar with diminishing-returns
//! growth, immediate hostile deductions, and a cooling window that suppresses
//! growth-coefficient recovery after a rupture.

use anima_core::config::IntimacyConfig;
use anima_core::{deserialize_safe_f32, sanitize_f32};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntimacyState {
    /// Closeness, 0.0 ..= 1.0.
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub intimacy: f32,

    /// Growth throttle, 0.0 ..= 1.0. Degraded by hostile events, recovers
    /// slowly outside the cooling window.
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub growth_coefficient: f32,

    /// Unix timestamp until which growth-coefficient recovery is suppressed.
    pub cooling_until: Option<i64>,
}

impl IntimacyState {
    pub fn new(intimacy: f32, growth_coefficient: f32, cooling_until: Option<i64>) -> Self {
        let mut s = Self {
            intimacy,
            growth_coefficient,
            cooling_until,
        };
        s.normalize();
        s
    }

    /// Fresh relationship: zero closeness, unthrottled growth.
    pub fn fresh() -> Self {
        Self::new(0.0, 1.0, None)
    }

    pub fn is_cooling(&self, now: i64) -> bool {
        self.cooling_until.is_some_and(|until| now < until)
    }

    pub fn normalize(&mut self) {
        self.intimacy = sanitize_f32(self.intimacy, 0.0).clamp(0.0, 1.0);
        self.growth_coefficient = sanitize_f32(self.growth_coefficient, 1.0).clamp(0.0, 1.0);
    }
}

/// Pure growth/deduction engine over [`IntimacyState`].
#[derive(Debug, Clone)]
pub struct IntimacyEngine {
    config: IntimacyConfig,
}

impl IntimacyEngine {
    pub fn new(config: IntimacyConfig) -> Self {
        Self { config }
    }

    /// Grow intimacy from one positive interaction.
    ///
    /// `ΔI = Q · E · T · B(I)` where quality `Q ∈ [0, 1]` is the interaction
    /// quality, `E = 1 + 0.3·V` scales with current valence, `T` penalizes
    /// long gaps between conversations, and `B(I)` provides diminishing
    /// returns as closeness approaches saturation.
    pub fn grow(
        &self,
        current: &IntimacyState,
        quality: f32,
        valence: f32,
        hours_since_last: f32,
    ) -> IntimacyState {
        let q = sanitize_f32(quality, 0.0).clamp(0.0, 1.0);
        let v = sanitize_f32(valence, 0.0).clamp(-1.0, 1.0);
        let dh = sanitize_f32(hours_since_last, 0.0).max(0.0);

        let e = 1.0 + v * 0.3;
        let t = (1.0 - dh * 0.05).max(0.2);
        let b = self.config.base_rate
            * (1.0 - current.intimacy).max(0.0).sqrt()
            * current.growth_coefficient;

        let mut next = *current;
        next.intimacy += q * e * t * b;
        next.normalize();
        next
    }

    /// Immediate deduction for a hostile event of normalized severity
    /// `s ∈ [0, 1]`: closeness drops by `s·0.05`, the growth coefficient
    /// degrades by `s·0.1`, and a cooling window of `2 + s·6` hours opens
    /// during which recovery is suppressed.
    pub fn penalize(&self, current: &IntimacyState, severity: f32, now: i64) -> IntimacyState {
        let s = sanitize_f32(severity, 0.0).clamp(0.0, 1.0);
        if s == 0.0 {
            return *current;
        }

        let cooldown_hours = self.config.cooldown_base_hours + s * self.config.cooldown_slope_hours;
        let cooldown_secs = (cooldown_hours * 3600.0) as i64;

        let mut next = IntimacyState {
            intimacy: current.intimacy - s * 0.05,
            growth_coefficient: current.growth_coefficient - s * 0.1,
            cooling_until: Some(now + cooldown_secs),
        };
        next.normalize();
        tracing::debug!(
            severity = s,
            cooldown_hours,
            "hostile event: intimacy deduction applied"
        );
        next
    }

    /// Recover the growth coefficient toward 1.0 for the elapsed interval.
    /// Recovery is fully suppressed while the cooling window is open.
    pub fn recover(&self, current: &IntimacyState, hours: f32, now: i64) -> IntimacyState {
        if current.is_cooling(now) {
            return *current;
        }
        let dh = sanitize_f32(hours, 0.0).max(0.0);
        let mut next = IntimacyState {
            growth_coefficient: current.growth_coefficient + self.config.recovery_per_hour * dh,
            // The window has passed; clear the marker so the state stays tidy.
            cooling_until: None,
            ..*current
        };
        next.normalize();
        next
    }
}

// ============================================================================
// Tests
// ============================================================================
