//! Circadian fatigue: a pure function of time-of-day with eased transitions
//! between waking, drowsy, and deep-fatigue windows. No state, no clock reads
//! — callers pass the time in, which keeps every output reproducible.

use anima_core::config::BioRhythmConfig;
use anima_core::perception::NeedKind;
use chrono::Timelike;

/// Classic cubic ease: 3t² − 2t³ on [0, 1].
#[inline]
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Hours from `from` to `to` moving forward around the 24h clock.
#[inline]
fn wrap_distance(from: f32, to: f32) -> f32 {
    (to - from).rem_euclid(24.0)
}

#[derive(Debug, Clone)]
pub struct BioRhythm {
    config: BioRhythmConfig,
}

impl BioRhythm {
    pub fn new(config: BioRhythmConfig) -> Self {
        Self { config }
    }

    /// Fatigue at a fractional hour-of-day, in `[0, peak]`.
    ///
    /// Flat 0.0 through the waking window, eased rise after it, flat peak
    /// through the deep-fatigue window, eased fall back to 0.0. Continuous at
    /// every boundary.
    pub fn laziness(&self, hour_of_day: f32) -> f32 {
        let c = &self.config;
        let t = hour_of_day.rem_euclid(24.0);

        if in_window(t, c.wake_start, c.wake_end) {
            return 0.0;
        }
        if in_window(t, c.deep_start, c.deep_end) {
            return c.peak;
        }
        if in_window(t, c.wake_end, c.deep_start) {
            // Rising edge, possibly wrapping midnight.
            let span = wrap_distance(c.wake_end, c.deep_start);
            let progress = wrap_distance(c.wake_end, t) / span;
            return c.peak * smoothstep(progress);
        }
        if in_window(t, c.deep_end, c.fall_end) {
            let span = wrap_distance(c.deep_end, c.fall_end);
            let progress = wrap_distance(c.deep_end, t) / span;
            return c.peak * (1.0 - smoothstep(progress));
        }
        // Between the end of the fall and the start of the waking window.
        0.0
    }

    /// Fatigue for a wall-clock instant.
    pub fn laziness_at<Tz: chrono::TimeZone>(&self, when: &chrono::DateTime<Tz>) -> f32 {
        let hour = when.hour() as f32
            + when.minute() as f32 / 60.0
            + when.second() as f32 / 3600.0;
        self.laziness(hour)
    }

    /// Patience left for this turn: fatigue eats it first, demanding needs
    /// (comfort, venting) and repeated topics each take a fixed bite.
    pub fn tolerance(&self, laziness: f32, need: NeedKind, topic_repeated: bool) -> f32 {
        let mut t = 1.0 - laziness.clamp(0.0, 1.0);
        if need.is_demanding() {
            t -= 0.2;
        }
        if topic_repeated {
            t -= 0.2;
        }
        t.clamp(0.0, 1.0)
    }
}

impl Default for BioRhythm {
    fn default() -> Self {
        Self::new(BioRhythmConfig::default())
    }
}

/// Is `t` inside the window `[start, end)`, wrapping midnight when needed?
fn in_window(t: f32, start: f32, end: f32) -> bool {
    if start <= end {
        t >= start && t < end
    } else {
        t >= start || t < end
    }
}

// ============================================================================
// Tests
// ============================================================================
