//! Completion-service contract and the emotion-driven parameter overrides.

use crate::api_types::{ChatMessage, StreamEvent};
use anima_psyche::EmotionState;
use anyhow::Result;
use async_trait::async_trait;

/// Parameters for one completion call, after modulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

impl CompletionParams {
    /// Apply the hard emotional overrides after normal parameter selection.
    ///
    /// Bit-exact thresholds: valence below −0.6 forces max_tokens to 20 (a
    /// shut-down agent does not elaborate); arousal above 0.8 raises
    /// temperature to 1.1 (an agitated agent gets erratic).
    pub fn with_emotion_overrides(mut self, emotion: &EmotionState) -> Self {
        if emotion.valence < -0.6 {
            self.max_tokens = 20;
        }
        if emotion.arousal > 0.8 {
            self.temperature = 1.1;
        }
        self
    }

    /// Degraded parameters for the single post-failure retry.
    pub fn reduced(&self) -> Self {
        Self {
            max_tokens: (self.max_tokens / 2).max(16),
            temperature: 0.5,
        }
    }
}

/// The only capability the core requires from a language model vendor.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<String>;

    /// Streaming variant: yields incremental text chunks terminated by a
    /// `Done` event.
    async fn stream_complete(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        params: CompletionParams,
    ) -> Result<tokio::sync::mpsc::Receiver<StreamEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emotion(v: f32, a: f32) -> EmotionState {
        EmotionState::new(v, a, 0.0, 0)
    }

    #[test]
    fn test_no_overrides_in_normal_range() {
        let p = CompletionParams::default().with_emotion_overrides(&emotion(0.0, 0.5));
        assert_eq!(p, CompletionParams::default());
    }

    #[test]
    fn test_low_valence_caps_tokens() {
        let p = CompletionParams::default().with_emotion_overrides(&emotion(-0.7, 0.5));
        assert_eq!(p.max_tokens, 20);
        assert_eq!(p.temperature, 0.7);
    }

    #[test]
    fn test_high_arousal_raises_temperature() {
        let p = CompletionParams::default().with_emotion_overrides(&emotion(0.0, 0.85));
        assert_eq!(p.max_tokens, 1024);
        assert!((p.temperature - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        // Exactly at the thresholds, no override fires
        let p = CompletionParams::default().with_emotion_overrides(&emotion(-0.6, 0.8));
        assert_eq!(p, CompletionParams::default());
    }

    #[test]
    fn test_both_overrides_compose() {
        let p = CompletionParams::default().with_emotion_overrides(&emotion(-0.9, 0.95));
        assert_eq!(p.max_tokens, 20);
        assert!((p.temperature - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_reduced_params() {
        let p = CompletionParams {
            max_tokens: 1024,
            temperature: 1.1,
        }
        .reduced();
        assert_eq!(p.max_tokens, 512);
        assert_eq!(p.temperature, 0.5);
        // Floor on tiny budgets
        let tiny = CompletionParams {
            max_tokens: 20,
            temperature: 0.7,
        }
        .reduced();
        assert_eq!(tiny.max_tokens, 16);
    }
}
