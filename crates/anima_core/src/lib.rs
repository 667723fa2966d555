pub mod config;
pub mod error;
pub mod perception;

pub use config::AnimaConfig;
pub use error::CoreError;
pub use perception::{
    LexicalPerception, NeedKind, PerceptionProvider, PerceptionRecord, SocialEvent,
};

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A normalized inbound message from any chat surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbound {
    pub id: Uuid,
    pub author: String,
    pub body: String,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
}

impl Inbound {
    pub fn new(author: &str, body: &str, timestamp: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            author: author.to_string(),
            body: body.to_string(),
            timestamp,
        }
    }
}

/// Guard against NaN and Infinity when deserializing persisted state.
/// A corrupted store must not be able to poison the engines.
pub fn deserialize_safe_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let v = f32::deserialize(deserializer)?;
    if v.is_finite() {
        Ok(v)
    } else {
        tracing::warn!("non-finite f32 in persisted state, resetting to 0.0");
        Ok(0.0)
    }
}

/// Sanitize a state scalar: NaN/Inf falls back to the homeostatic default.
#[inline]
pub fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in state, resetting to fallback {}", fallback);
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_passes_finite() {
        assert_eq!(sanitize_f32(0.42, 0.0), 0.42);
        assert_eq!(sanitize_f32(-1.0, 0.5), -1.0);
    }

    #[test]
    fn test_sanitize_replaces_nan_inf() {
        assert_eq!(sanitize_f32(f32::NAN, 0.3), 0.3);
        assert_eq!(sanitize_f32(f32::INFINITY, 0.7), 0.7);
        assert_eq!(sanitize_f32(f32::NEG_INFINITY, 0.0), 0.0);
    }

    #[test]
    fn test_safe_f32_deserialization() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "deserialize_safe_f32")]
            v: f32,
        }
        let ok: Wrapper = serde_json::from_str(r#"{"v": 0.5}"#).unwrap();
        assert_eq!(ok.v, 0.5);
    }
}
