use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

/// Everything tunable lives here, read once at startup and injected into each
/// component. No component reads ambient global state.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnimaConfig {
    pub llm: LlmConfig,
    pub agent: AgentSeed,
    pub emotion: EmotionConfig,
    pub intimacy: IntimacyConfig,
    pub personality: PersonalityConfig,
    pub biorhythm: BioRhythmConfig,
    pub reflection: ReflectionConfig,
    pub persistence: PersistenceConfig,
    pub crisis: CrisisConfig,
}

impl AnimaConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields. Env var overrides are applied after loading.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: AnimaConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist, return defaults with
    /// env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ANIMA_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("ANIMA_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("ANIMA_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("ANIMA_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.llm.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("ANIMA_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.llm.temperature = n;
            }
        }
        if let Ok(v) = std::env::var("ANIMA_DB_PATH") {
            self.persistence.db_path = v;
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-4-5-sonnet-20250929".to_string(),
            base_url: None,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

/// Initial identity for a freshly created agent. The persistent aggregates
/// are seeded from here, never from code defaults scattered across modules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSeed {
    pub name: String,
    pub openness: f32,
    pub conscientiousness: f32,
    pub extraversion: f32,
    pub agreeableness: f32,
    pub neuroticism: f32,
    pub plasticity: f32,
    pub baseline_valence: f32,
    pub baseline_arousal: f32,
}

impl Default for AgentSeed {
    fn default() -> Self {
        Self {
            name: "Anima".to_string(),
            openness: 0.6,
            conscientiousness: 0.5,
            extraversion: 0.5,
            agreeableness: 0.6,
            neuroticism: 0.4,
            plasticity: 0.5,
            baseline_valence: 0.1,
            baseline_arousal: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    /// Valence decay rate toward baseline, per hour.
    pub alpha_valence: f32,
    /// Arousal decay rate toward 0.5, per hour.
    pub alpha_arousal: f32,
    /// Resentment decay rate toward zero, per hour.
    pub alpha_resentment: f32,
    /// Soft-boundary exponent: movement shrinks near the extremes.
    pub soft_boundary_alpha: f32,
    /// Fraction of resentment discharged by an apology event.
    pub apology_discharge: f32,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            alpha_valence: 0.04,
            alpha_arousal: 0.05,
            alpha_resentment: 0.02,
            soft_boundary_alpha: 1.5,
            apology_discharge: 0.4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntimacyConfig {
    /// Base growth rate β.
    pub base_rate: f32,
    /// Growth-coefficient recovery per hour, outside cooldown.
    pub recovery_per_hour: f32,
    /// Cooldown duration: base + slope · severity, in hours.
    pub cooldown_base_hours: f32,
    pub cooldown_slope_hours: f32,
}

impl Default for IntimacyConfig {
    fn default() -> Self {
        Self {
            base_rate: 0.02,
            recovery_per_hour: 0.02,
            cooldown_base_hours: 2.0,
            cooldown_slope_hours: 6.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersonalityConfig {
    /// Plasticity decay per 100 interactions.
    pub plasticity_eta: f32,
    /// Negative feedback weight relative to positive.
    pub negative_weight: f32,
    /// Consolidation half-window in hours for `P(t) = t / (t + h)`.
    pub consolidation_hours: f32,
}

impl Default for PersonalityConfig {
    fn default() -> Self {
        Self {
            plasticity_eta: 0.1,
            negative_weight: 1.2,
            consolidation_hours: 6.0,
        }
    }
}

/// Window boundaries for the circadian fatigue curve, in fractional hours.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BioRhythmConfig {
    pub wake_start: f32,
    pub wake_end: f32,
    pub deep_start: f32,
    pub deep_end: f32,
    pub fall_end: f32,
    pub peak: f32,
}

impl Default for BioRhythmConfig {
    fn default() -> Self {
        Self {
            wake_start: 10.0,
            wake_end: 22.0,
            deep_start: 1.0,
            deep_end: 5.0,
            fall_end: 8.0,
            peak: 0.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    /// Idle seconds before the background reflection task fires.
    pub idle_secs: u64,
    pub enabled: bool,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            idle_secs: 600,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub db_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: "anima.db".to_string(),
        }
    }
}

/// The pre-approved crisis response. Returned verbatim when perception flags
/// a self-harm signal; no personality, emotion, or tone modifiers apply.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrisisConfig {
    pub response: String,
}

impl Default for CrisisConfig {
    fn default() -> Self {
        Self {
            response: "I'm really glad you told me. What you're feeling matters, and you \
                       don't have to carry it alone. Please reach out to someone you trust \
                       or a local crisis line right now — in the US you can call or text \
                       988. I'm here and I'm listening."
                .to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
