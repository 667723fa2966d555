//! Turn orchestration.
//!
//! One completed conversational turn flows through: perceive → crisis gate →
//! pure engine updates (emotion, intimacy, personality) → compass / valve /
//! profile → prompt assembly → completion (cancellable, one reduced-parameter
//! retry) → invariant check → commit under the per-agent lock → persist →
//! rearm the reflection timer.
//!
//! Every numeric step is a pure function; only the final commit takes the
//! session mutex, and a version token keeps the background reflection task
//! from clobbering a turn that raced past it.

use crate::api_types::ChatMessage;
use crate::llm::{CompletionClient, CompletionParams};
use crate::prompts::PromptBlocks;
use crate::retry::with_single_retry;
use crate::scheduler::ReflectionScheduler;
use anima_core::config::AnimaConfig;
use anima_core::perception::{LexicalPerception, SocialEvent};
use anima_core::{CoreError, Inbound, PerceptionProvider, PerceptionRecord};
use anima_expression::{
    compile_profile, read_compass, ExpressionProfile, SocialStance, ToneLevel,
};
use anima_memory::{AgentRecord, AgentStore, TurnLog};
use anima_psyche::{
    BioRhythm, EmotionEngine, EmotionState, EmotionStimulus, Feedback, IntimacyEngine,
    IntimacyState, PersonalityEngine, PersonalityState, TraitVector,
};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// Marker error for a turn cancelled mid-generation. The session state is
/// untouched when this is returned.
#[derive(Debug)]
pub struct TurnCancelled;

impl std::fmt::Display for TurnCancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn cancelled before commit")
    }
}

impl std::error::Error for TurnCancelled {}

/// Create a cancellation pair for one in-flight turn.
pub fn cancel_pair() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// The in-memory session owning one agent's aggregate. Exactly one exists
/// per agent id; all writes serialize through its mutex.
#[derive(Debug)]
pub struct AgentSession {
    pub record: AgentRecord,
    /// Monotonic commit counter. Reflection captures it when armed and
    /// refuses to commit if a turn advanced it meanwhile.
    pub version: u64,
    /// Unix timestamp of the last personality shift, for the consolidation
    /// window.
    pub last_shift_at: i64,
}

/// What one completed turn produced, alongside the committed state.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub stance: SocialStance,
    pub tone: ToneLevel,
    pub profile: ExpressionProfile,
    pub params: CompletionParams,
    pub crisis: bool,
    pub meltdown: bool,
    /// Set when the turn committed in memory but the store write failed;
    /// the in-memory state is retained for the next successful save.
    pub persist_error: Option<String>,
}

pub struct TurnEngine {
    config: AnimaConfig,
    perception: Arc<dyn PerceptionProvider>,
    completion: Arc<dyn CompletionClient>,
    store: Arc<dyn AgentStore>,

    emotion_engine: EmotionEngine,
    intimacy_engine: IntimacyEngine,
    personality_engine: PersonalityEngine,
    biorhythm: BioRhythm,

    sessions: Mutex<HashMap<String, Arc<Mutex<AgentSession>>>>,
    schedulers: Mutex<HashMap<String, ReflectionScheduler>>,
}

impl TurnEngine {
    pub fn new(
        config: AnimaConfig,
        perception: Arc<dyn PerceptionProvider>,
        completion: Arc<dyn CompletionClient>,
        store: Arc<dyn AgentStore>,
    ) -> Self {
        let emotion_engine =
            EmotionEngine::new(config.emotion.clone(), config.agent.baseline_valence);
        let intimacy_engine = IntimacyEngine::new(config.intimacy.clone());
        let personality_engine = PersonalityEngine::new(config.personality.clone());
        let biorhythm = BioRhythm::new(config.biorhythm.clone());
        Self {
            config,
            perception,
            completion,
            store,
            emotion_engine,
            intimacy_engine,
            personality_engine,
            biorhythm,
            sessions: Mutex::new(HashMap::new()),
            schedulers: Mutex::new(HashMap::new()),
        }
    }

    /// Process a turn against the wall clock.
    pub async fn process_turn(&self, agent_id: &str, message: &Inbound) -> Result<TurnOutcome> {
        let now = chrono::Utc::now().timestamp();
        let hour = {
            use chrono::Timelike;
            let local = chrono::Local::now();
            local.hour() as f32 + local.minute() as f32 / 60.0
        };
        let (_tx, rx) = cancel_pair();
        self.process_turn_at(agent_id, message, now, hour, rx).await
    }

    /// Process a turn at an explicit instant. The entry point for tests and
    /// for callers that manage cancellation: flip the paired sender to abort
    /// mid-generation, and nothing commits.
    pub async fn process_turn_at(
        &self,
        agent_id: &str,
        message: &Inbound,
        now: i64,
        hour_of_day: f32,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<TurnOutcome> {
        // A new turn supersedes any pending idle reflection.
        self.cancel_reflection(agent_id).await;

        // 1. Perceive. A failed producer yields the conservative record and
        //    the turn proceeds; the local lexical scan stays as the crisis
        //    backstop so a producer outage fails safe toward the override.
        let perception = match self.perception.classify(&message.body).await {
            Ok(rec) => rec.normalize(),
            Err(e) => {
                tracing::warn!("perception failed ({}), using conservative record", e);
                let mut fallback = PerceptionRecord::conservative();
                if LexicalPerception.classify_text(&message.body).is_crisis() {
                    fallback.social_events.push(SocialEvent::CrisisSignal);
                }
                fallback
            }
        };

        // 2. Critical-safety override: highest precedence, outside the
        //    normal pipeline. No state mutation, no modifiers.
        if perception.is_crisis() {
            tracing::warn!(agent_id, "crisis signal: fixed response, pipeline bypassed");
            let reply = self.config.crisis.response.clone();
            self.log_turn(agent_id, message, &reply, now).await;
            return Ok(TurnOutcome {
                reply,
                stance: SocialStance::Neutral,
                tone: ToneLevel::Normal,
                profile: ExpressionProfile::restrictive(),
                params: self.base_params(),
                crisis: true,
                meltdown: false,
                persist_error: None,
            });
        }

        let session = self.session(agent_id).await?;

        // 3. Pure state computation on a snapshot. The lock is released while
        //    the completion call is in flight.
        let (snapshot, version_before, last_shift_at) = {
            let guard = session.lock().await;
            (guard.record.clone(), guard.version, guard.last_shift_at)
        };

        let laziness = self.biorhythm.laziness(hour_of_day);
        let staged = self.advance_state(&snapshot, &perception, now, laziness, last_shift_at);

        // 4. Derive the constraint set and assemble the prompt.
        let effective = self
            .personality_engine
            .effective(&staged.record.personality.traits, laziness);
        let compass = read_compass(
            &effective,
            &staged.record.emotion,
            staged.record.intimacy.intimacy,
            perception.offensiveness,
        );
        let tone = ToneLevel::from_signals(
            perception.offensiveness,
            staged.record.emotion.resentment,
            laziness,
        );
        let meltdown = staged.record.emotion.meltdown();
        let profile = compile_profile(
            &effective,
            staged.record.intimacy.intimacy,
            staged.record.emotion.resentment,
            tone,
            meltdown,
        );
        let tolerance =
            self.biorhythm
                .tolerance(laziness, perception.underlying_need, staged.topic_repeated);

        let blocks = PromptBlocks {
            agent_name: self.config.agent.name.clone(),
            emotion: staged.record.emotion,
            intimacy: staged.record.intimacy.intimacy,
            stance: compass.stance,
            tone,
            profile,
            laziness,
            tolerance,
        };
        let system_prompt = blocks.assemble();
        let params = self.base_params().with_emotion_overrides(&staged.record.emotion);

        // 5. Completion, cancellable, with one reduced-parameter retry.
        let messages = self.history(agent_id, message).await;
        let completion = self.completion.clone();
        let call = with_single_retry(
            &self.config.llm.provider,
            params,
            CompletionParams::reduced,
            |p| {
                let completion = completion.clone();
                let system = system_prompt.clone();
                let messages = messages.clone();
                async move { completion.complete(&system, messages, p).await }
            },
        );

        // A dropped sender means cancellation can never arrive; park that
        // branch instead of treating channel closure as a cancel.
        let wait_cancel = async move {
            if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        let reply = tokio::select! {
            result = call => result.map_err(|e| {
                anyhow::Error::from(CoreError::Completion(e.to_string()))
            })?,
            _ = wait_cancel => {
                tracing::info!(agent_id, "generation cancelled, partial output discarded");
                return Err(TurnCancelled.into());
            }
        };

        // 6. Invariant check, then commit under the session lock. A rejected
        //    write keeps the previous valid state.
        let mut persist_error = None;
        {
            let mut guard = session.lock().await;
            match staged.record.check_invariants() {
                Ok(()) => {
                    if guard.version != version_before {
                        // Another write landed first; this commit is ordered
                        // strictly after it, never interleaved.
                        tracing::debug!(agent_id, "commit applies after a concurrent write");
                    }
                    guard.record = staged.record.clone();
                    guard.version += 1;
                    if staged.shifted {
                        guard.last_shift_at = now;
                    }
                    if let Err(e) = self.store.save(agent_id, &guard.record).await {
                        tracing::warn!("persistence failed, in-memory state retained: {}", e);
                        persist_error = Some(e.to_string());
                    }
                }
                Err(violation) => {
                    tracing::warn!("commit rejected: {}", violation);
                }
            }
        }

        self.log_turn(agent_id, message, &reply, now).await;
        self.arm_reflection(agent_id, &session).await;

        Ok(TurnOutcome {
            reply,
            stance: compass.stance,
            tone,
            profile,
            params,
            crisis: false,
            meltdown,
            persist_error,
        })
    }

    /// Apply the pure engine updates for one perceived message.
    fn advance_state(
        &self,
        current: &AgentRecord,
        perception: &PerceptionRecord,
        now: i64,
        laziness: f32,
        last_shift_at: i64,
    ) -> StagedUpdate {
        let elapsed_hours = ((now - current.emotion.last_updated).max(0) as f32) / 3600.0;
        let severity = perception.severity();

        // Apology discharges resentment before anything else this turn.
        let mut emotion = current.emotion;
        if perception.has_event(SocialEvent::Apology) {
            emotion = self.emotion_engine.apply_apology(&emotion, now);
        }

        let stimulus = EmotionStimulus {
            delta_valence: perception.surface_valence * 0.4,
            delta_arousal: (perception.surface_arousal - emotion.arousal) * 0.3,
            delta_resentment: severity * 0.3,
            elapsed_hours,
        };
        let emotion = self.emotion_engine.update(&emotion, &stimulus, now);

        // Intimacy: coefficient recovery for the quiet stretch, then either a
        // hostile deduction or diminishing-returns growth.
        let recovered = self
            .intimacy_engine
            .recover(&current.intimacy, elapsed_hours, now);
        let intimacy = if severity > 0.0 {
            self.intimacy_engine.penalize(&recovered, severity, now)
        } else {
            let quality = perception.surface_valence.max(0.0)
                * (0.5 + 0.5 * perception.confidence);
            self.intimacy_engine
                .grow(&recovered, quality, emotion.valence, elapsed_hours)
        };

        // Personality: one evolution step per completed turn.
        let hours_since_shift = ((now - last_shift_at).max(0) as f32) / 3600.0;
        let (direction, magnitude) = if severity > 0.0 || perception.surface_valence < -0.2 {
            (
                Feedback::Negative,
                severity.max(-perception.surface_valence).clamp(0.0, 1.0) * 0.5,
            )
        } else {
            (
                Feedback::Positive,
                perception.surface_valence.clamp(0.0, 1.0) * 0.5,
            )
        };
        let activation = activation_for(perception, laziness);
        let personality = self.personality_engine.evolve(
            &current.personality,
            direction,
            magnitude,
            &activation,
            intimacy.intimacy,
            hours_since_shift,
        );

        StagedUpdate {
            record: AgentRecord {
                emotion,
                personality,
                intimacy,
            },
            shifted: magnitude > 0.0,
            topic_repeated: perception.has_event(SocialEvent::TopicRepeat),
        }
    }

    /// Background reflection: when the agent has been idle, let elapsed-time
    /// decay and coefficient recovery run, then commit — unless a turn beat
    /// us to the aggregate, which the version token detects.
    async fn arm_reflection(&self, agent_id: &str, session: &Arc<Mutex<AgentSession>>) {
        if !self.config.reflection.enabled {
            return;
        }
        let delay = Duration::from_secs(self.config.reflection.idle_secs);
        let armed_version = session.lock().await.version;
        let session = Arc::clone(session);
        let store = Arc::clone(&self.store);
        let emotion_engine = self.emotion_engine.clone();
        let intimacy_engine = self.intimacy_engine.clone();
        let agent = agent_id.to_string();
        let idle_hours = delay.as_secs_f32() / 3600.0;

        let mut schedulers = self.schedulers.lock().await;
        schedulers
            .entry(agent.clone())
            .or_insert_with(ReflectionScheduler::new)
            .reset(delay, async move {
                let mut guard = session.lock().await;
                if guard.version != armed_version {
                    tracing::debug!(%agent, "reflection superseded by a newer commit");
                    return;
                }
                let now = chrono::Utc::now().timestamp();
                let stimulus = EmotionStimulus {
                    elapsed_hours: idle_hours,
                    ..Default::default()
                };
                guard.record.emotion =
                    emotion_engine.update(&guard.record.emotion, &stimulus, now);
                guard.record.intimacy =
                    intimacy_engine.recover(&guard.record.intimacy, idle_hours, now);
                guard.version += 1;
                if let Err(e) = store.save(&agent, &guard.record).await {
                    tracing::warn!("reflection persistence failed: {}", e);
                }
                tracing::debug!(%agent, "idle reflection committed");
            });
    }

    async fn cancel_reflection(&self, agent_id: &str) {
        if let Some(scheduler) = self.schedulers.lock().await.get_mut(agent_id) {
            scheduler.cancel();
        }
    }

    /// Fetch or create the session for an agent. Fresh agents are seeded
    /// from configuration and their genesis locked immediately.
    async fn session(&self, agent_id: &str) -> Result<Arc<Mutex<AgentSession>>> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(agent_id) {
            return Ok(Arc::clone(existing));
        }

        let record = match self.store.load(agent_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                let record = self.seed_record();
                if let Err(e) = self.store.save(agent_id, &record).await {
                    tracing::warn!("could not persist fresh agent: {}", e);
                }
                record
            }
            Err(e) => {
                return Err(anyhow::Error::from(CoreError::Persistence(e.to_string())));
            }
        };

        let session = Arc::new(Mutex::new(AgentSession {
            record,
            version: 0,
            last_shift_at: 0,
        }));
        sessions.insert(agent_id.to_string(), Arc::clone(&session));
        Ok(session)
    }

    fn seed_record(&self) -> AgentRecord {
        let seed = &self.config.agent;
        let mut personality = PersonalityState::from_seed(seed);
        // Genesis is captured at first configuration; direct edits are
        // refused from here on.
        let _ = personality.lock_genesis(chrono::Utc::now().timestamp());
        AgentRecord {
            emotion: EmotionState::new(
                seed.baseline_valence,
                seed.baseline_arousal,
                0.0,
                chrono::Utc::now().timestamp(),
            ),
            personality,
            intimacy: IntimacyState::fresh(),
        }
    }

    fn base_params(&self) -> CompletionParams {
        CompletionParams {
            max_tokens: self.config.llm.max_tokens,
            temperature: self.config.llm.temperature,
        }
    }

    async fn history(&self, agent_id: &str, message: &Inbound) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        if let Ok(turns) = self.store.recent_turns(agent_id, 10).await {
            for turn in turns {
                messages.push(ChatMessage::user(turn.message));
                messages.push(ChatMessage::assistant(turn.reply));
            }
        }
        messages.push(ChatMessage::user(message.body.clone()));
        messages
    }

    async fn log_turn(&self, agent_id: &str, message: &Inbound, reply: &str, now: i64) {
        let turn = TurnLog {
            id: Uuid::new_v4(),
            author: message.author.clone(),
            message: message.body.clone(),
            reply: reply.to_string(),
            timestamp: now,
        };
        if let Err(e) = self.store.append_turn(agent_id, &turn).await {
            tracing::warn!("could not append turn log: {}", e);
        }
    }

    /// Snapshot of the current in-memory aggregate, for inspection.
    pub async fn snapshot(&self, agent_id: &str) -> Option<AgentRecord> {
        let sessions = self.sessions.lock().await;
        match sessions.get(agent_id) {
            Some(session) => Some(session.lock().await.record.clone()),
            None => None,
        }
    }

    /// Explicit, user-triggered destruction of an agent: store rows, session,
    /// and any pending reflection all go.
    pub async fn factory_reset(&self, agent_id: &str) -> Result<()> {
        self.cancel_reflection(agent_id).await;
        self.schedulers.lock().await.remove(agent_id);
        self.sessions.lock().await.remove(agent_id);
        self.store
            .factory_reset(agent_id)
            .await
            .map_err(|e| anyhow::Error::from(CoreError::Persistence(e.to_string())))
    }
}

/// Staged result of the pure update phase, pre-commit.
struct StagedUpdate {
    record: AgentRecord,
    shifted: bool,
    topic_repeated: bool,
}

/// Map a perception onto per-trait activations: which parts of the
/// personality this interaction exercises.
fn activation_for(perception: &PerceptionRecord, laziness: f32) -> TraitVector {
    use anima_core::perception::NeedKind;
    let severity = perception.severity();
    TraitVector {
        // New information and questions exercise openness
        openness: match perception.underlying_need {
            NeedKind::Info => 0.8,
            NeedKind::Humor => 0.5,
            _ => 0.3,
        },
        // Being leaned on while tired exercises discipline
        conscientiousness: if perception.underlying_need.is_demanding() {
            0.5 + laziness * 0.5
        } else {
            0.2
        },
        // Every social exchange exercises extraversion a little
        extraversion: 0.6,
        // Hostility and praise both push on agreeableness
        agreeableness: if severity > 0.0 || perception.has_event(SocialEvent::Praise) {
            0.9
        } else {
            0.3
        },
        // Hostile intensity exercises neuroticism directly
        neuroticism: severity,
    }
}
