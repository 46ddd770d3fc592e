use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::context::{AudioEnvironment, AudioSessionContext};
use super::transcript::{Role, Transcript, TranscriptEntry};
use super::{PostSessionView, SessionState, TeardownReason, VisualizerState, VoicePreferences};
use crate::audio::{decode_buffer, AudioFrame, CapturePipeline, EncodedChunk};
use crate::content::{build_system_instruction, Scenario, Topic, UserLevel};
use crate::error::SessionError;
use crate::playback::{PlaybackScheduler, SourceId};
use crate::progress::{Category, ProgressSink};
use crate::transport::{LiveTransport, ServerEvent, SessionEvent, SessionSetup};

/// Settling delay between tearing down an old session and acquiring the
/// microphone for a new one, so device handles have time to free.
pub const RESTART_GRACE: Duration = Duration::from_millis(100);

/// Resources held only while a session is live. Dropped as a unit on
/// teardown so release is attempted exactly once per resource.
struct LiveResources {
    context: AudioSessionContext,
    scheduler: PlaybackScheduler,
    /// Wired on the open acknowledgment, not before
    capture: Option<CapturePipeline>,
    /// Microphone frames held until the capture pipeline is wired
    frames: Option<mpsc::Receiver<AudioFrame>>,
    outbound: mpsc::Sender<EncodedChunk>,
    events: mpsc::Receiver<SessionEvent>,
    ended_rx: mpsc::UnboundedReceiver<SourceId>,
}

enum LoopEvent {
    Session(SessionEvent),
    PlaybackEnded(SourceId),
    Disconnected,
}

/// State machine owning the lifecycle of one live voice session.
///
/// Exactly one live session exists at a time. All mutable session state
/// lives on this object and is driven from one task, so the three
/// independent callback sources (capture frames, remote messages, playback
/// completions) cannot race; ordering is still enforced explicitly.
pub struct SessionController {
    transport: Arc<dyn LiveTransport>,
    audio_env: Arc<dyn AudioEnvironment>,
    progress: Arc<dyn ProgressSink>,
    live_model: String,

    level: UserLevel,
    voice: VoicePreferences,
    topic: Option<Topic>,
    scenario: Option<Scenario>,

    state: SessionState,
    visualizer: VisualizerState,
    error: Option<String>,
    post_session_view: PostSessionView,
    transcript: Transcript,

    /// Single-flight guard: a second start while one is in flight is a no-op
    starting: bool,

    live: Option<LiveResources>,
}

impl SessionController {
    pub fn new(
        transport: Arc<dyn LiveTransport>,
        audio_env: Arc<dyn AudioEnvironment>,
        progress: Arc<dyn ProgressSink>,
        live_model: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            audio_env,
            progress,
            live_model: live_model.into(),
            level: UserLevel::PreA1,
            voice: VoicePreferences::default(),
            topic: None,
            scenario: None,
            state: SessionState::Idle,
            visualizer: VisualizerState::Idle,
            error: None,
            post_session_view: PostSessionView::ScenarioList,
            transcript: Transcript::new(),
            starting: false,
            live: None,
        }
    }

    // --- Selection inputs from the UI layer ---

    pub fn set_level(&mut self, level: UserLevel) {
        self.level = level;
    }

    pub fn set_voice_preferences(&mut self, voice: VoicePreferences) {
        self.voice = voice;
    }

    pub fn select_topic(&mut self, topic: Topic) {
        self.topic = Some(topic);
    }

    pub fn select_scenario(&mut self, scenario: Scenario) {
        self.scenario = Some(scenario);
    }

    // --- Observable state ---

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn visualizer(&self) -> VisualizerState {
        self.visualizer
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn post_session_view(&self) -> PostSessionView {
        self.post_session_view
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        self.transcript.entries()
    }

    pub fn is_active(&self) -> bool {
        self.live.is_some()
    }

    // --- Lifecycle ---

    /// Start a live session for the selected scenario.
    ///
    /// Requires a selected topic and scenario. A start while another start
    /// is in flight is ignored. Starting while a session is connected fully
    /// tears the old one down, then waits out a short grace delay before the
    /// new session acquires the microphone.
    pub async fn start_session(&mut self) -> Result<(), SessionError> {
        if self.starting || self.state == SessionState::Connecting {
            warn!("Ignoring session start: another start is in flight");
            return Ok(());
        }

        let (topic, scenario) = match (self.topic.clone(), self.scenario.clone()) {
            (Some(topic), Some(scenario)) => (topic, scenario),
            _ => {
                let err = SessionError::NoScenarioSelected;
                self.error = Some(err.user_message());
                return Err(err);
            }
        };

        self.starting = true;

        if self.live.is_some() {
            self.teardown(TeardownReason::Restarting).await;
            tokio::time::sleep(RESTART_GRACE).await;
        }

        // A fresh attempt must not inherit stale error state from a
        // previous failed session.
        self.error = None;
        self.post_session_view = PostSessionView::ScenarioList;
        self.transcript.clear();

        let result = self.start_inner(&topic, &scenario).await;
        self.starting = false;

        if let Err(e) = &result {
            self.error = Some(e.user_message());
        }
        result
    }

    async fn start_inner(
        &mut self,
        topic: &Topic,
        scenario: &Scenario,
    ) -> Result<(), SessionError> {
        let mic = self
            .audio_env
            .create_microphone()
            .map_err(|e| SessionError::Device(e.to_string()))?;

        let mut context = AudioSessionContext::new(mic);
        context
            .resume()
            .map_err(|e| SessionError::Device(e.to_string()))?;

        let frames = context
            .acquire_microphone()
            .await
            .map_err(|e| SessionError::Device(e.to_string()))?;

        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let sink = self.audio_env.create_sink(ended_tx);
        let mut scheduler = PlaybackScheduler::new(sink);

        self.state = SessionState::Connecting;

        let setup = SessionSetup {
            model: self.live_model.clone(),
            voice_name: self.voice.voice_name().to_string(),
            system_instruction: build_system_instruction(self.level, topic, scenario),
        };

        match self.transport.connect(setup).await {
            Ok(session) => {
                self.live = Some(LiveResources {
                    context,
                    scheduler,
                    capture: None,
                    frames: Some(frames),
                    outbound: session.outbound,
                    events: session.events,
                    ended_rx,
                });
                self.visualizer = VisualizerState::Listening;
                info!("Session connecting: topic '{}'", topic.label);
                Ok(())
            }
            Err(e) => {
                // Connect failure is a transport error: release what we
                // acquired and keep the learner on the preparation view.
                context.close().await;
                scheduler.stop_all();
                self.state = SessionState::Closed;
                self.visualizer = VisualizerState::Idle;
                self.post_session_view = PostSessionView::Preparation;
                Err(SessionError::Transport(e.to_string()))
            }
        }
    }

    /// Explicit user-initiated stop
    pub async fn stop_session(&mut self) {
        self.teardown(TeardownReason::UserRequested).await;
    }

    /// Stop and record completion with the progress collaborator.
    ///
    /// Completion is recorded before teardown; the collaborator may depend
    /// on session metadata that teardown clears.
    pub async fn finish_session(&mut self) {
        if let Some(topic) = &self.topic {
            if let Err(e) = self.progress.mark_complete(Category::Live, &topic.id) {
                warn!("Failed to record completion for '{}': {}", topic.id, e);
            }
        }
        self.teardown(TeardownReason::UserRequested).await;
    }

    /// Drive the session until it ends
    pub async fn run(&mut self) {
        while self.process_next().await {}
    }

    /// Process one inbound event (remote message or playback completion).
    ///
    /// Returns false once the session is no longer active. Exposed so tests
    /// and embedders can drive the loop deterministically.
    pub async fn process_next(&mut self) -> bool {
        let event = {
            let Some(live) = self.live.as_mut() else {
                return false;
            };

            tokio::select! {
                ev = live.events.recv() => match ev {
                    Some(ev) => LoopEvent::Session(ev),
                    None => LoopEvent::Disconnected,
                },
                id = live.ended_rx.recv() => match id {
                    Some(id) => LoopEvent::PlaybackEnded(id),
                    None => LoopEvent::Disconnected,
                },
            }
        };

        match event {
            LoopEvent::Session(ev) => self.handle_session_event(ev).await,
            LoopEvent::PlaybackEnded(id) => self.handle_playback_ended(id),
            LoopEvent::Disconnected => {
                debug!("Event channel dropped, closing session");
                self.teardown(TeardownReason::UserRequested).await;
            }
        }

        self.live.is_some()
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Opened => {
                let Some(live) = self.live.as_mut() else {
                    return;
                };

                // Wire the capture pipeline only now: the outbound channel
                // is not usable until the remote acknowledges open.
                if let Some(frames) = live.frames.take() {
                    live.capture = Some(CapturePipeline::spawn(frames, live.outbound.clone()));
                }

                self.state = SessionState::Connected;
                self.visualizer = VisualizerState::Listening;
                info!("Live session connected");
            }
            SessionEvent::Message(ev) => self.handle_server_event(ev),
            SessionEvent::Closed => {
                info!("Live session closed by remote");
                self.teardown(TeardownReason::UserRequested).await;
            }
            SessionEvent::Error(msg) => {
                error!("Live session error: {}", msg);
                let err = SessionError::Transport(msg);
                self.error = Some(err.user_message());
                self.teardown(TeardownReason::ErrorRecovered).await;
            }
        }
    }

    fn handle_server_event(&mut self, event: ServerEvent) {
        let Some(live) = self.live.as_mut() else {
            return;
        };

        if let Some(text) = &event.output_transcription {
            self.visualizer = VisualizerState::Speaking;
            self.transcript.push_delta(Role::Model, text);
        }

        if let Some(text) = &event.input_transcription {
            self.visualizer = VisualizerState::Listening;
            self.transcript.push_delta(Role::User, text);
        }

        if let Some(data) = &event.audio_data {
            self.visualizer = VisualizerState::Speaking;
            match decode_buffer(data) {
                Ok(buffer) => {
                    live.scheduler.schedule(buffer);
                }
                Err(e) => {
                    // One bad chunk is dropped; the session continues.
                    warn!("Dropping malformed audio chunk: {}", e);
                }
            }
        }

        if event.interrupted {
            live.scheduler.interrupt();
            self.visualizer = VisualizerState::Listening;
        }
    }

    fn handle_playback_ended(&mut self, id: SourceId) {
        let Some(live) = self.live.as_mut() else {
            return;
        };

        if live.scheduler.on_source_ended(id) {
            // Last in-flight source finished: the agent stopped talking.
            self.visualizer = VisualizerState::Listening;
        }
    }

    /// Release all session resources and land on the view the reason calls
    /// for. Synchronous from the caller's perspective; each resource release
    /// is attempted exactly once.
    async fn teardown(&mut self, reason: TeardownReason) {
        if reason == TeardownReason::ErrorRecovered {
            self.state = SessionState::ErrorRecovering;
        }

        if let Some(mut live) = self.live.take() {
            if let Some(mut capture) = live.capture.take() {
                capture.shutdown();
            }
            live.scheduler.stop_all();
            live.context.close().await;
        }

        self.state = SessionState::Closed;
        self.visualizer = VisualizerState::Idle;
        self.starting = false;

        self.post_session_view = match reason {
            TeardownReason::UserRequested => PostSessionView::ScenarioList,
            // Keep the learner's context after an error or restart instead
            // of implying their progress was lost.
            TeardownReason::ErrorRecovered | TeardownReason::Restarting => {
                PostSessionView::Preparation
            }
        };

        debug!("Session torn down ({:?})", reason);
    }
}
