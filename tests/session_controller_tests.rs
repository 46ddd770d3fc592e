// Integration tests for the session controller state machine
//
// The transport and the audio environment are swapped for fakes, so every
// remote callback interleaving can be scripted deterministically: open,
// transcript deltas, inline audio, interruption, errors, and teardown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use habla_live::audio::{encode_chunk, AudioFrame, EncodedChunk, MicrophoneSource};
use habla_live::playback::{AudioSink, ManualSink, ManualSinkHandle, SourceId};
use habla_live::progress::{Category, ProgressSink};
use habla_live::session::AudioEnvironment;
use habla_live::{
    LiveSession, LiveTransport, PostSessionView, Role, Scenario, ServerEvent, SessionController,
    SessionError, SessionEvent, SessionSetup, SessionState, Topic, VisualizerState,
};

// --- Fakes ---

struct FakeTransport {
    sessions: Mutex<VecDeque<anyhow::Result<LiveSession>>>,
    connects: AtomicUsize,
}

impl FakeTransport {
    fn new() -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
            connects: AtomicUsize::new(0),
        }
    }

    fn script(&self, session: anyhow::Result<LiveSession>) {
        self.sessions.lock().unwrap().push_back(session);
    }

    fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LiveTransport for FakeTransport {
    async fn connect(&self, _setup: SessionSetup) -> anyhow::Result<LiveSession> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no session scripted")))
    }
}

struct TrackedMicrophone {
    capturing: Arc<AtomicBool>,
    tx: Option<mpsc::Sender<AudioFrame>>,
}

#[async_trait::async_trait]
impl MicrophoneSource for TrackedMicrophone {
    async fn start(&mut self) -> anyhow::Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(16);
        self.tx = Some(tx);
        self.capturing.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        drop(self.tx.take());
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "tracked"
    }
}

#[derive(Default)]
struct FakeAudioEnvironment {
    fail_microphone: AtomicBool,
    microphones: Mutex<Vec<Arc<AtomicBool>>>,
    sinks: Mutex<Vec<ManualSinkHandle>>,
}

impl FakeAudioEnvironment {
    fn microphone_count(&self) -> usize {
        self.microphones.lock().unwrap().len()
    }

    fn microphone_capturing(&self, index: usize) -> bool {
        self.microphones.lock().unwrap()[index].load(Ordering::SeqCst)
    }

    fn sink_handle(&self, index: usize) -> ManualSinkHandle {
        self.sinks.lock().unwrap()[index].clone()
    }
}

impl AudioEnvironment for FakeAudioEnvironment {
    fn create_microphone(&self) -> anyhow::Result<Box<dyn MicrophoneSource>> {
        if self.fail_microphone.load(Ordering::SeqCst) {
            anyhow::bail!("microphone permission denied");
        }

        let capturing = Arc::new(AtomicBool::new(false));
        self.microphones.lock().unwrap().push(Arc::clone(&capturing));
        Ok(Box::new(TrackedMicrophone {
            capturing,
            tx: None,
        }))
    }

    fn create_sink(&self, ended_tx: mpsc::UnboundedSender<SourceId>) -> Box<dyn AudioSink> {
        let sink = ManualSink::new(ended_tx);
        self.sinks.lock().unwrap().push(sink.handle());
        Box::new(sink)
    }
}

#[derive(Default)]
struct FakeProgress {
    completed: Mutex<Vec<(Category, String)>>,
}

impl ProgressSink for FakeProgress {
    fn mark_complete(&self, category: Category, id: &str) -> anyhow::Result<()> {
        self.completed
            .lock()
            .unwrap()
            .push((category, id.to_string()));
        Ok(())
    }
}

// --- Helpers ---

struct Remote {
    events: mpsc::Sender<SessionEvent>,
    _outbound: mpsc::Receiver<EncodedChunk>,
}

fn scripted_session() -> (LiveSession, Remote) {
    let (outbound_tx, outbound_rx) = mpsc::channel(64);
    let (events_tx, events_rx) = mpsc::channel(64);

    (
        LiveSession {
            outbound: outbound_tx,
            events: events_rx,
        },
        Remote {
            events: events_tx,
            _outbound: outbound_rx,
        },
    )
}

fn demo_topic() -> Topic {
    Topic {
        id: "cafe".to_string(),
        label: "En el caf\u{e9}".to_string(),
        cefr_goal: "Can order food and drink".to_string(),
    }
}

fn demo_scenario() -> Scenario {
    Scenario {
        title: "Pedir un caf\u{e9}".to_string(),
        description: "Ordena una bebida.".to_string(),
        roleplay_context: "You are a waiter; the student is a customer.".to_string(),
        vocabulary: vec![],
    }
}

struct Harness {
    controller: SessionController,
    transport: Arc<FakeTransport>,
    env: Arc<FakeAudioEnvironment>,
    progress: Arc<FakeProgress>,
}

fn harness() -> Harness {
    let transport = Arc::new(FakeTransport::new());
    let env = Arc::new(FakeAudioEnvironment::default());
    let progress = Arc::new(FakeProgress::default());

    let mut controller = SessionController::new(
        Arc::clone(&transport) as Arc<dyn LiveTransport>,
        Arc::clone(&env) as Arc<dyn AudioEnvironment>,
        Arc::clone(&progress) as Arc<dyn ProgressSink>,
        "test-model",
    );
    controller.select_topic(demo_topic());
    controller.select_scenario(demo_scenario());

    Harness {
        controller,
        transport,
        env,
        progress,
    }
}

fn audio_event(duration_secs: f64) -> ServerEvent {
    let chunk = encode_chunk(&vec![0.0; (duration_secs * 24000.0).round() as usize]);
    ServerEvent {
        audio_data: Some(chunk.data),
        ..ServerEvent::default()
    }
}

async fn open_session(harness: &mut Harness) -> Remote {
    let (session, remote) = scripted_session();
    harness.transport.script(Ok(session));

    harness.controller.start_session().await.unwrap();
    assert_eq!(harness.controller.state(), SessionState::Connecting);

    remote.events.send(SessionEvent::Opened).await.unwrap();
    assert!(harness.controller.process_next().await);
    assert!(harness.controller.connected());

    remote
}

// --- Tests ---

#[tokio::test]
async fn test_clean_session_plays_chunks_back_to_back() {
    let mut harness = harness();
    let remote = open_session(&mut harness).await;

    for duration in [1.0, 0.5, 0.8] {
        remote
            .events
            .send(SessionEvent::Message(audio_event(duration)))
            .await
            .unwrap();
        assert!(harness.controller.process_next().await);
    }

    assert_eq!(harness.controller.visualizer(), VisualizerState::Speaking);

    let started = harness.env.sink_handle(0).started();
    assert_eq!(started.len(), 3);
    assert!((started[0].1 - 0.0).abs() < 1e-9);
    assert!((started[1].1 - 1.0).abs() < 1e-9);
    assert!((started[2].1 - 1.5).abs() < 1e-9);
    assert!((started[2].1 + started[2].2 - 2.3).abs() < 1e-9);
}

#[tokio::test]
async fn test_interruption_mid_turn_flushes_and_reschedules_from_now() {
    let mut harness = harness();
    let remote = open_session(&mut harness).await;

    for duration in [1.0, 0.5, 0.8] {
        remote
            .events
            .send(SessionEvent::Message(audio_event(duration)))
            .await
            .unwrap();
        assert!(harness.controller.process_next().await);
    }

    let sink = harness.env.sink_handle(0);
    let started = sink.started();

    // First chunk finished naturally, then the user talks over the agent
    sink.set_now(1.2);
    sink.complete(started[0].0);
    assert!(harness.controller.process_next().await);

    remote
        .events
        .send(SessionEvent::Message(ServerEvent {
            interrupted: true,
            ..ServerEvent::default()
        }))
        .await
        .unwrap();
    assert!(harness.controller.process_next().await);

    assert_eq!(harness.controller.visualizer(), VisualizerState::Listening);
    let stopped = sink.stopped();
    assert!(stopped.contains(&started[1].0));
    assert!(stopped.contains(&started[2].0));

    // Next turn schedules at the clock, not at the stale 2.3s cursor
    remote
        .events
        .send(SessionEvent::Message(audio_event(0.4)))
        .await
        .unwrap();
    assert!(harness.controller.process_next().await);

    let started = sink.started();
    assert_eq!(started.len(), 4);
    assert!((started[3].1 - 1.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_playback_idle_returns_visualizer_to_listening() {
    let mut harness = harness();
    let remote = open_session(&mut harness).await;

    remote
        .events
        .send(SessionEvent::Message(audio_event(0.5)))
        .await
        .unwrap();
    assert!(harness.controller.process_next().await);
    assert_eq!(harness.controller.visualizer(), VisualizerState::Speaking);

    let sink = harness.env.sink_handle(0);
    sink.complete(sink.started()[0].0);
    assert!(harness.controller.process_next().await);
    assert_eq!(harness.controller.visualizer(), VisualizerState::Listening);
}

#[tokio::test]
async fn test_transcript_deltas_coalesce_by_role() {
    let mut harness = harness();
    let remote = open_session(&mut harness).await;

    let deltas = [
        (Some("Hel"), None),
        (Some("lo!"), None),
        (None, Some("Hi ")),
        (None, Some("there")),
        (Some("How are you?"), None),
    ];

    for (output, input) in deltas {
        remote
            .events
            .send(SessionEvent::Message(ServerEvent {
                output_transcription: output.map(String::from),
                input_transcription: input.map(String::from),
                ..ServerEvent::default()
            }))
            .await
            .unwrap();
        assert!(harness.controller.process_next().await);
    }

    let transcript = harness.controller.transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[0].role, Role::Model);
    assert_eq!(transcript[0].text, "Hello!");
    assert_eq!(transcript[1].role, Role::User);
    assert_eq!(transcript[1].text, "Hi there");
    assert_eq!(transcript[2].role, Role::Model);
    assert_eq!(transcript[2].text, "How are you?");
}

#[tokio::test]
async fn test_malformed_audio_chunk_is_dropped_session_continues() {
    let mut harness = harness();
    let remote = open_session(&mut harness).await;

    remote
        .events
        .send(SessionEvent::Message(ServerEvent {
            audio_data: Some("!!!not-base64!!!".to_string()),
            ..ServerEvent::default()
        }))
        .await
        .unwrap();
    assert!(harness.controller.process_next().await);

    assert!(harness.controller.connected());
    assert!(harness.env.sink_handle(0).started().is_empty());

    // A good chunk afterwards still plays
    remote
        .events
        .send(SessionEvent::Message(audio_event(0.5)))
        .await
        .unwrap();
    assert!(harness.controller.process_next().await);
    assert_eq!(harness.env.sink_handle(0).started().len(), 1);
}

#[tokio::test]
async fn test_double_start_is_single_flight() {
    let mut harness = harness();
    let (session, _remote) = scripted_session();
    harness.transport.script(Ok(session));

    harness.controller.start_session().await.unwrap();
    // Second start before the open acknowledgment: must not reconnect or
    // grab a second microphone.
    harness.controller.start_session().await.unwrap();

    assert_eq!(harness.transport.connect_count(), 1);
    assert_eq!(harness.env.microphone_count(), 1);
}

#[tokio::test]
async fn test_restart_releases_old_microphone_before_acquiring_new() {
    let mut harness = harness();
    let _first_remote = open_session(&mut harness).await;

    let second_remote = open_session(&mut harness).await;

    assert_eq!(harness.transport.connect_count(), 2);
    assert_eq!(harness.env.microphone_count(), 2);
    assert!(
        !harness.env.microphone_capturing(0),
        "Old microphone must be released"
    );
    assert!(harness.env.microphone_capturing(1));

    drop(second_remote);
}

#[tokio::test]
async fn test_transport_error_releases_resources_and_keeps_prep_view() {
    let mut harness = harness();
    let remote = open_session(&mut harness).await;

    remote
        .events
        .send(SessionEvent::Error("socket reset".to_string()))
        .await
        .unwrap();
    assert!(!harness.controller.process_next().await);

    assert_eq!(harness.controller.state(), SessionState::Closed);
    assert!(!harness.controller.connected());
    assert!(!harness.controller.is_active());
    assert_eq!(
        harness.controller.error(),
        Some("Conexi\u{f3}n perdida. Intenta de nuevo.")
    );
    assert_eq!(
        harness.controller.post_session_view(),
        PostSessionView::Preparation
    );
    assert!(!harness.env.microphone_capturing(0));
}

#[tokio::test]
async fn test_error_state_does_not_leak_into_next_session() {
    let mut harness = harness();
    let remote = open_session(&mut harness).await;

    remote
        .events
        .send(SessionEvent::Error("socket reset".to_string()))
        .await
        .unwrap();
    assert!(!harness.controller.process_next().await);
    assert!(harness.controller.error().is_some());

    // A fresh, successful session must clear the stale error state
    let _remote = open_session(&mut harness).await;
    assert!(harness.controller.error().is_none());

    harness.controller.stop_session().await;
    assert_eq!(
        harness.controller.post_session_view(),
        PostSessionView::ScenarioList
    );
}

#[tokio::test]
async fn test_connect_failure_keeps_prep_view_and_releases_microphone() {
    let mut harness = harness();
    harness
        .transport
        .script(Err(anyhow::anyhow!("connection refused")));

    let result = harness.controller.start_session().await;
    assert!(matches!(result, Err(SessionError::Transport(_))));

    assert_eq!(harness.controller.state(), SessionState::Closed);
    assert!(harness.controller.error().is_some());
    assert_eq!(
        harness.controller.post_session_view(),
        PostSessionView::Preparation
    );
    assert!(!harness.env.microphone_capturing(0));
}

#[tokio::test]
async fn test_microphone_denial_is_fatal_without_retry() {
    let mut harness = harness();
    harness.env.fail_microphone.store(true, Ordering::SeqCst);

    let result = harness.controller.start_session().await;
    assert!(matches!(result, Err(SessionError::Device(_))));
    assert!(harness.controller.error().is_some());
    assert!(!harness.controller.is_active());
    assert_eq!(harness.transport.connect_count(), 0, "No retry, no connect");
}

#[tokio::test]
async fn test_start_without_scenario_fails() {
    let transport = Arc::new(FakeTransport::new());
    let env = Arc::new(FakeAudioEnvironment::default());
    let progress = Arc::new(FakeProgress::default());

    let mut controller = SessionController::new(
        Arc::clone(&transport) as Arc<dyn LiveTransport>,
        Arc::clone(&env) as Arc<dyn AudioEnvironment>,
        Arc::clone(&progress) as Arc<dyn ProgressSink>,
        "test-model",
    );

    let result = controller.start_session().await;
    assert!(matches!(result, Err(SessionError::NoScenarioSelected)));
    assert!(controller.error().is_some());
    assert_eq!(env.microphone_count(), 0);
}

#[tokio::test]
async fn test_finish_session_records_completion() {
    let mut harness = harness();
    let _remote = open_session(&mut harness).await;

    harness.controller.finish_session().await;

    let completed = harness.progress.completed.lock().unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0], (Category::Live, "cafe".to_string()));
    drop(completed);

    assert!(!harness.controller.is_active());
    assert_eq!(
        harness.controller.post_session_view(),
        PostSessionView::ScenarioList
    );
}

#[tokio::test]
async fn test_remote_close_tears_down_normally() {
    let mut harness = harness();
    let remote = open_session(&mut harness).await;

    remote.events.send(SessionEvent::Closed).await.unwrap();
    assert!(!harness.controller.process_next().await);

    assert_eq!(harness.controller.state(), SessionState::Closed);
    assert!(harness.controller.error().is_none());
    assert!(!harness.env.microphone_capturing(0));
}
