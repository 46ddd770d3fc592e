use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use habla_live::playback::{AudioSink, SourceId, TimerSink};
use habla_live::session::AudioEnvironment;
use habla_live::{
    Config, GeminiLiveTransport, MicrophoneSource, ProgressTracker, Scenario, SessionController,
    Topic, VocabItem, WavMicrophone,
};

#[derive(Parser)]
#[command(name = "habla-live", about = "Run a live English tutoring voice session")]
struct Args {
    /// Config file (without extension)
    #[arg(long, default_value = "config/habla-live")]
    config: String,

    /// WAV file standing in for the microphone
    #[arg(long)]
    input: PathBuf,

    /// Topic label for the roleplay
    #[arg(long, default_value = "En el caf\u{e9}")]
    topic: String,
}

/// Audio environment backed by a WAV file and timer-driven playback
struct WavAudioEnvironment {
    input: PathBuf,
}

impl AudioEnvironment for WavAudioEnvironment {
    fn create_microphone(&self) -> Result<Box<dyn MicrophoneSource>> {
        Ok(Box::new(WavMicrophone::new(&self.input)))
    }

    fn create_sink(&self, ended_tx: mpsc::UnboundedSender<SourceId>) -> Box<dyn AudioSink> {
        Box::new(TimerSink::new(ended_tx))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let cfg = Config::load(&args.config).unwrap_or_else(|_| {
        info!("No config file at '{}', using defaults", args.config);
        Config::default()
    });

    info!("{} starting", cfg.service.name);

    let api_key = std::env::var(&cfg.live.api_key_env)
        .with_context(|| format!("Set {} to your API key", cfg.live.api_key_env))?;

    let transport = Arc::new(GeminiLiveTransport::new(cfg.live.endpoint.clone(), api_key));
    let audio_env = Arc::new(WavAudioEnvironment { input: args.input });
    let progress = Arc::new(ProgressTracker::open(&cfg.progress.path)?);

    let mut controller =
        SessionController::new(transport, audio_env, progress, cfg.live.model.clone());

    controller.select_topic(Topic {
        id: "cli-demo".to_string(),
        label: args.topic.clone(),
        cefr_goal: "Can order food and drink using basic phrases".to_string(),
    });
    controller.select_scenario(Scenario {
        title: args.topic.clone(),
        description: "Practica una conversaci\u{f3}n corta.".to_string(),
        roleplay_context: "You are a waiter in a small cafe; the student is a customer."
            .to_string(),
        vocabulary: vec![
            VocabItem {
                word: "coffee".to_string(),
                translation: "caf\u{e9}".to_string(),
            },
            VocabItem {
                word: "please".to_string(),
                translation: "por favor".to_string(),
            },
        ],
    });

    controller.start_session().await?;

    tokio::select! {
        _ = controller.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, finishing session");
        }
    }

    if controller.error().is_none() {
        controller.finish_session().await;
    } else {
        controller.stop_session().await;
    }

    if let Some(error) = controller.error() {
        println!("Session ended with error: {}", error);
    }

    for entry in controller.transcript() {
        println!("[{:?}] {}", entry.role, entry.text);
    }

    Ok(())
}
