use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use vivavoce::api::{BackendClient, InterviewBackend, MemoryBackend};
use vivavoce::audio::CollectSink;
use vivavoce::capture::{CaptureConfig, CaptureFactory, CaptureSource};
use vivavoce::http::{create_router, AppState};
use vivavoce::realtime::{AgentConnector, LoopbackConnector};
use vivavoce::session::{InterviewConfig, SessionController, SessionSettings, Speaker};
use vivavoce::Config;

#[derive(Parser)]
#[command(name = "vivavoce", version, about = "Timed AI voice interview engine")]
struct Cli {
    /// Configuration file, without extension
    #[arg(long, default_value = "config/vivavoce")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control surface
    Serve,
    /// Run one offline interview end to end and print the transcript
    Run {
        /// Interview code to provision in the offline backend
        #[arg(long, default_value = "demo")]
        code: String,
        /// WAV file played as the candidate's microphone
        #[arg(long)]
        audio: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Run { code, audio } => run_once(cfg, code, audio).await,
    }
}

/// Configuration the loopback agent plays against when no remote backend is
/// configured.
fn offline_interview(code: &str) -> InterviewConfig {
    InterviewConfig {
        code: code.to_string(),
        endpoint: "loopback://agent".to_string(),
        api_key: "offline".to_string(),
        deployment: "scripted".to_string(),
        system_prompt: "You are a friendly interviewer. Ask the candidate three short \
                        questions about their engineering background."
            .to_string(),
        voice: "coral".to_string(),
        temperature: None,
    }
}

fn session_settings(cfg: &Config) -> SessionSettings {
    SessionSettings {
        duration_secs: cfg.session.duration_secs,
        ..SessionSettings::default()
    }
}

async fn serve(cfg: Config) -> Result<()> {
    info!("{} starting", cfg.service.name);

    let backend: Arc<dyn InterviewBackend> = match &cfg.backend.base_url {
        Some(base_url) => {
            info!("Using interview backend at {}", base_url);
            Arc::new(BackendClient::new(base_url.clone()))
        }
        None => {
            info!(
                "No backend configured, provisioning offline interview \"{}\"",
                cfg.backend.offline_code
            );
            Arc::new(
                MemoryBackend::new().with_interview(offline_interview(&cfg.backend.offline_code)),
            )
        }
    };
    // The agent transport is a seam; the built-in connector runs the
    // scripted loopback agent.
    let connector: Arc<dyn AgentConnector> = Arc::new(LoopbackConnector::demo());

    let capture_source = cfg.capture.source()?;
    let capture_config = CaptureConfig {
        frame_duration_ms: cfg.capture.frame_duration_ms,
        ..CaptureConfig::default()
    };

    let state = AppState::new(
        backend,
        connector,
        session_settings(&cfg),
        capture_source,
        capture_config,
    );
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP control surface listening on {}", addr);

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

async fn run_once(cfg: Config, code: String, audio: Option<PathBuf>) -> Result<()> {
    let backend = Arc::new(MemoryBackend::new().with_interview(offline_interview(&code)));
    let connector: Arc<dyn AgentConnector> = Arc::new(LoopbackConnector::demo());

    let capture_source = match audio {
        Some(path) => CaptureSource::File(path),
        None => cfg.capture.source()?,
    };
    let capture_config = CaptureConfig {
        frame_duration_ms: cfg.capture.frame_duration_ms,
        ..CaptureConfig::default()
    };
    let capture = CaptureFactory::create(capture_source, capture_config)?;

    let config = backend.fetch_config(&code).await?;
    let mut controller = SessionController::new(
        config,
        session_settings(&cfg),
        connector,
        backend.clone(),
    );

    let sink = CollectSink::new();
    controller
        .prepare(capture, Box::new(sink.clone()))
        .await
        .context("Failed to prepare media")?;
    controller.connect().await.context("Failed to connect")?;

    let handle = controller.handle();
    let summary = controller.run().await;

    println!();
    for entry in handle.transcript().await {
        match entry.speaker {
            Speaker::Agent => println!("AI: {}", entry.text),
            Speaker::User => println!("User: {}", entry.text),
            Speaker::System => println!("{}", entry.text),
        }
    }
    println!();

    if let Some(message) = summary.end_message.as_ref() {
        println!("{}", message.text);
    }

    info!(
        "Attempt {} ended ({:?}), {} transcript entries",
        summary.attempt_id, summary.end_reason, summary.transcript_entries
    );
    info!(
        "Agent audio rendered: {:.1}s",
        sink.rendered_secs(vivavoce::audio::TRANSPORT_SAMPLE_RATE)
    );
    for upload in backend.uploads().await {
        info!(
            "Uploaded {} ({} bytes, transcription {} chars)",
            upload.file_name,
            upload.bytes.len(),
            upload.transcription.len()
        );
    }

    Ok(())
}
