use anyhow::{Context, Result};
use clap::Parser;
use saras_voice::activation::SysfsGpioSignal;
use saras_voice::audio::AudioSource;
use saras_voice::nats::{NatsResponder, NatsSttBackend, NatsSynthesizer};
use saras_voice::{
    create_router, ActivationCoordinator, AppState, AudioBackendFactory, AudioResourceArbiter, Config,
    ConsoleSynthesizer, EchoResponder, HandshakeProbe, NatsClient, SessionDeps, SpeechSynthesizer, SttBackend,
    SttBackendSelector, TextResponder, WakeWordProbe,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "saras-voice", version, about = "Voice-activated conversational assistant")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/saras-voice")]
    config: String,

    /// Disable wake word detection
    #[arg(long)]
    no_wake: bool,

    /// Disable the handshake sensor
    #[arg(long)]
    no_handshake: bool,

    /// Do not serve the control API
    #[arg(long)]
    no_http: bool,

    /// Start one conversation right away
    #[arg(long)]
    manual: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Saras Voice v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {} (device {})", cfg.service.name, cfg.service.device_id);

    // Without a capture device there is nothing to do
    let source = AudioSource::parse(&cfg.audio.source);
    let device = AudioBackendFactory::create(source, cfg.audio.backend_config())
        .context("Failed to open audio input")?;
    let arbiter = Arc::new(AudioResourceArbiter::new(device, cfg.audio.arbiter_config()));

    let nats = if cfg.nats.enabled {
        let client = NatsClient::connect(&cfg.nats.url, cfg.service.device_id.clone())
            .await
            .context("Failed to connect to NATS")?;
        Some(Arc::new(client))
    } else {
        info!("NATS disabled, using local responder and console output");
        None
    };

    let backends: Vec<Arc<dyn SttBackend>> = match &nats {
        Some(client) => cfg
            .stt
            .backends
            .iter()
            .map(|backend| {
                Arc::new(NatsSttBackend::new(
                    Arc::clone(client),
                    backend.descriptor(),
                    backend.subject.clone(),
                    cfg.stt.request_timeout(),
                )) as Arc<dyn SttBackend>
            })
            .collect(),
        None => Vec::new(),
    };
    if backends.is_empty() {
        // Recognizers only exist on the bus
        warn!("No speech recognition backends (NATS disabled or none configured), nothing will be recognized");
    }
    let selector = Arc::new(SttBackendSelector::new(backends, cfg.stt.selector_config()));

    let responder: Arc<dyn TextResponder> = match (&nats, &cfg.responder.subject) {
        (Some(client), Some(subject)) => Arc::new(NatsResponder::new(
            Arc::clone(client),
            subject.clone(),
            cfg.responder.timeout(),
        )),
        _ => Arc::new(EchoResponder),
    };

    let synthesizer: Arc<dyn SpeechSynthesizer> = match (&nats, &cfg.speech.subject) {
        (Some(client), Some(subject)) => Arc::new(NatsSynthesizer::new(
            Arc::clone(client),
            subject.clone(),
            cfg.speech.timeout(),
        )),
        _ => Arc::new(ConsoleSynthesizer),
    };

    info!("Responder: {}, synthesizer: {}", responder.name(), synthesizer.name());

    let deps = SessionDeps {
        arbiter: Arc::clone(&arbiter),
        selector: Arc::clone(&selector),
        responder,
        synthesizer,
    };
    let coordinator = ActivationCoordinator::new(deps, cfg.session);

    if cfg.wake.enabled && !args.no_wake {
        if let Some(probe) = WakeWordProbe::try_new(Arc::clone(&arbiter), Arc::clone(&selector), cfg.wake.probe_config())
        {
            coordinator.add_detector("wake_word", Arc::new(probe), cfg.detector.detector_config());
        }
    }

    if cfg.handshake.enabled && !args.no_handshake {
        match SysfsGpioSignal::open(cfg.handshake.gpio_pin, cfg.handshake.active_low) {
            Ok(signal) => {
                let probe = HandshakeProbe::new(Arc::new(signal), cfg.handshake.probe_config());
                coordinator.add_detector("handshake", Arc::new(probe), cfg.detector.detector_config());
            }
            Err(e) => warn!("Handshake sensor unavailable: {:#}", e),
        }
    }

    coordinator.spawn_dispatcher()?;

    coordinator.on_session_state_changed(|event| {
        info!(session_id = %event.session_id, "Session state: {}", event.state);
    });

    if let Some(client) = &nats {
        let client = Arc::clone(client);
        coordinator.on_session_state_changed(move |event| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                if let Err(e) = client.publish_session_state(&event).await {
                    warn!("Failed to publish session state: {:#}", e);
                }
            });
        });
    }

    coordinator.start_detectors().await;

    if args.manual && !coordinator.trigger_manual_activation() {
        warn!("Manual activation ignored, a conversation is already running");
    }

    let server = if cfg.service.http.enabled && !args.no_http {
        let app = create_router(AppState::new(
            Arc::clone(&coordinator),
            Arc::clone(&arbiter),
            Arc::clone(&selector),
        ));
        let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("HTTP control API listening on {}", addr);

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP server failed: {}", e);
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down");
    coordinator.shutdown().await;

    if let Some(server) = server {
        server.abort();
    }

    if let Some(client) = &nats {
        if let Err(e) = client.close().await {
            warn!("Failed to flush NATS: {:#}", e);
        }
    }

    Ok(())
}
