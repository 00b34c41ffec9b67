//! Emma: an embodied conversational agent for a three-servo rig.
//!
//! Wires the motion controller, gesture library, speech engines and
//! response generator into a single interaction loop, and runs it until
//! the user says goodbye or ctrl-c lands.

mod config;

use emma_core::{
    FrameSink, GestureLibrary, InteractionLoop, MotionController, SerialLink, ServoPosition,
    TraceSink,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::EmmaConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = EmmaConfig::load();

    if let Err(e) = run(cfg).await {
        error!(target = "emma", error = %e, "session aborted");
        std::process::exit(1);
    }
}

async fn run(cfg: EmmaConfig) -> emma_core::Result<()> {
    let sink = open_sink(cfg.serial_port.as_deref()).await;
    let controller = MotionController::new(sink, ServoPosition::default());
    let gestures = GestureLibrary::new(controller, cfg.gestures);

    let speech = emma_speech::build_backend(&cfg.speech)?;
    let generator = emma_speech::build_generator(&cfg.generator)?;

    let mut session = InteractionLoop::new(gestures, speech, generator, cfg.interaction);

    info!(target = "emma", "Emma is ready");
    tokio::select! {
        res = session.run() => res,
        _ = tokio::signal::ctrl_c() => {
            info!(target = "emma", "ctrl-c received, shutting down");
            Ok(())
        }
    }
}

/// Open the serial frame sink, falling back to a trace-only sink when no
/// port is configured or the device cannot be opened.
async fn open_sink(port: Option<&str>) -> Box<dyn FrameSink> {
    let Some(port) = port else {
        info!(target = "emma", "no serial port configured, frames go to trace log");
        return Box::new(TraceSink::default());
    };
    match SerialLink::open(port).await {
        Ok(link) => Box::new(link),
        Err(e) => {
            warn!(target = "emma", port = %port, error = %e, "serial open failed, frames go to trace log");
            Box::new(TraceSink::default())
        }
    }
}
