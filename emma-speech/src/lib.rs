//! Concrete speech and generation engines for Emma.
//!
//! Each concern — speech-to-text, text-to-speech, response generation —
//! has an offline engine driven by local CLI tools and an online engine
//! driven by an OpenAI-compatible HTTP API. Providers are picked once at
//! startup from configuration and bound into the core's capability
//! traits; there is no mid-session switching.

mod generate;
mod stt;
mod tts;
mod util;

pub use generate::{GeneratorConfig, HostedGenerator};
pub use stt::{HostedStt, HostedSttConfig, RecorderConfig, WhisperCliStt, WhisperSttConfig};
pub use tts::{EspeakTts, HostedTts, HostedTtsConfig, LocalTtsConfig};

use emma_core::{Result, SpeechBackend, TextGenerator};
use serde::Deserialize;
use tracing::info;

/// Which speech-to-text engine to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SttProvider {
    /// whisper.cpp on locally recorded audio (offline).
    #[default]
    WhisperCli,
    /// OpenAI-compatible `/audio/transcriptions` endpoint (online).
    Hosted,
}

/// Which text-to-speech engine to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TtsProvider {
    /// piper with an espeak-ng fallback (offline).
    #[default]
    Espeak,
    /// OpenAI-compatible `/audio/speech` endpoint (online).
    Hosted,
}

/// Full speech stack selection plus per-engine settings.
#[derive(Debug, Clone, Default)]
pub struct SpeechConfig {
    pub stt: SttProvider,
    pub tts: TtsProvider,
    pub whisper: WhisperSttConfig,
    pub hosted_stt: HostedSttConfig,
    pub local_tts: LocalTtsConfig,
    pub hosted_tts: HostedTtsConfig,
}

/// Construct the session's speech backend from configuration.
pub fn build_backend(cfg: &SpeechConfig) -> Result<SpeechBackend> {
    info!(target = "speech", stt = ?cfg.stt, tts = ?cfg.tts, "selecting speech engines");
    let stt: Box<dyn emma_core::SpeechToText> = match cfg.stt {
        SttProvider::WhisperCli => Box::new(WhisperCliStt::new(cfg.whisper.clone())),
        SttProvider::Hosted => Box::new(HostedStt::new(cfg.hosted_stt.clone())?),
    };
    let tts: Box<dyn emma_core::TextToSpeech> = match cfg.tts {
        TtsProvider::Espeak => Box::new(EspeakTts::new(cfg.local_tts.clone())),
        TtsProvider::Hosted => Box::new(HostedTts::new(cfg.hosted_tts.clone())?),
    };
    Ok(SpeechBackend::new(stt, tts))
}

/// Construct the session's response generator.
pub fn build_generator(cfg: &GeneratorConfig) -> Result<Box<dyn TextGenerator>> {
    Ok(Box::new(HostedGenerator::new(cfg.clone())?))
}
