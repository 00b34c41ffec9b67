use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use emma_core::{GestureConfig, InteractionConfig, Replies};
use emma_speech::{
    GeneratorConfig, HostedSttConfig, HostedTtsConfig, LocalTtsConfig, SpeechConfig, SttProvider,
    TtsProvider, WhisperSttConfig,
};

/// High-level configuration for the Emma binary
#[derive(Clone, Debug)]
pub struct EmmaConfig {
    /// Serial device of the servo board; `None` runs without hardware.
    pub serial_port: Option<String>,
    pub gestures: GestureConfig,
    pub speech: SpeechConfig,
    pub generator: GeneratorConfig,
    pub interaction: InteractionConfig,
}

impl Default for EmmaConfig {
    fn default() -> Self {
        Self {
            serial_port: std::env::var("EMMA_SERIAL_PORT").ok().filter(|s| !s.is_empty()),
            gestures: GestureConfig::default(),
            speech: SpeechConfig::default(),
            generator: GeneratorConfig::default(),
            interaction: InteractionConfig::default(),
        }
    }
}

impl EmmaConfig {
    /// Load configuration from a TOML file (path via EMMA_CONFIG or ./emma.toml),
    /// overlaying values onto sane defaults and env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("EMMA_CONFIG").unwrap_or_else(|_| "emma.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "emma", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<EmmaToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target = "emma", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "emma", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct EmmaToml {
    pub serial_port: Option<String>,
    pub gestures: Option<GesturesToml>,
    pub speech: Option<SpeechToml>,
    pub stt: Option<SttToml>,
    pub tts: Option<TtsToml>,
    pub generator: Option<GeneratorToml>,
    pub replies: Option<RepliesToml>,
    pub interaction: Option<InteractionToml>,
}

impl EmmaToml {
    fn overlay(self, mut base: EmmaConfig) -> EmmaConfig {
        if let Some(p) = self.serial_port {
            base.serial_port = Some(p).filter(|s| !s.is_empty());
        }
        if let Some(g) = self.gestures {
            g.apply(&mut base.gestures);
        }
        if let Some(s) = self.speech {
            s.apply(&mut base.speech, &mut base.interaction);
        }
        if let Some(s) = self.stt {
            s.apply(&mut base.speech.whisper, &mut base.speech.hosted_stt);
        }
        if let Some(t) = self.tts {
            t.apply(&mut base.speech.local_tts, &mut base.speech.hosted_tts);
        }
        if let Some(g) = self.generator {
            g.apply(&mut base.generator);
        }
        if let Some(r) = self.replies {
            r.apply(&mut base.interaction.replies);
        }
        if let Some(i) = self.interaction {
            i.apply(&mut base.interaction);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct GesturesToml {
    pub step_delay_ms: Option<u64>,
    pub wave_count: Option<usize>,
    pub right_raised: Option<u8>,
    pub right_dip: Option<u8>,
    pub right_rest: Option<u8>,
    pub left_raised: Option<u8>,
    pub left_dip: Option<u8>,
    pub left_rest: Option<u8>,
    pub head_listening: Option<u8>,
    pub head_speaking: Option<u8>,
}
impl GesturesToml {
    fn apply(self, g: &mut GestureConfig) {
        if let Some(v) = self.step_delay_ms {
            g.step_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.wave_count {
            g.wave_count = v;
        }
        if let Some(v) = self.right_raised {
            g.right_raised = v;
        }
        if let Some(v) = self.right_dip {
            g.right_dip = v;
        }
        if let Some(v) = self.right_rest {
            g.right_rest = v;
        }
        if let Some(v) = self.left_raised {
            g.left_raised = v;
        }
        if let Some(v) = self.left_dip {
            g.left_dip = v;
        }
        if let Some(v) = self.left_rest {
            g.left_rest = v;
        }
        if let Some(v) = self.head_listening {
            g.head_listening = v;
        }
        if let Some(v) = self.head_speaking {
            g.head_speaking = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SpeechToml {
    pub stt_provider: Option<SttProvider>,
    pub tts_provider: Option<TtsProvider>,
    pub listen_timeout_ms: Option<u64>,
}
impl SpeechToml {
    fn apply(self, s: &mut SpeechConfig, i: &mut InteractionConfig) {
        if let Some(v) = self.stt_provider {
            s.stt = v;
        }
        if let Some(v) = self.tts_provider {
            s.tts = v;
        }
        if let Some(v) = self.listen_timeout_ms {
            i.listen_timeout = Some(Duration::from_millis(v)).filter(|d| !d.is_zero());
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SttToml {
    pub recorder_bin: Option<PathBuf>,
    pub max_phrase_secs: Option<u32>,
    pub whisper_bin: Option<PathBuf>,
    pub whisper_model: Option<PathBuf>,
    pub language: Option<String>,
    pub extra_args: Option<Vec<String>>, // e.g., ["--threads", "4"]
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}
impl SttToml {
    fn apply(self, w: &mut WhisperSttConfig, h: &mut HostedSttConfig) {
        if let Some(x) = self.recorder_bin {
            w.recorder.recorder_bin = x.clone();
            h.recorder.recorder_bin = x;
        }
        if let Some(x) = self.max_phrase_secs {
            w.recorder.max_phrase_secs = x;
            h.recorder.max_phrase_secs = x;
        }
        if let Some(x) = self.whisper_bin {
            w.whisper_bin = x;
        }
        if let Some(x) = self.whisper_model {
            w.whisper_model = x;
        }
        if let Some(x) = self.language {
            w.language = x;
        }
        if let Some(mut x) = self.extra_args {
            w.extra_args = x.drain(..).filter(|a| !a.is_empty()).collect();
        }
        if let Some(x) = self.base_url {
            h.base_url = x;
        }
        if let Some(x) = self.api_key {
            h.api_key = Some(x).filter(|s| !s.is_empty());
        }
        if let Some(x) = self.model {
            h.model = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TtsToml {
    pub piper_bin: Option<PathBuf>,
    pub piper_voice: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
    pub voice: Option<String>,
    pub rate: Option<f32>,
    pub volume: Option<f32>,
    pub sample_rate: Option<u32>,
    pub player: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub hosted_voice: Option<String>,
}
impl TtsToml {
    fn apply(self, l: &mut LocalTtsConfig, h: &mut HostedTtsConfig) {
        if let Some(x) = self.piper_bin {
            l.piper_bin = Some(x);
        }
        if let Some(x) = self.piper_voice {
            l.piper_voice = Some(x);
        }
        if let Some(x) = self.espeak_bin {
            l.espeak_bin = Some(x);
        }
        if let Some(x) = self.voice {
            l.voice = x;
        }
        if let Some(x) = self.rate {
            l.rate = x.clamp(0.5, 2.0);
        }
        if let Some(x) = self.volume {
            l.volume = x.clamp(0.5, 2.0);
        }
        if let Some(x) = self.sample_rate {
            l.sample_rate = x;
        }
        if let Some(x) = self.player {
            l.player = Some(x.clone()).filter(|s| !s.is_empty());
            h.player = Some(x).filter(|s| !s.is_empty());
        }
        if let Some(x) = self.base_url {
            h.base_url = x;
        }
        if let Some(x) = self.api_key {
            h.api_key = Some(x).filter(|s| !s.is_empty());
        }
        if let Some(x) = self.model {
            h.model = x;
        }
        if let Some(x) = self.hosted_voice {
            h.voice = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct GeneratorToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
}
impl GeneratorToml {
    fn apply(self, g: &mut GeneratorConfig) {
        if let Some(x) = self.base_url {
            g.base_url = x;
        }
        if let Some(x) = self.model {
            g.model = x;
        }
        if let Some(x) = self.api_key {
            g.api_key = Some(x).filter(|s| !s.is_empty());
        }
        if let Some(x) = self.request_timeout_ms {
            g.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            g.temperature = x;
        }
        if let Some(x) = self.max_tokens {
            g.max_tokens = x;
        }
        if let Some(x) = self.system_prompt {
            g.system_prompt = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct RepliesToml {
    pub greeting: Option<String>,
    pub farewell: Option<String>,
    pub apology: Option<String>,
}
impl RepliesToml {
    fn apply(self, r: &mut Replies) {
        if let Some(x) = self.greeting {
            r.greeting = x;
        }
        if let Some(x) = self.farewell {
            r.farewell = x;
        }
        if let Some(x) = self.apology {
            r.apology = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct InteractionToml {
    pub actuator_retry_budget: Option<u32>,
}
impl InteractionToml {
    fn apply(self, i: &mut InteractionConfig) {
        if let Some(x) = self.actuator_retry_budget {
            i.actuator_retry_budget = x.max(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overlay_keeps_unset_defaults() {
        let t: EmmaToml = toml::from_str(
            r#"
            serial_port = "/dev/ttyACM0"

            [gestures]
            wave_count = 5

            [speech]
            stt_provider = "hosted"
            listen_timeout_ms = 15000

            [replies]
            farewell = "See you later!"
            "#,
        )
        .unwrap();
        let cfg = t.overlay(EmmaConfig::default());

        assert_eq!(cfg.serial_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(cfg.gestures.wave_count, 5);
        assert_eq!(cfg.gestures.head_listening, 45);
        assert_eq!(cfg.speech.stt, SttProvider::Hosted);
        assert_eq!(cfg.speech.tts, TtsProvider::Espeak);
        assert_eq!(
            cfg.interaction.listen_timeout,
            Some(Duration::from_millis(15000))
        );
        assert_eq!(cfg.interaction.replies.farewell, "See you later!");
        assert_eq!(cfg.interaction.replies.greeting, Replies::default().greeting);
    }

    #[test]
    fn zero_listen_timeout_means_unbounded() {
        let t: EmmaToml = toml::from_str("[speech]\nlisten_timeout_ms = 0\n").unwrap();
        let cfg = t.overlay(EmmaConfig::default());
        assert_eq!(cfg.interaction.listen_timeout, None);
    }
}
