//! Text-to-speech engines.
//!
//! The offline engine synthesizes with piper when a voice model is
//! available and falls back to espeak-ng; the online engine fetches
//! audio from an OpenAI-compatible `/audio/speech` endpoint. Both play
//! the result through the first available CLI player and return only
//! when the player process exits, so `speak` genuinely blocks for the
//! duration of playback. With no engine installed the offline path logs
//! the text and reports success, keeping the conversation alive on
//! machines without audio output.

use crate::util::{find_in_path, from_env_or_path, gen_id};
use async_trait::async_trait;
use emma_core::{EmmaError, Result, TextToSpeech};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct LocalTtsConfig {
    pub piper_bin: Option<PathBuf>,
    pub piper_voice: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
    /// espeak voice code (e.g. "en-us"); ignored by piper.
    pub voice: String,
    /// Speech rate multiplier, 0.5 - 2.0.
    pub rate: f32,
    /// espeak amplitude multiplier, 0.5 - 2.0.
    pub volume: f32,
    pub sample_rate: u32,
    /// Player preference (aplay | paplay | ffplay).
    pub player: Option<String>,
    pub temp_dir: PathBuf,
    pub timeout_ms: u64,
}

impl Default for LocalTtsConfig {
    fn default() -> Self {
        Self {
            piper_bin: from_env_or_path("PIPER_BIN", "piper"),
            piper_voice: std::env::var("PIPER_VOICE").ok().map(PathBuf::from),
            espeak_bin: from_env_or_path("ESPEAK_BIN", "espeak-ng")
                .or_else(|| find_in_path("espeak")),
            voice: String::new(),
            rate: 1.0,
            volume: 1.0,
            sample_rate: 16_000,
            player: None,
            temp_dir: std::env::var("EMMA_TTS_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            timeout_ms: 20_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalEngine {
    Piper,
    Espeak,
    None,
}

fn select_engine(cfg: &LocalTtsConfig) -> LocalEngine {
    if cfg.piper_bin.is_some() && cfg.piper_voice.is_some() {
        return LocalEngine::Piper;
    }
    if cfg.espeak_bin.is_some() {
        return LocalEngine::Espeak;
    }
    LocalEngine::None
}

fn select_player(pref: Option<&str>) -> Option<PathBuf> {
    if let Some(p) = pref {
        if let Some(bin) = find_in_path(p) {
            return Some(bin);
        }
    }
    find_in_path("aplay")
        .or_else(|| find_in_path("paplay"))
        .or_else(|| find_in_path("ffplay"))
}

/// Play a WAV and block until the player exits.
fn play_wav(player_bin: &Path, wav_path: &Path) -> std::io::Result<()> {
    let name = player_bin
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    match name {
        "ffplay" => {
            Command::new(player_bin)
                .arg("-autoexit")
                .arg("-nodisp")
                .arg("-loglevel")
                .arg("quiet")
                .arg(wav_path)
                .status()?;
        }
        _ => {
            Command::new(player_bin).arg(wav_path).status()?;
        }
    }
    Ok(())
}

fn synth_with_piper(cfg: &LocalTtsConfig, text: &str, out_wav: &Path) -> Result<()> {
    let piper = cfg
        .piper_bin
        .as_ref()
        .ok_or_else(|| EmmaError::Speech("piper binary not found".into()))?;
    let voice = cfg
        .piper_voice
        .as_ref()
        .ok_or_else(|| EmmaError::Speech("piper voice not found; set PIPER_VOICE".into()))?;

    let mut cmd = Command::new(piper);
    cmd.arg("-m").arg(voice);
    cmd.arg("-f").arg(out_wav);
    let length_scale = (1.0f32 / cfg.rate).clamp(0.5, 2.0);
    cmd.arg("--length_scale").arg(format!("{:.2}", length_scale));
    cmd.arg("--sample_rate").arg(cfg.sample_rate.to_string());
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!(target = "tts", command = ?cmd, "running piper");
    let mut child = cmd
        .spawn()
        .map_err(|e| EmmaError::Speech(format!("piper spawn failed: {}", e)))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .map_err(|e| EmmaError::Speech(format!("piper stdin: {}", e)))?;
    }
    let output = child
        .wait_with_output()
        .map_err(|e| EmmaError::Speech(format!("piper wait: {}", e)))?;
    if !output.status.success() {
        return Err(EmmaError::Speech(format!(
            "piper failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

fn synth_with_espeak(cfg: &LocalTtsConfig, text: &str, out_wav: &Path) -> Result<()> {
    let espeak = cfg
        .espeak_bin
        .as_ref()
        .ok_or_else(|| EmmaError::Speech("espeak-ng not found".into()))?;
    let mut cmd = Command::new(espeak);
    let wpm = (160.0 * cfg.rate).round().clamp(80.0, 450.0) as i32;
    let amp = (100.0 * cfg.volume).round().clamp(50.0, 200.0) as i32;
    if !cfg.voice.is_empty() {
        cmd.arg("-v").arg(&cfg.voice);
    }
    cmd.arg("-s").arg(wpm.to_string());
    cmd.arg("-a").arg(amp.to_string());
    cmd.arg("-w").arg(out_wav);
    cmd.arg(text);

    debug!(target = "tts", command = ?cmd, "running espeak-ng");
    let output = cmd
        .output()
        .map_err(|e| EmmaError::Speech(format!("espeak spawn failed: {}", e)))?;
    if !output.status.success() {
        return Err(EmmaError::Speech(format!(
            "espeak-ng failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

/// Offline synthesis: piper preferred, espeak-ng fallback.
pub struct EspeakTts {
    cfg: LocalTtsConfig,
}

impl EspeakTts {
    pub fn new(cfg: LocalTtsConfig) -> Self {
        match select_engine(&cfg) {
            LocalEngine::Piper => info!(target = "tts", bin = ?cfg.piper_bin, "using piper"),
            LocalEngine::Espeak => info!(target = "tts", bin = ?cfg.espeak_bin, "using espeak-ng"),
            LocalEngine::None => {
                warn!(target = "tts", "no local TTS engine found; replies will be logged only")
            }
        }
        Self { cfg }
    }
}

#[async_trait]
impl TextToSpeech for EspeakTts {
    fn name(&self) -> &'static str {
        "espeak"
    }

    async fn speak(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let engine = select_engine(&self.cfg);
        if engine == LocalEngine::None {
            info!(target = "tts", reply = %text, "no engine, printing reply");
            return Ok(());
        }

        let cfg = self.cfg.clone();
        let text = text.to_string();
        let join = tokio::task::spawn_blocking(move || {
            let wav_path = cfg.temp_dir.join(format!("tts_{}.wav", gen_id()));
            let synth = match engine {
                LocalEngine::Piper => synth_with_piper(&cfg, &text, &wav_path),
                LocalEngine::Espeak => synth_with_espeak(&cfg, &text, &wav_path),
                LocalEngine::None => Ok(()),
            };
            if let Err(e) = synth {
                let _ = std::fs::remove_file(&wav_path);
                return Err(e);
            }

            if let Some(player) = select_player(cfg.player.as_deref()) {
                if let Err(e) = play_wav(&player, &wav_path) {
                    warn!(target = "tts", error = %e, "playback failed");
                }
            } else {
                info!(target = "tts", path = ?wav_path, "no audio player found; kept WAV on disk");
                return Ok(());
            }
            let _ = std::fs::remove_file(&wav_path);
            Ok(())
        });

        match tokio::time::timeout(Duration::from_millis(self.cfg.timeout_ms), join).await {
            Ok(joined) => {
                joined.map_err(|e| EmmaError::Speech(format!("tts task failed: {}", e)))?
            }
            Err(_) => Err(EmmaError::Speech(format!(
                "tts timed out after {}ms",
                self.cfg.timeout_ms
            ))),
        }
    }
}

/// Online synthesis via an OpenAI-compatible `/audio/speech` endpoint.
#[derive(Debug, Clone)]
pub struct HostedTtsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    pub player: Option<String>,
    pub temp_dir: PathBuf,
    pub request_timeout_ms: u64,
}

impl Default for HostedTtsConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("EMMA_SPEECH_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("EMMA_SPEECH_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            model: std::env::var("EMMA_TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string()),
            voice: std::env::var("EMMA_TTS_VOICE").unwrap_or_else(|_| "nova".to_string()),
            player: None,
            temp_dir: std::env::var("EMMA_TTS_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            request_timeout_ms: 30_000,
        }
    }
}

pub struct HostedTts {
    http: reqwest::Client,
    cfg: HostedTtsConfig,
}

impl HostedTts {
    pub fn new(cfg: HostedTtsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| EmmaError::Speech(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, cfg })
    }
}

#[async_trait]
impl TextToSpeech for HostedTts {
    fn name(&self) -> &'static str {
        "hosted"
    }

    async fn speak(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let url = format!("{}/audio/speech", self.cfg.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.cfg.model,
            "voice": self.cfg.voice,
            "input": text,
            "response_format": "wav",
        });
        let mut req = self.http.post(&url).json(&body);
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| EmmaError::Speech(format!("speech request failed: {}", e)))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmmaError::Speech(format!(
                "speech synthesis error: status={} body={}",
                status, body
            )));
        }
        let audio = resp
            .bytes()
            .await
            .map_err(|e| EmmaError::Speech(format!("read audio body: {}", e)))?;

        let wav_path = self.cfg.temp_dir.join(format!("tts_{}.wav", gen_id()));
        tokio::fs::write(&wav_path, &audio)
            .await
            .map_err(|e| EmmaError::Speech(format!("write audio: {}", e)))?;

        let player = select_player(self.cfg.player.as_deref());
        let play_path = wav_path.clone();
        let played = tokio::task::spawn_blocking(move || match player {
            Some(bin) => play_wav(&bin, &play_path),
            None => {
                info!(target = "tts", path = ?play_path, "no audio player found; kept WAV on disk");
                Ok(())
            }
        })
        .await
        .map_err(|e| EmmaError::Speech(format!("playback task failed: {}", e)))?;
        let _ = std::fs::remove_file(&wav_path);
        played.map_err(|e| EmmaError::Speech(format!("playback failed: {}", e)))
    }
}
