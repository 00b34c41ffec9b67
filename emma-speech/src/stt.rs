//! Speech-to-text engines.
//!
//! Both engines capture one phrase from the microphone into a temporary
//! WAV via a recorder subprocess, then transcribe it — offline through
//! the whisper.cpp CLI, online through an OpenAI-compatible
//! `/audio/transcriptions` endpoint. `listen` resolves only once the
//! recorder closes the phrase and transcription finishes.

use crate::util::{find_in_path, from_env_or_path, gen_id};
use async_trait::async_trait;
use emma_core::{EmmaError, Result, SpeechToText};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Microphone capture settings shared by both STT engines.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Recorder binary (`arecord` by default).
    pub recorder_bin: PathBuf,
    pub sample_rate: u32,
    /// Hard cap on a single phrase capture, in seconds.
    pub max_phrase_secs: u32,
    pub temp_dir: PathBuf,
    /// Keep captured WAV files for debugging instead of deleting them.
    pub keep_wav: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        let recorder_bin = from_env_or_path("EMMA_RECORDER_BIN", "arecord")
            .unwrap_or_else(|| PathBuf::from("arecord"));
        let temp_dir = std::env::var("EMMA_STT_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());
        Self {
            recorder_bin,
            sample_rate: 16_000,
            max_phrase_secs: 6,
            temp_dir,
            keep_wav: std::env::var("EMMA_STT_KEEP_WAV").is_ok(),
        }
    }
}

/// Capture one phrase to a temp WAV, blocking until the recorder exits.
async fn record_phrase(cfg: &RecorderConfig) -> Result<PathBuf> {
    let wav_path = cfg.temp_dir.join(format!("phrase_{}.wav", gen_id()));

    let mut cmd = Command::new(&cfg.recorder_bin);
    cmd.arg("-q");
    cmd.arg("-f").arg("S16_LE");
    cmd.arg("-c").arg("1");
    cmd.arg("-r").arg(cfg.sample_rate.to_string());
    cmd.arg("-d").arg(cfg.max_phrase_secs.to_string());
    cmd.arg(&wav_path);

    debug!(target = "stt", command = ?cmd, "recording phrase");
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .map_err(|e| EmmaError::Speech(format!("recorder task failed: {}", e)))?
        .map_err(|e| EmmaError::Speech(format!("recorder spawn failed: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EmmaError::Speech(format!(
            "recorder exited with {}: {}",
            output.status, stderr
        )));
    }
    Ok(wav_path)
}

fn discard_wav(cfg: &RecorderConfig, wav_path: &Path) {
    if cfg.keep_wav {
        info!(target = "stt", path = ?wav_path, "kept WAV for debugging");
    } else {
        let _ = std::fs::remove_file(wav_path);
    }
}

/// Offline transcription via the whisper.cpp CLI.
#[derive(Debug, Clone)]
pub struct WhisperSttConfig {
    pub recorder: RecorderConfig,
    pub whisper_bin: PathBuf,
    pub whisper_model: PathBuf,
    /// Language code passed to whisper ("en", "auto", ...).
    pub language: String,
    /// Additional whisper.cpp arguments (e.g. ["--threads", "4"]).
    pub extra_args: Vec<String>,
}

impl Default for WhisperSttConfig {
    fn default() -> Self {
        let whisper_bin = std::env::var("WHISPER_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("whisper"));
        let whisper_model = std::env::var("WHISPER_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("ggml-base.en.bin"));
        let language = std::env::var("WHISPER_LANG").unwrap_or_else(|_| "en".to_string());
        Self {
            recorder: RecorderConfig::default(),
            whisper_bin,
            whisper_model,
            language,
            extra_args: Vec::new(),
        }
    }
}

pub struct WhisperCliStt {
    cfg: WhisperSttConfig,
}

impl WhisperCliStt {
    pub fn new(cfg: WhisperSttConfig) -> Self {
        if !cfg.whisper_bin.exists() && find_in_path(&cfg.whisper_bin.to_string_lossy()).is_none() {
            warn!(
                target = "stt",
                bin = ?cfg.whisper_bin,
                "whisper binary not found; set WHISPER_BIN or install whisper.cpp"
            );
        }
        if !cfg.whisper_model.exists() {
            warn!(
                target = "stt",
                model = ?cfg.whisper_model,
                "whisper model not found; set WHISPER_MODEL_PATH or download a model"
            );
        }
        Self { cfg }
    }

    async fn transcribe(&self, wav_path: &Path) -> Result<String> {
        let mut cmd = Command::new(&self.cfg.whisper_bin);
        cmd.arg("-m").arg(&self.cfg.whisper_model);
        cmd.arg("-f").arg(wav_path);
        if !self.cfg.language.is_empty() && self.cfg.language != "auto" {
            cmd.arg("-l").arg(&self.cfg.language);
        }
        cmd.arg("--no-timestamps");
        cmd.arg("--no-prints");
        for arg in &self.cfg.extra_args {
            cmd.arg(arg);
        }

        debug!(target = "stt", command = ?cmd, "running whisper");
        let output = tokio::task::spawn_blocking(move || cmd.output())
            .await
            .map_err(|e| EmmaError::Speech(format!("whisper task failed: {}", e)))?
            .map_err(|e| EmmaError::Speech(format!("whisper spawn failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EmmaError::Speech(format!(
                "whisper exited with {}: {}",
                output.status, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(filter_whisper_stdout(&stdout))
    }
}

/// whisper.cpp mixes status lines into stdout; keep only transcript text.
fn filter_whisper_stdout(stdout: &str) -> String {
    stdout
        .lines()
        .filter(|line| {
            !line.starts_with('[')
                && !line.trim().is_empty()
                && !line.contains("whisper_")
                && !line.contains("load time")
                && !line.contains("system_info")
        })
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl SpeechToText for WhisperCliStt {
    fn name(&self) -> &'static str {
        "whisper-cli"
    }

    async fn listen(&mut self) -> Result<String> {
        let wav_path = record_phrase(&self.cfg.recorder).await?;
        let transcript = self.transcribe(&wav_path).await;
        discard_wav(&self.cfg.recorder, &wav_path);
        transcript
    }
}

/// Online transcription via an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct HostedSttConfig {
    pub recorder: RecorderConfig,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout_ms: u64,
}

impl Default for HostedSttConfig {
    fn default() -> Self {
        Self {
            recorder: RecorderConfig::default(),
            base_url: std::env::var("EMMA_SPEECH_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("EMMA_SPEECH_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            model: std::env::var("EMMA_STT_MODEL").unwrap_or_else(|_| "whisper-1".to_string()),
            request_timeout_ms: 30_000,
        }
    }
}

pub struct HostedStt {
    http: reqwest::Client,
    cfg: HostedSttConfig,
}

impl HostedStt {
    pub fn new(cfg: HostedSttConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| EmmaError::Speech(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, cfg })
    }
}

#[async_trait]
impl SpeechToText for HostedStt {
    fn name(&self) -> &'static str {
        "hosted"
    }

    async fn listen(&mut self) -> Result<String> {
        let wav_path = record_phrase(&self.cfg.recorder).await?;
        let bytes = tokio::fs::read(&wav_path).await;
        discard_wav(&self.cfg.recorder, &wav_path);
        let bytes = bytes.map_err(|e| EmmaError::Speech(format!("read capture: {}", e)))?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("phrase.wav")
            .mime_str("audio/wav")
            .map_err(|e| EmmaError::Speech(format!("build upload part: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.cfg.model.clone());

        let url = format!(
            "{}/audio/transcriptions",
            self.cfg.base_url.trim_end_matches('/')
        );
        let mut req = self.http.post(&url).multipart(form);
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| EmmaError::Speech(format!("transcription request failed: {}", e)))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmmaError::Speech(format!(
                "transcription error: status={} body={}",
                status, body
            )));
        }

        let val: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EmmaError::Speech(format!("parse transcription JSON: {}", e)))?;
        let text = val
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whisper_stdout_filter_drops_status_noise() {
        let raw = "whisper_init from model\n[00:00 --> 00:02]\n hello there \n\nsystem_info: n_threads = 4\n general kenobi\n";
        assert_eq!(filter_whisper_stdout(raw), "hello there general kenobi");
    }

    #[test]
    fn whisper_stdout_filter_handles_empty_output() {
        assert_eq!(filter_whisper_stdout(""), "");
        assert_eq!(filter_whisper_stdout("whisper_full: done\n"), "");
    }
}
