//! Speech and text-generation capability contracts.
//!
//! Concrete engines live outside the core; each concern is a trait
//! implemented once per provider and selected at startup. The contract
//! is blocking from the caller's point of view: `listen` resolves only
//! at a complete phrase boundary and `speak` only after playback ends.

use crate::intent::{classify, Intent};
use crate::Result;
use async_trait::async_trait;
use tracing::debug;

/// One transcribed phrase plus its classified intent.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Utterance {
    pub text: String,
    pub intent: Intent,
}

impl Utterance {
    pub fn from_text(text: String) -> Self {
        let intent = classify(&text);
        Self { text, intent }
    }
}

/// Speech-to-text capability. `listen` blocks until the engine reports
/// a complete spoken phrase; it may block indefinitely if nothing is
/// ever said, unless the caller wraps it in a timeout.
#[async_trait]
pub trait SpeechToText: Send {
    fn name(&self) -> &'static str;
    async fn listen(&mut self) -> Result<String>;
}

/// Text-to-speech capability. `speak` returns only once playback of the
/// synthesized utterance has completed.
#[async_trait]
pub trait TextToSpeech: Send {
    fn name(&self) -> &'static str;
    async fn speak(&mut self, text: &str) -> Result<()>;
}

/// Free-form response generation for non-greeting conversation turns.
#[async_trait]
pub trait TextGenerator: Send {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// One STT engine and one TTS engine, bound for the whole session.
pub struct SpeechBackend {
    stt: Box<dyn SpeechToText>,
    tts: Box<dyn TextToSpeech>,
}

impl SpeechBackend {
    pub fn new(stt: Box<dyn SpeechToText>, tts: Box<dyn TextToSpeech>) -> Self {
        Self { stt, tts }
    }

    /// Block for the next phrase and classify it.
    pub async fn listen(&mut self) -> Result<Utterance> {
        let text = self.stt.listen().await?;
        let utterance = Utterance::from_text(text);
        debug!(
            target = "speech",
            engine = self.stt.name(),
            intent = %utterance.intent,
            text = %utterance.text,
            "heard"
        );
        Ok(utterance)
    }

    /// Synthesize and play `text`, returning after playback completes.
    pub async fn speak(&mut self, text: &str) -> Result<()> {
        debug!(target = "speech", engine = self.tts.name(), text = %text, "speaking");
        self.tts.speak(text).await
    }
}
