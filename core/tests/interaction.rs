//! End-to-end turn-loop tests with scripted speech engines and a
//! frame-recording actuator sink.

use async_trait::async_trait;
use emma_core::{
    EmmaError, FrameSink, GestureConfig, GestureLibrary, InteractionConfig, InteractionLoop,
    InteractionState, MotionController, Result, ServoPosition, SpeechBackend, SpeechToText,
    TextGenerator, TextToSpeech,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct RecordingSink {
    frames: Arc<Mutex<Vec<ServoPosition>>>,
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send(&mut self, frame: ServoPosition) -> Result<()> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

struct DeadSink;

#[async_trait]
impl FrameSink for DeadSink {
    async fn send(&mut self, _frame: ServoPosition) -> Result<()> {
        Err(EmmaError::Actuator("link unplugged".into()))
    }
}

/// Returns each scripted phrase in turn; a `None` entry blocks forever.
struct ScriptedStt {
    script: VecDeque<Option<String>>,
}

impl ScriptedStt {
    fn new<const N: usize>(phrases: [&str; N]) -> Self {
        Self {
            script: phrases.iter().map(|p| Some(p.to_string())).collect(),
        }
    }
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn listen(&mut self) -> Result<String> {
        match self.script.pop_front() {
            Some(Some(text)) => Ok(text),
            Some(None) => {
                // Simulate an engine that never hears a phrase.
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EmmaError::Speech("unreachable".into()))
            }
            None => Err(EmmaError::Speech("script exhausted".into())),
        }
    }
}

struct RecordingTts {
    spoken: Arc<Mutex<Vec<String>>>,
    fail_first: bool,
    calls: usize,
}

#[async_trait]
impl TextToSpeech for RecordingTts {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn speak(&mut self, text: &str) -> Result<()> {
        self.calls += 1;
        if self.fail_first && self.calls == 1 {
            return Err(EmmaError::Speech("playback device busy".into()));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct ScriptedGenerator {
    prompts: Arc<Mutex<Vec<String>>>,
    reply: Option<String>,
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(EmmaError::Generation("backend unavailable".into())),
        }
    }
}

struct Harness {
    frames: Arc<Mutex<Vec<ServoPosition>>>,
    spoken: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

fn build_loop(
    stt: ScriptedStt,
    generated_reply: Option<&str>,
    fail_first_speak: bool,
    cfg: InteractionConfig,
) -> (InteractionLoop, Harness) {
    let frames = Arc::new(Mutex::new(Vec::new()));
    let spoken = Arc::new(Mutex::new(Vec::new()));
    let prompts = Arc::new(Mutex::new(Vec::new()));

    let controller = MotionController::new(
        Box::new(RecordingSink {
            frames: Arc::clone(&frames),
        }),
        ServoPosition::default(),
    );
    let gestures = GestureLibrary::new(
        controller,
        GestureConfig {
            step_delay: Duration::ZERO,
            ..GestureConfig::default()
        },
    );
    let speech = SpeechBackend::new(
        Box::new(stt),
        Box::new(RecordingTts {
            spoken: Arc::clone(&spoken),
            fail_first: fail_first_speak,
            calls: 0,
        }),
    );
    let generator = ScriptedGenerator {
        prompts: Arc::clone(&prompts),
        reply: generated_reply.map(|s| s.to_string()),
    };

    let looped = InteractionLoop::new(gestures, speech, Box::new(generator), cfg);
    (
        looped,
        Harness {
            frames,
            spoken,
            prompts,
        },
    )
}

#[tokio::test]
async fn exit_phrase_runs_the_farewell_once_and_ends_the_session() {
    let (mut looped, h) = build_loop(
        ScriptedStt::new(["please stop now"]),
        Some("unused"),
        false,
        InteractionConfig::default(),
    );

    looped.run().await.unwrap();

    assert_eq!(looped.state(), InteractionState::Exiting);
    // The farewell string is the only thing ever spoken, exactly once.
    assert_eq!(*h.spoken.lock().unwrap(), vec!["Goodbye!".to_string()]);
    assert!(h.prompts.lock().unwrap().is_empty());

    // Frame budget of the whole session: the listening head turn
    // (90 -> 45 = 45 frames) plus one farewell wave on the left arm
    // (180 -> 0, then 3 x (0 -> 30 -> 0), then 0 -> 180 = 540 frames).
    assert_eq!(h.frames.lock().unwrap().len(), 45 + 540);
}

#[tokio::test]
async fn greeting_phrase_waves_and_speaks_the_fixed_reply() {
    let (mut looped, h) = build_loop(
        ScriptedStt::new(["hello emma, how are you"]),
        Some("unused"),
        false,
        InteractionConfig::default(),
    );

    looped.step().await.unwrap();
    assert_eq!(looped.state(), InteractionState::Classifying);
    looped.step().await.unwrap();
    assert_eq!(looped.state(), InteractionState::RespondingGreeting);
    looped.step().await.unwrap();
    assert_eq!(looped.state(), InteractionState::Listening);

    assert_eq!(
        *h.spoken.lock().unwrap(),
        vec!["Hello! How can I assist you today?".to_string()]
    );
    // The generator is never consulted for a greeting.
    assert!(h.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn conversation_phrase_is_forwarded_to_the_generator_verbatim() {
    let (mut looped, h) = build_loop(
        ScriptedStt::new(["what is the weather"]),
        Some("Sunny, probably."),
        false,
        InteractionConfig::default(),
    );

    looped.step().await.unwrap();
    looped.step().await.unwrap();
    assert_eq!(looped.state(), InteractionState::RespondingGenerated);
    looped.step().await.unwrap();
    assert_eq!(looped.state(), InteractionState::Listening);

    assert_eq!(
        *h.prompts.lock().unwrap(),
        vec!["what is the weather".to_string()]
    );
    assert_eq!(
        *h.spoken.lock().unwrap(),
        vec!["Sunny, probably.".to_string()]
    );
}

#[tokio::test]
async fn generator_failure_degrades_to_the_apology_reply() {
    let (mut looped, h) = build_loop(
        ScriptedStt::new(["tell me a story"]),
        None,
        false,
        InteractionConfig::default(),
    );

    looped.step().await.unwrap();
    looped.step().await.unwrap();
    looped.step().await.unwrap();

    assert_eq!(looped.state(), InteractionState::Listening);
    let spoken = h.spoken.lock().unwrap();
    assert_eq!(spoken.len(), 1);
    assert!(spoken[0].starts_with("Sorry"));
}

#[tokio::test]
async fn speak_failure_still_returns_to_listening() {
    let (mut looped, h) = build_loop(
        ScriptedStt::new(["what time is it"]),
        Some("Time to listen."),
        true,
        InteractionConfig::default(),
    );

    looped.step().await.unwrap();
    looped.step().await.unwrap();
    looped.step().await.unwrap();

    // The reply was lost but the turn completed.
    assert_eq!(looped.state(), InteractionState::Listening);
    assert!(h.spoken.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_transcript_keeps_listening_without_a_turn() {
    let (mut looped, h) = build_loop(
        ScriptedStt::new(["   ", "bye"]),
        Some("unused"),
        false,
        InteractionConfig::default(),
    );

    looped.step().await.unwrap();
    assert_eq!(looped.state(), InteractionState::Listening);

    looped.run().await.unwrap();
    assert_eq!(*h.spoken.lock().unwrap(), vec!["Goodbye!".to_string()]);
}

#[tokio::test]
async fn listen_failure_retries_in_place() {
    // Script exhaustion surfaces as a speech error on the first listen.
    let (mut looped, _h) = build_loop(
        ScriptedStt::new([]),
        Some("unused"),
        false,
        InteractionConfig::default(),
    );

    looped.step().await.unwrap();
    assert_eq!(looped.state(), InteractionState::Listening);
}

#[tokio::test(start_paused = true)]
async fn listen_timeout_is_a_recoverable_speech_error() {
    let stt = ScriptedStt {
        script: VecDeque::from([None]),
    };
    let cfg = InteractionConfig {
        listen_timeout: Some(Duration::from_millis(250)),
        ..InteractionConfig::default()
    };
    let (mut looped, _h) = build_loop(stt, Some("unused"), false, cfg);

    looped.step().await.unwrap();
    assert_eq!(looped.state(), InteractionState::Listening);
}

#[tokio::test]
async fn actuator_failures_beyond_the_budget_abort_the_session() {
    let controller = MotionController::new(Box::new(DeadSink), ServoPosition::default());
    let gestures = GestureLibrary::new(
        controller,
        GestureConfig {
            step_delay: Duration::ZERO,
            ..GestureConfig::default()
        },
    );
    let speech = SpeechBackend::new(
        Box::new(ScriptedStt::new(["hello"])),
        Box::new(RecordingTts {
            spoken: Arc::new(Mutex::new(Vec::new())),
            fail_first: false,
            calls: 0,
        }),
    );
    let generator = ScriptedGenerator {
        prompts: Arc::new(Mutex::new(Vec::new())),
        reply: Some("unused".into()),
    };
    let mut looped = InteractionLoop::new(
        gestures,
        speech,
        Box::new(generator),
        InteractionConfig::default(),
    );

    let err = looped.run().await.unwrap_err();
    assert!(matches!(err, EmmaError::Actuator(_)));
}
