// Emma Core Library
// Motion engine, gestures, intents, and the conversational turn loop

pub mod intent;
pub mod interaction;
pub mod motion;
pub mod speech;

// Export core types
pub use intent::{classify, Intent, EXIT_KEYWORDS, GREETING_KEYWORDS};
pub use interaction::{InteractionConfig, InteractionLoop, InteractionState, Replies};
pub use motion::{
    AxisPose, FrameSink, GestureConfig, GestureDefinition, GestureLibrary, MotionController,
    MotionTarget, SerialLink, ServoPosition, TraceSink,
};
pub use speech::{SpeechBackend, SpeechToText, TextGenerator, TextToSpeech, Utterance};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmmaError {
    #[error("Invalid servo target: {0}")]
    InvalidTarget(String),

    #[error("Actuator error: {0}")]
    Actuator(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, EmmaError>;
