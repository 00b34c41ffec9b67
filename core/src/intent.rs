//! Keyword intent classification for transcribed utterances.
//!
//! Case-insensitive substring matching against two fixed keyword sets.
//! The exit set is checked strictly before the greeting set, so an
//! utterance containing both always classifies as [`Intent::Exit`].

/// Keywords that end the session.
pub const EXIT_KEYWORDS: [&str; 5] = ["stop", "quit", "goodbye", "exit", "bye"];

/// Keywords that trigger the canned greeting response.
pub const GREETING_KEYWORDS: [&str; 2] = ["hello", "emma"];

/// What the utterance asks of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// An exit keyword was heard; wind the session down.
    Exit,
    /// A greeting keyword was heard; wave and give the fixed reply.
    Greeting,
    /// Anything else; forward to the text generator.
    Conversation,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Exit => write!(f, "exit"),
            Intent::Greeting => write!(f, "greeting"),
            Intent::Conversation => write!(f, "conversation"),
        }
    }
}

/// Classify a transcript. Exit takes precedence over greeting.
pub fn classify(text: &str) -> Intent {
    let lowered = text.to_lowercase();
    if EXIT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Intent::Exit
    } else if GREETING_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Intent::Greeting
    } else {
        Intent::Conversation
    }
}
