//! The conversational turn loop.
//!
//! One task, one state, one transition per turn: listen for a phrase,
//! classify it, answer with a gesture and speech, and come back to
//! listening — or wind down through the farewell sequence. All external
//! capability errors are absorbed at this boundary: a failed listen
//! retries in place, a failed speak degrades to the next turn, a failed
//! generation is replaced by the apology reply, and only an actuator
//! that keeps failing past its retry budget ends the session early.

use crate::intent::Intent;
use crate::motion::GestureLibrary;
use crate::speech::{SpeechBackend, TextGenerator, Utterance};
use crate::{EmmaError, Result};
use std::time::Duration;
use tracing::{error, info, warn};

/// Phase of the current conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    /// Waiting for the next phrase. Initial state.
    Listening,
    /// A phrase arrived and is being matched against the keyword sets.
    Classifying,
    /// Greeting keyword heard: wave and give the fixed reply.
    RespondingGreeting,
    /// No keyword heard: answer with generated text.
    RespondingGenerated,
    /// Exit keyword heard: farewell sequence, then stop. Terminal.
    Exiting,
}

impl std::fmt::Display for InteractionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionState::Listening => write!(f, "Listening"),
            InteractionState::Classifying => write!(f, "Classifying"),
            InteractionState::RespondingGreeting => write!(f, "RespondingGreeting"),
            InteractionState::RespondingGenerated => write!(f, "RespondingGenerated"),
            InteractionState::Exiting => write!(f, "Exiting"),
        }
    }
}

/// Fixed reply strings. Configuration-level constants, never generated.
#[derive(Debug, Clone)]
pub struct Replies {
    pub greeting: String,
    pub farewell: String,
    /// Spoken in place of a reply when the generator fails.
    pub apology: String,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            greeting: "Hello! How can I assist you today?".to_string(),
            farewell: "Goodbye!".to_string(),
            apology: "Sorry, I could not think of a reply. Could you say that again?".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InteractionConfig {
    pub replies: Replies,
    /// Upper bound on a single `listen` call. `None` waits forever,
    /// matching the engines' native behavior.
    pub listen_timeout: Option<Duration>,
    /// Consecutive actuator failures tolerated before the session aborts.
    pub actuator_retry_budget: u32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            replies: Replies::default(),
            listen_timeout: None,
            actuator_retry_budget: 3,
        }
    }
}

/// Drives the listen → classify → respond cycle until an exit intent.
pub struct InteractionLoop {
    state: InteractionState,
    pending: Option<Utterance>,
    gestures: GestureLibrary,
    speech: SpeechBackend,
    generator: Box<dyn TextGenerator>,
    cfg: InteractionConfig,
    actuator_failures: u32,
}

impl InteractionLoop {
    pub fn new(
        gestures: GestureLibrary,
        speech: SpeechBackend,
        generator: Box<dyn TextGenerator>,
        cfg: InteractionConfig,
    ) -> Self {
        Self {
            state: InteractionState::Listening,
            pending: None,
            gestures,
            speech,
            generator,
            cfg,
            actuator_failures: 0,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    /// Run turns until the exit sequence completes or the actuator retry
    /// budget is exhausted.
    pub async fn run(&mut self) -> Result<()> {
        info!(target = "interaction", "session started");
        loop {
            if self.state == InteractionState::Exiting {
                self.exit_sequence().await;
                info!(target = "interaction", "session ended");
                return Ok(());
            }
            self.step().await?;
        }
    }

    /// Advance by one transition, absorbing recoverable errors.
    ///
    /// Only an actuator failure beyond the retry budget surfaces; any
    /// step that completes cleanly resets the failure counter.
    pub async fn step(&mut self) -> Result<()> {
        let from = self.state;
        match self.advance().await {
            Ok(()) => {
                self.actuator_failures = 0;
                if self.state != from {
                    info!(target = "interaction", from = %from, to = %self.state, "transition");
                }
                Ok(())
            }
            Err(EmmaError::Actuator(msg)) => {
                self.actuator_failures += 1;
                if self.actuator_failures >= self.cfg.actuator_retry_budget {
                    error!(
                        target = "interaction",
                        failures = self.actuator_failures,
                        "actuator retry budget exhausted"
                    );
                    return Err(EmmaError::Actuator(msg));
                }
                warn!(
                    target = "interaction",
                    error = %msg,
                    failures = self.actuator_failures,
                    "actuator error, retrying from Listening"
                );
                self.state = InteractionState::Listening;
                self.pending = None;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn advance(&mut self) -> Result<()> {
        match self.state {
            InteractionState::Listening => self.listen_turn().await,
            InteractionState::Classifying => self.classify_turn(),
            InteractionState::RespondingGreeting => self.respond_greeting().await,
            InteractionState::RespondingGenerated => self.respond_generated().await,
            // Terminal; `run` handles the farewell sequence.
            InteractionState::Exiting => Ok(()),
        }
    }

    async fn listen_turn(&mut self) -> Result<()> {
        // Idle pose: arm lowered, head turned to the listening angle.
        self.gestures.lower_signal_arm().await?;
        self.gestures.head_listening().await?;

        let heard = match self.cfg.listen_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.speech.listen()).await {
                Ok(res) => res,
                Err(_) => Err(EmmaError::Speech(format!(
                    "no phrase within {}ms",
                    limit.as_millis()
                ))),
            },
            None => self.speech.listen().await,
        };

        match heard {
            Ok(utterance) => {
                if utterance.text.trim().is_empty() {
                    // The recognizer occasionally closes a phrase on
                    // silence; keep listening without a state change.
                    return Ok(());
                }
                self.pending = Some(utterance);
                self.state = InteractionState::Classifying;
                Ok(())
            }
            Err(EmmaError::Speech(msg)) => {
                warn!(target = "interaction", error = %msg, "listen failed, retrying");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn classify_turn(&mut self) -> Result<()> {
        let intent = match &self.pending {
            Some(utterance) => utterance.intent,
            None => {
                // No utterance survived to classify; listen again.
                self.state = InteractionState::Listening;
                return Ok(());
            }
        };
        self.state = match intent {
            Intent::Exit => InteractionState::Exiting,
            Intent::Greeting => InteractionState::RespondingGreeting,
            Intent::Conversation => InteractionState::RespondingGenerated,
        };
        Ok(())
    }

    async fn respond_greeting(&mut self) -> Result<()> {
        self.pending = None;
        self.gestures.greeting_wave().await?;
        let reply = self.cfg.replies.greeting.clone();
        self.deliver(&reply).await?;
        self.state = InteractionState::Listening;
        Ok(())
    }

    async fn respond_generated(&mut self) -> Result<()> {
        let prompt = self
            .pending
            .take()
            .map(|u| u.text)
            .unwrap_or_default();

        let reply = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                // Liveness over fidelity: apologize and keep the
                // conversation going instead of propagating.
                warn!(target = "interaction", error = %e, "generation failed, using apology");
                self.cfg.replies.apology.clone()
            }
        };

        self.deliver(&reply).await?;
        self.state = InteractionState::Listening;
        Ok(())
    }

    /// Speaking choreography shared by both responding states: arm up,
    /// head forward, speak, arm down, head back to listening.
    async fn deliver(&mut self, reply: &str) -> Result<()> {
        self.gestures.raise_signal_arm().await?;
        self.gestures.head_speaking().await?;
        if let Err(e) = self.speech.speak(reply).await {
            // A lost reply does not deadlock the turn; the next
            // listening cycle still starts.
            warn!(target = "interaction", error = %e, "speak failed, continuing");
        }
        self.gestures.lower_signal_arm().await?;
        self.gestures.head_listening().await?;
        Ok(())
    }

    /// Farewell gesture and reply. Entered exactly once; failures here
    /// are logged and swallowed so the session still ends cleanly.
    async fn exit_sequence(&mut self) {
        info!(target = "interaction", "exit phrase heard, winding down");
        if let Err(e) = self.gestures.farewell_wave().await {
            warn!(target = "interaction", error = %e, "farewell gesture failed");
        }
        let farewell = self.cfg.replies.farewell.clone();
        if let Err(e) = self.speech.speak(&farewell).await {
            warn!(target = "interaction", error = %e, "farewell speech failed");
        }
    }
}
