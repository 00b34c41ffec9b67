//! Named expressive motions built from synchronized servo moves.
//!
//! Every gesture is a fixed ordered sequence of poses executed strictly
//! one `move_to` at a time; a gesture always leaves each axis it touched
//! at a well-defined end pose. The angle constants default to the rig's
//! original choreography: the right arm waves hello, the left arm waves
//! goodbye and doubles as the "speaking" signal, the head turns to 45
//! degrees to listen and faces forward to speak.

use super::{AxisPose, MotionController, ServoPosition};
use crate::Result;
use std::time::Duration;
use tracing::info;

/// Angles and pacing for the gesture set.
#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Per-step pacing for every gesture move.
    pub step_delay: Duration,
    /// Number of up/down repetitions in a wave.
    pub wave_count: usize,
    /// Right arm raised / dipped / rest angles (hello wave).
    pub right_raised: u8,
    pub right_dip: u8,
    pub right_rest: u8,
    /// Left arm raised / dipped / rest angles (goodbye wave, speaking signal).
    /// The left servo is mounted mirrored: raised is near 0, rest is 180.
    pub left_raised: u8,
    pub left_dip: u8,
    pub left_rest: u8,
    /// Head presets.
    pub head_listening: u8,
    pub head_speaking: u8,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(1),
            wave_count: 3,
            right_raised: 180,
            right_dip: 150,
            right_rest: 0,
            left_raised: 0,
            left_dip: 30,
            left_rest: 180,
            head_listening: 45,
            head_speaking: 90,
        }
    }
}

/// One pose in a gesture, with an optional pacing override.
#[derive(Debug, Clone, Copy)]
pub struct GestureStep {
    pub pose: AxisPose,
    pub delay: Option<Duration>,
}

impl From<AxisPose> for GestureStep {
    fn from(pose: AxisPose) -> Self {
        Self { pose, delay: None }
    }
}

/// A named composite motion: a lead-in, a cycle repeated `cycles` times,
/// and a lead-out, each an ordered pose sequence.
#[derive(Debug, Clone)]
pub struct GestureDefinition {
    pub name: &'static str,
    pub lead_in: Vec<GestureStep>,
    pub cycle: Vec<GestureStep>,
    pub cycles: usize,
    pub lead_out: Vec<GestureStep>,
    pub step_delay: Duration,
}

impl GestureDefinition {
    fn single(name: &'static str, pose: AxisPose, step_delay: Duration) -> Self {
        Self {
            name,
            lead_in: vec![pose.into()],
            cycle: Vec::new(),
            cycles: 0,
            lead_out: Vec::new(),
            step_delay,
        }
    }
}

/// The fixed gesture set, executed against the shared controller.
pub struct GestureLibrary {
    controller: MotionController,
    cfg: GestureConfig,
}

impl GestureLibrary {
    pub fn new(controller: MotionController, cfg: GestureConfig) -> Self {
        Self { controller, cfg }
    }

    /// The controller's last committed pose.
    pub fn position(&self) -> ServoPosition {
        self.controller.position()
    }

    /// Execute a definition in order; each move completes before the next
    /// begins, and an actuator failure aborts the remainder.
    pub async fn perform(&mut self, def: &GestureDefinition) -> Result<()> {
        info!(target = "gesture", name = def.name, "performing");
        for step in &def.lead_in {
            self.step(step, def.step_delay).await?;
        }
        for _ in 0..def.cycles {
            for step in &def.cycle {
                self.step(step, def.step_delay).await?;
            }
        }
        for step in &def.lead_out {
            self.step(step, def.step_delay).await?;
        }
        Ok(())
    }

    async fn step(&mut self, step: &GestureStep, default_delay: Duration) -> Result<()> {
        let target = step.pose.resolve(self.controller.position())?;
        self.controller
            .move_to(target, step.delay.unwrap_or(default_delay))
            .await
    }

    /// Hello wave on the right arm: raise, dip/raise `wave_count` times,
    /// then lower to rest. Left arm and head are held where they are.
    pub async fn greeting_wave(&mut self) -> Result<()> {
        let c = &self.cfg;
        let def = GestureDefinition {
            name: "greeting_wave",
            lead_in: vec![AxisPose::right(c.right_raised).into()],
            cycle: vec![
                AxisPose::right(c.right_dip).into(),
                AxisPose::right(c.right_raised).into(),
            ],
            cycles: c.wave_count,
            lead_out: vec![AxisPose::right(c.right_rest).into()],
            step_delay: c.step_delay,
        };
        self.perform(&def).await
    }

    /// Goodbye wave on the left arm, mirror of the greeting so the two
    /// can never be confused, ending at the left rest angle.
    pub async fn farewell_wave(&mut self) -> Result<()> {
        let c = &self.cfg;
        let def = GestureDefinition {
            name: "farewell_wave",
            lead_in: vec![AxisPose::left(c.left_raised).into()],
            cycle: vec![
                AxisPose::left(c.left_dip).into(),
                AxisPose::left(c.left_raised).into(),
            ],
            cycles: c.wave_count,
            lead_out: vec![AxisPose::left(c.left_rest).into()],
            step_delay: c.step_delay,
        };
        self.perform(&def).await
    }

    /// Raise the left arm: the "about to speak" signal.
    pub async fn raise_signal_arm(&mut self) -> Result<()> {
        let def = GestureDefinition::single(
            "raise_signal_arm",
            AxisPose::left(self.cfg.left_raised),
            self.cfg.step_delay,
        );
        self.perform(&def).await
    }

    /// Lower the left arm back to rest: the "done speaking" signal.
    pub async fn lower_signal_arm(&mut self) -> Result<()> {
        let def = GestureDefinition::single(
            "lower_signal_arm",
            AxisPose::left(self.cfg.left_rest),
            self.cfg.step_delay,
        );
        self.perform(&def).await
    }

    /// Turn the head to the listening preset.
    pub async fn head_listening(&mut self) -> Result<()> {
        let def = GestureDefinition::single(
            "head_listening",
            AxisPose::head(self.cfg.head_listening),
            self.cfg.step_delay,
        );
        self.perform(&def).await
    }

    /// Face the head forward to the speaking preset.
    pub async fn head_speaking(&mut self) -> Result<()> {
        let def = GestureDefinition::single(
            "head_speaking",
            AxisPose::head(self.cfg.head_speaking),
            self.cfg.step_delay,
        );
        self.perform(&def).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::testutil::RecordingSink;
    use crate::motion::{HEAD, LEFT_ARM, RIGHT_ARM};

    fn library() -> (
        GestureLibrary,
        std::sync::Arc<std::sync::Mutex<Vec<ServoPosition>>>,
    ) {
        let (ctrl, frames) = RecordingSink::controller(ServoPosition::default());
        let cfg = GestureConfig {
            step_delay: Duration::ZERO,
            ..GestureConfig::default()
        };
        (GestureLibrary::new(ctrl, cfg), frames)
    }

    #[tokio::test]
    async fn greeting_wave_moves_only_the_right_arm_and_restores_rest() {
        let (mut lib, frames) = library();
        lib.greeting_wave().await.unwrap();

        // Total: every axis it touched is back at a defined end pose.
        assert_eq!(lib.position(), ServoPosition::default());

        let frames = frames.lock().unwrap();
        assert!(!frames.is_empty());
        for frame in frames.iter() {
            assert_eq!(frame.angles()[LEFT_ARM], 180);
            assert_eq!(frame.angles()[HEAD], 90);
        }
    }

    #[tokio::test]
    async fn farewell_wave_moves_only_the_left_arm_and_restores_rest() {
        let (mut lib, frames) = library();
        lib.farewell_wave().await.unwrap();

        assert_eq!(lib.position(), ServoPosition::default());

        let frames = frames.lock().unwrap();
        assert!(!frames.is_empty());
        for frame in frames.iter() {
            assert_eq!(frame.angles()[RIGHT_ARM], 0);
            assert_eq!(frame.angles()[HEAD], 90);
        }
    }

    #[tokio::test]
    async fn signal_arm_raises_and_lowers() {
        let (mut lib, _frames) = library();

        lib.raise_signal_arm().await.unwrap();
        assert_eq!(lib.position().left(), 0);

        lib.lower_signal_arm().await.unwrap();
        assert_eq!(lib.position().left(), 180);
    }

    #[tokio::test]
    async fn head_presets_set_the_head_axis() {
        let (mut lib, _frames) = library();

        lib.head_listening().await.unwrap();
        assert_eq!(lib.position().head(), 45);

        lib.head_speaking().await.unwrap();
        assert_eq!(lib.position().head(), 90);
    }
}
