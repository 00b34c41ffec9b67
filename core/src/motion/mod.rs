//! Servo motion engine
//!
//! Owns the rig's current pose and moves all three axes to a target in
//! lockstep: every axis starts and finishes on the same step count, with
//! smaller deltas spread proportionally over the motion instead of
//! finishing early. Frames are pushed to a [`FrameSink`] one per step.

use crate::{EmmaError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace};

mod gesture;
mod sink;

pub use gesture::{GestureConfig, GestureDefinition, GestureLibrary, GestureStep};
pub use sink::{SerialLink, TraceSink};

/// Number of independently addressable joints: left arm, right arm, head.
pub const AXES: usize = 3;

/// Axis indices into a [`ServoPosition`].
pub const LEFT_ARM: usize = 0;
pub const RIGHT_ARM: usize = 1;
pub const HEAD: usize = 2;

/// A validated rig pose: one angle per axis, each in `[0, 180]` degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ServoPosition {
    angles: [u8; AXES],
}

impl ServoPosition {
    pub const MAX_ANGLE: u8 = 180;

    /// Build a pose from left-arm, right-arm, and head angles.
    ///
    /// Rejects any component above [`Self::MAX_ANGLE`]; a `ServoPosition`
    /// that exists is always in range.
    pub fn new(left: u8, right: u8, head: u8) -> Result<Self> {
        let angles = [left, right, head];
        for (i, a) in angles.iter().enumerate() {
            if *a > Self::MAX_ANGLE {
                return Err(EmmaError::InvalidTarget(format!(
                    "axis {} angle {} exceeds {} degrees",
                    i,
                    a,
                    Self::MAX_ANGLE
                )));
            }
        }
        Ok(Self { angles })
    }

    pub fn angles(&self) -> [u8; AXES] {
        self.angles
    }

    pub fn left(&self) -> u8 {
        self.angles[LEFT_ARM]
    }

    pub fn right(&self) -> u8 {
        self.angles[RIGHT_ARM]
    }

    pub fn head(&self) -> u8 {
        self.angles[HEAD]
    }
}

impl Default for ServoPosition {
    /// The rig's rest pose: left arm down (180), right arm down (0),
    /// head centered (90).
    fn default() -> Self {
        Self {
            angles: [180, 0, 90],
        }
    }
}

impl std::fmt::Display for ServoPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}]",
            self.angles[0], self.angles[1], self.angles[2]
        )
    }
}

/// A pose plus the pacing delay between interpolation steps.
#[derive(Debug, Clone, Copy)]
pub struct MotionTarget {
    pub position: ServoPosition,
    pub step_delay: Duration,
}

/// A partial pose used by gestures: `None` holds an axis at its current
/// angle when the step executes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisPose {
    pub left: Option<u8>,
    pub right: Option<u8>,
    pub head: Option<u8>,
}

impl AxisPose {
    pub fn left(angle: u8) -> Self {
        Self {
            left: Some(angle),
            ..Self::default()
        }
    }

    pub fn right(angle: u8) -> Self {
        Self {
            right: Some(angle),
            ..Self::default()
        }
    }

    pub fn head(angle: u8) -> Self {
        Self {
            head: Some(angle),
            ..Self::default()
        }
    }

    /// Fill unset axes from `current` and validate the result.
    pub fn resolve(&self, current: ServoPosition) -> Result<ServoPosition> {
        ServoPosition::new(
            self.left.unwrap_or_else(|| current.left()),
            self.right.unwrap_or_else(|| current.right()),
            self.head.unwrap_or_else(|| current.head()),
        )
    }
}

/// Destination for interpolation frames, one write per step.
///
/// The wire format is owned by the implementation; a write failure must
/// surface as [`EmmaError::Actuator`] so the controller can fail-stop.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: ServoPosition) -> Result<()>;
}

/// Moves the rig smoothly and synchronously toward target poses.
///
/// The stored current position is the only mutable motion state in the
/// process and is committed to the exact target only after a full move
/// completes; a failed move leaves it at the pre-move pose.
pub struct MotionController {
    sink: Box<dyn FrameSink>,
    current: ServoPosition,
}

impl MotionController {
    pub fn new(sink: Box<dyn FrameSink>, initial: ServoPosition) -> Self {
        Self {
            sink,
            current: initial,
        }
    }

    /// Last fully committed pose.
    pub fn position(&self) -> ServoPosition {
        self.current
    }

    /// Interpolate all axes to `target`, emitting one frame per step and
    /// sleeping `step_delay` after each.
    ///
    /// Emits exactly `max_i |target_i - current_i|` frames; a move to the
    /// current pose emits nothing. Each axis follows
    /// `current + floor(step * delta / steps)`, which is monotonic toward
    /// its target and reaches it on the final step for every axis at once.
    pub async fn move_to(&mut self, target: ServoPosition, step_delay: Duration) -> Result<()> {
        let from: [i32; AXES] = self.current.angles().map(i32::from);
        let to: [i32; AXES] = target.angles().map(i32::from);
        let delta: [i32; AXES] = [to[0] - from[0], to[1] - from[1], to[2] - from[2]];

        let steps = delta.iter().map(|d| d.abs()).max().unwrap_or(0);
        if steps == 0 {
            trace!(target = "motion", pose = %target, "already at target");
            return Ok(());
        }

        debug!(target = "motion", from = %self.current, to = %target, steps, "starting move");

        for step in 1..=steps {
            let mut interim = [0u8; AXES];
            for i in 0..AXES {
                // div_euclid keeps the floor semantics for negative deltas
                interim[i] = (from[i] + (step * delta[i]).div_euclid(steps)) as u8;
            }
            let frame = ServoPosition { angles: interim };
            self.sink.send(frame).await?;
            tokio::time::sleep(step_delay).await;
        }

        // Commit the exact target, clearing any interim rounding.
        self.current = target;
        Ok(())
    }

    /// Convenience wrapper over [`Self::move_to`] for a bundled target.
    pub async fn apply(&mut self, target: MotionTarget) -> Result<()> {
        self.move_to(target.position, target.step_delay).await
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every frame it receives.
    pub(crate) struct RecordingSink {
        pub frames: Arc<Mutex<Vec<ServoPosition>>>,
    }

    impl RecordingSink {
        pub(crate) fn controller(
            initial: ServoPosition,
        ) -> (MotionController, Arc<Mutex<Vec<ServoPosition>>>) {
            let frames = Arc::new(Mutex::new(Vec::new()));
            let sink = RecordingSink {
                frames: Arc::clone(&frames),
            };
            (MotionController::new(Box::new(sink), initial), frames)
        }
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send(&mut self, frame: ServoPosition) -> Result<()> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::RecordingSink;
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Fails every write after the first `ok_writes` frames.
    struct FailingSink {
        ok_writes: usize,
        sent: usize,
    }

    #[async_trait]
    impl FrameSink for FailingSink {
        async fn send(&mut self, _frame: ServoPosition) -> Result<()> {
            if self.sent >= self.ok_writes {
                return Err(EmmaError::Actuator("link dropped".into()));
            }
            self.sent += 1;
            Ok(())
        }
    }

    fn controller_with_recorder(
        initial: ServoPosition,
    ) -> (MotionController, Arc<Mutex<Vec<ServoPosition>>>) {
        RecordingSink::controller(initial)
    }

    #[test]
    fn position_rejects_out_of_range_angle() {
        let err = ServoPosition::new(200, 0, 90).unwrap_err();
        assert!(matches!(err, EmmaError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn move_emits_max_delta_frames_and_commits_target() {
        // Scenario: rest pose to (90, 90, 90) has deltas (-90, 90, 0)
        let start = ServoPosition::new(180, 0, 90).unwrap();
        let target = ServoPosition::new(90, 90, 90).unwrap();
        let (mut ctrl, frames) = controller_with_recorder(start);

        ctrl.move_to(target, Duration::ZERO).await.unwrap();

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 90);
        assert_eq!(*frames.last().unwrap(), target);
        assert_eq!(ctrl.position(), target);
    }

    #[tokio::test]
    async fn move_to_current_pose_is_a_no_op() {
        let start = ServoPosition::default();
        let (mut ctrl, frames) = controller_with_recorder(start);

        ctrl.move_to(start, Duration::ZERO).await.unwrap();

        assert!(frames.lock().unwrap().is_empty());
        assert_eq!(ctrl.position(), start);
    }

    #[tokio::test]
    async fn every_axis_moves_monotonically_toward_its_target() {
        let start = ServoPosition::new(10, 170, 90).unwrap();
        let target = ServoPosition::new(100, 20, 97).unwrap();
        let (mut ctrl, frames) = controller_with_recorder(start);

        ctrl.move_to(target, Duration::ZERO).await.unwrap();

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 150);
        for axis in 0..AXES {
            let mut prev = i32::from(start.angles()[axis]);
            let goal = i32::from(target.angles()[axis]);
            for frame in frames.iter() {
                let cur = i32::from(frame.angles()[axis]);
                if goal >= prev {
                    assert!(cur >= prev && cur <= goal, "axis {} overshot", axis);
                } else {
                    assert!(cur <= prev && cur >= goal, "axis {} overshot", axis);
                }
                prev = cur;
            }
            assert_eq!(prev, goal, "axis {} did not finish at its target", axis);
        }
    }

    #[tokio::test]
    async fn sink_failure_aborts_without_committing() {
        let start = ServoPosition::default();
        let target = ServoPosition::new(90, 90, 90).unwrap();
        let sink = FailingSink {
            ok_writes: 10,
            sent: 0,
        };
        let mut ctrl = MotionController::new(Box::new(sink), start);

        let err = ctrl.move_to(target, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, EmmaError::Actuator(_)));
        // Fail-stop: the stored pose is still the pre-move pose.
        assert_eq!(ctrl.position(), start);
    }

    #[tokio::test]
    async fn axis_pose_resolves_against_current() {
        let current = ServoPosition::default();
        let pose = AxisPose::head(45).resolve(current).unwrap();
        assert_eq!(pose.angles(), [180, 0, 45]);
    }
}
