//! Single-marker visual servo.
//!
//! Each perception sample is checked against three gates in a fixed order:
//! yaw, then horizontal centring, then distance. A gate that fails decides
//! the motion command for that sample and the later gates are not looked at,
//! so the robot never translates while it is still mis-rotated.
//!
//! ```text
//! SEARCHING -> ROTATING_TO_ALIGN -> CENTERING -> APPROACHING -> COMPLETED
//!      ^                                                 |
//!      +------------ lost-marker recovery <--------------+
//! ```

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use valet_mcu::{MotionError, MotionPort, Primitive};
use valet_proto::Direction;
use valet_vision::{CameraSide, MarkerPose, Perception};

#[derive(Debug, Clone, Deserialize)]
pub struct NavConfig {
    /// Consecutive samples without the marker before recovery kicks in.
    pub max_lost_frames: u32,
    pub angle_tolerance_deg: f32,
    /// Allowed horizontal offset of the marker centre from the frame centre.
    pub pixel_tolerance: f32,
    pub distance_tolerance_m: f32,
    pub frame_width_px: u32,
    pub sample_interval_ms: u64,
    /// Recoveries allowed per waypoint before giving up on the marker.
    pub max_recoveries: u32,
}

/// One waypoint: which marker, from which camera, and where to stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub marker_id: u32,
    pub direction: Direction,
    pub standoff_m: f32,
    pub camera: CameraSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Searching,
    RotatingToAlign,
    Centering,
    Approaching,
    Completed,
}

#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("marker {marker_id} unreachable after {recoveries} recoveries")]
    MarkerUnreachable { marker_id: u32, recoveries: u32 },
    #[error(transparent)]
    MotionPort(#[from] MotionError),
}

/// What to do for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub command: Primitive,
    pub phase: Phase,
    /// Set on the sample that triggered a lost-marker recovery.
    pub recovery: bool,
}

#[derive(Debug, Clone)]
pub struct NavState {
    pub phase: Phase,
    pub lost_frames: u32,
    pub last_seen: Option<MarkerPose>,
    pub recoveries: u32,
    pub samples: u64,
}

impl NavState {
    fn new() -> Self {
        Self { phase: Phase::Searching, lost_frames: 0, last_seen: None, recoveries: 0, samples: 0 }
    }

    pub fn is_lost(&self) -> bool {
        self.lost_frames > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavReport {
    pub samples: u64,
    pub recoveries: u32,
    pub final_distance_m: Option<f32>,
}

pub struct NavController {
    cfg: NavConfig,
    target: Target,
    state: NavState,
}

impl NavController {
    pub fn new(cfg: NavConfig, target: Target) -> Self {
        Self { cfg, target, state: NavState::new() }
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Reads the camera and drives the motion port until the waypoint is
    /// reached. Perception errors count as a sample without the marker.
    pub fn run(&mut self, camera: &mut dyn Perception, motion: &mut dyn MotionPort) -> Result<NavReport, NavError> {
        let interval = Duration::from_millis(self.cfg.sample_interval_ms);
        info!(
            "nav: marker {} via {:?} camera, {:?}, standoff {:.2}m",
            self.target.marker_id, self.target.camera, self.target.direction, self.target.standoff_m
        );
        loop {
            let sample = match camera.locate(self.target.marker_id) {
                Ok(s) => s,
                Err(e) => {
                    debug!("nav: perception error treated as miss: {}", e);
                    None
                }
            };
            let decision = self.step(sample)?;
            motion.send(decision.command)?;
            if decision.phase == Phase::Completed {
                return Ok(NavReport {
                    samples: self.state.samples,
                    recoveries: self.state.recoveries,
                    final_distance_m: self.state.last_seen.map(|p| p.distance_m),
                });
            }
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }
    }

    /// Advances the state machine by one perception sample.
    pub fn step(&mut self, sample: Option<MarkerPose>) -> Result<Decision, NavError> {
        self.state.samples += 1;
        if self.state.phase == Phase::Completed {
            return Ok(self.decide(Primitive::Stop, Phase::Completed));
        }
        match sample {
            Some(pose) => Ok(self.observed(pose)),
            None => self.missed(),
        }
    }

    fn observed(&mut self, pose: MarkerPose) -> Decision {
        self.state.lost_frames = 0;
        self.state.last_seen = Some(pose);

        if pose.yaw_deg.abs() > self.cfg.angle_tolerance_deg {
            let turn = if pose.yaw_deg > 0.0 { Primitive::RotateCw } else { Primitive::RotateCcw };
            return self.decide(turn, Phase::RotatingToAlign);
        }

        let offset = self.offset_px(&pose);
        if offset.abs() > self.cfg.pixel_tolerance {
            return self.decide(self.strafe_toward(offset), Phase::Centering);
        }

        let gap = pose.distance_m - self.target.standoff_m;
        if gap.abs() > self.cfg.distance_tolerance_m && gap > 0.0 {
            return self.decide(self.approach(), Phase::Approaching);
        }
        self.decide(Primitive::Stop, Phase::Completed)
    }

    fn missed(&mut self) -> Result<Decision, NavError> {
        self.state.lost_frames += 1;
        let phase = self.state.phase;

        if self.state.lost_frames < self.cfg.max_lost_frames {
            let cmd = if phase == Phase::Searching { self.search_turn() } else { Primitive::Stop };
            return Ok(self.decide(cmd, phase));
        }

        let unreachable = NavError::MarkerUnreachable {
            marker_id: self.target.marker_id,
            recoveries: self.state.recoveries,
        };
        let Some(last) = self.state.last_seen else {
            warn!("nav: marker {} never seen in {} samples", self.target.marker_id, self.state.lost_frames);
            return Err(unreachable);
        };
        if self.state.recoveries >= self.cfg.max_recoveries {
            warn!("nav: marker {} lost, recovery budget spent", self.target.marker_id);
            return Err(unreachable);
        }

        let offset = self.offset_px(&last);
        let cmd = if offset < -self.cfg.pixel_tolerance {
            Primitive::RotateCcw
        } else if offset > self.cfg.pixel_tolerance {
            Primitive::RotateCw
        } else {
            self.back_off()
        };
        self.state.recoveries += 1;
        self.state.lost_frames = 0;
        warn!(
            "nav: marker {} lost for {} samples, recovery #{} with {}",
            self.target.marker_id, self.cfg.max_lost_frames, self.state.recoveries, cmd
        );
        let mut d = self.decide(cmd, Phase::Searching);
        d.recovery = true;
        Ok(d)
    }

    fn decide(&mut self, command: Primitive, phase: Phase) -> Decision {
        if phase != self.state.phase {
            info!("nav: marker {} {:?} -> {:?}", self.target.marker_id, self.state.phase, phase);
            self.state.phase = phase;
        }
        debug!("nav: sample {} -> {}", self.state.samples, command);
        Decision { command, phase, recovery: false }
    }

    /// Positive when the marker sits right of the frame centre.
    fn offset_px(&self, pose: &MarkerPose) -> f32 {
        pose.center_px.0 - self.cfg.frame_width_px as f32 / 2.0
    }

    // The back camera looks the other way, so lateral motion is mirrored in its image.
    fn strafe_toward(&self, offset: f32) -> Primitive {
        let right = offset > 0.0;
        match (self.target.camera, right) {
            (CameraSide::Front, true) | (CameraSide::Back, false) => Primitive::StrafeRight,
            (CameraSide::Front, false) | (CameraSide::Back, true) => Primitive::StrafeLeft,
        }
    }

    fn approach(&self) -> Primitive {
        match self.target.direction {
            Direction::Forward => Primitive::Forward,
            Direction::Backward => Primitive::Backward,
        }
    }

    fn back_off(&self) -> Primitive {
        match self.target.direction {
            Direction::Forward => Primitive::Backward,
            Direction::Backward => Primitive::Forward,
        }
    }

    fn search_turn(&self) -> Primitive {
        match self.state.last_seen {
            Some(p) if self.offset_px(&p) > 0.0 => Primitive::RotateCw,
            _ => Primitive::RotateCcw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valet_mcu::dry::DryRunMotion;
    use valet_mcu::Ack;
    use valet_vision::replay::ReplayPerception;

    fn cfg() -> NavConfig {
        NavConfig {
            max_lost_frames: 15,
            angle_tolerance_deg: 5.0,
            pixel_tolerance: 30.0,
            distance_tolerance_m: 0.05,
            frame_width_px: 640,
            sample_interval_ms: 0,
            max_recoveries: 2,
        }
    }

    fn target(direction: Direction, camera: CameraSide) -> Target {
        Target { marker_id: 21, direction, standoff_m: 0.4, camera }
    }

    fn pose(distance_m: f32, yaw_deg: f32, cx: f32) -> Option<MarkerPose> {
        Some(MarkerPose { marker_id: 21, distance_m, yaw_deg, center_px: (cx, 240.0) })
    }

    fn forward() -> NavController {
        NavController::new(cfg(), target(Direction::Forward, CameraSide::Front))
    }

    #[test]
    fn rotation_gate_blocks_strafe_and_approach() {
        let mut nav = forward();
        for yaw in [20.0, 14.0, 9.0, 5.5, -7.0] {
            let d = nav.step(pose(2.0, yaw, 500.0)).unwrap();
            assert!(d.command.is_rotation(), "yaw {} gave {}", yaw, d.command);
            assert_eq!(d.phase, Phase::RotatingToAlign);
        }
        let d = nav.step(pose(2.0, 3.0, 500.0)).unwrap();
        assert_eq!(d.command, Primitive::StrafeRight);
        assert_eq!(d.phase, Phase::Centering);
    }

    #[test]
    fn yaw_sign_picks_turn() {
        let mut nav = forward();
        assert_eq!(nav.step(pose(2.0, 12.0, 320.0)).unwrap().command, Primitive::RotateCw);
        assert_eq!(nav.step(pose(2.0, -12.0, 320.0)).unwrap().command, Primitive::RotateCcw);
    }

    #[test]
    fn centring_then_approach_then_stop() {
        let mut nav = forward();
        assert_eq!(nav.step(pose(2.0, 0.0, 250.0)).unwrap().command, Primitive::StrafeLeft);
        assert_eq!(nav.step(pose(2.0, 0.0, 330.0)).unwrap().command, Primitive::Forward);
        assert_eq!(nav.state().phase, Phase::Approaching);
        let d = nav.step(pose(0.43, 0.0, 330.0)).unwrap();
        assert_eq!((d.command, d.phase), (Primitive::Stop, Phase::Completed));
        // terminal
        let d = nav.step(pose(2.0, 30.0, 0.0)).unwrap();
        assert_eq!((d.command, d.phase), (Primitive::Stop, Phase::Completed));
    }

    #[test]
    fn too_close_counts_as_arrived() {
        let mut nav = forward();
        let d = nav.step(pose(0.2, 0.0, 320.0)).unwrap();
        assert_eq!((d.command, d.phase), (Primitive::Stop, Phase::Completed));
    }

    #[test]
    fn backward_waypoint_reverses_and_mirrors_strafe() {
        let mut nav = NavController::new(cfg(), target(Direction::Backward, CameraSide::Back));
        assert_eq!(nav.step(pose(2.0, 0.0, 500.0)).unwrap().command, Primitive::StrafeLeft);
        assert_eq!(nav.step(pose(2.0, 0.0, 100.0)).unwrap().command, Primitive::StrafeRight);
        assert_eq!(nav.step(pose(2.0, 0.0, 320.0)).unwrap().command, Primitive::Backward);
    }

    #[test]
    fn lost_marker_triggers_one_recovery() {
        let mut nav = forward();
        // last seen left of centre
        assert_eq!(nav.step(pose(2.0, 0.0, 200.0)).unwrap().command, Primitive::StrafeLeft);

        let decisions: Vec<Decision> = (0..15).map(|_| nav.step(None).unwrap()).collect();
        let rotations = decisions.iter().filter(|d| d.command.is_rotation()).count();
        assert_eq!(rotations, 1);
        assert!(decisions[..14].iter().all(|d| d.command == Primitive::Stop && !d.recovery));

        let last = decisions[14];
        assert_eq!(last.command, Primitive::RotateCcw);
        assert!(last.recovery);
        assert_eq!(nav.state().phase, Phase::Searching);
        assert_eq!(nav.state().lost_frames, 0);
        assert!(!nav.state().is_lost());
        assert_eq!(nav.state().recoveries, 1);
    }

    #[test]
    fn centred_loss_backs_off() {
        let mut nav = forward();
        nav.step(pose(1.0, 0.0, 320.0)).unwrap();
        let last = (0..15).map(|_| nav.step(None).unwrap()).last().unwrap();
        assert_eq!(last.command, Primitive::Backward);
    }

    #[test]
    fn searching_explores_then_gives_up_if_never_seen() {
        let mut nav = forward();
        for _ in 0..14 {
            let d = nav.step(None).unwrap();
            assert_eq!(d.command, Primitive::RotateCcw);
            assert_eq!(d.phase, Phase::Searching);
        }
        assert!(matches!(nav.step(None), Err(NavError::MarkerUnreachable { marker_id: 21, recoveries: 0 })));
    }

    #[test]
    fn recovery_budget_is_bounded() {
        let mut nav = forward();
        nav.step(pose(1.0, 0.0, 500.0)).unwrap();
        for _ in 0..2 {
            let last = (0..15).map(|_| nav.step(None).unwrap()).last().unwrap();
            assert_eq!(last.command, Primitive::RotateCw);
        }
        for _ in 0..14 {
            nav.step(None).unwrap();
        }
        assert!(matches!(nav.step(None), Err(NavError::MarkerUnreachable { recoveries: 2, .. })));
    }

    #[test]
    fn run_drives_until_standoff() {
        let mut camera = ReplayPerception::from_frames([
            pose(2.0, 10.0, 320.0),
            None,
            pose(1.5, 0.0, 420.0),
            pose(1.2, 0.0, 330.0),
            pose(0.41, 0.0, 330.0),
        ]);
        let mut motion = DryRunMotion::default();
        let report = forward().run(&mut camera, &mut motion).unwrap();
        assert_eq!(report.samples, 5);
        assert_eq!(report.final_distance_m, Some(0.41));
        assert_eq!(
            motion.history(),
            &[Primitive::RotateCw, Primitive::Stop, Primitive::StrafeRight, Primitive::Forward, Primitive::Stop]
        );
    }

    #[test]
    fn exhausted_feed_ends_unreachable() {
        let mut camera = ReplayPerception::from_frames([]);
        let mut motion = DryRunMotion::default();
        let err = forward().run(&mut camera, &mut motion).unwrap_err();
        assert!(matches!(err, NavError::MarkerUnreachable { .. }));
        assert_eq!(motion.history().len(), 14);
    }

    struct Broken;

    impl MotionPort for Broken {
        fn send(&mut self, _cmd: Primitive) -> Result<(), MotionError> {
            Err(MotionError::Closed)
        }

        fn poll_ack(&mut self) -> Result<Option<Ack>, MotionError> {
            Ok(None)
        }
    }

    #[test]
    fn motion_failure_is_fatal() {
        let mut camera = ReplayPerception::from_frames([pose(2.0, 0.0, 320.0)]);
        let err = forward().run(&mut camera, &mut Broken).unwrap_err();
        assert!(matches!(err, NavError::MotionPort(MotionError::Closed)));
    }
}
