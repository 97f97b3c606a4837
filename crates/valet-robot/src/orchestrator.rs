use time::OffsetDateTime;
use tracing::{error, info, warn};

use valet_mcu::{MotionError, Primitive};
use valet_nav::{NavConfig, NavController, NavError, Target};
use valet_proto::RobotEvent;

use crate::context::RobotContext;
use crate::dock::{self, AckTimeouts, DockingConfig, Handshake};
use crate::mission::{Mission, Standoff, Step};

#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error(transparent)]
    Nav(#[from] NavError),
    #[error(transparent)]
    Motion(#[from] MotionError),
}

#[derive(Debug, Clone)]
pub struct MissionReport {
    pub started: OffsetDateTime,
    pub finished: OffsetDateTime,
    pub waypoints: usize,
    pub recoveries: u32,
    pub ack_timeouts: u32,
}

/// Runs missions step by step on one robot.
pub struct Orchestrator {
    ctx: RobotContext,
    nav: NavConfig,
    docking: DockingConfig,
    acks: AckTimeouts,
}

impl Orchestrator {
    pub fn new(ctx: RobotContext, nav: NavConfig, docking: DockingConfig, acks: AckTimeouts) -> Self {
        Self { ctx, nav, docking, acks }
    }

    /// Executes every step, reporting progress through `emit`. On a fatal
    /// error the robot is stopped and a `FAILED` event is emitted before
    /// the error is returned.
    pub fn execute(&mut self, mission: &Mission, emit: &mut dyn FnMut(RobotEvent)) -> Result<MissionReport, MissionError> {
        let a = &mission.assignment;
        info!("mission: {:?} {} at {} ({} steps)", mission.kind, a.vehicle, a.slot.location_code(), mission.steps.len());
        match self.run_steps(mission, emit) {
            Ok(report) => {
                info!(
                    "mission: {} done in {}s, {} recoveries, {} ack timeouts",
                    a.vehicle,
                    (report.finished - report.started).whole_seconds(),
                    report.recoveries,
                    report.ack_timeouts
                );
                Ok(report)
            }
            Err(e) => {
                error!("mission: {} aborted: {}", a.vehicle, e);
                if let Err(stop) = self.ctx.motion.send(Primitive::Stop) {
                    warn!("mission: stop after abort failed: {}", stop);
                }
                emit(RobotEvent::Failed { assignment: a.clone(), reason: e.to_string() });
                Err(e)
            }
        }
    }

    fn run_steps(&mut self, mission: &Mission, emit: &mut dyn FnMut(RobotEvent)) -> Result<MissionReport, MissionError> {
        let mut report = MissionReport {
            started: OffsetDateTime::now_utc(),
            finished: OffsetDateTime::now_utc(),
            waypoints: 0,
            recoveries: 0,
            ack_timeouts: 0,
        };
        // gap reading taken after the last acknowledged lift
        let mut gap_m: Option<f32> = None;

        for step in &mission.steps {
            match step {
                Step::Lift(action) => {
                    match dock::lift(self.ctx.motion.as_mut(), *action, &self.acks)? {
                        Handshake::Acked => gap_m = self.ctx.gap.read_gap_m(),
                        Handshake::TimedOut => {
                            report.ack_timeouts += 1;
                            gap_m = None;
                        }
                    }
                }
                Step::Turn(turn) => {
                    if dock::turn(self.ctx.motion.as_mut(), *turn, &self.acks)? == Handshake::TimedOut {
                        report.ack_timeouts += 1;
                    }
                }
                Step::Travel(wp) => {
                    let standoff_m = match wp.standoff {
                        Standoff::Fixed(m) => m,
                        Standoff::FromGap => {
                            let m = self.docking.standoff(gap_m);
                            info!("mission: exit standoff {:.2}m from gap {:?}", m, gap_m);
                            m
                        }
                    };
                    let target = Target { marker_id: wp.marker_id, direction: wp.direction, standoff_m, camera: wp.camera };
                    let (camera, motion) = self.ctx.camera_and_motion(wp.camera);
                    let nav = NavController::new(self.nav.clone(), target).run(camera, motion)?;
                    report.waypoints += 1;
                    report.recoveries += nav.recoveries;
                }
                Step::Report(ev) => {
                    info!("mission: report {}", ev);
                    emit(ev.clone());
                }
            }
        }
        report.finished = OffsetDateTime::now_utc();
        Ok(report)
    }
}
