//! Lift and turn handshakes with the motor controller.
//!
//! Both wait for a single acknowledgement byte with a deadline. A missing
//! ack is logged, the robot is stopped, and the mission carries on.

use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use valet_mcu::poll::wait_for_ack;
use valet_mcu::{Ack, McuConfig, MotionError, MotionPort, Primitive};

use crate::mission::{LiftAction, Turn};

/// Gap-to-standoff mapping used after picking a vehicle up.
/// `standoff = clamp(gap + gap_offset_m, min_standoff_m, max_standoff_m)`,
/// or `default_standoff_m` without a trustworthy gap reading.
#[derive(Debug, Clone, Deserialize)]
pub struct DockingConfig {
    pub gap_offset_m: f32,
    pub min_standoff_m: f32,
    pub max_standoff_m: f32,
    pub default_standoff_m: f32,
}

impl DockingConfig {
    pub fn standoff(&self, gap_m: Option<f32>) -> f32 {
        match gap_m {
            Some(g) => (g + self.gap_offset_m).clamp(self.min_standoff_m, self.max_standoff_m),
            None => self.default_standoff_m,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AckTimeouts {
    pub lift: Duration,
    pub rotate: Duration,
    pub poll_interval: Duration,
}

impl AckTimeouts {
    pub fn from_config(cfg: &McuConfig) -> Self {
        Self {
            lift: Duration::from_millis(cfg.lift_ack_timeout_ms),
            rotate: Duration::from_millis(cfg.rotate_ack_timeout_ms),
            poll_interval: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    Acked,
    TimedOut,
}

pub fn lift(motion: &mut dyn MotionPort, action: LiftAction, t: &AckTimeouts) -> Result<Handshake, MotionError> {
    let (cmd, ack) = match action {
        LiftAction::Engage => (Primitive::LiftEngage, Ack::LiftEngaged),
        LiftAction::Disengage => (Primitive::LiftDisengage, Ack::LiftDisengaged),
    };
    handshake(motion, cmd, ack, t.lift, t.poll_interval)
}

pub fn turn(motion: &mut dyn MotionPort, turn: Turn, t: &AckTimeouts) -> Result<Handshake, MotionError> {
    handshake(motion, turn.primitive(), Ack::RotationDone, t.rotate, t.poll_interval)
}

fn handshake(
    motion: &mut dyn MotionPort,
    cmd: Primitive,
    ack: Ack,
    timeout: Duration,
    interval: Duration,
) -> Result<Handshake, MotionError> {
    drain_acks(motion)?;
    motion.send(cmd)?;
    if wait_for_ack(motion, ack, timeout, interval)? {
        info!("dock: {} acknowledged", cmd);
        return Ok(Handshake::Acked);
    }
    warn!("dock: no {:?} within {:?} after {}, stopping and carrying on", ack, timeout, cmd);
    motion.send(Primitive::Stop)?;
    Ok(Handshake::TimedOut)
}

// Acks left over from servoing turns must not satisfy the next wait.
fn drain_acks(motion: &mut dyn MotionPort) -> Result<(), MotionError> {
    for _ in 0..16 {
        if motion.poll_ack()?.is_none() { break; }
    }
    Ok(())
}
