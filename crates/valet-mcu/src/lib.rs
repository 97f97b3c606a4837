pub mod dry;
pub mod link;
pub mod poll;
pub mod primitive;
pub mod safety;

pub use primitive::{Ack, MotionError, MotionPort, Primitive};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct McuConfig {
    /// Serial device of the motor controller, or "dry-run" to only log commands.
    pub device: String,
    pub baud: u32,

    /// Per-read timeout while polling for an acknowledgement byte.
    pub read_timeout_ms: u64,

    /// How long to wait for `a`/`c` after a lift command.
    pub lift_ack_timeout_ms: u64,

    /// How long to wait for `s` after an in-place turn.
    pub rotate_ack_timeout_ms: u64,

    /// Identical movement bytes within this window are not re-sent.
    pub repeat_interval_ms: u64,
}

impl McuConfig {
    pub fn is_dry_run(&self) -> bool {
        self.device == "dry-run"
    }
}

/// Opens the configured motion port.
pub fn open(cfg: &McuConfig) -> anyhow::Result<Box<dyn MotionPort>> {
    if cfg.is_dry_run() {
        return Ok(Box::new(dry::DryRunMotion::default()));
    }
    Ok(Box::new(link::SerialMotion::open(cfg)?))
}
