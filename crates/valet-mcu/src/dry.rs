use tracing::info;

use crate::{Ack, MotionError, MotionPort, Primitive};

/// Logs commands instead of driving hardware. The most recent lift or turn
/// command is acknowledged on the next poll.
#[derive(Debug, Default)]
pub struct DryRunMotion {
    pending: Option<Ack>,
    history: Vec<Primitive>,
}

impl DryRunMotion {
    pub fn history(&self) -> &[Primitive] {
        &self.history
    }
}

impl MotionPort for DryRunMotion {
    fn send(&mut self, cmd: Primitive) -> Result<(), MotionError> {
        info!("mcu(dry-run): {}", cmd);
        self.pending = match cmd {
            Primitive::LiftEngage => Some(Ack::LiftEngaged),
            Primitive::LiftDisengage => Some(Ack::LiftDisengaged),
            Primitive::RotateCw | Primitive::RotateCcw => Some(Ack::RotationDone),
            _ => None,
        };
        self.history.push(cmd);
        Ok(())
    }

    fn poll_ack(&mut self) -> Result<Option<Ack>, MotionError> {
        Ok(self.pending.take())
    }
}
