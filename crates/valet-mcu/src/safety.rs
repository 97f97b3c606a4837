use std::time::{Duration, Instant};

use crate::Primitive;

/// Drops a movement byte when it repeats the previous one within
/// `min_interval`. The controller keeps executing the last movement until
/// told otherwise, so repeats only load the serial line.
#[derive(Debug)]
pub struct RepeatFilter {
    last: Option<(Primitive, Instant)>,
    min_interval: Duration,
}

impl RepeatFilter {
    pub fn new(min_interval: Duration) -> Self {
        Self { last: None, min_interval }
    }

    pub fn allow(&mut self, cmd: Primitive) -> bool {
        let now = Instant::now();
        if !cmd.is_movement() {
            self.last = None;
            return true;
        }
        if let Some((prev, t)) = self.last {
            if prev == cmd && now.duration_since(t) < self.min_interval { return false; }
        }
        self.last = Some((cmd, now));
        true
    }
}
