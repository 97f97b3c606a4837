use std::time::{Duration, Instant};
use tracing::debug;

use crate::{Ack, MotionError, MotionPort};

/// Calls `probe` until it yields a value or `timeout` has passed, sleeping
/// `interval` between attempts. `probe` runs at least once. Errors from
/// `probe` end the wait immediately.
pub fn poll_until<T, E>(
    timeout: Duration,
    interval: Duration,
    mut probe: impl FnMut() -> Result<Option<T>, E>,
) -> Result<Option<T>, E> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(v) = probe()? {
            return Ok(Some(v));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(interval.min(deadline - now));
    }
}

/// Waits for one specific acknowledgement, discarding any other ack bytes.
/// `Ok(false)` on timeout.
pub fn wait_for_ack(
    port: &mut dyn MotionPort,
    expected: Ack,
    timeout: Duration,
    interval: Duration,
) -> Result<bool, MotionError> {
    let got = poll_until::<_, MotionError>(timeout, interval, || match port.poll_ack()? {
        Some(ack) if ack == expected => Ok(Some(ack)),
        Some(other) => {
            debug!("mcu: ignoring ack {:?} while waiting for {:?}", other, expected);
            Ok(None)
        }
        None => Ok(None),
    })?;
    Ok(got.is_some())
}
