use anyhow::{Context, Result};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tokio_serial::SerialPort;
use tracing::{debug, info, trace};

use crate::safety::RepeatFilter;
use crate::{Ack, McuConfig, MotionError, MotionPort, Primitive};

/// Motor controller on a serial line: one byte per command, one byte per ack.
pub struct SerialMotion {
    port: Box<dyn SerialPort>,
    dev: String,
    filter: RepeatFilter,
    sent: u64,
}

impl SerialMotion {
    pub fn open(cfg: &McuConfig) -> Result<Self> {
        let port = tokio_serial::new(&cfg.device, cfg.baud)
            .timeout(Duration::from_millis(cfg.read_timeout_ms))
            .open()
            .with_context(|| format!("open mcu serial device {}", cfg.device))?;
        info!("mcu: opened {} @ {}", cfg.device, cfg.baud);
        Ok(Self {
            port,
            dev: cfg.device.clone(),
            filter: RepeatFilter::new(Duration::from_millis(cfg.repeat_interval_ms)),
            sent: 0,
        })
    }

    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }
}

impl MotionPort for SerialMotion {
    fn send(&mut self, cmd: Primitive) -> Result<(), MotionError> {
        if !self.filter.allow(cmd) {
            trace!("mcu: {} repeat suppressed", cmd);
            return Ok(());
        }
        self.port.write_all(&[cmd.as_byte()])?;
        self.port.flush()?;
        self.sent += 1;
        debug!("mcu: {} -> {}", cmd, self.dev);
        Ok(())
    }

    fn poll_ack(&mut self) -> Result<Option<Ack>, MotionError> {
        let mut b = [0u8; 1];
        match self.port.read(&mut b) {
            Ok(0) => Err(MotionError::Closed),
            Ok(_) => {
                let ack = Ack::from_byte(b[0]);
                if ack.is_none() {
                    debug!("mcu: unknown byte 0x{:02x}", b[0]);
                }
                Ok(ack)
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(None),
            Err(e) => Err(MotionError::Io(e)),
        }
    }
}
