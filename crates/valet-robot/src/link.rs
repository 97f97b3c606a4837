//! Connection to the dispatcher.
//!
//! The robot announces itself with a `robot` line, then reads one order per
//! line. Each order runs to completion on a blocking thread while its
//! progress events are written back as they happen. A dropped connection is
//! retried with exponential backoff.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use valet_proto::{RobotCommand, RobotEvent};

use crate::mission::{MarkerLayout, Mission, StandoffConfig};
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// `host:port` of the dispatcher.
    pub dispatcher: String,
    pub reconnect_min_ms: u64,
    pub reconnect_max_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LinkHealth {
    pub consecutive_failures: u32,
    pub sessions: u64,
    pub missions: u64,
    pub failed_missions: u64,
}

impl LinkHealth {
    /// Delay before the next connection attempt.
    pub fn backoff(&self, cfg: &LinkConfig) -> Duration {
        if self.consecutive_failures == 0 {
            return Duration::from_millis(cfg.reconnect_min_ms);
        }
        let ms = cfg.reconnect_min_ms.saturating_mul(1 << self.consecutive_failures.min(10));
        Duration::from_millis(ms.min(cfg.reconnect_max_ms))
    }
}

pub struct RobotLink {
    cfg: LinkConfig,
    layout: MarkerLayout,
    standoff: StandoffConfig,
    // taken while a mission runs on the blocking pool
    orchestrator: Option<Orchestrator>,
    health: LinkHealth,
}

impl RobotLink {
    pub fn new(cfg: LinkConfig, layout: MarkerLayout, standoff: StandoffConfig, orchestrator: Orchestrator) -> Self {
        Self { cfg, layout, standoff, orchestrator: Some(orchestrator), health: LinkHealth::default() }
    }

    pub fn health(&self) -> &LinkHealth {
        &self.health
    }

    /// Keeps a session open, reconnecting until the orchestrator is lost.
    pub async fn run_forever(&mut self) -> Result<()> {
        loop {
            match self.session().await {
                Ok(()) => info!("link: dispatcher closed the connection"),
                Err(e) => {
                    if self.orchestrator.is_none() {
                        return Err(e);
                    }
                    self.health.consecutive_failures += 1;
                    warn!("link: session failed (failures: {}): {:#}", self.health.consecutive_failures, e);
                }
            }
            let wait = self.health.backoff(&self.cfg);
            info!("link: reconnecting in {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// One connection: register, then run orders until the dispatcher hangs up.
    pub async fn session(&mut self) -> Result<()> {
        let stream = TcpStream::connect(&self.cfg.dispatcher)
            .await
            .with_context(|| format!("connect to dispatcher at {}", self.cfg.dispatcher))?;
        let (rd, mut wr) = stream.into_split();
        wr.write_all(b"robot\n").await?;
        self.health.consecutive_failures = 0;
        self.health.sessions += 1;
        info!("link: registered with dispatcher at {}", self.cfg.dispatcher);

        let (tx, mut rx) = mpsc::unbounded_channel::<RobotEvent>();
        let writer = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let line = format!("{}\n", ev);
                if let Err(e) = wr.write_all(line.as_bytes()).await {
                    warn!("link: dropping event {}: {}", ev, e);
                    break;
                }
            }
        });

        let mut lines = BufReader::new(rd).lines();
        let result = loop {
            let line = match lines.next_line().await {
                Ok(Some(l)) => l,
                Ok(None) => break Ok(()),
                Err(e) => break Err(anyhow::Error::from(e)),
            };
            let line = line.trim();
            if line.is_empty() { continue; }
            let cmd = match RobotCommand::parse(line) {
                Ok(c) => c,
                Err(e) => {
                    warn!("link: ignoring order {:?}: {}", line, e);
                    continue;
                }
            };
            if let Err(e) = self.run_mission(cmd, tx.clone()).await {
                break Err(e);
            }
        };

        drop(tx);
        if let Err(e) = writer.await {
            warn!("link: event writer ended abnormally: {}", e);
        }
        result
    }

    async fn run_mission(&mut self, cmd: RobotCommand, events: mpsc::UnboundedSender<RobotEvent>) -> Result<()> {
        let mission = match Mission::plan(&cmd, &self.layout, &self.standoff) {
            Ok(m) => m,
            Err(e) => {
                self.health.failed_missions += 1;
                warn!("link: cannot plan {}: {}", cmd, e);
                let failed = RobotEvent::Failed { assignment: cmd.assignment().clone(), reason: e.to_string() };
                if events.send(failed).is_err() {
                    warn!("link: event channel closed");
                }
                return Ok(());
            }
        };
        let mut orch = self.orchestrator.take().context("orchestrator lost in an earlier mission")?;
        let (orch, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = orch.execute(&mission, &mut |ev| {
                if events.send(ev).is_err() {
                    warn!("link: event channel closed");
                }
            });
            (orch, outcome)
        })
        .await
        .context("mission thread panicked")?;
        self.orchestrator = Some(orch);

        match outcome {
            Ok(_) => self.health.missions += 1,
            Err(e) => {
                self.health.failed_missions += 1;
                warn!("link: {} failed: {}", cmd, e);
            }
        }
        Ok(())
    }
}
