use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use valet_dispatch::{doctor as dispatch_doctor, serve, DispatchConfig, Dispatcher};
use valet_lot::{doctor as lot_doctor, Lot, LotConfig};
use valet_mcu::McuConfig;
use valet_nav::{doctor as nav_doctor, NavConfig};
use valet_proto::{location_code, Side, Slot};
use valet_robot::doctor as robot_doctor;
use valet_robot::{
    AckTimeouts, DockingConfig, FixedGap, LinkConfig, MarkerLayout, Orchestrator, RobotContext, RobotLink,
    StandoffConfig,
};
use valet_vision::replay::ReplayPerception;
use valet_vision::PerceptionConfig;

#[derive(Debug, Parser)]
#[command(name = "valet", version, about = "Valet - robotic parking dispatcher and robot runtime")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration file.
    Doctor,
    /// Run the dispatcher.
    Dispatch,
    /// Run the robot runtime and connect it to the dispatcher.
    Robot,
    /// Print the lot layout with location codes and bay markers.
    Lot,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    dispatch: DispatchConfig,
    lot: LotConfig,
    robot: RobotCfg,
    mcu: McuConfig,
    nav: NavConfig,
    markers: MarkerLayout,
    standoff: StandoffConfig,
    docking: DockingConfig,
    perception: PerceptionConfig,
}

#[derive(Debug, serde::Deserialize)]
struct RobotCfg {
    #[serde(flatten)]
    link: LinkConfig,
    /// Fixed vehicle gap reading until a gap sensor is wired in.
    gap_m: Option<f32>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    parse_config(&s)
}

fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Dispatch => dispatch(&cfg).await?,
        Command::Robot => robot(&cfg).await?,
        Command::Lot => print!("{}", lot_layout(&cfg)),
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    dispatch_doctor::check_dispatch(&cfg.dispatch)?;
    lot_doctor::check_lot(&cfg.lot)?;
    nav_doctor::check_nav(&cfg.nav)?;
    robot_doctor::check_link(&cfg.robot.link)?;
    robot_doctor::check_markers(&cfg.markers, cfg.lot.sectors, cfg.lot.spaces_per_side)?;
    robot_doctor::check_standoff(&cfg.standoff)?;
    robot_doctor::check_docking(&cfg.docking)?;

    if !cfg.mcu.is_dry_run() {
        anyhow::ensure!(!cfg.mcu.device.is_empty(), "mcu.device missing");
        anyhow::ensure!(cfg.mcu.baud > 0, "mcu.baud invalid");
    }
    anyhow::ensure!(cfg.mcu.lift_ack_timeout_ms >= 100, "mcu.lift_ack_timeout_ms too small; set >= 100");
    anyhow::ensure!(cfg.mcu.read_timeout_ms <= cfg.mcu.lift_ack_timeout_ms, "mcu.read_timeout_ms exceeds the lift ack timeout");

    for feed in [&cfg.perception.front_replay, &cfg.perception.back_replay] {
        if !Path::new(feed).is_file() {
            warn!("doctor: replay feed {} not found; `valet robot` will fail to start", feed);
        }
    }
    if let Some(gap) = cfg.robot.gap_m {
        anyhow::ensure!(gap >= 0.0, "robot.gap_m must be >= 0");
    }

    info!("doctor: OK");
    Ok(())
}

async fn dispatch(cfg: &Config) -> Result<()> {
    let listener = TcpListener::bind(&cfg.dispatch.bind)
        .await
        .with_context(|| format!("bind {}", cfg.dispatch.bind))?;
    let dispatcher = Arc::new(Dispatcher::new(Lot::new(&cfg.lot), cfg.dispatch.robot_handle));

    tokio::select! {
        res = serve(listener, dispatcher) => res,
        sig = tokio::signal::ctrl_c() => {
            sig.context("wait for ctrl-c")?;
            info!("dispatch: interrupted, shutting down");
            Ok(())
        }
    }
}

async fn robot(cfg: &Config) -> Result<()> {
    let motion = valet_mcu::open(&cfg.mcu).context("open motion port")?;
    let front = ReplayPerception::open(&cfg.perception.front_replay)?;
    let back = ReplayPerception::open(&cfg.perception.back_replay)?;
    let ctx = RobotContext {
        front: Box::new(front),
        back: Box::new(back),
        motion,
        gap: Box::new(FixedGap(cfg.robot.gap_m)),
    };
    let orch = Orchestrator::new(ctx, cfg.nav.clone(), cfg.docking.clone(), AckTimeouts::from_config(&cfg.mcu));
    let mut link = RobotLink::new(cfg.robot.link.clone(), cfg.markers.clone(), cfg.standoff.clone(), orch);

    tokio::select! {
        res = link.run_forever() => res,
        sig = tokio::signal::ctrl_c() => {
            sig.context("wait for ctrl-c")?;
            info!("robot: interrupted");
            Ok(())
        }
    }
}

fn lot_layout(cfg: &Config) -> String {
    let m = &cfg.markers;
    let mut out = format!("{} (marker {})\n", location_code(0, "", 0), m.start);
    for s in 1..=cfg.lot.sectors {
        out.push_str(&format!("sector {} {} (marker {})\n", s, location_code(s, "Middle", 0), marker(m.sector(s))));
        for side in [Side::Right, Side::Left] {
            let bays: Vec<String> = (1..=cfg.lot.spaces_per_side)
                .map(|z| {
                    let slot = Slot::new(s, side, z);
                    format!("{}[{}]", slot.location_code(), marker(m.bay(slot)))
                })
                .collect();
            out.push_str(&format!("  {:<5} {}\n", side.as_str(), bays.join(" ")));
        }
    }
    let total = cfg.lot.sectors * cfg.lot.spaces_per_side * 2;
    out.push_str(&format!("capacity: {} bays\n", total));
    out
}

fn marker(id: Option<u32>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}
