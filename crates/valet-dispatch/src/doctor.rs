use anyhow::Result;
use std::net::SocketAddr;
use crate::DispatchConfig;

pub fn check_dispatch(cfg: &DispatchConfig) -> Result<()> {
    anyhow::ensure!(cfg.bind.parse::<SocketAddr>().is_ok(), "dispatch.bind must be ip:port, got {}", cfg.bind);
    anyhow::ensure!(cfg.robot_handle >= 1, "dispatch.robot_handle starts at 1");
    Ok(())
}
