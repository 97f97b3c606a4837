use anyhow::Result;
use crate::NavConfig;

pub fn check_nav(cfg: &NavConfig) -> Result<()> {
    anyhow::ensure!(cfg.max_lost_frames >= 1, "nav.max_lost_frames must be >= 1");
    anyhow::ensure!(cfg.angle_tolerance_deg > 0.0 && cfg.angle_tolerance_deg < 45.0, "nav.angle_tolerance_deg out of range");
    anyhow::ensure!(cfg.pixel_tolerance > 0.0, "nav.pixel_tolerance must be > 0");
    anyhow::ensure!(
        cfg.pixel_tolerance < cfg.frame_width_px as f32 / 2.0,
        "nav.pixel_tolerance must be smaller than half the frame"
    );
    anyhow::ensure!(cfg.distance_tolerance_m > 0.0 && cfg.distance_tolerance_m < 1.0, "nav.distance_tolerance_m out of range");
    anyhow::ensure!(cfg.sample_interval_ms <= 1000, "nav.sample_interval_ms should be <= 1000");
    Ok(())
}
