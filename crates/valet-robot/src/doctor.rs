use anyhow::{Context, Result};
use std::collections::BTreeSet;

use valet_proto::{Side, Slot};

use crate::dock::DockingConfig;
use crate::link::LinkConfig;
use crate::mission::{MarkerLayout, StandoffConfig};

/// Every marker the lot needs must get its own id.
pub fn check_markers(layout: &MarkerLayout, sectors: u32, spaces_per_side: u32) -> Result<()> {
    anyhow::ensure!(layout.sector_stride > spaces_per_side, "markers.sector_stride must exceed lot.spaces_per_side");
    anyhow::ensure!(layout.left_offset > spaces_per_side, "markers.left_offset must exceed lot.spaces_per_side");

    let mut seen = BTreeSet::new();
    seen.insert(layout.start);
    for s in 1..=sectors {
        let sector = layout.sector(s).with_context(|| format!("marker of sector {} overflows", s))?;
        anyhow::ensure!(seen.insert(sector), "marker {} (sector {}) is used twice", sector, s);
        for z in 1..=spaces_per_side {
            let aisle = layout.subzone(s, z).with_context(|| format!("marker of aisle {}/{} overflows", s, z))?;
            anyhow::ensure!(seen.insert(aisle), "marker {} (aisle {}/{}) is used twice", aisle, s, z);
            for side in [Side::Left, Side::Right] {
                let bay = layout.bay(Slot::new(s, side, z)).with_context(|| format!("marker of bay {},{},{} overflows", s, side, z))?;
                anyhow::ensure!(seen.insert(bay), "marker {} (bay {},{},{}) is used twice", bay, s, side, z);
            }
        }
    }
    Ok(())
}

pub fn check_standoff(s: &StandoffConfig) -> Result<()> {
    for (name, v) in [("sector_m", s.sector_m), ("subzone_m", s.subzone_m), ("bay_m", s.bay_m), ("exit_m", s.exit_m), ("start_m", s.start_m)] {
        anyhow::ensure!(v > 0.0 && v < 5.0, "standoff.{} should be in (0, 5) m", name);
    }
    Ok(())
}

pub fn check_docking(d: &DockingConfig) -> Result<()> {
    anyhow::ensure!(d.min_standoff_m > 0.0, "docking.min_standoff_m must be > 0");
    anyhow::ensure!(d.min_standoff_m <= d.max_standoff_m, "docking.min_standoff_m must be <= max_standoff_m");
    anyhow::ensure!(
        d.default_standoff_m >= d.min_standoff_m && d.default_standoff_m <= d.max_standoff_m,
        "docking.default_standoff_m must lie within [min_standoff_m, max_standoff_m]"
    );
    Ok(())
}

pub fn check_link(l: &LinkConfig) -> Result<()> {
    anyhow::ensure!(l.dispatcher.contains(':'), "robot.dispatcher must be host:port");
    anyhow::ensure!(l.reconnect_min_ms >= 10, "robot.reconnect_min_ms too small; set >= 10");
    anyhow::ensure!(l.reconnect_min_ms <= l.reconnect_max_ms, "robot.reconnect_min_ms must be <= reconnect_max_ms");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::tests::{layout, standoff};

    #[test]
    fn reference_layout_has_unique_markers() {
        assert!(check_markers(&layout(), 2, 6).is_ok());
    }

    #[test]
    fn overlapping_rows_are_rejected() {
        let l = MarkerLayout { left_offset: 3, ..layout() };
        assert!(check_markers(&l, 2, 6).is_err());
    }

    #[test]
    fn sector_colliding_with_start_is_rejected() {
        // sector 1 lands on the start marker
        let l = MarkerLayout { start: 1, ..layout() };
        assert!(check_markers(&l, 2, 6).is_err());
    }

    #[test]
    fn marker_overflow_is_rejected() {
        let l = MarkerLayout { bay_base: u32::MAX - 10, ..layout() };
        assert!(check_markers(&l, 2, 6).is_err());
    }

    #[test]
    fn standoff_must_be_positive() {
        assert!(check_standoff(&standoff()).is_ok());
        assert!(check_standoff(&StandoffConfig { bay_m: 0.0, ..standoff() }).is_err());
    }

    #[test]
    fn docking_default_within_bounds() {
        let d = DockingConfig { gap_offset_m: 0.1, min_standoff_m: 0.3, max_standoff_m: 0.8, default_standoff_m: 0.5 };
        assert!(check_docking(&d).is_ok());
        assert!(check_docking(&DockingConfig { default_standoff_m: 0.9, ..d.clone() }).is_err());
        assert!(check_docking(&DockingConfig { min_standoff_m: 0.0, ..d }).is_err());
    }

    #[test]
    fn link_needs_host_and_port() {
        let l = LinkConfig { dispatcher: "127.0.0.1:5000".into(), reconnect_min_ms: 500, reconnect_max_ms: 10_000 };
        assert!(check_link(&l).is_ok());
        assert!(check_link(&LinkConfig { dispatcher: "localhost".into(), ..l }).is_err());
    }
}
