use anyhow::Result;
use crate::LotConfig;

pub fn check_lot(cfg: &LotConfig) -> Result<()> {
    anyhow::ensure!(cfg.sectors >= 1, "lot.sectors must be >= 1");
    // location codes spell sectors and subzones as single letters
    anyhow::ensure!(cfg.sectors <= 26, "lot.sectors must be <= 26");
    anyhow::ensure!(cfg.spaces_per_side >= 1 && cfg.spaces_per_side <= 26, "lot.spaces_per_side should be 1..26");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_lot_passes() {
        assert!(check_lot(&LotConfig { sectors: 2, spaces_per_side: 6 }).is_ok());
    }

    #[test]
    fn rejects_empty_or_oversized_lots() {
        assert!(check_lot(&LotConfig { sectors: 0, spaces_per_side: 6 }).is_err());
        assert!(check_lot(&LotConfig { sectors: 2, spaces_per_side: 0 }).is_err());
        assert!(check_lot(&LotConfig { sectors: 27, spaces_per_side: 6 }).is_err());
    }
}
