//! In-memory model of the lot: sectors split into a left and a right row of
//! bays. Callers serialize access; every operation here is a single-step
//! read or mutation.

pub mod doctor;

use serde::Deserialize;
use tracing::{debug, info};
use valet_proto::{Side, Slot};

#[derive(Debug, Clone, Deserialize)]
pub struct LotConfig {
    pub sectors: u32,
    pub spaces_per_side: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LotError {
    #[error("no bay at sector={sector} subzone={subzone}")]
    InvalidIndex { sector: u32, subzone: u32 },
    #[error("bay {slot} already holds {occupant}")]
    AlreadyOccupied { slot: Slot, occupant: String },
    #[error("invalid side {0:?}: expected left or right")]
    InvalidDirection(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParkingSpace {
    occupant: Option<String>,
}

impl ParkingSpace {
    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    pub fn occupant(&self) -> Option<&str> {
        self.occupant.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct Sector {
    pub left: Vec<ParkingSpace>,
    pub right: Vec<ParkingSpace>,
}

impl Sector {
    fn new(spaces_per_side: u32) -> Self {
        let row = vec![ParkingSpace::default(); spaces_per_side as usize];
        Self { left: row.clone(), right: row }
    }

    fn row(&self, side: Side) -> &[ParkingSpace] {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn row_mut(&mut self, side: Side) -> &mut [ParkingSpace] {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lot {
    sectors: Vec<Sector>,
}

impl Lot {
    pub fn new(cfg: &LotConfig) -> Self {
        let sectors = (0..cfg.sectors).map(|_| Sector::new(cfg.spaces_per_side)).collect();
        info!("lot: {} sectors x 2 sides x {} bays", cfg.sectors, cfg.spaces_per_side);
        Self { sectors }
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    /// First empty bay, visiting sectors in order and the right row before
    /// the left one. Apps rely on this order.
    pub fn find_first_empty(&self) -> Option<Slot> {
        for (si, sector) in self.sectors.iter().enumerate() {
            for side in [Side::Right, Side::Left] {
                if let Some(zi) = sector.row(side).iter().position(ParkingSpace::is_empty) {
                    return Some(Slot::new(si as u32 + 1, side, zi as u32 + 1));
                }
            }
        }
        None
    }

    /// Bay holding `occupant`, scanning left before right.
    pub fn locate(&self, occupant: &str) -> Option<Slot> {
        for (si, sector) in self.sectors.iter().enumerate() {
            for side in [Side::Left, Side::Right] {
                if let Some(zi) = sector.row(side).iter().position(|s| s.occupant() == Some(occupant)) {
                    return Some(Slot::new(si as u32 + 1, side, zi as u32 + 1));
                }
            }
        }
        None
    }

    pub fn assign(&mut self, sector: u32, side: &str, subzone: u32, occupant: &str) -> Result<Slot, LotError> {
        let slot = self.resolve(sector, side, subzone)?;
        let space = self.space_mut(slot);
        if let Some(current) = &space.occupant {
            return Err(LotError::AlreadyOccupied { slot, occupant: current.clone() });
        }
        space.occupant = Some(occupant.to_string());
        info!("lot: {} -> {} ({})", occupant, slot, slot.location_code());
        Ok(slot)
    }

    /// Empties a bay and returns whoever was in it. Clearing an empty bay is a no-op.
    pub fn clear(&mut self, sector: u32, side: &str, subzone: u32) -> Result<Option<String>, LotError> {
        let slot = self.resolve(sector, side, subzone)?;
        let previous = self.space_mut(slot).occupant.take();
        match &previous {
            Some(v) => info!("lot: cleared {} (was {})", slot, v),
            None => debug!("lot: clear on empty bay {}", slot),
        }
        Ok(previous)
    }

    pub fn space(&self, slot: Slot) -> Option<&ParkingSpace> {
        let sector = self.sectors.get((slot.sector as usize).checked_sub(1)?)?;
        sector.row(slot.side).get((slot.subzone as usize).checked_sub(1)?)
    }

    /// `(occupied, total)` bays.
    pub fn occupancy(&self) -> (usize, usize) {
        let spaces = self.sectors.iter().flat_map(|s| s.left.iter().chain(s.right.iter()));
        spaces.fold((0, 0), |(occ, total), s| (occ + usize::from(!s.is_empty()), total + 1))
    }

    fn resolve(&self, sector: u32, side: &str, subzone: u32) -> Result<Slot, LotError> {
        let side: Side = side.parse().map_err(|_| LotError::InvalidDirection(side.to_string()))?;
        let slot = Slot::new(sector, side, subzone);
        match self.space(slot) {
            Some(_) => Ok(slot),
            None => Err(LotError::InvalidIndex { sector, subzone }),
        }
    }

    fn space_mut(&mut self, slot: Slot) -> &mut ParkingSpace {
        &mut self.sectors[slot.sector as usize - 1].row_mut(slot.side)[slot.subzone as usize - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_lot() -> Lot {
        Lot::new(&LotConfig { sectors: 2, spaces_per_side: 6 })
    }

    #[test]
    fn empty_lot_fills_right_row_first() {
        let mut lot = reference_lot();
        assert_eq!(lot.find_first_empty(), Some(Slot::new(1, Side::Right, 1)));

        for z in 1..=6 {
            lot.assign(1, "right", z, &format!("r{}", z)).unwrap();
        }
        assert_eq!(lot.find_first_empty(), Some(Slot::new(1, Side::Left, 1)));

        for z in 1..=6 {
            lot.assign(1, "left", z, &format!("l{}", z)).unwrap();
        }
        assert_eq!(lot.find_first_empty(), Some(Slot::new(2, Side::Right, 1)));
    }

    #[test]
    fn full_lot_has_no_empty_bay() {
        let mut lot = reference_lot();
        let mut n = 0;
        while let Some(slot) = lot.find_first_empty() {
            lot.assign(slot.sector, slot.side.as_str(), slot.subzone, &n.to_string()).unwrap();
            n += 1;
        }
        assert_eq!(n, 24);
        assert_eq!(lot.occupancy(), (24, 24));
        assert_eq!(lot.find_first_empty(), None);
    }

    #[test]
    fn locate_finds_vehicle() {
        let mut lot = reference_lot();
        lot.assign(1, "left", 1, "1234").unwrap();
        lot.assign(1, "right", 3, "5678").unwrap();
        assert_eq!(lot.locate("5678"), Some(Slot::new(1, Side::Right, 3)));
        assert_eq!(lot.locate("1234"), Some(Slot::new(1, Side::Left, 1)));
        assert_eq!(lot.locate("0000"), None);
    }

    #[test]
    fn assign_onto_occupied_bay_keeps_occupant() {
        let mut lot = reference_lot();
        lot.assign(2, "left", 4, "1234").unwrap();
        let err = lot.assign(2, "left", 4, "9999").unwrap_err();
        assert_eq!(err, LotError::AlreadyOccupied { slot: Slot::new(2, Side::Left, 4), occupant: "1234".into() });
        assert_eq!(lot.space(Slot::new(2, Side::Left, 4)).unwrap().occupant(), Some("1234"));
    }

    #[test]
    fn assign_rejects_bad_address() {
        let mut lot = reference_lot();
        assert_eq!(lot.assign(3, "left", 1, "x"), Err(LotError::InvalidIndex { sector: 3, subzone: 1 }));
        assert_eq!(lot.assign(0, "left", 1, "x"), Err(LotError::InvalidIndex { sector: 0, subzone: 1 }));
        assert_eq!(lot.assign(1, "left", 7, "x"), Err(LotError::InvalidIndex { sector: 1, subzone: 7 }));
        assert_eq!(lot.assign(1, "Middle", 1, "x"), Err(LotError::InvalidDirection("Middle".into())));
        assert_eq!(lot.occupancy(), (0, 24));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut lot = reference_lot();
        lot.assign(1, "right", 2, "1234").unwrap();
        assert_eq!(lot.clear(1, "right", 2).unwrap(), Some("1234".to_string()));
        assert_eq!(lot.clear(1, "right", 2).unwrap(), None);
        assert!(lot.space(Slot::new(1, Side::Right, 2)).unwrap().is_empty());
        assert_eq!(lot.clear(1, "right", 9), Err(LotError::InvalidIndex { sector: 1, subzone: 9 }));
    }
}
