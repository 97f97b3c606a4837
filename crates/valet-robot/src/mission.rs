use serde::Deserialize;
use valet_mcu::Primitive;
use valet_proto::{Assignment, Direction, RobotCommand, RobotEvent, Side, Slot};
use valet_vision::CameraSide;

/// In-place quarter turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Turn {
    Cw,
    Ccw,
}

impl Turn {
    pub fn primitive(self) -> Primitive {
        match self {
            Turn::Cw => Primitive::RotateCw,
            Turn::Ccw => Primitive::RotateCcw,
        }
    }

    /// Turn that faces the bays on `side` from the aisle.
    pub fn toward(side: Side) -> Self {
        match side {
            Side::Right => Turn::Cw,
            Side::Left => Turn::Ccw,
        }
    }
}

/// Marker numbering of the lot.
///
/// sector `s` is `sector_base + s`; the aisle marker at subzone `z` of
/// sector `s` is `subzone_base + s * sector_stride + z`; the bay marker is
/// `bay_base + s * sector_stride + z`, plus `left_offset` on the left row.
/// Ids that would not fit in a `u32` come back as `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkerLayout {
    pub start: u32,
    pub sector_base: u32,
    pub subzone_base: u32,
    pub bay_base: u32,
    pub sector_stride: u32,
    pub left_offset: u32,
    /// Turn taken at the sector marker to enter the aisle.
    pub aisle_turn: Turn,
}

impl MarkerLayout {
    pub fn sector(&self, sector: u32) -> Option<u32> {
        self.sector_base.checked_add(sector)
    }

    pub fn subzone(&self, sector: u32, subzone: u32) -> Option<u32> {
        sector.checked_mul(self.sector_stride)?.checked_add(self.subzone_base)?.checked_add(subzone)
    }

    pub fn bay(&self, slot: Slot) -> Option<u32> {
        let side = match slot.side {
            Side::Right => 0,
            Side::Left => self.left_offset,
        };
        slot.sector
            .checked_mul(self.sector_stride)?
            .checked_add(self.bay_base)?
            .checked_add(side)?
            .checked_add(slot.subzone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("no marker for sector {sector} subzone {subzone} in this layout")]
    NoMarker { sector: u32, subzone: u32 },
}

/// Target distances from camera to marker, per kind of waypoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StandoffConfig {
    pub sector_m: f32,
    pub subzone_m: f32,
    pub bay_m: f32,
    pub exit_m: f32,
    pub start_m: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Standoff {
    Fixed(f32),
    /// Derived from the vehicle gap reading taken after the last lift.
    FromGap,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub marker_id: u32,
    pub direction: Direction,
    pub standoff: Standoff,
    pub camera: CameraSide,
}

impl Waypoint {
    fn new(marker_id: u32, direction: Direction, standoff: Standoff) -> Self {
        let camera = match direction {
            Direction::Forward => CameraSide::Front,
            Direction::Backward => CameraSide::Back,
        };
        Self { marker_id, direction, standoff, camera }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiftAction {
    Engage,
    Disengage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Lift(LiftAction),
    Travel(Waypoint),
    Turn(Turn),
    Report(RobotEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionKind {
    Park,
    Retrieve,
}

#[derive(Debug, Clone)]
pub struct Mission {
    pub kind: MissionKind,
    pub assignment: Assignment,
    pub steps: Vec<Step>,
}

impl Mission {
    /// Park: pick the vehicle up at the start bay, carry it to its bay and
    /// set it down. Retrieve: fetch it from its bay and set it down at the
    /// start bay.
    pub fn plan(cmd: &RobotCommand, layout: &MarkerLayout, standoff: &StandoffConfig) -> Result<Self, PlanError> {
        let (kind, a) = match cmd {
            RobotCommand::Park(a) => (MissionKind::Park, a),
            RobotCommand::Out(a) => (MissionKind::Retrieve, a),
        };
        let slot = a.slot;
        let across = Slot { side: slot.side.opposite(), ..slot };
        let fwd = Direction::Forward;

        let no_marker = PlanError::NoMarker { sector: slot.sector, subzone: slot.subzone };
        let sector_marker = layout.sector(slot.sector).ok_or(no_marker.clone())?;
        let aisle_marker = layout.subzone(slot.sector, slot.subzone).ok_or(no_marker.clone())?;
        let bay_marker = layout.bay(slot).ok_or(no_marker.clone())?;
        let across_marker = layout.bay(across).ok_or(no_marker)?;

        let mut steps = Vec::with_capacity(16);
        if kind == MissionKind::Park {
            steps.push(Step::Lift(LiftAction::Engage));
        }
        steps.extend([
            Step::Travel(Waypoint::new(sector_marker, fwd, Standoff::Fixed(standoff.sector_m))),
            Step::Report(RobotEvent::SectorArrived { sector: slot.sector }),
            Step::Turn(layout.aisle_turn),
            Step::Travel(Waypoint::new(aisle_marker, fwd, Standoff::Fixed(standoff.subzone_m))),
            Step::Report(RobotEvent::SubzoneArrived(slot)),
            Step::Turn(Turn::toward(slot.side)),
            Step::Travel(Waypoint::new(bay_marker, a.direction, Standoff::Fixed(standoff.bay_m))),
        ]);
        let (lift, exit, done) = match kind {
            MissionKind::Park => (LiftAction::Disengage, Standoff::Fixed(standoff.exit_m), RobotEvent::Done(a.clone())),
            MissionKind::Retrieve => (LiftAction::Engage, Standoff::FromGap, RobotEvent::OutDone(a.clone())),
        };
        steps.extend([
            Step::Lift(lift),
            // back out toward the bay across the aisle
            Step::Travel(Waypoint::new(across_marker, a.direction.reversed(), exit)),
            Step::Report(done),
            Step::Turn(Turn::toward(slot.side)),
            Step::Travel(Waypoint::new(layout.start, fwd, Standoff::Fixed(standoff.start_m))),
            Step::Report(RobotEvent::StartingPoint),
        ]);
        if kind == MissionKind::Retrieve {
            steps.push(Step::Lift(LiftAction::Disengage));
        }
        steps.push(Step::Report(RobotEvent::Complete));

        Ok(Self { kind, assignment: a.clone(), steps })
    }

    pub fn waypoints(&self) -> impl Iterator<Item = &Waypoint> {
        self.steps.iter().filter_map(|s| match s {
            Step::Travel(w) => Some(w),
            _ => None,
        })
    }
}
