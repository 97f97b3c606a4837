use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::location::location_code;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    #[error("empty line")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{command}: expected {expected} fields, got {got}")]
    Arity { command: &'static str, expected: usize, got: usize },
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),
    #[error("invalid side: {0:?}")]
    InvalidSide(String),
    #[error("invalid direction: {0:?}")]
    InvalidDirection(String),
    #[error("invalid role: {0:?}")]
    InvalidRole(String),
    #[error("missing vehicle id")]
    MissingVehicle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl FromStr for Side {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            other => Err(ProtoError::InvalidSide(other.to_string())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way the robot drives onto the bay marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl FromStr for Direction {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            other => Err(ProtoError::InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one bay. Sector and subzone are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub sector: u32,
    pub side: Side,
    pub subzone: u32,
}

impl Slot {
    pub fn new(sector: u32, side: Side, subzone: u32) -> Self {
        Self { sector, side, subzone }
    }

    pub fn location_code(&self) -> String {
        location_code(self.sector, self.side.as_str(), self.subzone)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.sector, self.side, self.subzone)
    }
}

/// One mission order: where, how to dock, and for which vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub slot: Slot,
    pub direction: Direction,
    pub vehicle: String,
}

impl Assignment {
    fn from_fields(command: &'static str, f: &[&str]) -> Result<Self, ProtoError> {
        if f.len() != 5 {
            return Err(ProtoError::Arity { command, expected: 6, got: f.len() + 1 });
        }
        let vehicle = vehicle(f[4])?;
        Ok(Self {
            slot: Slot { sector: number(f[0])?, side: f[1].parse()?, subzone: number(f[2])? },
            direction: f[3].parse()?,
            vehicle,
        })
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.slot, self.direction, self.vehicle)
    }
}

/// Declared by a client on its first line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    App,
    Robot,
}

impl FromStr for Role {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(Role::App),
            "robot" => Ok(Role::Robot),
            other => Err(ProtoError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::App => "app",
            Role::Robot => "robot",
        })
    }
}

/// App → dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppRequest {
    In { vehicle: String },
    Out { vehicle: String },
    Status,
}

impl AppRequest {
    pub fn parse(line: &str) -> Result<Self, ProtoError> {
        let (head, rest) = split(line)?;
        match head {
            "IN" => Ok(AppRequest::In { vehicle: single_vehicle("IN", &rest)? }),
            "OUT" => Ok(AppRequest::Out { vehicle: single_vehicle("OUT", &rest)? }),
            "STATUS" => Ok(AppRequest::Status),
            _ => Err(ProtoError::Unknown(line.to_string())),
        }
    }
}

/// Dispatcher → robot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotCommand {
    Park(Assignment),
    Out(Assignment),
}

impl RobotCommand {
    pub fn parse(line: &str) -> Result<Self, ProtoError> {
        let (head, rest) = split(line)?;
        match head {
            "PARK" => Ok(RobotCommand::Park(Assignment::from_fields("PARK", &rest)?)),
            "OUT" => Ok(RobotCommand::Out(Assignment::from_fields("OUT", &rest)?)),
            _ => Err(ProtoError::Unknown(line.to_string())),
        }
    }

    pub fn assignment(&self) -> &Assignment {
        match self {
            RobotCommand::Park(a) | RobotCommand::Out(a) => a,
        }
    }
}

impl fmt::Display for RobotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotCommand::Park(a) => write!(f, "PARK,{}", a),
            RobotCommand::Out(a) => write!(f, "OUT,{}", a),
        }
    }
}

/// Robot → dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotEvent {
    SectorArrived { sector: u32 },
    SubzoneArrived(Slot),
    StartingPoint,
    Done(Assignment),
    OutDone(Assignment),
    Complete,
    Failed { assignment: Assignment, reason: String },
}

impl RobotEvent {
    pub fn parse(line: &str) -> Result<Self, ProtoError> {
        let (head, rest) = split(line)?;
        match head {
            "sector_arrived" => {
                let sector = rest.first().ok_or(ProtoError::Arity { command: "sector_arrived", expected: 4, got: 1 })?;
                Ok(RobotEvent::SectorArrived { sector: number(sector)? })
            }
            "subzone_arrived" => {
                if rest.len() != 3 {
                    return Err(ProtoError::Arity { command: "subzone_arrived", expected: 4, got: rest.len() + 1 });
                }
                Ok(RobotEvent::SubzoneArrived(Slot {
                    sector: number(rest[0])?,
                    side: rest[1].parse()?,
                    subzone: number(rest[2])?,
                }))
            }
            "starting_point" => Ok(RobotEvent::StartingPoint),
            "DONE" => Ok(RobotEvent::Done(Assignment::from_fields("DONE", &rest)?)),
            "OUT_DONE" => Ok(RobotEvent::OutDone(Assignment::from_fields("OUT_DONE", &rest)?)),
            "COMPLETE" => Ok(RobotEvent::Complete),
            "FAILED" => {
                if rest.len() < 6 {
                    return Err(ProtoError::Arity { command: "FAILED", expected: 7, got: rest.len() + 1 });
                }
                let assignment = Assignment::from_fields("FAILED", &rest[..5])?;
                Ok(RobotEvent::Failed { assignment, reason: rest[5..].join(",") })
            }
            _ => Err(ProtoError::Unknown(line.to_string())),
        }
    }
}

impl fmt::Display for RobotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotEvent::SectorArrived { sector } => write!(f, "sector_arrived,{},None,None", sector),
            RobotEvent::SubzoneArrived(slot) => write!(f, "subzone_arrived,{}", slot),
            RobotEvent::StartingPoint => f.write_str("starting_point,0,None,None"),
            RobotEvent::Done(a) => write!(f, "DONE,{}", a),
            RobotEvent::OutDone(a) => write!(f, "OUT_DONE,{}", a),
            RobotEvent::Complete => f.write_str("COMPLETE"),
            RobotEvent::Failed { assignment, reason } => write!(f, "FAILED,{},{}", assignment, reason),
        }
    }
}

/// Dispatcher → app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppNotice {
    /// Bay assigned; the robot has been sent.
    Assigned { code: String, vehicle: String },
    Move { code: String },
    Parked { code: String, vehicle: String },
    Lifted { code: String, vehicle: String },
    Complete,
    Failed { code: String, vehicle: String },
    Status { occupied: usize, total: usize },
    NoSpace { vehicle: String },
    NotFound { vehicle: String },
    AlreadyParked { code: String, vehicle: String },
    NoRobot { vehicle: String },
    UnknownCommand { line: String },
    Rejected { line: String },
}

impl fmt::Display for AppNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppNotice::Assigned { code, vehicle } => write!(f, "PARKED,{},{}", code, vehicle),
            AppNotice::Move { code } => write!(f, "MOVE,{}", code),
            AppNotice::Parked { code, vehicle } => write!(f, "parked,{},{}", code, vehicle),
            AppNotice::Lifted { code, vehicle } => write!(f, "lifted,{},{}", code, vehicle),
            AppNotice::Complete => f.write_str("COMPLETE"),
            AppNotice::Failed { code, vehicle } => write!(f, "FAILED,{},{}", code, vehicle),
            AppNotice::Status { occupied, total } => write!(f, "STATUS,{},{}", occupied, total),
            AppNotice::NoSpace { vehicle } => write!(f, "NO_SPACE,{}", vehicle),
            AppNotice::NotFound { vehicle } => write!(f, "NOT_FOUND,{}", vehicle),
            AppNotice::AlreadyParked { code, vehicle } => write!(f, "ALREADY_PARKED,{},{}", code, vehicle),
            AppNotice::NoRobot { vehicle } => write!(f, "NO_ROBOT,{}", vehicle),
            AppNotice::UnknownCommand { line } => write!(f, "UNKNOWN_COMMAND,{}", line),
            AppNotice::Rejected { line } => write!(f, "REJECTED,{}", line),
        }
    }
}

fn split(line: &str) -> Result<(&str, Vec<&str>), ProtoError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtoError::Empty);
    }
    let mut parts = line.split(',').map(str::trim);
    let head = parts.next().unwrap_or_default();
    Ok((head, parts.collect()))
}

fn single_vehicle(command: &'static str, rest: &[&str]) -> Result<String, ProtoError> {
    if rest.len() != 1 {
        return Err(ProtoError::Arity { command, expected: 2, got: rest.len() + 1 });
    }
    vehicle(rest[0])
}

fn vehicle(s: &str) -> Result<String, ProtoError> {
    if s.is_empty() { return Err(ProtoError::MissingVehicle); }
    Ok(s.to_string())
}

fn number(s: &str) -> Result<u32, ProtoError> {
    s.parse().map_err(|_| ProtoError::InvalidNumber(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment() -> Assignment {
        Assignment { slot: Slot::new(1, Side::Right, 3), direction: Direction::Forward, vehicle: "5678".into() }
    }

    #[test]
    fn app_requests() {
        assert_eq!(AppRequest::parse("IN,1234\n").unwrap(), AppRequest::In { vehicle: "1234".into() });
        assert_eq!(AppRequest::parse("OUT,1234").unwrap(), AppRequest::Out { vehicle: "1234".into() });
        assert_eq!(AppRequest::parse("STATUS").unwrap(), AppRequest::Status);
        assert!(matches!(AppRequest::parse("IN"), Err(ProtoError::Arity { .. })));
        assert!(matches!(AppRequest::parse("IN,"), Err(ProtoError::MissingVehicle)));
        assert!(matches!(AppRequest::parse("HELLO,1"), Err(ProtoError::Unknown(_))));
        assert!(matches!(AppRequest::parse("   "), Err(ProtoError::Empty)));
    }

    #[test]
    fn robot_command_text() {
        let park = RobotCommand::Park(assignment());
        assert_eq!(park.to_string(), "PARK,1,right,3,forward,5678");
        assert_eq!(RobotCommand::parse("PARK,1,right,3,forward,5678").unwrap(), park);

        let out = RobotCommand::parse("OUT,2,left,1,backward,1234").unwrap();
        assert_eq!(out.assignment().slot, Slot::new(2, Side::Left, 1));
        assert_eq!(out.assignment().direction, Direction::Backward);
    }

    #[test]
    fn robot_command_rejects_bad_fields() {
        assert!(matches!(RobotCommand::parse("PARK,1,up,3,forward,5678"), Err(ProtoError::InvalidSide(_))));
        assert!(matches!(RobotCommand::parse("PARK,x,left,3,forward,5678"), Err(ProtoError::InvalidNumber(_))));
        assert!(matches!(RobotCommand::parse("PARK,1,left,3,sideways,5678"), Err(ProtoError::InvalidDirection(_))));
        assert!(matches!(RobotCommand::parse("PARK,1,left,3"), Err(ProtoError::Arity { .. })));
    }

    #[test]
    fn robot_events_in_wire_form() {
        assert_eq!(RobotEvent::SectorArrived { sector: 2 }.to_string(), "sector_arrived,2,None,None");
        assert_eq!(RobotEvent::StartingPoint.to_string(), "starting_point,0,None,None");
        assert_eq!(
            RobotEvent::SubzoneArrived(Slot::new(1, Side::Left, 4)).to_string(),
            "subzone_arrived,1,left,4"
        );
        assert_eq!(RobotEvent::parse("sector_arrived,2,None,None").unwrap(), RobotEvent::SectorArrived { sector: 2 });
        assert_eq!(RobotEvent::parse("starting_point,0,None,None").unwrap(), RobotEvent::StartingPoint);
        assert_eq!(RobotEvent::parse("COMPLETE").unwrap(), RobotEvent::Complete);
        assert_eq!(RobotEvent::parse("OUT_DONE,1,right,3,forward,5678").unwrap(), RobotEvent::OutDone(assignment()));
    }

    #[test]
    fn failure_reason_keeps_commas() {
        let ev = RobotEvent::parse("FAILED,1,right,3,forward,5678,marker 21 unreachable,gave up").unwrap();
        match ev {
            RobotEvent::Failed { assignment: a, reason } => {
                assert_eq!(a, assignment());
                assert_eq!(reason, "marker 21 unreachable,gave up");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn roles_are_exact() {
        assert_eq!("app".parse::<Role>().unwrap(), Role::App);
        assert_eq!("robot".parse::<Role>().unwrap(), Role::Robot);
        assert!("App".parse::<Role>().is_err());
        assert!("robots".parse::<Role>().is_err());
    }

    #[test]
    fn notices() {
        let n = AppNotice::Assigned { code: "aRa".into(), vehicle: "1234".into() };
        assert_eq!(n.to_string(), "PARKED,aRa,1234");
        assert_eq!(AppNotice::Parked { code: "aRa".into(), vehicle: "1234".into() }.to_string(), "parked,aRa,1234");
        assert_eq!(AppNotice::Lifted { code: "bLc".into(), vehicle: "9".into() }.to_string(), "lifted,bLc,9");
        assert_eq!(AppNotice::Move { code: "starting_point".into() }.to_string(), "MOVE,starting_point");
    }
}
