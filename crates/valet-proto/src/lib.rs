//! Line grammar spoken between the dispatcher, the robot and the apps.
//!
//! Every message is one UTF-8 line of comma separated fields. Each direction
//! of travel has its own closed enum so the receiving side can match
//! exhaustively.

pub mod location;
pub mod wire;

pub use location::location_code;
pub use wire::{
    AppNotice, AppRequest, Assignment, Direction, ProtoError, Role, RobotCommand, RobotEvent, Side,
    Slot,
};
