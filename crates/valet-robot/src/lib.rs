//! Robot side: turns dispatcher orders into missions and runs them through
//! the navigation controller.

pub mod context;
pub mod dock;
pub mod doctor;
pub mod link;
pub mod mission;
pub mod orchestrator;

pub use context::{FixedGap, GapSensor, RobotContext};
pub use mission::{MarkerLayout, Mission, PlanError, StandoffConfig};
pub use orchestrator::{MissionError, MissionReport, Orchestrator};
pub use dock::{AckTimeouts, DockingConfig};
pub use link::{LinkConfig, RobotLink};
