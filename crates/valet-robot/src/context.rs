use valet_mcu::MotionPort;
use valet_vision::{CameraSide, Perception};

/// Distance between the robot and the vehicle it carries, as reported by
/// the lift's gap sensor.
pub trait GapSensor: Send {
    fn read_gap_m(&mut self) -> Option<f32>;
}

/// Gap sensor stand-in with a configured reading (or none).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedGap(pub Option<f32>);

impl GapSensor for FixedGap {
    fn read_gap_m(&mut self) -> Option<f32> {
        self.0
    }
}

/// Everything one robot needs to run a mission, handed over once.
pub struct RobotContext {
    pub front: Box<dyn Perception>,
    pub back: Box<dyn Perception>,
    pub motion: Box<dyn MotionPort>,
    pub gap: Box<dyn GapSensor>,
}

impl RobotContext {
    pub fn camera_and_motion(&mut self, side: CameraSide) -> (&mut dyn Perception, &mut dyn MotionPort) {
        let camera = match side {
            CameraSide::Front => self.front.as_mut(),
            CameraSide::Back => self.back.as_mut(),
        };
        (camera, self.motion.as_mut())
    }
}
