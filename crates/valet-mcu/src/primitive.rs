use std::fmt;

/// Discrete commands understood by the motor controller, one byte each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Forward,
    Backward,
    RotateCcw,
    RotateCw,
    StrafeLeft,
    StrafeRight,
    LiftEngage,
    LiftDisengage,
    Stop,
}

impl Primitive {
    pub fn as_byte(self) -> u8 {
        match self {
            Primitive::Forward => b'1',
            Primitive::Backward => b'2',
            Primitive::RotateCcw => b'3',
            Primitive::RotateCw => b'4',
            Primitive::StrafeLeft => b'5',
            Primitive::StrafeRight => b'6',
            Primitive::LiftEngage => b'7',
            Primitive::LiftDisengage => b'8',
            Primitive::Stop => b'9',
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            b'1' => Primitive::Forward,
            b'2' => Primitive::Backward,
            b'3' => Primitive::RotateCcw,
            b'4' => Primitive::RotateCw,
            b'5' => Primitive::StrafeLeft,
            b'6' => Primitive::StrafeRight,
            b'7' => Primitive::LiftEngage,
            b'8' => Primitive::LiftDisengage,
            b'9' => Primitive::Stop,
            _ => return None,
        })
    }

    pub fn is_rotation(self) -> bool {
        matches!(self, Primitive::RotateCcw | Primitive::RotateCw)
    }

    pub fn is_strafe(self) -> bool {
        matches!(self, Primitive::StrafeLeft | Primitive::StrafeRight)
    }

    pub fn is_translation(self) -> bool {
        matches!(self, Primitive::Forward | Primitive::Backward)
    }

    /// Movement bytes may be filtered for repeats; stop and lift bytes never are.
    pub fn is_movement(self) -> bool {
        self.is_rotation() || self.is_strafe() || self.is_translation()
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Primitive::Forward => "forward",
            Primitive::Backward => "backward",
            Primitive::RotateCcw => "rotate-ccw",
            Primitive::RotateCw => "rotate-cw",
            Primitive::StrafeLeft => "strafe-left",
            Primitive::StrafeRight => "strafe-right",
            Primitive::LiftEngage => "lift-engage",
            Primitive::LiftDisengage => "lift-disengage",
            Primitive::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Single-character replies from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    LiftEngaged,
    LiftDisengaged,
    RotationDone,
}

impl Ack {
    pub fn as_byte(self) -> u8 {
        match self {
            Ack::LiftEngaged => b'a',
            Ack::LiftDisengaged => b'c',
            Ack::RotationDone => b's',
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'a' => Some(Ack::LiftEngaged),
            b'c' => Some(Ack::LiftDisengaged),
            b's' => Some(Ack::RotationDone),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error("motion port i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("motion port closed")]
    Closed,
}

/// Write side and acknowledgement side of the motor controller link.
pub trait MotionPort: Send {
    fn send(&mut self, cmd: Primitive) -> Result<(), MotionError>;

    /// Next acknowledgement if one is waiting; `Ok(None)` when nothing arrived
    /// within the port's read timeout.
    fn poll_ack(&mut self) -> Result<Option<Ack>, MotionError>;
}

impl<M: MotionPort + ?Sized> MotionPort for Box<M> {
    fn send(&mut self, cmd: Primitive) -> Result<(), MotionError> {
        (**self).send(cmd)
    }

    fn poll_ack(&mut self) -> Result<Option<Ack>, MotionError> {
        (**self).poll_ack()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes_follow_controller_table() {
        let table = [
            (Primitive::Forward, b'1'),
            (Primitive::Backward, b'2'),
            (Primitive::RotateCcw, b'3'),
            (Primitive::RotateCw, b'4'),
            (Primitive::StrafeLeft, b'5'),
            (Primitive::StrafeRight, b'6'),
            (Primitive::LiftEngage, b'7'),
            (Primitive::LiftDisengage, b'8'),
            (Primitive::Stop, b'9'),
        ];
        for (p, b) in table {
            assert_eq!(p.as_byte(), b);
            assert_eq!(Primitive::from_byte(b), Some(p));
        }
        assert_eq!(Primitive::from_byte(b'0'), None);
    }

    #[test]
    fn ack_bytes() {
        assert_eq!(Ack::from_byte(b'a'), Some(Ack::LiftEngaged));
        assert_eq!(Ack::from_byte(b'c'), Some(Ack::LiftDisengaged));
        assert_eq!(Ack::from_byte(b's'), Some(Ack::RotationDone));
        assert_eq!(Ack::from_byte(b'\n'), None);
    }

    #[test]
    fn stop_and_lift_are_not_movement() {
        assert!(!Primitive::Stop.is_movement());
        assert!(!Primitive::LiftEngage.is_movement());
        assert!(Primitive::StrafeLeft.is_movement());
    }
}
