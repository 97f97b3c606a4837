//! Perception seam: marker detection and pose estimation live outside this
//! workspace and plug in through [`Perception`].

pub mod replay;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraSide {
    Front,
    Back,
}

impl CameraSide {
    pub fn opposite(self) -> Self {
        match self {
            CameraSide::Front => CameraSide::Back,
            CameraSide::Back => CameraSide::Front,
        }
    }
}

/// One pose estimate for the requested marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    pub marker_id: u32,
    pub distance_m: f32,
    /// Signed; positive means the robot has to turn clockwise to face the marker squarely.
    pub yaw_deg: f32,
    /// Marker centre in image pixels.
    pub center_px: (f32, f32),
}

#[derive(Debug, thiserror::Error)]
pub enum PerceptionError {
    #[error("frame unavailable: {0}")]
    FrameUnavailable(String),
    #[error("perception i/o: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Perception: Send {
    /// Grabs one frame and looks for `marker_id` in it. `Ok(None)` when the
    /// marker is not in view.
    fn locate(&mut self, marker_id: u32) -> Result<Option<MarkerPose>, PerceptionError>;
}

impl<P: Perception + ?Sized> Perception for Box<P> {
    fn locate(&mut self, marker_id: u32) -> Result<Option<MarkerPose>, PerceptionError> {
        (**self).locate(marker_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerceptionConfig {
    /// Recorded observation feeds, one per camera.
    pub front_replay: String,
    pub back_replay: String,
}
