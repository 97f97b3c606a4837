use anyhow::{Context, Result};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::{MarkerPose, Perception, PerceptionError};

/// Plays back recorded observations, one line per frame:
///
/// ```text
/// # id,distance_m,yaw_deg,cx,cy
/// 21,1.80,7.5,402,240
/// -
/// ```
///
/// `-` is a frame without any marker. A frame showing a different marker
/// than the one asked for counts as not found.
#[derive(Debug, Default)]
pub struct ReplayPerception {
    frames: VecDeque<Option<MarkerPose>>,
}

impl ReplayPerception {
    pub fn open(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("read replay feed {}", path))?;
        let feed = Self::parse(&text).with_context(|| format!("parse replay feed {}", path))?;
        debug!("replay: {} frames from {}", feed.frames.len(), path);
        Ok(feed)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut frames = VecDeque::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') { continue; }
            if line == "-" {
                frames.push_back(None);
                continue;
            }
            let f: Vec<&str> = line.split(',').map(str::trim).collect();
            anyhow::ensure!(f.len() == 5, "line {}: expected 5 fields, got {}", n + 1, f.len());
            let num = |i: usize| -> Result<f32> {
                f[i].parse().with_context(|| format!("line {}: field {}", n + 1, i + 1))
            };
            frames.push_back(Some(MarkerPose {
                marker_id: f[0].parse().with_context(|| format!("line {}: marker id", n + 1))?,
                distance_m: num(1)?,
                yaw_deg: num(2)?,
                center_px: (num(3)?, num(4)?),
            }));
        }
        Ok(Self { frames })
    }

    pub fn from_frames(frames: impl IntoIterator<Item = Option<MarkerPose>>) -> Self {
        Self { frames: frames.into_iter().collect() }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl Perception for ReplayPerception {
    fn locate(&mut self, marker_id: u32) -> Result<Option<MarkerPose>, PerceptionError> {
        let Some(frame) = self.frames.pop_front() else {
            return Err(PerceptionError::FrameUnavailable("replay feed exhausted".into()));
        };
        Ok(match frame {
            Some(pose) if pose.marker_id == marker_id => Some(pose),
            Some(pose) => {
                warn!("replay: saw marker {} while looking for {}", pose.marker_id, marker_id);
                None
            }
            None => None,
        })
    }
}
