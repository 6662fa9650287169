use bevy::reflect::{Reflect, std_traits::ReflectDefault};
use serde::{Deserialize, Serialize};

use crate::errors::{BakeError, BakeResult};

/// Sampling range and rate of a bake.
#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[reflect(Default)]
#[serde(default)]
pub struct BakeSettings {
    /// Samples per second.
    pub frame_rate: f32,
    pub start_time: f32,
    /// Defaults to the duration of the baked clip.
    pub end_time: Option<f32>,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            frame_rate: 60.,
            start_time: 0.,
            end_time: None,
        }
    }
}

/// Resolved frame times of one bake.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleRange {
    pub start_time: f32,
    pub end_time: f32,
    pub frame_rate: f32,
    pub frame_count: usize,
}

impl BakeSettings {
    pub fn with_frame_rate(mut self, frame_rate: f32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_range(mut self, start_time: f32, end_time: f32) -> Self {
        self.start_time = start_time;
        self.end_time = Some(end_time);
        self
    }

    /// Resolves the sampling range against a clip of the given duration. Both ends are sampled.
    pub fn sample_range(&self, clip_duration: f32) -> BakeResult<SampleRange> {
        if !self.frame_rate.is_finite() || self.frame_rate <= 0. {
            return Err(BakeError::InvalidRange {
                reason: format!("frame rate must be positive, got {}", self.frame_rate),
            });
        }
        let end_time = self.end_time.unwrap_or(clip_duration);
        let span = end_time - self.start_time;
        if !span.is_finite() || span <= 0. {
            return Err(BakeError::InvalidRange {
                reason: format!("empty range {}..{end_time}", self.start_time),
            });
        }

        // absorbs float error so that an exact multiple of the frame length adds no extra frame
        let frame_count = (span * self.frame_rate - 1e-3).ceil().max(0.) as usize + 1;
        Ok(SampleRange {
            start_time: self.start_time,
            end_time,
            frame_rate: self.frame_rate,
            frame_count,
        })
    }
}

impl SampleRange {
    /// Time of a frame, with the last frame landing exactly on the end time.
    pub fn time_at(&self, frame: usize) -> f32 {
        (self.start_time + frame as f32 / self.frame_rate).min(self.end_time)
    }

    pub fn times(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.frame_count).map(|frame| self.time_at(frame))
    }
}
