//! Core types shared by the playback engine

use serde::{Deserialize, Serialize};

use super::media::PipelineError;

/// Kind of elementary stream carried by a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Video-only stream, the reference clock
    Video,
    /// Audio-only stream, follows the video clock
    Audio,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "Video"),
            MediaKind::Audio => write!(f, "Audio"),
        }
    }
}

/// Native signals emitted by a media pipeline
///
/// These mirror what a decode/render unit reports on its own, independently
/// of what the session asked it to do.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Enough data is buffered to begin playback
    Ready,
    /// Playback position advanced
    TimeUpdate,
    /// Playback halted waiting for data
    Stalled,
    /// Data arrived again after a stall
    Resumed,
    /// A position write has been applied
    Seeked,
    /// The end of the stream was reached
    Ended,
    /// The pipeline failed and will not recover
    Error(PipelineError),
}

/// Playback speed, restricted to the rates offered by the player chrome
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackRate {
    Half,
    ThreeQuarters,
    #[default]
    Normal,
    FiveQuarters,
    ThreeHalves,
    Double,
}

impl PlaybackRate {
    /// All selectable rates, slowest first
    pub const ALL: [PlaybackRate; 6] = [
        PlaybackRate::Half,
        PlaybackRate::ThreeQuarters,
        PlaybackRate::Normal,
        PlaybackRate::FiveQuarters,
        PlaybackRate::ThreeHalves,
        PlaybackRate::Double,
    ];

    /// Speed multiplier applied to the pipelines
    pub fn as_f64(self) -> f64 {
        match self {
            PlaybackRate::Half => 0.5,
            PlaybackRate::ThreeQuarters => 0.75,
            PlaybackRate::Normal => 1.0,
            PlaybackRate::FiveQuarters => 1.25,
            PlaybackRate::ThreeHalves => 1.5,
            PlaybackRate::Double => 2.0,
        }
    }

    /// Look up the rate matching a multiplier exactly
    pub fn from_f64(value: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rate| (rate.as_f64() - value).abs() < f64::EPSILON)
    }

    /// Next faster rate, wrapping back to the slowest one
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|r| *r == self).unwrap_or(2);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl std::fmt::Display for PlaybackRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.as_f64())
    }
}

/// Linear volume multiplier in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Volume(f64);

impl Volume {
    pub const MAX: Volume = Volume(1.0);

    /// Create a volume, clamping out-of-range values. NaN maps to silence.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Volume(0.0);
        }
        Volume(value.clamp(0.0, 1.0))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume::MAX
    }
}

impl From<f64> for Volume {
    fn from(value: f64) -> Self {
        Volume::new(value)
    }
}

/// Positions read from the reference pipeline, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timeline {
    pub current_time: f64,
    pub duration: f64,
    pub buffered: f64,
}

impl Timeline {
    /// Fraction of `position` over the duration, `0.0` while the duration is unknown
    pub fn fraction_of(&self, position: f64) -> f64 {
        if self.duration.is_finite() && self.duration > 0.0 {
            (position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
