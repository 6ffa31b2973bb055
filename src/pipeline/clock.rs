//! Clock synchronization between the video and audio pipelines
//!
//! The video pipeline is the reference clock and is never adjusted. The audio
//! pipeline is pulled towards it: small drift is absorbed by nudging the
//! audio playback rate, large drift by moving the audio position outright.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::health::SyncStats;

/// Configuration for drift correction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Drift below this many seconds counts as in sync
    pub soft_threshold: f64,
    /// Drift at or above this many seconds is corrected with a position jump
    pub hard_threshold: f64,
    /// Relative audio rate change used for soft correction
    pub rate_adjust: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            soft_threshold: 0.05,
            hard_threshold: 2.0,
            rate_adjust: 0.02,
        }
    }
}

/// What to do with the audio pipeline after a drift sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftCorrection {
    /// Nothing to change
    None,
    /// Back in sync: undo a previous nudge
    ResetRate { rate: f64 },
    /// Soft correction: run audio slightly faster or slower
    Nudge { rate: f64 },
    /// Hard correction: move audio to the video position
    Snap { position: f64, rate: f64 },
}

/// Signed drift between the two clocks. Positive means audio is lagging.
pub fn drift(video_time: f64, audio_time: f64) -> f64 {
    video_time - audio_time
}

/// Periodic drift sampler
///
/// Stateless apart from its counters: every decision is derived from the
/// positions and the audio rate passed in, so a sample taken after a seek or a
/// stall is judged on its own.
#[derive(Debug, Clone)]
pub struct ClockSynchronizer {
    config: SyncConfig,
    stats: Arc<SyncStats>,
}

impl ClockSynchronizer {
    pub fn new(config: SyncConfig, stats: Arc<SyncStats>) -> Self {
        Self { config, stats }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Check whether a drift value is large enough to require a position jump
    pub fn needs_snap(&self, drift: f64) -> bool {
        drift.abs() >= self.config.hard_threshold
    }

    /// Decide the correction for one drift sample
    ///
    /// `audio_rate` is the rate the audio pipeline currently runs at and
    /// `base_rate` the rate selected for the session.
    pub fn evaluate(
        &self,
        video_time: f64,
        audio_time: f64,
        audio_rate: f64,
        base_rate: f64,
    ) -> DriftCorrection {
        let drift = drift(video_time, audio_time);
        if !drift.is_finite() {
            return DriftCorrection::None;
        }
        let magnitude = drift.abs();
        self.stats.record_drift(magnitude);

        if magnitude < self.config.soft_threshold {
            if rate_differs(audio_rate, base_rate) {
                return DriftCorrection::ResetRate { rate: base_rate };
            }
            return DriftCorrection::None;
        }

        if magnitude < self.config.hard_threshold {
            let rate = if drift > 0.0 {
                base_rate * (1.0 + self.config.rate_adjust)
            } else {
                base_rate * (1.0 - self.config.rate_adjust)
            };
            if rate_differs(audio_rate, rate) {
                self.stats.record_soft_correction();
                return DriftCorrection::Nudge { rate };
            }
            return DriftCorrection::None;
        }

        self.stats.record_hard_correction();
        DriftCorrection::Snap {
            position: video_time,
            rate: base_rate,
        }
    }
}

fn rate_differs(a: f64, b: f64) -> bool {
    (a - b).abs() > 1e-9
}
