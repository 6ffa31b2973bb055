//! Buffering state fusion and sync metrics

use std::sync::atomic::{AtomicU64, Ordering};

use super::types::MediaKind;

/// Fuses the independent stall signals of both pipelines
///
/// Only observes: a stall on one pipeline never pauses the other. The two
/// pipelines free-run through a stall and the clock synchronizer pulls them
/// back together once both make progress again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferingMonitor {
    video_stalled: bool,
    audio_stalled: bool,
}

impl BufferingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stall. Returns `true` if the pipeline was not stalled before.
    pub fn on_stalled(&mut self, kind: MediaKind) -> bool {
        let flag = self.flag_mut(kind);
        let changed = !*flag;
        *flag = true;
        changed
    }

    /// Record that a pipeline is making progress again
    pub fn on_resumed(&mut self, kind: MediaKind) -> bool {
        let flag = self.flag_mut(kind);
        let changed = *flag;
        *flag = false;
        changed
    }

    pub fn is_stalled(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.video_stalled,
            MediaKind::Audio => self.audio_stalled,
        }
    }

    /// User-visible buffering indicator
    ///
    /// `audio_active` is false when there is no audio pipeline or it failed;
    /// its stall flag is then irrelevant.
    pub fn is_buffering(&self, audio_active: bool) -> bool {
        self.video_stalled || (audio_active && self.audio_stalled)
    }

    fn flag_mut(&mut self, kind: MediaKind) -> &mut bool {
        match kind {
            MediaKind::Video => &mut self.video_stalled,
            MediaKind::Audio => &mut self.audio_stalled,
        }
    }
}

/// Counters describing how hard the engine worked to keep the streams aligned
///
/// All fields use atomic operations so a UI thread can read them while the
/// session runs.
#[derive(Debug)]
pub struct SyncStats {
    pub soft_corrections: AtomicU64,
    pub hard_corrections: AtomicU64,
    pub seeks_started: AtomicU64,
    pub seeks_completed: AtomicU64,
    pub video_stalls: AtomicU64,
    pub audio_stalls: AtomicU64,
    pub play_rejections: AtomicU64,
    /// Largest absolute drift observed, in microseconds
    pub max_drift_us: AtomicU64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self {
            soft_corrections: AtomicU64::new(0),
            hard_corrections: AtomicU64::new(0),
            seeks_started: AtomicU64::new(0),
            seeks_completed: AtomicU64::new(0),
            video_stalls: AtomicU64::new(0),
            audio_stalls: AtomicU64::new(0),
            play_rejections: AtomicU64::new(0),
            max_drift_us: AtomicU64::new(0),
        }
    }

    pub fn record_soft_correction(&self) {
        self.soft_corrections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hard_correction(&self) {
        self.hard_corrections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_seek_started(&self) {
        self.seeks_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_seek_completed(&self) {
        self.seeks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stall(&self, kind: MediaKind) {
        let counter = match kind {
            MediaKind::Video => &self.video_stalls,
            MediaKind::Audio => &self.audio_stalls,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_play_rejection(&self) {
        self.play_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an absolute drift sample in seconds
    pub fn record_drift(&self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        let micros = (seconds.abs() * 1_000_000.0) as u64;
        self.max_drift_us.fetch_max(micros, Ordering::Relaxed);
    }

    /// Get a summary of the counters
    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            soft_corrections: self.soft_corrections.load(Ordering::Relaxed),
            hard_corrections: self.hard_corrections.load(Ordering::Relaxed),
            seeks_started: self.seeks_started.load(Ordering::Relaxed),
            seeks_completed: self.seeks_completed.load(Ordering::Relaxed),
            video_stalls: self.video_stalls.load(Ordering::Relaxed),
            audio_stalls: self.audio_stalls.load(Ordering::Relaxed),
            play_rejections: self.play_rejections.load(Ordering::Relaxed),
            max_drift: self.max_drift_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

impl Default for SyncStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of sync metrics
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SyncSummary {
    pub soft_corrections: u64,
    pub hard_corrections: u64,
    pub seeks_started: u64,
    pub seeks_completed: u64,
    pub video_stalls: u64,
    pub audio_stalls: u64,
    pub play_rejections: u64,
    /// Seconds
    pub max_drift: f64,
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sync: {} soft / {} hard corrections, max drift {:.3}s, {}/{} seeks completed, stalls {} video / {} audio, {} play rejections",
            self.soft_corrections,
            self.hard_corrections,
            self.max_drift,
            self.seeks_completed,
            self.seeks_started,
            self.video_stalls,
            self.audio_stalls,
            self.play_rejections
        )
    }
}
