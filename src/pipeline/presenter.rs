//! Presentation loop
//!
//! Runs at display rate and writes the progress bar fills and the time
//! label to `watch` channels. It never changes session state beyond
//! mirroring the video positions, and receivers only wake when a value
//! actually changed.

use tokio::sync::watch;

use super::media::MediaPipeline;
use super::session::PlaybackSession;
use crate::utils::format_progress;

/// Fill changes smaller than this are not published
const FILL_EPSILON: f64 = 1e-4;

/// Receiving side of the presentation targets
#[derive(Debug, Clone)]
pub struct PresentationView {
    /// Played fraction, `0.0..=1.0`
    pub progress: watch::Receiver<f64>,
    /// Buffered fraction, `0.0..=1.0`
    pub buffered: watch::Receiver<f64>,
    /// `"current / total"`
    pub time_text: watch::Receiver<String>,
}

#[derive(Debug)]
pub struct PresentationLoop {
    progress: watch::Sender<f64>,
    buffered: watch::Sender<f64>,
    time_text: watch::Sender<String>,
    ticks: u64,
}

impl PresentationLoop {
    pub fn new() -> (Self, PresentationView) {
        let (progress, progress_rx) = watch::channel(0.0);
        let (buffered, buffered_rx) = watch::channel(0.0);
        let (time_text, time_text_rx) = watch::channel(format_progress(0.0, 0.0));

        (
            Self {
                progress,
                buffered,
                time_text,
                ticks: 0,
            },
            PresentationView {
                progress: progress_rx,
                buffered: buffered_rx,
                time_text: time_text_rx,
            },
        )
    }

    /// Number of ticks that had a session attached
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Refresh the presentation targets from the session
    ///
    /// Does nothing without a session. Returns `true` if any target changed.
    pub fn tick<V, A>(&mut self, session: Option<&mut PlaybackSession<V, A>>) -> bool
    where
        V: MediaPipeline,
        A: MediaPipeline,
    {
        let Some(session) = session else {
            return false;
        };
        self.ticks += 1;

        let timeline = session.sample_timeline();
        let shown = session.displayed_time();

        let mut changed = publish_fill(&self.progress, timeline.fraction_of(shown));
        changed |= publish_fill(&self.buffered, timeline.fraction_of(timeline.buffered));

        let text = format_progress(shown, timeline.duration);
        changed |= self.time_text.send_if_modified(|current| {
            if *current == text {
                return false;
            }
            *current = text;
            true
        });

        changed
    }
}

fn publish_fill(target: &watch::Sender<f64>, value: f64) -> bool {
    target.send_if_modified(|current| {
        if (*current - value).abs() < FILL_EPSILON {
            return false;
        }
        *current = value;
        true
    })
}
