//! Dual-seek coordination
//!
//! A seek writes the target to every live pipeline and then waits for each of
//! them to acknowledge. Only when all acknowledgements are in does playback
//! resume. A new seek replaces the pending one.

use super::types::MediaKind;

/// Outcome of a seek once every pipeline acknowledged it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekCompletion {
    pub target: f64,
    /// Playback was running when the seek was requested
    pub resume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SeekBarrier {
    target: f64,
    resume: bool,
    video_pending: bool,
    audio_pending: bool,
}

impl SeekBarrier {
    fn is_released(&self) -> bool {
        !self.video_pending && !self.audio_pending
    }

    fn completion(&self) -> SeekCompletion {
        SeekCompletion {
            target: self.target,
            resume: self.resume,
        }
    }
}

/// Completion barrier for an in-flight seek
#[derive(Debug, Default)]
pub struct SeekCoordinator {
    pending: Option<SeekBarrier>,
    generation: u64,
}

impl SeekCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the barrier for a new seek, superseding any pending one
    ///
    /// When `await_audio` is false the audio side counts as already done.
    /// Returns the generation number of the new seek.
    pub fn begin(&mut self, target: f64, resume: bool, await_audio: bool) -> u64 {
        self.generation += 1;
        self.pending = Some(SeekBarrier {
            target,
            resume,
            video_pending: true,
            audio_pending: await_audio,
        });
        self.generation
    }

    pub fn is_seeking(&self) -> bool {
        self.pending.is_some()
    }

    pub fn target(&self) -> Option<f64> {
        self.pending.map(|barrier| barrier.target)
    }

    /// Number of seeks started so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Change whether playback resumes once the pending seek lands
    pub fn set_resume(&mut self, resume: bool) {
        if let Some(barrier) = self.pending.as_mut() {
            barrier.resume = resume;
        }
    }

    /// Record a completion signal from one pipeline
    ///
    /// Returns the completion when this signal released the barrier. Signals
    /// outside of a seek are ignored.
    pub fn complete(&mut self, kind: MediaKind) -> Option<SeekCompletion> {
        let barrier = self.pending.as_mut()?;
        match kind {
            MediaKind::Video => barrier.video_pending = false,
            MediaKind::Audio => barrier.audio_pending = false,
        }
        self.release_if_done()
    }

    /// Stop waiting on the audio pipeline, e.g. because it failed mid-seek
    pub fn release_audio(&mut self) -> Option<SeekCompletion> {
        let barrier = self.pending.as_mut()?;
        barrier.audio_pending = false;
        self.release_if_done()
    }

    fn release_if_done(&mut self) -> Option<SeekCompletion> {
        match self.pending {
            Some(barrier) if barrier.is_released() => {
                self.pending = None;
                Some(barrier.completion())
            }
            _ => None,
        }
    }
}
