//! Playback session controller
//!
//! [`PlaybackSession`] owns both pipelines and is the only place that issues
//! transport commands to them. Everything else (drift sampling, stall fusion,
//! seek bookkeeping) is delegated to passive helpers whose decisions are
//! applied here.
//!
//! Sound routing: while a healthy audio pipeline exists it carries the sound
//! and the video pipeline stays muted. Without one, or once it failed, the
//! video pipeline carries the sound with the session's volume and mute state.

use log::{debug, error, info, warn};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use super::clock::{ClockSynchronizer, DriftCorrection, SyncConfig, drift};
use super::health::{BufferingMonitor, SyncStats, SyncSummary};
use super::media::{MediaPipeline, PipelineError};
use super::seek::{SeekCompletion, SeekCoordinator};
use super::state::{Latch, SessionState};
use super::types::{MediaKind, PipelineEvent, PlaybackRate, Timeline, Volume};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// The video pipeline failed; there is no fallback for it
    #[error("video pipeline failed: {0}")]
    Video(#[source] PipelineError),
    #[error("unsupported playback rate {0}")]
    UnsupportedRate(f64),
    #[error("session closed")]
    Closed,
}

/// Initial settings of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Start playing as soon as every pipeline is ready
    pub auto_play: bool,
    pub sync: SyncConfig,
    pub volume: Volume,
    pub muted: bool,
    pub rate: PlaybackRate,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_play: true,
            sync: SyncConfig::default(),
            volume: Volume::default(),
            muted: false,
            rate: PlaybackRate::default(),
        }
    }
}

/// Snapshot for the player chrome (badges, buttons)
///
/// `seeking` and `dragging` are never both set: while a drag gesture is in
/// progress its preview owns the progress bar and an older seek still in
/// flight is reported only through `dragging`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionStatus {
    pub state: SessionState,
    pub playing: bool,
    pub buffering: bool,
    pub seeking: bool,
    pub dragging: bool,
    /// The audio pipeline failed and the video pipeline carries the sound
    pub audio_degraded: bool,
    pub muted: bool,
    pub volume: Volume,
    pub rate: PlaybackRate,
    pub fullscreen: bool,
}

/// A video pipeline and an optional audio pipeline played as one presentation
pub struct PlaybackSession<V, A = V> {
    video_source: Url,
    audio_source: Option<Url>,
    video: V,
    audio: Option<A>,

    state: SessionState,
    auto_play: bool,
    autoplay_attempted: Latch,
    video_ready: Latch,
    audio_ready: Latch,
    audio_failed: Latch,

    muted: bool,
    volume: Volume,
    rate: PlaybackRate,
    fullscreen: bool,

    /// Preview position while the user drags the progress bar
    drag_preview: Option<f64>,
    /// Positions mirrored from the video pipeline for display
    timeline: Timeline,

    clock: ClockSynchronizer,
    seek: SeekCoordinator,
    buffering: BufferingMonitor,
    stats: Arc<SyncStats>,
}

impl<V, A> PlaybackSession<V, A>
where
    V: MediaPipeline,
    A: MediaPipeline,
{
    /// Open a session over a video pipeline and an optional audio pipeline
    pub fn new(
        video_source: Url,
        video: V,
        audio: Option<(Url, A)>,
        options: SessionOptions,
    ) -> Self {
        let (audio_source, audio) = match audio {
            Some((source, pipeline)) => (Some(source), Some(pipeline)),
            None => (None, None),
        };
        let stats = Arc::new(SyncStats::new());

        let mut session = Self {
            video_source,
            audio_source,
            video,
            audio,
            state: SessionState::Idle,
            auto_play: options.auto_play,
            autoplay_attempted: Latch::new(),
            video_ready: Latch::new(),
            audio_ready: Latch::new(),
            audio_failed: Latch::new(),
            muted: options.muted,
            volume: options.volume,
            rate: options.rate,
            fullscreen: false,
            drag_preview: None,
            timeline: Timeline::default(),
            clock: ClockSynchronizer::new(options.sync, Arc::clone(&stats)),
            seek: SeekCoordinator::new(),
            buffering: BufferingMonitor::new(),
            stats,
        };

        session.route_sound();
        session.apply_rate();

        match &session.audio_source {
            Some(audio) => info!(
                "PlaybackSession: opened video {} with separate audio {}",
                session.video_source, audio
            ),
            None => info!(
                "PlaybackSession: opened video {} (single pipeline)",
                session.video_source
            ),
        }

        session
    }

    pub fn video_source(&self) -> &Url {
        &self.video_source
    }

    pub fn audio_source(&self) -> Option<&Url> {
        self.audio_source.as_ref()
    }

    /// Read-only access to the video pipeline
    pub fn video(&self) -> &V {
        &self.video
    }

    /// Read-only access to the audio pipeline, if any
    pub fn audio(&self) -> Option<&A> {
        self.audio.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Intended transport state, independent of in-flight seeks
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn is_seeking(&self) -> bool {
        self.seek.is_seeking()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_preview.is_some()
    }

    pub fn audio_failed(&self) -> bool {
        self.audio_failed.is_set()
    }

    pub fn video_ready(&self) -> bool {
        self.video_ready.is_set()
    }

    pub fn audio_ready(&self) -> bool {
        self.audio_ready.is_set()
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    pub fn rate(&self) -> PlaybackRate {
        self.rate
    }

    pub fn fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn stats(&self) -> Arc<SyncStats> {
        Arc::clone(&self.stats)
    }

    /// Last positions mirrored from the video pipeline
    pub fn timeline(&self) -> Timeline {
        self.timeline
    }

    /// Check whether the audio pipeline exists and still works
    pub fn audio_active(&self) -> bool {
        self.audio.is_some() && !self.audio_failed.is_set()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            playing: self.state.is_playing(),
            buffering: self.buffering.is_buffering(self.audio_active()),
            seeking: self.seek.is_seeking() && self.drag_preview.is_none(),
            dragging: self.drag_preview.is_some(),
            audio_degraded: self.audio_failed.is_set(),
            muted: self.muted,
            volume: self.volume,
            rate: self.rate,
            fullscreen: self.fullscreen,
        }
    }

    /// Feed one native event of a pipeline into the session
    ///
    /// Only a video pipeline failure is returned as an error; it leaves the
    /// session in [`SessionState::Failed`].
    pub async fn handle_event(
        &mut self,
        kind: MediaKind,
        event: PipelineEvent,
    ) -> Result<(), SessionError> {
        if self.state.is_failed() {
            return Ok(());
        }
        if kind == MediaKind::Audio && (self.audio.is_none() || self.audio_failed.is_set()) {
            return Ok(());
        }

        match (kind, event) {
            (_, PipelineEvent::Ready) => self.on_ready(kind).await,
            (MediaKind::Video, PipelineEvent::TimeUpdate) => self.sync_clocks(),
            (MediaKind::Audio, PipelineEvent::TimeUpdate) => {}
            (_, PipelineEvent::Stalled) => {
                if self.buffering.on_stalled(kind) {
                    self.stats.record_stall(kind);
                    debug!("PlaybackSession: {} pipeline stalled", kind);
                }
            }
            (_, PipelineEvent::Resumed) => {
                if self.buffering.on_resumed(kind) {
                    debug!("PlaybackSession: {} pipeline resumed", kind);
                }
            }
            (_, PipelineEvent::Seeked) => {
                if let Some(done) = self.seek.complete(kind) {
                    self.finish_seek(done).await;
                }
            }
            (MediaKind::Video, PipelineEvent::Ended) => self.on_video_ended(),
            // Video is authoritative for end of stream
            (MediaKind::Audio, PipelineEvent::Ended) => {}
            (MediaKind::Video, PipelineEvent::Error(err)) => return Err(self.fail(err)),
            (MediaKind::Audio, PipelineEvent::Error(err)) => self.handle_audio_error(err).await,
        }

        Ok(())
    }

    /// Toggle between playing and paused
    ///
    /// From [`SessionState::Ended`] this restarts from the beginning.
    pub async fn toggle_play(&mut self) {
        match self.state {
            SessionState::Failed => {}
            SessionState::Playing => self.pause(),
            SessionState::Ended => {
                self.transition(SessionState::Playing);
                self.seek_to(0.0);
            }
            _ if self.seek.is_seeking() => {
                // The seek barrier owns the pipelines until it releases
                self.seek.set_resume(true);
                self.transition(SessionState::Playing);
            }
            _ => {
                self.play_both().await;
            }
        }
    }

    pub fn pause(&mut self) {
        if !self.state.is_playing() {
            return;
        }
        if self.seek.is_seeking() {
            self.seek.set_resume(false);
        } else {
            self.pause_pipelines();
        }
        self.transition(SessionState::Paused);
    }

    /// Move both pipelines to `target` seconds
    ///
    /// Pauses both pipelines, writes the target to each live one and waits for
    /// all of them to acknowledge before resuming. A call while a seek is in
    /// flight restarts the protocol with the new target.
    pub fn seek_to(&mut self, target: f64) {
        if self.state.is_failed() {
            return;
        }

        let target = self.clamp_time(target);
        let resume = self.state.is_playing();
        let await_audio = self.audio_active();

        self.stats.record_seek_started();
        self.pause_pipelines();
        self.video.seek(target);
        if await_audio && let Some(audio) = self.audio.as_mut() {
            audio.seek(target);
        }
        let generation = self.seek.begin(target, resume, await_audio);

        if self.state == SessionState::Ended {
            self.transition(SessionState::Paused);
        }
        self.timeline.current_time = target;

        debug!(
            "PlaybackSession: seek #{} to {:.3}s (resume: {}, awaiting audio: {})",
            generation, target, resume, await_audio
        );
    }

    /// Seek relative to the current (or pending) position
    pub fn seek_by(&mut self, delta: f64) {
        let base = self
            .seek
            .target()
            .unwrap_or_else(|| self.video.current_time());
        self.seek_to(base + delta);
    }

    /// Seek to a fraction of the duration
    pub fn seek_to_fraction(&mut self, fraction: f64) {
        let duration = self.video.duration();
        if !(duration.is_finite() && duration > 0.0) {
            debug!("PlaybackSession: duration unknown, ignoring fractional seek");
            return;
        }
        self.seek_to(clamp_fraction(fraction) * duration);
    }

    /// Start a progress-bar drag gesture at `fraction` of the duration
    pub fn begin_drag(&mut self, fraction: f64) {
        self.drag_preview = Some(self.fraction_to_time(fraction));
    }

    pub fn update_drag(&mut self, fraction: f64) {
        if self.drag_preview.is_some() {
            self.drag_preview = Some(self.fraction_to_time(fraction));
        }
    }

    /// Finish the drag gesture, seeking once to the previewed position
    pub fn end_drag(&mut self) -> Option<f64> {
        let target = self.drag_preview.take()?;
        self.seek_to(target);
        Some(target)
    }

    /// Abandon the drag gesture without seeking
    pub fn cancel_drag(&mut self) {
        self.drag_preview = None;
    }

    pub fn set_volume(&mut self, volume: impl Into<Volume>) {
        self.volume = volume.into();
        self.route_sound();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.route_sound();
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.set_muted(!self.muted);
        self.muted
    }

    pub fn set_rate(&mut self, rate: PlaybackRate) {
        self.rate = rate;
        self.apply_rate();
        debug!("PlaybackSession: playback rate {}", rate);
    }

    /// Set the playback rate from a raw multiplier
    pub fn set_rate_value(&mut self, value: f64) -> Result<(), SessionError> {
        let rate = PlaybackRate::from_f64(value).ok_or(SessionError::UnsupportedRate(value))?;
        self.set_rate(rate);
        Ok(())
    }

    /// Switch to the next faster rate, wrapping around
    pub fn cycle_rate(&mut self) -> PlaybackRate {
        let next = self.rate.next();
        self.set_rate(next);
        next
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        self.fullscreen = !self.fullscreen;
        self.fullscreen
    }

    /// Enter the permanent video-only fallback after an audio failure
    ///
    /// The video pipeline takes over the sound with the current volume and
    /// mute settings. The audio pipeline is never retried.
    pub async fn handle_audio_error(&mut self, err: PipelineError) {
        if !self.enter_audio_fallback(&err) {
            return;
        }
        if let Some(done) = self.seek.release_audio() {
            self.finish_seek(done).await;
        }
        self.maybe_autoplay().await;
    }

    /// Read the video pipeline positions into the session
    ///
    /// Positions are frozen while dragging or seeking so the display does not
    /// jump back to stale pipeline times.
    pub fn sample_timeline(&mut self) -> Timeline {
        if self.drag_preview.is_none() && !self.seek.is_seeking() {
            self.timeline = Timeline {
                current_time: self.video.current_time(),
                duration: self.video.duration(),
                buffered: self.video.buffered_end(),
            };
        }
        self.timeline
    }

    /// Position to display: the drag preview while dragging
    pub fn displayed_time(&self) -> f64 {
        self.drag_preview.unwrap_or(self.timeline.current_time)
    }

    /// Stop both pipelines and release them
    pub fn close(mut self) -> SyncSummary {
        self.pause_pipelines();
        let summary = self.stats.summary();
        info!("PlaybackSession: closed {} ({})", self.video_source, summary);
        summary
    }

    async fn on_ready(&mut self, kind: MediaKind) {
        let newly = match kind {
            MediaKind::Video => self.video_ready.set(),
            MediaKind::Audio => self.audio_ready.set(),
        };
        if newly {
            debug!("PlaybackSession: {} pipeline ready", kind);
        }
        self.maybe_autoplay().await;
    }

    fn readiness_met(&self) -> bool {
        self.video_ready.is_set() && (!self.audio_active() || self.audio_ready.is_set())
    }

    /// Attempt the initial autoplay once every required pipeline is ready
    async fn maybe_autoplay(&mut self) {
        if !self.readiness_met() {
            return;
        }
        if self.state == SessionState::Idle {
            self.transition(SessionState::ReadyToPlay);
        }
        if !self.auto_play || !self.autoplay_attempted.set() {
            return;
        }
        if self.state != SessionState::ReadyToPlay {
            debug!("PlaybackSession: skipping autoplay in state {}", self.state);
            return;
        }
        if self.seek.is_seeking() {
            // The seek barrier owns the pipelines until it releases
            info!("PlaybackSession: all pipelines ready, playback starts once the seek lands");
            self.seek.set_resume(true);
            self.transition(SessionState::Playing);
            return;
        }
        info!("PlaybackSession: all pipelines ready, starting playback");
        self.play_both().await;
    }

    /// Ask both pipelines to play; `true` if both accepted
    async fn play_both(&mut self) -> bool {
        self.snap_audio_if_needed();

        let audio_active = self.audio_active();
        let video = &mut self.video;
        let audio = if audio_active { self.audio.as_mut() } else { None };
        let (video_result, audio_result) = tokio::join!(video.play(), async move {
            match audio {
                Some(audio) => audio.play().await,
                None => Ok(()),
            }
        });

        match (video_result, audio_result) {
            (Ok(()), Ok(())) => {
                self.transition(SessionState::Playing);
                true
            }
            (Ok(()), Err(err)) if err != PipelineError::PlayRejected => {
                // Audio broke while starting: carry on with video alone
                self.enter_audio_fallback(&err);
                self.transition(SessionState::Playing);
                true
            }
            (video_result, audio_result) => {
                let reason = video_result
                    .err()
                    .or(audio_result.err())
                    .unwrap_or(PipelineError::PlayRejected);
                self.stats.record_play_rejection();
                info!("PlaybackSession: play request refused ({}), staying paused", reason);
                self.pause_pipelines();
                if self.state.is_playing() {
                    self.transition(SessionState::Paused);
                }
                false
            }
        }
    }

    /// Move audio onto the video position when drift is beyond soft correction
    fn snap_audio_if_needed(&mut self) {
        if !self.audio_active() {
            return;
        }
        let Some(audio) = self.audio.as_mut() else {
            return;
        };
        let video_time = self.video.current_time();
        let drift = drift(video_time, audio.current_time());
        if self.clock.needs_snap(drift) {
            info!(
                "PlaybackSession: drift {:.3}s before play, moving audio to {:.3}s",
                drift, video_time
            );
            self.stats.record_hard_correction();
            audio.seek(video_time);
            audio.set_playback_rate(self.rate.as_f64());
        }
    }

    /// Apply one drift sample; runs on every video time update
    fn sync_clocks(&mut self) {
        if !self.state.is_playing() || self.seek.is_seeking() || self.drag_preview.is_some() {
            return;
        }
        if !self.audio_active() {
            return;
        }
        let Some(audio) = self.audio.as_mut() else {
            return;
        };

        let video_time = self.video.current_time();
        let correction = self.clock.evaluate(
            video_time,
            audio.current_time(),
            audio.playback_rate(),
            self.rate.as_f64(),
        );

        match correction {
            DriftCorrection::None => {}
            DriftCorrection::ResetRate { rate } => {
                debug!("PlaybackSession: back in sync, audio rate {}", rate);
                audio.set_playback_rate(rate);
            }
            DriftCorrection::Nudge { rate } => {
                debug!(
                    "PlaybackSession: drift {:.3}s, audio rate {}",
                    drift(video_time, audio.current_time()),
                    rate
                );
                audio.set_playback_rate(rate);
            }
            DriftCorrection::Snap { position, rate } => {
                info!(
                    "PlaybackSession: drift {:.3}s, moving audio to {:.3}s",
                    drift(video_time, audio.current_time()),
                    position
                );
                audio.seek(position);
                audio.set_playback_rate(rate);
            }
        }
    }

    async fn finish_seek(&mut self, done: SeekCompletion) {
        self.stats.record_seek_completed();
        debug!(
            "PlaybackSession: seek to {:.3}s completed (resume: {})",
            done.target, done.resume
        );
        if done.resume {
            self.play_both().await;
        }
    }

    fn on_video_ended(&mut self) {
        self.pause_pipelines();
        self.seek.set_resume(false);
        self.transition(SessionState::Ended);
        info!("PlaybackSession: video reached the end");
    }

    fn fail(&mut self, err: PipelineError) -> SessionError {
        error!("PlaybackSession: video pipeline failed: {}", err);
        self.pause_pipelines();
        self.transition(SessionState::Failed);
        SessionError::Video(err)
    }

    /// Latch the audio failure and hand the sound over to video.
    /// Returns `false` if the fallback was already active or there is no audio.
    fn enter_audio_fallback(&mut self, err: &PipelineError) -> bool {
        if self.audio.is_none() || !self.audio_failed.set() {
            return false;
        }
        warn!(
            "PlaybackSession: audio pipeline failed ({}), continuing with video only",
            err
        );
        if let Some(audio) = self.audio.as_mut() {
            audio.pause();
            audio.set_muted(true);
        }
        self.route_sound();
        true
    }

    /// Enforce the sound routing invariant with the current volume and mute
    fn route_sound(&mut self) {
        let (volume, muted) = (self.volume, self.muted);
        let audio_active = self.audio_active();
        match self.audio.as_mut().filter(|_| audio_active) {
            Some(audio) => {
                audio.set_volume(volume);
                audio.set_muted(muted);
                self.video.set_muted(true);
            }
            None => {
                self.video.set_volume(volume);
                self.video.set_muted(muted);
            }
        }
    }

    /// Apply the base rate to video and, when live, to audio
    fn apply_rate(&mut self) {
        let base = self.rate.as_f64();
        self.video.set_playback_rate(base);
        if self.audio_active() && let Some(audio) = self.audio.as_mut() {
            audio.set_playback_rate(base);
        }
    }

    fn pause_pipelines(&mut self) {
        self.video.pause();
        if let Some(audio) = self.audio.as_mut() {
            audio.pause();
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(&next) {
            warn!(
                "PlaybackSession: ignoring invalid transition {} -> {}",
                self.state, next
            );
            return;
        }
        debug!("PlaybackSession: {} -> {}", self.state, next);
        self.state = next;
    }

    fn clamp_time(&self, target: f64) -> f64 {
        if target.is_nan() {
            return 0.0;
        }
        let duration = self.video.duration();
        if duration.is_finite() && duration > 0.0 {
            target.clamp(0.0, duration)
        } else {
            target.max(0.0)
        }
    }

    fn fraction_to_time(&self, fraction: f64) -> f64 {
        let duration = self.video.duration();
        if duration.is_finite() && duration > 0.0 {
            clamp_fraction(fraction) * duration
        } else {
            0.0
        }
    }
}

fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineEvents;
    use crate::sim::{SimControl, SimSettings, SimulatedPipeline};
    use std::time::Duration;

    const STEP: Duration = Duration::from_millis(100);

    struct Harness {
        session: PlaybackSession<SimulatedPipeline>,
        video: SimControl,
        video_rx: PipelineEvents,
        audio: Option<SimControl>,
        audio_rx: Option<PipelineEvents>,
    }

    impl Harness {
        fn new(video: SimSettings, audio: Option<SimSettings>, options: SessionOptions) -> Self {
            let (video_pipeline, video, video_rx) = SimulatedPipeline::new(MediaKind::Video, video);
            let (audio_pipeline, audio, audio_rx) = match audio {
                Some(settings) => {
                    let (pipeline, control, rx) = SimulatedPipeline::new(MediaKind::Audio, settings);
                    (Some(pipeline), Some(control), Some(rx))
                }
                None => (None, None, None),
            };
            let video_url = Url::parse("https://media.example/clip/video.mp4").expect("valid url");
            let audio_url = Url::parse("https://media.example/clip/audio.m4a").expect("valid url");

            let session = PlaybackSession::new(
                video_url,
                video_pipeline,
                audio_pipeline.map(|pipeline| (audio_url, pipeline)),
                options,
            );

            Self {
                session,
                video,
                video_rx,
                audio,
                audio_rx,
            }
        }

        fn dual() -> Self {
            Self::new(SimSettings::default(), Some(SimSettings::default()), SessionOptions::default())
        }

        fn audio(&self) -> &SimControl {
            self.audio.as_ref().expect("audio pipeline")
        }

        /// Deliver queued events until both streams are quiet
        async fn pump(&mut self) -> Result<(), SessionError> {
            loop {
                let mut idle = true;
                while let Ok(event) = self.video_rx.try_recv() {
                    idle = false;
                    self.session.handle_event(MediaKind::Video, event).await?;
                }
                if let Some(rx) = self.audio_rx.as_mut() {
                    while let Ok(event) = rx.try_recv() {
                        idle = false;
                        self.session.handle_event(MediaKind::Audio, event).await?;
                    }
                }
                if idle {
                    return Ok(());
                }
            }
        }

        async fn step(&mut self, dt: Duration) -> Result<(), SessionError> {
            self.video.advance(dt);
            if let Some(audio) = &self.audio {
                audio.advance(dt);
            }
            self.pump().await
        }

        async fn run(&mut self, steps: usize) {
            for _ in 0..steps {
                self.step(STEP).await.expect("no video failure");
            }
        }

        fn drift(&self) -> f64 {
            self.video.position() - self.audio().position()
        }
    }

    #[tokio::test]
    async fn test_autoplay_waits_for_both_pipelines() {
        let audio = SimSettings {
            ready_after: Duration::from_millis(200),
            ..Default::default()
        };
        let mut h = Harness::new(SimSettings::default(), Some(audio), SessionOptions::default());

        h.run(1).await;
        assert!(h.session.video_ready());
        assert!(!h.session.audio_ready());
        assert_eq!(h.session.state(), SessionState::Idle);
        assert_eq!(h.video.play_calls(), 0);

        h.run(1).await;
        assert!(h.session.is_playing());
        assert_eq!(h.video.play_calls(), 1);
        assert_eq!(h.audio().play_calls(), 1);
        assert!(!h.video.is_paused());
        assert!(!h.audio().is_paused());
    }

    #[tokio::test]
    async fn test_video_only_session() {
        let mut h = Harness::new(SimSettings::default(), None, SessionOptions::default());
        h.session.set_volume(0.4);

        h.run(1).await;
        assert!(h.session.is_playing());
        assert!(!h.session.audio_active());
        // The video pipeline carries the sound
        assert!(!h.video.is_muted());
        assert_eq!(h.video.volume().get(), 0.4);
    }

    #[tokio::test]
    async fn test_no_autoplay_stays_ready() {
        let options = SessionOptions {
            auto_play: false,
            ..Default::default()
        };
        let mut h = Harness::new(SimSettings::default(), Some(SimSettings::default()), options);

        h.run(3).await;
        assert_eq!(h.session.state(), SessionState::ReadyToPlay);
        assert_eq!(h.video.play_calls(), 0);

        h.session.toggle_play().await;
        assert!(h.session.is_playing());
    }

    #[tokio::test]
    async fn test_sound_routed_through_audio() {
        let mut h = Harness::dual();
        h.run(1).await;

        h.session.set_volume(0.5);
        assert!(h.video.is_muted());
        assert!(!h.audio().is_muted());
        assert_eq!(h.audio().volume().get(), 0.5);

        assert!(h.session.toggle_mute());
        assert!(h.audio().is_muted());
        assert!(h.video.is_muted());
    }

    #[tokio::test]
    async fn test_soft_drift_nudges_then_resets() {
        let mut h = Harness::dual();
        h.run(5).await;
        assert!(h.session.is_playing());

        // Audio falls 81ms behind
        let lagging = h.audio().position() - 0.081;
        h.audio().jump_to(lagging);

        h.run(1).await;
        assert_eq!(h.audio().rate(), 1.02);
        assert_eq!(h.video.rate(), 1.0);

        h.run(30).await;
        assert_eq!(h.audio().rate(), 1.0);
        assert!(h.drift().abs() < 0.05);
        assert_eq!(h.audio().rate_history(), vec![1.0, 1.02, 1.0]);
        assert_eq!(h.session.stats().summary().soft_corrections, 1);
        assert_eq!(h.session.stats().summary().hard_corrections, 0);
    }

    #[tokio::test]
    async fn test_hard_drift_snaps_audio() {
        let mut h = Harness::dual();
        h.run(50).await;

        h.audio().jump_to(1.0);
        h.run(1).await;

        assert!(h.drift().abs() < 1e-9);
        assert!(h.session.is_playing());
        assert!(!h.session.is_seeking());
        assert_eq!(h.session.stats().summary().hard_corrections, 1);
    }

    #[tokio::test]
    async fn test_seek_waits_for_both_then_resumes() {
        let video = SimSettings {
            seek_latency: Duration::from_millis(100),
            ..Default::default()
        };
        let audio = SimSettings {
            seek_latency: Duration::from_millis(250),
            ..Default::default()
        };
        let mut h = Harness::new(video, Some(audio), SessionOptions::default());
        h.run(10).await;

        h.session.seek_to(60.0);
        assert!(h.session.is_seeking());
        assert!(h.session.is_playing());
        assert!(h.video.is_paused());
        assert!(h.audio().is_paused());
        assert_eq!(h.session.timeline().current_time, 60.0);

        // Video acknowledged, audio still pending
        h.run(1).await;
        assert!(h.session.is_seeking());
        assert!(h.video.is_paused());

        h.run(2).await;
        assert!(!h.session.is_seeking());
        assert!(!h.video.is_paused());
        assert!(!h.audio().is_paused());

        h.run(10).await;
        assert!(h.drift().abs() < 0.05);
        assert!(h.video.position() > 60.0);
        let summary = h.session.stats().summary();
        assert_eq!((summary.seeks_started, summary.seeks_completed), (1, 1));
    }

    #[tokio::test]
    async fn test_seek_while_paused_stays_paused() {
        let mut h = Harness::dual();
        h.run(5).await;
        h.session.pause();

        h.session.seek_to(30.0);
        h.pump().await.expect("no video failure");

        assert!(!h.session.is_seeking());
        assert_eq!(h.session.state(), SessionState::Paused);
        assert!(h.video.is_paused());
        assert_eq!(h.video.position(), 30.0);
        assert_eq!(h.audio().position(), 30.0);
    }

    #[tokio::test]
    async fn test_last_seek_wins() {
        let audio = SimSettings {
            seek_latency: Duration::from_millis(300),
            ..Default::default()
        };
        let mut h = Harness::new(SimSettings::default(), Some(audio), SessionOptions::default());
        h.run(3).await;

        h.session.seek_to(20.0);
        h.session.seek_to(90.0);
        h.run(5).await;

        assert!(!h.session.is_seeking());
        assert!(h.session.is_playing());
        assert!(h.video.position() >= 90.0);
        assert_eq!(h.video.seeks(), vec![20.0, 90.0]);
    }

    #[tokio::test]
    async fn test_toggle_play_during_seek_resumes_after() {
        let audio = SimSettings {
            seek_latency: Duration::from_millis(200),
            ..Default::default()
        };
        let options = SessionOptions {
            auto_play: false,
            ..Default::default()
        };
        let mut h = Harness::new(SimSettings::default(), Some(audio), options);
        h.run(2).await;

        h.session.seek_to(10.0);
        h.session.toggle_play().await;
        assert!(h.session.is_playing());
        assert!(h.video.is_paused());

        h.run(3).await;
        assert!(!h.session.is_seeking());
        assert!(!h.video.is_paused());
        assert!(!h.audio().is_paused());
    }

    #[tokio::test]
    async fn test_drag_issues_single_seek() {
        let mut h = Harness::dual();
        h.run(5).await;

        h.session.begin_drag(0.1);
        h.session.update_drag(0.3);
        h.session.update_drag(0.5);
        assert!(h.session.is_dragging());
        assert_eq!(h.session.displayed_time(), 60.0);

        // No drift correction while dragging
        let lagging = h.audio().position() - 0.5;
        h.audio().jump_to(lagging);
        h.run(3).await;
        assert_eq!(h.audio().rate_history(), vec![1.0]);
        assert!(h.video.seeks().is_empty());

        assert_eq!(h.session.end_drag(), Some(60.0));
        h.pump().await.expect("no video failure");
        assert_eq!(h.video.seeks(), vec![60.0]);
        assert_eq!(h.audio().seeks(), vec![60.0]);
        assert!(!h.session.is_dragging());
        assert!(h.session.is_playing());
        assert_eq!(h.session.end_drag(), None);
    }

    #[tokio::test]
    async fn test_cancelled_drag_does_not_seek() {
        let mut h = Harness::dual();
        h.run(2).await;

        h.session.begin_drag(0.75);
        h.session.cancel_drag();
        assert_eq!(h.session.end_drag(), None);
        assert!(h.video.seeks().is_empty());
    }

    #[tokio::test]
    async fn test_audio_failure_falls_back_to_video() {
        let mut h = Harness::dual();
        for _ in 0..30 {
            h.step(Duration::from_secs(1)).await.expect("no video failure");
        }

        h.audio()
            .fail(PipelineError::Network("connection reset".to_string()));
        h.pump().await.expect("audio failure is not fatal");

        assert!(h.session.audio_failed());
        assert!(h.session.status().audio_degraded);
        assert!(h.session.is_playing());
        assert!(!h.video.is_muted());
        assert!(h.audio().is_muted());

        let before = h.video.position();
        h.run(10).await;
        assert!(h.video.position() > before);
        assert!(h.session.audio_failed());

        // Volume now goes to video
        h.session.set_volume(0.3);
        assert_eq!(h.video.volume().get(), 0.3);
    }

    #[tokio::test]
    async fn test_audio_failure_before_ready_unblocks_autoplay() {
        let audio = SimSettings {
            ready_after: Duration::from_secs(5),
            ..Default::default()
        };
        let mut h = Harness::new(SimSettings::default(), Some(audio), SessionOptions::default());
        h.run(1).await;
        assert!(!h.session.is_playing());

        h.audio().fail(PipelineError::Unsupported("codec".to_string()));
        h.pump().await.expect("audio failure is not fatal");
        assert!(h.session.is_playing());
        assert!(!h.video.is_muted());
    }

    #[tokio::test]
    async fn test_audio_failure_mid_seek_releases_barrier() {
        let audio = SimSettings {
            seek_latency: Duration::from_secs(10),
            ..Default::default()
        };
        let mut h = Harness::new(SimSettings::default(), Some(audio), SessionOptions::default());
        h.run(2).await;

        h.session.seek_to(40.0);
        h.run(1).await;
        assert!(h.session.is_seeking());

        h.audio().fail(PipelineError::Decode("bad frame".to_string()));
        h.pump().await.expect("audio failure is not fatal");
        assert!(!h.session.is_seeking());
        assert!(h.session.is_playing());
        assert!(!h.video.is_paused());
    }

    #[tokio::test]
    async fn test_rejected_play_stays_paused() {
        let video = SimSettings {
            reject_play: true,
            ..Default::default()
        };
        let mut h = Harness::new(video, Some(SimSettings::default()), SessionOptions::default());
        h.run(2).await;

        assert!(!h.session.is_playing());
        assert_eq!(h.session.state(), SessionState::ReadyToPlay);
        assert!(h.audio().is_paused());
        assert_eq!(h.session.stats().summary().play_rejections, 1);
        // Autoplay is attempted only once
        h.run(2).await;
        assert_eq!(h.video.play_calls(), 1);

        h.video.set_reject_play(false);
        h.session.toggle_play().await;
        assert!(h.session.is_playing());
    }

    #[tokio::test]
    async fn test_end_then_replay() {
        let short = SimSettings {
            duration: 1.0,
            ..Default::default()
        };
        let mut h = Harness::new(short.clone(), Some(short), SessionOptions::default());
        h.run(15).await;

        assert_eq!(h.session.state(), SessionState::Ended);
        assert!(!h.session.is_playing());
        assert!(h.video.is_paused());
        assert!(h.audio().is_paused());

        h.session.toggle_play().await;
        h.pump().await.expect("no video failure");
        assert!(h.session.is_playing());
        assert_eq!(h.video.seeks(), vec![0.0]);

        h.run(2).await;
        assert!(h.video.position() > 0.0);
        assert_eq!(h.session.state(), SessionState::Playing);
    }

    #[tokio::test]
    async fn test_video_failure_is_fatal() {
        let mut h = Harness::dual();
        h.run(3).await;

        h.video.fail(PipelineError::Decode("corrupt stream".to_string()));
        let err = h.pump().await.expect_err("video failure surfaces");
        assert_eq!(
            err,
            SessionError::Video(PipelineError::Decode("corrupt stream".to_string()))
        );
        assert_eq!(h.session.state(), SessionState::Failed);
        assert!(h.audio().is_paused());

        h.session.toggle_play().await;
        h.session.seek_to(10.0);
        assert_eq!(h.session.state(), SessionState::Failed);
        assert!(h.video.seeks().is_empty());
    }

    #[tokio::test]
    async fn test_buffering_indicator() {
        let mut h = Harness::dual();
        h.run(2).await;

        h.audio().stall();
        h.pump().await.expect("no video failure");
        assert!(h.session.status().buffering);
        // A stall never pauses the other pipeline
        assert!(!h.video.is_paused());

        h.audio().resume();
        h.pump().await.expect("no video failure");
        assert!(!h.session.status().buffering);
        assert_eq!(h.session.stats().summary().audio_stalls, 1);
    }

    #[tokio::test]
    async fn test_rate_applies_to_both() {
        let mut h = Harness::dual();
        h.run(1).await;

        h.session.set_rate(PlaybackRate::ThreeHalves);
        assert_eq!(h.video.rate(), 1.5);
        assert_eq!(h.audio().rate(), 1.5);

        assert_eq!(h.session.cycle_rate(), PlaybackRate::Double);
        assert_eq!(
            h.session.set_rate_value(1.1),
            Err(SessionError::UnsupportedRate(1.1))
        );
        assert_eq!(h.session.rate(), PlaybackRate::Double);
    }

    #[tokio::test]
    async fn test_seek_by_and_fraction() {
        let options = SessionOptions {
            auto_play: false,
            ..Default::default()
        };
        let mut h = Harness::new(SimSettings::default(), Some(SimSettings::default()), options);

        // Duration unknown before ready
        h.session.seek_to_fraction(0.5);
        assert!(h.video.seeks().is_empty());

        h.run(1).await;
        h.session.seek_to_fraction(0.25);
        h.pump().await.expect("no video failure");
        h.session.seek_by(-40.0);
        h.pump().await.expect("no video failure");
        h.session.seek_by(5.0);
        h.pump().await.expect("no video failure");

        assert_eq!(h.video.seeks(), vec![30.0, 0.0, 5.0]);
    }

    #[tokio::test]
    async fn test_timeline_frozen_while_seeking() {
        let video = SimSettings {
            seek_latency: Duration::from_millis(500),
            ..Default::default()
        };
        let mut h = Harness::new(video, Some(SimSettings::default()), SessionOptions::default());
        h.run(5).await;
        let sampled = h.session.sample_timeline();
        assert_eq!(sampled.duration, 120.0);

        h.session.seek_to(100.0);
        h.video.jump_to(3.0);
        assert_eq!(h.session.sample_timeline().current_time, 100.0);
    }

    #[tokio::test]
    async fn test_readiness_during_seek_defers_autoplay() {
        let audio = SimSettings {
            ready_after: Duration::from_millis(450),
            seek_latency: Duration::from_secs(1),
            ..Default::default()
        };
        let mut h = Harness::new(SimSettings::default(), Some(audio), SessionOptions::default());
        h.run(1).await;
        assert_eq!(h.session.state(), SessionState::Idle);

        h.session.seek_to(30.0);
        h.run(4).await;
        assert!(h.session.audio_ready());

        // Audio became ready with its seek still pending: no play yet
        assert!(h.session.is_seeking());
        assert!(h.session.is_playing());
        assert_eq!(h.video.play_calls(), 0);
        assert_eq!(h.audio().play_calls(), 0);
        assert!(h.video.is_paused());
        assert!(h.audio().is_paused());

        h.run(8).await;
        assert!(!h.session.is_seeking());
        assert_eq!(h.video.play_calls(), 1);
        assert_eq!(h.audio().play_calls(), 1);
        assert!(!h.video.is_paused());
        assert!(!h.audio().is_paused());
        assert_eq!(h.video.seeks(), vec![30.0]);
        assert_eq!(h.audio().seeks(), vec![30.0]);
    }

    #[tokio::test]
    async fn test_audio_failure_survives_later_audio_events() {
        let mut h = Harness::dual();
        h.run(20).await;

        h.audio().fail(PipelineError::Network("connection reset".to_string()));
        h.pump().await.expect("audio failure is not fatal");
        assert!(h.session.audio_failed());

        let rate = h.audio().rate();
        let position = h.audio().position();
        let rate_writes = h.audio().rate_history().len();
        let play_calls = h.audio().play_calls();

        for event in [
            PipelineEvent::Ready,
            PipelineEvent::Resumed,
            PipelineEvent::Stalled,
            PipelineEvent::TimeUpdate,
            PipelineEvent::Seeked,
            PipelineEvent::Ended,
            PipelineEvent::Error(PipelineError::Decode("late error".to_string())),
        ] {
            h.session
                .handle_event(MediaKind::Audio, event)
                .await
                .expect("audio events are never fatal");
        }
        h.run(5).await;

        assert!(h.session.audio_failed());
        assert!(h.session.status().audio_degraded);
        assert!(!h.session.status().buffering);
        assert!(h.session.is_playing());
        assert!(!h.video.is_muted());

        assert_eq!(h.audio().rate(), rate);
        assert_eq!(h.audio().position(), position);
        assert_eq!(h.audio().rate_history().len(), rate_writes);
        assert_eq!(h.audio().play_calls(), play_calls);
        assert!(h.audio().is_paused());
        assert!(h.audio().is_muted());
    }

    #[tokio::test]
    async fn test_status_never_seeking_while_dragging() {
        let audio = SimSettings {
            seek_latency: Duration::from_secs(5),
            ..Default::default()
        };
        let mut h = Harness::new(SimSettings::default(), Some(audio), SessionOptions::default());
        h.run(2).await;

        h.session.seek_to(20.0);
        let status = h.session.status();
        assert!(status.seeking && !status.dragging);

        h.session.begin_drag(0.5);
        let status = h.session.status();
        assert!(status.dragging);
        assert!(!status.seeking);
        assert!(h.session.is_seeking());

        h.session.cancel_drag();
        let status = h.session.status();
        assert!(status.seeking && !status.dragging);
    }
}
