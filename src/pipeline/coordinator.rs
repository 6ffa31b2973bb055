//! Single-threaded event loop around a playback session
//!
//! The coordinator multiplexes UI commands, both pipelines' native events and
//! the presentation tick onto one task. The future returned by
//! [`SessionCoordinator::run`] is not `Send`; drive it on a current-thread
//! runtime or inside a `tokio::task::LocalSet`.

use anyhow::Result;
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use super::clock::drift;
use super::health::SyncSummary;
use super::media::{MediaPipeline, PipelineError, PipelineEvents};
use super::presenter::{PresentationLoop, PresentationView};
use super::session::{PlaybackSession, SessionError, SessionStatus};
use super::types::{MediaKind, PipelineEvent, PlaybackRate, Volume};

/// User intents forwarded from the player chrome
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TogglePlay,
    ToggleMute,
    SetVolume(Volume),
    SetRate(PlaybackRate),
    CycleRate,
    SeekTo(f64),
    /// Relative seek in seconds
    SeekBy(f64),
    SeekToFraction(f64),
    BeginDrag(f64),
    UpdateDrag(f64),
    EndDrag,
    CancelDrag,
    ToggleFullscreen,
    Close,
}

/// Loop periods
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopTiming {
    /// Presentation refresh period
    pub tick_interval: Duration,
    /// Period of the stats log line
    pub stats_interval: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            stats_interval: Duration::from_secs(30),
        }
    }
}

/// Clonable handle used by the chrome to drive a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    view: PresentationView,
}

impl SessionHandle {
    pub fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }

    pub fn toggle_play(&self) -> Result<(), SessionError> {
        self.send(Command::TogglePlay)
    }

    pub fn toggle_mute(&self) -> Result<(), SessionError> {
        self.send(Command::ToggleMute)
    }

    pub fn set_volume(&self, volume: impl Into<Volume>) -> Result<(), SessionError> {
        self.send(Command::SetVolume(volume.into()))
    }

    pub fn set_rate(&self, rate: PlaybackRate) -> Result<(), SessionError> {
        self.send(Command::SetRate(rate))
    }

    pub fn cycle_rate(&self) -> Result<(), SessionError> {
        self.send(Command::CycleRate)
    }

    pub fn seek_to(&self, target: f64) -> Result<(), SessionError> {
        self.send(Command::SeekTo(target))
    }

    pub fn seek_by(&self, delta: f64) -> Result<(), SessionError> {
        self.send(Command::SeekBy(delta))
    }

    pub fn seek_to_fraction(&self, fraction: f64) -> Result<(), SessionError> {
        self.send(Command::SeekToFraction(fraction))
    }

    pub fn begin_drag(&self, fraction: f64) -> Result<(), SessionError> {
        self.send(Command::BeginDrag(fraction))
    }

    pub fn update_drag(&self, fraction: f64) -> Result<(), SessionError> {
        self.send(Command::UpdateDrag(fraction))
    }

    pub fn end_drag(&self) -> Result<(), SessionError> {
        self.send(Command::EndDrag)
    }

    pub fn cancel_drag(&self) -> Result<(), SessionError> {
        self.send(Command::CancelDrag)
    }

    pub fn toggle_fullscreen(&self) -> Result<(), SessionError> {
        self.send(Command::ToggleFullscreen)
    }

    pub fn close(&self) -> Result<(), SessionError> {
        self.send(Command::Close)
    }

    /// Latest published status
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Status receiver for change notifications
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Presentation targets written by the tick
    pub fn view(&self) -> &PresentationView {
        &self.view
    }
}

pub struct SessionCoordinator<V, A = V> {
    session: PlaybackSession<V, A>,
    commands: mpsc::UnboundedReceiver<Command>,
    video_events: PipelineEvents,
    audio_events: Option<PipelineEvents>,
    status: watch::Sender<SessionStatus>,
    presenter: PresentationLoop,
    timing: LoopTiming,
}

impl<V, A> SessionCoordinator<V, A>
where
    V: MediaPipeline,
    A: MediaPipeline,
{
    /// Wrap a session and the event streams of its pipelines
    pub fn new(
        session: PlaybackSession<V, A>,
        video_events: PipelineEvents,
        audio_events: Option<PipelineEvents>,
        timing: LoopTiming,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(session.status());
        let (presenter, view) = PresentationLoop::new();

        let handle = SessionHandle {
            commands: commands_tx,
            status: status_rx,
            view,
        };

        (
            Self {
                session,
                commands,
                video_events,
                audio_events,
                status,
                presenter,
                timing,
            },
            handle,
        )
    }

    /// Run until closed or until the video pipeline fails
    pub async fn run(self) -> Result<SyncSummary> {
        let Self {
            mut session,
            mut commands,
            mut video_events,
            mut audio_events,
            status,
            mut presenter,
            timing,
        } = self;

        info!(
            "SessionCoordinator: started (tick: {:?}, audio: {})",
            timing.tick_interval,
            if audio_events.is_some() { "separate" } else { "none" }
        );

        let mut tick = tokio::time::interval(timing.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_stats_log = Instant::now();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(Command::Close) => {
                            info!("SessionCoordinator: close requested");
                            break;
                        }
                        Some(command) => apply(&mut session, command).await,
                        None => {
                            info!("SessionCoordinator: all handles dropped");
                            break;
                        }
                    }
                }
                event = video_events.recv() => {
                    let event = event.unwrap_or(PipelineEvent::Error(PipelineError::Closed));
                    if let Err(err) = session.handle_event(MediaKind::Video, event).await {
                        publish_status(&status, &session);
                        let summary = session.close();
                        warn!("SessionCoordinator: stopped after failure ({})", summary);
                        return Err(err.into());
                    }
                }
                event = recv_optional(&mut audio_events) => {
                    match event {
                        Some(event) => session.handle_event(MediaKind::Audio, event).await?,
                        None => {
                            debug!("SessionCoordinator: audio event stream closed");
                            audio_events = None;
                            session.handle_audio_error(PipelineError::Closed).await;
                        }
                    }
                }
                _ = tick.tick() => {
                    presenter.tick(Some(&mut session));
                }
            }

            publish_status(&status, &session);

            if last_stats_log.elapsed() >= timing.stats_interval {
                let timeline = session.timeline();
                info!(
                    "SessionCoordinator: {} at {:.1}s/{:.1}s, drift: {}, {}",
                    session.state(),
                    timeline.current_time,
                    timeline.duration,
                    current_drift(&session)
                        .map(|d| format!("{:.3}s", d))
                        .unwrap_or_else(|| "n/a".to_string()),
                    session.stats().summary()
                );
                last_stats_log = Instant::now();
            }
        }

        let summary = session.close();
        info!("SessionCoordinator: finished ({} presentation ticks)", presenter.ticks());
        Ok(summary)
    }
}

async fn apply<V, A>(session: &mut PlaybackSession<V, A>, command: Command)
where
    V: MediaPipeline,
    A: MediaPipeline,
{
    debug!("SessionCoordinator: {:?}", command);
    match command {
        Command::TogglePlay => session.toggle_play().await,
        Command::ToggleMute => {
            session.toggle_mute();
        }
        Command::SetVolume(volume) => session.set_volume(volume),
        Command::SetRate(rate) => session.set_rate(rate),
        Command::CycleRate => {
            session.cycle_rate();
        }
        Command::SeekTo(target) => session.seek_to(target),
        Command::SeekBy(delta) => session.seek_by(delta),
        Command::SeekToFraction(fraction) => session.seek_to_fraction(fraction),
        Command::BeginDrag(fraction) => session.begin_drag(fraction),
        Command::UpdateDrag(fraction) => session.update_drag(fraction),
        Command::EndDrag => {
            session.end_drag();
        }
        Command::CancelDrag => session.cancel_drag(),
        Command::ToggleFullscreen => {
            session.toggle_fullscreen();
        }
        // Handled by the loop
        Command::Close => {}
    }
}

async fn recv_optional(events: &mut Option<PipelineEvents>) -> Option<PipelineEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

fn publish_status<V, A>(status: &watch::Sender<SessionStatus>, session: &PlaybackSession<V, A>)
where
    V: MediaPipeline,
    A: MediaPipeline,
{
    let next = session.status();
    status.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}

fn current_drift<V, A>(session: &PlaybackSession<V, A>) -> Option<f64>
where
    V: MediaPipeline,
    A: MediaPipeline,
{
    if !session.audio_active() {
        return None;
    }
    let audio = session.audio()?;
    Some(drift(session.video().current_time(), audio.current_time()))
}
