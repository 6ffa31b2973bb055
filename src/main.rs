use anyhow::Result;
use clap::{Arg, ArgAction, Command, value_parser};
use duoplay::config::{EngineConfig, app_name, version};
use duoplay::input::{HotkeyMap, Key};
use duoplay::pipeline::{
    MediaKind, PipelineError, PlaybackSession, SessionCoordinator, SessionHandle,
};
use duoplay::sim::{SimControl, SimSettings, SimulatedPipeline};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::LocalSet;
use url::Url;

/// Virtual time advanced per driver step
const DRIVER_STEP: Duration = Duration::from_millis(20);

/// What the simulated environment does while the session runs
struct Scenario {
    run_for: Duration,
    fail_audio_at: Option<f64>,
    keys: Vec<Key>,
    hotkeys: HotkeyMap,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("video")
                .long("video")
                .value_name("URL")
                .help("Video-only stream to play.")
                .required(true)
                .value_parser(Url::parse),
        )
        .arg(
            Arg::new("audio")
                .long("audio")
                .value_name("URL")
                .help("Separate audio-only stream kept in sync with the video.")
                .value_parser(Url::parse),
        )
        .arg(
            Arg::new("no-autoplay")
                .long("no-autoplay")
                .help("Wait for an explicit play instead of starting once ready.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON engine configuration.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("duration")
                .long("duration")
                .value_name("SECS")
                .help("Length of the simulated media.")
                .default_value("120")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("audio-skew")
                .long("audio-skew")
                .value_name("FACTOR")
                .help("Clock error of the simulated audio pipeline, e.g. 0.99.")
                .default_value("1.0")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("fail-audio-at")
                .long("fail-audio-at")
                .value_name("SECS")
                .help("Make the audio pipeline fail at this media position.")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("run-for")
                .long("run-for")
                .value_name("SECS")
                .help("Wall-clock time to run before closing the session.")
                .default_value("10")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("keys")
                .long("keys")
                .value_name("KEYS")
                .help("Comma separated key presses, one per second (e.g. right,m,k).")
                .value_delimiter(',')
                .value_parser(|s: &str| s.parse::<Key>()),
        )
        .get_matches();

    let mut config =
        EngineConfig::load_or_default(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if matches.get_flag("no-autoplay") {
        config.auto_play = false;
    }

    let video_url = matches
        .get_one::<Url>("video")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No video stream given"))?;
    let audio_url = matches.get_one::<Url>("audio").cloned();
    let duration = matches.get_one::<f64>("duration").copied().unwrap_or(120.0);
    let skew = matches.get_one::<f64>("audio-skew").copied().unwrap_or(1.0);
    let run_for = matches.get_one::<f64>("run-for").copied().unwrap_or(10.0);

    let scenario = Scenario {
        run_for: Duration::try_from_secs_f64(run_for)?,
        fail_audio_at: matches.get_one::<f64>("fail-audio-at").copied(),
        keys: matches
            .get_many::<Key>("keys")
            .map(|keys| keys.copied().collect())
            .unwrap_or_default(),
        hotkeys: HotkeyMap::new(config.seek_step_secs),
    };

    let video_settings = SimSettings {
        duration,
        ready_after: Duration::from_millis(60),
        seek_latency: Duration::from_millis(40),
        ..Default::default()
    };
    let (video, video_ctl, video_rx) =
        SimulatedPipeline::new(MediaKind::Video, video_settings.clone());

    let (audio, audio_ctl, audio_rx) = match audio_url {
        Some(url) => {
            let settings = SimSettings {
                ready_after: Duration::from_millis(200),
                seek_latency: Duration::from_millis(80),
                skew,
                ..video_settings
            };
            let (pipeline, control, rx) = SimulatedPipeline::new(MediaKind::Audio, settings);
            (Some((url, pipeline)), Some(control), Some(rx))
        }
        None => (None, None, None),
    };

    let session = PlaybackSession::new(video_url, video, audio, config.session_options());
    let (coordinator, handle) = SessionCoordinator::new(session, video_rx, audio_rx, config.timing());

    let local = LocalSet::new();
    let summary = local
        .run_until(async move {
            let engine = tokio::task::spawn_local(coordinator.run());
            drive(&handle, &video_ctl, audio_ctl.as_ref(), scenario).await;
            engine.await?
        })
        .await?;

    info!("{}", summary);
    Ok(())
}

/// Advance the simulated pipelines in real time and play the scenario
async fn drive(
    handle: &SessionHandle,
    video: &SimControl,
    audio: Option<&SimControl>,
    scenario: Scenario,
) {
    let mut clock = tokio::time::interval(DRIVER_STEP);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    let mut elapsed = Duration::ZERO;
    let mut keys = scenario.keys.into_iter();
    let mut next_key_at = Duration::from_secs(1);
    let mut audio_failed = false;
    let mut last_report = Duration::ZERO;

    while elapsed < scenario.run_for {
        tokio::select! {
            _ = clock.tick() => {}
            _ = &mut interrupted => {
                info!("Driver: interrupted");
                break;
            }
        }

        video.advance(DRIVER_STEP);
        if let Some(audio) = audio {
            audio.advance(DRIVER_STEP);
        }
        elapsed += DRIVER_STEP;

        if let (Some(at), Some(audio)) = (scenario.fail_audio_at, audio)
            && !audio_failed
            && video.position() >= at
        {
            warn!("Driver: failing audio pipeline at {:.2}s", video.position());
            audio.fail(PipelineError::Network("simulated connection reset".to_string()));
            audio_failed = true;
        }

        if elapsed >= next_key_at {
            next_key_at += Duration::from_secs(1);
            if let Some(key) = keys.next()
                && let Some(command) = scenario.hotkeys.command(key)
            {
                info!("Driver: key {:?} -> {:?}", key, command);
                if handle.send(command).is_err() {
                    break;
                }
            }
        }

        if elapsed - last_report >= Duration::from_secs(1) {
            last_report = elapsed;
            let status = handle.status();
            info!(
                "Driver: {} | {} | rate {} | video {:.3}s audio {}",
                status.state,
                handle.view().time_text.borrow().as_str(),
                status.rate,
                video.position(),
                audio
                    .map(|a| format!("{:.3}s @ {:.3}x", a.position(), a.rate()))
                    .unwrap_or_else(|| "none".to_string())
            );
            if status.state.is_failed() {
                break;
            }
        }
    }

    // The engine may already have stopped on its own
    let _ = handle.close();
}
