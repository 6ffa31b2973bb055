//! Session state management

/// Playback session state machine
///
/// Represents the intended transport state of a session. Transitions are
/// validated so that a failed session can never be revived and the very first
/// playback only happens once the pipelines have signalled readiness or the
/// user explicitly asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Pipelines are loading
    #[default]
    Idle,

    /// Every required pipeline reported readiness, nothing played yet
    ReadyToPlay,

    /// Playback is intended to run
    Playing,

    /// Playback was paused by the user or a rejected play request
    Paused,

    /// The video stream reached its end
    Ended,

    /// The video pipeline failed, the session is unusable
    Failed,
}

impl SessionState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;

        match (self, target) {
            // Nothing leaves Failed
            (Failed, _) => false,

            // Any live state can fail
            (_, Failed) => true,

            // Self-transitions
            (a, b) if a == b => true,

            // From Idle
            (Idle, ReadyToPlay) => true,
            (Idle, Playing) => true, // explicit user gesture before readiness
            (Idle, Paused) => true,  // rejected early play request

            // From ReadyToPlay
            (ReadyToPlay, Playing) => true,
            (ReadyToPlay, Paused) => true,

            // From Playing
            (Playing, Paused) => true,
            (Playing, Ended) => true,

            // From Paused
            (Paused, Playing) => true,
            (Paused, Ended) => true,

            // From Ended
            (Ended, Playing) => true, // replay
            (Ended, Paused) => true,  // seek back without playing

            // All other transitions invalid
            _ => false,
        }
    }

    /// Get a human-readable description of this state
    pub fn description(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::ReadyToPlay => "ReadyToPlay",
            SessionState::Playing => "Playing",
            SessionState::Paused => "Paused",
            SessionState::Ended => "Ended",
            SessionState::Failed => "Failed",
        }
    }

    /// Check if playback is intended to run
    pub fn is_playing(&self) -> bool {
        matches!(self, SessionState::Playing)
    }

    /// Check if the session has failed
    pub fn is_failed(&self) -> bool {
        matches!(self, SessionState::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One-way flag
///
/// Starts cleared and can only ever be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Latch(bool);

impl Latch {
    pub const fn new() -> Self {
        Latch(false)
    }

    /// Set the latch. Returns `true` only for the call that flipped it.
    pub fn set(&mut self) -> bool {
        let newly = !self.0;
        self.0 = true;
        newly
    }

    pub fn is_set(&self) -> bool {
        self.0
    }
}
