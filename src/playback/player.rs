use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

/// Playback state reported by a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerState {
    /// Map the embedded player's numeric state codes
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Unstarted),
            0 => Some(Self::Ended),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Buffering),
            5 => Some(Self::Cued),
            _ => None,
        }
    }

    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }
}

/// A video player the tracker can poll and drive.
///
/// `current_time` returns `None` once the player has been torn down.
pub trait Player: Send + Sync {
    fn current_time(&self) -> Option<f64>;
    fn state(&self) -> PlayerState;
    fn seek_to(&self, seconds: f64);
    fn play(&self);
    fn pause(&self);
}

#[derive(Debug)]
struct Clock {
    state: PlayerState,
    /// Position at `anchor`, in seconds
    position: f64,
    anchor: Instant,
    destroyed: bool,
}

/// Clock-driven player used for previews and tests.
///
/// Position advances with `tokio::time`, so paused test runtimes drive it
/// deterministically.
#[derive(Debug)]
pub struct SimulatedPlayer {
    duration: f64,
    clock: Mutex<Clock>,
}

impl SimulatedPlayer {
    pub fn new(duration_seconds: f64) -> Self {
        Self {
            duration: duration_seconds.max(0.0),
            clock: Mutex::new(Clock {
                state: PlayerState::Unstarted,
                position: 0.0,
                anchor: Instant::now(),
                destroyed: false,
            }),
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Tear the player down; later polls see no position
    pub fn destroy(&self) {
        let mut clock = self.lock();
        clock.destroyed = true;
        clock.state = PlayerState::Unstarted;
        debug!("Simulated player destroyed");
    }

    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fold elapsed time into the stored position
    fn advance(&self, clock: &mut Clock) {
        let now = Instant::now();
        if clock.state == PlayerState::Playing {
            clock.position += now.duration_since(clock.anchor).as_secs_f64();
            if clock.position >= self.duration {
                clock.position = self.duration;
                clock.state = PlayerState::Ended;
            }
        }
        clock.anchor = now;
    }
}

impl Player for SimulatedPlayer {
    fn current_time(&self) -> Option<f64> {
        let mut clock = self.lock();
        if clock.destroyed {
            return None;
        }
        self.advance(&mut clock);
        Some(clock.position)
    }

    fn state(&self) -> PlayerState {
        let mut clock = self.lock();
        self.advance(&mut clock);
        clock.state
    }

    fn seek_to(&self, seconds: f64) {
        let mut clock = self.lock();
        if clock.destroyed {
            return;
        }
        self.advance(&mut clock);
        clock.position = seconds.clamp(0.0, self.duration);
        if clock.state == PlayerState::Ended && clock.position < self.duration {
            clock.state = PlayerState::Paused;
        }
    }

    fn play(&self) {
        let mut clock = self.lock();
        if clock.destroyed {
            return;
        }
        self.advance(&mut clock);
        if clock.position >= self.duration {
            clock.position = 0.0;
        }
        clock.state = PlayerState::Playing;
    }

    fn pause(&self) {
        let mut clock = self.lock();
        if clock.destroyed {
            return;
        }
        self.advance(&mut clock);
        if clock.state == PlayerState::Playing {
            clock.state = PlayerState::Paused;
        }
    }
}
