//! Active cue tracking against a polled player.
//!
//! [`PlaybackTracker`] is the per-frame decision step with no I/O.
//! [`SubtitleTracker`] owns the frame loop that feeds it and restarts that
//! loop whenever play state or repeat mode changes.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::player::{Player, PlayerState};
use crate::subtitles::{Cue, CueList};

/// What one frame of tracking decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new cue became active
    Activated(Cue),
    /// Repeat mode: the player should seek back to this position
    Looped { seek_to_ms: u64 },
    /// Nothing changed
    Unchanged,
}

/// Active cue bookkeeping for one player
#[derive(Debug, Clone, Default)]
pub struct PlaybackTracker {
    active: Option<Cue>,
    repeat: bool,
}

impl PlaybackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&Cue> {
        self.active.as_ref()
    }

    pub fn set_active(&mut self, cue: Option<Cue>) {
        self.active = cue;
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    /// Decide what to do at `position_ms`.
    ///
    /// When the position falls in a gap or past the last cue, the previous
    /// active cue is kept. An active cue that no longer exists in `cues` is
    /// dropped first.
    pub fn tick(&mut self, position_ms: f64, cues: &CueList) -> TickOutcome {
        // Pick up edits made to the active cue since the last frame
        if let Some(active) = &self.active {
            match cues.find(&active.id) {
                Some(latest) if latest != active => self.active = Some(latest.clone()),
                Some(_) => {}
                None => {
                    debug!(cue_id = %active.id, "Active cue was deleted");
                    self.active = None;
                }
            }
        }

        let past_active = match &self.active {
            Some(active) => position_ms >= active.end_time as f64,
            None => true,
        };

        if self.repeat && past_active {
            if let Some(active) = &self.active {
                return TickOutcome::Looped {
                    seek_to_ms: active.start_time,
                };
            }
        }

        if !past_active {
            return TickOutcome::Unchanged;
        }

        match cues.cue_at(position_ms) {
            Some(cue) if self.active.as_ref().map(|a| &a.id) != Some(&cue.id) => {
                self.active = Some(cue.clone());
                TickOutcome::Activated(cue.clone())
            }
            _ => TickOutcome::Unchanged,
        }
    }
}

/// A cancellable per-frame polling task
#[derive(Debug)]
pub struct TrackingTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TrackingTask {
    /// Run `step` once per frame until it breaks or the task is cancelled.
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(frame_interval: Duration, mut step: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancellation = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(frame_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = cancellation.cancelled() => break,
                    _ = interval.tick() => {
                        if step().is_break() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Stop the task; calling this more than once is harmless
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
            && self
                .handle
                .as_ref()
                .map(|handle| !handle.is_finished())
                .unwrap_or(false)
    }

    /// Wait for the task to exit on its own or after [`TrackingTask::cancel`]
    pub async fn finished(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            let _ = handle.await;
            self.handle = None;
        }
    }
}

impl Drop for TrackingTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Keeps the active cue in sync with a playing video and reports changes.
///
/// Cues are read through a `watch` channel so edits made during playback are
/// seen on the next frame. Newly active cues are sent to `listener`.
pub struct SubtitleTracker {
    player: Arc<dyn Player>,
    cues: watch::Receiver<CueList>,
    state: Arc<Mutex<PlaybackTracker>>,
    listener: mpsc::UnboundedSender<Cue>,
    frame_interval: Duration,
    task: Option<TrackingTask>,
}

impl SubtitleTracker {
    pub fn new(
        player: Arc<dyn Player>,
        cues: watch::Receiver<CueList>,
        listener: mpsc::UnboundedSender<Cue>,
        frame_interval: Duration,
    ) -> Self {
        Self {
            player,
            cues,
            state: Arc::new(Mutex::new(PlaybackTracker::new())),
            listener,
            frame_interval,
            task: None,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PlaybackTracker> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn active_cue(&self) -> Option<Cue> {
        self.lock_state().active().cloned()
    }

    pub fn repeat(&self) -> bool {
        self.lock_state().repeat()
    }

    /// Toggle cue looping. The frame loop restarts if the video is playing.
    pub fn set_repeat(&mut self, repeat: bool) {
        self.lock_state().set_repeat(repeat);
        info!("🔁 Repeat mode {}", if repeat { "on" } else { "off" });
        self.on_state_change(self.player.state());
    }

    /// Make `cue` active and jump the player to its start
    pub fn select(&mut self, cue: &Cue) {
        self.lock_state().set_active(Some(cue.clone()));
        self.player.seek_to(cue.start_time as f64 / 1000.0);
        // Listener failure only means nobody is watching
        let _ = self.listener.send(cue.clone());
    }

    pub fn play(&mut self) {
        self.player.play();
        self.on_state_change(self.player.state());
    }

    pub fn pause(&mut self) {
        self.player.pause();
        self.on_state_change(self.player.state());
    }

    /// React to a player state report: track while playing, stop otherwise
    pub fn on_state_change(&mut self, state: PlayerState) {
        self.stop();
        if state.is_playing() {
            self.start();
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.task.as_ref().map(TrackingTask::is_running).unwrap_or(false)
    }

    /// Stop tracking; idempotent
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
            debug!("Stopped subtitle tracking");
        }
    }

    /// Wait until the frame loop exits, e.g. because playback ended
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.as_mut() {
            task.finished().await;
        }
    }

    fn start(&mut self) {
        let player = Arc::clone(&self.player);
        let cues = self.cues.clone();
        let state = Arc::clone(&self.state);
        let listener = self.listener.clone();

        debug!("Starting subtitle tracking every {:?}", self.frame_interval);
        self.task = Some(TrackingTask::spawn(self.frame_interval, move || {
            let Some(seconds) = player.current_time() else {
                debug!("Player unavailable, tracking stopped");
                return ControlFlow::Break(());
            };
            if !player.state().is_playing() {
                return ControlFlow::Break(());
            }

            let outcome = {
                let cues = cues.borrow();
                let mut tracker = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                tracker.tick(seconds * 1000.0, &cues)
            };

            match outcome {
                TickOutcome::Activated(cue) => {
                    debug!(cue_id = %cue.id, index = cue.index, "Active cue changed");
                    if listener.send(cue).is_err() {
                        return ControlFlow::Break(());
                    }
                }
                TickOutcome::Looped { seek_to_ms } => {
                    player.seek_to(seek_to_ms as f64 / 1000.0);
                }
                TickOutcome::Unchanged => {}
            }
            ControlFlow::Continue(())
        }));
    }
}

impl Drop for SubtitleTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::player::SimulatedPlayer;

    fn cues() -> CueList {
        CueList::from_cues(vec![
            Cue::new(0, 0, 1000, "a"),
            Cue::new(1, 2000, 3000, "b"),
        ])
    }

    #[test]
    fn test_tick_selects_containing_cue() {
        let cues = cues();
        let mut tracker = PlaybackTracker::new();

        assert_eq!(tracker.tick(500.0, &cues), TickOutcome::Activated(cues[0].clone()));
        assert_eq!(tracker.tick(900.0, &cues), TickOutcome::Unchanged);
        assert_eq!(tracker.tick(2000.0, &cues), TickOutcome::Activated(cues[1].clone()));
    }

    #[test]
    fn test_gap_retains_previous_cue() {
        let cues = cues();
        let mut tracker = PlaybackTracker::new();
        tracker.tick(500.0, &cues);

        assert_eq!(tracker.tick(1500.0, &cues), TickOutcome::Unchanged);
        assert_eq!(tracker.active().unwrap().text, "a");

        // Past the last cue
        assert_eq!(tracker.tick(3500.0, &cues), TickOutcome::Unchanged);
        assert_eq!(tracker.active().unwrap().text, "a");
    }

    #[test]
    fn test_repeat_seeks_back() {
        let cues = cues();
        let mut tracker = PlaybackTracker::new();
        tracker.set_repeat(true);
        tracker.tick(10.0, &cues);

        assert_eq!(tracker.tick(1000.0, &cues), TickOutcome::Looped { seek_to_ms: 0 });
        assert_eq!(tracker.active().unwrap().text, "a");
    }

    #[test]
    fn test_repeat_without_active_cue_selects() {
        let cues = cues();
        let mut tracker = PlaybackTracker::new();
        tracker.set_repeat(true);
        assert_eq!(tracker.tick(2500.0, &cues), TickOutcome::Activated(cues[1].clone()));
    }

    #[test]
    fn test_edits_to_active_cue_are_seen() {
        let mut cues = cues();
        let mut tracker = PlaybackTracker::new();
        tracker.tick(500.0, &cues);

        let id = cues[0].id.clone();
        cues.update_cue(&id, crate::subtitles::CuePatch::end(1800));
        assert_eq!(tracker.tick(1500.0, &cues), TickOutcome::Unchanged);
        assert_eq!(tracker.active().unwrap().end_time, 1800);
    }

    #[test]
    fn test_deleted_active_cue_is_dropped() {
        let mut cues = cues();
        let mut tracker = PlaybackTracker::new();
        tracker.set_repeat(true);
        tracker.tick(500.0, &cues);

        let id = cues[0].id.clone();
        cues.delete_line(&id);
        assert_eq!(tracker.tick(1200.0, &cues), TickOutcome::Unchanged);
        assert!(tracker.active().is_none());

        // No stale window to loop over; the next cue is picked up instead
        assert_eq!(tracker.tick(2500.0, &cues), TickOutcome::Activated(cues[0].clone()));
    }

    /// Player whose state is set directly, for states the simulated clock never reaches
    struct ScriptedPlayer {
        state: Mutex<PlayerState>,
    }

    impl ScriptedPlayer {
        fn set_state(&self, state: PlayerState) {
            *self.state.lock().unwrap() = state;
        }
    }

    impl Player for ScriptedPlayer {
        fn current_time(&self) -> Option<f64> {
            Some(0.5)
        }
        fn state(&self) -> PlayerState {
            *self.state.lock().unwrap()
        }
        fn seek_to(&self, _seconds: f64) {}
        fn play(&self) {
            self.set_state(PlayerState::Playing);
        }
        fn pause(&self) {
            self.set_state(PlayerState::Paused);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffering_or_cued_stops_tracking() {
        for stalled in [PlayerState::Buffering, PlayerState::Cued] {
            let player = Arc::new(ScriptedPlayer {
                state: Mutex::new(PlayerState::Unstarted),
            });
            let (_cues_tx, cues_rx) = watch::channel(cues());
            let (tx, mut rx) = mpsc::unbounded_channel();
            let mut tracker = SubtitleTracker::new(player.clone(), cues_rx, tx, Duration::from_millis(16));

            tracker.play();
            assert_eq!(rx.recv().await.unwrap().text, "a");

            player.set_state(stalled);
            tracker.finished().await;
            assert!(!tracker.is_tracking(), "still tracking while {:?}", stalled);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracking_task_cancel_is_idempotent() {
        let mut task = TrackingTask::spawn(Duration::from_millis(16), || ControlFlow::Continue(()));
        assert!(task.is_running());
        task.cancel();
        task.cancel();
        task.finished().await;
        assert!(!task.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_follows_playback() {
        let player = Arc::new(SimulatedPlayer::new(4.0));
        let (_cues_tx, cues_rx) = watch::channel(cues());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = SubtitleTracker::new(player.clone(), cues_rx, tx, Duration::from_millis(16));

        tracker.play();
        assert!(tracker.is_tracking());

        assert_eq!(rx.recv().await.unwrap().text, "a");
        assert_eq!(rx.recv().await.unwrap().text, "b");
        assert!(player.current_time().unwrap() >= 2.0);

        // Playback ends at 4s and the loop exits on its own
        tracker.finished().await;
        assert_eq!(player.state(), PlayerState::Ended);
        assert_eq!(tracker.active_cue().unwrap().text, "b");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_loops_in_repeat_mode() {
        let player = Arc::new(SimulatedPlayer::new(10.0));
        let (_cues_tx, cues_rx) = watch::channel(CueList::from_cues(vec![Cue::new(0, 1000, 2000, "loop")]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = SubtitleTracker::new(player.clone(), cues_rx, tx, Duration::from_millis(16));

        tracker.set_repeat(true);
        tracker.play();
        assert_eq!(rx.recv().await.unwrap().text, "loop");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let position_ms = player.current_time().unwrap() * 1000.0;
        assert!((1000.0..2000.0).contains(&position_ms), "position {}", position_ms);
        assert!(rx.try_recv().is_err());

        tracker.pause();
        assert!(!tracker.is_tracking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroyed_player_stops_tracking() {
        let player = Arc::new(SimulatedPlayer::new(10.0));
        let (_cues_tx, cues_rx) = watch::channel(cues());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut tracker = SubtitleTracker::new(player.clone(), cues_rx, tx, Duration::from_millis(16));

        tracker.play();
        player.destroy();
        tracker.finished().await;
        assert!(!tracker.is_tracking());
    }
}
