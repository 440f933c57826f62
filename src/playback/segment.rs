use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::player::{Player, PlayerState};
use super::tracker::TrackingTask;

/// Plays one time window of a video and pauses at its end.
///
/// Only one segment plays at a time; starting another cancels the first.
pub struct SegmentPlayer {
    player: Arc<dyn Player>,
    frame_interval: Duration,
    current: Option<TrackingTask>,
}

impl SegmentPlayer {
    pub fn new(player: Arc<dyn Player>, frame_interval: Duration) -> Self {
        Self {
            player,
            frame_interval,
            current: None,
        }
    }

    /// Seek to `start_ms`, play, and pause once the position reaches `end_ms`
    pub fn play_segment(&mut self, start_ms: u64, end_ms: u64) {
        self.cancel();

        debug!("▶️ Playing segment {}ms..{}ms", start_ms, end_ms);
        self.player.seek_to(start_ms as f64 / 1000.0);
        self.player.play();

        let player = Arc::clone(&self.player);
        let end_seconds = end_ms as f64 / 1000.0;
        self.current = Some(TrackingTask::spawn(self.frame_interval, move || {
            let Some(position) = player.current_time() else {
                return ControlFlow::Break(());
            };
            match player.state() {
                PlayerState::Paused | PlayerState::Ended => ControlFlow::Break(()),
                _ if position >= end_seconds => {
                    player.pause();
                    ControlFlow::Break(())
                }
                _ => ControlFlow::Continue(()),
            }
        }));
    }

    pub fn is_playing(&self) -> bool {
        self.current.as_ref().map(TrackingTask::is_running).unwrap_or(false)
    }

    /// Stop watching the current segment; playback itself is left alone
    pub fn cancel(&mut self) {
        if let Some(task) = self.current.take() {
            task.cancel();
        }
    }

    /// Wait until the current segment has finished
    pub async fn finished(&mut self) {
        if let Some(task) = self.current.as_mut() {
            task.finished().await;
        }
    }
}

impl Drop for SegmentPlayer {
    fn drop(&mut self) {
        self.cancel();
    }
}
