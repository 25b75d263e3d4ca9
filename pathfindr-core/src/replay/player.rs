use std::time::Duration;

use serde::Serialize;

use super::Timeline;

pub const MIN_PLAYBACK_SPEED: f64 = 0.1;
pub const MAX_PLAYBACK_SPEED: f64 = 4.0;
const SPEED_STEP: f64 = 1.5;
const DEFAULT_SKIP_MS: f64 = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Transport controls over a [`Timeline`] playhead.
///
/// The player keeps its own time in milliseconds and pushes it into the
/// timeline as a normalized seek, which puts the timeline in replay mode.
#[derive(Debug, Clone)]
pub struct TimelinePlayer {
    state: PlayerState,
    current_time: f64,
    speed: f64,
    looping: bool,
    skip_ms: f64,
}

impl Default for TimelinePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelinePlayer {
    pub fn new() -> Self {
        Self {
            state: PlayerState::Stopped,
            current_time: 0.0,
            speed: 1.0,
            looping: false,
            skip_ms: DEFAULT_SKIP_MS,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn set_skip_interval(&mut self, skip_ms: f64) {
        self.skip_ms = skip_ms.max(0.0);
    }

    /// Starts playing from the current time. Does nothing on an empty timeline.
    pub fn play(&mut self, timeline: &mut Timeline) {
        if timeline.total_duration() <= 0.0 {
            return;
        }
        if self.current_time >= timeline.total_duration() {
            self.seek_to_time(timeline, 0.0);
        }
        self.state = PlayerState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state == PlayerState::Playing {
            self.state = PlayerState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.state = PlayerState::Stopped;
    }

    pub fn toggle(&mut self, timeline: &mut Timeline) {
        match self.state {
            PlayerState::Playing => self.pause(),
            PlayerState::Paused | PlayerState::Stopped => self.play(timeline),
        }
    }

    /// Advances playback by `elapsed` of host time. Returns the new playback
    /// time in milliseconds.
    pub fn advance(&mut self, timeline: &mut Timeline, elapsed: Duration) -> f64 {
        if self.state != PlayerState::Playing {
            return self.current_time;
        }
        let total = timeline.total_duration();
        let next = self.current_time + elapsed.as_secs_f64() * 1_000.0 * self.speed;
        if next >= total {
            if self.looping {
                self.seek_to_time(timeline, 0.0);
            } else {
                self.seek_to_time(timeline, total);
                self.stop();
            }
        } else {
            self.seek_to_time(timeline, next);
        }
        self.current_time
    }

    pub fn seek_to_time(&mut self, timeline: &mut Timeline, time_ms: f64) {
        let total = timeline.total_duration();
        self.current_time = time_ms.clamp(0.0, total.max(0.0));
        timeline.seek_to_time(self.current_time);
    }

    pub fn seek_normalized(&mut self, timeline: &mut Timeline, position: f64) {
        let position = position.clamp(0.0, 1.0);
        self.seek_to_time(timeline, position * timeline.total_duration());
    }

    pub fn seek_to_start(&mut self, timeline: &mut Timeline) {
        self.seek_to_time(timeline, 0.0);
    }

    pub fn seek_to_end(&mut self, timeline: &mut Timeline) {
        let total = timeline.total_duration();
        self.seek_to_time(timeline, total);
    }

    pub fn skip_forward(&mut self, timeline: &mut Timeline) {
        self.seek_to_time(timeline, self.current_time + self.skip_ms);
    }

    pub fn skip_backward(&mut self, timeline: &mut Timeline) {
        self.seek_to_time(timeline, self.current_time - self.skip_ms);
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED);
    }

    pub fn increase_speed(&mut self) {
        self.set_speed(self.speed * SPEED_STEP);
    }

    pub fn decrease_speed(&mut self) {
        self.set_speed(self.speed / SPEED_STEP);
    }

    pub fn reset_speed(&mut self) {
        self.set_speed(1.0);
    }

    /// Playback progress in `[0, 1]`
    pub fn progress(&self, timeline: &Timeline) -> f64 {
        let total = timeline.total_duration();
        if total > 0.0 { self.current_time / total } else { 0.0 }
    }
}
