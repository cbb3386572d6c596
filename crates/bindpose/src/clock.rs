//! Fixed-rate playback clock
//!
//! Advances a frame number in discrete steps: elapsed time is accumulated and
//! once it exceeds one frame time (`1000 / fps` milliseconds) the frame moves
//! by one and the accumulator restarts from zero. There is no interpolation
//! and at most one step per tick.

use std::time::{Duration, Instant};

use crate::error::{BindPoseError, Result};
use crate::keyframes::Frame;
use crate::packer::{MeshOffsets, MeshSlot};

/// Whether the clock advances on tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Ticks are ignored
    Stopped,
    /// Ticks advance the frame
    #[default]
    Playing,
}

/// Direction frames advance in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackDirection {
    /// `start -> end`, wrapping to `start`
    #[default]
    Forward,
    /// `end -> start`, wrapping to `end`
    Reverse,
}

/// Playback range and rate
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// First frame (inclusive)
    pub start_frame: Frame,
    /// Last frame (inclusive)
    pub end_frame: Frame,
    /// Frames per second
    pub fps: f64,
    /// Direction of travel
    pub direction: PlaybackDirection,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            start_frame: 1,
            end_frame: 3,
            fps: 1.0,
            direction: PlaybackDirection::Forward,
        }
    }
}

impl PlaybackConfig {
    /// Check the range and rate
    pub fn validate(&self) -> Result<()> {
        if self.start_frame > self.end_frame {
            return Err(BindPoseError::InvalidFrameRange {
                start: self.start_frame,
                end: self.end_frame,
            });
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(BindPoseError::InvalidFrameRate(self.fps));
        }
        Ok(())
    }

    /// Duration of one frame in milliseconds
    pub fn frame_time_ms(&self) -> f64 {
        1000.0 / self.fps
    }
}

/// Frame counter driven by elapsed wall-clock time
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    config: PlaybackConfig,
    state: PlaybackState,
    current_frame: Frame,
    accumulated_ms: f64,
    last_tick: Option<Instant>,
}

impl PlaybackClock {
    /// Create a playing clock positioned at the first frame of its direction
    pub fn new(config: PlaybackConfig) -> Result<Self> {
        config.validate()?;
        let current_frame = match config.direction {
            PlaybackDirection::Forward => config.start_frame,
            PlaybackDirection::Reverse => config.end_frame,
        };
        Ok(Self {
            config,
            state: PlaybackState::Playing,
            current_frame,
            accumulated_ms: 0.0,
            last_tick: None,
        })
    }

    /// Current frame number
    pub fn current_frame(&self) -> Frame {
        self.current_frame
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether ticks advance the frame
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Playback configuration
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Duration of one frame in milliseconds
    pub fn frame_time_ms(&self) -> f64 {
        self.config.frame_time_ms()
    }

    /// Resume advancing
    pub fn play(&mut self) {
        self.state = PlaybackState::Playing;
    }

    /// Stop advancing; the current frame is kept
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    /// Switch between playing and stopped
    pub fn toggle(&mut self) {
        self.state = match self.state {
            PlaybackState::Playing => PlaybackState::Stopped,
            PlaybackState::Stopped => PlaybackState::Playing,
        };
    }

    /// Jump to a frame, clamped into the range, and restart the accumulator
    pub fn seek(&mut self, frame: Frame) {
        self.current_frame = frame.clamp(self.config.start_frame, self.config.end_frame);
        self.accumulated_ms = 0.0;
    }

    /// Account for `elapsed` time and return the current frame
    pub fn tick(&mut self, elapsed: Duration) -> Frame {
        if self.state == PlaybackState::Stopped {
            return self.current_frame;
        }

        self.accumulated_ms += elapsed.as_nanos() as f64 / 1_000_000.0;
        if self.accumulated_ms > self.frame_time_ms() {
            self.accumulated_ms = 0.0;
            self.step();
        }
        self.current_frame
    }

    /// Tick with the time elapsed since the previous `tick_at`
    ///
    /// The first call only records `now`.
    pub fn tick_at(&mut self, now: Instant) -> Frame {
        let elapsed = self
            .last_tick
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_tick = Some(now);
        self.tick(elapsed)
    }

    /// Offset record for `mesh` showing the current frame
    ///
    /// Falls back to the rest pose when the current frame was not packed.
    pub fn offsets_for(&self, mesh: &MeshSlot) -> MeshOffsets {
        let offsets = mesh.offsets();
        match mesh.animation().frame_position(self.current_frame) {
            Some(position) => offsets.with_frame(position),
            None => offsets.rest_pose(),
        }
    }

    fn step(&mut self) {
        let PlaybackConfig {
            start_frame,
            end_frame,
            direction,
            ..
        } = self.config;

        self.current_frame = match direction {
            PlaybackDirection::Forward if self.current_frame >= end_frame => start_frame,
            PlaybackDirection::Forward => self.current_frame + 1,
            PlaybackDirection::Reverse if self.current_frame <= start_frame => end_frame,
            PlaybackDirection::Reverse => self.current_frame - 1,
        };
        log::trace!("Playback advanced to frame {}", self.current_frame);
    }
}
