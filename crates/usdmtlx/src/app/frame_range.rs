//! Frame range policies for USD export.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::model::FrameRange;
use crate::infra::host::SceneHost;

/// Largest frame magnitude accepted for manual entry.
pub const FRAME_LIMIT: f64 = 9999.0;

/// Where the exported frame range comes from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum FrameRangeMode {
    /// Only the host's current frame.
    CurrentFrame,
    /// Start/end frames from the render settings.
    RenderSettings,
    /// Playback range of the time slider.
    #[default]
    TimeSlider,
    /// User-entered start/end.
    Manual,
}

impl FrameRangeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameRangeMode::CurrentFrame => "current-frame",
            FrameRangeMode::RenderSettings => "render-settings",
            FrameRangeMode::TimeSlider => "time-slider",
            FrameRangeMode::Manual => "manual",
        }
    }
}

impl fmt::Display for FrameRangeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameRangeMode {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "current-frame" | "current" => Ok(FrameRangeMode::CurrentFrame),
            "render-settings" | "render" => Ok(FrameRangeMode::RenderSettings),
            "time-slider" | "playback" => Ok(FrameRangeMode::TimeSlider),
            "manual" | "start-end" => Ok(FrameRangeMode::Manual),
            other => Err(DomainError::UnknownFrameMode(other.to_string())),
        }
    }
}

/// Frame range state: the active mode, the user's manual values, and the values on display.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRangeSelector {
    mode: FrameRangeMode,
    manual: (f64, f64),
    displayed: (f64, f64),
}

impl FrameRangeSelector {
    /// Start in `mode`, seeding the manual values from the playback range.
    pub fn new(host: &dyn SceneHost, mode: FrameRangeMode) -> Self {
        let playback = host.playback_range();
        let mut selector = Self {
            mode,
            manual: playback,
            displayed: playback,
        };
        selector.refresh(host);
        selector
    }

    pub fn mode(&self) -> FrameRangeMode {
        self.mode
    }

    /// Switch mode and re-read the host.
    pub fn set_mode(&mut self, host: &dyn SceneHost, mode: FrameRangeMode) {
        self.mode = mode;
        self.refresh(host);
    }

    /// Only the manual mode accepts edits.
    pub fn is_editable(&self) -> bool {
        self.mode == FrameRangeMode::Manual
    }

    /// Re-read host state for the active mode. Called on mode changes and whenever the host
    /// reports a time, playback, or render-settings change.
    pub fn refresh(&mut self, host: &dyn SceneHost) {
        self.displayed = match self.mode {
            FrameRangeMode::CurrentFrame => {
                let frame = host.current_frame();
                (frame, frame)
            }
            FrameRangeMode::RenderSettings => host.render_range(),
            FrameRangeMode::TimeSlider => host.playback_range(),
            FrameRangeMode::Manual => self.manual,
        };
    }

    /// Store user-entered values.
    pub fn set_manual(&mut self, start: f64, end: f64) -> Result<(), DomainError> {
        if !self.is_editable() {
            return Err(DomainError::ReadOnlyFrameRange);
        }
        for value in [start, end] {
            if !value.is_finite() || value.abs() > FRAME_LIMIT {
                return Err(DomainError::FrameOutOfBounds(value));
            }
        }
        self.manual = (start, end);
        self.displayed = self.manual;
        Ok(())
    }

    /// Values as shown in the start/end fields.
    pub fn display(&self) -> (String, String) {
        (
            format!("{:.4}", self.displayed.0),
            format!("{:.4}", self.displayed.1),
        )
    }

    /// Refresh from the host and validate the result.
    pub fn resolve(&mut self, host: &dyn SceneHost) -> Result<FrameRange, DomainError> {
        self.refresh(host);
        FrameRange::new(self.displayed.0, self.displayed.1)
    }
}
