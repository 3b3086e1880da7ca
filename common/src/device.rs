use alloc::{string::String, vec::Vec};
use serde::{Deserialize, Serialize};

use crate::Color;

// Limits the device firmware accepts for a pattern
pub const MAX_PATTERN_STEPS: usize = 256;
pub const MIN_STEP_DURATION_MS: u16 = 50;
pub const MAX_STEP_DURATION_MS: u16 = 2000;
pub const MAX_BRIGHTNESS: u8 = 100;

/// The step a fresh or cleared pattern starts with.
pub const DEFAULT_STEP: PatternStep = PatternStep {
    color: Color::DEFAULT,
    duration: 500,
    brightness: 100,
};

/// One timed colour of a pattern. The device shows `color` at `brightness`
/// percent for `duration` milliseconds, then moves to the next step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStep {
    pub color: Color,
    pub duration: u16,
    pub brightness: u8,
}

impl PatternStep {
    /// Create a step, pulling duration and brightness into the range the
    /// device accepts.
    pub fn new(color: Color, duration: u16, brightness: u8) -> Self {
        Self {
            color,
            duration: duration.clamp(MIN_STEP_DURATION_MS, MAX_STEP_DURATION_MS),
            brightness: brightness.min(MAX_BRIGHTNESS),
        }
    }

    /// The colour this step actually shows once brightness is applied.
    pub fn display_color(&self) -> Color {
        self.color.dimmed(self.brightness)
    }
}

impl Default for PatternStep {
    fn default() -> Self {
        DEFAULT_STEP
    }
}

/// Body of `POST /setpattern`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetPatternRequest {
    pub steps: Vec<PatternStep>,
}

/// Body of `POST /update`. `url` points at the firmware image the device
/// should fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub url: String,
}

/// What the device reports about itself on `GET /info`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub version: String,
}

/// Latest firmware release as published by the firmware metadata server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    pub version: String,
    pub url: String,
    pub changelog: String,
}
