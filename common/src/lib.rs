//! Value types shared between the remote control and anything that speaks the
//! device protocol.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod color;
pub mod device;

pub use color::{Color, PRESETS};
pub use device::{
    DeviceInfo, FirmwareInfo, PatternStep, SetPatternRequest, UpdateRequest, DEFAULT_STEP,
    MAX_BRIGHTNESS, MAX_PATTERN_STEPS, MAX_STEP_DURATION_MS, MIN_STEP_DURATION_MS,
};
