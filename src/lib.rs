use common::{Color, DeviceInfo, FirmwareInfo, PatternStep};
use controller::{Channel, ControlMode};
use device::DeviceError;

pub mod coalescer;
pub mod config;
pub mod connection;
pub mod controller;
pub mod device;
pub mod pattern;
pub mod shell;
pub mod store;

pub mod prelude {
    pub use crate::{
        coalescer::*, config::*, connection::*, controller::*, device::*, pattern::*, store::*,
    };
    pub use crate::{Intent, InternalMessage, MessageKind};
    pub use common::*;
}

/// Something the user asked the remote to do
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    /// Check the device at this address and use it if it answers
    Connect(String),
    Disconnect,
    SetMode(ControlMode),
    /// Replace the solid colour
    ChangeColor(Color),
    /// Change one channel of the solid colour
    ChangeChannel { channel: Channel, value: u8 },
    /// Pick a preset colour, which also switches the light on
    SelectPreset(Color),
    TogglePower,
    AddStep,
    SelectStep(usize),
    UpdateStep { index: usize, step: PatternStep },
    /// Delete the selected step
    DeleteStep,
    ClearPattern { confirmed: bool },
    GenerateRainbow,
    GenerateRandom,
    SendPattern,
    RefreshDeviceInfo,
    CheckFirmware,
    TriggerUpdate { confirmed: bool },
}

/// Messages the controller schedules for itself. Results of device requests
/// carry the address they were sent to, so answers from a device the remote
/// has since left can be told apart.
#[derive(Debug)]
pub enum InternalMessage {
    /// A colour burst went quiet; this is the colour to send
    FlushColor(Color),
    /// A transient success message has been shown long enough
    StatusExpired,
    /// The device should be rebooting into new firmware by now
    UpdateSent,
    ConnectionChecked {
        address: String,
        result: Result<(), DeviceError>,
    },
    ColorSent {
        address: String,
        result: Result<(), DeviceError>,
    },
    PatternSent {
        address: String,
        steps: usize,
        result: Result<(), DeviceError>,
    },
    InfoFetched {
        address: String,
        result: Result<DeviceInfo, DeviceError>,
    },
    FirmwareChecked(Result<FirmwareInfo, DeviceError>),
    UpdateRequested {
        address: String,
        version: String,
        result: Result<(), DeviceError>,
    },
}

/// Messages that should be processed in the queue
#[derive(Debug)]
pub enum MessageKind {
    User(Intent),
    Internal(InternalMessage),
}

impl From<Intent> for MessageKind {
    fn from(intent: Intent) -> Self {
        MessageKind::User(intent)
    }
}

impl From<InternalMessage> for MessageKind {
    fn from(message: InternalMessage) -> Self {
        MessageKind::Internal(message)
    }
}
