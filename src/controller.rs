use std::{fmt::Display, future::Future, str::FromStr, time::Duration};

use anyhow::bail;
use common::{Color, DeviceInfo, FirmwareInfo, PatternStep};
use log::{debug, info, warn};
use tokio::{sync::mpsc, time::sleep};

use crate::{
    coalescer::Coalescer,
    config::Config,
    connection::{Connection, ConnectionState},
    device::{DeviceApi, DeviceError},
    pattern::Pattern,
    store::AddressStore,
    Intent, InternalMessage, MessageKind,
};

/// How long a success message stays up before falling back to "Ready"
pub const STATUS_RESET_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControlMode {
    #[default]
    Solid,
    Pattern,
    /// Firmware version and updates
    System,
}

impl FromStr for ControlMode {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_ref() {
            "solid" => Ok(ControlMode::Solid),
            "pattern" => Ok(ControlMode::Pattern),
            "system" => Ok(ControlMode::System),
            other => bail!("unknown mode `{}` (expected solid, pattern or system)", other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub fn apply(self, color: Color, value: u8) -> Color {
        match self {
            Channel::Red => Color { r: value, ..color },
            Channel::Green => Color { g: value, ..color },
            Channel::Blue => Color { b: value, ..color },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Idle,
    Sending,
    Success,
    Error,
}

/// The single line of feedback shown to the user. Every operation overwrites
/// it; nothing is queued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    pub fn idle(text: impl Into<String>) -> Self {
        Self::new(StatusKind::Idle, text)
    }

    pub fn sending(text: impl Into<String>) -> Self {
        Self::new(StatusKind::Sending, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(StatusKind::Success, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(StatusKind::Error, text)
    }

    fn new(kind: StatusKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

impl Display for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.kind {
            StatusKind::Idle => "idle",
            StatusKind::Sending => "sending",
            StatusKind::Success => "ok",
            StatusKind::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.text)
    }
}

/// Owns all remote-control state and turns user intents into device requests.
///
/// Messages arrive through one queue and are handled one at a time, so no
/// state is shared with the timer and request tasks it spawns; those only
/// post [`InternalMessage`]s back onto the queue.
pub struct Controller<D, S> {
    device: D,
    store: S,
    config: Config,
    connection: Connection,
    mode: ControlMode,
    powered: bool,
    status: StatusMessage,
    solid: Color,
    pattern: Pattern,
    device_info: Option<DeviceInfo>,
    latest_firmware: Option<FirmwareInfo>,
    /// Set when an operation needed a connection that wasn't there
    connection_prompt: bool,
    color_updates: Coalescer,
    /// Device requests spawned but not yet answered
    in_flight: usize,
    message_queue: mpsc::Sender<MessageKind>,
}

impl<D: DeviceApi, S: AddressStore> Controller<D, S> {
    pub fn new(device: D, store: S, config: Config, sender: mpsc::Sender<MessageKind>) -> Self {
        let connection = match store.load() {
            Some(address) => Connection::with_address(address),
            None => Connection::default(),
        };

        Self {
            device,
            store,
            color_updates: Coalescer::new(config.debounce()),
            config,
            connection,
            mode: ControlMode::default(),
            powered: true,
            status: StatusMessage::idle("Ready"),
            solid: Color::DEFAULT,
            pattern: Pattern::default(),
            device_info: None,
            latest_firmware: None,
            connection_prompt: false,
            in_flight: 0,
            message_queue: sender,
        }
    }

    /// Apply one message. Device requests are started here but answered
    /// later through the queue.
    pub fn handle(&mut self, message: MessageKind) {
        debug!("Handling {:?}", message);

        match message {
            MessageKind::User(intent) => self.handle_intent(intent),
            MessageKind::Internal(message) => self.handle_internal(message),
        }
    }

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Connect(address) => self.connect(&address),
            Intent::Disconnect => self.disconnect(),
            Intent::SetMode(mode) => self.set_mode(mode),
            Intent::ChangeColor(color) => {
                self.solid = color;
                self.queue_color_update();
            }
            Intent::ChangeChannel { channel, value } => {
                self.solid = channel.apply(self.solid, value);
                self.queue_color_update();
            }
            Intent::SelectPreset(color) => {
                self.solid = color;
                self.powered = true;
                self.queue_color_update();
            }
            Intent::TogglePower => self.toggle_power(),
            Intent::AddStep => {
                if self.pattern.add_step().is_none() {
                    warn!("Pattern is full, not adding a step");
                }
            }
            Intent::SelectStep(index) => {
                if let Err(e) = self.pattern.select(index) {
                    self.status = StatusMessage::error(e.to_string());
                }
            }
            Intent::UpdateStep { index, step } => {
                if let Err(e) = self.pattern.update_step(index, step) {
                    self.status = StatusMessage::error(e.to_string());
                }
            }
            Intent::DeleteStep => {
                let index = self.pattern.selected_index();
                if let Err(e) = self.pattern.delete_step(index) {
                    self.status = StatusMessage::error(e.to_string());
                }
            }
            Intent::ClearPattern { confirmed } => {
                if confirmed {
                    self.pattern.clear();
                } else {
                    self.status = StatusMessage::idle("Clearing the pattern needs confirmation");
                }
            }
            Intent::GenerateRainbow => self.pattern.generate_rainbow(),
            Intent::GenerateRandom => self.pattern.generate_random(&mut rand::thread_rng()),
            Intent::SendPattern => self.send_pattern(),
            Intent::RefreshDeviceInfo => self.refresh_device_info(),
            Intent::CheckFirmware => self.check_firmware(),
            Intent::TriggerUpdate { confirmed } => self.trigger_update(confirmed),
        }
    }

    fn handle_internal(&mut self, message: InternalMessage) {
        match message {
            InternalMessage::FlushColor(color) => {
                // Things may have changed while the burst was settling
                if self.mode == ControlMode::Solid && self.powered && self.is_connected() {
                    self.send_color(color);
                }
            }
            InternalMessage::StatusExpired => {
                if self.status.kind == StatusKind::Success {
                    self.status = StatusMessage::idle("Ready");
                }
            }
            InternalMessage::UpdateSent => {
                info!("Update sent, dropping the connection while the device reboots");
                self.disconnect();
            }
            InternalMessage::ConnectionChecked { address, result } => {
                self.request_done();
                self.connection_checked(&address, result);
            }
            InternalMessage::ColorSent { address, result } => {
                self.request_done();
                if self.answers_current(&address) {
                    match result {
                        Ok(()) => self.status = StatusMessage::success("Colour updated"),
                        Err(e) => self.device_failed(e),
                    }
                }
            }
            InternalMessage::PatternSent {
                address,
                steps,
                result,
            } => {
                self.request_done();
                if self.answers_current(&address) {
                    match result {
                        Ok(()) => {
                            self.status =
                                StatusMessage::success(format!("Pattern sent ({} steps)", steps))
                        }
                        Err(e) => self.device_failed(e),
                    }
                }
            }
            InternalMessage::InfoFetched { address, result } => {
                self.request_done();
                if self.answers_current(&address) {
                    match result {
                        Ok(info) => {
                            self.status = StatusMessage::success(format!(
                                "Device runs firmware {}",
                                info.version
                            ));
                            self.device_info = Some(info);
                        }
                        Err(e) => self.device_failed(e),
                    }
                }
            }
            InternalMessage::FirmwareChecked(result) => {
                self.request_done();

                // Not a device call, so a failure here says nothing about the link
                match result {
                    Ok(firmware) => {
                        self.status = if self.update_available_for(&firmware) {
                            StatusMessage::success(format!(
                                "Update available: {}",
                                firmware.version
                            ))
                        } else {
                            StatusMessage::success(format!(
                                "Latest firmware is {}",
                                firmware.version
                            ))
                        };
                        self.latest_firmware = Some(firmware);
                    }
                    Err(e) => self.status = StatusMessage::error(e.to_string()),
                }
            }
            InternalMessage::UpdateRequested {
                address,
                version,
                result,
            } => {
                self.request_done();

                // The device reboots while handling this, so a dropped or timed
                // out request is what success usually looks like.
                if let Err(e) = result {
                    info!("Update request ended with `{}`, device is likely rebooting", e);
                }
                if !self.answers_current(&address) {
                    return;
                }

                self.status = StatusMessage::success(format!(
                    "Update to {} sent. The device is rebooting, reconnect in a moment",
                    version
                ));
                self.schedule(InternalMessage::UpdateSent, self.config.update_reboot_grace());
            }
        }
    }

    fn connect(&mut self, address: &str) {
        let address = address.trim();
        if address.is_empty() {
            self.status = StatusMessage::error("Enter the address of the device");
            return;
        }

        if let Err(e) = self.connection.begin(address) {
            self.status = StatusMessage::error(e.to_string());
            return;
        }
        self.color_updates.cancel();
        self.status = StatusMessage::sending(format!("Connecting to {}...", address));

        let device = self.device.clone();
        let address = address.to_string();
        self.spawn_request(async move {
            let result = device.check_connection(&address).await;
            InternalMessage::ConnectionChecked { address, result }
        });
    }

    fn connection_checked(&mut self, address: &str, result: Result<(), DeviceError>) {
        if self.connection.candidate() != Some(address) {
            debug!("Ignoring a stale connection check of {}", address);
            return;
        }

        match result {
            Ok(()) => {
                self.connection.accept();
                if let Err(e) = self.store.save(address) {
                    warn!("Could not remember {}: {:#}", address, e);
                }

                self.connection_prompt = false;
                self.status = StatusMessage::success(format!("Connected to {}", address));
                self.schedule(InternalMessage::StatusExpired, STATUS_RESET_DELAY);

                // The new device should show what the remote shows
                self.queue_color_update();
            }
            Err(e) => {
                self.connection.reject();
                self.status = StatusMessage::error(e.to_string());
            }
        }
    }

    fn disconnect(&mut self) {
        self.color_updates.cancel();
        self.connection.disconnect();
        if self.mode == ControlMode::System {
            self.mode = ControlMode::Solid;
        }
        self.status = StatusMessage::idle("Not connected");
    }

    fn set_mode(&mut self, mode: ControlMode) {
        if mode == ControlMode::System && !self.is_connected() {
            self.prompt_connection();
            return;
        }

        let previous = std::mem::replace(&mut self.mode, mode);
        match mode {
            ControlMode::Solid if previous != ControlMode::Solid => self.queue_color_update(),
            ControlMode::Solid => {}
            ControlMode::Pattern => {
                self.color_updates.cancel();
            }
            ControlMode::System => {
                self.color_updates.cancel();
                self.refresh_device_info();
            }
        }
    }

    fn toggle_power(&mut self) {
        self.powered = !self.powered;
        self.color_updates.cancel();

        if !self.is_connected() {
            if self.powered {
                self.prompt_connection();
            }
            return;
        }

        match (self.mode, self.powered) {
            (ControlMode::Solid, true) => self.send_color(self.solid),
            (ControlMode::Pattern, true) => self.send_pattern(),
            (ControlMode::Solid | ControlMode::Pattern, false) => self.send_color(Color::OFF),
            (ControlMode::System, _) => {}
        }
    }

    /// Restart the quiet period for the current solid colour.
    fn queue_color_update(&mut self) {
        if self.mode != ControlMode::Solid || !self.powered || !self.is_connected() {
            return;
        }

        let queue = self.message_queue.clone();
        let color = self.solid;
        self.color_updates.schedule(async move {
            let message = MessageKind::Internal(InternalMessage::FlushColor(color));
            if queue.send(message).await.is_err() {
                debug!("Controller is gone, dropping colour update");
            }
        });
    }

    fn send_color(&mut self, color: Color) {
        let Some(address) = self.connection.active_address().map(str::to_string) else {
            return;
        };

        self.status = StatusMessage::sending("Sending colour...");
        let device = self.device.clone();
        self.spawn_request(async move {
            let result = device.set_color(&address, color).await;
            InternalMessage::ColorSent { address, result }
        });
    }

    fn send_pattern(&mut self) {
        let Some(address) = self.require_connection() else {
            return;
        };

        self.status = StatusMessage::sending("Sending pattern...");
        let device = self.device.clone();
        let steps = self.pattern.steps().to_vec();
        self.spawn_request(async move {
            let result = device.set_pattern(&address, &steps).await;
            InternalMessage::PatternSent {
                address,
                steps: steps.len(),
                result,
            }
        });
    }

    fn refresh_device_info(&mut self) {
        let Some(address) = self.require_connection() else {
            return;
        };

        self.status = StatusMessage::sending("Reading device info...");
        let device = self.device.clone();
        self.spawn_request(async move {
            let result = device.get_device_info(&address).await;
            InternalMessage::InfoFetched { address, result }
        });
    }

    fn check_firmware(&mut self) {
        self.latest_firmware = None;
        self.status = StatusMessage::sending("Checking for updates...");

        let device = self.device.clone();
        self.spawn_request(async move {
            InternalMessage::FirmwareChecked(device.check_latest_firmware().await)
        });
    }

    fn trigger_update(&mut self, confirmed: bool) {
        let Some(address) = self.require_connection() else {
            return;
        };
        let Some(firmware) = self.latest_firmware.clone() else {
            self.status = StatusMessage::error("Check for updates first");
            return;
        };
        if !self.update_available() {
            self.status = StatusMessage::idle(format!("Already on {}", firmware.version));
            return;
        }
        if !confirmed {
            self.status = StatusMessage::idle(format!(
                "Updating to {} reboots the device and needs confirmation",
                firmware.version
            ));
            return;
        }

        self.status = StatusMessage::sending(format!("Sending update to {}...", firmware.version));
        let device = self.device.clone();
        self.spawn_request(async move {
            let result = device.trigger_update(&address, &firmware.url).await;
            InternalMessage::UpdateRequested {
                address,
                version: firmware.version,
                result,
            }
        });
    }

    /// Report a failed device request. A network failure means the link is
    /// considered gone.
    fn device_failed(&mut self, error: DeviceError) {
        if error.is_network() {
            self.color_updates.cancel();
            self.connection.link_lost();
        }
        self.status = StatusMessage::error(error.to_string());
    }

    /// Whether a request result came from the device the remote is still
    /// connected to
    fn answers_current(&self, address: &str) -> bool {
        let current = self.connection.active_address() == Some(address);
        if !current {
            debug!("Ignoring a late answer from {}", address);
        }
        current
    }

    fn require_connection(&mut self) -> Option<String> {
        let address = self.connection.active_address().map(str::to_string);
        if address.is_none() {
            self.prompt_connection();
        }
        address
    }

    fn prompt_connection(&mut self) {
        info!("Not connected, asking for a device address");
        self.connection_prompt = true;
    }

    /// Run a device request off the queue and post its result back onto it.
    fn spawn_request<F>(&mut self, request: F)
    where
        F: Future<Output = InternalMessage> + Send + 'static,
    {
        self.in_flight += 1;

        let queue = self.message_queue.clone();
        tokio::spawn(async move {
            let message = request.await;
            if let Err(e) = queue.send(message.into()).await {
                debug!("Controller is gone, dropping {:?}", e.0);
            }
        });
    }

    fn request_done(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn schedule(&self, message: InternalMessage, delay: Duration) {
        let queue = self.message_queue.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(e) = queue.send(message.into()).await {
                debug!("Controller is gone, dropping {:?}", e.0);
            }
        });
    }

    /// Device requests whose results have not been handled yet
    pub fn requests_in_flight(&self) -> usize {
        self.in_flight
    }

    fn update_available_for(&self, firmware: &FirmwareInfo) -> bool {
        self.device_info
            .as_ref()
            .map(|info| info.version != firmware.version)
            .unwrap_or(false)
    }

    pub fn update_available(&self) -> bool {
        self.latest_firmware
            .as_ref()
            .map(|firmware| self.update_available_for(firmware))
            .unwrap_or(false)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// The address to offer when asking the user where to connect
    pub fn default_address(&self) -> &str {
        self.connection
            .address()
            .unwrap_or(&self.config.default_address)
    }

    pub fn active_address(&self) -> Option<&str> {
        self.connection.active_address()
    }

    /// Whether an operation asked for a connection since the last call
    pub fn take_connection_prompt(&mut self) -> bool {
        std::mem::take(&mut self.connection_prompt)
    }

    pub fn status(&self) -> &StatusMessage {
        &self.status
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn is_on(&self) -> bool {
        self.powered
    }

    pub fn solid_color(&self) -> Color {
        self.solid
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn selected_step(&self) -> &PatternStep {
        self.pattern.selected_step()
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    pub fn latest_firmware(&self) -> Option<&FirmwareInfo> {
        self.latest_firmware.as_ref()
    }

    /// What the strip should be showing right now
    pub fn display_color(&self) -> Color {
        if !self.powered {
            return Color::OFF;
        }
        match self.mode {
            ControlMode::Pattern => self.pattern.selected_step().color,
            _ => self.solid,
        }
    }
}
