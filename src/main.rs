use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Error};
use clap::{Parser, Subcommand};
use led_remote::{
    prelude::*,
    shell::{self, parse_color},
};
use log::{debug, info};
use tokio::sync::mpsc;

/// Remote control for an LED strip controller on the local network
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Device address. Defaults to the last one that worked
    #[arg(short, long)]
    address: Option<String>,
    /// Config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// What to do. Without one an interactive shell starts
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive remote
    Shell,
    /// Check that the device answers
    Ping,
    /// Show a solid colour
    Color {
        /// Preset name, #rrggbb or r,g,b
        #[arg(value_parser = parse_color)]
        color: Color,
    },
    /// Switch the light off
    Off,
    /// Send a rainbow pattern
    Rainbow,
    /// Send a random pattern
    Random,
    /// Print the device firmware version
    Info,
    /// Check whether newer firmware is available
    Firmware,
    /// Install the newest firmware
    Update {
        /// Really reboot the device into the new firmware
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    debug!("Using {:?}", config);

    // Long enough for a debounced colour to go out
    let settle = config.debounce() + Duration::from_millis(300);
    let reboot_grace = config.update_reboot_grace();

    let device = HttpDevice::new(config.firmware_url.clone());
    let store = FileStore::new(&config.state_file);

    // Message queue
    let (message_queue_tx, message_queue_rx) = mpsc::channel(100);
    let mut controller = Controller::new(device, store, config, message_queue_tx);

    match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => {
            if let Some(address) = cli.address {
                controller.handle(Intent::Connect(address).into());
            }
            shell::run(controller, message_queue_rx).await
        }
        command => {
            let waits = Waits {
                settle,
                reboot_grace,
            };
            run_once(controller, message_queue_rx, cli.address, command, waits).await
        }
    }
}

/// How long a one-shot command keeps handling timers after its last intent
struct Waits {
    settle: Duration,
    reboot_grace: Duration,
}

/// Connect, run one command through the controller and report how it went.
async fn run_once<D: DeviceApi, S: AddressStore>(
    mut controller: Controller<D, S>,
    mut receiver: mpsc::Receiver<MessageKind>,
    address: Option<String>,
    command: Command,
    waits: Waits,
) -> Result<(), Error> {
    let address = address.unwrap_or_else(|| controller.default_address().to_string());
    info!("Connecting to {}", address);

    controller.handle(Intent::Connect(address).into());
    finish_requests(&mut controller, &mut receiver).await;
    if !controller.is_connected() {
        bail!("{}", controller.status().text);
    }

    let report = matches!(command, Command::Info | Command::Firmware);
    let updating = matches!(command, Command::Update { yes: true });
    let intents = match command {
        Command::Shell | Command::Ping => vec![],
        Command::Color { color } => vec![Intent::ChangeColor(color)],
        Command::Off => vec![Intent::TogglePower],
        Command::Rainbow => vec![
            Intent::SetMode(ControlMode::Pattern),
            Intent::GenerateRainbow,
            Intent::SendPattern,
        ],
        Command::Random => vec![
            Intent::SetMode(ControlMode::Pattern),
            Intent::GenerateRandom,
            Intent::SendPattern,
        ],
        Command::Info => vec![Intent::SetMode(ControlMode::System)],
        Command::Firmware => vec![
            Intent::SetMode(ControlMode::System),
            Intent::CheckFirmware,
        ],
        Command::Update { yes } => vec![
            Intent::SetMode(ControlMode::System),
            Intent::CheckFirmware,
            Intent::TriggerUpdate { confirmed: yes },
        ],
    };

    // A bare ping exits before the colour push that follows a
    // connect goes out
    let idle = intents.is_empty();
    for intent in intents {
        controller.handle(intent.into());
        finish_requests(&mut controller, &mut receiver).await;
        if controller.status().kind == StatusKind::Error {
            break;
        }
    }

    if updating && controller.status().kind == StatusKind::Success {
        // Stay until the remote lets go of the rebooting device
        let outcome = controller.status().clone();
        drain(&mut controller, &mut receiver, waits.reboot_grace + waits.settle).await;
        println!("{}", outcome);
        if !controller.is_connected() {
            println!("{}", controller.status());
        }
        return Ok(());
    }

    if !idle {
        drain(&mut controller, &mut receiver, waits.settle).await;
    }

    if report {
        println!("{}", shell::describe(&controller));
    } else {
        println!("{}", controller.status());
    }

    if controller.status().kind == StatusKind::Error {
        bail!("{}", controller.status().text);
    }

    Ok(())
}

/// Handle results until every device request has answered. Requests carry
/// their own timeouts, so this ends.
async fn finish_requests<D: DeviceApi, S: AddressStore>(
    controller: &mut Controller<D, S>,
    receiver: &mut mpsc::Receiver<MessageKind>,
) {
    while controller.requests_in_flight() > 0 {
        match receiver.recv().await {
            Some(message) => controller.handle(message),
            None => break,
        }
    }
}

/// Handle queued messages until the queue stays quiet for `quiet` with no
/// request outstanding.
async fn drain<D: DeviceApi, S: AddressStore>(
    controller: &mut Controller<D, S>,
    receiver: &mut mpsc::Receiver<MessageKind>,
    quiet: Duration,
) {
    loop {
        match tokio::time::timeout(quiet, receiver.recv()).await {
            Ok(Some(message)) => controller.handle(message),
            _ if controller.requests_in_flight() > 0 => {
                finish_requests(controller, receiver).await
            }
            _ => break,
        }
    }
}
