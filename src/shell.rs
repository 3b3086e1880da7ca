use std::fmt::Write;

use anyhow::{anyhow, bail, Context, Error};
use common::{Color, PatternStep};
use log::debug;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::{
    controller::{Channel, Controller},
    device::DeviceApi,
    store::AddressStore,
    Intent, MessageKind,
};

pub const HELP: &str = "\
connect [address]         check a device and use it
disconnect                forget the current device
mode solid|pattern|system switch what the remote edits
color <colour>            set the solid colour (name, #rrggbb or r g b)
r|g|b <0-255>             change one channel of the solid colour
preset <name>             red, green, blue, yellow, cyan, magenta or white
power                     switch the light on or off
step add                  copy the last step onto the end
step select <n>           select step n (counting from 1)
step set <n> <colour> <duration ms> <brightness %>
step delete               delete the selected step
clear --yes               reset the pattern to one step
rainbow | random          generate a pattern
send                      send the pattern to the device
info                      read the device firmware version
check                     look for newer firmware
update --yes              install the newest firmware
show                      print the current state
help | quit";

/// One line of shell input
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Connect, to the remembered address when none is given
    Connect(Option<String>),
    Intent(Intent),
    Show,
    Help,
    Quit,
}

/// Parse a colour given as a preset name, `#rrggbb` or `r,g,b`.
pub fn parse_color(input: &str) -> Result<Color, Error> {
    let input = input.trim();

    if let Some(color) = Color::preset(input) {
        return Ok(color);
    }

    if input.contains(',') {
        let channels = input
            .split(',')
            .map(|channel| parse_number(channel.trim()))
            .collect::<Result<Vec<i64>, Error>>()?;
        return match channels.as_slice() {
            [r, g, b] => Ok(Color::clamped(*r, *g, *b)),
            _ => bail!("expected three channels in `{}`", input),
        };
    }

    let hex = input.strip_prefix('#').unwrap_or(input);
    if hex.len() == 6 {
        if let Ok(value) = u32::from_str_radix(hex, 16) {
            return Ok(Color::new(
                (value >> 16) as u8,
                (value >> 8) as u8,
                value as u8,
            ));
        }
    }

    bail!("`{}` is not a colour (try red, #ff0000 or 255,0,0)", input)
}

fn parse_number(input: &str) -> Result<i64, Error> {
    input
        .parse()
        .with_context(|| format!("`{}` is not a number", input))
}

/// Step numbers are shown to the user counting from 1
fn parse_step_number(input: Option<&str>) -> Result<usize, Error> {
    let input = input.ok_or_else(|| anyhow!("which step?"))?;
    let number: usize = input
        .parse()
        .with_context(|| format!("`{}` is not a step number", input))?;
    number
        .checked_sub(1)
        .ok_or_else(|| anyhow!("steps are numbered from 1"))
}

fn parse_color_args(args: &[&str]) -> Result<Color, Error> {
    match args {
        [single] => parse_color(single),
        [r, g, b] => Ok(Color::clamped(
            parse_number(r)?,
            parse_number(g)?,
            parse_number(b)?,
        )),
        _ => bail!("expected a colour"),
    }
}

fn parse_step(args: &[&str]) -> Result<Intent, Error> {
    let (index, rest) = match args {
        [index, rest @ ..] => (parse_step_number(Some(*index))?, rest),
        [] => bail!("usage: step set <n> <colour> <duration ms> <brightness %>"),
    };
    let (color, duration, brightness) = match rest {
        [color, duration, brightness] => (parse_color(color)?, duration, brightness),
        [r, g, b, duration, brightness] => (parse_color_args(&[*r, *g, *b])?, duration, brightness),
        _ => bail!("usage: step set <n> <colour> <duration ms> <brightness %>"),
    };

    let duration = parse_number(duration)?.clamp(0, u16::MAX as i64) as u16;
    let brightness = parse_number(brightness)?.clamp(0, u8::MAX as i64) as u8;

    Ok(Intent::UpdateStep {
        index,
        step: PatternStep::new(color, duration, brightness),
    })
}

fn confirmed(args: &[&str], what: &str) -> Result<bool, Error> {
    match args {
        [] => Ok(false),
        ["--yes"] | ["-y"] => Ok(true),
        _ => bail!("usage: {} [--yes]", what),
    }
}

/// Turn one line of input into a command. Blank lines give `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, args)) = words.split_first() else {
        return Ok(None);
    };

    let intent = match (name.to_lowercase().as_str(), args) {
        ("connect", []) => return Ok(Some(Command::Connect(None))),
        ("connect", [address]) => return Ok(Some(Command::Connect(Some(address.to_string())))),
        ("disconnect", []) => Intent::Disconnect,
        ("mode", [mode]) => Intent::SetMode(mode.parse()?),
        ("color" | "colour", args) => Intent::ChangeColor(parse_color_args(args)?),
        (channel @ ("r" | "g" | "b"), [value]) => {
            let channel = match channel {
                "r" => Channel::Red,
                "g" => Channel::Green,
                _ => Channel::Blue,
            };
            let value = parse_number(value)?.clamp(0, 255) as u8;
            Intent::ChangeChannel { channel, value }
        }
        ("preset", [name]) => Intent::SelectPreset(
            Color::preset(name).ok_or_else(|| anyhow!("no preset called `{}`", name))?,
        ),
        ("power", []) => Intent::TogglePower,
        ("step", ["add"]) => Intent::AddStep,
        ("step", ["select", index]) => Intent::SelectStep(parse_step_number(Some(*index))?),
        ("step", ["set", rest @ ..]) => parse_step(rest)?,
        ("step", ["delete"]) => Intent::DeleteStep,
        ("clear", args) => Intent::ClearPattern {
            confirmed: confirmed(args, "clear")?,
        },
        ("rainbow", []) => Intent::GenerateRainbow,
        ("random", []) => Intent::GenerateRandom,
        ("send", []) => Intent::SendPattern,
        ("info", []) => Intent::RefreshDeviceInfo,
        ("check", []) => Intent::CheckFirmware,
        ("update", args) => Intent::TriggerUpdate {
            confirmed: confirmed(args, "update")?,
        },
        ("show", []) => return Ok(Some(Command::Show)),
        ("help" | "?", []) => return Ok(Some(Command::Help)),
        ("quit" | "exit", []) => return Ok(Some(Command::Quit)),
        _ => bail!("don't know `{}`, try `help`", line.trim()),
    };

    Ok(Some(Command::Intent(intent)))
}

fn format_color(color: Color) -> String {
    format!(
        "#{:02x}{:02x}{:02x} ({}, {}, {})",
        color.r, color.g, color.b, color.r, color.g, color.b
    )
}

/// Everything the remote knows, for `show`
pub fn describe<D: DeviceApi, S: AddressStore>(controller: &Controller<D, S>) -> String {
    let mut out = String::new();

    let _ = match controller.active_address() {
        Some(address) => writeln!(out, "device:   {} ({})", address, controller.connection_state()),
        None => writeln!(
            out,
            "device:   {} (last used {})",
            controller.connection_state(),
            controller.default_address()
        ),
    };
    let _ = writeln!(out, "mode:     {:?}", controller.mode());
    let _ = writeln!(out, "power:    {}", if controller.is_on() { "on" } else { "off" });
    let _ = writeln!(out, "colour:   {}", format_color(controller.solid_color()));
    let _ = writeln!(out, "showing:  {}", format_color(controller.display_color()));

    let pattern = controller.pattern();
    let _ = writeln!(out, "pattern:  {} steps", pattern.len());
    for (index, step) in pattern.steps().iter().enumerate() {
        let marker = if index == pattern.selected_index() { '>' } else { ' ' };
        let _ = writeln!(
            out,
            " {} {:>3}. {} {}ms {}%",
            marker,
            index + 1,
            format_color(step.color),
            step.duration,
            step.brightness
        );
    }

    if let Some(info) = controller.device_info() {
        let _ = writeln!(out, "firmware: {}", info.version);
    }
    if let Some(latest) = controller.latest_firmware() {
        let _ = writeln!(
            out,
            "latest:   {}{}",
            latest.version,
            if controller.update_available() { " (update available)" } else { "" }
        );
        if !latest.changelog.is_empty() {
            let _ = writeln!(out, "          {}", latest.changelog);
        }
    }
    let _ = write!(out, "status:   {}", controller.status());

    out
}

/// Interactive loop over stdin. Timer messages and device answers are
/// handled in between lines, so debounced sends go out while the user is
/// typing and a slow device never holds up the prompt.
pub async fn run<D: DeviceApi, S: AddressStore>(
    mut controller: Controller<D, S>,
    mut receiver: mpsc::Receiver<MessageKind>,
) -> Result<(), Error> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("led-remote, type `help` for commands");
    println!("{}", controller.status());

    loop {
        let last_status = controller.status().clone();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                match parse_line(&line) {
                    Ok(None) => continue,
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Help)) => println!("{}", HELP),
                    Ok(Some(Command::Show)) => println!("{}", describe(&controller)),
                    Ok(Some(Command::Connect(address))) => {
                        let address =
                            address.unwrap_or_else(|| controller.default_address().to_string());
                        controller.handle(Intent::Connect(address).into());
                    }
                    Ok(Some(Command::Intent(intent))) => controller.handle(intent.into()),
                    Err(e) => println!("{:#}", e),
                }
            }
            Some(message) = receiver.recv() => controller.handle(message),
        }

        if controller.take_connection_prompt() {
            println!(
                "Not connected. Use `connect [address]` (default {})",
                controller.default_address()
            );
        }
        if *controller.status() != last_status {
            println!("{}", controller.status());
        }
    }

    debug!("Shell closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControlMode;

    fn intent(line: &str) -> Intent {
        match parse_line(line).unwrap() {
            Some(Command::Intent(intent)) => intent,
            other => panic!("`{}` gave {:?}", line, other),
        }
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("Red").unwrap(), Color::new(255, 0, 0));
        assert_eq!(parse_color("#ef4444").unwrap(), Color::new(239, 68, 68));
        assert_eq!(parse_color("00ff80").unwrap(), Color::new(0, 255, 128));
        assert_eq!(parse_color("300, -4, 7").unwrap(), Color::new(255, 0, 7));

        assert!(parse_color("#12345").is_err());
        assert!(parse_color("1,2").is_err());
        assert!(parse_color("orange").is_err());
    }

    #[test]
    fn test_blank_and_meta() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("show").unwrap(), Some(Command::Show));
        assert_eq!(parse_line("help").unwrap(), Some(Command::Help));
        assert_eq!(parse_line("exit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_line("connect").unwrap(), Some(Command::Connect(None)));
        assert_eq!(
            parse_line("connect 192.168.1.50").unwrap(),
            Some(Command::Connect(Some("192.168.1.50".into())))
        );
    }

    #[test]
    fn test_color_commands() {
        assert_eq!(intent("color 255 0 0"), Intent::ChangeColor(Color::new(255, 0, 0)));
        assert_eq!(intent("colour blue"), Intent::ChangeColor(Color::new(0, 0, 255)));
        assert_eq!(
            intent("g 400"),
            Intent::ChangeChannel {
                channel: Channel::Green,
                value: 255
            }
        );
        assert_eq!(intent("preset cyan"), Intent::SelectPreset(Color::new(0, 255, 255)));
        assert!(parse_line("preset orange").is_err());
        assert_eq!(intent("mode Pattern"), Intent::SetMode(ControlMode::Pattern));
        assert!(parse_line("mode disco").is_err());
    }

    #[test]
    fn test_step_commands() {
        assert_eq!(intent("step add"), Intent::AddStep);
        assert_eq!(intent("step select 3"), Intent::SelectStep(2));
        assert!(parse_line("step select 0").is_err());
        assert_eq!(intent("step delete"), Intent::DeleteStep);

        assert_eq!(
            intent("step set 2 #00ff00 5000 150"),
            Intent::UpdateStep {
                index: 1,
                step: PatternStep::new(Color::new(0, 255, 0), 2000, 100),
            }
        );
        assert_eq!(
            intent("step set 1 10 20 30 10 50"),
            Intent::UpdateStep {
                index: 0,
                step: PatternStep::new(Color::new(10, 20, 30), 50, 50),
            }
        );
        assert!(parse_line("step set 1 red").is_err());
    }

    #[test]
    fn test_confirmation_flags() {
        assert_eq!(intent("clear"), Intent::ClearPattern { confirmed: false });
        assert_eq!(intent("clear --yes"), Intent::ClearPattern { confirmed: true });
        assert_eq!(intent("update -y"), Intent::TriggerUpdate { confirmed: true });
        assert!(parse_line("update now").is_err());
    }

    #[test]
    fn test_unknown() {
        assert!(parse_line("dance").is_err());
        assert!(parse_line("power on").is_err());
    }
}
