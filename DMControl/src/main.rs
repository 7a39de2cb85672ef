//! DMControl - find MediaRenderers on the LAN and drive their playback.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use dmcconfig::Config;
use dmccontrol::{ControlPoint, Device, DiscoveryEvent, PlayerEvent, time_utils};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// DMControl - UPnP MediaRenderer control point.
#[derive(Parser, Debug)]
#[command(name = "dmcontrol")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding `config.yaml` (defaults to `.dmcontrol`).
    #[arg(short, long, value_name = "DIR", env = "DMC_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter (error, warn, info, debug, trace or an EnvFilter directive).
    #[arg(short, long, env = "DMC_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Runs one discovery cycle and lists the renderers found.
    Discover,

    /// Plays a URI on a renderer and follows its progress.
    Play {
        /// Media URI handed to the renderer.
        uri: String,

        /// Renderer UDN, friendly name or index in the discovery list.
        #[arg(short, long)]
        device: Option<String>,

        /// Volume to apply once playback started.
        #[arg(long)]
        volume: Option<u16>,

        /// Seconds to follow playback before exiting.
        #[arg(short, long, default_value_t = 30)]
        watch: u64,
    },

    /// Prints transport state, position, volume and mute of a renderer.
    Status {
        /// Renderer UDN, friendly name or index in the discovery list.
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Stops playback on a renderer.
    Stop {
        #[arg(short, long)]
        device: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let directory = args
        .config
        .as_deref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let config = Config::load_config(&directory).context("Failed to load configuration")?;

    let level = match args.log_level {
        Some(level) => level,
        None => config.get_log_min_level()?.to_lowercase(),
    };
    if config.get_log_enable_console()? {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info")))
            .init();
    }

    info!("DMControl v{}", env!("CARGO_PKG_VERSION"));
    let cp = ControlPoint::from_config(&config)?;

    match args.command {
        Cmd::Discover => {
            let devices = discover(&cp)?;
            if devices.is_empty() {
                println!("No MediaRenderer found");
            }
            for (index, device) in devices.iter().enumerate() {
                println!("[{}] {}", index, device);
                if !device.manufacturer().is_empty() || !device.model_name().is_empty() {
                    println!("    {} {}", device.manufacturer(), device.model_name());
                }
                println!("    {}", device.location());
            }
        }
        Cmd::Play {
            uri,
            device,
            volume,
            watch,
        } => {
            let device = pick_device(&cp, device.as_deref())?;
            play(&cp, &device, &uri, volume, Duration::from_secs(watch))?;
        }
        Cmd::Status { device } => {
            let device = pick_device(&cp, device.as_deref())?;
            status(&cp, &device)?;
        }
        Cmd::Stop { device } => {
            let device = pick_device(&cp, device.as_deref())?;
            let events = monitor(&cp);
            cp.controller().stop(&device);
            match wait_player(&events, Duration::from_secs(10), |e| {
                matches!(e, PlayerEvent::Stopped | PlayerEvent::Error { .. })
            })? {
                PlayerEvent::Error { reason, .. } => bail!("Stop failed: {}", reason),
                _ => println!("Stopped {}", device.friendly_name()),
            }
        }
    }

    Ok(())
}

fn discover(cp: &ControlPoint) -> Result<Vec<Device>> {
    let (tx, rx) = unbounded();
    cp.start_discovery(move |event| {
        let _ = tx.send(event);
    });

    loop {
        match rx.recv() {
            Ok(DiscoveryEvent::Finished) => break,
            Ok(DiscoveryEvent::DeviceListChanged(devices)) => {
                info!(count = devices.len(), "Renderer list changed");
            }
            Ok(_) => {}
            Err(_) => return Err(anyhow!("Event dispatcher stopped")),
        }
    }
    cp.stop_discovery();
    Ok(cp.devices())
}

fn pick_device(cp: &ControlPoint, wanted: Option<&str>) -> Result<Device> {
    let devices = discover(cp)?;
    let device = match wanted {
        None => devices.first().cloned(),
        Some(wanted) => match wanted.parse::<usize>() {
            Ok(index) => devices.get(index).cloned(),
            Err(_) => devices
                .iter()
                .find(|d| d.has_udn(wanted) || d.friendly_name().eq_ignore_ascii_case(wanted))
                .cloned(),
        },
    };
    let device = device.ok_or_else(|| match wanted {
        Some(wanted) => anyhow!("No MediaRenderer matches {:?}", wanted),
        None => anyhow!("No MediaRenderer found"),
    })?;

    cp.select_device_by_udn(device.udn());
    info!(device = %device, "Renderer selected");
    Ok(device)
}

fn monitor(cp: &ControlPoint) -> Receiver<PlayerEvent> {
    let (tx, rx) = unbounded();
    cp.set_player_monitor(move |event| {
        let _ = tx.send(event);
    });
    rx
}

fn wait_player<F>(events: &Receiver<PlayerEvent>, timeout: Duration, mut pred: F) -> Result<PlayerEvent>
where
    F: FnMut(&PlayerEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        match events.recv_deadline(deadline) {
            Ok(event) if pred(&event) => return Ok(event),
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => bail!("Renderer did not answer in time"),
            Err(RecvTimeoutError::Disconnected) => bail!("Event dispatcher stopped"),
        }
    }
}

fn play(
    cp: &ControlPoint,
    device: &Device,
    uri: &str,
    volume: Option<u16>,
    watch: Duration,
) -> Result<()> {
    let events = monitor(cp);
    let controller = cp.controller();
    controller.play(device, uri);

    let deadline = Instant::now() + watch;
    let mut duration = -1;
    loop {
        let event = match events.recv_deadline(deadline) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => bail!("Event dispatcher stopped"),
        };

        match event {
            PlayerEvent::Preparing => println!("Preparing {}", uri),
            PlayerEvent::Playing => {
                println!("Playing on {}", device.friendly_name());
                if let Some(level) = volume {
                    controller.set_volume(device, level);
                }
            }
            PlayerEvent::DurationKnown(seconds) => {
                duration = seconds;
                if seconds >= 0 {
                    println!("Duration {}", time_utils::format_duration(seconds as u32));
                }
            }
            PlayerEvent::ProgressUpdated(seconds) if seconds >= 0 => {
                if duration > 0 {
                    println!(
                        "{} / {}",
                        time_utils::format_duration(seconds as u32),
                        time_utils::format_duration(duration as u32)
                    );
                } else {
                    println!("{}", time_utils::format_duration(seconds as u32));
                }
            }
            PlayerEvent::VolumeChanged(level) => println!("Volume {}", level),
            PlayerEvent::MuteChanged(mute) => println!("Mute {}", mute),
            PlayerEvent::Completed => {
                println!("Playback completed");
                return Ok(());
            }
            PlayerEvent::Error { command, reason } => {
                if command == "Play" {
                    bail!("Play failed: {}", reason);
                }
                warn!(command, %reason, "Renderer command failed");
            }
            _ => {}
        }
    }

    info!(watched_secs = watch.as_secs(), "Watch period elapsed, renderer keeps playing");
    Ok(())
}

fn status(cp: &ControlPoint, device: &Device) -> Result<()> {
    let events = monitor(cp);
    let controller = cp.controller();
    let timeout = Duration::from_secs(10);

    controller.get_transport_state(device);
    controller.get_position_info(device);
    controller.get_volume(device);
    controller.get_mute(device);

    println!("{}", device);
    let mut pending = 4;
    while pending > 0 {
        let event = wait_player(&events, timeout, |_| true)?;
        match event {
            PlayerEvent::TransportStateKnown(state) => println!("  state    {}", state.as_str()),
            PlayerEvent::ProgressUpdated(seconds) if seconds >= 0 => {
                println!("  position {}", time_utils::format_duration(seconds as u32))
            }
            PlayerEvent::ProgressUpdated(_) => println!("  position n/a"),
            PlayerEvent::VolumeChanged(level) => println!("  volume   {}", level),
            PlayerEvent::MuteChanged(mute) => println!("  mute     {}", mute),
            PlayerEvent::Error { command, reason } => println!("  {:<8} error: {}", command, reason),
            _ => continue,
        }
        pending -= 1;
    }
    Ok(())
}
