//! Transport control for the selected MediaRenderer.
//!
//! Commands return immediately. The SOAP exchange runs on a small worker
//! pool, serialized per device by a read/write gate, and its outcome is
//! applied on the event dispatcher thread: that is the only place the local
//! playback shadow and the poll loop change state.

mod actions;
mod command;
mod gates;
mod poller;
mod shadow;
mod worker;

use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::errors::ControlPointError;
use crate::events::{ControlEvent, EventDispatcher};
use crate::gateway::ActionGateway;
use crate::model::{AV_TRANSPORT_SERVICE, Device, PlayerEvent, TransportState};
use crate::selection::SelectedDevice;
use crate::time_utils::parse_time_value;

use actions::RendererActions;
use gates::DeviceGates;
use poller::ProgressPoller;
use worker::WorkerPool;

pub use command::Command;
pub use shadow::LocalPlayback;

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub instance_id: String,
    pub workers: usize,
    pub poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            instance_id: "0".to_string(),
            workers: 2,
            poll_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Access {
    Exclusive,
    Shared,
}

impl Access {
    fn of(command: &Command) -> Self {
        if command.is_mutating() {
            Access::Exclusive
        } else {
            Access::Shared
        }
    }
}

pub struct TransportController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    gateway: Arc<dyn ActionGateway>,
    config: ControllerConfig,
    workers: WorkerPool,
    gates: DeviceGates,
    poller: ProgressPoller,
    dispatcher: EventDispatcher,
    selection: SelectedDevice,
    local: Mutex<LocalPlayback>,
}

impl TransportController {
    pub fn new(
        gateway: Arc<dyn ActionGateway>,
        dispatcher: EventDispatcher,
        selection: SelectedDevice,
        config: ControllerConfig,
    ) -> io::Result<Self> {
        let workers = WorkerPool::spawn("dmc-worker", config.workers)?;
        let (poller, timer) = ProgressPoller::new(config.poll_interval);

        let inner = Arc::new(ControllerInner {
            gateway,
            config,
            workers,
            gates: DeviceGates::default(),
            poller,
            dispatcher,
            selection,
            local: Mutex::new(LocalPlayback::default()),
        });

        let weak: Weak<ControllerInner> = Arc::downgrade(&inner);
        timer.spawn(move |device, generation| {
            if let Some(inner) = weak.upgrade() {
                inner.poll_tick(&device, generation);
            }
        })?;

        Ok(Self { inner })
    }

    pub fn set_player_monitor<F>(&self, monitor: F)
    where
        F: FnMut(PlayerEvent) + Send + 'static,
    {
        self.inner.dispatcher.set_player_monitor(monitor);
    }

    pub fn clear_player_monitor(&self) {
        self.inner.dispatcher.clear_player_monitor();
    }

    /// Queues `command` for `device`. Outcomes arrive as [`PlayerEvent`]s.
    pub fn submit(&self, device: &Device, command: Command) {
        debug!(device = device.udn(), command = command.name(), "Command submitted");
        let inner = &self.inner;
        match command {
            Command::Play(uri) => inner.play(device, uri),
            Command::Pause => inner.pause(device),
            Command::Resume(seconds) => inner.resume(device, seconds),
            Command::Stop => inner.stop(device),
            Command::Seek(seconds) => inner.seek(device, seconds),
            Command::SetVolume(level) => inner.set_volume(device, level),
            Command::SetMute(mute) => inner.set_mute(device, mute),
            Command::GetVolume => inner.get_volume(device),
            Command::GetMute => inner.get_mute(device),
            Command::GetDuration => inner.get_media_duration(device),
            Command::GetPosition => inner.get_position_info(device),
            Command::GetTransportState => inner.get_transport_state(device),
            Command::GetMaxVolume => inner.get_volume_bound(device, VolumeBound::Max),
            Command::GetMinVolume => inner.get_volume_bound(device, VolumeBound::Min),
        }
    }

    pub fn play(&self, device: &Device, uri: &str) {
        self.submit(device, Command::Play(uri.to_string()));
    }

    pub fn pause(&self, device: &Device) {
        self.submit(device, Command::Pause);
    }

    pub fn resume(&self, device: &Device, seconds: u32) {
        self.submit(device, Command::Resume(seconds));
    }

    pub fn stop(&self, device: &Device) {
        self.submit(device, Command::Stop);
    }

    pub fn seek(&self, device: &Device, seconds: u32) {
        self.submit(device, Command::Seek(seconds));
    }

    pub fn set_volume(&self, device: &Device, level: u16) {
        self.submit(device, Command::SetVolume(level));
    }

    pub fn set_mute(&self, device: &Device, mute: bool) {
        self.submit(device, Command::SetMute(mute));
    }

    pub fn get_volume(&self, device: &Device) {
        self.submit(device, Command::GetVolume);
    }

    pub fn get_mute(&self, device: &Device) {
        self.submit(device, Command::GetMute);
    }

    pub fn get_media_duration(&self, device: &Device) {
        self.submit(device, Command::GetDuration);
    }

    pub fn get_position_info(&self, device: &Device) {
        self.submit(device, Command::GetPosition);
    }

    pub fn get_transport_state(&self, device: &Device) {
        self.submit(device, Command::GetTransportState);
    }

    pub fn get_max_volume_value(&self, device: &Device) {
        self.submit(device, Command::GetMaxVolume);
    }

    pub fn get_min_volume_value(&self, device: &Device) {
        self.submit(device, Command::GetMinVolume);
    }

    /// The user started dragging the seek bar: stop progress updates.
    pub fn on_seek_begin(&self) {
        self.inner.poller.cancel();
    }

    pub fn local_state(&self) -> LocalPlayback {
        *self.inner.local.lock()
    }

    pub fn is_playing(&self) -> bool {
        self.local_state().is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.local_state().is_paused()
    }

    pub fn selection(&self) -> SelectedDevice {
        self.inner.selection.clone()
    }

    pub fn selected_device(&self) -> Option<Device> {
        self.inner.selection.get()
    }

    /// Replaces the selection. Applied on the dispatcher thread, after every
    /// event already queued.
    pub fn select_device(&self, device: Option<Device>) {
        let selection = self.inner.selection.clone();
        self.inner.dispatcher.post(move || {
            match &device {
                Some(device) => info!(udn = device.udn(), "Device selected"),
                None => info!("Selection cleared"),
            }
            selection.set(device);
            Vec::new()
        });
    }

    pub fn clear_selection(&self) {
        self.select_device(None);
    }
}

#[derive(Clone, Copy, Debug)]
enum VolumeBound {
    Min,
    Max,
}

impl VolumeBound {
    fn command(self) -> Command {
        match self {
            VolumeBound::Min => Command::GetMinVolume,
            VolumeBound::Max => Command::GetMaxVolume,
        }
    }
}

impl ControllerInner {
    /// Runs `work` on a worker under the device gate, then `complete` on the
    /// dispatcher thread. Mutating commands take the write side of the gate.
    ///
    /// The completion is queued before the gate is released, so outcomes of
    /// mutating commands reach the dispatcher in execution order.
    fn run<T, W, C>(self: &Arc<Self>, device: &Device, command: &Command, work: W, complete: C)
    where
        T: Send + 'static,
        W: FnOnce(&RendererActions<'_>) -> T + Send + 'static,
        C: FnOnce(&Arc<ControllerInner>, &Device, T) -> Vec<PlayerEvent> + Send + 'static,
    {
        let access = Access::of(command);
        let name = command.name();
        let inner = Arc::clone(self);
        let device = device.clone();
        self.workers.execute(move || {
            trace!(device = device.udn(), command = name, ?access, "Running command");
            let gate = inner.gates.gate(&device);
            let actions =
                RendererActions::new(inner.gateway.as_ref(), &device, &inner.config.instance_id);
            let post_outcome = |outcome: T| {
                let consumer = Arc::clone(&inner);
                let device = device.clone();
                inner.dispatcher.post(move || {
                    complete(&consumer, &device, outcome)
                        .into_iter()
                        .map(ControlEvent::Player)
                        .collect()
                });
            };

            match access {
                Access::Exclusive => {
                    let _guard = gate.write();
                    post_outcome(work(&actions));
                }
                Access::Shared => {
                    let _guard = gate.read();
                    post_outcome(work(&actions));
                }
            }
        });
    }

    fn reject(&self, command: &'static str, device: &Device, err: ControlPointError) {
        self.dispatcher.emit(failure(command, device, &err));
    }

    fn play(self: &Arc<Self>, device: &Device, uri: String) {
        if uri.trim().is_empty() {
            self.reject("Play", device, ControlPointError::EmptyUri);
            return;
        }
        if !device.has_service(AV_TRANSPORT_SERVICE) {
            self.reject(
                "Play",
                device,
                ControlPointError::service_not_found(device, AV_TRANSPORT_SERVICE),
            );
            return;
        }

        info!(device = device.udn(), uri = %uri, "Play requested");
        self.dispatcher.emit(PlayerEvent::Preparing);
        self.run(
            device,
            &Command::Play(uri.clone()),
            move |actions| actions.play(&uri),
            |inner, device, outcome| match outcome {
                Ok(()) => inner.playback_started(device),
                Err(err) => vec![failure("Play", device, &err)],
            },
        );
    }

    fn playback_started(self: &Arc<Self>, device: &Device) -> Vec<PlayerEvent> {
        let had_item = {
            let mut local = self.local.lock();
            let had_item = local.has_item();
            *local = LocalPlayback::Playing;
            had_item
        };

        let mut events = vec![PlayerEvent::Playing];
        if had_item {
            events.push(PlayerEvent::PlayItemChanged);
        }

        self.get_media_duration(device);
        self.get_volume_bound(device, VolumeBound::Max);
        self.get_volume(device);
        self.poller.start(device.clone());
        events
    }

    fn pause(self: &Arc<Self>, device: &Device) {
        self.run(
            device,
            &Command::Pause,
            |actions| actions.pause(),
            |inner, device, outcome| match outcome {
                Ok(()) => {
                    *inner.local.lock() = LocalPlayback::Paused;
                    inner.poller.cancel();
                    vec![PlayerEvent::Paused]
                }
                Err(err) => vec![failure("Pause", device, &err)],
            },
        );
    }

    fn stop(self: &Arc<Self>, device: &Device) {
        self.run(
            device,
            &Command::Stop,
            |actions| actions.stop(),
            |inner, device, outcome| match outcome {
                Ok(()) => {
                    *inner.local.lock() = LocalPlayback::Stopped;
                    inner.poller.cancel();
                    vec![PlayerEvent::Stopped]
                }
                Err(err) => vec![failure("Stop", device, &err)],
            },
        );
    }

    fn resume(self: &Arc<Self>, device: &Device, seconds: u32) {
        self.run(
            device,
            &Command::Resume(seconds),
            move |actions| actions.resume(seconds),
            |inner, device, outcome| match outcome {
                Ok(()) => {
                    *inner.local.lock() = LocalPlayback::Playing;
                    inner.poller.start(device.clone());
                    vec![PlayerEvent::Playing]
                }
                Err(err) => {
                    inner.poller.cancel();
                    vec![failure("Resume", device, &err)]
                }
            },
        );
    }

    fn seek(self: &Arc<Self>, device: &Device, seconds: u32) {
        // Ticks of the current loop would report the pre-seek position.
        self.poller.cancel();
        self.run(
            device,
            &Command::Seek(seconds),
            move |actions| actions.seek(seconds),
            |inner, device, outcome| match outcome {
                Ok(()) => {
                    inner.poller.start(device.clone());
                    vec![PlayerEvent::SeekCompleted]
                }
                Err(err) => {
                    inner.poller.cancel();
                    vec![failure("Seek", device, &err)]
                }
            },
        );
    }

    fn set_volume(self: &Arc<Self>, device: &Device, level: u16) {
        self.run(
            device,
            &Command::SetVolume(level),
            move |actions| actions.set_volume(level),
            move |_, device, outcome| match outcome {
                Ok(()) => vec![PlayerEvent::VolumeChanged(level)],
                Err(err) => vec![failure("SetVolume", device, &err)],
            },
        );
    }

    fn set_mute(self: &Arc<Self>, device: &Device, mute: bool) {
        self.run(
            device,
            &Command::SetMute(mute),
            move |actions| actions.set_mute(mute),
            move |_, device, outcome| match outcome {
                Ok(()) => vec![PlayerEvent::MuteChanged(mute)],
                Err(err) => vec![failure("SetMute", device, &err)],
            },
        );
    }

    fn get_volume(self: &Arc<Self>, device: &Device) {
        self.run(
            device,
            &Command::GetVolume,
            |actions| actions.volume(),
            |_, device, outcome| match outcome {
                Ok(level) => vec![PlayerEvent::VolumeChanged(level)],
                Err(err) => vec![failure("GetVolume", device, &err)],
            },
        );
    }

    fn get_mute(self: &Arc<Self>, device: &Device) {
        self.run(
            device,
            &Command::GetMute,
            |actions| actions.mute(),
            |_, device, outcome| match outcome {
                Ok(mute) => vec![PlayerEvent::MuteChanged(mute)],
                Err(err) => vec![failure("GetMute", device, &err)],
            },
        );
    }

    fn get_volume_bound(self: &Arc<Self>, device: &Device, bound: VolumeBound) {
        self.run(
            device,
            &bound.command(),
            move |actions| match bound {
                VolumeBound::Max => actions.volume_db_bound("MaxValue"),
                VolumeBound::Min => actions.volume_db_bound("MinValue"),
            },
            move |_, device, outcome| match (bound, outcome) {
                (VolumeBound::Max, Ok(value)) => vec![PlayerEvent::MaxVolumeKnown(value)],
                (VolumeBound::Min, Ok(value)) => vec![PlayerEvent::MinVolumeKnown(value)],
                (VolumeBound::Max, Err(err)) => vec![failure("GetMaxVolume", device, &err)],
                (VolumeBound::Min, Err(err)) => vec![failure("GetMinVolume", device, &err)],
            },
        );
    }

    fn get_media_duration(self: &Arc<Self>, device: &Device) {
        self.run(
            device,
            &Command::GetDuration,
            |actions| actions.media_duration(),
            |inner, device, outcome| {
                let parsed = outcome
                    .and_then(|raw| require_value("MediaDuration", raw))
                    .and_then(|raw| parse_time_value(&raw));
                match parsed {
                    Ok(Some(seconds)) => vec![PlayerEvent::DurationKnown(i64::from(seconds))],
                    Ok(None) => {
                        debug!(device = device.udn(), "Renderer does not report duration");
                        inner.poller.cancel();
                        vec![PlayerEvent::DurationKnown(-1)]
                    }
                    Err(err) => vec![failure("GetDuration", device, &err)],
                }
            },
        );
    }

    fn get_position_info(self: &Arc<Self>, device: &Device) {
        self.run(
            device,
            &Command::GetPosition,
            |actions| actions.position(),
            |inner, device, outcome| inner.position_known(device, outcome, None),
        );
    }

    fn poll_tick(self: &Arc<Self>, device: &Device, generation: u64) {
        trace!(device = device.udn(), generation, "Poll tick");
        self.run(
            device,
            &Command::GetPosition,
            |actions| actions.position(),
            move |inner, device, outcome| inner.position_known(device, outcome, Some(generation)),
        );
    }

    /// Applies a position reading. `generation` is set for poll-loop ticks.
    fn position_known(
        &self,
        device: &Device,
        outcome: Result<String, ControlPointError>,
        generation: Option<u64>,
    ) -> Vec<PlayerEvent> {
        if let Some(generation) = generation {
            if !self.poller.is_current(generation) {
                trace!(generation, "Dropping position from a cancelled poll loop");
                return Vec::new();
            }
        }

        let (event, keep_polling) = match outcome.and_then(|raw| require_value("AbsTime", raw)) {
            // Empty answers and transport failures are transient.
            Err(err) => (failure("GetPosition", device, &err), true),
            Ok(raw) => match parse_time_value(&raw) {
                Ok(Some(seconds)) => (PlayerEvent::ProgressUpdated(i64::from(seconds)), true),
                Ok(None) => {
                    debug!(device = device.udn(), "Renderer does not report position");
                    (PlayerEvent::ProgressUpdated(-1), false)
                }
                Err(err) => (failure("GetPosition", device, &err), false),
            },
        };

        match (generation, keep_polling) {
            (Some(generation), true) => self.poller.rearm(device.clone(), generation),
            (_, false) => self.poller.cancel(),
            (None, true) => {}
        }
        vec![event]
    }

    fn get_transport_state(self: &Arc<Self>, device: &Device) {
        self.run(
            device,
            &Command::GetTransportState,
            |actions| actions.transport_state(),
            |inner, device, outcome| {
                let state = outcome.unwrap_or_else(|err| {
                    debug!(device = device.udn(), error = %err, "Transport state unavailable");
                    TransportState::Error(String::new())
                });
                inner.transport_state_known(device, state)
            },
        );
    }

    fn transport_state_known(&self, device: &Device, state: TransportState) -> Vec<PlayerEvent> {
        let mut events = vec![PlayerEvent::TransportStateKnown(state.clone())];
        let mut local = self.local.lock();

        if state.is_idle() && local.is_playing() {
            info!(device = device.udn(), state = state.as_str(), "Playback completed");
            *local = LocalPlayback::Stopped;
            self.poller.cancel();
            events.push(PlayerEvent::Completed);
        } else if let TransportState::Error(raw) = &state {
            if !raw.is_empty() {
                warn!(device = device.udn(), state = %raw, "Unknown transport state");
                *local = LocalPlayback::Error;
            }
        }
        events
    }
}

fn failure(command: &'static str, device: &Device, err: &ControlPointError) -> PlayerEvent {
    warn!(device = device.udn(), command, error = %err, "Command failed");
    PlayerEvent::Error {
        command,
        reason: err.to_string(),
    }
}

fn require_value(field: &str, raw: String) -> Result<String, ControlPointError> {
    if raw.trim().is_empty() {
        Err(ControlPointError::upnp_missing_return_value(field))
    } else {
        Ok(raw)
    }
}
