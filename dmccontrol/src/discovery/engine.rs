use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::discovery::{DeviceObserver, DeviceSet, DiscoveryConfig, DiscoveryTransport, SearchTicker};
use crate::errors::ControlPointError;
use crate::events::{ControlEvent, EventDispatcher};
use crate::model::{Device, DiscoveryEvent};
use crate::selection::SelectedDevice;

/// Owns the known-renderer set and the search cycles.
pub struct DiscoveryEngine {
    inner: Arc<DiscoveryInner>,
}

struct DiscoveryInner {
    transport: Arc<dyn DiscoveryTransport>,
    config: DiscoveryConfig,
    dispatcher: EventDispatcher,
    selection: SelectedDevice,
    devices: Mutex<DeviceSet>,
    cycle: Mutex<CycleState>,
    transport_started: AtomicBool,
}

#[derive(Default)]
struct CycleState {
    last_id: u64,
    active: Option<ActiveCycle>,
}

struct ActiveCycle {
    id: u64,
    // Dropping the sender cancels the cycle.
    cancel: Option<Sender<()>>,
}

impl DiscoveryEngine {
    pub fn new(
        transport: Arc<dyn DiscoveryTransport>,
        dispatcher: EventDispatcher,
        selection: SelectedDevice,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(DiscoveryInner {
                transport,
                config,
                dispatcher,
                selection,
                devices: Mutex::new(DeviceSet::new()),
                cycle: Mutex::new(CycleState::default()),
                transport_started: AtomicBool::new(false),
            }),
        }
    }

    /// Installs `listener` and starts a search cycle unless one is running.
    ///
    /// `Started` is dispatched in both cases; the new listener replaces the
    /// previous one for every event submitted from now on.
    pub fn start_discovery<F>(&self, listener: F)
    where
        F: FnMut(DiscoveryEvent) + Send + 'static,
    {
        let mut cycle = self.inner.cycle.lock();

        // Swapped on the dispatcher thread: events queued before this call
        // still reach the previous listener.
        let dispatcher = self.inner.dispatcher.clone();
        self.inner.dispatcher.post(move || {
            dispatcher.set_discovery_listener(listener);
            vec![ControlEvent::Discovery(DiscoveryEvent::Started)]
        });

        let running = cycle
            .active
            .as_ref()
            .is_some_and(|active| active.cancel.is_some());
        if running {
            debug!("Discovery cycle already running, listener replaced");
            return;
        }

        cycle.last_id += 1;
        let id = cycle.last_id;
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let inner = Arc::clone(&self.inner);

        let spawned = thread::Builder::new()
            .name("dmc-discovery".into())
            .spawn(move || inner.run_cycle(id, cancel_rx));

        match spawned {
            Ok(_) => {
                cycle.active = Some(ActiveCycle {
                    id,
                    cancel: Some(cancel_tx),
                });
            }
            Err(err) => {
                error!(error = %err, "Cannot spawn discovery thread");
                self.inner.dispatcher.emit(DiscoveryEvent::Finished);
            }
        }
    }

    /// Cancels the running cycle, if any, and stops the transport.
    pub fn stop_discovery(&self) {
        {
            let mut cycle = self.inner.cycle.lock();
            if let Some(active) = cycle.active.as_mut() {
                if active.cancel.take().is_some() {
                    info!(cycle = active.id, "Cancelling discovery cycle");
                }
            }
        }
        self.inner.transport_started.store(false, Ordering::SeqCst);
        self.inner.transport.stop();
    }

    pub fn is_discovering(&self) -> bool {
        self.inner
            .cycle
            .lock()
            .active
            .as_ref()
            .is_some_and(|active| active.cancel.is_some())
    }

    pub fn devices(&self) -> Vec<Device> {
        self.inner.devices.lock().snapshot()
    }

    pub fn find_device(&self, udn: &str) -> Option<Device> {
        self.inner.devices.lock().get(udn).cloned()
    }

    /// Observer handed to the transport. Holds the engine weakly.
    pub fn observer(&self) -> Arc<dyn DeviceObserver> {
        Arc::new(EngineObserver(Arc::downgrade(&self.inner)))
    }
}

impl DiscoveryInner {
    fn run_cycle(self: Arc<Self>, id: u64, cancel: Receiver<()>) {
        let ticker = SearchTicker::new(self.config.search_budget, self.config.probe_interval, cancel);
        info!(
            cycle = id,
            budget_ms = self.config.search_budget.as_millis() as u64,
            "Discovery cycle started"
        );

        loop {
            if ticker.is_cancelled() {
                break;
            }

            if !self.transport_started.load(Ordering::SeqCst) {
                let observer: Arc<dyn DeviceObserver> =
                    Arc::new(EngineObserver(Arc::downgrade(&self)));
                if self.transport.start(observer) {
                    self.transport_started.store(true, Ordering::SeqCst);
                    debug!(cycle = id, "Discovery transport started");
                } else {
                    warn!(cycle = id, "Discovery transport did not start, will retry");
                }
            } else {
                match self.transport.search() {
                    Ok(()) => trace!(cycle = id, "Search probe sent"),
                    Err(ControlPointError::TransportClosed(reason)) => {
                        error!(cycle = id, %reason, "Discovery transport closed, ending cycle");
                        break;
                    }
                    Err(err) => warn!(cycle = id, error = %err, "Search probe failed"),
                }
            }

            if !ticker.wait_next() {
                break;
            }
        }

        info!(
            cycle = id,
            elapsed_ms = ticker.elapsed().as_millis() as u64,
            "Discovery cycle finished"
        );
        self.finish_cycle(id);
    }

    fn finish_cycle(&self, id: u64) {
        let mut cycle = self.cycle.lock();
        if cycle.active.as_ref().is_some_and(|active| active.id == id) {
            cycle.active = None;
            self.dispatcher.emit(DiscoveryEvent::Finished);
        } else {
            debug!(cycle = id, "Superseded discovery cycle ended");
        }
    }

    fn add_device(&self, device: Device) {
        if !device.is_of_type(&self.config.target_device_type) {
            trace!(
                udn = device.udn(),
                device_type = device.device_type(),
                "Ignoring device of another type"
            );
            return;
        }

        let mut devices = self.devices.lock();
        let udn = device.udn().to_string();
        let name = device.friendly_name().to_string();
        if !devices.insert(device) {
            trace!(udn = %udn, "Device already known");
            return;
        }
        info!(udn = %udn, name = %name, "MediaRenderer added");
        self.dispatcher
            .emit(DiscoveryEvent::DeviceListChanged(devices.snapshot()));
    }

    fn remove_device(&self, udn: &str) {
        let mut devices = self.devices.lock();
        let Some(removed) = devices.remove(udn) else {
            trace!(udn, "Removal of unknown device ignored");
            return;
        };
        info!(udn = removed.udn(), name = removed.friendly_name(), "MediaRenderer removed");
        self.dispatcher
            .emit(DiscoveryEvent::DeviceListChanged(devices.snapshot()));

        let selection = self.selection.clone();
        let udn = removed.udn().to_string();
        self.dispatcher.post(move || match selection.take_if(&udn) {
            Some(lost) => {
                warn!(udn = lost.udn(), "Selected device left the network");
                vec![ControlEvent::Discovery(DiscoveryEvent::SelectedDeviceLost(lost))]
            }
            None => Vec::new(),
        });
    }
}

struct EngineObserver(Weak<DiscoveryInner>);

impl DeviceObserver for EngineObserver {
    fn device_added(&self, device: Device) {
        if let Some(inner) = self.0.upgrade() {
            inner.add_device(device);
        }
    }

    fn device_removed(&self, udn: &str) {
        if let Some(inner) = self.0.upgrade() {
            inner.remove_device(udn);
        }
    }
}
