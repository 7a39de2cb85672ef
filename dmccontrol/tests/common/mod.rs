#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use parking_lot::Mutex;

use dmccontrol::{
    AV_TRANSPORT_SERVICE, ActionGateway, ControlPoint, ControlPointError, ControllerConfig,
    DeviceObserver, Device, DiscoveryConfig, DiscoveryEvent, DiscoveryTransport,
    MEDIA_RENDERER_DEVICE_TYPE, PlayerEvent, RENDERING_CONTROL_SERVICE, ServiceEndpoint,
};

pub const WAIT: Duration = Duration::from_secs(3);

const MUTATING_ACTIONS: &[&str] = &[
    "SetAVTransportURI",
    "Play",
    "Pause",
    "Stop",
    "Seek",
    "SetVolume",
    "SetMute",
];

pub fn renderer(udn: &str, name: &str) -> Device {
    Device::new(udn, name, MEDIA_RENDERER_DEVICE_TYPE)
        .with_service(ServiceEndpoint::new(
            AV_TRANSPORT_SERVICE,
            "http://127.0.0.1:1/avt",
        ))
        .with_service(ServiceEndpoint::new(
            RENDERING_CONTROL_SERVICE,
            "http://127.0.0.1:1/rc",
        ))
}

#[derive(Clone, Debug)]
pub struct Call {
    pub udn: String,
    pub service: String,
    pub action: String,
    pub args: Vec<(String, String)>,
}

impl Call {
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug)]
pub enum Reply {
    Values(Vec<(&'static str, String)>),
    Fail,
}

impl Reply {
    pub fn value(name: &'static str, value: &str) -> Self {
        Reply::Values(vec![(name, value.to_string())])
    }
}

/// In-memory gateway recording every invocation.
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<HashMap<String, Reply>>,
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    delays: Mutex<HashMap<String, Duration>>,
    // Per device: (mutating calls, queries) currently running.
    in_flight: Mutex<HashMap<String, (usize, usize)>>,
    overlapped: AtomicBool,
    query_overlapped: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reply used for every call to `action` unless a queued one exists.
    pub fn reply(&self, action: &str, reply: Reply) {
        self.replies.lock().insert(action.to_string(), reply);
    }

    /// One-shot reply for the next call to `action`.
    pub fn queue(&self, action: &str, reply: Reply) {
        self.queued
            .lock()
            .entry(action.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn delay(&self, action: &str, delay: Duration) {
        self.delays.lock().insert(action.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.action.clone()).collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.action == action).count()
    }

    pub fn mutating_calls_overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    /// True if a query ever ran while a mutating call was in flight on the
    /// same device.
    pub fn query_overlapped_mutation(&self) -> bool {
        self.query_overlapped.load(Ordering::SeqCst)
    }

    fn next_reply(&self, action: &str) -> Reply {
        if let Some(reply) = self
            .queued
            .lock()
            .get_mut(action)
            .and_then(|queue| queue.pop_front())
        {
            return reply;
        }
        self.replies
            .lock()
            .get(action)
            .cloned()
            .unwrap_or(Reply::Values(Vec::new()))
    }
}

impl ActionGateway for FakeGateway {
    fn invoke(
        &self,
        device: &Device,
        service_type: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, ControlPointError> {
        self.calls.lock().push(Call {
            udn: device.udn().to_string(),
            service: service_type.to_string(),
            action: action.to_string(),
            args: args
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        });

        let mutating = MUTATING_ACTIONS.contains(&action);
        let key = device.id().0;
        {
            let mut in_flight = self.in_flight.lock();
            let (mutations, queries) = in_flight.entry(key.clone()).or_default();
            if mutating {
                *mutations += 1;
                if *mutations > 1 {
                    self.overlapped.store(true, Ordering::SeqCst);
                }
                if *queries > 0 {
                    self.query_overlapped.store(true, Ordering::SeqCst);
                }
            } else {
                *queries += 1;
                if *mutations > 0 {
                    self.query_overlapped.store(true, Ordering::SeqCst);
                }
            }
        }

        let reply = self.next_reply(action);
        let delay = self.delays.lock().get(action).copied();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        if let Some((mutations, queries)) = self.in_flight.lock().get_mut(&key) {
            if mutating {
                *mutations -= 1;
            } else {
                *queries -= 1;
            }
        }

        match reply {
            Reply::Values(values) => Ok(values
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect()),
            Reply::Fail => Err(ControlPointError::SoapAction(format!("{} failed", action))),
        }
    }
}

/// In-memory discovery transport; tests announce devices through it.
#[derive(Default)]
pub struct FakeTransport {
    observer: Mutex<Option<Arc<dyn DeviceObserver>>>,
    pub starts: AtomicUsize,
    pub searches: AtomicUsize,
    pub stops: AtomicUsize,
    failing_starts: AtomicUsize,
    closed: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next `count` calls to `start` report failure.
    pub fn fail_starts(&self, count: usize) {
        self.failing_starts.store(count, Ordering::SeqCst);
    }

    /// Every subsequent search reports an unrecoverable failure.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn wait_started(&self) -> Arc<dyn DeviceObserver> {
        let deadline = Instant::now() + WAIT;
        loop {
            if let Some(observer) = self.observer.lock().clone() {
                return observer;
            }
            assert!(Instant::now() < deadline, "transport never started");
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn announce(&self, device: Device) {
        self.wait_started().device_added(device);
    }

    pub fn bye(&self, udn: &str) {
        self.wait_started().device_removed(udn);
    }
}

impl DiscoveryTransport for FakeTransport {
    fn start(&self, observer: Arc<dyn DeviceObserver>) -> bool {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_starts.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_starts.store(failing - 1, Ordering::SeqCst);
            return false;
        }
        *self.observer.lock() = Some(observer);
        true
    }

    fn search(&self) -> Result<(), ControlPointError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            return Err(ControlPointError::transport_closed("socket gone"));
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub cp: ControlPoint,
    pub gateway: Arc<FakeGateway>,
    pub transport: Arc<FakeTransport>,
}

pub fn fast_discovery() -> DiscoveryConfig {
    DiscoveryConfig {
        search_budget: Duration::from_millis(300),
        probe_interval: Duration::from_millis(20),
        ..DiscoveryConfig::default()
    }
}

pub fn fast_controller() -> ControllerConfig {
    ControllerConfig {
        poll_interval: Duration::from_millis(50),
        ..ControllerConfig::default()
    }
}

pub fn harness_with(discovery: DiscoveryConfig, controller: ControllerConfig) -> Harness {
    let gateway = FakeGateway::new();
    let transport = FakeTransport::new();
    let cp = ControlPoint::new(gateway.clone(), transport.clone(), discovery, controller)
        .expect("control point threads");
    Harness {
        cp,
        gateway,
        transport,
    }
}

pub fn harness() -> Harness {
    harness_with(fast_discovery(), fast_controller())
}

/// Gateway answers that make a full play sequence succeed.
pub fn healthy_renderer(gateway: &FakeGateway) {
    gateway.reply("GetMediaInfo", Reply::value("MediaDuration", "0:03:00"));
    gateway.reply(
        "GetVolumeDBRange",
        Reply::Values(vec![
            ("MinValue", "-6000".to_string()),
            ("MaxValue", "0".to_string()),
        ]),
    );
    gateway.reply("GetVolume", Reply::value("CurrentVolume", "35"));
    gateway.reply("GetMute", Reply::value("CurrentMute", "0"));
    gateway.reply("GetPositionInfo", Reply::value("AbsTime", "0:00:05"));
    gateway.reply(
        "GetTransportInfo",
        Reply::value("CurrentTransportState", "PLAYING"),
    );
}

pub fn player_events(cp: &ControlPoint) -> Receiver<PlayerEvent> {
    let (tx, rx) = unbounded();
    cp.set_player_monitor(move |event| {
        let _ = tx.send(event);
    });
    rx
}

pub fn discovery_events(cp: &ControlPoint) -> Receiver<DiscoveryEvent> {
    let (tx, rx) = unbounded();
    cp.start_discovery(move |event| {
        let _ = tx.send(event);
    });
    rx
}

/// Receives events until one matches `pred`, returning everything seen,
/// the matching event last.
pub fn recv_until<E, F>(rx: &Receiver<E>, mut pred: F) -> Vec<E>
where
    E: std::fmt::Debug,
    F: FnMut(&E) -> bool,
{
    let deadline = Instant::now() + WAIT;
    let mut seen = Vec::new();
    loop {
        match rx.recv_deadline(deadline) {
            Ok(event) => {
                let done = pred(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
            Err(_) => panic!("timed out waiting for event; received {:?}", seen),
        }
    }
}

/// Everything received during `window`.
pub fn drain_for<E>(rx: &Receiver<E>, window: Duration) -> Vec<E> {
    let deadline = Instant::now() + window;
    let mut seen = Vec::new();
    while let Ok(event) = rx.recv_deadline(deadline) {
        seen.push(event);
    }
    seen
}

pub fn wait_for<F: FnMut() -> bool>(mut condition: F) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        thread::sleep(Duration::from_millis(5));
    }
}
