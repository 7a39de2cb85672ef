use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::model::{DiscoveryEvent, PlayerEvent};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    Player(PlayerEvent),
    Discovery(DiscoveryEvent),
}

impl From<PlayerEvent> for ControlEvent {
    fn from(event: PlayerEvent) -> Self {
        ControlEvent::Player(event)
    }
}

impl From<DiscoveryEvent> for ControlEvent {
    fn from(event: DiscoveryEvent) -> Self {
        ControlEvent::Discovery(event)
    }
}

/// Closure run on the consumer thread; the events it returns are delivered
/// right after it, before anything queued later.
pub(crate) type ConsumerTask = Box<dyn FnOnce() -> Vec<ControlEvent> + Send>;

enum Envelope {
    Event(ControlEvent),
    Task(ConsumerTask),
}

type Handler<E> = Box<dyn FnMut(E) + Send>;

struct HandlerSlot<E> {
    generation: u64,
    handler: Option<Handler<E>>,
}

impl<E> HandlerSlot<E> {
    fn new() -> Self {
        Self {
            generation: 0,
            handler: None,
        }
    }

    fn replace(&mut self, handler: Option<Handler<E>>) {
        self.generation += 1;
        self.handler = handler;
    }
}

type Slot<E> = Arc<Mutex<HandlerSlot<E>>>;

/// Single consumer thread delivering player and discovery events in
/// submission order.
///
/// Submission never blocks. Events arriving while no handler is registered
/// are dropped, and registering a handler does not replay them.
#[derive(Clone)]
pub struct EventDispatcher {
    tx: Sender<Envelope>,
    monitor: Slot<PlayerEvent>,
    listener: Slot<DiscoveryEvent>,
}

impl EventDispatcher {
    /// Spawns the consumer thread. It exits once every clone is dropped.
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = unbounded::<Envelope>();
        let monitor: Slot<PlayerEvent> = Arc::new(Mutex::new(HandlerSlot::new()));
        let listener: Slot<DiscoveryEvent> = Arc::new(Mutex::new(HandlerSlot::new()));

        let consumer = Consumer {
            monitor: Arc::clone(&monitor),
            listener: Arc::clone(&listener),
        };
        thread::Builder::new()
            .name("dmc-event-dispatch".into())
            .spawn(move || consumer.run(rx))?;

        Ok(Self {
            tx,
            monitor,
            listener,
        })
    }

    pub fn set_player_monitor<F>(&self, monitor: F)
    where
        F: FnMut(PlayerEvent) + Send + 'static,
    {
        self.monitor.lock().replace(Some(Box::new(monitor)));
    }

    pub fn clear_player_monitor(&self) {
        self.monitor.lock().replace(None);
    }

    pub fn set_discovery_listener<F>(&self, listener: F)
    where
        F: FnMut(DiscoveryEvent) + Send + 'static,
    {
        self.listener.lock().replace(Some(Box::new(listener)));
    }

    pub fn clear_discovery_listener(&self) {
        self.listener.lock().replace(None);
    }

    pub fn emit(&self, event: impl Into<ControlEvent>) {
        if self.tx.send(Envelope::Event(event.into())).is_err() {
            warn!("Event dispatcher is gone, dropping event");
        }
    }

    pub(crate) fn post<F>(&self, task: F)
    where
        F: FnOnce() -> Vec<ControlEvent> + Send + 'static,
    {
        if self.tx.send(Envelope::Task(Box::new(task))).is_err() {
            warn!("Event dispatcher is gone, dropping consumer task");
        }
    }
}

struct Consumer {
    monitor: Slot<PlayerEvent>,
    listener: Slot<DiscoveryEvent>,
}

impl Consumer {
    fn run(self, rx: Receiver<Envelope>) {
        debug!("Event dispatcher started");
        for envelope in rx.iter() {
            match envelope {
                Envelope::Event(event) => self.deliver(event),
                Envelope::Task(task) => match catch_unwind(AssertUnwindSafe(task)) {
                    Ok(events) => {
                        for event in events {
                            self.deliver(event);
                        }
                    }
                    Err(_) => error!("Consumer task panicked"),
                },
            }
        }
        debug!("Event dispatcher stopped");
    }

    fn deliver(&self, event: ControlEvent) {
        match event {
            ControlEvent::Player(event) => call_handler(&self.monitor, event),
            ControlEvent::Discovery(event) => call_handler(&self.listener, event),
        }
    }
}

// The handler is taken out of its slot while it runs so it may register a
// replacement; it is put back only if the slot was not touched meanwhile.
// A handler that panics stays registered.
fn call_handler<E: std::fmt::Debug>(slot: &Slot<E>, event: E) {
    let (generation, handler) = {
        let mut slot = slot.lock();
        (slot.generation, slot.handler.take())
    };

    let Some(mut handler) = handler else {
        trace!(?event, "No handler registered, dropping event");
        return;
    };

    if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
        error!("Event handler panicked");
    }

    let mut slot = slot.lock();
    if slot.generation == generation && slot.handler.is_none() {
        slot.handler = Some(handler);
    }
}
