use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, trace};

use crate::model::Device;

struct Schedule {
    device: Device,
    generation: u64,
    delay: Duration,
}

/// Handle on the progress poll loop.
///
/// Every start or cancel bumps a generation counter. A tick, or a tick
/// result, carrying an older generation is dropped, so at most one loop is
/// ever live and cancelling never waits for an in-flight query.
pub(crate) struct ProgressPoller {
    tx: Sender<Schedule>,
    generation: Arc<AtomicU64>,
    interval: Duration,
}

/// Timer half of the poller, consumed by [`PollTimer::spawn`].
pub(crate) struct PollTimer {
    rx: Receiver<Schedule>,
    generation: Arc<AtomicU64>,
}

impl ProgressPoller {
    pub(crate) fn new(interval: Duration) -> (Self, PollTimer) {
        let (tx, rx) = unbounded();
        let generation = Arc::new(AtomicU64::new(0));
        let poller = Self {
            tx,
            generation: Arc::clone(&generation),
            interval,
        };
        (poller, PollTimer { rx, generation })
    }

    /// Starts a new loop on `device`, superseding any previous one. The first
    /// tick fires immediately.
    pub(crate) fn start(&self, device: Device) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(device = device.udn(), generation, "Starting progress polling");
        self.schedule(device, generation, Duration::ZERO);
        generation
    }

    /// Schedules the next tick of loop `generation`, one interval from now.
    pub(crate) fn rearm(&self, device: Device, generation: u64) {
        if self.is_current(generation) {
            self.schedule(device, generation, self.interval);
        }
    }

    pub(crate) fn cancel(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(generation, "Progress polling cancelled");
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn schedule(&self, device: Device, generation: u64, delay: Duration) {
        let _ = self.tx.send(Schedule {
            device,
            generation,
            delay,
        });
    }
}

impl PollTimer {
    /// Runs the timer thread. `on_tick` must not block: it only hands the
    /// position query to a worker.
    pub(crate) fn spawn<F>(self, mut on_tick: F) -> io::Result<()>
    where
        F: FnMut(Device, u64) + Send + 'static,
    {
        thread::Builder::new()
            .name("dmc-progress-poll".into())
            .spawn(move || {
                let mut pending: Option<(Instant, Device, u64)> = None;
                loop {
                    let next = match &pending {
                        Some((deadline, _, _)) => self.rx.recv_deadline(*deadline),
                        None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };

                    match next {
                        Ok(schedule) => {
                            let deadline = Instant::now() + schedule.delay;
                            pending = Some((deadline, schedule.device, schedule.generation));
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if let Some((_, device, generation)) = pending.take() {
                                if self.generation.load(Ordering::SeqCst) == generation {
                                    on_tick(device, generation);
                                } else {
                                    trace!(generation, "Dropping stale poll tick");
                                }
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Progress poll timer stopped");
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MEDIA_RENDERER_DEVICE_TYPE;

    fn device() -> Device {
        Device::new("uuid:poll", "poll", MEDIA_RENDERER_DEVICE_TYPE)
    }

    #[test]
    fn start_ticks_immediately_and_cancel_drops_rearm() {
        let (poller, timer) = ProgressPoller::new(Duration::from_millis(50));
        let (tx, rx) = unbounded();
        timer
            .spawn(move |_device, generation| {
                let _ = tx.send(generation);
            })
            .unwrap();

        let generation = poller.start(device());
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), generation);

        poller.rearm(device(), generation);
        poller.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(!poller.is_current(generation));

        // Rearming a cancelled loop is a no-op.
        poller.rearm(device(), generation);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn restart_supersedes_previous_loop() {
        let (poller, timer) = ProgressPoller::new(Duration::from_millis(30));
        let (tx, rx) = unbounded();
        timer
            .spawn(move |_device, generation| {
                let _ = tx.send(generation);
            })
            .unwrap();

        let first = poller.start(device());
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), first);
        poller.rearm(device(), first);
        let second = poller.start(device());

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), second);
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
    }
}
