use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{error, trace, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named threads running blocking gateway calls.
pub(crate) struct WorkerPool {
    tx: Sender<Job>,
}

impl WorkerPool {
    pub(crate) fn spawn(name: &str, size: usize) -> io::Result<Self> {
        let (tx, rx) = unbounded::<Job>();
        for index in 0..size.max(1) {
            let rx = rx.clone();
            thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || worker_loop(rx))?;
        }
        Ok(Self { tx })
    }

    pub(crate) fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Box::new(job)).is_err() {
            warn!("Worker pool is gone, dropping job");
        }
    }
}

fn worker_loop(rx: Receiver<Job>) {
    for job in rx.iter() {
        // A panicking gateway must not take the worker down with it.
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("Worker job panicked");
        }
    }
    trace!("Worker exiting");
}
