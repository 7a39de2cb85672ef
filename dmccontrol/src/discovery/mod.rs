//! MediaRenderer discovery.
//!
//! [`DiscoveryEngine`] runs bounded search cycles over a
//! [`DiscoveryTransport`] and keeps the set of known renderers. Changes are
//! reported as [`DiscoveryEvent`](crate::model::DiscoveryEvent)s through the
//! event dispatcher.

mod device_set;
mod engine;
mod ssdp_transport;
mod ticker;

use std::sync::Arc;
use std::time::Duration;

use crate::errors::ControlPointError;
use crate::model::{Device, MEDIA_RENDERER_DEVICE_TYPE};

pub use device_set::DeviceSet;
pub use engine::DiscoveryEngine;
pub use ssdp_transport::SsdpDiscoveryTransport;
pub use ticker::SearchTicker;

/// Receives device arrivals and departures from a transport, on any thread.
pub trait DeviceObserver: Send + Sync {
    fn device_added(&self, device: Device);
    fn device_removed(&self, udn: &str);
}

/// Network side of discovery.
pub trait DiscoveryTransport: Send + Sync {
    /// Starts listening. Returns `false` if the transport could not start;
    /// the engine retries on the next probe.
    fn start(&self, observer: Arc<dyn DeviceObserver>) -> bool;

    /// Sends one search probe.
    ///
    /// [`ControlPointError::TransportClosed`] ends the current search cycle;
    /// any other error is logged and the cycle keeps probing.
    fn search(&self) -> Result<(), ControlPointError>;

    /// Stops listening. Must be safe to call when not started.
    fn stop(&self);
}

#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    pub target_device_type: String,
    pub search_budget: Duration,
    pub probe_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target_device_type: MEDIA_RENDERER_DEVICE_TYPE.to_string(),
            search_budget: Duration::from_millis(5000),
            probe_interval: Duration::from_millis(300),
        }
    }
}
