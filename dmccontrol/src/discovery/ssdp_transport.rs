use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use dmcupnp::ssdp::{SsdpClient, SsdpEvent, extract_udn_from_usn};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::discovery::{DeviceObserver, DiscoveryTransport};
use crate::errors::ControlPointError;
use crate::provider::HttpXmlDescriptionProvider;

/// [`DiscoveryTransport`] over SSDP, fetching device descriptions with HTTP.
pub struct SsdpDiscoveryTransport {
    search_target: String,
    mx: u32,
    provider: Arc<HttpXmlDescriptionProvider>,
    state: Mutex<Option<Listening>>,
}

struct Listening {
    client: SsdpClient,
    running: Arc<AtomicBool>,
}

impl SsdpDiscoveryTransport {
    pub fn new(search_target: &str, mx: u32, provider: HttpXmlDescriptionProvider) -> Self {
        Self {
            search_target: search_target.to_string(),
            mx,
            provider: Arc::new(provider),
            state: Mutex::new(None),
        }
    }
}

impl DiscoveryTransport for SsdpDiscoveryTransport {
    fn start(&self, observer: Arc<dyn DeviceObserver>) -> bool {
        let mut state = self.state.lock();
        if state.is_some() {
            return true;
        }

        let client = match SsdpClient::new() {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "Cannot open SSDP socket");
                return false;
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let loop_client = client.clone();
        let loop_running = Arc::clone(&running);
        let provider = Arc::clone(&self.provider);

        let spawned = thread::Builder::new()
            .name("dmc-ssdp".into())
            .spawn(move || {
                let mut handler = SsdpHandler {
                    provider,
                    observer,
                    known: HashSet::new(),
                };
                loop_client.run_event_loop(&loop_running, |event| handler.handle(event));
                debug!("SSDP receive loop stopped");
            });

        if let Err(err) = spawned {
            warn!(error = %err, "Cannot spawn SSDP receive thread");
            return false;
        }

        if let Err(err) = client.send_msearch(&self.search_target, self.mx) {
            warn!(error = %err, "Initial M-SEARCH failed");
        }

        info!(st = %self.search_target, "SSDP discovery transport listening");
        *state = Some(Listening { client, running });
        true
    }

    fn search(&self) -> Result<(), ControlPointError> {
        let state = self.state.lock();
        let listening = state
            .as_ref()
            .ok_or_else(|| ControlPointError::transport_closed("SSDP transport is not running"))?;
        listening
            .client
            .send_msearch(&self.search_target, self.mx)
            .map_err(|e| ControlPointError::Ssdp(e.to_string()))
    }

    fn stop(&self) {
        if let Some(listening) = self.state.lock().take() {
            listening.running.store(false, Ordering::SeqCst);
            info!("SSDP discovery transport stopped");
        }
    }
}

struct SsdpHandler {
    provider: Arc<HttpXmlDescriptionProvider>,
    observer: Arc<dyn DeviceObserver>,
    // Lower-cased UDNs whose description was already fetched.
    known: HashSet<String>,
}

impl SsdpHandler {
    fn handle(&mut self, event: SsdpEvent) {
        let Some(udn) = extract_udn_from_usn(event.usn()) else {
            return;
        };
        let key = udn.to_ascii_lowercase();

        match event {
            SsdpEvent::Alive { location, .. } | SsdpEvent::SearchResponse { location, .. } => {
                if self.known.contains(&key) {
                    return;
                }
                match self.provider.fetch_device(&location) {
                    Ok(device) => {
                        self.known.insert(key);
                        self.observer.device_added(device);
                    }
                    Err(err) => {
                        warn!(udn = %udn, location = %location, error = %err, "Cannot fetch device description");
                    }
                }
            }
            SsdpEvent::ByeBye { .. } => {
                self.known.remove(&key);
                self.observer.device_removed(&udn);
            }
        }
    }
}
