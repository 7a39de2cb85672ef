use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dmcconfig::Config;
use tracing::info;

use crate::config_ext::ControlPointConfigExt;
use crate::controller::{ControllerConfig, TransportController};
use crate::discovery::{DiscoveryConfig, DiscoveryEngine, DiscoveryTransport, SsdpDiscoveryTransport};
use crate::events::EventDispatcher;
use crate::gateway::ActionGateway;
use crate::model::{Device, DiscoveryEvent, PlayerEvent};
use crate::provider::HttpXmlDescriptionProvider;
use crate::selection::SelectedDevice;
use crate::soap_client::SoapActionGateway;

/// Owns the event dispatcher, the discovery engine and the transport
/// controller, wired to one shared selection.
pub struct ControlPoint {
    dispatcher: EventDispatcher,
    discovery: DiscoveryEngine,
    controller: TransportController,
}

impl ControlPoint {
    pub fn new(
        gateway: Arc<dyn ActionGateway>,
        transport: Arc<dyn DiscoveryTransport>,
        discovery_config: DiscoveryConfig,
        controller_config: ControllerConfig,
    ) -> io::Result<Self> {
        let dispatcher = EventDispatcher::spawn()?;
        let selection = SelectedDevice::new();
        let controller = TransportController::new(
            gateway,
            dispatcher.clone(),
            selection.clone(),
            controller_config,
        )?;
        let discovery = DiscoveryEngine::new(transport, dispatcher.clone(), selection, discovery_config);

        Ok(Self {
            dispatcher,
            discovery,
            controller,
        })
    }

    /// Builds a control point speaking SOAP and SSDP on the local network.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.get_http_timeout_secs()?);
        let discovery_config = config.get_discovery_config()?;
        let controller_config = config.get_controller_config()?;
        let mx = config.get_search_mx()?;

        info!(
            target_device_type = %discovery_config.target_device_type,
            http_timeout_secs = timeout.as_secs(),
            "Building control point"
        );

        let gateway = Arc::new(SoapActionGateway::new(timeout));
        let transport = Arc::new(SsdpDiscoveryTransport::new(
            &discovery_config.target_device_type,
            mx,
            HttpXmlDescriptionProvider::new(timeout),
        ));

        Self::new(gateway, transport, discovery_config, controller_config)
            .context("Failed to start control point threads")
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn discovery(&self) -> &DiscoveryEngine {
        &self.discovery
    }

    pub fn controller(&self) -> &TransportController {
        &self.controller
    }

    pub fn start_discovery<F>(&self, listener: F)
    where
        F: FnMut(DiscoveryEvent) + Send + 'static,
    {
        self.discovery.start_discovery(listener);
    }

    pub fn stop_discovery(&self) {
        self.discovery.stop_discovery();
    }

    pub fn set_player_monitor<F>(&self, monitor: F)
    where
        F: FnMut(PlayerEvent) + Send + 'static,
    {
        self.controller.set_player_monitor(monitor);
    }

    pub fn devices(&self) -> Vec<Device> {
        self.discovery.devices()
    }

    /// Selects a known device by UDN. Returns the device, or `None` if
    /// discovery has not seen it.
    pub fn select_device_by_udn(&self, udn: &str) -> Option<Device> {
        let device = self.discovery.find_device(udn)?;
        self.controller.select_device(Some(device.clone()));
        Some(device)
    }

    pub fn selected_device(&self) -> Option<Device> {
        self.controller.selected_device()
    }
}
