//! Control point for UPnP MediaRenderers.
//!
//! [`ControlPoint`] ties together three services:
//!
//! - [`DiscoveryEngine`] finds renderers through a [`DiscoveryTransport`]
//!   (SSDP by default) and reports [`DiscoveryEvent`]s;
//! - [`TransportController`] drives playback on a device through an
//!   [`ActionGateway`] (SOAP by default) and reports [`PlayerEvent`]s;
//! - [`EventDispatcher`] delivers both kinds of events, in order, on a
//!   single consumer thread.
//!
//! ```rust,ignore
//! use dmccontrol::ControlPoint;
//!
//! let config = dmcconfig::Config::load_config("")?;
//! let cp = ControlPoint::from_config(&config)?;
//! cp.start_discovery(|event| println!("{:?}", event));
//! ```

pub mod config_ext;
pub mod control_point;
pub mod controller;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod model;
pub mod provider;
pub mod selection;
pub mod soap_client;
pub mod time_utils;

pub use config_ext::ControlPointConfigExt;
pub use control_point::ControlPoint;
pub use controller::{Command, ControllerConfig, LocalPlayback, TransportController};
pub use discovery::{
    DeviceObserver, DeviceSet, DiscoveryConfig, DiscoveryEngine, DiscoveryTransport,
    SsdpDiscoveryTransport,
};
pub use errors::ControlPointError;
pub use events::{ControlEvent, EventDispatcher};
pub use gateway::ActionGateway;
pub use model::{
    AV_TRANSPORT_SERVICE, Device, DeviceId, DiscoveryEvent, MEDIA_RENDERER_DEVICE_TYPE,
    PlayerEvent, RENDERING_CONTROL_SERVICE, ServiceEndpoint, TransportState,
};
pub use provider::HttpXmlDescriptionProvider;
pub use selection::SelectedDevice;
pub use soap_client::SoapActionGateway;
