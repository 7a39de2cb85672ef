use std::fmt;

pub const MEDIA_RENDERER_DEVICE_TYPE: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";
pub const AV_TRANSPORT_SERVICE: &str = "urn:schemas-upnp-org:service:AVTransport:1";
pub const RENDERING_CONTROL_SERVICE: &str = "urn:schemas-upnp-org:service:RenderingControl:1";

/// Case-insensitive key derived from a UDN.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn from_udn(udn: &str) -> Self {
        DeviceId(udn.trim().to_ascii_lowercase())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One `<service>` entry of a device description, with absolute URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub service_type: String,
    pub service_id: String,
    pub control_url: String,
    pub event_sub_url: String,
}

impl ServiceEndpoint {
    pub fn new(service_type: &str, control_url: &str) -> Self {
        Self {
            service_type: service_type.to_string(),
            service_id: String::new(),
            control_url: control_url.to_string(),
            event_sub_url: String::new(),
        }
    }
}

/// A UPnP device as seen by the control point.
///
/// Devices are immutable once observed: a renderer that changes its
/// description is expected to leave and re-announce itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    udn: String,
    friendly_name: String,
    device_type: String,
    location: String,
    manufacturer: String,
    model_name: String,
    services: Vec<ServiceEndpoint>,
}

impl Device {
    pub fn new(udn: &str, friendly_name: &str, device_type: &str) -> Self {
        Self {
            udn: udn.to_string(),
            friendly_name: friendly_name.to_string(),
            device_type: device_type.to_string(),
            location: String::new(),
            manufacturer: String::new(),
            model_name: String::new(),
            services: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: &str) -> Self {
        self.manufacturer = manufacturer.to_string();
        self
    }

    pub fn with_model_name(mut self, model_name: &str) -> Self {
        self.model_name = model_name.to_string();
        self
    }

    pub fn with_service(mut self, service: ServiceEndpoint) -> Self {
        self.services.push(service);
        self
    }

    pub fn id(&self) -> DeviceId {
        DeviceId::from_udn(&self.udn)
    }

    pub fn udn(&self) -> &str {
        &self.udn
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn services(&self) -> &[ServiceEndpoint] {
        &self.services
    }

    /// Looks up a service by its type URN, ignoring ASCII case.
    pub fn service(&self, service_type: &str) -> Option<&ServiceEndpoint> {
        self.services
            .iter()
            .find(|s| s.service_type.eq_ignore_ascii_case(service_type))
    }

    pub fn has_service(&self, service_type: &str) -> bool {
        self.service(service_type).is_some()
    }

    pub fn is_of_type(&self, device_type: &str) -> bool {
        self.device_type.eq_ignore_ascii_case(device_type)
    }

    pub fn has_udn(&self, udn: &str) -> bool {
        self.udn.trim().eq_ignore_ascii_case(udn.trim())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.friendly_name, self.udn)
    }
}

/// Remote transport state as reported by `GetTransportInfo`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Transitioning,
    PausedPlayback,
    PausedRecording,
    Recording,
    NoMediaPresent,
    /// Absent or unrecognised value; carries the raw string.
    Error(String),
}

impl TransportState {
    /// Maps a `CurrentTransportState` value. Matching is exact.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("STOPPED") => TransportState::Stopped,
            Some("PLAYING") => TransportState::Playing,
            Some("TRANSITIONING") => TransportState::Transitioning,
            Some("PAUSED_PLAYBACK") => TransportState::PausedPlayback,
            Some("PAUSED_RECORDING") => TransportState::PausedRecording,
            Some("RECORDING") => TransportState::Recording,
            Some("NO_MEDIA_PRESENT") => TransportState::NoMediaPresent,
            Some(other) => TransportState::Error(other.to_string()),
            None => TransportState::Error(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransportState::Stopped => "STOPPED",
            TransportState::Playing => "PLAYING",
            TransportState::Transitioning => "TRANSITIONING",
            TransportState::PausedPlayback => "PAUSED_PLAYBACK",
            TransportState::PausedRecording => "PAUSED_RECORDING",
            TransportState::Recording => "RECORDING",
            TransportState::NoMediaPresent => "NO_MEDIA_PRESENT",
            TransportState::Error(raw) => raw,
        }
    }

    /// True for the states that mean the renderer has nothing left to play.
    pub fn is_idle(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::NoMediaPresent)
    }
}

/// Playback notifications delivered to the player monitor.
///
/// Seconds values of `-1` mean the renderer does not implement the query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    Preparing,
    DurationKnown(i64),
    MaxVolumeKnown(i32),
    MinVolumeKnown(i32),
    MuteChanged(bool),
    VolumeChanged(u16),
    Playing,
    Paused,
    Stopped,
    Error {
        command: &'static str,
        reason: String,
    },
    ProgressUpdated(i64),
    SeekCompleted,
    Completed,
    PlayItemChanged,
    TransportStateKnown(TransportState),
}

/// Notifications delivered to the discovery listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Started,
    DeviceListChanged(Vec<Device>),
    Finished,
    SelectedDeviceLost(Device),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> Device {
        Device::new("uuid:ABC-123", "Living Room", MEDIA_RENDERER_DEVICE_TYPE).with_service(
            ServiceEndpoint::new(AV_TRANSPORT_SERVICE, "http://10.0.0.2/avt/control"),
        )
    }

    #[test]
    fn udn_comparison_ignores_case() {
        let device = renderer();
        assert!(device.has_udn("UUID:abc-123"));
        assert_eq!(device.id(), DeviceId::from_udn("uuid:abc-123"));
    }

    #[test]
    fn service_lookup_ignores_case() {
        let device = renderer();
        assert!(device.has_service("urn:schemas-upnp-org:service:avtransport:1"));
        assert!(!device.has_service(RENDERING_CONTROL_SERVICE));
    }

    #[test]
    fn transport_state_mapping_is_exact() {
        assert_eq!(TransportState::parse(Some("PLAYING")), TransportState::Playing);
        assert_eq!(
            TransportState::parse(Some("NO_MEDIA_PRESENT")),
            TransportState::NoMediaPresent
        );
        assert_eq!(
            TransportState::parse(Some("playing")),
            TransportState::Error("playing".into())
        );
        assert_eq!(TransportState::parse(None), TransportState::Error(String::new()));
        assert!(TransportState::Stopped.is_idle());
        assert!(!TransportState::Transitioning.is_idle());
    }
}
