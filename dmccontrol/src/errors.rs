use thiserror::Error;

use crate::model::Device;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlPointError {
    #[error("Device {device} does not expose service {service}")]
    ServiceNotFound { device: String, service: String },
    #[error("Empty media URI")]
    EmptyUri,
    #[error("Operation '{0}' is not supported by {1}")]
    UpnpOperationNotSupported(String, String),
    #[error("Missing {0} element in SOAP body")]
    UpnpMissingReturnValue(String),
    #[error("Invalid {0} value: {1}")]
    UpnpBadReturnValue(String, String),
    #[error("{action} returned UPnP error {code}: {description}")]
    SoapFault {
        action: String,
        code: String,
        description: String,
    },
    #[error("{0} failed with HTTP status {1}")]
    SoapHttpStatus(String, u16),
    #[error("Soap Error: Upnp action call {0}")]
    SoapAction(String),
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),
    #[error("Device description error: {0}")]
    Description(String),
    #[error("SSDP Error: {0}")]
    Ssdp(String),
    #[error("Discovery transport closed: {0}")]
    TransportClosed(String),
}

impl ControlPointError {
    pub fn service_not_found(device: &Device, service: &str) -> Self {
        ControlPointError::ServiceNotFound {
            device: device.udn().to_string(),
            service: service.to_string(),
        }
    }

    pub fn upnp_operation_not_supported(operation: &str, device: &Device) -> Self {
        ControlPointError::UpnpOperationNotSupported(
            operation.to_string(),
            device.friendly_name().to_string(),
        )
    }

    pub fn upnp_missing_return_value(value: &str) -> Self {
        ControlPointError::UpnpMissingReturnValue(value.to_string())
    }

    pub fn upnp_bad_return_value(name: &str, value: &str) -> Self {
        ControlPointError::UpnpBadReturnValue(name.to_string(), value.to_string())
    }

    pub fn transport_closed(reason: &str) -> Self {
        ControlPointError::TransportClosed(reason.to_string())
    }
}
