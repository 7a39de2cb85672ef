//! # SOAP module
//!
//! Client side of UPnP control: a control point sends a SOAP request to a
//! service `controlURL` and reads back either `<u:ActionResponse>` with the
//! out arguments, or a `<s:Fault>` carrying a `UPnPError`.
//!
//! ## Example
//!
//! ```
//! use dmcupnp::soap::{build_soap_request, build_soap_response, parse_action_response};
//!
//! let request = build_soap_request(
//!     "urn:schemas-upnp-org:service:AVTransport:1",
//!     "Play",
//!     &[("InstanceID", "0"), ("Speed", "1")],
//! )
//! .unwrap();
//! assert!(request.contains("<Speed>1</Speed>"));
//!
//! let response = build_soap_response(
//!     "urn:schemas-upnp-org:service:AVTransport:1",
//!     "GetMediaInfo",
//!     vec![("MediaDuration".to_string(), "0:03:12".to_string())],
//! )
//! .unwrap();
//! let values = parse_action_response(response.as_bytes(), "GetMediaInfo").unwrap();
//! assert_eq!(values.get("MediaDuration").map(String::as_str), Some("0:03:12"));
//! ```

mod builder;
mod envelope;
mod fault;
mod parser;

pub use builder::{build_soap_request, build_soap_response};
pub use envelope::{SoapBody, SoapEnvelope, SoapHeader};
pub use fault::{SoapFault, UpnpError};
pub use parser::{SoapParseError, parse_action_response, parse_soap_envelope};

/// Standard UPnP control error codes
pub mod error_codes {
    /// Invalid action
    pub const INVALID_ACTION: &str = "401";

    /// Invalid arguments
    pub const INVALID_ARGS: &str = "402";

    /// Action failed
    pub const ACTION_FAILED: &str = "501";

    /// Optional action not implemented
    pub const OPTIONAL_ACTION_NOT_IMPLEMENTED: &str = "602";

    /// Seek mode not supported (AVTransport)
    pub const SEEK_MODE_NOT_SUPPORTED: &str = "710";
}
