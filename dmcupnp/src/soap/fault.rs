//! SOAP faults returned by UPnP services

use xmltree::Element;

/// SOAP fault as sent back by a renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// Fault code (e.g. "s:Client")
    pub fault_code: String,

    /// Fault description (usually "UPnPError")
    pub fault_string: String,

    /// UPnP specific error details, when present
    pub upnp_error: Option<UpnpError>,
}

/// `<UPnPError>` block nested in the fault detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpError {
    /// UPnP error code (e.g. "401", "701")
    pub error_code: String,

    pub error_description: String,
}

impl SoapFault {
    /// UPnP error code if the fault carries one.
    pub fn upnp_code(&self) -> Option<&str> {
        self.upnp_error.as_ref().map(|e| e.error_code.as_str())
    }

    /// Reads a fault from a `<s:Fault>` element.
    ///
    /// Returns `None` if the element is not a fault.
    pub fn from_element(elem: &Element) -> Option<Self> {
        if !elem.name.ends_with("Fault") {
            return None;
        }

        let upnp_error = child_by_suffix(elem, "detail")
            .and_then(|detail| child_by_suffix(detail, "UPnPError"))
            .map(|err| UpnpError {
                error_code: child_text(err, "errorCode"),
                error_description: child_text(err, "errorDescription"),
            });

        Some(SoapFault {
            fault_code: child_text(elem, "faultcode"),
            fault_string: child_text(elem, "faultstring"),
            upnp_error,
        })
    }
}

impl std::fmt::Display for SoapFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.upnp_error {
            Some(err) => write!(
                f,
                "{} ({}): UPnP error {} {}",
                self.fault_code, self.fault_string, err.error_code, err.error_description
            ),
            None => write!(f, "{} ({})", self.fault_code, self.fault_string),
        }
    }
}

fn child_by_suffix<'a>(parent: &'a Element, suffix: &str) -> Option<&'a Element> {
    parent
        .children
        .iter()
        .find_map(|n| n.as_element().filter(|e| e.name.ends_with(suffix)))
}

fn child_text(parent: &Element, suffix: &str) -> String {
    child_by_suffix(parent, suffix)
        .and_then(|e| e.get_text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}
