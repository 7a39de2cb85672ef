//! Parsing of SOAP action responses

use super::{SoapBody, SoapEnvelope, SoapFault, SoapHeader};
use std::collections::HashMap;
use std::io::BufReader;
use xmltree::Element;

/// SOAP response decoding error
#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    XmlError(#[from] xmltree::ParseError),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,

    #[error("Missing {0}Response element in SOAP Body")]
    MissingResponse(String),

    #[error("SOAP fault: {0}")]
    Fault(SoapFault),
}

/// Parses a complete SOAP envelope.
pub fn parse_soap_envelope(xml: &[u8]) -> Result<SoapEnvelope, SoapParseError> {
    let reader = BufReader::new(xml);
    let root = Element::parse(reader)?;

    if !root.name.ends_with("Envelope") {
        return Err(SoapParseError::MissingEnvelope);
    }

    let header = root
        .children
        .iter()
        .find_map(|n| n.as_element().filter(|e| e.name.ends_with("Header")))
        .map(|e| SoapHeader { content: e.clone() });

    let body_elem = root
        .children
        .iter()
        .find_map(|n| n.as_element().filter(|e| e.name.ends_with("Body")))
        .ok_or(SoapParseError::MissingBody)?;

    Ok(SoapEnvelope {
        header,
        body: SoapBody {
            content: body_elem.clone(),
        },
    })
}

/// Extracts the out arguments of `action` from a SOAP response body.
///
/// A `<s:Fault>` in the body is reported as [`SoapParseError::Fault`].
/// Empty arguments are kept as empty strings.
pub fn parse_action_response(
    xml: &[u8],
    action: &str,
) -> Result<HashMap<String, String>, SoapParseError> {
    let envelope = parse_soap_envelope(xml)?;
    let first = envelope
        .first_body_element()
        .ok_or_else(|| SoapParseError::MissingResponse(action.to_string()))?;

    if let Some(fault) = SoapFault::from_element(first) {
        return Err(SoapParseError::Fault(fault));
    }

    let expected = format!("{}Response", action);
    if !first.name.ends_with(&expected) {
        return Err(SoapParseError::MissingResponse(action.to_string()));
    }

    let mut values = HashMap::new();
    for child in &first.children {
        if let Some(elem) = child.as_element() {
            let value = elem
                .get_text()
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            values.insert(elem.name.clone(), value);
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position_info_response() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:GetPositionInfoResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1">
      <Track>1</Track>
      <TrackDuration>0:04:10</TrackDuration>
      <TrackMetaData></TrackMetaData>
      <RelTime>0:01:02</RelTime>
      <AbsTime>NOT_IMPLEMENTED</AbsTime>
    </u:GetPositionInfoResponse>
  </s:Body>
</s:Envelope>"#;

        let values = parse_action_response(xml.as_bytes(), "GetPositionInfo").unwrap();
        assert_eq!(values.get("RelTime").map(String::as_str), Some("0:01:02"));
        assert_eq!(values.get("AbsTime").map(String::as_str), Some("NOT_IMPLEMENTED"));
        assert_eq!(values.get("TrackMetaData").map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_fault() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <s:Fault>
      <faultcode>s:Client</faultcode>
      <faultstring>UPnPError</faultstring>
      <detail>
        <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
          <errorCode>401</errorCode>
          <errorDescription>Invalid Action</errorDescription>
        </UPnPError>
      </detail>
    </s:Fault>
  </s:Body>
</s:Envelope>"#;

        match parse_action_response(xml.as_bytes(), "Seek") {
            Err(SoapParseError::Fault(fault)) => {
                assert_eq!(fault.fault_code, "s:Client");
                assert_eq!(fault.upnp_code(), Some("401"));
            }
            other => panic!("expected fault, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_response_element() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:StopResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1"/>
  </s:Body>
</s:Envelope>"#;

        assert!(matches!(
            parse_action_response(xml.as_bytes(), "Play"),
            Err(SoapParseError::MissingResponse(_))
        ));
    }

    #[test]
    fn test_not_an_envelope() {
        assert!(matches!(
            parse_soap_envelope(b"<html><body/></html>"),
            Err(SoapParseError::MissingEnvelope)
        ));
    }
}
