//! SOAP request construction

use xmltree::{Element, XMLNode};

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";

fn build_soap_envelope_with_body(body_child: Element) -> Result<String, xmltree::Error> {
    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(body_child));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope
        .attributes
        .insert("s:encodingStyle".to_string(), SOAP_ENCODING_NS.to_string());
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = xmltree::EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(false);
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn action_element(name: String, service_urn: &str, args: impl Iterator<Item = (String, String)>) -> Element {
    let mut elem = Element::new(&name);
    elem.attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (key, value) in args {
        let mut child = Element::new(&key);
        child.children.push(XMLNode::Text(value));
        elem.children.push(XMLNode::Element(child));
    }

    elem
}

/// Builds the SOAP request body for a UPnP action.
///
/// Argument order is preserved: some renderers reject requests whose
/// arguments are not in the order declared by the service description.
pub fn build_soap_request(
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, xmltree::Error> {
    let request = action_element(
        format!("u:{}", action),
        service_urn,
        args.iter().map(|(k, v)| (k.to_string(), v.to_string())),
    );
    build_soap_envelope_with_body(request)
}

/// Builds a SOAP action response, as a renderer would send it.
///
/// The control point never answers actions; this is used to feed fake
/// renderers and parser tests with well-formed responses.
pub fn build_soap_response(
    service_urn: &str,
    action: &str,
    values: Vec<(String, String)>,
) -> Result<String, xmltree::Error> {
    let response = action_element(
        format!("u:{}Response", action),
        service_urn,
        values.into_iter(),
    );
    build_soap_envelope_with_body(response)
}
