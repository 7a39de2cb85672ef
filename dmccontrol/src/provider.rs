use std::io::{BufRead, BufReader};
use std::time::Duration;

use quick_xml::{Reader, events::Event};
use thiserror::Error;
use tracing::debug;
use ureq::Agent;
use url::Url;

use crate::errors::ControlPointError;
use crate::model::{Device, ServiceEndpoint};

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Missing required device element: {0}")]
    MissingField(&'static str),
}

impl From<DescriptionError> for ControlPointError {
    fn from(err: DescriptionError) -> Self {
        ControlPointError::Description(err.to_string())
    }
}

#[derive(Debug, Default)]
struct ParsedService {
    service_type: String,
    service_id: String,
    control_url: String,
    event_sub_url: String,
}

/// Fields of the root `<device>` only; embedded devices are skipped.
#[derive(Debug, Default)]
struct ParsedDeviceDescription {
    url_base: Option<String>,
    udn: Option<String>,
    device_type: Option<String>,
    friendly_name: Option<String>,
    manufacturer: Option<String>,
    model_name: Option<String>,
    services: Vec<ParsedService>,
}

/// Fetches `description.xml` documents and turns them into [`Device`]s.
pub struct HttpXmlDescriptionProvider {
    agent: Agent,
}

impl HttpXmlDescriptionProvider {
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();

        Self {
            agent: config.into(),
        }
    }

    pub fn fetch_device(&self, location: &str) -> Result<Device, DescriptionError> {
        debug!(location, "Fetching device description");
        let response = self.agent.get(location).call()?;
        let (_parts, body) = response.into_parts();
        parse_description(BufReader::new(body.into_reader()), location)
    }
}

/// Parses a UPnP device description.
///
/// Control and event URLs are resolved against `<URLBase>` when present,
/// otherwise against `location`.
pub fn parse_description<R: BufRead>(
    source: R,
    location: &str,
) -> Result<Device, DescriptionError> {
    let parsed = read_description(source)?;

    let udn = parsed.udn.ok_or(DescriptionError::MissingField("UDN"))?;
    let device_type = parsed
        .device_type
        .ok_or(DescriptionError::MissingField("deviceType"))?;
    let friendly_name = parsed.friendly_name.unwrap_or_else(|| udn.clone());
    let base = parsed.url_base.as_deref().unwrap_or(location);

    let mut device = Device::new(&udn, &friendly_name, &device_type)
        .with_location(location)
        .with_manufacturer(parsed.manufacturer.as_deref().unwrap_or_default())
        .with_model_name(parsed.model_name.as_deref().unwrap_or_default());

    for service in parsed.services {
        if service.service_type.is_empty() || service.control_url.is_empty() {
            continue;
        }
        device = device.with_service(ServiceEndpoint {
            control_url: resolve_url(base, &service.control_url),
            event_sub_url: if service.event_sub_url.is_empty() {
                String::new()
            } else {
                resolve_url(base, &service.event_sub_url)
            },
            service_type: service.service_type,
            service_id: service.service_id,
        });
    }

    Ok(device)
}

fn read_description<R: BufRead>(source: R) -> Result<ParsedDeviceDescription, DescriptionError> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut parsed = ParsedDeviceDescription::default();

    // Nesting level of <device>: 1 is the root device.
    let mut device_depth = 0usize;
    let mut current_service: Option<ParsedService> = None;
    let mut current_tag: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = local_name(e.name().as_ref());
                match name.as_str() {
                    "device" => device_depth += 1,
                    "service" if device_depth == 1 => {
                        current_service = Some(ParsedService::default());
                    }
                    _ => {}
                }
                current_tag = Some(name);
            }
            Event::End(e) => {
                let name = local_name(e.name().as_ref());
                match name.as_str() {
                    "device" => device_depth = device_depth.saturating_sub(1),
                    "service" if device_depth == 1 => {
                        if let Some(service) = current_service.take() {
                            parsed.services.push(service);
                        }
                    }
                    _ => {}
                }
                current_tag = None;
            }
            Event::Text(e) => {
                let Some(tag) = current_tag.as_deref() else {
                    buf.clear();
                    continue;
                };
                let text = e.decode().map_err(quick_xml::Error::Encoding)?.into_owned();

                if device_depth == 0 {
                    if tag == "URLBase" {
                        parsed.url_base = Some(text);
                    }
                } else if device_depth == 1 {
                    match (tag, current_service.as_mut()) {
                        ("serviceType", Some(service)) => service.service_type = text,
                        ("serviceId", Some(service)) => service.service_id = text,
                        ("controlURL", Some(service)) => service.control_url = text,
                        ("eventSubURL", Some(service)) => service.event_sub_url = text,
                        ("UDN", None) => parsed.udn = Some(text),
                        ("deviceType", None) => parsed.device_type = Some(text),
                        ("friendlyName", None) => parsed.friendly_name = Some(text),
                        ("manufacturer", None) => parsed.manufacturer = Some(text),
                        ("modelName", None) => parsed.model_name = Some(text),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    Ok(parsed)
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

fn resolve_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    match Url::parse(base).and_then(|base| base.join(path)) {
        Ok(url) => url.to_string(),
        Err(_) => path.to_string(),
    }
}
