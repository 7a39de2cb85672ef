use std::collections::HashMap;
use std::time::Duration;

use dmcupnp::soap::{SoapParseError, build_soap_request, error_codes, parse_action_response};
use tracing::{debug, warn};
use ureq::Agent;

use crate::errors::ControlPointError;
use crate::gateway::ActionGateway;
use crate::model::Device;

/// [`ActionGateway`] speaking SOAP over HTTP.
pub struct SoapActionGateway {
    agent: Agent,
}

impl SoapActionGateway {
    pub fn new(timeout: Duration) -> Self {
        // 4xx/5xx must not become ureq errors: SOAP faults travel in HTTP 500 bodies.
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();

        Self {
            agent: config.into(),
        }
    }
}

impl ActionGateway for SoapActionGateway {
    fn invoke(
        &self,
        device: &Device,
        service_type: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, ControlPointError> {
        let service = device
            .service(service_type)
            .ok_or_else(|| ControlPointError::service_not_found(device, service_type))?;

        let body = build_soap_request(&service.service_type, action, args).map_err(|e| {
            ControlPointError::SoapAction(format!("{}: cannot build request: {}", action, e))
        })?;
        let soap_action_header = format!(r#""{}#{}""#, service.service_type, action);

        debug!(
            device = device.udn(),
            action,
            control_url = %service.control_url,
            "Invoking UPnP action"
        );

        let mut response = self
            .agent
            .post(&service.control_url)
            .header("Content-Type", r#"text/xml; charset="utf-8""#)
            .header("SOAPAction", &soap_action_header)
            .send(body)
            .map_err(|e| {
                ControlPointError::SoapAction(format!(
                    "{} on {}: {}",
                    action, service.control_url, e
                ))
            })?;

        let status = response.status().as_u16();
        let raw_body = response.body_mut().read_to_string().map_err(|e| {
            ControlPointError::SoapAction(format!("{}: cannot read response body: {}", action, e))
        })?;

        match parse_action_response(raw_body.as_bytes(), action) {
            Ok(values) if status < 300 => Ok(values),
            Ok(_) => Err(ControlPointError::SoapHttpStatus(action.to_string(), status)),
            Err(SoapParseError::Fault(fault)) => {
                warn!(device = device.udn(), action, %fault, "SOAP fault");
                let code = fault.upnp_code().unwrap_or_default().to_string();
                if code == error_codes::INVALID_ACTION {
                    return Err(ControlPointError::upnp_operation_not_supported(action, device));
                }
                let description = fault
                    .upnp_error
                    .as_ref()
                    .map(|e| e.error_description.clone())
                    .unwrap_or_else(|| fault.fault_string.clone());
                Err(ControlPointError::SoapFault {
                    action: action.to_string(),
                    code,
                    description,
                })
            }
            Err(_) if status >= 300 => {
                Err(ControlPointError::SoapHttpStatus(action.to_string(), status))
            }
            Err(err) => Err(ControlPointError::SoapAction(format!("{}: {}", action, err))),
        }
    }
}
