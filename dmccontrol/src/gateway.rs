use std::collections::HashMap;

use crate::errors::ControlPointError;
use crate::model::Device;

/// Invokes a UPnP action on one service of a device.
///
/// Any `Err` is a failed invocation, whatever the cause: missing service or
/// action, HTTP or socket failure, SOAP fault. Callers do not branch on the
/// variant beyond reporting it.
pub trait ActionGateway: Send + Sync {
    fn invoke(
        &self,
        device: &Device,
        service_type: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, ControlPointError>;
}
