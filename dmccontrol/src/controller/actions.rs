use std::collections::HashMap;

use tracing::{debug, trace};

use crate::errors::ControlPointError;
use crate::gateway::ActionGateway;
use crate::model::{AV_TRANSPORT_SERVICE, Device, RENDERING_CONTROL_SERVICE, TransportState};
use crate::time_utils::format_duration;

const MASTER_CHANNEL: &str = "Master";

/// AVTransport and RenderingControl exchanges against one device.
///
/// Every method blocks on the gateway; callers run them on a worker while
/// holding the device gate.
pub(crate) struct RendererActions<'a> {
    gateway: &'a dyn ActionGateway,
    device: &'a Device,
    instance_id: &'a str,
}

impl<'a> RendererActions<'a> {
    pub(crate) fn new(gateway: &'a dyn ActionGateway, device: &'a Device, instance_id: &'a str) -> Self {
        Self {
            gateway,
            device,
            instance_id,
        }
    }

    fn call(
        &self,
        service_type: &str,
        action: &str,
        extra: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, ControlPointError> {
        if !self.device.has_service(service_type) {
            return Err(ControlPointError::service_not_found(self.device, service_type));
        }
        let mut args = Vec::with_capacity(extra.len() + 1);
        args.push(("InstanceID", self.instance_id));
        args.extend_from_slice(extra);

        trace!(device = self.device.udn(), action, "Calling gateway");
        self.gateway.invoke(self.device, service_type, action, &args)
    }

    fn query(
        &self,
        service_type: &str,
        action: &str,
        extra: &[(&str, &str)],
        field: &str,
    ) -> Result<String, ControlPointError> {
        let mut values = self.call(service_type, action, extra)?;
        values
            .remove(field)
            .ok_or_else(|| ControlPointError::upnp_missing_return_value(field))
    }

    pub(crate) fn play(&self, uri: &str) -> Result<(), ControlPointError> {
        self.call(
            AV_TRANSPORT_SERVICE,
            "SetAVTransportURI",
            &[("CurrentURI", uri), ("CurrentURIMetaData", "")],
        )?;
        self.call(AV_TRANSPORT_SERVICE, "Play", &[("Speed", "1")])?;
        Ok(())
    }

    pub(crate) fn pause(&self) -> Result<(), ControlPointError> {
        self.call(AV_TRANSPORT_SERVICE, "Pause", &[]).map(|_| ())
    }

    pub(crate) fn stop(&self) -> Result<(), ControlPointError> {
        self.call(AV_TRANSPORT_SERVICE, "Stop", &[]).map(|_| ())
    }

    /// Seeks with `ABS_TIME`, falling back to `REL_TIME` when refused.
    pub(crate) fn seek(&self, seconds: u32) -> Result<(), ControlPointError> {
        let target = format_duration(seconds);
        match self.call(
            AV_TRANSPORT_SERVICE,
            "Seek",
            &[("Unit", "ABS_TIME"), ("Target", target.as_str())],
        ) {
            Ok(_) => Ok(()),
            Err(err) => {
                debug!(device = self.device.udn(), error = %err, "ABS_TIME seek refused, trying REL_TIME");
                self.call(
                    AV_TRANSPORT_SERVICE,
                    "Seek",
                    &[("Unit", "REL_TIME"), ("Target", target.as_str())],
                )
                .map(|_| ())
            }
        }
    }

    /// Seeks then plays. Only the `Play` outcome counts.
    pub(crate) fn resume(&self, seconds: u32) -> Result<(), ControlPointError> {
        if let Err(err) = self.seek(seconds) {
            debug!(device = self.device.udn(), error = %err, "Seek before resume failed");
        }
        self.call(AV_TRANSPORT_SERVICE, "Play", &[("Speed", "1")])
            .map(|_| ())
    }

    pub(crate) fn media_duration(&self) -> Result<String, ControlPointError> {
        self.query(AV_TRANSPORT_SERVICE, "GetMediaInfo", &[], "MediaDuration")
    }

    pub(crate) fn position(&self) -> Result<String, ControlPointError> {
        self.query(AV_TRANSPORT_SERVICE, "GetPositionInfo", &[], "AbsTime")
    }

    pub(crate) fn transport_state(&self) -> Result<TransportState, ControlPointError> {
        let state = self.query(
            AV_TRANSPORT_SERVICE,
            "GetTransportInfo",
            &[],
            "CurrentTransportState",
        )?;
        Ok(TransportState::parse(Some(state.trim())))
    }

    pub(crate) fn volume(&self) -> Result<u16, ControlPointError> {
        let raw = self.query(
            RENDERING_CONTROL_SERVICE,
            "GetVolume",
            &[("Channel", MASTER_CHANNEL)],
            "CurrentVolume",
        )?;
        raw.trim()
            .parse()
            .map_err(|_| ControlPointError::upnp_bad_return_value("CurrentVolume", &raw))
    }

    pub(crate) fn mute(&self) -> Result<bool, ControlPointError> {
        let raw = self.query(
            RENDERING_CONTROL_SERVICE,
            "GetMute",
            &[("Channel", MASTER_CHANNEL)],
            "CurrentMute",
        )?;
        match raw.trim() {
            "" => Err(ControlPointError::upnp_bad_return_value("CurrentMute", &raw)),
            value => Ok(value == "1" || value.eq_ignore_ascii_case("true")),
        }
    }

    /// Reads one bound of `GetVolumeDBRange` (`MinValue` or `MaxValue`).
    pub(crate) fn volume_db_bound(&self, field: &str) -> Result<i32, ControlPointError> {
        let raw = self.query(
            RENDERING_CONTROL_SERVICE,
            "GetVolumeDBRange",
            &[("Channel", MASTER_CHANNEL)],
            field,
        )?;
        raw.trim()
            .parse()
            .map_err(|_| ControlPointError::upnp_bad_return_value(field, &raw))
    }

    pub(crate) fn set_volume(&self, level: u16) -> Result<(), ControlPointError> {
        let level = level.to_string();
        self.call(
            RENDERING_CONTROL_SERVICE,
            "SetVolume",
            &[("Channel", MASTER_CHANNEL), ("DesiredVolume", level.as_str())],
        )
        .map(|_| ())
    }

    pub(crate) fn set_mute(&self, mute: bool) -> Result<(), ControlPointError> {
        let desired = if mute { "1" } else { "0" };
        self.call(
            RENDERING_CONTROL_SERVICE,
            "SetMute",
            &[("Channel", MASTER_CHANNEL), ("DesiredMute", desired)],
        )
        .map(|_| ())
    }
}
