//! # dmcupnp
//!
//! Control-point side UPnP plumbing used by `dmccontrol`:
//!
//! - [`soap`] builds SOAP action requests and decodes action responses and
//!   faults (XML handled by `xmltree`).
//! - [`ssdp`] sends M-SEARCH probes and turns NOTIFY / search responses into
//!   [`ssdp::SsdpEvent`]s.
//!
//! Nothing here knows about renderers or playback; higher level semantics
//! live in `dmccontrol`.

pub mod soap;
pub mod ssdp;
