//! # SSDP module - Simple Service Discovery Protocol
//!
//! Control point side only: the client sends `M-SEARCH` probes to the SSDP
//! multicast group and decodes the unicast `HTTP/1.1 200 OK` answers as well
//! as `NOTIFY` announcements received on the group.
//!
//! - **Multicast address**: 239.255.255.250:1900
//! - **Default max-age**: 1800 seconds

mod client;

pub use client::{SsdpClient, SsdpError, SsdpEvent, extract_udn_from_usn};

/// SSDP multicast address
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250";

/// SSDP port
pub const SSDP_PORT: u16 = 1900;

/// Announcement lifetime used when CACHE-CONTROL is missing (seconds)
pub const MAX_AGE: u32 = 1800;
