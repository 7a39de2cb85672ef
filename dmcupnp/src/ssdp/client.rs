/*!
The SSDP client is a *control point*.
It must **not** bind to UDP port 1900.

If a renderer running on the same host listens on 0.0.0.0:1900 and the client
binds there too (even with SO_REUSEPORT) the kernel load-balances incoming
datagrams between the sockets and search responses are lost at random.

Therefore the client binds to 0.0.0.0:0 (ephemeral port), sends M-SEARCH to
the multicast group and receives unicast replies. It also joins the group on
every IPv4 interface so NOTIFY alive/byebye announcements are seen.
*/

use super::{MAX_AGE, SSDP_MULTICAST_ADDR, SSDP_PORT};
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// SSDP client errors
#[derive(Debug, Error)]
pub enum SsdpError {
    #[error("SSDP socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// SSDP events relevant for a control point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsdpEvent {
    Alive {
        usn: String,
        nt: String,
        location: String,
        server: String,
        max_age: u32,
        from: SocketAddr,
    },
    ByeBye {
        usn: String,
        nt: String,
        from: SocketAddr,
    },
    SearchResponse {
        usn: String,
        st: String,
        location: String,
        server: String,
        max_age: u32,
        from: SocketAddr,
    },
}

impl SsdpEvent {
    pub fn usn(&self) -> &str {
        match self {
            SsdpEvent::Alive { usn, .. }
            | SsdpEvent::ByeBye { usn, .. }
            | SsdpEvent::SearchResponse { usn, .. } => usn,
        }
    }
}

/// SSDP client sending M-SEARCH probes and listening for answers
#[derive(Debug, Clone)]
pub struct SsdpClient {
    socket: Arc<UdpSocket>,
}

impl SsdpClient {
    /// Creates the client socket and joins the SSDP group on every
    /// non-loopback IPv4 interface.
    pub fn new() -> Result<Self, SsdpError> {
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        socket2.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket2.into();
        socket.set_read_timeout(Some(Duration::from_millis(500)))?;
        socket.set_multicast_loop_v4(true)?;

        let group: Ipv4Addr = SSDP_MULTICAST_ADDR
            .parse()
            .unwrap_or(Ipv4Addr::new(239, 255, 255, 250));

        for iface in get_if_addrs::get_if_addrs()? {
            if let std::net::IpAddr::V4(ipv4) = iface.ip() {
                if ipv4.is_loopback() {
                    continue;
                }
                match socket.join_multicast_v4(&group, &ipv4) {
                    Ok(()) => debug!(interface = %ipv4, "SSDP: joined {}", SSDP_MULTICAST_ADDR),
                    Err(e) => warn!(
                        interface = %ipv4,
                        error = %e,
                        "SSDP: failed to join {}", SSDP_MULTICAST_ADDR
                    ),
                }
            }
        }

        info!(local = ?socket.local_addr().ok(), "SSDP client ready");

        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Sends one M-SEARCH for the given search target.
    pub fn send_msearch(&self, st: &str, mx: u32) -> Result<(), SsdpError> {
        let mx = mx.max(1);
        let msg = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {}:{}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: {}\r\n\
             ST: {}\r\n\
             USER-AGENT: DMControl SSDP Client\r\n\
             \r\n",
            SSDP_MULTICAST_ADDR, SSDP_PORT, mx, st
        );

        let group: Ipv4Addr = SSDP_MULTICAST_ADDR
            .parse()
            .unwrap_or(Ipv4Addr::new(239, 255, 255, 250));
        let addr = SocketAddr::V4(SocketAddrV4::new(group, SSDP_PORT));

        self.socket.send_to(msg.as_bytes(), addr)?;
        debug!(st = st, mx = mx, "M-SEARCH sent");
        trace!("M-SEARCH payload:\n{}", msg);
        Ok(())
    }

    /// Blocking receive loop, returns once `running` is cleared.
    ///
    /// The socket read timeout bounds how long a stop request can go unseen.
    pub fn run_event_loop<F>(&self, running: &AtomicBool, mut on_event: F)
    where
        F: FnMut(SsdpEvent),
    {
        let mut buf = [0u8; 8192];
        while running.load(Ordering::SeqCst) {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    let data = String::from_utf8_lossy(&buf[..n]);
                    if let Some(event) = parse_message(&data, from) {
                        trace!(from = %from, "SSDP event: {:?}", event);
                        on_event(event);
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "SSDP client read error");
                }
            }
        }
        debug!("SSDP event loop stopped");
    }
}

/// Extracts the `uuid:...` part of a USN (`uuid:xxx::urn:...` or `uuid:xxx`).
pub fn extract_udn_from_usn(usn: &str) -> Option<String> {
    let usn = usn.trim();
    let lower = usn.to_ascii_lowercase();
    let start = lower.find("uuid:")?;
    let rest = &usn[start..];
    let udn = match rest.find("::") {
        Some(end) => &rest[..end],
        None => rest,
    };
    if udn.len() <= "uuid:".len() {
        return None;
    }
    Some(udn.to_string())
}

pub(crate) fn parse_message(data: &str, from: SocketAddr) -> Option<SsdpEvent> {
    let mut lines = data.lines();
    let first_line = lines.next()?.trim();
    let upper = first_line.to_ascii_uppercase();
    let headers = parse_headers(lines);

    if upper.starts_with("NOTIFY ") {
        handle_notify(&headers, from)
    } else if upper.starts_with("HTTP/") && upper.contains(" 200 ") {
        handle_search_response(&headers, from)
    } else {
        // M-SEARCH from other control points and anything else.
        trace!(from = %from, "Ignoring SSDP message: {}", first_line);
        None
    }
}

fn handle_notify(headers: &HashMap<String, String>, from: SocketAddr) -> Option<SsdpEvent> {
    let nts = headers.get("NTS")?.to_ascii_lowercase();
    let nt = headers.get("NT")?.to_string();
    let usn = headers.get("USN")?.to_string();

    match nts.as_str() {
        "ssdp:alive" => {
            let location = headers.get("LOCATION")?.to_string();
            let server = headers
                .get("SERVER")
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            let max_age = parse_max_age(headers.get("CACHE-CONTROL"));

            Some(SsdpEvent::Alive {
                usn,
                nt,
                location,
                server,
                max_age,
                from,
            })
        }
        "ssdp:byebye" => Some(SsdpEvent::ByeBye { usn, nt, from }),
        _ => {
            trace!(from = %from, "Unknown NTS value: {}", nts);
            None
        }
    }
}

fn handle_search_response(
    headers: &HashMap<String, String>,
    from: SocketAddr,
) -> Option<SsdpEvent> {
    let st = headers.get("ST")?.to_string();
    let usn = headers.get("USN")?.to_string();
    let location = headers.get("LOCATION")?.to_string();
    let server = headers
        .get("SERVER")
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string());
    let max_age = parse_max_age(headers.get("CACHE-CONTROL"));

    Some(SsdpEvent::SearchResponse {
        usn,
        st,
        location,
        server,
        max_age,
        from,
    })
}

fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        // Values may contain ':' (LOCATION), split on the first one only.
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_uppercase();
            let value = value.trim().to_string();
            if !name.is_empty() && !value.is_empty() {
                headers.insert(name, value);
            }
        } else {
            trace!("Skipping SSDP line without colon: '{}'", line);
        }
    }
    headers
}

fn parse_max_age(value: Option<&String>) -> u32 {
    let Some(v) = value else {
        return MAX_AGE;
    };

    let lower = v.to_ascii_lowercase();
    if let Some(idx) = lower.find("max-age") {
        let after_eq = lower[idx + 7..]
            .trim_start()
            .trim_start_matches('=')
            .trim_start();
        let digits: String = after_eq.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(age) = digits.parse::<u32>() {
            return age;
        }
    }

    trace!("Could not parse max-age from CACHE-CONTROL '{}', using {}", v, MAX_AGE);
    MAX_AGE
}
