//! Local address detection

use std::net::{IpAddr, Ipv4Addr};

/// Best-effort local IP: the address the OS would route to a public host.
/// No packet is sent (UDP connect only sets the destination). Falls back
/// to loopback on hosts with no route.
pub fn local_ip() -> IpAddr {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
