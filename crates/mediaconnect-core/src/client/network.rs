use crate::api::DiscoveryInfo;
use crate::error::ConnectError;

use async_trait::async_trait;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

/// Query servers answer on the discovery port.
const DISCOVERY_QUERY: &[u8] = b"who is JellyfinServer?";

/// Network facts and wake-on-LAN delivery.
#[async_trait]
pub trait NetworkCapability: Send + Sync {
    /// Whether this device sits on a local network where a broadcast scan
    /// can find anything.
    async fn is_local_network_reachable(&self) -> bool;
    /// Send one wake-on-LAN signal.
    async fn send_wake(&self, mac_address: &str, port: u16) -> Result<(), ConnectError>;
}

/// Finds servers on the local network.
#[async_trait]
pub trait LocalDiscoverySource: Send + Sync {
    async fn scan(&self) -> Result<Vec<DiscoveryInfo>, ConnectError>;
}

/// Parse "AA:BB:CC:DD:EE:FF" or "AA-BB-CC-DD-EE-FF".
pub fn parse_mac(mac: &str) -> Result<[u8; 6], ConnectError> {
    let invalid = || ConnectError::InvalidArgument(format!("invalid MAC address: {}", mac));
    let parts: Vec<&str> = mac.trim().split([':', '-']).collect();
    if parts.len() != 6 {
        return Err(invalid());
    }
    let mut bytes = [0u8; 6];
    for (byte, part) in bytes.iter_mut().zip(parts) {
        if part.len() != 2 {
            return Err(invalid());
        }
        *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }
    Ok(bytes)
}

/// Wake-on-LAN magic packet: six 0xFF bytes then the MAC sixteen times.
pub fn magic_packet(mac: [u8; 6]) -> [u8; 102] {
    let mut packet = [0xFFu8; 102];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac);
    }
    packet
}

/// `NetworkCapability` over plain UDP sockets.
#[derive(Clone, Copy, Debug, Default)]
pub struct UdpNetwork;

#[async_trait]
impl NetworkCapability for UdpNetwork {
    async fn is_local_network_reachable(&self) -> bool {
        let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
            Ok(socket) => socket,
            Err(e) => {
                log::debug!("Cannot bind UDP socket: {}", e);
                return false;
            }
        };
        // Connecting a UDP socket sends nothing, it only picks the route
        if let Err(e) = socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).await {
            log::debug!("No route for local network check: {}", e);
            return false;
        }
        match socket.local_addr() {
            Ok(SocketAddr::V4(addr)) => is_lan_ip(IpAddr::V4(*addr.ip())),
            Ok(SocketAddr::V6(addr)) => is_lan_ip(IpAddr::V6(*addr.ip())),
            Err(_) => false,
        }
    }

    async fn send_wake(&self, mac_address: &str, port: u16) -> Result<(), ConnectError> {
        let packet = magic_packet(parse_mac(mac_address)?);
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        socket
            .set_broadcast(true)
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        socket
            .send_to(&packet, (Ipv4Addr::BROADCAST, port))
            .await
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        log::debug!("Sent wake-on-LAN packet to {} on port {}", mac_address, port);
        Ok(())
    }
}

fn is_lan_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
        // fc00::/7 unique local
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

/// Broadcast locator: sends one query and collects JSON replies until the
/// window closes.
#[derive(Clone, Debug)]
pub struct UdpServerLocator {
    port: u16,
    window: Duration,
}

impl UdpServerLocator {
    pub fn new(port: u16, window: Duration) -> Self {
        Self { port, window }
    }
}

#[async_trait]
impl LocalDiscoverySource for UdpServerLocator {
    async fn scan(&self) -> Result<Vec<DiscoveryInfo>, ConnectError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        socket
            .set_broadcast(true)
            .map_err(|e| ConnectError::Transport(e.to_string()))?;
        socket
            .send_to(DISCOVERY_QUERY, (Ipv4Addr::BROADCAST, self.port))
            .await
            .map_err(|e| ConnectError::Transport(e.to_string()))?;

        let deadline = tokio::time::Instant::now() + self.window;
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let (len, from) =
                match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                    Ok(Ok(received)) => received,
                    Ok(Err(e)) => {
                        log::warn!("Discovery receive failed: {}", e);
                        break;
                    }
                    Err(_) => break,
                };
            match serde_json::from_slice::<DiscoveryInfo>(&buf[..len]) {
                Ok(info) if seen.insert(info.id.clone()) => {
                    log::debug!("Discovered server {} at {} (from {})", info.name, info.address, from);
                    found.push(info);
                }
                Ok(_) => {}
                Err(e) => log::debug!("Ignoring malformed discovery reply from {}: {}", from, e),
            }
        }

        Ok(found)
    }
}
