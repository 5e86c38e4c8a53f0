//! Host network discovery for the server half of a session record.

use std::net::{IpAddr, UdpSocket};
use std::path::Path;

use super::traits::{HostNetwork, ServerNetwork};

#[cfg(target_os = "linux")]
const SYSFS_NET: &str = "/sys/class/net";

/// Always reports the same network pair.
#[derive(Debug, Clone, Default)]
pub struct StaticNetwork(ServerNetwork);

impl StaticNetwork {
    pub fn new(ip: Option<String>, mac: Option<String>) -> Self {
        Self(ServerNetwork { ip, mac })
    }
}

impl HostNetwork for StaticNetwork {
    fn current(&self) -> ServerNetwork {
        self.0.clone()
    }
}

/// Detects the primary external IPv4 interface once, at construction, and
/// reports its address and hardware address for every new session.
#[derive(Debug, Clone)]
pub struct LocalInterfaceProbe {
    detected: ServerNetwork,
}

impl LocalInterfaceProbe {
    pub fn detect() -> Self {
        let interfaces = match if_addrs::get_if_addrs() {
            Ok(found) => found
                .into_iter()
                .map(|iface| InterfaceAddr {
                    ip: iface.ip(),
                    name: iface.name,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to enumerate network interfaces");
                Vec::new()
            }
        };

        let detected = resolve_network(&interfaces, routed_ipv4(), system_mac);
        tracing::debug!(
            ip = detected.ip.as_deref().unwrap_or("-"),
            mac = detected.mac.as_deref().unwrap_or("-"),
            "host network detected"
        );
        Self { detected }
    }
}

impl HostNetwork for LocalInterfaceProbe {
    fn current(&self) -> ServerNetwork {
        self.detected.clone()
    }
}

/// One address bound to a named interface.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InterfaceAddr {
    name: String,
    ip: IpAddr,
}

/// Address the OS would route outbound traffic from. Connecting a UDP
/// socket selects a route without sending anything.
fn routed_ipv4() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:9").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    is_external_ipv4(ip).then_some(ip)
}

fn is_external_ipv4(ip: IpAddr) -> bool {
    ip.is_ipv4() && !ip.is_loopback() && !ip.is_unspecified()
}

/// The interface owning `routed`, or else the first external IPv4 interface.
fn select_interface(interfaces: &[InterfaceAddr], routed: Option<IpAddr>) -> Option<&InterfaceAddr> {
    routed
        .and_then(|ip| interfaces.iter().find(|iface| iface.ip == ip))
        .or_else(|| interfaces.iter().find(|iface| is_external_ipv4(iface.ip)))
}

/// Pair the selected interface's address with that same interface's MAC.
fn resolve_network(
    interfaces: &[InterfaceAddr],
    routed: Option<IpAddr>,
    mac_of: impl Fn(&str) -> Option<String>,
) -> ServerNetwork {
    match select_interface(interfaces, routed) {
        Some(iface) => ServerNetwork {
            ip: Some(iface.ip.to_string()),
            mac: mac_of(&iface.name),
        },
        None => ServerNetwork {
            ip: routed.map(|ip| ip.to_string()),
            mac: None,
        },
    }
}

#[cfg(target_os = "linux")]
fn system_mac(name: &str) -> Option<String> {
    sysfs_mac(Path::new(SYSFS_NET), name)
}

#[cfg(not(target_os = "linux"))]
fn system_mac(_name: &str) -> Option<String> {
    None
}

/// Read `<root>/<name>/address`, the sysfs hardware address of one interface.
#[cfg_attr(not(any(target_os = "linux", test)), allow(dead_code))]
fn sysfs_mac(root: &Path, name: &str) -> Option<String> {
    let raw = std::fs::read_to_string(root.join(name).join("address")).ok()?;
    let mac = raw.trim();
    is_usable_mac(mac).then(|| mac.to_string())
}

fn is_usable_mac(mac: &str) -> bool {
    !mac.is_empty() && mac != "00:00:00:00:00:00"
}
