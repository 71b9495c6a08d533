//! System inspection behind the tunnel heuristics
//!
//! Each heuristic reads one listing from the host (interfaces, processes,
//! routes) and scans it for tunnel indicators. Listings come from a
//! [`SystemInspector`] so tests never touch the real OS.

use std::io;
use std::process::Command;

/// Network interface name fragments used by VPN adapters
pub const INTERFACE_KEYWORDS: &[&str] = &[
    "vpn",
    "virtual private",
    "tap-windows",
    "tunnel",
    "tun",
    "wg",
    "ppp",
    "cisco",
    "nord",
    "express",
    "proton",
    "wireguard",
];

/// Process name fragments used by VPN clients
pub const PROCESS_KEYWORDS: &[&str] = &[
    "vpn",
    "openvpn",
    "nordvpn",
    "expressvpn",
    "protonvpn",
    "wireguard",
    "cisco",
    "anyconnect",
    "tunnelblick",
];

/// Interface prefixes that mark a default route as tunneled
const TUNNEL_DEVICE_PREFIXES: &[&str] = &["tun", "utun", "wg", "ppp", "tap"];

/// Host capabilities queried by the tunnel heuristics, one per heuristic
#[cfg_attr(test, mockall::automock)]
pub trait SystemInspector: Send + Sync {
    /// Active network interfaces, one or more per line
    fn interface_listing(&self) -> io::Result<String>;

    /// Running process names
    fn process_listing(&self) -> io::Result<String>;

    /// System routing table in the platform's native text format
    fn routing_table(&self) -> io::Result<String>;
}

/// Inspector backed by the host's own tools
#[derive(Debug, Default, Clone, Copy)]
pub struct OsInspector;

impl SystemInspector for OsInspector {
    fn interface_listing(&self) -> io::Result<String> {
        if cfg!(target_os = "linux") {
            let mut names = Vec::new();
            for entry in std::fs::read_dir("/sys/class/net")? {
                names.push(entry?.file_name().to_string_lossy().into_owned());
            }
            Ok(names.join("\n"))
        } else if cfg!(windows) {
            run("ipconfig", &["/all"])
        } else {
            run("ifconfig", &["-l"])
        }
    }

    fn process_listing(&self) -> io::Result<String> {
        if cfg!(windows) {
            run("tasklist", &[])
        } else {
            run("ps", &["-A", "-o", "comm="])
        }
    }

    fn routing_table(&self) -> io::Result<String> {
        if cfg!(target_os = "linux") {
            run("ip", &["route", "show"])
        } else if cfg!(windows) {
            run("route", &["print"])
        } else {
            run("netstat", &["-rn"])
        }
    }
}

fn run(program: &str, args: &[&str]) -> io::Result<String> {
    let output = Command::new(program).args(args).output()?;
    if !output.status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} exited with {}", program, output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// First keyword contained in the listing, compared case-insensitively
pub fn find_keyword(listing: &str, keywords: &[&'static str]) -> Option<&'static str> {
    let haystack = listing.to_lowercase();
    keywords.iter().copied().find(|keyword| haystack.contains(keyword))
}

/// Interface keyword match that skips the `utunN` devices macOS always creates
/// for its own services; a tunnel behind `utun` still shows in the routing table.
pub fn find_interface_keyword(listing: &str) -> Option<&'static str> {
    let names: Vec<&str> = listing
        .split_whitespace()
        .filter(|name| !is_system_utun(name))
        .collect();
    find_keyword(&names.join(" "), INTERFACE_KEYWORDS)
}

fn is_system_utun(name: &str) -> bool {
    let name = name.trim_end_matches(':').to_lowercase();
    match name.strip_prefix("utun") {
        Some(index) => !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Whether a routing table carries a tunnel-style default route.
///
/// Recognised patterns: the `0.0.0.0/1` + `128.0.0.0/1` split default used by
/// OpenVPN-style clients, more than one default entry, or a default route
/// through a tunnel device.
pub fn routes_indicate_tunnel(table: &str) -> bool {
    let mut defaults = 0;
    let mut lower_half = false;
    let mut upper_half = false;
    let mut default_via_tunnel = false;

    for line in table.to_lowercase().lines() {
        let mut fields = line.split_whitespace();
        let (Some(destination), second) = (fields.next(), fields.next()) else {
            continue;
        };

        match (destination, second) {
            ("0.0.0.0/1", _) | ("0.0.0.0", Some("128.0.0.0")) => lower_half = true,
            ("128.0.0.0/1", _) | ("128.0.0.0", Some("128.0.0.0")) => upper_half = true,
            // IPv6 link-local defaults (`fe80::%utun0`) exist on every Mac
            ("default", Some(gateway)) if gateway.contains(':') => {}
            ("default", _) | ("0.0.0.0/0", _) | ("0.0.0.0", Some("0.0.0.0")) => {
                defaults += 1;
                let via_tunnel = line.split_whitespace().any(|field| {
                    TUNNEL_DEVICE_PREFIXES
                        .iter()
                        .any(|prefix| field.starts_with(prefix))
                });
                default_via_tunnel |= via_tunnel;
            }
            _ => {}
        }
    }

    (lower_half && upper_half) || defaults > 1 || default_via_tunnel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_keywords_are_case_insensitive() {
        assert_eq!(find_keyword("lo\neth0\nWG0", INTERFACE_KEYWORDS), Some("wg"));
        assert_eq!(
            find_keyword("Ethernet adapter NordLynx", INTERFACE_KEYWORDS),
            Some("nord")
        );
        assert_eq!(find_keyword("lo\neth0\nwlan0", INTERFACE_KEYWORDS), None);
    }

    #[test]
    fn test_macos_system_utun_devices_are_ignored() {
        let listing = "lo0 gif0 stf0 anpi0 en0 en1 awdl0 llw0 utun0 utun1 utun2 utun3";
        assert_eq!(find_interface_keyword(listing), None);
        assert_eq!(find_interface_keyword("lo0 en0 utun0 utun1 tun0"), Some("tun"));
        assert_eq!(find_interface_keyword("lo0 en0 utun0 NordLynx"), Some("nord"));
    }

    #[test]
    fn test_macos_routing_table_without_vpn() {
        let table = "Internet:\n\
                     Destination        Gateway            Flags        Netif Expire\n\
                     default            192.168.1.1        UGScg          en0\n\
                     127                127.0.0.1          UCS            lo0\n\
                     Internet6:\n\
                     default            fe80::%utun0       UGcIg        utun0\n\
                     default            fe80::%utun1       UGcIg        utun1\n";
        assert!(!routes_indicate_tunnel(table));

        let table = "default            10.8.0.1           UGScg        utun4\n";
        assert!(routes_indicate_tunnel(table));
    }

    #[test]
    fn test_process_keywords() {
        assert_eq!(
            find_keyword("systemd\nsshd\nopenvpn\n", PROCESS_KEYWORDS),
            Some("vpn")
        );
        assert_eq!(find_keyword("systemd\nsshd\nbash\n", PROCESS_KEYWORDS), None);
    }

    #[test]
    fn test_split_default_route() {
        let table = "0.0.0.0/1 via 10.8.0.1 dev eth0\n\
                     128.0.0.0/1 via 10.8.0.1 dev eth0\n\
                     default via 192.168.1.1 dev eth0 proto dhcp\n";
        assert!(routes_indicate_tunnel(table));
    }

    #[test]
    fn test_windows_split_default_route() {
        let table = "Network Destination        Netmask          Gateway       Interface  Metric\n\
                     0.0.0.0          0.0.0.0      192.168.1.1   192.168.1.20     35\n\
                     0.0.0.0        128.0.0.0         10.8.0.1       10.8.0.2    259\n\
                     128.0.0.0        128.0.0.0         10.8.0.1       10.8.0.2    259\n";
        assert!(routes_indicate_tunnel(table));
    }

    #[test]
    fn test_default_via_tunnel_device() {
        assert!(routes_indicate_tunnel("default dev wg0 scope link\n"));
    }

    #[test]
    fn test_plain_routing_table() {
        let table = "default via 192.168.1.1 dev eth0 proto dhcp metric 100\n\
                     192.168.1.0/24 dev eth0 proto kernel scope link src 192.168.1.20\n";
        assert!(!routes_indicate_tunnel(table));
        assert!(!routes_indicate_tunnel(""));
    }

    #[test]
    fn test_duplicate_default_route() {
        let table = "default via 192.168.1.1 dev eth0\ndefault via 10.0.0.1 dev eth1 metric 50\n";
        assert!(routes_indicate_tunnel(table));
    }
}
