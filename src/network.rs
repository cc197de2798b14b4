use std::net::{IpAddr, Ipv4Addr};

use tracing::warn;

/// Returns the first non-loopback IPv4 address of this host, or `127.0.0.1`
/// when there is none. Looked up fresh on every call.
pub fn local_ipv4() -> IpAddr {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => first_lan_ipv4(interfaces.into_iter().map(|(_, ip)| ip)),
        Err(e) => {
            warn!("Failed to enumerate network interfaces: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

fn first_lan_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> IpAddr {
    addrs
        .into_iter()
        .find(|ip| ip.is_ipv4() && !ip.is_loopback())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// The URL peers use to reach a session, e.g. `http://192.168.1.20:8000`.
pub fn base_url(ip: IpAddr, port: u16) -> String {
    format!("http://{}:{}", ip, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn skips_loopback_and_ipv6() {
        let addrs = [
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
        ];
        assert_eq!(
            first_lan_ipv4(addrs),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))
        );
    }

    #[test]
    fn falls_back_to_loopback() {
        let addrs = [IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)];
        assert_eq!(first_lan_ipv4(addrs), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(first_lan_ipv4(Vec::new()), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn resolves_an_ipv4_address() {
        assert!(local_ipv4().is_ipv4());
    }

    #[test]
    fn formats_base_url() {
        assert_eq!(
            base_url(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 8000),
            "http://10.0.0.5:8000"
        );
    }
}
