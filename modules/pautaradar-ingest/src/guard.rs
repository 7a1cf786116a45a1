//! SSRF guard for outbound fetches.
//!
//! Only http(s) URLs with public hosts are fetched. `localhost`, `.local`
//! names, and any DNS answer inside private, loopback, link-local,
//! multicast, reserved, or unspecified ranges (IPv4 and IPv6) are refused
//! before a single byte leaves the process.

use std::net::IpAddr;

use tracing::warn;
use url::Url;

/// Whether an address belongs to a range that must never be fetched.
pub fn is_forbidden_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified()
                // 100.64.0.0/10 carrier-grade NAT and 192.0.0.0/24 IETF reserved.
                || (v4.octets()[0] == 100 && (64..128).contains(&v4.octets()[1]))
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
                || v4.octets()[0] >= 240
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                // fc00::/7 unique-local, fe80::/10 link-local.
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                // IPv4-mapped addresses inherit the IPv4 verdict.
                || v6.to_ipv4_mapped().map(|v4| is_forbidden_ip(IpAddr::V4(v4))).unwrap_or(false)
        }
    }
}

/// Hostname-level refusals that need no DNS round trip.
pub fn is_forbidden_host(host: &str) -> bool {
    let lowered = host.trim_end_matches('.').to_ascii_lowercase();
    lowered == "localhost"
        || lowered.ends_with(".localhost")
        || lowered.ends_with(".local")
        || lowered.parse::<IpAddr>().map(is_forbidden_ip).unwrap_or(false)
}

/// Full guard: scheme, hostname, then every resolved address.
pub async fn check_url(raw: &str) -> bool {
    let Ok(parsed) = Url::parse(raw) else {
        warn!(url = raw, "SSRF guard: unparseable URL");
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        warn!(url = raw, scheme = parsed.scheme(), "SSRF guard: refused scheme");
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    if is_forbidden_host(host) {
        warn!(url = raw, host, "SSRF guard: refused host");
        return false;
    }

    let port = parsed.port_or_known_default().unwrap_or(443);
    let result = match tokio::net::lookup_host((host, port)).await {
        Ok(addrs) => {
            let mut ok = true;
            for addr in addrs {
                if is_forbidden_ip(addr.ip()) {
                    warn!(url = raw, ip = %addr.ip(), "SSRF guard: refused resolved address");
                    ok = false;
                    break;
                }
            }
            ok
        }
        Err(e) => {
            warn!(url = raw, error = %e, "SSRF guard: DNS resolution failed");
            false
        }
    };
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn private_and_loopback_v4_are_forbidden() {
        for ip in ["127.0.0.1", "10.0.0.5", "172.16.8.1", "192.168.1.1", "169.254.1.1", "0.0.0.0"]
        {
            assert!(is_forbidden_ip(ip.parse().unwrap()), "{ip}");
        }
    }

    #[test]
    fn cgnat_and_reserved_v4_are_forbidden() {
        assert!(is_forbidden_ip("100.64.0.1".parse().unwrap()));
        assert!(is_forbidden_ip("100.127.255.254".parse().unwrap()));
        assert!(is_forbidden_ip("192.0.0.8".parse().unwrap()));
        assert!(is_forbidden_ip("240.0.0.1".parse().unwrap()));
    }

    #[test]
    fn public_v4_is_allowed() {
        for ip in ["1.1.1.1", "8.8.8.8", "151.101.1.69", "100.128.0.1"] {
            assert!(!is_forbidden_ip(ip.parse().unwrap()), "{ip}");
        }
    }

    #[test]
    fn special_v6_ranges_are_forbidden() {
        assert!(is_forbidden_ip(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_forbidden_ip(IpAddr::V6(Ipv6Addr::UNSPECIFIED)));
        assert!(is_forbidden_ip("fe80::1".parse().unwrap()));
        assert!(is_forbidden_ip("fc00::1".parse().unwrap()));
        assert!(is_forbidden_ip("fd12:3456::1".parse().unwrap()));
        assert!(is_forbidden_ip("ff02::1".parse().unwrap()));
        assert!(is_forbidden_ip("::ffff:192.168.0.1".parse().unwrap()));
    }

    #[test]
    fn public_v6_is_allowed() {
        assert!(!is_forbidden_ip("2606:4700:4700::1111".parse().unwrap()));
        assert!(!is_forbidden_ip(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))));
    }

    #[test]
    fn hostname_denylist() {
        assert!(is_forbidden_host("localhost"));
        assert!(is_forbidden_host("LOCALHOST"));
        assert!(is_forbidden_host("printer.local"));
        assert!(is_forbidden_host("app.localhost"));
        assert!(is_forbidden_host("127.0.0.1"));
        assert!(!is_forbidden_host("example.gov.br"));
    }

    #[tokio::test]
    async fn guard_refuses_bad_schemes_and_literal_ips() {
        assert!(!check_url("ftp://example.com/feed").await);
        assert!(!check_url("http://127.0.0.1:8080/x").await);
        assert!(!check_url("http://localhost/feed").await);
        assert!(!check_url("http://[::1]/feed").await);
    }
}
