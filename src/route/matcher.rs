//! NO_PROXY bypass rules.

use std::net::IpAddr;

/// Decides which hosts skip the proxy.
///
/// Follows curl's NO_PROXY conventions: comma separated entries, `*`
/// matches every host, a domain matches itself and its subdomains (a
/// leading dot is optional), and IP entries may carry a CIDR prefix.
#[derive(Debug, Clone, Default)]
pub struct ProxyMatcher {
    match_all: bool,
    domains: Vec<String>,
    networks: Vec<(IpAddr, u8)>,
}

impl ProxyMatcher {
    /// Rules from `NO_PROXY`, then `no_proxy`.
    pub fn from_env() -> Self {
        let raw = std::env::var("NO_PROXY")
            .or_else(|_| std::env::var("no_proxy"))
            .unwrap_or_default();
        Self::parse(&raw)
    }

    pub fn parse(rules: &str) -> Self {
        let mut matcher = ProxyMatcher::default();
        for entry in rules.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if entry == "*" {
                matcher.match_all = true;
            } else if let Some(network) = parse_network(entry) {
                matcher.networks.push(network);
            } else {
                let domain = entry.trim_start_matches('.').to_ascii_lowercase();
                matcher.domains.push(domain);
            }
        }
        matcher
    }

    pub fn is_empty(&self) -> bool {
        !self.match_all && self.domains.is_empty() && self.networks.is_empty()
    }

    /// Whether `host` (name or literal address) bypasses the proxy.
    pub fn should_bypass(&self, host: &str) -> bool {
        if self.match_all {
            return true;
        }
        let host = host.trim_start_matches('[').trim_end_matches(']');
        match host.parse::<IpAddr>() {
            Ok(addr) => self.networks.iter().any(|&(net, prefix)| in_network(net, prefix, addr)),
            Err(_) => {
                let host = host.to_ascii_lowercase();
                self.domains.iter().any(|domain| {
                    host == *domain
                        || host
                            .strip_suffix(domain.as_str())
                            .is_some_and(|rest| rest.ends_with('.'))
                })
            }
        }
    }
}

fn parse_network(entry: &str) -> Option<(IpAddr, u8)> {
    let entry = entry.trim_start_matches('[').trim_end_matches(']');
    match entry.split_once('/') {
        Some((addr, prefix)) => Some((addr.parse().ok()?, prefix.parse().ok()?)),
        None => {
            let addr: IpAddr = entry.parse().ok()?;
            let full = if addr.is_ipv4() { 32 } else { 128 };
            Some((addr, full))
        }
    }
}

fn in_network(net: IpAddr, prefix: u8, addr: IpAddr) -> bool {
    match (net, addr) {
        (IpAddr::V4(net), IpAddr::V4(addr)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            u32::from(net) & mask == u32::from(addr) & mask
        }
        (IpAddr::V6(net), IpAddr::V6(addr)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
            u128::from(net) & mask == u128::from(addr) & mask
        }
        _ => false,
    }
}
