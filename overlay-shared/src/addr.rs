//! Address parsing and the registry's host-only address verification rule.

use anyhow::{Context, Result, bail};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// Lower and upper bounds (exclusive, inclusive) of the valid port range.
pub const MIN_PORT: u16 = 1024;
pub const MAX_PORT: u16 = 65535;

/// Parses a `"host:port"` string as used throughout the wire protocol and the
/// single command-line argument both binaries accept.
///
/// `localhost` is rewritten to `127.0.0.1`. The port must lie in
/// `(1024, 65535]`.
pub fn parse_host_port(s: &str) -> Result<SocketAddr> {
    let (host, port) = s
        .rsplit_once(':')
        .with_context(|| format!("address {s:?} is not in \"host:port\" form"))?;

    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid port in address {s:?}"))?;

    if port <= MIN_PORT {
        bail!("port {port} in address {s:?} must be greater than {MIN_PORT}");
    }

    let host = if host == "localhost" {
        "127.0.0.1"
    } else {
        host
    };

    let addr = format!("{host}:{port}")
        .to_socket_addrs()
        .with_context(|| format!("could not resolve host in address {s:?}"))?
        .next()
        .with_context(|| format!("address {s:?} resolved to no usable socket address"))?;

    Ok(addr)
}

/// Compares only the host component of two addresses, ignoring ports.
///
/// This is the Registry's `verifyAddress` rule: a node's claimed address and
/// the peer address observed on its TCP connection must agree on host, but
/// the port is deliberately not checked (see design notes: a node can claim
/// any port).
pub fn verify_address(claimed: &SocketAddr, observed: &SocketAddr) -> bool {
    host_of(claimed) == host_of(observed)
}

fn host_of(addr: &SocketAddr) -> IpAddr {
    addr.ip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipv4_host_port() {
        let addr = parse_host_port("10.0.0.5:4000").unwrap();
        assert_eq!(addr.ip().to_string(), "10.0.0.5");
        assert_eq!(addr.port(), 4000);
    }

    #[test]
    fn rewrites_localhost() {
        let addr = parse_host_port("localhost:4000").unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn rejects_port_at_or_below_floor() {
        assert!(parse_host_port("127.0.0.1:1024").is_err());
        assert!(parse_host_port("127.0.0.1:80").is_err());
    }

    #[test]
    fn mismatched_hosts_are_rejected() {
        let claimed = parse_host_port("10.0.0.5:4000").unwrap();
        let observed = parse_host_port("10.0.0.6:51200").unwrap();
        assert!(!verify_address(&claimed, &observed));
    }

    #[test]
    fn matching_hosts_with_different_ports_are_accepted() {
        let claimed = parse_host_port("10.0.0.5:4000").unwrap();
        let observed = parse_host_port("10.0.0.5:51200").unwrap();
        assert!(verify_address(&claimed, &observed));
    }
}
