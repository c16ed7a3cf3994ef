// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Trusted reverse proxies.
//!
//! `X-Forwarded-For` and `X-Real-IP` are plain request headers, so any client
//! can set them. They are only read when the connecting peer is one of the
//! proxies listed here, and the chain is walked from the right so a client
//! cannot choose its own identity by prepending entries.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid proxy address {entry:?}: {reason}")]
pub struct ProxyParseError {
    pub entry: String,
    pub reason: &'static str,
}

/// An address block in CIDR notation. A bare address is a single-host block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyNet {
    addr: IpAddr,
    prefix: u8,
}

impl ProxyNet {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for ProxyNet {
    type Err = ProxyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ProxyParseError {
            entry: s.to_string(),
            reason,
        };

        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };
        let addr = addr
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| invalid("not an IP address"))?
            .to_canonical();
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(raw) => raw
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max)
                .ok_or_else(|| invalid("prefix length out of range"))?,
            None => max,
        };

        Ok(Self { addr, prefix })
    }
}

/// Proxies whose forwarding headers are believed.
///
/// Installed on a router as a request extension. Without it, or with an
/// empty list, clients are identified by their peer address alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies {
    nets: Arc<[ProxyNet]>,
}

impl TrustedProxies {
    /// Trust no proxy.
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse a comma separated list such as `10.0.0.0/8, 127.0.0.1`.
    pub fn parse_list(raw: &str) -> Result<Self, ProxyParseError> {
        let nets = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<ProxyNet>, _>>()?;
        Ok(Self { nets: nets.into() })
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn trusts(&self, ip: IpAddr) -> bool {
        self.nets.iter().any(|net| net.contains(ip))
    }

    /// Resolve the client behind a trusted `peer`.
    ///
    /// Walks `forwarded_for` right to left and returns the first hop that is
    /// not itself a trusted proxy. An unparseable hop ends the walk at the
    /// last address a trusted proxy vouched for.
    pub fn resolve(&self, peer: IpAddr, forwarded_for: &str) -> IpAddr {
        let mut client = peer;
        for hop in forwarded_for.rsplit(',').map(str::trim) {
            if !self.trusts(client) {
                break;
            }
            match hop.parse::<IpAddr>() {
                Ok(ip) => client = ip.to_canonical(),
                Err(_) => break,
            }
        }
        client
    }
}
