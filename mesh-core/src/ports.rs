//! Port Allocator (spec §4.3): assigns stable proxy entrypoint ports to
//! `(namespace, service, servicePort)` triples, one allocator per protocol.
//!
//! HTTP uses dense positional assignment keyed by the ordinal position of
//! the `ServicePort` within its Service's port list, so entrypoint
//! `http-<n>` always carries "the n-th port of some Service" traffic across
//! every Service that has at least `n+1` ports. TCP/UDP use first-free
//! allocation from a configurable range.

use crate::error::PortAllocError;
use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A live `(namespace, service, servicePort)` triple, keyed by the Service
/// and the port's ordinal position within it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServicePortRef {
    pub service: Key,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PortProtocol {
    Http,
    Tcp,
    Udp,
}

/// Persistent `ServicePort -> meshPort` mapping. Exclusively mutated by the
/// event-loop worker; the Provider and shadow-service reconciler only read
/// it (spec §3, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortTable {
    min_http_port: u16,
    max_http_port: u16,
    tcp_range: (u16, u16),
    udp_range: (u16, u16),

    http: BTreeMap<ServicePortRef, u16>,
    tcp: BTreeMap<ServicePortRef, u16>,
    udp: BTreeMap<ServicePortRef, u16>,

    tcp_free: Vec<bool>,
    udp_free: Vec<bool>,
}

impl PortTable {
    pub fn new(
        min_http_port: u16,
        max_http_port: u16,
        tcp_range: (u16, u16),
        udp_range: (u16, u16),
    ) -> Self {
        Self {
            min_http_port,
            max_http_port,
            tcp_range,
            udp_range,
            http: BTreeMap::new(),
            tcp: BTreeMap::new(),
            udp: BTreeMap::new(),
            tcp_free: vec![true; range_len(tcp_range)],
            udp_free: vec![true; range_len(udp_range)],
        }
    }

    /// `http-<n>` where `n` is the ordinal position of `port` within
    /// `service`'s port list. Stable by construction: the same ordinal
    /// always maps to the same offset within `[min_http_port, max_http_port)`.
    pub fn http_port(&mut self, svc_ref: ServicePortRef, ordinal: usize) -> Result<u16, PortAllocError> {
        if let Some(&p) = self.http.get(&svc_ref) {
            return Ok(p);
        }
        let candidate = self
            .min_http_port
            .checked_add(ordinal as u16)
            .filter(|p| *p < self.max_http_port)
            .ok_or(PortAllocError::EntrypointExhausted {
                protocol: "http",
                low: self.min_http_port,
                high: self.max_http_port,
            })?;
        self.http.insert(svc_ref, candidate);
        Ok(candidate)
    }

    pub fn tcp_port(&mut self, svc_ref: ServicePortRef) -> Result<u16, PortAllocError> {
        Self::first_free(
            &mut self.tcp,
            &mut self.tcp_free,
            self.tcp_range,
            "tcp",
            svc_ref,
        )
    }

    pub fn udp_port(&mut self, svc_ref: ServicePortRef) -> Result<u16, PortAllocError> {
        Self::first_free(
            &mut self.udp,
            &mut self.udp_free,
            self.udp_range,
            "udp",
            svc_ref,
        )
    }

    /// Read-only lookup of an already-allocated entrypoint, for callers that
    /// only read the table (the Provider's `render_*` helpers allocate
    /// through `http_port`/`tcp_port`/`udp_port` instead; this is for the
    /// shadow-service reconciler, which runs after allocation and must never
    /// mutate the table itself — spec §5: "PortTable ... read by the
    /// Provider and by the shadow-service reconciler").
    pub fn lookup(&self, svc_ref: &ServicePortRef, protocol: PortProtocol) -> Option<u16> {
        match protocol {
            PortProtocol::Http => self.http.get(svc_ref).copied(),
            PortProtocol::Tcp => self.tcp.get(svc_ref).copied(),
            PortProtocol::Udp => self.udp.get(svc_ref).copied(),
        }
    }

    fn first_free(
        table: &mut BTreeMap<ServicePortRef, u16>,
        free: &mut [bool],
        range: (u16, u16),
        protocol: &'static str,
        svc_ref: ServicePortRef,
    ) -> Result<u16, PortAllocError> {
        if let Some(&p) = table.get(&svc_ref) {
            return Ok(p);
        }
        let offset = free
            .iter()
            .position(|&f| f)
            .ok_or(PortAllocError::EntrypointExhausted {
                protocol,
                low: range.0,
                high: range.1,
            })?;
        free[offset] = false;
        let port = range.0 + offset as u16;
        table.insert(svc_ref, port);
        Ok(port)
    }

    /// Returns ports to the free pool for every live triple absent from
    /// `live`. Runs between snapshots (spec §5: "reclamation runs between
    /// snapshots so port reuse cannot precede a publish").
    pub fn reclaim(&mut self, live: &std::collections::BTreeSet<ServicePortRef>) {
        self.tcp.retain(|k, &mut v| {
            let keep = live.contains(k);
            if !keep {
                let offset = (v - self.tcp_range.0) as usize;
                if let Some(slot) = self.tcp_free.get_mut(offset) {
                    *slot = true;
                }
            }
            keep
        });
        self.udp.retain(|k, &mut v| {
            let keep = live.contains(k);
            if !keep {
                let offset = (v - self.udp_range.0) as usize;
                if let Some(slot) = self.udp_free.get_mut(offset) {
                    *slot = true;
                }
            }
            keep
        });
        self.http.retain(|k, _| live.contains(k));
    }
}

fn range_len(range: (u16, u16)) -> usize {
    range.1.saturating_sub(range.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc_ref(name: &str, port: u16) -> ServicePortRef {
        ServicePortRef {
            service: Key::new(name, "ns"),
            port,
        }
    }

    #[test]
    fn http_port_is_stable_and_positional() {
        let mut table = PortTable::new(10000, 10010, (20000, 20010), (30000, 30010));
        let a = table.http_port(svc_ref("a", 80), 0).unwrap();
        let b = table.http_port(svc_ref("b", 8080), 0).unwrap();
        assert_eq!(a, b, "same ordinal across services shares the entrypoint");
        let again = table.http_port(svc_ref("a", 80), 0).unwrap();
        assert_eq!(a, again);
    }

    #[test]
    fn tcp_port_first_free_and_unique() {
        let mut table = PortTable::new(10000, 10010, (20000, 20002), (30000, 30010));
        let a = table.tcp_port(svc_ref("a", 80)).unwrap();
        let b = table.tcp_port(svc_ref("b", 80)).unwrap();
        assert_ne!(a, b);
        assert!(table.tcp_port(svc_ref("c", 80)).is_err(), "range exhausted");
    }

    #[test]
    fn reclaim_returns_port_to_free_pool() {
        let mut table = PortTable::new(10000, 10010, (20000, 20001), (30000, 30010));
        let a = table.tcp_port(svc_ref("a", 80)).unwrap();
        table.reclaim(&std::collections::BTreeSet::new());
        let b = table.tcp_port(svc_ref("b", 80)).unwrap();
        assert_eq!(a, b, "reclaimed port is reused");
    }
}
