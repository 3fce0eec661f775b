//! Typed service records parsed from raw mDNS advertisements
//!
//! Wireless debugging advertises two independent services per device: a
//! pairing endpoint and a connect endpoint, on different ports. Both must
//! be seen for the same address before pairing can proceed.

use std::net::{IpAddr, Ipv4Addr};

use serde::Serialize;

/// Service type advertised while the phone shows the pairing QR screen
pub const PAIRING_SERVICE_TYPE: &str = "_adb-tls-pairing._tcp.local.";

/// Service type advertised whenever wireless debugging is enabled
pub const CONNECT_SERVICE_TYPE: &str = "_adb-tls-connect._tcp.local.";

/// The two service types a session browses for
pub const SERVICE_TYPES: &[&str] = &[PAIRING_SERVICE_TYPE, CONNECT_SERVICE_TYPE];

/// Classification of an advertised service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Pairing,
    Connect,
}

impl ServiceKind {
    /// Classify an advertised service-type string.
    ///
    /// Responders differ on the trailing dot, so it is ignored.
    pub fn from_service_type(service_type: &str) -> Option<Self> {
        let normalized = service_type.trim_end_matches('.');
        if normalized == PAIRING_SERVICE_TYPE.trim_end_matches('.') {
            Some(Self::Pairing)
        } else if normalized == CONNECT_SERVICE_TYPE.trim_end_matches('.') {
            Some(Self::Connect)
        } else {
            None
        }
    }
}

/// Raw payload delivered by a discovery feed, before classification
#[derive(Debug, Clone)]
pub struct Advertisement {
    /// Advertised instance name
    pub name: String,
    /// Advertised service-type string
    pub service_type: String,
    /// Resolved addresses; may be empty or IPv6-only
    pub addresses: Vec<IpAddr>,
    /// Advertised port
    pub port: u16,
}

/// One classified advertisement. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRecord {
    pub name: String,
    pub kind: ServiceKind,
    pub address: Ipv4Addr,
    pub port: u16,
}

/// Turn a raw advertisement into a typed record.
///
/// Returns `None` when the service type is not one of the two recognized
/// kinds or no IPv4 address was resolved. Dropping such advertisements is
/// not an error; the network carries plenty of unrelated traffic.
pub fn parse_advertisement(raw: &Advertisement) -> Option<ServiceRecord> {
    let kind = ServiceKind::from_service_type(&raw.service_type)?;
    let address = raw.addresses.iter().find_map(|addr| match addr {
        IpAddr::V4(v4) => Some(*v4),
        IpAddr::V6(_) => None,
    })?;

    Some(ServiceRecord {
        name: raw.name.clone(),
        kind,
        address,
        port: raw.port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn raw(service_type: &str, addresses: Vec<IpAddr>, port: u16) -> Advertisement {
        Advertisement {
            name: "adb-AB12CD34-xYzW".to_string(),
            service_type: service_type.to_string(),
            addresses,
            port,
        }
    }

    #[test]
    fn test_parse_pairing_advertisement() {
        let record = parse_advertisement(&raw(
            PAIRING_SERVICE_TYPE,
            vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))],
            37123,
        ))
        .unwrap();

        assert_eq!(record.kind, ServiceKind::Pairing);
        assert_eq!(record.address, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(record.port, 37123);
        assert_eq!(record.name, "adb-AB12CD34-xYzW");
    }

    #[test]
    fn test_parse_connect_advertisement() {
        let record = parse_advertisement(&raw(
            CONNECT_SERVICE_TYPE,
            vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))],
            40001,
        ))
        .unwrap();

        assert_eq!(record.kind, ServiceKind::Connect);
    }

    #[test]
    fn test_service_kind_ignores_trailing_dot() {
        assert_eq!(
            ServiceKind::from_service_type("_adb-tls-pairing._tcp.local"),
            Some(ServiceKind::Pairing)
        );
        assert_eq!(
            ServiceKind::from_service_type("_adb-tls-connect._tcp.local."),
            Some(ServiceKind::Connect)
        );
    }

    #[test]
    fn test_unrecognized_service_type_is_dropped() {
        let result = parse_advertisement(&raw(
            "_googlecast._tcp.local.",
            vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))],
            8009,
        ));
        assert!(result.is_none());
    }

    #[test]
    fn test_empty_address_list_is_dropped() {
        assert!(parse_advertisement(&raw(PAIRING_SERVICE_TYPE, vec![], 37123)).is_none());
    }

    #[test]
    fn test_ipv6_only_is_dropped() {
        let result = parse_advertisement(&raw(
            PAIRING_SERVICE_TYPE,
            vec![IpAddr::V6(Ipv6Addr::LOCALHOST)],
            37123,
        ));
        assert!(result.is_none());
    }

    #[test]
    fn test_first_ipv4_wins_over_later_ones() {
        let record = parse_advertisement(&raw(
            PAIRING_SERVICE_TYPE,
            vec![
                IpAddr::V6(Ipv6Addr::LOCALHOST),
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
                IpAddr::V4(Ipv4Addr::new(172, 16, 0, 9)),
            ],
            37123,
        ))
        .unwrap();

        assert_eq!(record.address, Ipv4Addr::new(192, 168, 1, 20));
    }
}
