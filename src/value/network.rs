use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Tag 260's payload: a 4- or 16-byte address decodes to the matching
/// `IpAddr` variant; a 6-byte payload is left as an opaque MAC address,
/// per the Open Question in the reference material (callers should not
/// assume a MAC type from this codec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpAddressValue {
    Addr(IpAddr),
    Mac([u8; 6]),
}

impl IpAddressValue {
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            IpAddressValue::Addr(IpAddr::V4(v4)) => v4.octets().to_vec(),
            IpAddressValue::Addr(IpAddr::V6(v6)) => v6.octets().to_vec(),
            IpAddressValue::Mac(mac) => mac.to_vec(),
        }
    }
}

impl From<IpAddr> for IpAddressValue {
    fn from(addr: IpAddr) -> Self {
        IpAddressValue::Addr(addr)
    }
}

/// Tag 261's payload: a single-entry map `{address_bytes: prefix_length}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetworkValue(pub IpNetwork);

impl From<IpNetwork> for IpNetworkValue {
    fn from(net: IpNetwork) -> Self {
        IpNetworkValue(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn v4_round_trips_through_bytes() {
        let addr = IpAddressValue::Addr(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1)));
        assert_eq!(addr.to_bytes(), vec![192, 168, 0, 1]);
    }

    #[test]
    fn mac_is_opaque_passthrough() {
        let mac = IpAddressValue::Mac([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(mac.to_bytes().len(), 6);
    }
}
