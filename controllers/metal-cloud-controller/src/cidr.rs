//! Pod address block derivation

use crate::error::ProviderError;
use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Zero the host bits of `ip` below `prefix`
///
/// Fails when `prefix` is longer than the address family allows.
pub fn zero_host_bits(ip: IpAddr, prefix: u8) -> Result<IpAddr, ProviderError> {
    IpNetwork::new(ip, prefix)
        .map(|network| network.network())
        .map_err(|e| ProviderError::InvalidAddress(format!("{}/{}: {}", ip, prefix, e)))
}

/// Pod address block for a node address, as `<network>/<prefix>`
pub fn pod_cidr(address: &str, prefix: u8) -> Result<String, ProviderError> {
    let ip: IpAddr = address
        .parse()
        .map_err(|e| ProviderError::InvalidAddress(format!("{}: {}", address, e)))?;
    Ok(format!("{}/{}", zero_host_bits(ip, prefix)?, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed(ip: &str, prefix: u8) -> String {
        zero_host_bits(ip.parse().unwrap(), prefix).unwrap().to_string()
    }

    #[test]
    fn test_zero_host_bits_ipv4() {
        assert_eq!(zeroed("10.0.5.42", 24), "10.0.5.0");
        assert_eq!(zeroed("10.0.5.42", 16), "10.0.0.0");
        assert_eq!(zeroed("10.20.30.40", 8), "10.0.0.0");
        assert_eq!(zeroed("10.0.5.42", 32), "10.0.5.42");
        assert_eq!(zeroed("10.0.5.42", 0), "0.0.0.0");
    }

    #[test]
    fn test_zero_host_bits_ipv6() {
        assert_eq!(zeroed("2001:db8::1", 64), "2001:db8::");
        assert_eq!(zeroed("2001:db8:1234:5678::1", 48), "2001:db8:1234::");
        assert_eq!(zeroed("2001:db8::1", 128), "2001:db8::1");
        assert_eq!(zeroed("2001:db8::1", 0), "::");
    }

    #[test]
    fn test_prefix_longer_than_family() {
        let result = zero_host_bits("10.0.5.42".parse().unwrap(), 33);
        assert!(matches!(result, Err(ProviderError::InvalidAddress(_))));
        assert!(zero_host_bits("2001:db8::1".parse().unwrap(), 64).is_ok());
    }

    #[test]
    fn test_pod_cidr() {
        assert_eq!(pod_cidr("10.0.5.42", 24).unwrap(), "10.0.5.0/24");
        assert_eq!(pod_cidr("fd00:10::17", 64).unwrap(), "fd00:10::/64");
        assert!(matches!(pod_cidr("not-an-ip", 24), Err(ProviderError::InvalidAddress(_))));
    }
}
