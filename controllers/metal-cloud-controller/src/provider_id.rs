//! Provider ID codec
//!
//! A node's provider ID names the server claim backing it:
//! `metal://<claim-namespace>/<claim-name>`.

use crate::constants::PROVIDER_NAME;
use crate::error::ProviderError;
use metal_client::ObjectKey;

/// Encode the provider ID of a server claim
pub fn encode(namespace: &str, name: &str) -> String {
    format!("{}://{}/{}", PROVIDER_NAME, namespace, name)
}

/// Decode a provider ID into the key of the server claim it names
///
/// The scheme must be `metal` and exactly two non-empty segments must follow it.
pub fn parse(provider_id: &str) -> Result<ObjectKey, ProviderError> {
    let invalid = || ProviderError::InvalidProviderId(provider_id.to_string());

    let (scheme, rest) = provider_id.split_once("://").ok_or_else(invalid)?;
    if scheme != PROVIDER_NAME {
        return Err(invalid());
    }
    let mut segments = rest.split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(namespace), Some(name), None) if !namespace.is_empty() && !name.is_empty() => {
            Ok(ObjectKey::namespaced(namespace, name))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for (namespace, name) in [
            ("default", "worker-0"),
            ("metal-tenant", "claim.with.dots"),
            ("a", "b"),
        ] {
            let key = parse(&encode(namespace, name)).unwrap();
            assert_eq!(key, ObjectKey::namespaced(namespace, name));
        }
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode("metal-tenant", "worker-0"), "metal://metal-tenant/worker-0");
    }

    #[test]
    fn test_rejects_malformed_ids() {
        for id in [
            "",
            "metal-tenant/worker-0",
            "aws://metal-tenant/worker-0",
            "metal://worker-0",
            "metal://metal-tenant/worker-0/extra",
            "metal:///worker-0",
            "metal://metal-tenant/",
        ] {
            assert!(
                matches!(parse(id), Err(ProviderError::InvalidProviderId(_))),
                "{} should be rejected",
                id
            );
        }
    }
}
