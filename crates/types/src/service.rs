//! Advertised service descriptors and per-service key overrides.

use crate::{KeyPair, Party};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The closed set of services a mock node can advertise.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ServiceKind {
    /// Network map: accepts registrations from other nodes.
    NetworkMap,
    /// Non-validating single-node notary.
    SimpleNotary,
    /// Validating notary.
    ValidatingNotary,
    /// Replicated (byzantine-fault-tolerant) notary cluster member.
    BftNotary,
}

impl ServiceKind {
    /// Whether this service notarises transactions.
    pub fn is_notary(self) -> bool {
        matches!(
            self,
            ServiceKind::SimpleNotary | ServiceKind::ValidatingNotary | ServiceKind::BftNotary
        )
    }

    /// Stable textual identifier.
    pub fn id(self) -> &'static str {
        match self {
            ServiceKind::NetworkMap => "network_map",
            ServiceKind::SimpleNotary => "notary.simple",
            ServiceKind::ValidatingNotary => "notary.validating",
            ServiceKind::BftNotary => "notary.bft",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A service descriptor: the kind plus an optional service name.
///
/// Two nodes advertising equal descriptors provide the same logical service,
/// which is how a clustered notary is addressed as a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub kind: ServiceKind,
    pub name: Option<String>,
}

impl ServiceInfo {
    /// Descriptor without a service name.
    pub fn new(kind: ServiceKind) -> Self {
        Self { kind, name: None }
    }

    /// Descriptor with a service name.
    pub fn named(kind: ServiceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for ServiceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}|{}", self.kind, name),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// An advertised service together with the identity that provides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub info: ServiceInfo,
    pub identity: Party,
}

/// Errors raised when validating service key overrides.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideError {
    /// An override names a service the node does not advertise.
    #[error("key override for {0} but the node does not advertise it")]
    NotAdvertised(ServiceKind),
}

/// Replacement key pairs for advertised services.
///
/// Used to give several nodes the same service identity (a notary cluster)
/// or to pin a notary to a well-known key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceKeyOverrides {
    keys: BTreeMap<ServiceKind, KeyPair>,
}

impl ServiceKeyOverrides {
    /// Create an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the key of one service kind.
    pub fn with(mut self, kind: ServiceKind, key: KeyPair) -> Self {
        self.keys.insert(kind, key);
        self
    }

    /// Get the override for a service kind.
    pub fn get(&self, kind: ServiceKind) -> Option<&KeyPair> {
        self.keys.get(&kind)
    }

    /// All override key pairs.
    pub fn key_pairs(&self) -> impl Iterator<Item = &KeyPair> {
        self.keys.values()
    }

    /// Check that every override targets an advertised service.
    pub fn validate(&self, advertised: &[ServiceInfo]) -> Result<(), OverrideError> {
        for kind in self.keys.keys() {
            if !advertised.iter().any(|info| info.kind == *kind) {
                return Err(OverrideError::NotAdvertised(*kind));
            }
        }
        Ok(())
    }

    /// Number of overrides.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if there are no overrides.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_service_display() {
        let info = ServiceInfo::named(ServiceKind::ValidatingNotary, "notary-cluster");
        assert_eq!(info.to_string(), "notary.validating|notary-cluster");
        assert_eq!(ServiceInfo::new(ServiceKind::NetworkMap).to_string(), "network_map");
    }

    #[test]
    fn test_overrides_validate_against_advertised() {
        let overrides =
            ServiceKeyOverrides::new().with(ServiceKind::SimpleNotary, KeyPair::from_entropy(3));

        assert!(overrides
            .validate(&[ServiceInfo::new(ServiceKind::SimpleNotary)])
            .is_ok());
        assert_eq!(
            overrides.validate(&[ServiceInfo::new(ServiceKind::NetworkMap)]),
            Err(OverrideError::NotAdvertised(ServiceKind::SimpleNotary))
        );
    }

    #[test]
    fn test_notary_kinds() {
        assert!(ServiceKind::BftNotary.is_notary());
        assert!(ServiceKind::SimpleNotary.is_notary());
        assert!(!ServiceKind::NetworkMap.is_notary());
    }
}
