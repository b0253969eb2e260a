//! Coordination backend addressing.
//!
//! The backend (etcd) is provisioned outside this crate. All we do is derive the
//! address every role must agree on from the namespace.

use crate::constants::backend;
use gantry_shared::{GantryError, GantryResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical deployment scope. Validated at construction so that
/// [`BackendLocator::locate`] is total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Validate a DNS-1123 label: 1-63 chars of `[a-z0-9-]`, alphanumeric at both ends.
    pub fn new(value: impl Into<String>) -> GantryResult<Self> {
        let value = value.into();
        let bytes = value.as_bytes();
        let valid = !bytes.is_empty()
            && bytes.len() <= 63
            && bytes
                .iter()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            && bytes[0] != b'-'
            && bytes[bytes.len() - 1] != b'-';
        if !valid {
            return Err(GantryError::InvalidNamespace(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cluster-internal DNS name of a service in this namespace.
    pub fn service_host(&self, service: &str) -> String {
        format!("{}.{}.{}", service, self.0, backend::CLUSTER_SUFFIX)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Namespace {
    type Error = GantryError;

    fn try_from(value: String) -> GantryResult<Self> {
        Self::new(value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

/// Where and how roles reach the coordination backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendReference {
    /// Full URL, e.g. `http://etcd.default.svc.cluster.local:2379`.
    pub address: String,
    /// Key prefix all gateway data lives under.
    pub prefix: String,
    /// Request timeout in seconds.
    pub timeout: u32,
}

impl BackendReference {
    /// Scheme-less `host:port` form used by the dashboard.
    pub fn endpoint(&self) -> &str {
        self.address
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.address)
    }

    /// Host component of the address.
    pub fn host(&self) -> &str {
        let endpoint = self.endpoint();
        endpoint
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(endpoint)
    }
}

/// Derives [`BackendReference`]s from namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendLocator {
    pub scheme: String,
    pub service: String,
    pub port: u16,
    pub prefix: String,
    pub timeout: u32,
}

impl Default for BackendLocator {
    fn default() -> Self {
        Self {
            scheme: backend::SCHEME.to_string(),
            service: backend::SERVICE.to_string(),
            port: backend::PORT,
            prefix: backend::PREFIX.to_string(),
            timeout: backend::TIMEOUT_SECS,
        }
    }
}

impl BackendLocator {
    /// `<scheme>://<service>.<namespace>.svc.cluster.local:<port>`
    pub fn locate(&self, namespace: &Namespace) -> BackendReference {
        BackendReference {
            address: format!(
                "{}://{}:{}",
                self.scheme,
                namespace.service_host(&self.service),
                self.port
            ),
            prefix: self.prefix.clone(),
            timeout: self.timeout,
        }
    }
}

/// Locate the backend with default service parameters.
pub fn locate(namespace: &Namespace) -> BackendReference {
    BackendLocator::default().locate(namespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_locate_default_namespace() {
        let ns = Namespace::new("default").unwrap();
        let backend = locate(&ns);
        assert_eq!(
            backend.address,
            "http://etcd.default.svc.cluster.local:2379"
        );
        assert_eq!(backend.prefix, "/apisix");
        assert_eq!(backend.timeout, 30);
        assert_eq!(backend.endpoint(), "etcd.default.svc.cluster.local:2379");
        assert_eq!(backend.host(), "etcd.default.svc.cluster.local");
    }

    #[test]
    fn test_invalid_namespaces_rejected() {
        for bad in ["", "-edge", "edge-", "Upper", "has.dot", "under_score"] {
            assert!(Namespace::new(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(Namespace::new("a".repeat(64)).is_err());
        assert!(Namespace::new("a".repeat(63)).is_ok());
    }

    #[test]
    fn test_namespace_deserialize_validates() {
        let ok: Namespace = serde_yaml::from_str("gateway").unwrap();
        assert_eq!(ok.as_str(), "gateway");
        assert!(serde_yaml::from_str::<Namespace>("Not-Valid").is_err());
    }

    proptest! {
        #[test]
        fn test_locate_is_deterministic_and_embeds_namespace_once(
            name in "[a-z][a-z0-9-]{0,20}[a-z0-9]"
        ) {
            // These collide with the fixed DNS suffix.
            prop_assume!(name != "svc" && name != "cluster");
            let ns = Namespace::new(name.clone()).unwrap();
            let first = locate(&ns);
            let second = locate(&ns);
            prop_assert_eq!(&first, &second);

            let expected_host = format!("etcd.{}.svc.cluster.local", name);
            prop_assert_eq!(first.host(), expected_host.as_str());
            let needle = format!(".{}.", name);
            prop_assert_eq!(first.address.matches(&needle).count(), 1);
        }
    }
}
