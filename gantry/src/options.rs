//! Topology configuration.
//!
//! `TopologyOptions` is the single configuration root. It is loaded from an
//! optional YAML file, then overridden by CLI flags and the environment, and
//! validated by [`TopologyOptions::sanitize`] before any composition happens.

use crate::backend::{BackendLocator, Namespace};
use crate::constants::{self, images, ports};
use crate::role::WritableScope;
use gantry_shared::{GantryError, GantryResult};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    pub gateway: String,
    pub dashboard: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            gateway: images::GATEWAY.to_string(),
            dashboard: images::DASHBOARD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneOptions {
    pub replicas: u32,
    pub proxy_port: u16,
    pub admin_port: u16,
    pub service_name: String,
    /// CIDRs admitted to the admin API.
    pub allow_admin: Vec<String>,
}

impl Default for ControlPlaneOptions {
    fn default() -> Self {
        Self {
            replicas: 1,
            proxy_port: ports::PROXY,
            admin_port: ports::ADMIN,
            service_name: "apisix-admin".to_string(),
            allow_admin: vec!["0.0.0.0/0".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPlaneOptions {
    pub enabled: bool,
    pub replicas: u32,
    pub proxy_port: u16,
    pub service_port: u16,
    pub service_name: String,
}

impl Default for DataPlaneOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            replicas: 2,
            proxy_port: ports::PROXY,
            service_port: ports::GATEWAY_SERVICE,
            service_name: "apisix-gateway".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardOptions {
    pub enabled: bool,
    pub replicas: u32,
    pub listen_port: u16,
    pub service_name: String,
    /// Expose the dashboard outside the cluster.
    pub external: bool,
    pub username: String,
    /// Login password; generated when absent.
    pub password: Option<String>,
    /// JWT signing secret; generated when absent.
    pub session_secret: Option<String>,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            replicas: 1,
            listen_port: ports::DASHBOARD,
            service_name: "apisix-dashboard".to_string(),
            external: false,
            username: "admin".to_string(),
            password: None,
            session_secret: None,
        }
    }
}

/// Configuration root for one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyOptions {
    pub namespace: String,
    pub backend: BackendLocator,
    pub images: ImageOptions,
    /// Admin key shared by the control plane and the dashboard; generated when absent.
    pub admin_key: Option<String>,
    pub control_plane: ControlPlaneOptions,
    pub data_plane: DataPlaneOptions,
    pub dashboard: DashboardOptions,
    /// How much of the gateway runtime tree bootstrap stages make writable.
    pub writable_scope: WritableScope,
}

impl Default for TopologyOptions {
    fn default() -> Self {
        Self {
            namespace: constants::DEFAULT_NAMESPACE.to_string(),
            backend: BackendLocator::default(),
            images: ImageOptions::default(),
            admin_key: None,
            control_plane: ControlPlaneOptions::default(),
            data_plane: DataPlaneOptions::default(),
            dashboard: DashboardOptions::default(),
            writable_scope: WritableScope::default(),
        }
    }
}

impl TopologyOptions {
    /// Load options from a YAML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> GantryResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path).map_err(|e| {
            GantryError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let options: TopologyOptions = serde_yaml::from_str(&contents).map_err(|e| {
            GantryError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), "Loaded topology options");
        Ok(options)
    }

    /// Apply a namespace override (CLI flag or environment).
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        if let Some(namespace) = namespace {
            self.namespace = namespace;
        }
        self
    }

    /// Validate and return the namespace.
    pub fn sanitize(&self) -> GantryResult<Namespace> {
        let namespace = Namespace::new(self.namespace.clone())?;

        if self.control_plane.replicas == 0 {
            return Err(GantryError::Config(
                "control_plane.replicas must be at least 1".into(),
            ));
        }
        if self.data_plane.enabled && self.data_plane.replicas == 0 {
            return Err(GantryError::Config(
                "data_plane.replicas must be at least 1".into(),
            ));
        }
        if self.dashboard.enabled && self.dashboard.replicas == 0 {
            return Err(GantryError::Config(
                "dashboard.replicas must be at least 1".into(),
            ));
        }
        if self.control_plane.admin_port == self.control_plane.proxy_port {
            return Err(GantryError::Config(format!(
                "control_plane.admin_port must differ from the proxy port {}",
                self.control_plane.proxy_port
            )));
        }
        if self.control_plane.allow_admin.is_empty() {
            return Err(GantryError::Config(
                "control_plane.allow_admin must list at least one CIDR".into(),
            ));
        }
        for cidr in &self.control_plane.allow_admin {
            if !is_cidr(cidr) {
                return Err(GantryError::Config(format!(
                    "control_plane.allow_admin entry is not a CIDR: {cidr}"
                )));
            }
        }
        for name in [
            &self.control_plane.service_name,
            &self.data_plane.service_name,
            &self.dashboard.service_name,
            &self.backend.service,
        ] {
            Namespace::new(name.clone()).map_err(|_| {
                GantryError::Config(format!("service name is not a DNS-1123 label: {name}"))
            })?;
        }
        if matches!(&self.admin_key, Some(key) if key.is_empty()) {
            return Err(GantryError::Config("admin_key must not be empty".into()));
        }

        Ok(namespace)
    }
}

fn is_cidr(value: &str) -> bool {
    parse_cidr(value).is_some()
}

/// Split a CIDR into its address and prefix length, rejecting prefixes wider
/// than the address family.
pub(crate) fn parse_cidr(value: &str) -> Option<(IpAddr, u8)> {
    let (addr, prefix) = value.split_once('/')?;
    let (Ok(addr), Ok(prefix)) = (addr.parse::<IpAddr>(), prefix.parse::<u8>()) else {
        return None;
    };
    let max = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    (prefix <= max).then_some((addr, prefix))
}
