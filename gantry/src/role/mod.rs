//! Role declarations.
//!
//! A role is one functional partition of the gateway. The set of kinds is closed;
//! each role is a plain data record processed uniformly by the composer.

mod defaults;

pub use defaults::{Blueprint, blueprint};

use crate::backend::BackendReference;
use crate::credential::SharedCredential;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three partitions of the gateway, in topology order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleKind {
    ControlPlane,
    DataPlane,
    Dashboard,
}

impl RoleKind {
    pub const ALL: [RoleKind; 3] = [
        RoleKind::ControlPlane,
        RoleKind::DataPlane,
        RoleKind::Dashboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::ControlPlane => "control-plane",
            RoleKind::DataPlane => "data-plane",
            RoleKind::Dashboard => "dashboard",
        }
    }

    /// Identity tag rendered into the gateway's `deployment.role`.
    pub fn role_tag(&self) -> &'static str {
        match self {
            RoleKind::ControlPlane => "control_plane",
            RoleKind::DataPlane => "data_plane",
            RoleKind::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPort {
    pub name: String,
    pub number: u16,
}

impl NamedPort {
    pub fn new(name: impl Into<String>, number: u16) -> Self {
        Self {
            name: name.into(),
            number,
        }
    }
}

/// Identity and privilege settings of a role's pod.
///
/// An unset uid keeps the image's own user, which owns the packaged tree and
/// may write into it when the root filesystem is writable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPosture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_group: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_group: Option<i64>,
    /// Whether any container of the pod may run as root. A bootstrap stage needs it.
    pub allow_root: bool,
    pub read_only_root_filesystem: bool,
}

impl SecurityPosture {
    /// Whether the main process runs as the image's own user.
    pub fn is_image_identity(&self) -> bool {
        self.run_as_user.is_none()
    }
}

/// What a writable volume holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritableConcern {
    Runtime,
    Logs,
    Temp,
}

/// An empty-writable volume the role needs independent of configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRequirement {
    pub name: String,
    pub mount_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    pub concern: WritableConcern,
}

impl StorageRequirement {
    pub fn new(name: impl Into<String>, mount_path: impl Into<String>, concern: WritableConcern) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            sub_path: None,
            concern,
        }
    }

    /// Whether writes to `path` land on this volume.
    pub fn covers(&self, path: &str) -> bool {
        is_within(path, &self.mount_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reachability {
    ClusterInternal,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub port: u16,
    pub target_port: u16,
}

/// How a role's workload is reached by other roles or external clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureRule {
    pub service_name: String,
    pub reachability: Reachability,
    pub ports: Vec<PortMapping>,
}

/// How much of the runtime tree a bootstrap stage makes writable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritableScope {
    /// The smallest directory containing every write that needs it.
    #[default]
    Minimal,
    /// The whole installation root.
    RuntimeRoot,
}

/// Where the role's runtime lives inside its image and what it writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeLayout {
    /// Installation root, e.g. `/usr/local/apisix`.
    pub root: String,
    /// Configuration directory the rendered file belongs in.
    pub conf_dir: String,
    /// File name of the rendered configuration inside `conf_dir`.
    pub config_file: String,
    /// Location of the image's packaged copy of `root`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaged_root: Option<String>,
    /// Paths the main process writes at runtime.
    #[serde(default)]
    pub writes: Vec<String>,
    /// The runtime owns other files in `conf_dir`, so only the config file may
    /// be overridden (sub-path mount) rather than the whole directory.
    pub owns_conf_siblings: bool,
    #[serde(default)]
    pub writable_scope: WritableScope,
}

impl RuntimeLayout {
    pub fn config_path(&self) -> String {
        format!("{}/{}", self.conf_dir.trim_end_matches('/'), self.config_file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneParams {
    pub proxy_port: u16,
    pub admin_port: u16,
    pub admin_key: SharedCredential,
    pub allow_admin: Vec<String>,
    pub backend: BackendReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPlaneParams {
    pub proxy_port: u16,
    pub backend: BackendReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardUser {
    pub username: String,
    pub password: SharedCredential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardParams {
    pub listen_port: u16,
    /// Base URL of the control plane's admin API.
    pub control_plane_address: Option<String>,
    /// Key presented to the control plane's admin API.
    pub admin_key: Option<SharedCredential>,
    pub backend: BackendReference,
    pub session_secret: SharedCredential,
    pub users: Vec<DashboardUser>,
}

/// Per-kind configuration inputs. The variant determines the role kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RoleParams {
    ControlPlane(ControlPlaneParams),
    DataPlane(DataPlaneParams),
    Dashboard(DashboardParams),
}

impl RoleParams {
    pub fn kind(&self) -> RoleKind {
        match self {
            RoleParams::ControlPlane(_) => RoleKind::ControlPlane,
            RoleParams::DataPlane(_) => RoleKind::DataPlane,
            RoleParams::Dashboard(_) => RoleKind::Dashboard,
        }
    }

    pub fn backend(&self) -> &BackendReference {
        match self {
            RoleParams::ControlPlane(p) => &p.backend,
            RoleParams::DataPlane(p) => &p.backend,
            RoleParams::Dashboard(p) => &p.backend,
        }
    }
}

/// Static declaration of one role (set once at composition time, never changes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    /// Workload name, also the `app` label value.
    pub name: String,
    pub image: String,
    pub ports: Vec<NamedPort>,
    pub replicas: u32,
    pub security: SecurityPosture,
    /// Ordered empty-writable volumes.
    pub storage: Vec<StorageRequirement>,
    pub exposure: ExposureRule,
    pub runtime: RuntimeLayout,
    pub params: RoleParams,
}

impl RoleSpec {
    pub fn kind(&self) -> RoleKind {
        self.params.kind()
    }
}

/// `path` equals `dir` or lies beneath it.
pub(crate) fn is_within(path: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_within() {
        assert!(is_within("/usr/local/apisix/logs", "/usr/local/apisix/logs"));
        assert!(is_within("/usr/local/apisix/logs/error.log", "/usr/local/apisix/logs/"));
        assert!(!is_within("/usr/local/apisix/logs2", "/usr/local/apisix/logs"));
        assert!(!is_within("/usr/local", "/usr/local/apisix"));
    }

    #[test]
    fn test_role_order_and_tags() {
        let mut kinds = vec![RoleKind::Dashboard, RoleKind::ControlPlane, RoleKind::DataPlane];
        kinds.sort();
        assert_eq!(kinds, RoleKind::ALL.to_vec());
        assert_eq!(RoleKind::DataPlane.role_tag(), "data_plane");
        assert_eq!(RoleKind::ControlPlane.to_string(), "control-plane");
    }

    #[test]
    fn test_config_path_joins_dir_and_file() {
        let layout = RuntimeLayout {
            root: "/usr/local/apisix".into(),
            conf_dir: "/usr/local/apisix/conf/".into(),
            config_file: "config.yaml".into(),
            packaged_root: None,
            writes: vec![],
            owns_conf_siblings: true,
            writable_scope: WritableScope::Minimal,
        };
        assert_eq!(layout.config_path(), "/usr/local/apisix/conf/config.yaml");
    }
}
