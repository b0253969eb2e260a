//! Typed configuration documents.
//!
//! The field layout mirrors the gateway's and dashboard's own config schema.
//! Documents are only built by the renderer, which enforces role policy.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The admin interface of a data-plane node.
///
/// Has exactly one value, which serializes as `false`, so a data-plane
/// document cannot carry an enabled admin interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminDisabled;

impl Serialize for AdminDisabled {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(false)
    }
}

impl<'de> Deserialize<'de> for AdminDisabled {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match bool::deserialize(deserializer)? {
            false => Ok(AdminDisabled),
            true => Err(serde::de::Error::custom(
                "enable_admin must be false on a data plane",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtcdSection {
    pub host: Vec<String>,
    pub prefix: String,
    pub timeout: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigProvider {
    pub config_provider: String,
}

impl ConfigProvider {
    pub fn etcd() -> Self {
        Self {
            config_provider: "etcd".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Control plane
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneDocument {
    pub apisix: ControlPlaneApisix,
    pub deployment: ControlPlaneDeployment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneApisix {
    pub node_listen: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneDeployment {
    pub role: String,
    pub role_control_plane: ConfigProvider,
    pub etcd: EtcdSection,
    pub admin: AdminSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSection {
    pub admin_listen: AdminListen,
    pub admin_key: Vec<AdminKey>,
    pub allow_admin: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminListen {
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminKey {
    pub name: String,
    pub key: String,
    pub role: String,
}

// ---------------------------------------------------------------------------
// Data plane
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPlaneDocument {
    pub apisix: DataPlaneApisix,
    pub deployment: DataPlaneDeployment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPlaneApisix {
    pub node_listen: u16,
    pub enable_admin: AdminDisabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPlaneDeployment {
    pub role: String,
    pub role_data_plane: ConfigProvider,
    pub etcd: EtcdSection,
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardDocument {
    pub conf: DashboardConf,
    pub apisix: DashboardApisix,
    pub authentication: DashboardAuthentication,
    pub deployment: DashboardDeployment,
}

/// Role identity. The manager API ignores keys it does not know, so the tag
/// sits beside its own sections the way it does in the gateway documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardDeployment {
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConf {
    pub listen: DashboardListen,
    pub etcd: DashboardEtcd,
    pub log: DashboardLog,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardListen {
    pub host: String,
    pub port: u16,
}

/// Dashboard flavour of the backend reference: scheme-less endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardEtcd {
    pub endpoints: Vec<String>,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardLog {
    pub error_log: LogTarget,
    pub access_log: LogTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardApisix {
    pub admin_api: DashboardAdminApi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardAdminApi {
    pub base_url: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardAuthentication {
    pub secret: String,
    pub expire_time: u32,
    pub users: Vec<DashboardLogin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardLogin {
    pub username: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_disabled_serializes_false() {
        let apisix = DataPlaneApisix {
            node_listen: 9080,
            enable_admin: AdminDisabled,
        };
        let yaml = serde_yaml::to_string(&apisix).unwrap();
        assert!(yaml.contains("enable_admin: false"));
    }

    #[test]
    fn test_admin_disabled_rejects_true() {
        let parsed = serde_yaml::from_str::<DataPlaneApisix>("node_listen: 9080\nenable_admin: true\n");
        assert!(parsed.is_err());
        let parsed =
            serde_yaml::from_str::<DataPlaneApisix>("node_listen: 9080\nenable_admin: false\n")
                .unwrap();
        assert_eq!(parsed.enable_admin, AdminDisabled);
    }
}
