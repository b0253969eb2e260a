//! Config rendering.
//!
//! Turns a role's parameters into the configuration document it mounts.
//! Role policy is enforced here rather than left to the consumer:
//! - data-plane documents cannot enable the admin interface (see [`AdminDisabled`])
//! - the control-plane admin listener never shares the proxy port
//! - dashboard documents require the control-plane address and admin key
//!
//! Every payload is checked to survive a serialize/parse round trip.

mod documents;

pub use documents::AdminDisabled;

use crate::backend::BackendReference;
use crate::constants::filenames;
use crate::role::{
    ControlPlaneParams, DashboardParams, DataPlaneParams, RoleKind, RoleParams,
};
use documents::*;
use gantry_shared::{GantryError, GantryResult};
use serde::Serialize;
use serde_yaml::Value;

/// Dashboard login session lifetime in seconds.
const DASHBOARD_SESSION_SECS: u32 = 3600;

/// A rendered configuration document, ready to be stored in a config source.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigPayload {
    /// Logical name of the config source, e.g. `apisix-control-plane-config`.
    pub name: String,
    /// File name inside the config source.
    pub file_name: String,
    /// Structured form.
    pub document: Value,
    /// Serialized form stored in the config source.
    pub serialized: String,
}

impl ConfigPayload {
    fn from_document<T: Serialize>(
        role: &str,
        file_name: &str,
        document: &T,
    ) -> GantryResult<Self> {
        let document = serde_yaml::to_value(document)
            .map_err(|e| GantryError::Serialization(format!("{role}: {e}")))?;
        let serialized = serde_yaml::to_string(&document)
            .map_err(|e| GantryError::Serialization(format!("{role}: {e}")))?;

        let payload = Self {
            name: format!("{role}-config"),
            file_name: file_name.to_string(),
            document,
            serialized,
        };

        if payload.parse_serialized()? != payload.document {
            return Err(GantryError::Serialization(format!(
                "{role}: rendered {file_name} does not round-trip"
            )));
        }
        Ok(payload)
    }

    /// Parse the serialized form back into a document.
    pub fn parse_serialized(&self) -> GantryResult<Value> {
        serde_yaml::from_str(&self.serialized)
            .map_err(|e| GantryError::Serialization(format!("{}: {}", self.name, e)))
    }

    /// Value of `apisix.enable_admin`, if the document carries one.
    pub fn admin_enabled(&self) -> Option<bool> {
        self.document
            .get("apisix")
            .and_then(|apisix| apisix.get("enable_admin"))
            .and_then(Value::as_bool)
    }
}

/// Render the configuration payload of the role named `role`.
pub fn render(role: &str, params: &RoleParams) -> GantryResult<ConfigPayload> {
    let payload = match params {
        RoleParams::ControlPlane(p) => render_control_plane(role, p)?,
        RoleParams::DataPlane(p) => render_data_plane(role, p)?,
        RoleParams::Dashboard(p) => render_dashboard(role, p)?,
    };
    tracing::debug!(
        role = %params.kind(),
        config = %payload.name,
        bytes = payload.serialized.len(),
        "Rendered config payload"
    );
    Ok(payload)
}

fn etcd_section(backend: &BackendReference) -> EtcdSection {
    EtcdSection {
        host: vec![backend.address.clone()],
        prefix: backend.prefix.clone(),
        timeout: backend.timeout,
    }
}

fn render_control_plane(role: &str, params: &ControlPlaneParams) -> GantryResult<ConfigPayload> {
    if params.admin_port == params.proxy_port {
        return Err(GantryError::InvalidRoleSpec {
            role: RoleKind::ControlPlane.to_string(),
            reason: format!(
                "admin listener must not bind the proxy port {}",
                params.proxy_port
            ),
        });
    }
    if params.admin_key.is_empty() {
        return Err(GantryError::InvalidRoleSpec {
            role: RoleKind::ControlPlane.to_string(),
            reason: "admin key is empty".into(),
        });
    }

    let document = ControlPlaneDocument {
        apisix: ControlPlaneApisix {
            node_listen: params.proxy_port,
        },
        deployment: ControlPlaneDeployment {
            role: RoleKind::ControlPlane.role_tag().to_string(),
            role_control_plane: ConfigProvider::etcd(),
            etcd: etcd_section(&params.backend),
            admin: AdminSection {
                admin_listen: AdminListen {
                    ip: "0.0.0.0".to_string(),
                    port: params.admin_port,
                },
                admin_key: vec![AdminKey {
                    name: "admin".to_string(),
                    key: params.admin_key.expose().to_string(),
                    role: "admin".to_string(),
                }],
                allow_admin: params.allow_admin.clone(),
            },
        },
    };
    ConfigPayload::from_document(role, filenames::GATEWAY_CONFIG, &document)
}

fn render_data_plane(role: &str, params: &DataPlaneParams) -> GantryResult<ConfigPayload> {
    let document = DataPlaneDocument {
        apisix: DataPlaneApisix {
            node_listen: params.proxy_port,
            enable_admin: AdminDisabled,
        },
        deployment: DataPlaneDeployment {
            role: RoleKind::DataPlane.role_tag().to_string(),
            role_data_plane: ConfigProvider::etcd(),
            etcd: etcd_section(&params.backend),
        },
    };
    ConfigPayload::from_document(role, filenames::GATEWAY_CONFIG, &document)
}

fn render_dashboard(role: &str, params: &DashboardParams) -> GantryResult<ConfigPayload> {
    let missing = |field: &str| GantryError::MissingCrossReference {
        role: RoleKind::Dashboard.to_string(),
        field: field.to_string(),
    };

    let base_url = params
        .control_plane_address
        .as_deref()
        .filter(|address| !address.is_empty())
        .ok_or_else(|| missing("control_plane_address"))?;
    let admin_key = params
        .admin_key
        .as_ref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| missing("admin_key"))?;

    let document = DashboardDocument {
        conf: DashboardConf {
            listen: DashboardListen {
                host: "0.0.0.0".to_string(),
                port: params.listen_port,
            },
            etcd: DashboardEtcd {
                endpoints: vec![params.backend.endpoint().to_string()],
                prefix: params.backend.prefix.clone(),
            },
            log: DashboardLog {
                error_log: LogTarget {
                    level: Some("warn".to_string()),
                    file_path: "logs/error.log".to_string(),
                },
                access_log: LogTarget {
                    level: None,
                    file_path: "logs/access.log".to_string(),
                },
            },
        },
        apisix: DashboardApisix {
            admin_api: DashboardAdminApi {
                base_url: base_url.to_string(),
                key: admin_key.expose().to_string(),
            },
        },
        authentication: DashboardAuthentication {
            secret: params.session_secret.expose().to_string(),
            expire_time: DASHBOARD_SESSION_SECS,
            users: params
                .users
                .iter()
                .map(|user| DashboardLogin {
                    username: user.username.clone(),
                    password: user.password.expose().to_string(),
                })
                .collect(),
        },
        deployment: DashboardDeployment {
            role: RoleKind::Dashboard.role_tag().to_string(),
        },
    };
    ConfigPayload::from_document(role, filenames::DASHBOARD_CONFIG, &document)
}
