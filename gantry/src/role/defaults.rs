//! Role declarations for the standard gateway topology.
//!
//! Cross-role values (admin key, backend reference, control-plane address) are
//! derived here exactly once and threaded into every role that needs them.

use super::{
    ControlPlaneParams, DashboardParams, DashboardUser, DataPlaneParams, ExposureRule, NamedPort,
    PortMapping, Reachability, RoleParams, RoleSpec, RuntimeLayout, SecurityPosture,
    StorageRequirement, WritableConcern, WritableScope,
};
use crate::advisory::Advisory;
use crate::backend::{BackendReference, Namespace};
use crate::constants::{filenames, identity, paths};
use crate::credential::SharedCredential;
use crate::options::TopologyOptions;
use gantry_shared::GantryResult;

/// Validated inputs for one synthesis run.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub namespace: Namespace,
    pub roles: Vec<RoleSpec>,
    pub advisories: Vec<Advisory>,
}

/// Build the role declarations described by `options`.
pub fn blueprint(options: &TopologyOptions) -> GantryResult<Blueprint> {
    let namespace = options.sanitize()?;
    let backend = options.backend.locate(&namespace);
    let mut advisories = Vec::new();

    let admin_key = resolve_secret(options.admin_key.as_deref(), "admin_key", &mut advisories);

    let mut roles = vec![control_plane(options, &backend, &admin_key)];

    if options.data_plane.enabled {
        roles.push(data_plane(options, &backend));
    }

    if options.dashboard.enabled {
        let cp = &options.control_plane;
        let control_plane_address = format!(
            "http://{}:{}",
            namespace.service_host(&cp.service_name),
            cp.admin_port
        );
        let session_secret = resolve_secret(
            options.dashboard.session_secret.as_deref(),
            "dashboard.session_secret",
            &mut advisories,
        );
        let password = resolve_secret(
            options.dashboard.password.as_deref(),
            "dashboard.password",
            &mut advisories,
        );
        roles.push(dashboard(
            options,
            DashboardParams {
                listen_port: options.dashboard.listen_port,
                control_plane_address: Some(control_plane_address),
                admin_key: Some(admin_key.clone()),
                backend: backend.clone(),
                session_secret,
                users: vec![DashboardUser {
                    username: options.dashboard.username.clone(),
                    password,
                }],
            },
        ));
    }

    tracing::debug!(
        namespace = %namespace,
        roles = roles.len(),
        backend = %backend.address,
        "Built topology blueprint"
    );

    Ok(Blueprint {
        namespace,
        roles,
        advisories,
    })
}

fn resolve_secret(
    configured: Option<&str>,
    field: &str,
    advisories: &mut Vec<Advisory>,
) -> SharedCredential {
    match configured {
        Some(value) => SharedCredential::new(value),
        None => {
            advisories.push(Advisory::GeneratedCredential {
                field: field.to_string(),
            });
            SharedCredential::generate()
        }
    }
}

fn runtime_posture(read_only_root_filesystem: bool) -> SecurityPosture {
    SecurityPosture {
        run_as_user: Some(identity::RUNTIME_UID),
        run_as_group: Some(identity::RUNTIME_GID),
        fs_group: Some(identity::RUNTIME_GID),
        allow_root: true,
        read_only_root_filesystem,
    }
}

/// Runs as the image's own user on a writable root filesystem. Nothing runs
/// as root explicitly, so no container is granted it.
fn image_posture() -> SecurityPosture {
    SecurityPosture {
        run_as_user: None,
        run_as_group: None,
        fs_group: None,
        allow_root: false,
        read_only_root_filesystem: false,
    }
}

fn gateway_layout(scope: WritableScope) -> RuntimeLayout {
    RuntimeLayout {
        root: paths::GATEWAY_HOME.to_string(),
        conf_dir: paths::GATEWAY_CONF.to_string(),
        config_file: filenames::GATEWAY_CONFIG.to_string(),
        packaged_root: Some(paths::GATEWAY_HOME.to_string()),
        writes: vec![
            paths::GATEWAY_NGINX_CONF.to_string(),
            paths::GATEWAY_LOGS.to_string(),
            paths::TMP.to_string(),
        ],
        owns_conf_siblings: true,
        writable_scope: scope,
    }
}

fn gateway_storage() -> Vec<StorageRequirement> {
    vec![
        StorageRequirement::new("logs", paths::GATEWAY_LOGS, WritableConcern::Logs),
        StorageRequirement::new("tmp", paths::TMP, WritableConcern::Temp),
    ]
}

/// The control plane runs with a read-only root filesystem, so the gateway's
/// startup writes into its conf directory require a bootstrap stage.
fn control_plane(
    options: &TopologyOptions,
    backend: &BackendReference,
    admin_key: &SharedCredential,
) -> RoleSpec {
    let cp = &options.control_plane;
    RoleSpec {
        name: "apisix-control-plane".to_string(),
        image: options.images.gateway.clone(),
        ports: vec![NamedPort::new("admin-api", cp.admin_port)],
        replicas: cp.replicas,
        security: runtime_posture(true),
        storage: gateway_storage(),
        exposure: ExposureRule {
            service_name: cp.service_name.clone(),
            reachability: Reachability::ClusterInternal,
            ports: vec![PortMapping {
                name: Some("admin-api".to_string()),
                port: cp.admin_port,
                target_port: cp.admin_port,
            }],
        },
        runtime: gateway_layout(options.writable_scope),
        params: RoleParams::ControlPlane(ControlPlaneParams {
            proxy_port: cp.proxy_port,
            admin_port: cp.admin_port,
            admin_key: admin_key.clone(),
            allow_admin: cp.allow_admin.clone(),
            backend: backend.clone(),
        }),
    }
}

/// The data plane runs as the image's user, which owns the gateway tree and
/// writes `conf/nginx.conf` into it directly. Only config.yaml is overridden,
/// so no bootstrap stage is needed.
fn data_plane(options: &TopologyOptions, backend: &BackendReference) -> RoleSpec {
    let dp = &options.data_plane;
    RoleSpec {
        name: "apisix-data-plane".to_string(),
        image: options.images.gateway.clone(),
        ports: vec![NamedPort::new("proxy-http", dp.proxy_port)],
        replicas: dp.replicas,
        security: image_posture(),
        storage: gateway_storage(),
        exposure: ExposureRule {
            service_name: dp.service_name.clone(),
            reachability: Reachability::External,
            ports: vec![PortMapping {
                name: Some("http".to_string()),
                port: dp.service_port,
                target_port: dp.proxy_port,
            }],
        },
        runtime: gateway_layout(options.writable_scope),
        params: RoleParams::DataPlane(DataPlaneParams {
            proxy_port: dp.proxy_port,
            backend: backend.clone(),
        }),
    }
}

fn dashboard(options: &TopologyOptions, params: DashboardParams) -> RoleSpec {
    let db = &options.dashboard;
    RoleSpec {
        name: "apisix-dashboard".to_string(),
        image: options.images.dashboard.clone(),
        ports: vec![NamedPort::new("http", db.listen_port)],
        replicas: db.replicas,
        security: SecurityPosture {
            allow_root: false,
            ..runtime_posture(true)
        },
        storage: vec![
            StorageRequirement::new("logs", paths::DASHBOARD_LOGS, WritableConcern::Logs),
            StorageRequirement::new("tmp", paths::TMP, WritableConcern::Temp),
        ],
        exposure: ExposureRule {
            service_name: db.service_name.clone(),
            reachability: if db.external {
                Reachability::External
            } else {
                Reachability::ClusterInternal
            },
            ports: vec![PortMapping {
                name: Some("http".to_string()),
                port: db.listen_port,
                target_port: db.listen_port,
            }],
        },
        runtime: RuntimeLayout {
            root: paths::DASHBOARD_HOME.to_string(),
            conf_dir: paths::DASHBOARD_CONF.to_string(),
            config_file: filenames::DASHBOARD_CONFIG.to_string(),
            packaged_root: Some(paths::DASHBOARD_HOME.to_string()),
            writes: vec![paths::DASHBOARD_LOGS.to_string(), paths::TMP.to_string()],
            owns_conf_siblings: true,
            writable_scope: WritableScope::Minimal,
        },
        params: RoleParams::Dashboard(params),
    }
}
