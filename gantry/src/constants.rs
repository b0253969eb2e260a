//! Gateway deployment constants.
//!
//! Centralized location for images, ports, paths, and backend defaults.

/// Container images.
pub mod images {
    /// Gateway image shared by the control and data plane.
    pub const GATEWAY: &str = "apache/apisix:3.9.1-debian";

    /// Administrative dashboard image.
    pub const DASHBOARD: &str = "apache/apisix-dashboard:3.0.1-alpine";
}

/// Listen ports.
pub mod ports {
    /// Proxy listener (user-facing traffic).
    pub const PROXY: u16 = 9080;

    /// Administrative API listener (cluster-internal only).
    pub const ADMIN: u16 = 9180;

    /// Externally reachable port of the gateway service.
    pub const GATEWAY_SERVICE: u16 = 80;

    /// Dashboard listener.
    pub const DASHBOARD: u16 = 9000;
}

/// Filesystem layout of the gateway images.
pub mod paths {
    /// Installation root of the gateway runtime.
    pub const GATEWAY_HOME: &str = "/usr/local/apisix";

    /// Configuration directory of the gateway runtime.
    pub const GATEWAY_CONF: &str = "/usr/local/apisix/conf";

    /// Log directory of the gateway runtime.
    pub const GATEWAY_LOGS: &str = "/usr/local/apisix/logs";

    /// Rendered on startup next to config.yaml.
    pub const GATEWAY_NGINX_CONF: &str = "/usr/local/apisix/conf/nginx.conf";

    /// Installation root of the dashboard.
    pub const DASHBOARD_HOME: &str = "/usr/local/apisix-dashboard";

    /// Configuration directory of the dashboard.
    pub const DASHBOARD_CONF: &str = "/usr/local/apisix-dashboard/conf";

    /// Log directory of the dashboard.
    pub const DASHBOARD_LOGS: &str = "/usr/local/apisix-dashboard/logs";

    /// Scratch space.
    pub const TMP: &str = "/tmp";

    /// Where the bootstrap stage sees the read-only configuration source.
    pub const BOOTSTRAP_SOURCE: &str = "/bootstrap/source";

    /// Where the bootstrap stage sees the writable target.
    pub const BOOTSTRAP_TARGET: &str = "/bootstrap/target";
}

/// File names inside configuration sources.
pub mod filenames {
    pub const GATEWAY_CONFIG: &str = "config.yaml";
    pub const DASHBOARD_CONFIG: &str = "conf.yaml";
}

/// Coordination backend defaults.
pub mod backend {
    pub const SCHEME: &str = "http";
    pub const SERVICE: &str = "etcd";
    pub const PORT: u16 = 2379;
    pub const PREFIX: &str = "/apisix";
    pub const TIMEOUT_SECS: u32 = 30;

    /// Suffix appended after the namespace for cluster-internal DNS names.
    pub const CLUSTER_SUFFIX: &str = "svc.cluster.local";
}

/// Runtime identities.
pub mod identity {
    /// Unprivileged uid/gid the gateway and dashboard run as.
    pub const RUNTIME_UID: i64 = 1000;
    pub const RUNTIME_GID: i64 = 1000;

    /// Identity of the bootstrap stage.
    pub const ROOT_UID: i64 = 0;

    /// Capabilities the bootstrap stage needs for copy and ownership normalization.
    pub const BOOTSTRAP_CAPABILITIES: &[&str] = &["CHOWN", "FOWNER", "DAC_OVERRIDE"];
}

/// Label keys.
pub mod labels {
    pub const APP: &str = "app";
    pub const COMPONENT: &str = "app.kubernetes.io/component";
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    pub const MANAGER: &str = "gantry";
}

/// Environment variable overriding the target namespace.
pub const NAMESPACE_ENV: &str = "GANTRY_NAMESPACE";

/// Namespace used when nothing else is configured.
pub const DEFAULT_NAMESPACE: &str = "default";
