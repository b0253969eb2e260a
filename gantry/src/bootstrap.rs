//! Bootstrap planning.
//!
//! A config source is mounted read-only. When a role's runtime has to write
//! into the tree its configuration lives in, a bootstrap stage materializes a
//! writable copy before the main container starts:
//!
//! ```text
//! 1. Seed     packaged default tree  → writable volume
//! 2. Overlay  read-only config source → writable volume
//! 3. Chown    writable volume         → runtime uid:gid
//! ```
//!
//! Roles whose writes all land on declared empty-writable volumes get no plan;
//! their config source is mounted directly.

use crate::constants::{identity, paths};
use crate::role::{RoleSpec, WritableScope, is_within};
use gantry_shared::{GantryError, GantryResult};
use serde::{Deserialize, Serialize};

/// Storage declaration name of a writable runtime conf directory.
pub const RUNTIME_CONF_VOLUME: &str = "runtime-conf";

/// Storage declaration name of a writable runtime installation root.
pub const RUNTIME_ROOT_VOLUME: &str = "runtime-root";

/// One preparatory step, executed in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BootstrapStep {
    /// Copy the image's packaged tree, preserving structure and modes.
    Seed { source: String, destination: String },
    /// Copy configuration files over the seeded tree, dereferencing symlinks.
    Overlay { source: String, destination: String },
    /// Hand the tree to the runtime identity.
    Chown { path: String, uid: i64, gid: i64 },
}

impl BootstrapStep {
    pub fn source(&self) -> Option<&str> {
        match self {
            BootstrapStep::Seed { source, .. } | BootstrapStep::Overlay { source, .. } => {
                Some(source)
            }
            BootstrapStep::Chown { .. } => None,
        }
    }

    /// Path the step writes to.
    pub fn destination(&self) -> &str {
        match self {
            BootstrapStep::Seed { destination, .. }
            | BootstrapStep::Overlay { destination, .. } => destination,
            BootstrapStep::Chown { path, .. } => path,
        }
    }

    /// Whether the step only reads its source.
    pub fn read_only_source(&self) -> bool {
        !matches!(self, BootstrapStep::Chown { .. })
    }

    fn shell(&self) -> String {
        match self {
            BootstrapStep::Seed {
                source,
                destination,
            } => format!("cp -a {source}/. {destination}/"),
            BootstrapStep::Overlay {
                source,
                destination,
            } => format!("cp -L {source}/* {destination}/"),
            BootstrapStep::Chown { path, uid, gid } => format!("chown -R {uid}:{gid} {path}"),
        }
    }
}

/// Privilege the bootstrap stage runs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub run_as_user: i64,
    pub capabilities: Vec<String>,
}

impl Privilege {
    fn bootstrap() -> Self {
        Self {
            run_as_user: identity::ROOT_UID,
            capabilities: identity::BOOTSTRAP_CAPABILITIES
                .iter()
                .map(|cap| cap.to_string())
                .collect(),
        }
    }
}

/// Ordered preparatory steps for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapPlan {
    /// Directory the main container needs writable.
    pub target: String,
    /// Storage declaration backing `target`.
    pub volume: String,
    pub steps: Vec<BootstrapStep>,
    pub privilege: Privilege,
}

impl BootstrapPlan {
    /// Command for the bootstrap stage. Steps are chained so a failure stops the stage.
    pub fn command(&self) -> Vec<String> {
        let script = self
            .steps
            .iter()
            .map(BootstrapStep::shell)
            .collect::<Vec<_>>()
            .join(" && ");
        vec!["sh".to_string(), "-c".to_string(), script]
    }
}

/// Plan the bootstrap stage for `spec`, or `None` when the config source can be
/// mounted directly.
pub fn plan(spec: &RoleSpec) -> GantryResult<Option<BootstrapPlan>> {
    let role = spec.kind();
    let runtime = &spec.runtime;

    let pending = pending_writes(spec);
    if pending.is_empty() {
        tracing::debug!(role = %role, "No writable overlay needed, mounting config directly");
        return Ok(None);
    }

    let target = match runtime.writable_scope {
        WritableScope::RuntimeRoot => runtime.root.clone(),
        WritableScope::Minimal if pending.iter().all(|w| is_within(w, &runtime.conf_dir)) => {
            runtime.conf_dir.clone()
        }
        WritableScope::Minimal => runtime.root.clone(),
    };

    let unresolvable = || GantryError::UnresolvableBootstrapSource {
        role: role.to_string(),
        target: target.clone(),
    };

    // Writes outside the installation root have no packaged tree to seed from.
    if pending.iter().any(|w| !is_within(w, &target)) {
        return Err(unresolvable());
    }
    let packaged_root = runtime.packaged_root.as_deref().ok_or_else(unresolvable)?;
    let relative = target
        .strip_prefix(runtime.root.trim_end_matches('/'))
        .ok_or_else(unresolvable)?;
    let seed_source = format!("{}{}", packaged_root.trim_end_matches('/'), relative);

    for path in [&seed_source, &target] {
        if !is_shell_safe(path) {
            return Err(GantryError::InvalidRoleSpec {
                role: role.to_string(),
                reason: format!("path {path:?} cannot be used in a bootstrap command"),
            });
        }
    }

    // The tree is handed to the runtime uid, so the image's own user cannot be
    // the recipient; its uid is not known here.
    let (Some(uid), Some(gid)) = (spec.security.run_as_user, spec.security.run_as_group) else {
        return Err(GantryError::InvalidRoleSpec {
            role: role.to_string(),
            reason: format!("bootstrap of {target} needs an explicit runtime uid and gid"),
        });
    };

    let volume = if target == runtime.conf_dir {
        RUNTIME_CONF_VOLUME
    } else {
        RUNTIME_ROOT_VOLUME
    };

    let plan = BootstrapPlan {
        target: target.clone(),
        volume: volume.to_string(),
        steps: vec![
            BootstrapStep::Seed {
                source: seed_source,
                destination: paths::BOOTSTRAP_TARGET.to_string(),
            },
            BootstrapStep::Overlay {
                source: paths::BOOTSTRAP_SOURCE.to_string(),
                destination: overlay_destination(runtime, &target),
            },
            BootstrapStep::Chown {
                path: paths::BOOTSTRAP_TARGET.to_string(),
                uid,
                gid,
            },
        ],
        privilege: Privilege::bootstrap(),
    };

    tracing::debug!(
        role = %role,
        target = %plan.target,
        pending = ?pending,
        "Planned bootstrap stage"
    );
    Ok(Some(plan))
}

/// Writes not satisfied by the role's empty-writable volumes or the image layer.
///
/// The image layer only takes writes from the image's own user on a writable
/// root filesystem. Any other uid does not own the packaged tree.
fn pending_writes(spec: &RoleSpec) -> Vec<&str> {
    let runtime = &spec.runtime;
    let image_layer_writable =
        !spec.security.read_only_root_filesystem && spec.security.is_image_identity();
    spec.runtime
        .writes
        .iter()
        .map(String::as_str)
        .filter(|w| !spec.storage.iter().any(|s| s.covers(w)))
        .filter(|w| {
            // A directory-mounted config source shadows its whole directory.
            let shadowed = !runtime.owns_conf_siblings && is_within(w, &runtime.conf_dir);
            !image_layer_writable || shadowed
        })
        .collect()
}

/// Where in the writable volume the config source's files belong.
fn overlay_destination(runtime: &crate::role::RuntimeLayout, target: &str) -> String {
    let relative = runtime
        .conf_dir
        .strip_prefix(target.trim_end_matches('/'))
        .unwrap_or_default();
    format!("{}{}", paths::BOOTSTRAP_TARGET, relative)
}

fn is_shell_safe(path: &str) -> bool {
    path.starts_with('/')
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::TopologyOptions;
    use crate::role::{RoleKind, blueprint};

    fn create_test_spec(kind: RoleKind) -> RoleSpec {
        let options = TopologyOptions {
            admin_key: Some("K1".into()),
            ..Default::default()
        };
        blueprint(&options)
            .unwrap()
            .roles
            .into_iter()
            .find(|r| r.kind() == kind)
            .unwrap()
    }

    #[test]
    fn test_control_plane_plan_seeds_conf_dir() {
        let spec = create_test_spec(RoleKind::ControlPlane);
        let plan = plan(&spec).unwrap().expect("control plane needs a plan");

        assert_eq!(plan.target, "/usr/local/apisix/conf");
        assert_eq!(plan.volume, RUNTIME_CONF_VOLUME);
        assert_eq!(
            plan.steps,
            vec![
                BootstrapStep::Seed {
                    source: "/usr/local/apisix/conf".into(),
                    destination: "/bootstrap/target".into(),
                },
                BootstrapStep::Overlay {
                    source: "/bootstrap/source".into(),
                    destination: "/bootstrap/target".into(),
                },
                BootstrapStep::Chown {
                    path: "/bootstrap/target".into(),
                    uid: 1000,
                    gid: 1000,
                },
            ]
        );
        assert_eq!(plan.privilege.run_as_user, 0);
        assert!(plan.privilege.capabilities.contains(&"CHOWN".to_string()));
    }

    #[test]
    fn test_chown_is_last_and_targets_writable_volume() {
        let spec = create_test_spec(RoleKind::ControlPlane);
        let plan = plan(&spec).unwrap().unwrap();

        let last = plan.steps.last().unwrap();
        assert!(matches!(last, BootstrapStep::Chown { .. }));
        assert!(!last.read_only_source());
        assert_eq!(last.destination(), paths::BOOTSTRAP_TARGET);
        assert_ne!(last.destination(), paths::BOOTSTRAP_SOURCE);

        let copies: Vec<_> = plan.steps[..plan.steps.len() - 1].iter().collect();
        assert_eq!(copies.len(), 2);
        assert!(copies.iter().all(|s| s.read_only_source()));
    }

    #[test]
    fn test_command_chains_steps_in_order() {
        let spec = create_test_spec(RoleKind::ControlPlane);
        let command = plan(&spec).unwrap().unwrap().command();
        assert_eq!(command[..2], ["sh".to_string(), "-c".to_string()]);
        assert_eq!(
            command[2],
            "cp -a /usr/local/apisix/conf/. /bootstrap/target/ && \
             cp -L /bootstrap/source/* /bootstrap/target/ && \
             chown -R 1000:1000 /bootstrap/target"
        );
    }

    #[test]
    fn test_full_tree_scope() {
        let mut spec = create_test_spec(RoleKind::ControlPlane);
        spec.runtime.writable_scope = WritableScope::RuntimeRoot;
        let plan = plan(&spec).unwrap().unwrap();
        assert_eq!(plan.target, "/usr/local/apisix");
        assert_eq!(plan.volume, RUNTIME_ROOT_VOLUME);
        assert_eq!(
            plan.steps[0].source(),
            Some("/usr/local/apisix")
        );
        assert_eq!(plan.steps[1].destination(), "/bootstrap/target/conf");
    }

    #[test]
    fn test_no_plan_when_writes_are_covered() {
        assert!(plan(&create_test_spec(RoleKind::DataPlane)).unwrap().is_none());
        assert!(plan(&create_test_spec(RoleKind::Dashboard)).unwrap().is_none());
    }

    #[test]
    fn test_non_owner_uid_needs_plan_on_writable_root() {
        let mut spec = create_test_spec(RoleKind::DataPlane);
        spec.security.run_as_user = Some(1000);
        spec.security.run_as_group = Some(1000);
        assert!(!spec.security.read_only_root_filesystem);

        let plan = plan(&spec).unwrap().expect("uid 1000 does not own the image tree");
        assert_eq!(plan.target, "/usr/local/apisix/conf");
        assert_eq!(
            plan.steps.last(),
            Some(&BootstrapStep::Chown {
                path: "/bootstrap/target".into(),
                uid: 1000,
                gid: 1000,
            })
        );
    }

    #[test]
    fn test_image_identity_on_read_only_root_needs_explicit_uid() {
        let mut spec = create_test_spec(RoleKind::DataPlane);
        spec.security.read_only_root_filesystem = true;
        match plan(&spec).unwrap_err() {
            GantryError::InvalidRoleSpec { role, reason } => {
                assert_eq!(role, "data-plane");
                assert!(reason.contains("explicit runtime uid"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_directory_mount_shadowing_requires_plan() {
        let mut spec = create_test_spec(RoleKind::Dashboard);
        spec.runtime.owns_conf_siblings = false;
        spec.runtime
            .writes
            .push("/usr/local/apisix-dashboard/conf/schema.json".into());
        let dashboard_plan = plan(&spec).unwrap().unwrap();
        assert_eq!(dashboard_plan.target, "/usr/local/apisix-dashboard/conf");

        // The image's own user still cannot write under a directory mount.
        let mut spec = create_test_spec(RoleKind::DataPlane);
        spec.runtime.owns_conf_siblings = false;
        assert!(matches!(
            plan(&spec),
            Err(GantryError::InvalidRoleSpec { .. })
        ));
    }

    #[test]
    fn test_missing_packaged_tree_is_unresolvable() {
        let mut spec = create_test_spec(RoleKind::ControlPlane);
        spec.runtime.packaged_root = None;
        let err = plan(&spec).unwrap_err();
        match err {
            GantryError::UnresolvableBootstrapSource { role, target } => {
                assert_eq!(role, "control-plane");
                assert_eq!(target, "/usr/local/apisix/conf");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_outside_runtime_root_is_unresolvable() {
        let mut spec = create_test_spec(RoleKind::ControlPlane);
        spec.runtime.writes.push("/var/run/apisix.pid".into());
        assert!(matches!(
            plan(&spec),
            Err(GantryError::UnresolvableBootstrapSource { .. })
        ));
    }
}
