//! Role composition.
//!
//! Combines a role's declaration, rendered config, and optional bootstrap plan
//! into one self-contained unit: config source, storage, workload, exposure.
//!
//! ```text
//! RoleSpec ──┐
//! Payload ───┼──→ compose ──→ ComposedRole
//! Plan? ─────┘
//! ```

mod mounts;
mod types;

pub use mounts::MountBinding;
pub use types::{
    ComposedRole, ConfigSourceDecl, ContainerSecurity, ExposureDecl, PodSecurity, StageDecl,
    StorageDecl, StorageKind, WorkloadDecl,
};

use crate::advisory::{Advisory, unrestricted_cidrs};
use crate::bootstrap::BootstrapPlan;
use crate::constants::{labels, paths};
use crate::render::ConfigPayload;
use crate::role::{Reachability, RoleKind, RoleParams, RoleSpec, WritableConcern};
use gantry_shared::{GantryError, GantryResult};
use std::collections::{BTreeMap, BTreeSet};

/// Storage declaration name of the mounted config source.
pub const CONFIG_SOURCE_VOLUME: &str = "config-source";

/// Container name of the bootstrap stage.
pub const BOOTSTRAP_STAGE: &str = "bootstrap";

/// Compose one role.
pub fn compose(
    spec: &RoleSpec,
    config: &ConfigPayload,
    plan: Option<&BootstrapPlan>,
) -> GantryResult<ComposedRole> {
    let kind = spec.kind();
    validate_spec(spec, plan)?;

    let config_source = ConfigSourceDecl {
        name: config.name.clone(),
        files: BTreeMap::from([(config.file_name.clone(), config.serialized.clone())]),
    };

    let mut storage = vec![StorageDecl {
        name: CONFIG_SOURCE_VOLUME.to_string(),
        kind: StorageKind::ConfigSource {
            source: config_source.name.clone(),
        },
    }];
    if let Some(plan) = plan {
        storage.push(StorageDecl {
            name: plan.volume.clone(),
            kind: StorageKind::EmptyWritable {
                concern: WritableConcern::Runtime,
            },
        });
    }
    storage.extend(spec.storage.iter().map(|s| StorageDecl {
        name: s.name.clone(),
        kind: StorageKind::EmptyWritable { concern: s.concern },
    }));

    let labels = BTreeMap::from([
        (labels::APP.to_string(), spec.name.clone()),
        (labels::COMPONENT.to_string(), kind.to_string()),
        (labels::MANAGED_BY.to_string(), labels::MANAGER.to_string()),
    ]);
    let selector = BTreeMap::from([(labels::APP.to_string(), spec.name.clone())]);

    let main = StageDecl {
        name: spec.name.clone(),
        image: spec.image.clone(),
        command: None,
        ports: spec.ports.clone(),
        mounts: main_mounts(spec, config, plan),
        security: ContainerSecurity {
            run_as_user: None,
            // Only a numeric non-root uid can be asserted; the image's own user
            // is left for the runtime to resolve.
            run_as_non_root: spec.security.run_as_user.is_some_and(|uid| uid != 0),
            allow_privilege_escalation: false,
            read_only_root_filesystem: spec.security.read_only_root_filesystem,
            add_capabilities: Vec::new(),
        },
    };

    let bootstrap = plan.map(|plan| bootstrap_stage(spec, plan));

    let workload = WorkloadDecl {
        name: spec.name.clone(),
        replicas: spec.replicas,
        labels,
        pod_security: PodSecurity {
            run_as_user: spec.security.run_as_user,
            run_as_group: spec.security.run_as_group,
            fs_group: spec.security.fs_group,
        },
        bootstrap,
        main,
    };

    let exposure = ExposureDecl {
        name: spec.exposure.service_name.clone(),
        reachability: spec.exposure.reachability,
        ports: spec.exposure.ports.clone(),
        selector,
    };

    let mut advisories = Vec::new();
    if let RoleParams::ControlPlane(params) = &spec.params {
        let open = unrestricted_cidrs(&params.allow_admin);
        if !open.is_empty() {
            advisories.push(Advisory::UnrestrictedAdminAccess {
                role: kind,
                cidrs: open,
            });
        }
    }

    tracing::debug!(
        role = %kind,
        workload = %workload.name,
        bootstrap = workload.bootstrap.is_some(),
        storage = storage.len(),
        exposure = %exposure.name,
        "Composed role"
    );

    Ok(ComposedRole {
        kind,
        name: spec.name.clone(),
        payload: config.clone(),
        plan: plan.cloned(),
        config_source,
        storage,
        workload,
        exposure,
        advisories,
    })
}

fn invalid(kind: RoleKind, reason: impl Into<String>) -> GantryError {
    GantryError::InvalidRoleSpec {
        role: kind.to_string(),
        reason: reason.into(),
    }
}

fn validate_spec(spec: &RoleSpec, plan: Option<&BootstrapPlan>) -> GantryResult<()> {
    let kind = spec.kind();

    if spec.replicas == 0 {
        return Err(invalid(kind, "replicas must be at least 1"));
    }
    if spec.ports.is_empty() {
        return Err(invalid(kind, "workload declares no ports"));
    }
    if spec.security.run_as_user == Some(0) && !spec.security.allow_root {
        return Err(invalid(kind, "runs as uid 0 but root is not permitted"));
    }
    if plan.is_some() && !spec.security.allow_root {
        return Err(invalid(
            kind,
            "bootstrap stage needs root for ownership normalization but root is not permitted",
        ));
    }
    if kind == RoleKind::ControlPlane && spec.exposure.reachability != Reachability::ClusterInternal
    {
        return Err(invalid(kind, "admin API must only be exposed cluster-internal"));
    }

    let mut names = BTreeSet::from([CONFIG_SOURCE_VOLUME]);
    if let Some(plan) = plan {
        names.insert(plan.volume.as_str());
    }
    for storage in &spec.storage {
        if !names.insert(storage.name.as_str()) {
            return Err(invalid(
                kind,
                format!("storage name {} is declared twice", storage.name),
            ));
        }
    }

    // Only main-container ports may be exposed; the bootstrap stage has none.
    for mapping in &spec.exposure.ports {
        if !spec.ports.iter().any(|p| p.number == mapping.target_port) {
            return Err(invalid(
                kind,
                format!(
                    "exposure targets port {} which the workload does not listen on",
                    mapping.target_port
                ),
            ));
        }
    }
    Ok(())
}

/// Config mount strategy:
/// - bootstrap plan: the writable runtime volume at the plan target
/// - runtime owns sibling files: only the config file, via sub-path
/// - otherwise: the whole config source at the conf directory
fn main_mounts(
    spec: &RoleSpec,
    config: &ConfigPayload,
    plan: Option<&BootstrapPlan>,
) -> Vec<MountBinding> {
    let runtime = &spec.runtime;
    let config_mount = match plan {
        Some(plan) => MountBinding::new(&plan.volume, &plan.target),
        None if runtime.owns_conf_siblings => {
            MountBinding::new(CONFIG_SOURCE_VOLUME, runtime.config_path())
                .read_only()
                .sub_path(&config.file_name)
        }
        None => MountBinding::new(CONFIG_SOURCE_VOLUME, &runtime.conf_dir).read_only(),
    };

    std::iter::once(config_mount)
        .chain(spec.storage.iter().map(|s| {
            let mount = MountBinding::new(&s.name, &s.mount_path);
            match &s.sub_path {
                Some(sub_path) => mount.sub_path(sub_path),
                None => mount,
            }
        }))
        .collect()
}

fn bootstrap_stage(spec: &RoleSpec, plan: &BootstrapPlan) -> StageDecl {
    StageDecl {
        name: BOOTSTRAP_STAGE.to_string(),
        image: spec.image.clone(),
        command: Some(plan.command()),
        ports: Vec::new(),
        mounts: vec![
            MountBinding::new(CONFIG_SOURCE_VOLUME, paths::BOOTSTRAP_SOURCE).read_only(),
            MountBinding::new(&plan.volume, paths::BOOTSTRAP_TARGET),
        ],
        security: ContainerSecurity {
            run_as_user: Some(plan.privilege.run_as_user),
            run_as_non_root: false,
            allow_privilege_escalation: false,
            read_only_root_filesystem: true,
            add_capabilities: plan.privilege.capabilities.clone(),
        },
    }
}
