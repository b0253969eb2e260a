//! Task: Cross-role validation.
//!
//! Checks run in a fixed order and the first violation wins:
//!
//! ```text
//! (a) backend      every role resolves the control plane's backend
//! (b) credential   dashboard admin key == control plane admin key
//! (c) address      dashboard control-plane address == admin exposure
//! (d) exposure     exposure and config source names are unique
//! ```

use super::{SynthContext, log_task_error, task_start};
use crate::backend::{BackendReference, Namespace};
use crate::compose::ComposedRole;
use crate::constants::backend as backend_consts;
use crate::pipeline::PipelineTask;
use crate::role::{ControlPlaneParams, RoleKind, RoleParams, RoleSpec};
use crate::topology::Topology;
use crate::topology::types::required;
use gantry_shared::{GantryError, GantryResult};
use std::collections::BTreeMap;

pub struct ValidateTask;

impl PipelineTask<SynthContext> for ValidateTask {
    fn run(&self, ctx: &mut SynthContext) -> GantryResult<()> {
        let task_name = self.name();
        task_start(ctx, task_name);

        let roles = required(&ctx.roles, "role_compose")?;
        let control_plane = validate(&ctx.namespace, &ctx.specs, roles)
            .inspect_err(|e| log_task_error(ctx, task_name, e))?;

        let topology = Topology {
            namespace: ctx.namespace.clone(),
            backend: control_plane.backend.clone(),
            credential: control_plane.admin_key.clone(),
            roles: roles.clone(),
            advisories: roles.iter().flat_map(|r| r.advisories.clone()).collect(),
        };
        ctx.topology = Some(topology);
        Ok(())
    }

    fn name(&self) -> &str {
        "topology_validate"
    }
}

fn inconsistency(
    left: RoleKind,
    right: impl ToString,
    field: &str,
    detail: impl Into<String>,
) -> GantryError {
    GantryError::TopologyInconsistency {
        left: left.to_string(),
        right: right.to_string(),
        field: field.to_string(),
        detail: detail.into(),
    }
}

/// Returns the control plane's parameters, which anchor the topology.
fn validate<'a>(
    namespace: &Namespace,
    specs: &'a [RoleSpec],
    roles: &[ComposedRole],
) -> GantryResult<&'a ControlPlaneParams> {
    let Some((cp_spec, cp_role)) = specs
        .iter()
        .zip(roles)
        .find(|(spec, _)| spec.kind() == RoleKind::ControlPlane)
    else {
        return Err(GantryError::Config("topology has no control plane".into()));
    };
    let RoleParams::ControlPlane(cp) = &cp_spec.params else {
        return Err(GantryError::Config("control plane carries foreign parameters".into()));
    };

    check_backend(namespace, &cp.backend, specs)?;

    for spec in specs {
        let RoleParams::Dashboard(dashboard) = &spec.params else {
            continue;
        };

        // (b)
        let key = dashboard.admin_key.as_ref().ok_or_else(|| {
            GantryError::MissingCrossReference {
                role: spec.kind().to_string(),
                field: "admin_key".into(),
            }
        })?;
        if key != &cp.admin_key {
            return Err(inconsistency(
                RoleKind::ControlPlane,
                spec.kind(),
                "admin_key",
                "dashboard authenticates with a different admin key than the control plane accepts",
            ));
        }

        // (c)
        let address = dashboard.control_plane_address.as_deref().ok_or_else(|| {
            GantryError::MissingCrossReference {
                role: spec.kind().to_string(),
                field: "control_plane_address".into(),
            }
        })?;
        check_address(namespace, address, cp_role)?;
    }

    check_unique_names(roles)?;
    Ok(cp)
}

/// (a) One backend for everyone, and it lives in the topology namespace.
fn check_backend(
    namespace: &Namespace,
    expected: &BackendReference,
    specs: &[RoleSpec],
) -> GantryResult<()> {
    let suffix = format!(".{}.{}", namespace, backend_consts::CLUSTER_SUFFIX);
    if !expected.host().ends_with(&suffix) {
        return Err(GantryError::TopologyInconsistency {
            left: "namespace".into(),
            right: RoleKind::ControlPlane.to_string(),
            field: "backend.address".into(),
            detail: format!("{} is outside namespace {}", expected.address, namespace),
        });
    }

    for spec in specs {
        let backend = spec.params.backend();
        if backend != expected {
            let field = if backend.address != expected.address {
                "backend.address"
            } else if backend.prefix != expected.prefix {
                "backend.prefix"
            } else {
                "backend.timeout"
            };
            return Err(inconsistency(
                RoleKind::ControlPlane,
                spec.kind(),
                field,
                format!("{:?} != {:?}", expected, backend),
            ));
        }
    }
    Ok(())
}

/// (c) The dashboard must reach the admin API through the control plane's
/// actual exposure, by fully qualified name and on an exposed port.
fn check_address(
    namespace: &Namespace,
    address: &str,
    control_plane: &ComposedRole,
) -> GantryResult<()> {
    let mismatch = |detail: String| {
        inconsistency(
            RoleKind::ControlPlane,
            RoleKind::Dashboard,
            "control_plane_address",
            detail,
        )
    };

    let authority = address
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(address)
        .trim_end_matches('/');
    let Some((host, port)) = authority.rsplit_once(':') else {
        return Err(mismatch(format!("{address} carries no port")));
    };

    let exposure = &control_plane.exposure;
    let expected_host = namespace.service_host(&exposure.name);
    if host != expected_host {
        return Err(mismatch(format!(
            "{address} does not name exposure {expected_host}"
        )));
    }

    let exposed = exposure
        .ports
        .iter()
        .any(|mapping| port.parse::<u16>() == Ok(mapping.port));
    if !exposed {
        return Err(mismatch(format!(
            "port {port} is not exposed by {}",
            exposure.name
        )));
    }
    Ok(())
}

/// (d) Names shared across the namespace.
fn check_unique_names(roles: &[ComposedRole]) -> GantryResult<()> {
    let mut exposures: BTreeMap<&str, RoleKind> = BTreeMap::new();
    let mut sources: BTreeMap<&str, RoleKind> = BTreeMap::new();

    for role in roles {
        if let Some(owner) = exposures.insert(&role.exposure.name, role.kind) {
            return Err(inconsistency(
                owner,
                role.kind,
                "exposure",
                format!("both roles claim exposure {}", role.exposure.name),
            ));
        }
        if let Some(owner) = sources.insert(&role.config_source.name, role.kind) {
            return Err(inconsistency(
                owner,
                role.kind,
                "config_source",
                format!("both roles claim config source {}", role.config_source.name),
            ));
        }
    }
    Ok(())
}
