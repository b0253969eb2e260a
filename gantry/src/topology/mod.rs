//! Topology assembly.
//!
//! ## Architecture
//!
//! Assembly is a table-driven, sequential pipeline over one [`SynthContext`]:
//!
//! ```text
//!   1. ConfigRender       (render every role's payload)
//!   2. BootstrapPlan      (plan writable trees; unresolvable sources stop here)
//!   3. RoleCompose        (storage, workload, exposure per role)
//!   4. TopologyValidate   (cross-role invariants, builds the Topology)
//! ```
//!
//! Nothing is emitted unless every stage succeeds, so a failed run leaves no
//! partial topology behind.

mod tasks;
mod types;

pub use types::SynthContext;

use crate::advisory::Advisory;
use crate::backend::{BackendReference, Namespace};
use crate::compose::ComposedRole;
use crate::credential::SharedCredential;
use crate::pipeline::{
    BoxedTask, ExecutionPlan, PipelineBuilder, PipelineExecutor, PipelineMetrics, Stage,
};
use crate::role::{RoleKind, RoleSpec};
use gantry_shared::{GantryError, GantryResult};
use tasks::{ComposeTask, PlanTask, RenderTask, ValidateTask};

/// The assembled resource graph of one synthesis run.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub namespace: Namespace,
    pub backend: BackendReference,
    pub credential: SharedCredential,
    /// Control plane, data plane, dashboard; absent roles are skipped.
    pub roles: Vec<ComposedRole>,
    pub advisories: Vec<Advisory>,
}

impl Topology {
    pub fn role(&self, kind: RoleKind) -> Option<&ComposedRole> {
        self.roles.iter().find(|r| r.kind == kind)
    }
}

fn get_execution_plan() -> ExecutionPlan<SynthContext> {
    let stages: Vec<Stage<BoxedTask<SynthContext>>> = vec![
        Stage::new("render", vec![Box::new(RenderTask)]),
        Stage::new("plan", vec![Box::new(PlanTask)]),
        Stage::new("compose", vec![Box::new(ComposeTask)]),
        Stage::new("validate", vec![Box::new(ValidateTask)]),
    ];
    ExecutionPlan::new(stages)
}

/// Assemble role declarations into a validated topology.
///
/// Roles are put into canonical order first. Each kind may appear at most
/// once and the control plane is mandatory.
pub fn assemble(namespace: &Namespace, specs: Vec<RoleSpec>) -> GantryResult<Topology> {
    let specs = canonical_order(specs)?;
    let mut ctx = SynthContext::new(namespace.clone(), specs);

    let pipeline = PipelineBuilder::from_plan(get_execution_plan());
    let metrics = PipelineExecutor::execute(pipeline, &mut ctx)?;
    log_metrics(namespace, &metrics);

    ctx.topology
        .ok_or_else(|| GantryError::Config("topology_validate task produced no topology".into()))
}

fn canonical_order(mut specs: Vec<RoleSpec>) -> GantryResult<Vec<RoleSpec>> {
    specs.sort_by_key(RoleSpec::kind);

    for pair in specs.windows(2) {
        if pair[0].kind() == pair[1].kind() {
            return Err(GantryError::InvalidRoleSpec {
                role: pair[1].kind().to_string(),
                reason: format!("declared twice ({} and {})", pair[0].name, pair[1].name),
            });
        }
    }

    if specs.first().map(RoleSpec::kind) != Some(RoleKind::ControlPlane) {
        return Err(GantryError::InvalidRoleSpec {
            role: RoleKind::ControlPlane.to_string(),
            reason: "every topology needs a control plane".into(),
        });
    }
    Ok(specs)
}

fn log_metrics(namespace: &Namespace, metrics: &PipelineMetrics) {
    for stage in &metrics.stages {
        for task in &stage.tasks {
            tracing::debug!(
                namespace = %namespace,
                stage = %stage.name,
                task = %task.name,
                duration_us = task.duration_us as u64,
                "Synthesis task finished"
            );
        }
    }
    tracing::debug!(
        namespace = %namespace,
        total_us = metrics.total_duration_us as u64,
        "Topology assembled"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::SharedCredential;
    use crate::options::TopologyOptions;
    use crate::role::{RoleParams, blueprint};

    fn create_test_specs() -> (Namespace, Vec<RoleSpec>) {
        let options = TopologyOptions {
            admin_key: Some("K1".into()),
            ..Default::default()
        };
        let blueprint = blueprint(&options).unwrap();
        (blueprint.namespace, blueprint.roles)
    }

    fn dashboard_params(specs: &mut [RoleSpec]) -> &mut crate::role::DashboardParams {
        specs
            .iter_mut()
            .find_map(|s| match &mut s.params {
                RoleParams::Dashboard(p) => Some(p),
                _ => None,
            })
            .unwrap()
    }

    fn assert_inconsistent(err: GantryError, expected_field: &str) {
        match err {
            GantryError::TopologyInconsistency { left, right, field, .. } => {
                assert_eq!(field, expected_field);
                assert_ne!(left, right);
            }
            other => panic!("expected TopologyInconsistency, got {other:?}"),
        }
    }

    #[test]
    fn test_assemble_default_topology() {
        let (ns, specs) = create_test_specs();
        let topology = assemble(&ns, specs).unwrap();

        let kinds: Vec<RoleKind> = topology.roles.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, RoleKind::ALL.to_vec());
        assert_eq!(topology.credential, SharedCredential::new("K1"));
        assert_eq!(
            topology.backend.address,
            "http://etcd.default.svc.cluster.local:2379"
        );
        assert_eq!(
            topology.role(RoleKind::DataPlane).unwrap().payload.admin_enabled(),
            Some(false)
        );
        assert_eq!(topology.advisories.len(), 1);
    }

    #[test]
    fn test_assemble_canonicalizes_order() {
        let (ns, mut specs) = create_test_specs();
        specs.reverse();
        let topology = assemble(&ns, specs).unwrap();
        assert_eq!(topology.roles[0].kind, RoleKind::ControlPlane);
        assert_eq!(topology.roles[2].kind, RoleKind::Dashboard);
    }

    #[test]
    fn test_assemble_rejects_duplicate_role() {
        let (ns, mut specs) = create_test_specs();
        specs.push(specs[1].clone());
        let err = assemble(&ns, specs).unwrap_err();
        assert!(matches!(err, GantryError::InvalidRoleSpec { .. }));
    }

    #[test]
    fn test_assemble_requires_control_plane() {
        let (ns, mut specs) = create_test_specs();
        specs.remove(0);
        let err = assemble(&ns, specs).unwrap_err();
        assert!(matches!(err, GantryError::InvalidRoleSpec { .. }));
    }

    #[test]
    fn test_backend_mismatch_names_roles() {
        let (ns, mut specs) = create_test_specs();
        if let RoleParams::DataPlane(p) = &mut specs[1].params {
            p.backend.prefix = "/other".into();
        }
        match assemble(&ns, specs).unwrap_err() {
            GantryError::TopologyInconsistency { left, right, field, .. } => {
                assert_eq!(left, "control-plane");
                assert_eq!(right, "data-plane");
                assert_eq!(field, "backend.prefix");
            }
            other => panic!("expected TopologyInconsistency, got {other:?}"),
        }
    }

    #[test]
    fn test_backend_outside_namespace() {
        let (_, specs) = create_test_specs();
        let other = Namespace::new("other").unwrap();
        let err = assemble(&other, specs).unwrap_err();
        assert_inconsistent(err, "backend.address");
    }

    #[test]
    fn test_credential_mismatch() {
        let (ns, mut specs) = create_test_specs();
        dashboard_params(&mut specs).admin_key = Some(SharedCredential::new("K2"));
        assert_inconsistent(assemble(&ns, specs).unwrap_err(), "admin_key");
    }

    #[test]
    fn test_dashboard_address_must_match_exposure() {
        let (ns, mut specs) = create_test_specs();
        dashboard_params(&mut specs).control_plane_address =
            Some("http://apisix-control.default.svc.cluster.local:9180".into());
        assert_inconsistent(assemble(&ns, specs).unwrap_err(), "control_plane_address");

        let (ns, mut specs) = create_test_specs();
        dashboard_params(&mut specs).control_plane_address =
            Some("http://apisix-admin.default.svc.cluster.local:9080".into());
        assert_inconsistent(assemble(&ns, specs).unwrap_err(), "control_plane_address");
    }

    #[test]
    fn test_duplicate_exposure_names() {
        let (ns, mut specs) = create_test_specs();
        specs[2].exposure.service_name = specs[1].exposure.service_name.clone();
        assert_inconsistent(assemble(&ns, specs).unwrap_err(), "exposure");
    }

    #[test]
    fn test_unresolvable_source_halts_before_composition() {
        let (ns, mut specs) = create_test_specs();
        specs[0].runtime.packaged_root = None;

        let mut ctx = SynthContext::new(ns, specs);
        let pipeline = PipelineBuilder::from_plan(get_execution_plan());
        let err = PipelineExecutor::execute(pipeline, &mut ctx).unwrap_err();

        assert!(matches!(err, GantryError::UnresolvableBootstrapSource { .. }));
        assert!(ctx.payloads.is_some());
        assert!(ctx.roles.is_none());
        assert!(ctx.topology.is_none());
    }
}
