//! Gantry composes a role-partitioned APISIX gateway deployment.
//!
//! A control plane, a data plane and a dashboard share one etcd backend and
//! one admin credential. Gantry derives every cross-role value once and
//! validates that the composed roles agree before anything is emitted.
//!
//! ```text
//! TopologyOptions ─→ blueprint ─→ assemble ─→ Topology ─→ emit ─→ manifests
//!                                   │
//!                  render → plan → compose → validate
//! ```

pub mod advisory;
pub mod backend;
pub mod bootstrap;
pub mod compose;
pub mod constants;
pub mod credential;
pub mod logging;
pub mod manifest;
pub mod options;
pub mod pipeline;
pub mod render;
pub mod role;
pub mod topology;

pub use advisory::Advisory;
pub use backend::{BackendLocator, BackendReference, Namespace, locate};
pub use bootstrap::{BootstrapPlan, BootstrapStep, plan};
pub use compose::{ComposedRole, compose};
pub use credential::SharedCredential;
pub use gantry_shared::{GantryError, GantryResult};
pub use logging::init_logging;
pub use manifest::{KubeEmitter, Manifest, OutputFormat, ResourceEmitter, render_manifests};
pub use options::TopologyOptions;
pub use render::{ConfigPayload, render};
pub use role::{RoleKind, RoleParams, RoleSpec};
pub use topology::{Topology, assemble};

/// Build, assemble and validate the topology described by `options`.
///
/// Advisories raised while building the role declarations come first,
/// followed by those raised during composition. Every advisory is logged.
pub fn synthesize(options: &TopologyOptions) -> GantryResult<Topology> {
    let blueprint = role::blueprint(options)?;
    let mut topology = assemble(&blueprint.namespace, blueprint.roles)?;

    let mut advisories = blueprint.advisories;
    advisories.append(&mut topology.advisories);
    for advisory in &advisories {
        advisory.log();
    }
    topology.advisories = advisories;

    tracing::info!(
        namespace = %topology.namespace,
        roles = topology.roles.len(),
        advisories = topology.advisories.len(),
        "Synthesized topology"
    );
    Ok(topology)
}

/// Process exit code for a failure. The first `GantryError` in the cause chain
/// decides; anything else is a generic failure.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<GantryError>())
        .map(GantryError::exit_code)
        .unwrap_or(1)
}
