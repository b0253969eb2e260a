//! Type definitions for the synthesis pipeline.

use super::Topology;
use crate::backend::Namespace;
use crate::bootstrap::BootstrapPlan;
use crate::compose::ComposedRole;
use crate::render::ConfigPayload;
use crate::role::RoleSpec;
use gantry_shared::{GantryError, GantryResult};

/// Shared state of one synthesis run.
///
/// Each task fills exactly one output slot; later tasks read the slots of
/// earlier ones. All vectors are index-aligned with `specs`.
pub struct SynthContext {
    pub namespace: Namespace,
    pub specs: Vec<RoleSpec>,
    pub payloads: Option<Vec<ConfigPayload>>,
    pub plans: Option<Vec<Option<BootstrapPlan>>>,
    pub roles: Option<Vec<ComposedRole>>,
    pub topology: Option<Topology>,
}

impl SynthContext {
    pub fn new(namespace: Namespace, specs: Vec<RoleSpec>) -> Self {
        Self {
            namespace,
            specs,
            payloads: None,
            plans: None,
            roles: None,
            topology: None,
        }
    }
}

/// Borrow the output of an earlier task.
pub(crate) fn required<'a, T>(slot: &'a Option<T>, task: &str) -> GantryResult<&'a T> {
    slot.as_ref()
        .ok_or_else(|| GantryError::Config(format!("{task} task must run first")))
}
