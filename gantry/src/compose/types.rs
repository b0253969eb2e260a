//! Declarations produced by the role composer.
//!
//! These describe resources without committing to a cluster object model;
//! the manifest emitter translates them.

use super::mounts::MountBinding;
use crate::advisory::Advisory;
use crate::bootstrap::BootstrapPlan;
use crate::render::ConfigPayload;
use crate::role::{NamedPort, PortMapping, Reachability, RoleKind, WritableConcern};
use std::collections::BTreeMap;

/// Read-only configuration source: logical name plus file name → content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSourceDecl {
    pub name: String,
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// Backed by a config source, read-only.
    ConfigSource { source: String },
    /// Empty at pod start, writable.
    EmptyWritable { concern: WritableConcern },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDecl {
    pub name: String,
    pub kind: StorageKind,
}

/// Container-level security settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSecurity {
    /// Overrides the pod-level uid when set.
    pub run_as_user: Option<i64>,
    pub run_as_non_root: bool,
    pub allow_privilege_escalation: bool,
    pub read_only_root_filesystem: bool,
    pub add_capabilities: Vec<String>,
}

/// One container of the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDecl {
    pub name: String,
    pub image: String,
    pub command: Option<Vec<String>>,
    pub ports: Vec<NamedPort>,
    pub mounts: Vec<MountBinding>,
    pub security: ContainerSecurity,
}

/// Pod-level identity. Unset fields keep the image's defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSecurity {
    pub run_as_user: Option<i64>,
    pub run_as_group: Option<i64>,
    pub fs_group: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadDecl {
    pub name: String,
    pub replicas: u32,
    pub labels: BTreeMap<String, String>,
    pub pod_security: PodSecurity,
    /// Runs to completion before `main` starts.
    pub bootstrap: Option<StageDecl>,
    pub main: StageDecl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureDecl {
    pub name: String,
    pub reachability: Reachability,
    pub ports: Vec<PortMapping>,
    pub selector: BTreeMap<String, String>,
}

/// A self-contained role unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedRole {
    pub kind: RoleKind,
    pub name: String,
    pub payload: ConfigPayload,
    pub plan: Option<BootstrapPlan>,
    pub config_source: ConfigSourceDecl,
    pub storage: Vec<StorageDecl>,
    pub workload: WorkloadDecl,
    pub exposure: ExposureDecl,
    pub advisories: Vec<Advisory>,
}

impl ComposedRole {
    /// Every container of the workload, bootstrap stage first.
    pub fn stages(&self) -> impl Iterator<Item = &StageDecl> {
        self.workload
            .bootstrap
            .iter()
            .chain(std::iter::once(&self.workload.main))
    }
}
