//! Resource emission.
//!
//! A [`ResourceEmitter`] turns the declarations of an assembled [`Topology`]
//! into concrete cluster objects. Emission order is fixed: the namespace,
//! then per role its config source, workload, and exposure. The coordination
//! backend is only ever referenced.

mod kube;

pub use kube::{KubeEmitter, Manifest};

use crate::backend::Namespace;
use crate::compose::{ComposedRole, ConfigSourceDecl, ExposureDecl};
use crate::topology::Topology;
use gantry_shared::{GantryError, GantryResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable reference to an emitted resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// The Config Source, Workload and Exposure collaborators.
pub trait ResourceEmitter {
    fn emit_namespace(&mut self, namespace: &Namespace) -> GantryResult<ResourceRef>;

    fn emit_config_source(
        &mut self,
        namespace: &Namespace,
        source: &ConfigSourceDecl,
    ) -> GantryResult<ResourceRef>;

    /// Emit the workload of `role`, including its bootstrap stage and storage.
    fn emit_workload(
        &mut self,
        namespace: &Namespace,
        role: &ComposedRole,
    ) -> GantryResult<ResourceRef>;

    fn emit_exposure(
        &mut self,
        namespace: &Namespace,
        exposure: &ExposureDecl,
    ) -> GantryResult<ResourceRef>;
}

/// Emit every resource of `topology` in order.
pub fn emit<E: ResourceEmitter>(
    topology: &Topology,
    emitter: &mut E,
) -> GantryResult<Vec<ResourceRef>> {
    let ns = &topology.namespace;
    let mut refs = vec![emitter.emit_namespace(ns)?];

    for role in &topology.roles {
        refs.push(emitter.emit_config_source(ns, &role.config_source)?);
        refs.push(emitter.emit_workload(ns, role)?);
        refs.push(emitter.emit_exposure(ns, &role.exposure)?);
    }

    tracing::debug!(
        namespace = %ns,
        resources = refs.len(),
        backend = %topology.backend.address,
        "Emitted topology resources"
    );
    Ok(refs)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Multi-document YAML stream.
    #[default]
    Yaml,
    /// A single `List` object.
    Json,
}

/// Serialize manifests in the requested format.
pub fn to_string(manifests: &[Manifest], format: OutputFormat) -> GantryResult<String> {
    match format {
        OutputFormat::Yaml => to_yaml(manifests),
        OutputFormat::Json => to_json(manifests),
    }
}

pub fn to_yaml(manifests: &[Manifest]) -> GantryResult<String> {
    let mut out = String::new();
    for manifest in manifests {
        let doc = serde_yaml::to_string(manifest)
            .map_err(|e| GantryError::Serialization(format!("{}: {}", manifest.reference(), e)))?;
        out.push_str("---\n");
        out.push_str(&doc);
    }
    Ok(out)
}

pub fn to_json(manifests: &[Manifest]) -> GantryResult<String> {
    let list = serde_json::json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": manifests,
    });
    let mut out = serde_json::to_string_pretty(&list)
        .map_err(|e| GantryError::Serialization(format!("manifest list: {e}")))?;
    out.push('\n');
    Ok(out)
}

/// Render `topology` as cluster manifests.
pub fn render_manifests(topology: &Topology, format: OutputFormat) -> GantryResult<String> {
    let mut emitter = KubeEmitter::default();
    emit(topology, &mut emitter)?;
    to_string(&emitter.into_manifests(), format)
}
