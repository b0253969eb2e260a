//! Kubernetes object emission.

use super::{ResourceEmitter, ResourceRef};
use crate::backend::Namespace;
use crate::compose::{
    ComposedRole, ConfigSourceDecl, ContainerSecurity, ExposureDecl, MountBinding, PodSecurity,
    StageDecl, StorageDecl, StorageKind,
};
use crate::role::Reachability;
use gantry_shared::{GantryError, GantryResult};
use k8s_openapi::Resource;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource,
    Namespace as NamespaceObject, PodSecurityContext, PodSpec, PodTemplateSpec, SecurityContext,
    Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;
use std::collections::BTreeMap;

const TCP: &str = "TCP";

/// One emitted cluster object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Manifest {
    Namespace(NamespaceObject),
    ConfigMap(ConfigMap),
    Deployment(Deployment),
    Service(Service),
}

impl Manifest {
    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::Namespace(_) => NamespaceObject::KIND,
            Manifest::ConfigMap(_) => ConfigMap::KIND,
            Manifest::Deployment(_) => Deployment::KIND,
            Manifest::Service(_) => Service::KIND,
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        match self {
            Manifest::Namespace(o) => &o.metadata,
            Manifest::ConfigMap(o) => &o.metadata,
            Manifest::Deployment(o) => &o.metadata,
            Manifest::Service(o) => &o.metadata,
        }
    }

    pub fn reference(&self) -> ResourceRef {
        let meta = self.metadata();
        ResourceRef {
            kind: self.kind().to_string(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

/// Collects `k8s-openapi` objects in emission order.
#[derive(Debug, Default)]
pub struct KubeEmitter {
    manifests: Vec<Manifest>,
}

impl KubeEmitter {
    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    pub fn into_manifests(self) -> Vec<Manifest> {
        self.manifests
    }

    fn push(&mut self, manifest: Manifest) -> ResourceRef {
        let reference = manifest.reference();
        tracing::trace!(resource = %reference, "Emitted manifest");
        self.manifests.push(manifest);
        reference
    }
}

fn metadata(namespace: &Namespace, name: &str, labels: Option<&BTreeMap<String, String>>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: labels.cloned(),
        ..Default::default()
    }
}

fn port_number(port: u16) -> i32 {
    i32::from(port)
}

impl ResourceEmitter for KubeEmitter {
    fn emit_namespace(&mut self, namespace: &Namespace) -> GantryResult<ResourceRef> {
        Ok(self.push(Manifest::Namespace(NamespaceObject {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        })))
    }

    fn emit_config_source(
        &mut self,
        namespace: &Namespace,
        source: &ConfigSourceDecl,
    ) -> GantryResult<ResourceRef> {
        Ok(self.push(Manifest::ConfigMap(ConfigMap {
            metadata: metadata(namespace, &source.name, None),
            data: Some(source.files.clone()),
            ..Default::default()
        })))
    }

    fn emit_workload(
        &mut self,
        namespace: &Namespace,
        role: &ComposedRole,
    ) -> GantryResult<ResourceRef> {
        let workload = &role.workload;
        let replicas = i32::try_from(workload.replicas).map_err(|_| GantryError::InvalidRoleSpec {
            role: role.kind.to_string(),
            reason: format!("replica count {} is out of range", workload.replicas),
        })?;

        let pod = PodSpec {
            init_containers: workload.bootstrap.as_ref().map(|stage| vec![container(stage)]),
            containers: vec![container(&workload.main)],
            security_context: pod_security_context(&workload.pod_security),
            volumes: Some(role.storage.iter().map(volume).collect()),
            ..Default::default()
        };

        Ok(self.push(Manifest::Deployment(Deployment {
            metadata: metadata(namespace, &workload.name, Some(&workload.labels)),
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: LabelSelector {
                    match_labels: Some(role.exposure.selector.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(workload.labels.clone()),
                        ..Default::default()
                    }),
                    spec: Some(pod),
                },
                ..Default::default()
            }),
            ..Default::default()
        })))
    }

    fn emit_exposure(
        &mut self,
        namespace: &Namespace,
        exposure: &ExposureDecl,
    ) -> GantryResult<ResourceRef> {
        let service_type = match exposure.reachability {
            Reachability::ClusterInternal => "ClusterIP",
            Reachability::External => "LoadBalancer",
        };
        let ports = exposure
            .ports
            .iter()
            .map(|mapping| ServicePort {
                name: mapping.name.clone(),
                port: port_number(mapping.port),
                target_port: Some(IntOrString::Int(port_number(mapping.target_port))),
                protocol: Some(TCP.to_string()),
                ..Default::default()
            })
            .collect();

        Ok(self.push(Manifest::Service(Service {
            metadata: metadata(namespace, &exposure.name, None),
            spec: Some(ServiceSpec {
                type_: Some(service_type.to_string()),
                selector: Some(exposure.selector.clone()),
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        })))
    }
}

fn container(stage: &StageDecl) -> Container {
    let ports: Vec<ContainerPort> = stage
        .ports
        .iter()
        .map(|port| ContainerPort {
            name: Some(port.name.clone()),
            container_port: port_number(port.number),
            protocol: Some(TCP.to_string()),
            ..Default::default()
        })
        .collect();

    Container {
        name: stage.name.clone(),
        image: Some(stage.image.clone()),
        command: stage.command.clone(),
        ports: (!ports.is_empty()).then_some(ports),
        volume_mounts: Some(stage.mounts.iter().map(volume_mount).collect()),
        security_context: Some(security_context(&stage.security)),
        ..Default::default()
    }
}

/// `None` when the pod keeps the image's identity entirely.
fn pod_security_context(security: &PodSecurity) -> Option<PodSecurityContext> {
    let context = PodSecurityContext {
        run_as_user: security.run_as_user,
        run_as_group: security.run_as_group,
        fs_group: security.fs_group,
        ..Default::default()
    };
    (context != PodSecurityContext::default()).then_some(context)
}

/// Every container drops all capabilities and adds back only what it declares.
fn security_context(security: &ContainerSecurity) -> SecurityContext {
    SecurityContext {
        run_as_user: security.run_as_user,
        run_as_non_root: Some(security.run_as_non_root),
        allow_privilege_escalation: Some(security.allow_privilege_escalation),
        read_only_root_filesystem: Some(security.read_only_root_filesystem),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_string()]),
            add: (!security.add_capabilities.is_empty())
                .then(|| security.add_capabilities.clone()),
        }),
        ..Default::default()
    }
}

fn volume_mount(mount: &MountBinding) -> VolumeMount {
    VolumeMount {
        name: mount.volume.clone(),
        mount_path: mount.path.clone(),
        read_only: mount.read_only.then_some(true),
        sub_path: mount.sub_path.clone(),
        ..Default::default()
    }
}

fn volume(storage: &StorageDecl) -> Volume {
    match &storage.kind {
        StorageKind::ConfigSource { source } => Volume {
            name: storage.name.clone(),
            config_map: Some(ConfigMapVolumeSource {
                name: source.clone().into(),
                ..Default::default()
            }),
            ..Default::default()
        },
        StorageKind::EmptyWritable { .. } => Volume {
            name: storage.name.clone(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::emit;
    use crate::options::TopologyOptions;
    use crate::role::blueprint;
    use crate::topology::assemble;

    fn create_test_manifests() -> Vec<Manifest> {
        let options = TopologyOptions {
            admin_key: Some("K1".into()),
            ..Default::default()
        };
        let blueprint = blueprint(&options).unwrap();
        let topology = assemble(&blueprint.namespace, blueprint.roles).unwrap();
        let mut emitter = KubeEmitter::default();
        emit(&topology, &mut emitter).unwrap();
        emitter.into_manifests()
    }

    fn deployment<'a>(manifests: &'a [Manifest], name: &str) -> &'a Deployment {
        manifests
            .iter()
            .find_map(|m| match m {
                Manifest::Deployment(d) if d.metadata.name.as_deref() == Some(name) => Some(d),
                _ => None,
            })
            .unwrap()
    }

    fn service<'a>(manifests: &'a [Manifest], name: &str) -> &'a Service {
        manifests
            .iter()
            .find_map(|m| match m {
                Manifest::Service(s) if s.metadata.name.as_deref() == Some(name) => Some(s),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_kinds_in_order() {
        let manifests = create_test_manifests();
        let kinds: Vec<&str> = manifests.iter().map(Manifest::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "Namespace",
                "ConfigMap",
                "Deployment",
                "Service",
                "ConfigMap",
                "Deployment",
                "Service",
                "ConfigMap",
                "Deployment",
                "Service",
            ]
        );
        for manifest in &manifests[1..] {
            assert_eq!(manifest.reference().namespace.as_deref(), Some("default"));
        }
    }

    #[test]
    fn test_control_plane_init_container() {
        let manifests = create_test_manifests();
        let pod = deployment(&manifests, "apisix-control-plane")
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap();

        let init = &pod.init_containers.as_ref().unwrap()[0];
        assert_eq!(init.name, "bootstrap");
        assert!(init.ports.is_none());
        let security = init.security_context.as_ref().unwrap();
        assert_eq!(security.run_as_user, Some(0));
        let caps = security.capabilities.as_ref().unwrap();
        assert_eq!(caps.drop.as_deref(), Some(&["ALL".to_string()][..]));
        assert!(caps.add.as_ref().unwrap().contains(&"CHOWN".to_string()));

        let main = &pod.containers[0];
        let security = main.security_context.as_ref().unwrap();
        assert_eq!(security.run_as_non_root, Some(true));
        assert_eq!(security.allow_privilege_escalation, Some(false));
        assert_eq!(security.read_only_root_filesystem, Some(true));
        assert!(security.capabilities.as_ref().unwrap().add.is_none());

        let pod_security = pod.security_context.as_ref().unwrap();
        assert_eq!(pod_security.fs_group, Some(1000));

        let volumes = pod.volumes.as_ref().unwrap();
        assert!(volumes[0].config_map.is_some());
        assert!(volumes[1].empty_dir.is_some());
    }

    #[test]
    fn test_data_plane_sub_path_mount() {
        let manifests = create_test_manifests();
        let spec = deployment(&manifests, "apisix-data-plane").spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(2));

        let pod = spec.template.spec.as_ref().unwrap();
        assert!(pod.init_containers.is_none());
        let mount = &pod.containers[0].volume_mounts.as_ref().unwrap()[0];
        assert_eq!(mount.mount_path, "/usr/local/apisix/conf/config.yaml");
        assert_eq!(mount.sub_path.as_deref(), Some("config.yaml"));
        assert_eq!(mount.read_only, Some(true));

        // The image's own user keeps ownership of the gateway tree.
        assert!(pod.security_context.is_none());
        let security = pod.containers[0].security_context.as_ref().unwrap();
        assert_eq!(security.run_as_user, None);
        assert_eq!(security.run_as_non_root, Some(false));
    }

    #[test]
    fn test_service_types() {
        let manifests = create_test_manifests();
        let admin = service(&manifests, "apisix-admin").spec.as_ref().unwrap();
        assert_eq!(admin.type_.as_deref(), Some("ClusterIP"));

        let gateway = service(&manifests, "apisix-gateway").spec.as_ref().unwrap();
        assert_eq!(gateway.type_.as_deref(), Some("LoadBalancer"));
        let port = &gateway.ports.as_ref().unwrap()[0];
        assert_eq!(port.port, 80);
        assert_eq!(port.target_port, Some(IntOrString::Int(9080)));
        assert_eq!(
            gateway.selector.as_ref().unwrap().get("app").map(String::as_str),
            Some("apisix-data-plane")
        );
    }

    #[test]
    fn test_config_map_carries_rendered_file() {
        let manifests = create_test_manifests();
        let Manifest::ConfigMap(config_map) = &manifests[4] else {
            panic!("expected config map");
        };
        let data = config_map.data.as_ref().unwrap();
        assert!(data["config.yaml"].contains("enable_admin: false"));
    }
}
