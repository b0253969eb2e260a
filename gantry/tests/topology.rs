//! End-to-end topology synthesis scenarios.

use gantry::role::{DashboardParams, blueprint};
use gantry::{
    GantryError, Namespace, OutputFormat, RoleKind, RoleParams, RoleSpec, SharedCredential,
    TopologyOptions, assemble, render_manifests, synthesize,
};

fn create_test_options() -> TopologyOptions {
    TopologyOptions {
        admin_key: Some("K1".into()),
        dashboard: gantry::options::DashboardOptions {
            password: Some("pw".into()),
            session_secret: Some("secret".into()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn create_test_roles() -> (Namespace, Vec<RoleSpec>) {
    let blueprint = blueprint(&create_test_options()).unwrap();
    (blueprint.namespace, blueprint.roles)
}

fn dashboard(specs: &mut [RoleSpec]) -> &mut DashboardParams {
    specs
        .iter_mut()
        .find_map(|spec| match &mut spec.params {
            RoleParams::Dashboard(params) => Some(params),
            _ => None,
        })
        .unwrap()
}

#[test]
fn test_default_namespace_with_shared_credential() {
    let (namespace, roles) = create_test_roles();
    assert_eq!(namespace.as_str(), "default");

    let topology = assemble(&namespace, roles).unwrap();
    let kinds: Vec<RoleKind> = topology.roles.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![RoleKind::ControlPlane, RoleKind::DataPlane, RoleKind::Dashboard]
    );
    assert_eq!(topology.credential, SharedCredential::new("K1"));

    // Dashboard address host is the control plane's exposure.
    let admin = &topology.role(RoleKind::ControlPlane).unwrap().exposure;
    let dashboard_config = &topology.role(RoleKind::Dashboard).unwrap().payload.document;
    let base_url = dashboard_config["apisix"]["admin_api"]["base_url"]
        .as_str()
        .unwrap();
    let host = base_url
        .trim_start_matches("http://")
        .split(':')
        .next()
        .unwrap();
    assert_eq!(host.split('.').next(), Some(admin.name.as_str()));
    assert_eq!(host, "apisix-admin.default.svc.cluster.local");

    let data_plane = topology.role(RoleKind::DataPlane).unwrap();
    assert_eq!(data_plane.payload.admin_enabled(), Some(false));
}

#[test]
fn test_credential_mismatch_fails() {
    let (namespace, mut roles) = create_test_roles();
    dashboard(&mut roles).admin_key = Some(SharedCredential::new("K2"));

    match assemble(&namespace, roles).unwrap_err() {
        GantryError::TopologyInconsistency {
            left, right, field, ..
        } => {
            assert_eq!(field, "admin_key");
            assert_eq!(left, "control-plane");
            assert_eq!(right, "dashboard");
        }
        other => panic!("expected TopologyInconsistency, got {other:?}"),
    }
}

#[test]
fn test_missing_cross_reference() {
    let (namespace, mut roles) = create_test_roles();
    dashboard(&mut roles).control_plane_address = None;

    let err = assemble(&namespace, roles).unwrap_err();
    assert!(matches!(
        &err,
        GantryError::MissingCrossReference { field, .. } if field == "control_plane_address"
    ));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_unresolvable_bootstrap_source() {
    let (namespace, mut roles) = create_test_roles();
    roles[0].runtime.packaged_root = None;

    let err = assemble(&namespace, roles).unwrap_err();
    assert!(matches!(err, GantryError::UnresolvableBootstrapSource { .. }));
    assert!(err.is_composition_error());
}

#[test]
fn test_synthesis_is_idempotent() {
    let options = create_test_options();
    let first = synthesize(&options).unwrap();
    let second = synthesize(&options).unwrap();
    assert_eq!(first, second);

    for format in [OutputFormat::Yaml, OutputFormat::Json] {
        assert_eq!(
            render_manifests(&first, format).unwrap(),
            render_manifests(&second, format).unwrap()
        );
    }
}

#[test]
fn test_namespace_threads_through_every_reference() {
    let options = create_test_options().with_namespace(Some("edge".into()));
    let topology = synthesize(&options).unwrap();
    assert_eq!(
        topology.backend.address,
        "http://etcd.edge.svc.cluster.local:2379"
    );

    let yaml = render_manifests(&topology, OutputFormat::Yaml).unwrap();
    assert!(!yaml.contains(".default."));
    assert!(!yaml.contains("namespace: default"));
    assert!(yaml.contains("namespace: edge"));
    assert!(yaml.contains("apisix-admin.edge.svc.cluster.local:9180"));
}

#[test]
fn test_generated_secrets_are_advised() {
    let topology = synthesize(&TopologyOptions::default()).unwrap();
    let kinds: Vec<String> = topology
        .advisories
        .iter()
        .map(|a| serde_json::to_value(a).unwrap()["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "generated_credential",
            "generated_credential",
            "generated_credential",
            "unrestricted_admin_access",
        ]
    );
    assert_eq!(topology.credential.expose().len(), 32);
}

#[test]
fn test_invalid_namespace_rejected_before_composition() {
    let options = create_test_options().with_namespace(Some("Not_Valid".into()));
    let err = synthesize(&options).unwrap_err();
    assert!(matches!(err, GantryError::InvalidNamespace(_)));
}

#[test]
fn test_options_file_drives_topology() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gantry.yaml");
    std::fs::write(
        &path,
        "namespace: gateway\nadmin_key: K1\ndashboard:\n  enabled: false\ndata_plane:\n  replicas: 4\n",
    )
    .unwrap();

    let options = TopologyOptions::load(Some(&path)).unwrap();
    let topology = synthesize(&options).unwrap();
    assert_eq!(topology.namespace.as_str(), "gateway");
    assert_eq!(topology.roles.len(), 2);
    assert_eq!(
        topology.role(RoleKind::DataPlane).unwrap().workload.replicas,
        4
    );
}
