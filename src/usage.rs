//! # Resource Usage Scanner
//!
//! Locates the container that consumes a given ConfigMap/Secret, checking
//! volume mounts first (direct sources and projected sources), then env
//! references (`valueFrom` key refs and `envFrom`). A reference found only
//! in an init container anchors to the first regular container instead:
//! only regular-container or pod-template state forces a rollout, and an
//! init-container-only consumer still needs the pod to roll.

use k8s_openapi::api::core::v1::{Container, Volume};

use crate::change::{ChangeConfig, SourceKind};
use crate::workload::WorkloadItem;

/// Name of the container the reload strategies should touch, or `None` when
/// the workload demonstrably does not consume the resource. With
/// `auto_reload` false the match came from an explicit annotation naming the
/// resource, so the first regular container is used as a fallback anchor
/// even without a discoverable reference.
pub fn find_consuming_container(
    item: &WorkloadItem,
    change: &ChangeConfig,
    auto_reload: bool,
) -> Option<String> {
    let containers = item.containers();
    let init_containers = item.init_containers();

    if let Some(volume_name) = volume_mount_name(item.volumes(), change) {
        if let Some(container) = container_with_volume_mount(containers, &volume_name) {
            return Some(container.name.clone());
        }
        if container_with_volume_mount(init_containers, &volume_name).is_some() {
            return containers.first().map(|c| c.name.clone());
        }
    }

    if let Some(container) = container_with_env_reference(containers, change) {
        return Some(container.name.clone());
    }
    if container_with_env_reference(init_containers, change).is_some() {
        return containers.first().map(|c| c.name.clone());
    }

    if !auto_reload {
        return containers.first().map(|c| c.name.clone());
    }

    None
}

/// The name of the volume that mounts the changed resource, searching direct
/// `configMap`/`secret` sources and sources nested in projected volumes.
fn volume_mount_name(volumes: &[Volume], change: &ChangeConfig) -> Option<String> {
    let resource_name = change.resource_name.as_str();
    for volume in volumes {
        let hit = match change.kind {
            SourceKind::ConfigMap => {
                volume
                    .config_map
                    .as_ref()
                    .is_some_and(|source| source.name == resource_name)
                    || projected_sources(volume).any(|source| {
                        source
                            .config_map
                            .as_ref()
                            .is_some_and(|cm| cm.name == resource_name)
                    })
            }
            SourceKind::Secret => {
                volume
                    .secret
                    .as_ref()
                    .and_then(|source| source.secret_name.as_deref())
                    == Some(resource_name)
                    || projected_sources(volume).any(|source| {
                        source
                            .secret
                            .as_ref()
                            .is_some_and(|secret| secret.name == resource_name)
                    })
            }
        };
        if hit {
            return Some(volume.name.clone());
        }
    }
    None
}

fn projected_sources(
    volume: &Volume,
) -> impl Iterator<Item = &k8s_openapi::api::core::v1::VolumeProjection> {
    volume
        .projected
        .iter()
        .flat_map(|projected| projected.sources.iter().flatten())
}

fn container_with_volume_mount<'a>(
    containers: &'a [Container],
    volume_name: &str,
) -> Option<&'a Container> {
    containers.iter().find(|container| {
        container
            .volume_mounts
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|mount| mount.name == volume_name)
    })
}

fn container_with_env_reference<'a>(
    containers: &'a [Container],
    change: &ChangeConfig,
) -> Option<&'a Container> {
    let resource_name = change.resource_name.as_str();
    containers.iter().find(|container| {
        let env_hit = container
            .env
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|var| var.value_from.as_ref())
            .any(|value_from| match change.kind {
                SourceKind::ConfigMap => value_from
                    .config_map_key_ref
                    .as_ref()
                    .is_some_and(|key_ref| key_ref.name == resource_name),
                SourceKind::Secret => value_from
                    .secret_key_ref
                    .as_ref()
                    .is_some_and(|key_ref| key_ref.name == resource_name),
            });
        if env_hit {
            return true;
        }
        container
            .env_from
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|source| match change.kind {
                SourceKind::ConfigMap => source
                    .config_map_ref
                    .as_ref()
                    .is_some_and(|env_source| env_source.name == resource_name),
                SourceKind::Secret => source
                    .secret_ref
                    .as_ref()
                    .is_some_and(|env_source| env_source.name == resource_name),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
    use k8s_openapi::api::core::v1::{
        ConfigMapEnvSource, ConfigMapVolumeSource, EnvFromSource, EnvVar, EnvVarSource, PodSpec,
        PodTemplateSpec, ProjectedVolumeSource, SecretKeySelector, SecretVolumeSource, VolumeMount,
        VolumeProjection,
    };
    use std::collections::BTreeMap;

    fn change(kind: SourceKind, resource_name: &str) -> ChangeConfig {
        ChangeConfig {
            kind,
            resource_name: resource_name.to_string(),
            namespace: "default".to_string(),
            content_hash: "abc123".to_string(),
            resource_annotations: BTreeMap::new(),
        }
    }

    fn deployment(pod_spec: PodSpec) -> WorkloadItem {
        WorkloadItem::Deployment(Deployment {
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    spec: Some(pod_spec),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_finds_container_mounting_configmap_volume() {
        let mut web = container("web");
        web.volume_mounts = Some(vec![VolumeMount {
            name: "config".to_string(),
            mount_path: "/etc/app".to_string(),
            ..Default::default()
        }]);
        let item = deployment(PodSpec {
            containers: vec![container("sidecar"), web],
            volumes: Some(vec![Volume {
                name: "config".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: "app-config".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        });

        let found = find_consuming_container(&item, &change(SourceKind::ConfigMap, "app-config"), true);
        assert_eq!(found.as_deref(), Some("web"));
    }

    #[test]
    fn test_finds_container_via_projected_secret_volume() {
        let mut web = container("web");
        web.volume_mounts = Some(vec![VolumeMount {
            name: "bundle".to_string(),
            mount_path: "/etc/bundle".to_string(),
            ..Default::default()
        }]);
        let item = deployment(PodSpec {
            containers: vec![web],
            volumes: Some(vec![Volume {
                name: "bundle".to_string(),
                projected: Some(ProjectedVolumeSource {
                    sources: Some(vec![VolumeProjection {
                        secret: Some(k8s_openapi::api::core::v1::SecretProjection {
                            name: "tls-secret".to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        });

        let found = find_consuming_container(&item, &change(SourceKind::Secret, "tls-secret"), true);
        assert_eq!(found.as_deref(), Some("web"));
    }

    #[test]
    fn test_init_container_mount_anchors_to_first_regular_container() {
        let mut init = container("migrate");
        init.volume_mounts = Some(vec![VolumeMount {
            name: "config".to_string(),
            mount_path: "/etc/app".to_string(),
            ..Default::default()
        }]);
        let item = deployment(PodSpec {
            containers: vec![container("web"), container("sidecar")],
            init_containers: Some(vec![init]),
            volumes: Some(vec![Volume {
                name: "config".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: "app-config".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        });

        let found = find_consuming_container(&item, &change(SourceKind::ConfigMap, "app-config"), true);
        assert_eq!(found.as_deref(), Some("web"));
    }

    #[test]
    fn test_finds_container_via_secret_key_ref() {
        let mut web = container("web");
        web.env = Some(vec![EnvVar {
            name: "DB_PASSWORD".to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: "db-secret".to_string(),
                    key: "password".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);
        let item = deployment(PodSpec {
            containers: vec![container("sidecar"), web],
            ..Default::default()
        });

        let found = find_consuming_container(&item, &change(SourceKind::Secret, "db-secret"), true);
        assert_eq!(found.as_deref(), Some("web"));
    }

    #[test]
    fn test_finds_container_via_env_from() {
        let mut web = container("web");
        web.env_from = Some(vec![EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: "app-config".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }]);
        let item = deployment(PodSpec {
            containers: vec![web],
            ..Default::default()
        });

        let found = find_consuming_container(&item, &change(SourceKind::ConfigMap, "app-config"), true);
        assert_eq!(found.as_deref(), Some("web"));
    }

    #[test]
    fn test_manual_match_defaults_to_first_container() {
        let item = deployment(PodSpec {
            containers: vec![container("web")],
            ..Default::default()
        });

        let found = find_consuming_container(&item, &change(SourceKind::ConfigMap, "app-config"), false);
        assert_eq!(found.as_deref(), Some("web"));
    }

    #[test]
    fn test_auto_reload_without_reference_finds_nothing() {
        let item = deployment(PodSpec {
            containers: vec![container("web")],
            ..Default::default()
        });

        let found = find_consuming_container(&item, &change(SourceKind::ConfigMap, "app-config"), true);
        assert_eq!(found, None);
    }

    #[test]
    fn test_volume_of_other_kind_does_not_match() {
        let mut web = container("web");
        web.volume_mounts = Some(vec![VolumeMount {
            name: "creds".to_string(),
            mount_path: "/etc/creds".to_string(),
            ..Default::default()
        }]);
        let item = deployment(PodSpec {
            containers: vec![web],
            volumes: Some(vec![Volume {
                name: "creds".to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some("app-config".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        });

        // A Secret volume named like the ConfigMap must not count as usage.
        let found = find_consuming_container(&item, &change(SourceKind::ConfigMap, "app-config"), true);
        assert_eq!(found, None);
    }
}
