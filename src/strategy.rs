//! # Reload Strategies
//!
//! The two interchangeable ways of forcing a rollout once a reload decision
//! has been made: stamping an informational annotation into the pod
//! template, or injecting a content-hash env var into the consuming
//! container. The strategy is selected once per process; the evaluator only
//! ever calls [`invoke`].

use clap::ValueEnum;
use k8s_openapi::api::core::v1::{Container, EnvVar};
use serde::Serialize;
use tracing::error;

use crate::change::ChangeConfig;
use crate::constants::{ENV_VAR_PREFIX, LAST_RELOADED_FROM_ANNOTATION};
use crate::usage::find_consuming_container;
use crate::workload::WorkloadItem;

/// Globally configured mutation strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReloadStrategy {
    /// Inject/update a per-container env var keyed by content hash.
    EnvVars,
    /// Stamp a pod-template annotation recording the reload source.
    Annotations,
}

/// Outcome of applying a strategy to one workload for one change.
/// `Updated` dominates when results for several changes are aggregated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateResult {
    Updated,
    NotUpdated,
    /// The workload has no discoverable consumer of the resource.
    NoContainerFound,
    /// Internal signal from the env-var scan: no existing var, create one.
    NoEnvVarFound,
}

/// Apply the configured strategy to the item in memory. The caller decides
/// whether the mutated item is written back.
pub fn invoke(
    strategy: ReloadStrategy,
    item: &mut WorkloadItem,
    change: &ChangeConfig,
    auto_reload: bool,
) -> UpdateResult {
    match strategy {
        ReloadStrategy::Annotations => update_pod_annotations(item, change, auto_reload),
        ReloadStrategy::EnvVars => update_container_env_vars(item, change, auto_reload),
    }
}

/// Payload stored under the last-reloaded annotation. Purely informational;
/// nothing reads it back.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReloadSource {
    kind: String,
    name: String,
    namespace: String,
    hash: String,
    containers: Vec<String>,
    observed_at: i64,
}

impl ReloadSource {
    fn new(change: &ChangeConfig, containers: Vec<String>) -> Self {
        Self {
            kind: change.kind.as_str().to_string(),
            name: change.resource_name.clone(),
            namespace: change.namespace.clone(),
            hash: change.content_hash.clone(),
            containers,
            observed_at: chrono::Utc::now().timestamp(),
        }
    }
}

fn update_pod_annotations(
    item: &mut WorkloadItem,
    change: &ChangeConfig,
    auto_reload: bool,
) -> UpdateResult {
    let Some(container) = find_consuming_container(item, change, auto_reload) else {
        return UpdateResult::NoContainerFound;
    };

    // A single annotation keyed by a fixed name; each reload overwrites the
    // previous one so the pod template never accumulates history.
    let source = ReloadSource::new(change, vec![container]);
    let value = match serde_json::to_string(&source) {
        Ok(value) => value,
        Err(err) => {
            error!(
                resource = %change.resource_name,
                error = %err,
                "failed to serialize reload source annotation"
            );
            return UpdateResult::NotUpdated;
        }
    };

    let Some(annotations) = item.pod_annotations_mut() else {
        return UpdateResult::NotUpdated;
    };
    annotations.insert(LAST_RELOADED_FROM_ANNOTATION.to_string(), value);
    UpdateResult::Updated
}

/// Name of the env var injected for a resource, derived deterministically so
/// repeat reloads find and overwrite the same var.
pub fn env_var_name(change: &ChangeConfig) -> String {
    let sanitized: String = change
        .resource_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "{ENV_VAR_PREFIX}{sanitized}_{postfix}",
        postfix = change.kind.env_var_postfix()
    )
}

fn update_container_env_vars(
    item: &mut WorkloadItem,
    change: &ChangeConfig,
    auto_reload: bool,
) -> UpdateResult {
    let Some(target) = find_consuming_container(item, change, auto_reload) else {
        return UpdateResult::NoContainerFound;
    };
    let env_var = env_var_name(change);
    let Some(containers) = item.containers_mut() else {
        return UpdateResult::NotUpdated;
    };

    match update_env_var(containers, &env_var, &change.content_hash) {
        UpdateResult::NoEnvVarFound => {
            let Some(container) = containers.iter_mut().find(|c| c.name == target) else {
                return UpdateResult::NoContainerFound;
            };
            container.env.get_or_insert_with(Vec::new).push(EnvVar {
                name: env_var,
                value: Some(change.content_hash.clone()),
                value_from: None,
            });
            UpdateResult::Updated
        }
        result => result,
    }
}

fn update_env_var(containers: &mut [Container], env_var: &str, hash: &str) -> UpdateResult {
    for container in containers.iter_mut() {
        let Some(env) = container.env.as_mut() else {
            continue;
        };
        for var in env.iter_mut() {
            if var.name == env_var {
                if var.value.as_deref() == Some(hash) {
                    return UpdateResult::NotUpdated;
                }
                var.value = Some(hash.to_string());
                return UpdateResult::Updated;
            }
        }
    }
    UpdateResult::NoEnvVarFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::SourceKind;
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
    use k8s_openapi::api::core::v1::{
        ConfigMapVolumeSource, PodSpec, PodTemplateSpec, Volume, VolumeMount,
    };
    use std::collections::BTreeMap;

    fn change(hash: &str) -> ChangeConfig {
        ChangeConfig {
            kind: SourceKind::ConfigMap,
            resource_name: "app-config".to_string(),
            namespace: "default".to_string(),
            content_hash: hash.to_string(),
            resource_annotations: BTreeMap::new(),
        }
    }

    fn deployment_mounting_app_config() -> WorkloadItem {
        let container = Container {
            name: "web".to_string(),
            volume_mounts: Some(vec![VolumeMount {
                name: "config".to_string(),
                mount_path: "/etc/app".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        };
        WorkloadItem::Deployment(Deployment {
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![container],
                        volumes: Some(vec![Volume {
                            name: "config".to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: "app-config".to_string(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    #[test]
    fn test_env_var_name_derivation() {
        assert_eq!(
            env_var_name(&change("abc123")),
            "STAKATER_APP_CONFIG_CONFIGMAP"
        );
    }

    #[test]
    fn test_env_var_strategy_is_idempotent_per_hash() {
        let mut item = deployment_mounting_app_config();
        let change = change("def456");

        let first = invoke(ReloadStrategy::EnvVars, &mut item, &change, true);
        assert_eq!(first, UpdateResult::Updated);

        let second = invoke(ReloadStrategy::EnvVars, &mut item, &change, true);
        assert_eq!(second, UpdateResult::NotUpdated);
    }

    #[test]
    fn test_env_var_strategy_overwrites_on_new_hash() {
        let mut item = deployment_mounting_app_config();
        assert_eq!(
            invoke(ReloadStrategy::EnvVars, &mut item, &change("abc123"), true),
            UpdateResult::Updated
        );
        assert_eq!(
            invoke(ReloadStrategy::EnvVars, &mut item, &change("def456"), true),
            UpdateResult::Updated
        );

        let env = item.containers()[0].env.as_ref().unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].name, "STAKATER_APP_CONFIG_CONFIGMAP");
        assert_eq!(env[0].value.as_deref(), Some("def456"));
    }

    #[test]
    fn test_env_var_strategy_without_consumer_reports_no_container() {
        let mut item = WorkloadItem::Deployment(Deployment {
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "web".to_string(),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        });

        assert_eq!(
            invoke(ReloadStrategy::EnvVars, &mut item, &change("abc123"), true),
            UpdateResult::NoContainerFound
        );
    }

    #[test]
    fn test_annotation_strategy_stamps_pod_template() {
        let mut item = deployment_mounting_app_config();
        let result = invoke(ReloadStrategy::Annotations, &mut item, &change("def456"), true);
        assert_eq!(result, UpdateResult::Updated);

        let annotations = item.pod_annotations().unwrap();
        let value = annotations.get(LAST_RELOADED_FROM_ANNOTATION).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(value).unwrap();
        assert_eq!(parsed["kind"], "ConfigMap");
        assert_eq!(parsed["name"], "app-config");
        assert_eq!(parsed["hash"], "def456");
        assert_eq!(parsed["containers"][0], "web");
    }

    #[test]
    fn test_annotation_strategy_keeps_only_latest_reload() {
        let mut item = deployment_mounting_app_config();
        invoke(ReloadStrategy::Annotations, &mut item, &change("abc123"), true);
        invoke(ReloadStrategy::Annotations, &mut item, &change("def456"), true);

        let annotations = item.pod_annotations().unwrap();
        assert_eq!(annotations.len(), 1);
        let parsed: serde_json::Value =
            serde_json::from_str(annotations.get(LAST_RELOADED_FROM_ANNOTATION).unwrap()).unwrap();
        assert_eq!(parsed["hash"], "def456");
    }
}
