//! # Reload Decision Tests
//!
//! End-to-end tests of the trigger evaluator and reload strategies against
//! in-memory workloads:
//! - manual annotation matching with anchored patterns
//! - idempotence of the env-var strategy per content hash
//! - exclusion precedence
//! - aggregation across several pending changes
//! - the annotation strategy's pod-template stamp

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};

use workload_reloader::change::{ChangeConfig, SourceKind};
use workload_reloader::constants::LAST_RELOADED_FROM_ANNOTATION;
use workload_reloader::options::Options;
use workload_reloader::reload::{evaluate_config, evaluate_item, ConfigDisposition};
use workload_reloader::strategy::{ReloadStrategy, UpdateResult};
use workload_reloader::workload::WorkloadItem;

fn change(resource_name: &str, hash: &str) -> ChangeConfig {
    ChangeConfig {
        kind: SourceKind::ConfigMap,
        resource_name: resource_name.to_string(),
        namespace: "default".to_string(),
        content_hash: hash.to_string(),
        resource_annotations: BTreeMap::new(),
    }
}

/// Deployment `my-app` with one `web` container mounting `app-config`.
fn annotated_deployment(annotations: &[(&str, &str)]) -> WorkloadItem {
    let container = Container {
        name: "web".to_string(),
        volume_mounts: Some(vec![VolumeMount {
            name: "config".to_string(),
            mount_path: "/etc/app".to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };
    let mut deployment = Deployment {
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
    };
    deployment.metadata.name = Some("my-app".to_string());
    deployment.metadata.annotations = Some(
        annotations
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    );
    WorkloadItem::Deployment(deployment)
}

fn env_var_options() -> Options {
    Options {
        reload_strategy: ReloadStrategy::EnvVars,
        ..Default::default()
    }
}

#[test]
fn test_manual_annotation_injects_hash_env_var() {
    // Scenario: ConfigMap `app-config` changes hash "abc123" -> "def456" on a
    // workload with a manual reload annotation.
    let mut item = annotated_deployment(&[("configmap.reloader.stakater.com/reload", "app-config")]);
    let options = env_var_options();

    let first = evaluate_config(&mut item, &change("app-config", "abc123"), &options, true);
    assert_eq!(first, ConfigDisposition::Evaluated(UpdateResult::Updated));

    let second = evaluate_config(&mut item, &change("app-config", "def456"), &options, true);
    assert_eq!(second, ConfigDisposition::Evaluated(UpdateResult::Updated));

    let env = item.containers()[0].env.as_ref().expect("env var injected");
    assert_eq!(env.len(), 1);
    assert_eq!(env[0].name, "STAKATER_APP_CONFIG_CONFIGMAP");
    assert_eq!(env[0].value.as_deref(), Some("def456"));
}

#[test]
fn test_unchanged_hash_yields_not_updated() {
    let mut item = annotated_deployment(&[("configmap.reloader.stakater.com/reload", "app-config")]);
    let options = env_var_options();

    let first = evaluate_config(&mut item, &change("app-config", "def456"), &options, true);
    assert_eq!(first, ConfigDisposition::Evaluated(UpdateResult::Updated));

    // Re-delivery of the same hash must not produce another update.
    let second = evaluate_config(&mut item, &change("app-config", "def456"), &options, true);
    assert_eq!(second, ConfigDisposition::Evaluated(UpdateResult::NotUpdated));
}

#[test]
fn test_workload_without_annotations_is_left_alone() {
    for strategy in [ReloadStrategy::EnvVars, ReloadStrategy::Annotations] {
        let mut item = annotated_deployment(&[]);
        let options = Options {
            reload_strategy: strategy,
            ..Default::default()
        };
        let disposition = evaluate_config(&mut item, &change("app-config", "abc123"), &options, true);
        assert_eq!(
            disposition,
            ConfigDisposition::Evaluated(UpdateResult::NotUpdated)
        );
        assert!(item.containers()[0].env.is_none());
        assert!(item.pod_annotations().is_none());
    }
}

#[test]
fn test_manual_tokens_are_whole_string_patterns() {
    let options = env_var_options();
    let mut item = annotated_deployment(&[("configmap.reloader.stakater.com/reload", "foo")]);
    assert_eq!(
        evaluate_config(&mut item, &change("foo", "abc123"), &options, true),
        ConfigDisposition::Evaluated(UpdateResult::Updated)
    );

    for name in ["foobar", "xfoo"] {
        let mut item = annotated_deployment(&[("configmap.reloader.stakater.com/reload", "foo")]);
        assert_eq!(
            evaluate_config(&mut item, &change(name, "abc123"), &options, true),
            ConfigDisposition::Evaluated(UpdateResult::NotUpdated),
            "'foo' must not match '{name}'"
        );
    }
}

#[test]
fn test_excluded_resource_never_triggers() {
    let mut item = annotated_deployment(&[
        ("reloader.stakater.com/auto", "true"),
        ("configmap.reloader.stakater.com/reload", "app-config"),
        ("configmap.reloader.stakater.com/exclude", "app-config"),
    ]);
    let disposition = evaluate_config(
        &mut item,
        &change("app-config", "abc123"),
        &env_var_options(),
        true,
    );
    assert_eq!(disposition, ConfigDisposition::Excluded);
    assert!(item.containers()[0].env.is_none());
}

#[test]
fn test_updated_dominates_across_pending_changes() {
    let mut item = annotated_deployment(&[("configmap.reloader.stakater.com/reload", "app-config")]);
    let configs = vec![
        change("unrelated", "abc123"),
        change("app-config", "def456"),
    ];
    let evaluation = evaluate_item(&mut item, &configs, &env_var_options(), true);
    assert!(evaluation.updated, "one Updated result must dominate");

    // Only the matching change left a mark on the item.
    let env = item.containers()[0].env.as_ref().unwrap();
    assert_eq!(env.len(), 1);
}

#[test]
fn test_annotation_strategy_stamps_template_not_workload() {
    let mut item = annotated_deployment(&[("reloader.stakater.com/auto", "true")]);
    let options = Options {
        reload_strategy: ReloadStrategy::Annotations,
        ..Default::default()
    };

    let disposition = evaluate_config(&mut item, &change("app-config", "def456"), &options, true);
    assert_eq!(disposition, ConfigDisposition::Evaluated(UpdateResult::Updated));

    let stamped = item
        .pod_annotations()
        .and_then(|annotations| annotations.get(LAST_RELOADED_FROM_ANNOTATION))
        .expect("pod template carries the reload stamp");
    let parsed: serde_json::Value = serde_json::from_str(stamped).unwrap();
    assert_eq!(parsed["name"], "app-config");
    assert_eq!(parsed["hash"], "def456");

    // The workload's own annotations are untouched.
    assert!(item
        .annotations()
        .is_some_and(|annotations| !annotations.contains_key(LAST_RELOADED_FROM_ANNOTATION)));
}
